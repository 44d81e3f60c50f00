use clap::Parser;
use std::process::ExitCode;

use sheetprops::app::{self, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    app::init_logging(cli.verbose);
    app::run(&cli)
}
