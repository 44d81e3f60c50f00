use clap::Parser;
use log::error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::config::{SyncConfig, default_config_path};
use crate::error::SyncError;
use crate::walker::{SyncEvent, SyncOptions, run_with_observer};

const EXIT_ROOT_NOT_FOUND: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "sheetprops")]
#[command(about = "Reescribe en lote la metadata de documento de libros XLS y XLSX", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Archivo de configuración (por defecto `excelProperties.xml` en el directorio actual)
    #[arg(short, long, value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Directorio raíz; sustituye a `<Directory>` de la configuración
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Niveles de anidamiento a recorrer; sustituye a `<MaxDepth>`
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub max_depth: Option<u16>,

    /// Muestra qué cambiaría sin escribir ningún archivo
    #[arg(long)]
    pub dry_run: bool,

    /// Emite cada evento como una línea JSON por la salida estándar
    #[arg(long)]
    pub json: bool,

    /// Activa los mensajes de depuración
    #[arg(short, long)]
    pub verbose: bool,
}

/// Inicializa `env_logger`; `RUST_LOG` tiene prioridad sobre `--verbose`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

pub fn run(cli: &Cli) -> ExitCode {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = match SyncConfig::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let root = cli.root.clone().unwrap_or(config.root);
    let options = SyncOptions {
        max_depth: cli.max_depth.map_or(config.max_depth, usize::from),
        dry_run: cli.dry_run,
    };

    let mut stdout = io::stdout().lock();
    let result = run_with_observer(&root, &options, &config.properties, |event| {
        if cli.json {
            print_event(&mut stdout, event);
        }
    });

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(err @ SyncError::RootNotFound(_)) | Err(err @ SyncError::Walk(_)) => {
            error!("{err}");
            ExitCode::from(EXIT_ROOT_NOT_FOUND)
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn print_event(out: &mut impl Write, event: &SyncEvent) {
    match serde_json::to_string(event) {
        Ok(line) => {
            let _ = writeln!(out, "{line}");
        }
        Err(err) => error!("No se pudo serializar el evento: {err}"),
    }
}
