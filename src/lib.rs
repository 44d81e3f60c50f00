//! Reescritura en lote de la metadata de documento de libros `.xls` y `.xlsx`.

pub mod app;
pub mod config;
pub mod editor;
pub mod error;
pub mod format;
pub mod properties;
pub mod walker;

pub use config::SyncConfig;
pub use editor::{ApplyOutcome, DocumentTarget, MetadataAdapter};
pub use error::{ConfigError, SyncError, SyncResult};
pub use format::{DocumentFormat, classify};
pub use properties::{PropertyKey, PropertyMap};
pub use walker::{DEFAULT_MAX_DEPTH, SyncEvent, SyncOptions, SyncSummary, run, run_with_observer};
