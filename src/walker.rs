//! Recorrido del árbol de directorios y aplicación de propiedades por archivo.

use log::{debug, error, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::editor::{ApplyOutcome, DocumentTarget};
use crate::error::{SyncError, SyncResult};
use crate::format::DocumentFormat;
use crate::properties::{PropertyKey, PropertyMap};

/// Niveles de anidamiento que se recorren por defecto bajo la raíz.
pub const DEFAULT_MAX_DEPTH: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    pub max_depth: usize,
    /// Solo calcula los cambios; no escribe ningún archivo.
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            dry_run: false,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    Started {
        root: PathBuf,
        max_depth: usize,
        dry_run: bool,
    },
    Processing {
        path: PathBuf,
        format: DocumentFormat,
    },
    Updated {
        path: PathBuf,
        changed: Vec<PropertyKey>,
        dry_run: bool,
    },
    Unchanged {
        path: PathBuf,
    },
    Failure {
        path: PathBuf,
        error: String,
    },
    Finished {
        visited: usize,
        updated: usize,
        unchanged: usize,
        skipped: usize,
        failures: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
}

/// Totales de una ejecución completa.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Archivos regulares encontrados dentro del límite de profundidad.
    pub visited: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Archivos con una extensión no soportada.
    pub skipped: usize,
    pub failures: Vec<FailedFile>,
}

impl SyncSummary {
    fn finished_event(&self) -> SyncEvent {
        SyncEvent::Finished {
            visited: self.visited,
            updated: self.updated,
            unchanged: self.unchanged,
            skipped: self.skipped,
            failures: self.failures.len(),
        }
    }
}

/// Aplica `properties` a cada hoja de cálculo bajo `root`, hasta `max_depth` niveles.
pub fn run(root: &Path, max_depth: usize, properties: &PropertyMap) -> SyncResult<SyncSummary> {
    let options = SyncOptions {
        max_depth,
        ..SyncOptions::default()
    };
    run_with_observer(root, &options, properties, |_| {})
}

/// Igual que [`run`], notificando cada paso a `observer`.
///
/// Solo falla si la raíz no existe o no se puede leer. Los errores de cada
/// archivo quedan registrados en el resumen y el recorrido continúa.
pub fn run_with_observer<F>(
    root: &Path,
    options: &SyncOptions,
    properties: &PropertyMap,
    mut observer: F,
) -> SyncResult<SyncSummary>
where
    F: FnMut(&SyncEvent),
{
    if !root.is_dir() {
        return Err(SyncError::RootNotFound(root.to_path_buf()));
    }

    observer(&SyncEvent::Started {
        root: root.to_path_buf(),
        max_depth: options.max_depth,
        dry_run: options.dry_run,
    });

    let mut summary = SyncSummary::default();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .max_depth(options.max_depth);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(err.into()),
            Err(err) => {
                warn!("Se omite una entrada ilegible: {err}");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        summary.visited += 1;

        let target = DocumentTarget::new(entry.into_path());
        let Some(adapter) = target.adapter() else {
            summary.skipped += 1;
            continue;
        };

        debug!("Procesando {}", target.path.display());
        observer(&SyncEvent::Processing {
            path: target.path.clone(),
            format: target.format,
        });

        let result = if options.dry_run {
            adapter.preview(&target.path, properties)
        } else {
            adapter.apply_properties(&target.path, properties)
        };

        match result {
            Ok(ApplyOutcome::Updated { changed }) => {
                summary.updated += 1;
                let keys = join_keys(&changed);
                if options.dry_run {
                    info!("{} se actualizaría: {keys}", target.path.display());
                } else {
                    info!("{} actualizado: {keys}", target.path.display());
                }
                observer(&SyncEvent::Updated {
                    path: target.path,
                    changed,
                    dry_run: options.dry_run,
                });
            }
            Ok(ApplyOutcome::Unchanged) => {
                summary.unchanged += 1;
                debug!("{} ya estaba al día", target.path.display());
                observer(&SyncEvent::Unchanged { path: target.path });
            }
            Err(err) => {
                error!("{}: {err}", target.path.display());
                let error = err.to_string();
                summary.failures.push(FailedFile {
                    path: target.path.clone(),
                    error: error.clone(),
                });
                observer(&SyncEvent::Failure {
                    path: target.path,
                    error,
                });
            }
        }
    }

    info!(
        "Recorrido terminado: {} archivos, {} actualizados, {} sin cambios, {} omitidos, {} errores",
        summary.visited,
        summary.updated,
        summary.unchanged,
        summary.skipped,
        summary.failures.len()
    );
    observer(&summary.finished_event());

    Ok(summary)
}

fn join_keys(keys: &[PropertyKey]) -> String {
    keys.iter()
        .map(|key| key.label())
        .collect::<Vec<_>>()
        .join(", ")
}
