//! Archivos temporales hermanos para reemplazar documentos de forma atómica.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SyncError, SyncResult};

/// Crea un nombre de archivo temporal en el mismo directorio que `path`.
fn generate_temp_filename(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path.file_name().unwrap_or_default().to_string_lossy();

    // Usar pid y timestamp para evitar colisiones entre ejecuciones consecutivas.
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    parent.join(format!(
        ".{}.{}-{}.tmp",
        name,
        std::process::id(),
        timestamp
    ))
}

/// Archivo temporal que se elimina al salir de su ámbito salvo que se haya
/// promovido sobre el original con [`TempSibling::persist`].
pub(crate) struct TempSibling {
    path: PathBuf,
    persisted: bool,
}

impl TempSibling {
    pub(crate) fn for_target(target: &Path) -> Self {
        Self {
            path: generate_temp_filename(target),
            persisted: false,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Sustituye `target` por el temporal conservando los permisos del original.
    pub(crate) fn persist(mut self, target: &Path) -> SyncResult<()> {
        if let Ok(metadata) = fs::metadata(target) {
            fs::set_permissions(&self.path, metadata.permissions())
                .map_err(|e| SyncError::io(&self.path, e))?;
        }

        fs::rename(&self.path, target).map_err(|e| SyncError::io(target, e))?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempSibling {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = fs::remove_file(&self.path);
        }
    }
}
