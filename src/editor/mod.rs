//! Adaptadores que leen y reescriben la metadata de documento de cada formato.

pub(crate) mod constants;
mod legacy;
mod office;
mod utils;

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::SyncResult;
use crate::format::{DocumentFormat, classify};
use crate::properties::{DocumentProperties, PropertyKey, PropertyMap};

pub use legacy::{apply_legacy_properties, read_legacy_properties};
pub use office::{apply_modern_properties, read_modern_properties};

/// Resultado de aplicar un mapa de propiedades a un archivo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ApplyOutcome {
    /// El archivo se reescribió; contiene las claves cuyo valor cambió.
    Updated { changed: Vec<PropertyKey> },
    /// Todos los valores ya coincidían; el archivo no se tocó.
    Unchanged,
}

/// Contrato común de los adaptadores de formato.
pub trait MetadataAdapter {
    fn format(&self) -> DocumentFormat;

    fn read_properties(&self, path: &Path) -> SyncResult<DocumentProperties>;

    fn apply_properties(&self, path: &Path, properties: &PropertyMap) -> SyncResult<ApplyOutcome>;

    /// Calcula qué claves cambiarían sin escribir nada.
    fn preview(&self, path: &Path, properties: &PropertyMap) -> SyncResult<ApplyOutcome> {
        let current = self.read_properties(path)?;
        let changed = properties.pending_changes(&current);
        if changed.is_empty() {
            Ok(ApplyOutcome::Unchanged)
        } else {
            Ok(ApplyOutcome::Updated { changed })
        }
    }
}

/// Libros `.xls` sobre contenedor compuesto.
#[derive(Clone, Copy, Debug, Default)]
pub struct LegacyAdapter;

/// Libros `.xlsx` empaquetados en ZIP.
#[derive(Clone, Copy, Debug, Default)]
pub struct ModernAdapter;

impl MetadataAdapter for LegacyAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Legacy
    }

    fn read_properties(&self, path: &Path) -> SyncResult<DocumentProperties> {
        read_legacy_properties(path)
    }

    fn apply_properties(&self, path: &Path, properties: &PropertyMap) -> SyncResult<ApplyOutcome> {
        apply_legacy_properties(path, properties)
    }
}

impl MetadataAdapter for ModernAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Modern
    }

    fn read_properties(&self, path: &Path) -> SyncResult<DocumentProperties> {
        read_modern_properties(path)
    }

    fn apply_properties(&self, path: &Path, properties: &PropertyMap) -> SyncResult<ApplyOutcome> {
        apply_modern_properties(path, properties)
    }
}

/// Archivo descubierto durante el recorrido junto con su formato.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentTarget {
    pub path: PathBuf,
    pub format: DocumentFormat,
}

impl DocumentTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = classify(&path);
        Self { path, format }
    }

    /// Adaptador que corresponde al formato; `None` para archivos no soportados.
    pub fn adapter(&self) -> Option<&'static dyn MetadataAdapter> {
        match self.format {
            DocumentFormat::Legacy => Some(&LegacyAdapter),
            DocumentFormat::Modern => Some(&ModernAdapter),
            DocumentFormat::Unsupported => None,
        }
    }
}
