//! Clasificación de archivos según su extensión.

use serde::Serialize;
use std::path::Path;

pub const LEGACY_EXTENSION: &str = "xls";
pub const MODERN_EXTENSION: &str = "xlsx";

/// Formato de contenedor reconocido para un archivo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DocumentFormat {
    /// Libro binario sobre contenedor compuesto OLE (`.xls`).
    Legacy,
    /// Paquete ZIP con partes XML (`.xlsx`).
    Modern,
    Unsupported,
}

/// Determina el formato solo a partir de la extensión, distinguiendo mayúsculas.
pub fn classify(path: &Path) -> DocumentFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(LEGACY_EXTENSION) => DocumentFormat::Legacy,
        Some(MODERN_EXTENSION) => DocumentFormat::Modern,
        _ => DocumentFormat::Unsupported,
    }
}
