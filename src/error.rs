//! Errores del motor de sincronización y de la carga de configuración.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fallos al leer o reescribir un documento, o al recorrer el árbol.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no se pudo acceder a {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no es un documento Office válido: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("error en el XML de {part}: {message}")]
    Xml { part: String, message: String },

    #[error("no se encontró el flujo de propiedades {0:?}")]
    MissingStream(String),

    #[error("conjunto de propiedades inválido: {0}")]
    InvalidPropertySet(String),

    #[error("el directorio raíz {} no existe o no es un directorio", .0.display())]
    RootNotFound(PathBuf),

    #[error("error recorriendo el directorio: {0}")]
    Walk(#[from] walkdir::Error),
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn xml(part: impl Into<String>, message: impl ToString) -> Self {
        SyncError::Xml {
            part: part.into(),
            message: message.to_string(),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Fallos al cargar el archivo de configuración. Siempre son fatales.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no se pudo leer la configuración {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuración mal formada: {0}")]
    Parse(String),

    #[error("falta el elemento <{0}> en la configuración")]
    MissingElement(&'static str),

    #[error("valor de profundidad máxima inválido: {0:?}")]
    InvalidMaxDepth(String),
}
