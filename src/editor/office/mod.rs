//! Metadata de libros `.xlsx`: partes XML `core` y `app` dentro del paquete ZIP.

mod archive;
mod fields;
mod package;
mod xml;

use std::fs::File;
use std::path::Path;
use zip::ZipArchive;

use crate::editor::ApplyOutcome;
use crate::editor::utils::TempSibling;
use crate::error::{SyncError, SyncResult};
use crate::properties::{DocumentProperties, PropertyMap};

use archive::rewrite_package;
use package::PropertyPackage;

fn open_package(path: &Path) -> SyncResult<ZipArchive<File>> {
    let file = File::open(path).map_err(|e| SyncError::io(path, e))?;
    Ok(ZipArchive::new(file)?)
}

/// Lee los valores actuales de las propiedades del catálogo.
pub fn read_modern_properties(path: &Path) -> SyncResult<DocumentProperties> {
    let mut archive = open_package(path)?;
    let package = PropertyPackage::load(&mut archive)?;
    Ok(package.to_document_properties())
}

/// Actualiza las partes de propiedades de un `.xlsx` y reescribe el paquete.
pub fn apply_modern_properties(path: &Path, properties: &PropertyMap) -> SyncResult<ApplyOutcome> {
    let mut archive = open_package(path)?;
    let mut package = PropertyPackage::load(&mut archive)?;

    let changed = package.apply(properties)?;
    if changed.is_empty() {
        return Ok(ApplyOutcome::Unchanged);
    }

    let replacements = package.into_replacements(&mut archive)?;
    let temp = TempSibling::for_target(path);
    rewrite_package(&mut archive, temp.path(), &replacements)?;
    drop(archive);

    temp.persist(path)?;
    Ok(ApplyOutcome::Updated { changed })
}
