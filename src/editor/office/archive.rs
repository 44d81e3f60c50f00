use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{SyncError, SyncResult};

/// Lee una parte completa del paquete; `None` si no existe.
pub(crate) fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> SyncResult<Option<Vec<u8>>> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)
                .map_err(|e| SyncError::io(name, e))?;
            Ok(Some(contents))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Reescribe un paquete Office en `output_path` sustituyendo las partes indicadas.
///
/// Las partes sin reemplazo se copian en crudo, con sus bytes comprimidos
/// intactos. Los reemplazos cuyo nombre no existe en el paquete se añaden al final.
pub(crate) fn rewrite_package<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    output_path: &Path,
    replacements: &BTreeMap<String, Vec<u8>>,
) -> SyncResult<()> {
    let target_file =
        File::create(output_path).map_err(|e| SyncError::io(output_path, e))?;
    let mut writer = ZipWriter::new(target_file);
    let mut pending: BTreeMap<&str, &[u8]> = replacements
        .iter()
        .map(|(name, data)| (name.as_str(), data.as_slice()))
        .collect();

    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        let name = file.name().to_string();

        let Some(data) = pending.remove(name.as_str()) else {
            writer.raw_copy_file(file)?;
            continue;
        };

        let mut options = FileOptions::<'_, ()>::default().compression_method(file.compression());
        if let Some(mode) = file.unix_mode() {
            options = options.unix_permissions(mode);
        }
        if let Some(time) = file.last_modified() {
            options = options.last_modified_time(time);
        }
        drop(file);

        writer.start_file(name.as_str(), options)?;
        writer
            .write_all(data)
            .map_err(|e| SyncError::io(output_path, e))?;
    }

    let options = FileOptions::<'_, ()>::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in pending {
        writer.start_file(name, options)?;
        writer
            .write_all(data)
            .map_err(|e| SyncError::io(output_path, e))?;
    }

    writer.finish()?;
    Ok(())
}
