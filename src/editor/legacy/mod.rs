//! Metadata de libros `.xls` almacenada en los conjuntos de propiedades del
//! contenedor compuesto OLE.

mod codepage;
mod property_set;

use cfb::CompoundFile;
use log::debug;
use std::fs;
use std::io::{Read, Seek, Write};
use std::path::Path;

use crate::editor::constants::{
    DOCUMENT_SUMMARY_STREAM, FMTID_DOCUMENT_SUMMARY, FMTID_SUMMARY, SUMMARY_STREAM,
};
use crate::editor::utils::TempSibling;
use crate::editor::ApplyOutcome;
use crate::error::{SyncError, SyncResult};
use crate::properties::{DocumentProperties, LegacySet, PropertyKey, PropertyMap};

pub(crate) use property_set::PropertySetStream;

/// Los dos conjuntos de propiedades estándar de un documento OLE.
pub(crate) struct LegacyPropertySets {
    pub(crate) summary: PropertySetStream,
    pub(crate) document_summary: PropertySetStream,
}

impl LegacyPropertySets {
    fn load<F: Read + Seek>(compound: &mut CompoundFile<F>) -> SyncResult<Self> {
        Ok(Self {
            summary: read_property_set(compound, SUMMARY_STREAM)?,
            document_summary: read_property_set(compound, DOCUMENT_SUMMARY_STREAM)?,
        })
    }

    fn stream_for(&mut self, set: LegacySet) -> (&mut PropertySetStream, &'static [u8; 16]) {
        match set {
            LegacySet::Summary => (&mut self.summary, &FMTID_SUMMARY),
            LegacySet::DocumentSummary => (&mut self.document_summary, &FMTID_DOCUMENT_SUMMARY),
        }
    }

    fn get(&self, key: PropertyKey) -> Option<String> {
        let field = key.legacy_field()?;
        match field.set {
            LegacySet::Summary => self.summary.get_string(&FMTID_SUMMARY, field.id),
            LegacySet::DocumentSummary => self
                .document_summary
                .get_string(&FMTID_DOCUMENT_SUMMARY, field.id),
        }
    }

    pub(crate) fn to_document_properties(&self) -> DocumentProperties {
        PropertyKey::ALL
            .into_iter()
            .filter_map(|key| self.get(key).map(|value| (key, value)))
            .collect()
    }

    /// Aplica los valores del mapa y devuelve las claves que realmente cambiaron.
    pub(crate) fn apply(&mut self, properties: &PropertyMap) -> SyncResult<Vec<PropertyKey>> {
        let mut changed = Vec::new();
        for (key, value) in properties.iter() {
            let Some(field) = key.legacy_field() else {
                continue;
            };
            if self.get(key).as_deref() == Some(value) {
                continue;
            }

            let (stream, fmtid) = self.stream_for(field.set);
            stream.set_string(fmtid, field.id, value)?;
            debug!("{key} → {value:?}");
            changed.push(key);
        }
        Ok(changed)
    }
}

fn read_property_set<F: Read + Seek>(
    compound: &mut CompoundFile<F>,
    name: &str,
) -> SyncResult<PropertySetStream> {
    let stream_path = format!("/{name}");
    if !compound.is_stream(&stream_path) {
        return Err(SyncError::MissingStream(name.trim_start_matches('\u{5}').to_string()));
    }

    let mut data = Vec::new();
    compound
        .open_stream(&stream_path)
        .and_then(|mut stream| stream.read_to_end(&mut data))
        .map_err(|e| SyncError::io(stream_path.as_str(), e))?;

    PropertySetStream::parse(&data)
}

fn write_property_set<F: Read + Write + Seek>(
    compound: &mut CompoundFile<F>,
    name: &str,
    set: &PropertySetStream,
) -> SyncResult<()> {
    let stream_path = format!("/{name}");
    let mut stream = compound
        .create_stream(&stream_path)
        .map_err(|e| SyncError::io(stream_path.as_str(), e))?;
    stream
        .write_all(&set.to_bytes())
        .and_then(|()| stream.flush())
        .map_err(|e| SyncError::io(stream_path.as_str(), e))
}

/// Lee los valores actuales de las propiedades del catálogo.
pub fn read_legacy_properties(path: &Path) -> SyncResult<DocumentProperties> {
    let mut compound = cfb::open(path).map_err(|e| SyncError::io(path, e))?;
    let sets = LegacyPropertySets::load(&mut compound)?;
    Ok(sets.to_document_properties())
}

/// Reescribe los conjuntos de propiedades de un `.xls` sin tocar el resto de flujos.
///
/// El contenedor se copia a un temporal hermano, se modifica allí y solo se
/// renombra sobre el original cuando todo se ha volcado a disco.
pub fn apply_legacy_properties(path: &Path, properties: &PropertyMap) -> SyncResult<ApplyOutcome> {
    let mut sets = {
        let mut compound = cfb::open(path).map_err(|e| SyncError::io(path, e))?;
        LegacyPropertySets::load(&mut compound)?
    };

    let changed = sets.apply(properties)?;
    if changed.is_empty() {
        return Ok(ApplyOutcome::Unchanged);
    }

    let temp = TempSibling::for_target(path);
    fs::copy(path, temp.path()).map_err(|e| SyncError::io(temp.path(), e))?;

    {
        let mut compound = cfb::open_rw(temp.path()).map_err(|e| SyncError::io(temp.path(), e))?;
        if sets.summary.is_dirty() {
            write_property_set(&mut compound, SUMMARY_STREAM, &sets.summary)?;
        }
        if sets.document_summary.is_dirty() {
            write_property_set(&mut compound, DOCUMENT_SUMMARY_STREAM, &sets.document_summary)?;
        }
        compound.flush().map_err(|e| SyncError::io(temp.path(), e))?;
    }

    temp.persist(path)?;
    Ok(ApplyOutcome::Updated { changed })
}
