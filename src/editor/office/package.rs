//! Localización y registro de las partes de propiedades dentro del paquete.

use log::debug;
use std::collections::BTreeMap;
use std::io::{Read, Seek};
use xmltree::Element;
use zip::ZipArchive;

use crate::editor::constants::{
    APP_CONTENT_TYPE, APP_PROPERTIES_EMPTY, APP_REL_TYPE, CONTENT_TYPES_PART, CORE_CONTENT_TYPE,
    CORE_PROPERTIES_EMPTY, CORE_REL_TYPE, DEFAULT_APP_PART, DEFAULT_CORE_PART, PACKAGE_RELS_PART,
};
use crate::error::{SyncError, SyncResult};
use crate::properties::{DocumentProperties, ModernPart, PropertyKey, PropertyMap};

use super::archive::read_part;
use super::fields::{FieldSpec, app_field_spec, core_field_spec, patch_fields, read_fields};
use super::xml::{child_elements, parse_part, push_child, write_part};

const RELATIONSHIPS_EMPTY: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\"/>\n";

/// Una parte de propiedades: su nombre en el ZIP, sus bytes y los cambios pendientes.
struct PartSlot {
    name: String,
    part: ModernPart,
    /// La relación del paquete ya apunta a esta parte.
    linked: bool,
    /// `None` si la parte no existe y habrá que generarla desde la plantilla.
    contents: Option<Vec<u8>>,
    /// Valores actuales por etiqueta del catálogo.
    values: BTreeMap<&'static str, String>,
    updates: Vec<(FieldSpec<'static>, String)>,
}

impl PartSlot {
    fn template(&self) -> &'static str {
        match self.part {
            ModernPart::Core => CORE_PROPERTIES_EMPTY,
            ModernPart::App => APP_PROPERTIES_EMPTY,
        }
    }

    fn patched(&self) -> SyncResult<Vec<u8>> {
        let source = self
            .contents
            .as_deref()
            .unwrap_or_else(|| self.template().as_bytes());
        let updates: Vec<(FieldSpec<'static>, &str)> = self
            .updates
            .iter()
            .map(|(spec, value)| (*spec, value.as_str()))
            .collect();
        patch_fields(&self.name, source, &updates)
    }
}

/// Vista mutable de las partes `core` y `app` de un paquete Office.
pub(crate) struct PropertyPackage {
    core: PartSlot,
    app: PartSlot,
    relationships: Option<Element>,
}

impl PropertyPackage {
    pub(crate) fn load<R: Read + Seek>(archive: &mut ZipArchive<R>) -> SyncResult<Self> {
        let relationships = read_part(archive, PACKAGE_RELS_PART)?
            .map(|contents| parse_part(PACKAGE_RELS_PART, &contents))
            .transpose()?;

        let core = load_slot(
            archive,
            relationships.as_ref(),
            ModernPart::Core,
            CORE_REL_TYPE,
            DEFAULT_CORE_PART,
        )?;
        let app = load_slot(
            archive,
            relationships.as_ref(),
            ModernPart::App,
            APP_REL_TYPE,
            DEFAULT_APP_PART,
        )?;

        Ok(Self {
            core,
            app,
            relationships,
        })
    }

    fn slot_mut(&mut self, part: ModernPart) -> &mut PartSlot {
        match part {
            ModernPart::Core => &mut self.core,
            ModernPart::App => &mut self.app,
        }
    }

    fn get(&self, key: PropertyKey) -> Option<&str> {
        let field = key.modern_field()?;
        let slot = match field.part {
            ModernPart::Core => &self.core,
            ModernPart::App => &self.app,
        };
        slot.values.get(field.tag).map(String::as_str)
    }

    pub(crate) fn to_document_properties(&self) -> DocumentProperties {
        PropertyKey::ALL
            .into_iter()
            .filter_map(|key| self.get(key).map(|value| (key, value)))
            .collect()
    }

    /// Registra los valores del mapa y devuelve las claves que realmente cambian.
    pub(crate) fn apply(&mut self, properties: &PropertyMap) -> SyncResult<Vec<PropertyKey>> {
        let mut changed = Vec::new();
        for (key, value) in properties.iter() {
            let Some(field) = key.modern_field() else {
                continue;
            };
            let Some(spec) = lookup(field.part, field.tag) else {
                continue;
            };
            if self.get(key) == Some(value) {
                continue;
            }

            let slot = self.slot_mut(field.part);
            slot.updates.push((spec, value.to_string()));
            slot.values.insert(field.tag, value.to_string());
            debug!("{key} → {value:?}");
            changed.push(key);
        }
        Ok(changed)
    }

    /// Serializa las partes modificadas y, si se generaron partes nuevas,
    /// actualiza `[Content_Types].xml` y `_rels/.rels` para registrarlas.
    pub(crate) fn into_replacements<R: Read + Seek>(
        self,
        archive: &mut ZipArchive<R>,
    ) -> SyncResult<BTreeMap<String, Vec<u8>>> {
        let mut replacements = BTreeMap::new();
        let mut content_types: Option<Element> = None;
        let mut relationships = self.relationships;
        let mut relationships_dirty = false;

        for (slot, rel_type, content_type) in [
            (&self.core, CORE_REL_TYPE, CORE_CONTENT_TYPE),
            (&self.app, APP_REL_TYPE, APP_CONTENT_TYPE),
        ] {
            if slot.updates.is_empty() {
                continue;
            }
            replacements.insert(slot.name.clone(), slot.patched()?);

            if slot.contents.is_some() {
                continue;
            }

            if content_types.is_none() {
                let contents = read_part(archive, CONTENT_TYPES_PART)?.ok_or_else(|| {
                    SyncError::xml(CONTENT_TYPES_PART, "la parte no existe en el paquete")
                })?;
                content_types = Some(parse_part(CONTENT_TYPES_PART, &contents)?);
            }
            if let Some(types) = content_types.as_mut() {
                ensure_override(types, &slot.name, content_type);
            }

            if !slot.linked {
                if relationships.is_none() {
                    relationships = Some(parse_part(
                        PACKAGE_RELS_PART,
                        RELATIONSHIPS_EMPTY.as_bytes(),
                    )?);
                }
                if let Some(rels) = relationships.as_mut() {
                    add_relationship(rels, rel_type, &slot.name);
                    relationships_dirty = true;
                }
            }
        }

        if let Some(types) = content_types {
            replacements.insert(
                CONTENT_TYPES_PART.to_string(),
                write_part(CONTENT_TYPES_PART, &types)?,
            );
        }
        if let (true, Some(rels)) = (relationships_dirty, relationships) {
            replacements.insert(
                PACKAGE_RELS_PART.to_string(),
                write_part(PACKAGE_RELS_PART, &rels)?,
            );
        }

        Ok(replacements)
    }
}

fn lookup(part: ModernPart, tag: &str) -> Option<FieldSpec<'static>> {
    match part {
        ModernPart::Core => core_field_spec(tag),
        ModernPart::App => app_field_spec(tag),
    }
}

fn load_slot<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    relationships: Option<&Element>,
    part: ModernPart,
    rel_type: &str,
    default_name: &str,
) -> SyncResult<PartSlot> {
    let target = relationships.and_then(|rels| relationship_target(rels, rel_type));
    let linked = target.is_some();
    let name = target.unwrap_or_else(|| default_name.to_string());
    let contents = read_part(archive, &name)?;

    let tags: Vec<&'static str> = PropertyKey::ALL
        .into_iter()
        .filter_map(|key| key.modern_field())
        .filter(|field| field.part == part)
        .map(|field| field.tag)
        .collect();
    let specs: Vec<FieldSpec<'static>> =
        tags.iter().filter_map(|tag| lookup(part, tag)).collect();

    let mut values = BTreeMap::new();
    if let Some(contents) = contents.as_deref() {
        let found = read_fields(&name, contents, &specs)?;
        for (tag, value) in tags.into_iter().zip(found) {
            if let Some(value) = value {
                values.insert(tag, value);
            }
        }
    }

    Ok(PartSlot {
        name,
        part,
        linked,
        contents,
        values,
        updates: Vec::new(),
    })
}

/// Nombre de la parte a la que apunta la relación de tipo `rel_type`.
fn relationship_target(rels: &Element, rel_type: &str) -> Option<String> {
    child_elements(rels, "Relationship")
        .filter(|rel| rel.attributes.get("TargetMode").map(String::as_str) != Some("External"))
        .find(|rel| rel.attributes.get("Type").map(String::as_str) == Some(rel_type))
        .and_then(|rel| rel.attributes.get("Target"))
        .map(|target| target.trim_start_matches('/').to_string())
}

fn ensure_override(types: &mut Element, part_name: &str, content_type: &str) {
    let part_name = format!("/{part_name}");
    let registered = child_elements(types, "Override").any(|item| {
        item.attributes
            .get("PartName")
            .is_some_and(|name| name.eq_ignore_ascii_case(&part_name))
    });
    if registered {
        return;
    }

    push_child(
        types,
        "Override",
        &[("PartName", part_name.as_str()), ("ContentType", content_type)],
    );
}

fn add_relationship(rels: &mut Element, rel_type: &str, target: &str) {
    let taken: Vec<String> = child_elements(rels, "Relationship")
        .filter_map(|rel| rel.attributes.get("Id").cloned())
        .collect();
    let id = (1..)
        .map(|n| format!("rId{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| "rIdProps".to_string());

    push_child(
        rels,
        "Relationship",
        &[("Id", id.as_str()), ("Type", rel_type), ("Target", target)],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="/props/core.xml"/></Relationships>"#;

    #[test]
    fn relationship_targets_are_resolved() -> Result<(), Box<dyn std::error::Error>> {
        let rels = parse_part(PACKAGE_RELS_PART, RELS.as_bytes())?;

        assert_eq!(
            relationship_target(&rels, CORE_REL_TYPE).as_deref(),
            Some("props/core.xml")
        );
        assert_eq!(relationship_target(&rels, APP_REL_TYPE), None);
        Ok(())
    }

    #[test]
    fn new_relationship_gets_a_free_id() -> Result<(), Box<dyn std::error::Error>> {
        let mut rels = parse_part(PACKAGE_RELS_PART, RELS.as_bytes())?;
        add_relationship(&mut rels, APP_REL_TYPE, DEFAULT_APP_PART);

        let app = child_elements(&rels, "Relationship")
            .find(|rel| rel.attributes.get("Type").map(String::as_str) == Some(APP_REL_TYPE))
            .expect("relación añadida");
        assert_eq!(app.attributes.get("Id").map(String::as_str), Some("rId3"));
        assert_eq!(
            relationship_target(&rels, APP_REL_TYPE).as_deref(),
            Some(DEFAULT_APP_PART)
        );
        Ok(())
    }

    #[test]
    fn override_is_registered_once() -> Result<(), Box<dyn std::error::Error>> {
        let mut types = parse_part(
            CONTENT_TYPES_PART,
            br#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#,
        )?;

        ensure_override(&mut types, DEFAULT_CORE_PART, CORE_CONTENT_TYPE);
        ensure_override(&mut types, DEFAULT_CORE_PART, CORE_CONTENT_TYPE);

        let overrides: Vec<_> = child_elements(&types, "Override").collect();
        assert_eq!(overrides.len(), 1);
        assert_eq!(
            overrides[0].attributes.get("PartName").map(String::as_str),
            Some("/docProps/core.xml")
        );
        Ok(())
    }
}
