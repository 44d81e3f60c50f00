//! Catálogo fijo de propiedades de documento y su ubicación en cada formato.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Identificadores de propiedad dentro de `\u{5}SummaryInformation`.
pub const PID_TITLE: u32 = 2;
pub const PID_SUBJECT: u32 = 3;
pub const PID_AUTHOR: u32 = 4;
pub const PID_KEYWORDS: u32 = 5;
pub const PID_COMMENTS: u32 = 6;
pub const PID_LAST_AUTHOR: u32 = 8;

/// Identificadores de propiedad dentro de `\u{5}DocumentSummaryInformation`.
pub const PID_CATEGORY: u32 = 2;
pub const PID_MANAGER: u32 = 14;
pub const PID_COMPANY: u32 = 15;

/// Propiedades semánticas que se pueden reescribir.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PropertyKey {
    Title,
    Subject,
    Keywords,
    Category,
    Description,
    Creator,
    LastModifiedBy,
    Company,
    Manager,
}

/// Conjunto de propiedades OLE que aloja un campo del formato binario.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LegacySet {
    Summary,
    DocumentSummary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LegacyField {
    pub set: LegacySet,
    pub id: u32,
}

/// Parte XML del paquete que aloja un campo del formato ZIP.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModernPart {
    Core,
    App,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModernField {
    pub part: ModernPart,
    /// Etiqueta cualificada tal como aparece en la parte (`dc:title`, `Company`...).
    pub tag: &'static str,
}

/// Fila del catálogo: etiqueta externa y destino en cada formato.
#[derive(Debug)]
pub struct CatalogEntry {
    pub key: PropertyKey,
    pub label: &'static str,
    pub legacy: Option<LegacyField>,
    pub modern: Option<ModernField>,
}

const fn legacy(set: LegacySet, id: u32) -> Option<LegacyField> {
    Some(LegacyField { set, id })
}

const fn modern(part: ModernPart, tag: &'static str) -> Option<ModernField> {
    Some(ModernField { part, tag })
}

pub static CATALOG: [CatalogEntry; 9] = [
    CatalogEntry {
        key: PropertyKey::Title,
        label: "Title",
        legacy: legacy(LegacySet::Summary, PID_TITLE),
        modern: modern(ModernPart::Core, "dc:title"),
    },
    CatalogEntry {
        key: PropertyKey::Subject,
        label: "Subject",
        legacy: legacy(LegacySet::Summary, PID_SUBJECT),
        modern: modern(ModernPart::Core, "dc:subject"),
    },
    CatalogEntry {
        key: PropertyKey::Keywords,
        label: "Keywords",
        legacy: legacy(LegacySet::Summary, PID_KEYWORDS),
        modern: modern(ModernPart::Core, "cp:keywords"),
    },
    CatalogEntry {
        key: PropertyKey::Category,
        label: "Category",
        legacy: legacy(LegacySet::DocumentSummary, PID_CATEGORY),
        modern: modern(ModernPart::Core, "cp:category"),
    },
    CatalogEntry {
        key: PropertyKey::Description,
        label: "Description",
        legacy: legacy(LegacySet::Summary, PID_COMMENTS),
        modern: modern(ModernPart::Core, "dc:description"),
    },
    CatalogEntry {
        key: PropertyKey::Creator,
        label: "Creator",
        legacy: legacy(LegacySet::Summary, PID_AUTHOR),
        modern: modern(ModernPart::Core, "dc:creator"),
    },
    CatalogEntry {
        key: PropertyKey::LastModifiedBy,
        label: "lastModifiedByUser",
        legacy: legacy(LegacySet::Summary, PID_LAST_AUTHOR),
        modern: modern(ModernPart::Core, "cp:lastModifiedBy"),
    },
    CatalogEntry {
        key: PropertyKey::Company,
        label: "Company",
        legacy: legacy(LegacySet::DocumentSummary, PID_COMPANY),
        modern: modern(ModernPart::App, "Company"),
    },
    CatalogEntry {
        key: PropertyKey::Manager,
        label: "Manager",
        legacy: legacy(LegacySet::DocumentSummary, PID_MANAGER),
        modern: modern(ModernPart::App, "Manager"),
    },
];

impl PropertyKey {
    pub const ALL: [PropertyKey; 9] = [
        PropertyKey::Title,
        PropertyKey::Subject,
        PropertyKey::Keywords,
        PropertyKey::Category,
        PropertyKey::Description,
        PropertyKey::Creator,
        PropertyKey::LastModifiedBy,
        PropertyKey::Company,
        PropertyKey::Manager,
    ];

    /// Busca la clave correspondiente a una etiqueta de configuración (sensible a mayúsculas).
    pub fn from_label(label: &str) -> Option<Self> {
        CATALOG
            .iter()
            .find(|entry| entry.label == label)
            .map(|entry| entry.key)
    }

    pub fn entry(self) -> &'static CatalogEntry {
        // El catálogo sigue el orden de declaración del enum.
        &CATALOG[self as usize]
    }

    pub fn label(self) -> &'static str {
        self.entry().label
    }

    pub fn legacy_field(self) -> Option<LegacyField> {
        self.entry().legacy
    }

    pub fn modern_field(self) -> Option<ModernField> {
        self.entry().modern
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Valores deseados por propiedad. Solo lectura una vez construido.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PropertyMap {
    values: BTreeMap<PropertyKey, String>,
}

/// Valores actuales leídos de un documento; las propiedades ausentes se omiten.
pub type DocumentProperties = PropertyMap;

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserta o reemplaza un valor; la última asignación prevalece.
    pub fn insert(&mut self, key: PropertyKey, value: impl Into<String>) -> Option<String> {
        self.values.insert(key, value.into())
    }

    pub fn get(&self, key: PropertyKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PropertyKey, &str)> {
        self.values.iter().map(|(key, value)| (*key, value.as_str()))
    }

    /// Claves cuyo valor deseado difiere del valor actual de `current`.
    pub fn pending_changes(&self, current: &DocumentProperties) -> Vec<PropertyKey> {
        self.iter()
            .filter(|(key, value)| current.get(*key) != Some(*value))
            .map(|(key, _)| key)
            .collect()
    }
}

impl<V: Into<String>> FromIterator<(PropertyKey, V)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (PropertyKey, V)>>(iter: I) -> Self {
        let mut map = PropertyMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}
