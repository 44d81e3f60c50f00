//! Carga del archivo de configuración `excelProperties.xml`.
//!
//! ```xml
//! <Configuration>
//!   <Directory>/ruta/a/los/libros</Directory>
//!   <MaxDepth>5</MaxDepth>
//!   <Properties>
//!     <Property name="Title">Informe Q1</Property>
//!   </Properties>
//! </Configuration>
//! ```

use log::warn;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use xmltree::{Element, XMLNode};

use crate::error::ConfigError;
use crate::properties::{PropertyKey, PropertyMap};
use crate::walker::DEFAULT_MAX_DEPTH;

pub const DEFAULT_CONFIG_FILE: &str = "excelProperties.xml";

const ROOT_ELEMENT: &str = "Configuration";
const DIRECTORY_ELEMENT: &str = "Directory";
const MAX_DEPTH_ELEMENT: &str = "MaxDepth";
const PROPERTIES_ELEMENT: &str = "Properties";
const PROPERTY_ELEMENT: &str = "Property";
const NAME_ATTRIBUTE: &str = "name";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    pub root: PathBuf,
    pub max_depth: usize,
    pub properties: PropertyMap,
}

impl SyncConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &[u8]) -> Result<Self, ConfigError> {
        let document = Element::parse(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if document.name != ROOT_ELEMENT {
            return Err(ConfigError::MissingElement(ROOT_ELEMENT));
        }

        let root = document
            .get_child(DIRECTORY_ELEMENT)
            .map(|element| element_text(element).trim().to_string())
            .filter(|directory| !directory.is_empty())
            .ok_or(ConfigError::MissingElement(DIRECTORY_ELEMENT))?;

        let max_depth = match document.get_child(MAX_DEPTH_ELEMENT).map(element_text) {
            Some(raw) => parse_max_depth(raw.trim())?,
            None => DEFAULT_MAX_DEPTH,
        };

        let mut properties = PropertyMap::new();
        if let Some(list) = document.get_child(PROPERTIES_ELEMENT) {
            let entries = list
                .children
                .iter()
                .filter_map(XMLNode::as_element)
                .filter(|element| element.name == PROPERTY_ELEMENT);

            for entry in entries {
                let Some(name) = entry.attributes.get(NAME_ATTRIBUTE) else {
                    warn!("<Property> sin atributo name; se ignora");
                    continue;
                };
                let Some(key) = PropertyKey::from_label(name) else {
                    warn!("Propiedad desconocida {name:?} en la configuración; se ignora");
                    continue;
                };
                // Valor literal, sin recortar. La última aparición de un nombre repetido prevalece.
                properties.insert(key, element_text(entry));
            }
        }

        Ok(Self {
            root: PathBuf::from(root),
            max_depth,
            properties,
        })
    }
}

/// Ruta por defecto: `excelProperties.xml` en el directorio de trabajo.
pub fn default_config_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join(DEFAULT_CONFIG_FILE))
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
}

fn parse_max_depth(raw: &str) -> Result<usize, ConfigError> {
    match raw.parse::<usize>() {
        Ok(depth) if depth > 0 => Ok(depth),
        _ => Err(ConfigError::InvalidMaxDepth(raw.to_string())),
    }
}

/// Texto y CDATA del elemento, tal cual.
fn element_text(element: &Element) -> String {
    let mut text = String::new();
    for node in &element.children {
        match node {
            XMLNode::Text(value) | XMLNode::CData(value) => text.push_str(value),
            _ => {}
        }
    }
    text
}
