//! Partes de infraestructura del paquete (`[Content_Types].xml`, `_rels/.rels`).

use std::io::Cursor;

use xmltree::{Element, EmitterConfig, XMLNode};

use crate::error::{SyncError, SyncResult};

pub(crate) fn parse_part(part: &str, contents: &[u8]) -> SyncResult<Element> {
    Element::parse(Cursor::new(contents)).map_err(|e| SyncError::xml(part, e))
}

pub(crate) fn write_part(part: &str, root: &Element) -> SyncResult<Vec<u8>> {
    let mut output = Vec::new();
    let mut config = EmitterConfig::new();
    config.perform_indent = false;
    config.write_document_declaration = true;
    root.write_with_config(&mut output, config)
        .map_err(|e| SyncError::xml(part, e))?;
    Ok(output)
}

/// Hijos directos de `parent` con nombre local `name`.
pub(crate) fn child_elements<'a>(
    parent: &'a Element,
    name: &'a str,
) -> impl Iterator<Item = &'a Element> + 'a {
    parent.children.iter().filter_map(move |node| match node {
        XMLNode::Element(child) if child.name == name => Some(child),
        _ => None,
    })
}

/// Añade un elemento vacío con los atributos dados, en el namespace del padre.
pub(crate) fn push_child(parent: &mut Element, name: &str, attributes: &[(&str, &str)]) {
    let mut child = Element::new(name);
    child.namespace = parent.namespace.clone();
    for (key, value) in attributes {
        child.attributes.insert(key.to_string(), value.to_string());
    }
    parent.children.push(XMLNode::Element(child));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_part_keeps_declaration_and_children() -> Result<(), Box<dyn std::error::Error>> {
        let mut root = parse_part(
            "[Content_Types].xml",
            br#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#,
        )?;
        push_child(
            &mut root,
            "Override",
            &[("PartName", "/docProps/app.xml"), ("ContentType", "x")],
        );

        let written = String::from_utf8(write_part("[Content_Types].xml", &root)?)?;
        assert!(written.starts_with("<?xml"));
        assert_eq!(child_elements(&root, "Default").count(), 1);
        assert!(written.contains(r#"PartName="/docProps/app.xml""#));
        Ok(())
    }

    #[test]
    fn malformed_part_is_an_error() {
        let result = parse_part("_rels/.rels", b"<Relationships><sin cerrar");
        assert!(matches!(result, Err(SyncError::Xml { .. })));
    }
}
