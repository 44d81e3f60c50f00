//! Lectura y parcheo de campos en `core.xml` y `app.xml`.
//!
//! Las partes se recorren como flujo de eventos: solo se sustituye el texto de
//! los campos pedidos y el resto del marcado se reemite tal cual, con sus
//! atributos cualificados (`xsi:type`...) y declaraciones de namespace.

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

use crate::editor::constants::{APP_NS, CP_NS, DC_NS};
use crate::error::{SyncError, SyncResult};

/// Describe la información necesaria para localizar un campo hijo de la raíz.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FieldSpec<'a> {
    /// Prefijo preferido si hay que declarar el namespace al insertar.
    pub(crate) prefix: Option<&'a str>,
    pub(crate) local_name: &'a str,
    pub(crate) namespace: &'a str,
}

/// Obtiene el campo correspondiente en `core.xml` a partir de su etiqueta declarada.
pub(crate) fn core_field_spec(tag: &str) -> Option<FieldSpec<'static>> {
    let (prefix, local_name, namespace) = match tag {
        "dc:title" => ("dc", "title", DC_NS),
        "dc:subject" => ("dc", "subject", DC_NS),
        "dc:creator" => ("dc", "creator", DC_NS),
        "dc:description" => ("dc", "description", DC_NS),
        "cp:keywords" => ("cp", "keywords", CP_NS),
        "cp:category" => ("cp", "category", CP_NS),
        "cp:lastModifiedBy" => ("cp", "lastModifiedBy", CP_NS),
        _ => return None,
    };
    Some(FieldSpec {
        prefix: Some(prefix),
        local_name,
        namespace,
    })
}

/// Obtiene el campo correspondiente en `app.xml` a partir de su etiqueta declarada.
pub(crate) fn app_field_spec(tag: &str) -> Option<FieldSpec<'static>> {
    let local_name = match tag {
        "Company" => "Company",
        "Manager" => "Manager",
        _ => return None,
    };
    Some(FieldSpec {
        prefix: None,
        local_name,
        namespace: APP_NS,
    })
}

fn matching_field(
    specs: impl Iterator<Item = (usize, FieldSpec<'static>)>,
    namespace: &ResolveResult<'_>,
    local_name: &[u8],
) -> Option<usize> {
    let ResolveResult::Bound(Namespace(uri)) = namespace else {
        return None;
    };
    specs
        .filter(|(_, spec)| spec.namespace.as_bytes() == *uri)
        .find(|(_, spec)| spec.local_name.as_bytes() == local_name)
        .map(|(index, _)| index)
}

/// Valor de cada campo de `specs` (en el mismo orden); `None` si el elemento no existe.
///
/// Solo cuenta la primera aparición de cada campo entre los hijos directos de la raíz.
pub(crate) fn read_fields(
    part: &str,
    contents: &[u8],
    specs: &[FieldSpec<'static>],
) -> SyncResult<Vec<Option<String>>> {
    let mut reader = NsReader::from_reader(contents);
    let mut values: Vec<Option<String>> = vec![None; specs.len()];
    let mut depth = 0_usize;
    let mut current: Option<usize> = None;

    loop {
        let (namespace, event) = reader
            .read_resolved_event()
            .map_err(|e| SyncError::xml(part, e))?;
        match event {
            Event::Start(start) => {
                depth += 1;
                if depth == 2 {
                    current = matching_field(
                        specs.iter().copied().enumerate(),
                        &namespace,
                        start.local_name().as_ref(),
                    )
                    .filter(|index| values[*index].is_none());
                    if let Some(index) = current {
                        values[index] = Some(String::new());
                    }
                }
            }
            Event::Empty(start) if depth == 1 => {
                if let Some(index) = matching_field(
                    specs.iter().copied().enumerate(),
                    &namespace,
                    start.local_name().as_ref(),
                ) {
                    values[index].get_or_insert_with(String::new);
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    current = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(text) if depth == 2 => {
                if let Some(value) = current.and_then(|index| values[index].as_mut()) {
                    value.push_str(&text.unescape().map_err(|e| SyncError::xml(part, e))?);
                }
            }
            Event::CData(data) if depth == 2 => {
                if let Some(value) = current.and_then(|index| values[index].as_mut()) {
                    value.push_str(&String::from_utf8_lossy(data.as_ref()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(values)
}

/// Reemite `contents` sustituyendo el texto de los campos de `updates`.
///
/// Los campos que no existen se añaden al final de la raíz, con el prefijo que
/// la raíz ya declara para su namespace o con una declaración propia.
pub(crate) fn patch_fields(
    part: &str,
    contents: &[u8],
    updates: &[(FieldSpec<'static>, &str)],
) -> SyncResult<Vec<u8>> {
    let mut reader = NsReader::from_reader(contents);
    let mut writer = Writer::new(Vec::with_capacity(contents.len() + 256));
    let mut applied = vec![false; updates.len()];
    let mut declared: Vec<(Option<String>, String)> = Vec::new();
    let mut depth = 0_usize;
    // Dentro de un campo sustituido: su contenido original se descarta.
    let mut replacing = false;

    let pending = |applied: &[bool]| {
        updates
            .iter()
            .enumerate()
            .filter(|(index, _)| !applied[*index])
            .map(|(index, (spec, _))| (index, *spec))
            .collect::<Vec<_>>()
    };

    loop {
        let (namespace, event) = reader
            .read_resolved_event()
            .map_err(|e| SyncError::xml(part, e))?;
        match event {
            Event::Eof => break,
            Event::Start(start) => {
                depth += 1;
                if replacing {
                    continue;
                }
                if depth == 1 {
                    declared = namespace_declarations(&start);
                } else if depth == 2
                    && let Some(index) = matching_field(
                        pending(&applied).into_iter(),
                        &namespace,
                        start.local_name().as_ref(),
                    )
                {
                    applied[index] = true;
                    replacing = true;
                    emit(&mut writer, part, Event::Start(start))?;
                    emit(&mut writer, part, Event::Text(BytesText::new(updates[index].1)))?;
                    continue;
                }
                emit(&mut writer, part, Event::Start(start))?;
            }
            Event::Empty(start) => {
                if replacing {
                    continue;
                }
                let index = if depth == 1 {
                    matching_field(
                        pending(&applied).into_iter(),
                        &namespace,
                        start.local_name().as_ref(),
                    )
                } else {
                    None
                };
                if depth == 0 {
                    // Raíz autocerrada, como en las plantillas de partes nuevas.
                    declared = namespace_declarations(&start);
                    let end = end_for(&start);
                    emit(&mut writer, part, Event::Start(start))?;
                    write_missing(&mut writer, part, updates, &mut applied, &declared)?;
                    emit(&mut writer, part, Event::End(end))?;
                } else if let Some(index) = index {
                    applied[index] = true;
                    let end = end_for(&start);
                    emit(&mut writer, part, Event::Start(start))?;
                    emit(&mut writer, part, Event::Text(BytesText::new(updates[index].1)))?;
                    emit(&mut writer, part, Event::End(end))?;
                } else {
                    emit(&mut writer, part, Event::Empty(start))?;
                }
            }
            Event::End(end) => {
                if replacing {
                    if depth == 2 {
                        replacing = false;
                        emit(&mut writer, part, Event::End(end))?;
                    }
                    depth = depth.saturating_sub(1);
                    continue;
                }
                if depth == 1 {
                    write_missing(&mut writer, part, updates, &mut applied, &declared)?;
                }
                depth = depth.saturating_sub(1);
                emit(&mut writer, part, Event::End(end))?;
            }
            other => {
                if !replacing {
                    emit(&mut writer, part, other)?;
                }
            }
        }
    }

    Ok(writer.into_inner())
}

fn emit(writer: &mut Writer<Vec<u8>>, part: &str, event: Event<'_>) -> SyncResult<()> {
    writer
        .write_event(event)
        .map_err(|e| SyncError::xml(part, e))
}

fn end_for(start: &BytesStart<'_>) -> BytesEnd<'static> {
    BytesEnd::new(String::from_utf8_lossy(start.name().as_ref()).into_owned())
}

/// Declaraciones `xmlns` / `xmlns:p` de un elemento como `(prefijo, uri)`.
fn namespace_declarations(start: &BytesStart<'_>) -> Vec<(Option<String>, String)> {
    start
        .attributes()
        .flatten()
        .filter_map(|attr| {
            let key = attr.key.as_ref();
            let uri = String::from_utf8_lossy(&attr.value).into_owned();
            if key == b"xmlns" {
                Some((None, uri))
            } else {
                key.strip_prefix(b"xmlns:")
                    .map(|prefix| (Some(String::from_utf8_lossy(prefix).into_owned()), uri))
            }
        })
        .collect()
}

fn write_missing(
    writer: &mut Writer<Vec<u8>>,
    part: &str,
    updates: &[(FieldSpec<'static>, &str)],
    applied: &mut [bool],
    declared: &[(Option<String>, String)],
) -> SyncResult<()> {
    for (index, (spec, value)) in updates.iter().enumerate() {
        if applied[index] {
            continue;
        }
        applied[index] = true;

        let bound = declared
            .iter()
            .find(|(_, uri)| uri == spec.namespace)
            .map(|(prefix, _)| prefix.as_deref());

        let (name, declaration) = match (bound, spec.prefix) {
            (Some(Some(prefix)), _) => (format!("{prefix}:{}", spec.local_name), None),
            (Some(None), _) => (spec.local_name.to_string(), None),
            (None, Some(prefix)) => (
                format!("{prefix}:{}", spec.local_name),
                Some(format!("xmlns:{prefix}")),
            ),
            (None, None) => (spec.local_name.to_string(), Some("xmlns".to_string())),
        };

        let mut start = BytesStart::new(name.as_str());
        if let Some(attribute) = &declaration {
            start.push_attribute((attribute.as_str(), spec.namespace));
        }
        emit(writer, part, Event::Start(start))?;
        emit(writer, part, Event::Text(BytesText::new(value)))?;
        emit(writer, part, Event::End(BytesEnd::new(name.as_str())))?;
    }
    Ok(())
}
