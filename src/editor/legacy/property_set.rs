//! Lectura y escritura de flujos de conjuntos de propiedades OLE ([MS-OLEPS]).
//!
//! Solo se decodifican las propiedades de cadena que el catálogo necesita. El
//! resto de valores se conservan como bytes opacos, y las secciones que no se
//! modifican se vuelven a escribir exactamente como se leyeron.

use crate::editor::constants::{CP_DEFAULT, CP_WINUNICODE, PID_CODEPAGE, VT_I2, VT_LPSTR, VT_LPWSTR};
use crate::error::{SyncError, SyncResult};

use super::codepage::{decode_codepage_string, decode_utf16le, encode_codepage_string};

const HEADER_LEN: usize = 28;
const SECTION_ENTRY_LEN: usize = 20;
const BYTE_ORDER_MARK: u16 = 0xFFFE;
const MAX_PROPERTIES: usize = 1000;

/// Un valor serializado: tipo (4 bytes con relleno) seguido de los datos.
#[derive(Clone, Debug)]
struct Property {
    id: u32,
    raw: Vec<u8>,
}

#[derive(Clone, Debug)]
struct Section {
    fmtid: [u8; 16],
    raw: Vec<u8>,
    properties: Vec<Property>,
    dirty: bool,
}

/// Flujo completo de un conjunto de propiedades (`\u{5}SummaryInformation`...).
#[derive(Clone, Debug)]
pub(crate) struct PropertySetStream {
    /// Orden de bytes, versión, identificador de sistema y CLSID.
    prefix: [u8; 24],
    sections: Vec<Section>,
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn invalid(message: impl Into<String>) -> SyncError {
    SyncError::InvalidPropertySet(message.into())
}

fn pad_to_four(buffer: &mut Vec<u8>) {
    while buffer.len() % 4 != 0 {
        buffer.push(0);
    }
}

impl PropertySetStream {
    pub(crate) fn parse(data: &[u8]) -> SyncResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(invalid("flujo de propiedades demasiado corto"));
        }
        if read_u16(data, 0) != Some(BYTE_ORDER_MARK) {
            return Err(invalid("marca de orden de bytes desconocida"));
        }

        let mut prefix = [0u8; 24];
        prefix.copy_from_slice(&data[..24]);

        let section_count = read_u32(data, 24).unwrap_or(0) as usize;
        if section_count == 0 || HEADER_LEN + section_count * SECTION_ENTRY_LEN > data.len() {
            return Err(invalid("número de secciones inválido"));
        }

        let mut sections = Vec::with_capacity(section_count);
        for index in 0..section_count {
            let entry = HEADER_LEN + index * SECTION_ENTRY_LEN;
            let mut fmtid = [0u8; 16];
            fmtid.copy_from_slice(&data[entry..entry + 16]);
            let offset = read_u32(data, entry + 16).unwrap_or(u32::MAX) as usize;
            sections.push(Section::parse(fmtid, data, offset)?);
        }

        Ok(Self { prefix, sections })
    }

    /// Crea un flujo con una única sección vacía que solo declara su página de códigos.
    #[cfg(test)]
    pub(crate) fn new(fmtid: [u8; 16], codepage: u16) -> Self {
        let mut prefix = [0u8; 24];
        prefix[..2].copy_from_slice(&BYTE_ORDER_MARK.to_le_bytes());
        // Sistema: Windows 5.1
        prefix[4..8].copy_from_slice(&0x0002_0105u32.to_le_bytes());

        let mut codepage_raw = Vec::with_capacity(8);
        codepage_raw.extend_from_slice(&(VT_I2 as u32).to_le_bytes());
        codepage_raw.extend_from_slice(&codepage.to_le_bytes());
        pad_to_four(&mut codepage_raw);

        Self {
            prefix,
            sections: vec![Section {
                fmtid,
                raw: Vec::new(),
                properties: vec![Property {
                    id: PID_CODEPAGE,
                    raw: codepage_raw,
                }],
                dirty: true,
            }],
        }
    }

    /// Añade una sección ya serializada tal cual, sin interpretarla.
    #[cfg(test)]
    pub(crate) fn push_raw_section(&mut self, fmtid: [u8; 16], raw: Vec<u8>) {
        self.sections.push(Section {
            fmtid,
            raw,
            properties: Vec::new(),
            dirty: false,
        });
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.sections.iter().any(|section| section.dirty)
    }

    pub(crate) fn get_string(&self, fmtid: &[u8; 16], id: u32) -> Option<String> {
        self.section(fmtid)?.get_string(id)
    }

    pub(crate) fn set_string(&mut self, fmtid: &[u8; 16], id: u32, value: &str) -> SyncResult<()> {
        let section = self
            .sections
            .iter_mut()
            .find(|section| &section.fmtid == fmtid)
            .ok_or_else(|| invalid("el flujo no contiene la sección esperada"))?;
        section.set_string(id, value);
        Ok(())
    }

    fn section(&self, fmtid: &[u8; 16]) -> Option<&Section> {
        self.sections.iter().find(|section| &section.fmtid == fmtid)
    }

    /// Bytes de la sección `fmtid` tal como se escribirían.
    #[cfg(test)]
    pub(crate) fn section_bytes(&self, fmtid: &[u8; 16]) -> Option<Vec<u8>> {
        self.section(fmtid).map(Section::to_bytes)
    }

    #[cfg(test)]
    pub(crate) fn property_ids(&self, fmtid: &[u8; 16]) -> Vec<u32> {
        self.section(fmtid)
            .map(|section| section.properties.iter().map(|property| property.id).collect())
            .unwrap_or_default()
    }

    /// Tipo y valor serializados de una propiedad, relleno incluido.
    #[cfg(test)]
    pub(crate) fn property_bytes(&self, fmtid: &[u8; 16], id: u32) -> Option<&[u8]> {
        self.section(fmtid)?.property(id)
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let bodies: Vec<Vec<u8>> = self.sections.iter().map(Section::to_bytes).collect();

        let mut out = Vec::new();
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(&(self.sections.len() as u32).to_le_bytes());

        let mut offset = HEADER_LEN + self.sections.len() * SECTION_ENTRY_LEN;
        for (section, body) in self.sections.iter().zip(&bodies) {
            out.extend_from_slice(&section.fmtid);
            out.extend_from_slice(&(offset as u32).to_le_bytes());
            offset += body.len().div_ceil(4) * 4;
        }

        for body in &bodies {
            out.extend_from_slice(body);
            pad_to_four(&mut out);
        }
        out
    }
}

impl Section {
    fn parse(fmtid: [u8; 16], data: &[u8], offset: usize) -> SyncResult<Self> {
        let size = read_u32(data, offset)
            .ok_or_else(|| invalid("desplazamiento de sección fuera del flujo"))?
            as usize;
        let end = offset
            .checked_add(size)
            .filter(|&end| size >= 8 && end <= data.len())
            .ok_or_else(|| invalid("tamaño de sección inválido"))?;
        let raw = data[offset..end].to_vec();

        let count = read_u32(&raw, 4).unwrap_or(0) as usize;
        let table_end = 8 + count * 8;
        if count > MAX_PROPERTIES || table_end > raw.len() {
            return Err(invalid("tabla de propiedades inválida"));
        }

        let mut entries = Vec::with_capacity(count);
        for index in 0..count {
            let at = 8 + index * 8;
            let id = read_u32(&raw, at).unwrap_or(0);
            let value_offset = read_u32(&raw, at + 4).unwrap_or(0) as usize;
            if value_offset < table_end || value_offset >= raw.len() {
                return Err(invalid(format!(
                    "la propiedad {id} apunta fuera de su sección"
                )));
            }
            entries.push((id, value_offset));
        }

        // Cada valor se extiende hasta el siguiente desplazamiento conocido.
        let mut boundaries: Vec<usize> = entries.iter().map(|&(_, at)| at).collect();
        boundaries.push(raw.len());
        boundaries.sort_unstable();
        boundaries.dedup();

        let properties = entries
            .into_iter()
            .map(|(id, start)| {
                let end = boundaries
                    .iter()
                    .copied()
                    .find(|&boundary| boundary > start)
                    .unwrap_or(raw.len());
                Property {
                    id,
                    raw: raw[start..end].to_vec(),
                }
            })
            .collect();

        Ok(Self {
            fmtid,
            raw,
            properties,
            dirty: false,
        })
    }

    fn codepage(&self) -> u32 {
        self.property(PID_CODEPAGE)
            .filter(|raw| read_u16(raw, 0) == Some(VT_I2))
            .and_then(|raw| read_u16(raw, 4))
            .map(u32::from)
            .unwrap_or(CP_DEFAULT)
    }

    fn property(&self, id: u32) -> Option<&[u8]> {
        self.properties
            .iter()
            .find(|property| property.id == id)
            .map(|property| property.raw.as_slice())
    }

    fn get_string(&self, id: u32) -> Option<String> {
        let raw = self.property(id)?;
        let length = read_u32(raw, 4)? as usize;
        match read_u16(raw, 0)? {
            VT_LPSTR => {
                let bytes = raw.get(8..8 + length)?;
                Some(decode_codepage_string(bytes, self.codepage()))
            }
            VT_LPWSTR => {
                let bytes = raw.get(8..8 + length * 2)?;
                Some(decode_utf16le(bytes))
            }
            _ => None,
        }
    }

    fn set_string(&mut self, id: u32, value: &str) {
        let raw = encode_string_value(value, self.codepage());
        match self.properties.iter_mut().find(|property| property.id == id) {
            Some(property) => property.raw = raw,
            None => self.properties.push(Property { id, raw }),
        }
        self.dirty = true;
    }

    fn to_bytes(&self) -> Vec<u8> {
        if !self.dirty {
            return self.raw.clone();
        }

        let table_len = 8 + self.properties.len() * 8;
        let mut table = Vec::with_capacity(table_len);
        let mut values = Vec::new();
        for property in &self.properties {
            table.extend_from_slice(&property.id.to_le_bytes());
            table.extend_from_slice(&((table_len + values.len()) as u32).to_le_bytes());
            values.extend_from_slice(&property.raw);
            pad_to_four(&mut values);
        }

        let size = table_len + values.len();
        let mut out = Vec::with_capacity(size);
        out.extend_from_slice(&(size as u32).to_le_bytes());
        out.extend_from_slice(&(self.properties.len() as u32).to_le_bytes());
        out.extend_from_slice(&table);
        out.extend_from_slice(&values);
        out
    }
}

/// Serializa una cadena como `VT_LPSTR` en la página de códigos de la sección,
/// o como `VT_LPWSTR` si la página no puede representarla.
fn encode_string_value(value: &str, codepage: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() * 2 + 12);

    if codepage == CP_WINUNICODE {
        let units: Vec<u16> = value.encode_utf16().chain(std::iter::once(0)).collect();
        out.extend_from_slice(&(VT_LPSTR as u32).to_le_bytes());
        out.extend_from_slice(&((units.len() * 2) as u32).to_le_bytes());
        units
            .iter()
            .for_each(|unit| out.extend_from_slice(&unit.to_le_bytes()));
    } else if let Some(bytes) = encode_codepage_string(value, codepage) {
        out.extend_from_slice(&(VT_LPSTR as u32).to_le_bytes());
        out.extend_from_slice(&((bytes.len() + 1) as u32).to_le_bytes());
        out.extend_from_slice(&bytes);
        out.push(0);
    } else {
        let units: Vec<u16> = value.encode_utf16().chain(std::iter::once(0)).collect();
        out.extend_from_slice(&(VT_LPWSTR as u32).to_le_bytes());
        out.extend_from_slice(&(units.len() as u32).to_le_bytes());
        units
            .iter()
            .for_each(|unit| out.extend_from_slice(&unit.to_le_bytes()));
    }

    pad_to_four(&mut out);
    out
}
