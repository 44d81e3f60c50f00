//! Conversión de cadenas según la página de códigos de un conjunto de propiedades.

use encoding_rs::Encoding;

use crate::editor::constants::CP_WINUNICODE;

/// Traduce un identificador de página de códigos de Windows a `encoding_rs`.
pub(crate) fn codepage_to_encoding(codepage: u32) -> Option<&'static Encoding> {
    match codepage {
        874 => Some(encoding_rs::WINDOWS_874),
        932 => Some(encoding_rs::SHIFT_JIS),
        936 => Some(encoding_rs::GBK),
        949 => Some(encoding_rs::EUC_KR),
        950 => Some(encoding_rs::BIG5),
        1250 => Some(encoding_rs::WINDOWS_1250),
        1251 => Some(encoding_rs::WINDOWS_1251),
        1252 => Some(encoding_rs::WINDOWS_1252),
        1253 => Some(encoding_rs::WINDOWS_1253),
        1254 => Some(encoding_rs::WINDOWS_1254),
        1255 => Some(encoding_rs::WINDOWS_1255),
        1256 => Some(encoding_rs::WINDOWS_1256),
        1257 => Some(encoding_rs::WINDOWS_1257),
        1258 => Some(encoding_rs::WINDOWS_1258),
        10000 => Some(encoding_rs::MACINTOSH),
        20866 => Some(encoding_rs::KOI8_R),
        20932 => Some(encoding_rs::EUC_JP),
        21866 => Some(encoding_rs::KOI8_U),
        28591 => Some(encoding_rs::WINDOWS_1252),
        28592 => Some(encoding_rs::ISO_8859_2),
        28595 => Some(encoding_rs::ISO_8859_5),
        28597 => Some(encoding_rs::ISO_8859_7),
        28605 => Some(encoding_rs::ISO_8859_15),
        54936 => Some(encoding_rs::GB18030),
        65001 => Some(encoding_rs::UTF_8),
        _ => None,
    }
}

fn strip_null_terminators(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

/// Decodifica UTF-16LE hasta el primer terminador nulo.
pub(crate) fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

/// Decodifica una cadena de 8 bits (`VT_LPSTR`) con la página de códigos dada.
pub(crate) fn decode_codepage_string(bytes: &[u8], codepage: u32) -> String {
    if codepage == CP_WINUNICODE {
        return decode_utf16le(bytes);
    }

    let bytes = strip_null_terminators(bytes);
    match codepage_to_encoding(codepage) {
        Some(encoding) => encoding.decode_without_bom_handling(bytes).0.into_owned(),
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Codifica `value` en la página de códigos dada, sin terminador.
///
/// Devuelve `None` si la página no es de 8 bits conocida o si algún carácter
/// no tiene representación en ella.
pub(crate) fn encode_codepage_string(value: &str, codepage: u32) -> Option<Vec<u8>> {
    let encoding = codepage_to_encoding(codepage)?;
    let (bytes, _, had_errors) = encoding.encode(value);
    if had_errors {
        return None;
    }
    Some(bytes.into_owned())
}
