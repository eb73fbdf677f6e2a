//! Text decoders for `SQL_C_CHAR` and `SQL_C_WCHAR` slots.
//!
//! The byte range handed to these functions is exactly the value the driver
//! wrote (indicator length), the terminator is never included.

use crate::driver::connect::NarrowEncoding;
use crate::error::{Error, Result};

/// Decode a narrow text value.
///
/// Latin-1 maps each byte to the code point of the same value and never
/// fails. UTF-8 rejects invalid sequences.
pub fn decode_narrow_text(bytes: &[u8], encoding: NarrowEncoding) -> Result<String> {
    match encoding {
        NarrowEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        NarrowEncoding::Utf8 => std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| Error::type_conversion(format!("invalid UTF-8: {}", e))),
    }
}

/// Decode a wide text value: UTF-16 code units in native byte order.
pub fn decode_wide_text(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::type_conversion(format!(
            "odd byte length {} for UTF-16 data",
            bytes.len()
        )));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| Error::type_conversion(format!("invalid UTF-16: {}", e)))
}

/// Encode text the way a driver writes it into a `SQL_C_CHAR` slot.
///
/// Characters outside Latin-1 become `?`, as most drivers substitute them.
pub fn encode_narrow_text(text: &str, encoding: NarrowEncoding) -> Vec<u8> {
    match encoding {
        NarrowEncoding::Latin1 => text
            .chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
            .collect(),
        NarrowEncoding::Utf8 => text.as_bytes().to_vec(),
    }
}

/// Encode text the way a driver writes it into a `SQL_C_WCHAR` slot.
pub fn encode_wide_text(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_ne_bytes()).collect()
}
