//! Integer decoders for `SQL_C_SLONG` and `SQL_C_SBIGINT` slots.
//!
//! The driver writes native scalars, so the slot bytes are reinterpreted in
//! native byte order.

use crate::error::{Error, Result};

/// Decode a 4-byte slot.
pub fn decode_i32(slot: &[u8]) -> Result<i32> {
    let bytes: [u8; 4] = slot
        .try_into()
        .map_err(|_| Error::type_conversion(format!("expected 4 bytes, got {}", slot.len())))?;
    Ok(i32::from_ne_bytes(bytes))
}

/// Decode an 8-byte slot.
pub fn decode_i64(slot: &[u8]) -> Result<i64> {
    let bytes: [u8; 8] = slot
        .try_into()
        .map_err(|_| Error::type_conversion(format!("expected 8 bytes, got {}", slot.len())))?;
    Ok(i64::from_ne_bytes(bytes))
}
