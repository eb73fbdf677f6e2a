//! Decoders for bound column slots.
//!
//! Each element kind has its own decode function.
//!
//! | Element kind | C type | Function |
//! |--------------|--------|----------|
//! | Int32        | `SQL_C_SLONG`   | `decode_i32` |
//! | Int64        | `SQL_C_SBIGINT` | `decode_i64` |
//! | FixedText    | `SQL_C_CHAR`    | `decode_narrow_text` |
//! | WideText     | `SQL_C_WCHAR`   | `decode_wide_text` |

mod integer;
mod text;

pub use integer::{decode_i32, decode_i64};
pub use text::{decode_narrow_text, decode_wide_text, encode_narrow_text, encode_wide_text};
