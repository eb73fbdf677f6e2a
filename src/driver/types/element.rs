//! Element kinds and the mapping from SQL types to bound buffer layouts.
//!
//! Every column is fetched into one of four native representations. The
//! layout (element width and the C type handed to `SQLBindCol`) is a pure
//! function of the driver reported SQL type and declared size.

use crate::error::{Error, Result};
use crate::driver::constants::{
    SQL_BIGINT, SQL_BIT, SQL_CHAR, SQL_C_CHAR, SQL_C_SBIGINT, SQL_C_SLONG, SQL_C_WCHAR,
    SQL_INTEGER, SQL_LONGVARCHAR, SQL_SMALLINT, SQL_TINYINT, SQL_VARCHAR, SQL_WCHAR,
    SQL_WLONGVARCHAR, SQL_WVARCHAR,
};

/// Native representation of one bound column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// 32-bit signed integer (`SQL_C_SLONG`).
    Int32,
    /// 64-bit signed integer (`SQL_C_SBIGINT`).
    Int64,
    /// Single byte per character text (`SQL_C_CHAR`).
    FixedText,
    /// Two bytes per character text, UTF-16 in native byte order (`SQL_C_WCHAR`).
    WideText,
}

impl ElementKind {
    /// C type code registered with `SQLBindCol`.
    pub fn c_type(&self) -> i16 {
        match self {
            ElementKind::Int32 => SQL_C_SLONG,
            ElementKind::Int64 => SQL_C_SBIGINT,
            ElementKind::FixedText => SQL_C_CHAR,
            ElementKind::WideText => SQL_C_WCHAR,
        }
    }

    /// Bytes reserved at the end of each slot for the null terminator.
    pub fn terminator_width(&self) -> usize {
        match self {
            ElementKind::Int32 | ElementKind::Int64 => 0,
            ElementKind::FixedText => 1,
            ElementKind::WideText => 2,
        }
    }

    /// Whether the indicator carries the exact byte length of each value.
    pub fn is_variable_width(&self) -> bool {
        matches!(self, ElementKind::FixedText | ElementKind::WideText)
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementKind::Int32 => write!(f, "INT32"),
            ElementKind::Int64 => write!(f, "INT64"),
            ElementKind::FixedText => write!(f, "CHAR"),
            ElementKind::WideText => write!(f, "WCHAR"),
        }
    }
}

/// Buffer layout of one column slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementLayout {
    /// Element kind.
    pub kind: ElementKind,
    /// Slot width in bytes, terminator included.
    pub width: usize,
    /// Whether the indicator is a byte length (text) rather than the fixed width.
    pub variable_width: bool,
    /// Canonical C type code for `SQLBindCol`.
    pub c_type: i16,
}

impl ElementLayout {
    fn new(kind: ElementKind, width: usize) -> Self {
        Self {
            kind,
            width,
            variable_width: kind.is_variable_width(),
            c_type: kind.c_type(),
        }
    }

    /// Largest value, in bytes, that fits in a slot.
    pub fn max_value_length(&self) -> usize {
        self.width - self.kind.terminator_width()
    }
}

/// Map a SQL type code and declared column size to a buffer layout.
///
/// `SQL_BIGINT` is bound as a 64-bit integer even though every other integer
/// type shares the 32-bit layout. All narrow text types collapse onto
/// `SQL_C_CHAR`, all wide text types onto `SQL_C_WCHAR`.
///
/// Returns `Err(Error::UnsupportedType)` for any other type code, and
/// `Err(Error::Allocation)` when the text slot width overflows `usize`.
/// `column` is only used to label errors.
pub fn classify(column: u16, type_code: i16, declared_size: usize) -> Result<ElementLayout> {
    match type_code {
        SQL_BIGINT => Ok(ElementLayout::new(ElementKind::Int64, 8)),
        SQL_INTEGER | SQL_SMALLINT | SQL_TINYINT | SQL_BIT => {
            Ok(ElementLayout::new(ElementKind::Int32, 4))
        }
        SQL_CHAR | SQL_VARCHAR | SQL_LONGVARCHAR => {
            text_layout(column, ElementKind::FixedText, declared_size)
        }
        SQL_WCHAR | SQL_WVARCHAR | SQL_WLONGVARCHAR => {
            text_layout(column, ElementKind::WideText, declared_size)
        }
        _ => Err(Error::UnsupportedType { column, type_code }),
    }
}

fn text_layout(column: u16, kind: ElementKind, declared_size: usize) -> Result<ElementLayout> {
    let unit = kind.terminator_width();
    declared_size
        .checked_mul(unit)
        .and_then(|bytes| bytes.checked_add(unit))
        .map(|width| ElementLayout::new(kind, width))
        .ok_or_else(|| {
            Error::buffer_allocation(
                column,
                format!("{} characters of {} do not fit in memory", declared_size, kind),
            )
        })
}
