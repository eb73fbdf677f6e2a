//! Statement parameters.
//!
//! Parameters are accepted by the cursor API so call sites can be written
//! today, but no driver call binds them yet: `BulkCursor::execute_with`
//! rejects a non-empty parameter list with `Error::NotImplemented`.

use super::element::ElementKind;

/// Value for one `?` placeholder, 1-based in statement order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    /// NULL of the given kind.
    Null(ElementKind),
    Int32(i32),
    Int64(i64),
    /// Narrow text.
    Text(String),
    /// Wide (UTF-16) text.
    WideText(String),
}

impl Parameter {
    /// Element kind the parameter would be bound as.
    pub fn kind(&self) -> ElementKind {
        match self {
            Parameter::Null(kind) => *kind,
            Parameter::Int32(_) => ElementKind::Int32,
            Parameter::Int64(_) => ElementKind::Int64,
            Parameter::Text(_) => ElementKind::FixedText,
            Parameter::WideText(_) => ElementKind::WideText,
        }
    }
}
