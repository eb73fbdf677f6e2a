//! Error types for the ODBC bulk-fetch client.

use std::fmt;
use thiserror::Error;

use crate::driver::constants::SQLSTATE_MEMORY_ALLOCATION;

/// Result type alias for ODBC operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A diagnostic record retrieved from the driver manager after a failed call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostic {
    /// Five character SQLSTATE, e.g. `HY000`.
    pub state: String,
    /// Driver specific error code.
    pub native_error: i32,
    /// Message text.
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic record.
    pub fn new(state: impl Into<String>, native_error: i32, message: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            native_error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.state, self.message)
    }
}

/// Which stage of the boundary a failed call belongs to.
///
/// Used to pick the `Error` variant once the diagnostic has been retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Allocation,
    Connect,
    Bind,
    Execute,
    Fetch,
}

fn column_suffix(column: &Option<u16>) -> String {
    column
        .map(|c| format!(" for column {}", c))
        .unwrap_or_default()
}

/// Error type for ODBC bulk-fetch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Handle allocation or release failed.
    #[error("{operation} failed: {diagnostic}")]
    Allocation {
        operation: String,
        diagnostic: Diagnostic,
    },

    /// Environment setup, connect, autocommit, rollback or disconnect failed.
    #[error("{operation} failed: {diagnostic}")]
    Connect {
        operation: String,
        diagnostic: Diagnostic,
    },

    /// Binding a column buffer or a statement attribute failed.
    #[error("{operation} failed{}: {diagnostic}", column_suffix(.column))]
    Bind {
        column: Option<u16>,
        operation: String,
        diagnostic: Diagnostic,
    },

    /// Prepare, execute or result set metadata retrieval failed.
    #[error("{operation} failed: {diagnostic}")]
    Execute {
        operation: String,
        diagnostic: Diagnostic,
    },

    /// Bulk fetch failed.
    #[error("{operation} failed: {diagnostic}")]
    Fetch {
        operation: String,
        diagnostic: Diagnostic,
    },

    /// A call failed and no diagnostic record could be retrieved for it.
    #[error("{operation} failed (no diagnostic information available)")]
    DiagnosticUnavailable { operation: String },

    /// Driver type code with no buffer layout.
    #[error("Unsupported SQL data type {type_code} in column {column}")]
    UnsupportedType { column: u16, type_code: i16 },

    /// The driver reported more bytes than the bound slot can hold.
    #[error("Value in column {column}, row {row} truncated: {length} bytes, slot holds {capacity}")]
    Truncated {
        column: u16,
        row: usize,
        length: usize,
        capacity: usize,
    },

    /// Text bytes could not be decoded.
    #[error("Invalid text in column {column}, row {row}: {message}")]
    InvalidText {
        column: u16,
        row: usize,
        message: String,
    },

    /// Slot bytes could not be converted to the column's native type.
    #[error("Type conversion error: {message}")]
    TypeConversion { message: String },

    /// Row slot outside the bound buffer.
    #[error("Row slot {row} out of bounds (capacity: {capacity})")]
    SlotOutOfBounds { row: usize, capacity: usize },

    /// Operation not allowed in the current cursor state.
    #[error("Cannot {operation} while cursor is {state}")]
    InvalidState {
        state: &'static str,
        operation: &'static str,
    },

    /// Row array size must be at least one.
    #[error("Invalid array size: {size}")]
    InvalidArraySize { size: usize },

    /// Capability that exists in the API but has no implementation yet.
    #[error("Not implemented: {feature}")]
    NotImplemented { feature: &'static str },
}

impl Error {
    /// Build the error for a failed boundary call from its diagnostic record.
    pub fn from_diagnostic(
        kind: ErrorKind,
        operation: impl Into<String>,
        diagnostic: Diagnostic,
    ) -> Self {
        let operation = operation.into();
        match kind {
            ErrorKind::Allocation => Self::Allocation {
                operation,
                diagnostic,
            },
            ErrorKind::Connect => Self::Connect {
                operation,
                diagnostic,
            },
            ErrorKind::Bind => Self::Bind {
                column: None,
                operation,
                diagnostic,
            },
            ErrorKind::Execute => Self::Execute {
                operation,
                diagnostic,
            },
            ErrorKind::Fetch => Self::Fetch {
                operation,
                diagnostic,
            },
        }
    }

    /// Attach a column number to a bind error.
    pub fn for_column(self, column: u16) -> Self {
        match self {
            Self::Bind {
                operation,
                diagnostic,
                ..
            } => Self::Bind {
                column: Some(column),
                operation,
                diagnostic,
            },
            other => other,
        }
    }

    /// Create the error for a column buffer that cannot be sized or allocated.
    pub fn buffer_allocation(column: u16, message: impl Into<String>) -> Self {
        Self::Allocation {
            operation: format!("allocate buffer for column {}", column),
            diagnostic: Diagnostic::new(SQLSTATE_MEMORY_ALLOCATION, 0, message),
        }
    }

    /// Create a type conversion error.
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion {
            message: message.into(),
        }
    }

    /// Create a diagnostic-unavailable error.
    pub fn diagnostic_unavailable(operation: impl Into<String>) -> Self {
        Self::DiagnosticUnavailable {
            operation: operation.into(),
        }
    }

    /// The diagnostic record carried by this error, if any.
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Self::Allocation { diagnostic, .. }
            | Self::Connect { diagnostic, .. }
            | Self::Bind { diagnostic, .. }
            | Self::Execute { diagnostic, .. }
            | Self::Fetch { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }

    /// SQLSTATE of the carried diagnostic record, if any.
    pub fn sql_state(&self) -> Option<&str> {
        self.diagnostic().map(|d| d.state.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::new("42S02", 208, "Invalid object name 'T'.");
        assert_eq!(diag.to_string(), "[42S02] Invalid object name 'T'.");
    }

    #[test]
    fn test_from_diagnostic_picks_variant() {
        let diag = Diagnostic::new("HY000", 1, "boom");
        let err = Error::from_diagnostic(ErrorKind::Fetch, "fetch", diag.clone());
        assert!(matches!(err, Error::Fetch { .. }));
        assert_eq!(err.sql_state(), Some("HY000"));
        assert_eq!(err.to_string(), "fetch failed: [HY000] boom");

        let err = Error::from_diagnostic(ErrorKind::Bind, "bind column", diag).for_column(3);
        assert_eq!(err.to_string(), "bind column failed for column 3: [HY000] boom");
    }

    #[test]
    fn test_buffer_allocation_error() {
        let err = Error::buffer_allocation(2, "slot of 8 bytes");
        assert!(matches!(err, Error::Allocation { .. }));
        assert_eq!(err.sql_state(), Some("HY001"));
        assert_eq!(
            err.to_string(),
            "allocate buffer for column 2 failed: [HY001] slot of 8 bytes"
        );
    }

    #[test]
    fn test_diagnostic_unavailable_names_operation() {
        let err = Error::diagnostic_unavailable("execute");
        assert!(err.diagnostic().is_none());
        assert_eq!(
            err.to_string(),
            "execute failed (no diagnostic information available)"
        );
    }
}
