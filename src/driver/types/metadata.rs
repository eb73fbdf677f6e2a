//! Column metadata as reported by `SQLDescribeCol`.
//!
//! This struct keeps the raw driver values. For the user-facing API, use
//! `Column` which carries the resolved element kind.

use crate::driver::constants::{SQL_NO_NULLS, SQL_NULLABLE, SQL_NULLABLE_UNKNOWN};

/// Raw column metadata for one result column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// SQL data type code.
    pub data_type: i16,
    /// Declared column size (characters for text types).
    pub column_size: usize,
    /// Decimal digits.
    pub decimal_digits: i16,
    /// Whether NULL values are allowed.
    pub nullable: bool,
}

impl ColumnDescriptor {
    /// Create a descriptor with minimal info.
    pub fn new(name: impl Into<String>, data_type: i16, column_size: usize) -> Self {
        Self {
            name: name.into(),
            data_type,
            column_size,
            decimal_digits: 0,
            nullable: true,
        }
    }

    /// Set nullability.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set decimal digits.
    pub fn with_decimal_digits(mut self, decimal_digits: i16) -> Self {
        self.decimal_digits = decimal_digits;
        self
    }
}

/// Interpret the `Nullable` out-value of `SQLDescribeCol`.
///
/// Unknown nullability is treated as nullable.
pub fn nullable_from_raw(raw: i16) -> bool {
    match raw {
        SQL_NO_NULLS => false,
        SQL_NULLABLE | SQL_NULLABLE_UNKNOWN => true,
        _ => true,
    }
}
