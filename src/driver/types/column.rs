//! Column and ColumnInfo types for user-facing API.
//!
//! These types provide a clean interface for accessing column information
//! from query results, derived from the internal ColumnDescriptor.

use super::element::ElementKind;
use super::metadata::ColumnDescriptor;

/// A column in a result set (user-facing representation).
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Whether NULL values are allowed.
    pub nullable: bool,
    /// How values of this column are decoded.
    pub kind: ElementKind,
    /// Raw SQL type code.
    pub sql_type: i16,
    /// Declared column size.
    pub size: usize,
}

impl Column {
    /// Create a column from its descriptor and resolved element kind.
    pub fn new(descriptor: &ColumnDescriptor, kind: ElementKind) -> Self {
        Self {
            name: descriptor.name.clone(),
            nullable: descriptor.nullable,
            kind,
            sql_type: descriptor.data_type,
            size: descriptor.column_size,
        }
    }
}

/// Shared column information for all rows in a result set.
#[derive(Debug, Clone, Default)]
pub struct ColumnInfo {
    /// Column definitions.
    pub columns: Vec<Column>,
}

impl ColumnInfo {
    /// Create new column info from columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get column by index.
    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Find column index by name (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::constants::{SQL_INTEGER, SQL_WVARCHAR};

    fn make_test_descriptors() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("ID", SQL_INTEGER, 10).with_nullable(false),
            ColumnDescriptor::new("name", SQL_WVARCHAR, 100),
        ]
    }

    #[test]
    fn test_column_from_descriptor() {
        let desc = &make_test_descriptors()[0];
        let col = Column::new(desc, ElementKind::Int32);

        assert_eq!(col.name, "ID");
        assert!(!col.nullable);
        assert_eq!(col.sql_type, SQL_INTEGER);
        assert_eq!(col.size, 10);
        assert_eq!(col.kind, ElementKind::Int32);
    }

    #[test]
    fn test_column_info_lookup() {
        let descs = make_test_descriptors();
        let info = ColumnInfo::new(vec![
            Column::new(&descs[0], ElementKind::Int32),
            Column::new(&descs[1], ElementKind::WideText),
        ]);

        assert_eq!(info.len(), 2);
        assert_eq!(info.column_names(), vec!["ID", "name"]);
        assert_eq!(info.find_by_name("NAME"), Some(1));
        assert_eq!(info.find_by_name("id"), Some(0));
        assert_eq!(info.find_by_name("UNKNOWN"), None);
    }
}
