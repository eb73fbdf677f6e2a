//! Row type for query results.

use std::sync::Arc;

use super::column::{Column, ColumnInfo};
use super::value::Value;
use crate::error::{Error, Result};

/// A row of query results.
#[derive(Debug, Clone)]
pub struct Row {
    /// Column values, in result set column order.
    values: Vec<Value>,
    /// Shared column information (reference counted).
    column_info: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with values and shared column info.
    pub fn new(values: Vec<Value>, column_info: Arc<ColumnInfo>) -> Self {
        Self {
            values,
            column_info,
        }
    }

    /// Get value by column index (0-based).
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get value by column name (case-insensitive).
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.column_info
            .find_by_name(name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get all values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Take the values out of the row, dropping the shared column info.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Integer in a column, widened to `i64`. `Ok(None)` for NULL.
    pub fn get_i64(&self, index: usize) -> Result<Option<i64>> {
        let value = self.cell(index)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .to_i64()
            .map(Some)
            .ok_or_else(|| self.mismatch(index, "an integer"))
    }

    /// Text in a column. `Ok(None)` for NULL.
    pub fn get_str(&self, index: usize) -> Result<Option<&str>> {
        let value = self.cell(index)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_str()
            .map(Some)
            .ok_or_else(|| self.mismatch(index, "text"))
    }

    fn cell(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or_else(|| {
            Error::type_conversion(format!(
                "column index {} out of range for {} columns",
                index,
                self.values.len()
            ))
        })
    }

    fn mismatch(&self, index: usize, wanted: &str) -> Error {
        let name = self
            .column_info
            .columns
            .get(index)
            .map(|c| c.name.as_str())
            .unwrap_or("?");
        Error::type_conversion(format!("column {} does not hold {}", name, wanted))
    }

    /// Get column information.
    pub fn columns(&self) -> &[Column] {
        &self.column_info.columns
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.column_info.column_names()
    }

    /// Iterate over values.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl IntoIterator for Row {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::constants::{SQL_BIGINT, SQL_VARCHAR};
    use crate::driver::types::{ColumnDescriptor, ElementKind};

    fn make_test_column_info() -> Arc<ColumnInfo> {
        Arc::new(ColumnInfo::new(vec![
            Column::new(
                &ColumnDescriptor::new("NAME", SQL_VARCHAR, 100),
                ElementKind::FixedText,
            ),
            Column::new(
                &ColumnDescriptor::new("VALUE", SQL_BIGINT, 19).with_nullable(false),
                ElementKind::Int64,
            ),
        ]))
    }

    #[test]
    fn test_row_access() {
        let column_info = make_test_column_info();
        let row = Row::new(
            vec![Value::Text("test".to_string()), Value::Int64(42)],
            column_info,
        );

        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0), Some(&Value::Text("test".to_string())));
        assert_eq!(row.get_by_name("value"), Some(&Value::Int64(42)));
        assert_eq!(row.get_by_name("VALUE"), row.get_by_name("value"));
        assert_eq!(row.get(2), None);
    }

    #[test]
    fn test_row_columns() {
        let row = Row::new(vec![Value::Null, Value::Int64(1)], make_test_column_info());

        let columns = row.columns();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "NAME");
        assert_eq!(columns[1].kind, ElementKind::Int64);
        assert_eq!(row.column_names(), vec!["NAME", "VALUE"]);
    }

    #[test]
    fn test_typed_accessors() {
        let row = Row::new(
            vec![Value::from("widget"), Value::Int64(7)],
            make_test_column_info(),
        );
        assert_eq!(row.get_str(0).unwrap(), Some("widget"));
        assert_eq!(row.get_i64(1).unwrap(), Some(7));

        let err = row.get_i64(0).unwrap_err();
        assert!(matches!(err, Error::TypeConversion { .. }));
        assert!(err.to_string().contains("NAME"));
        assert!(row.get_str(1).is_err());
        assert!(row.get_i64(5).is_err());

        let nulls = Row::new(vec![Value::Null, Value::Null], make_test_column_info());
        assert_eq!(nulls.get_str(0).unwrap(), None);
        assert_eq!(nulls.get_i64(1).unwrap(), None);
    }

    #[test]
    fn test_row_into_values() {
        let row = Row::new(vec![Value::from("a"), Value::Int64(2)], make_test_column_info());
        assert_eq!(row.into_values(), vec![Value::from("a"), Value::Int64(2)]);
    }

    #[test]
    fn test_row_into_iter() {
        let row = Row::new(vec![Value::Null, Value::Int64(1)], make_test_column_info());
        let values: Vec<Value> = row.into_iter().collect();
        assert_eq!(values, vec![Value::Null, Value::Int64(1)]);
    }
}
