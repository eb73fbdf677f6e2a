//! Result set types: column metadata, element layouts and decoded values.

mod column;
mod element;
mod metadata;
mod parameter;
mod row;
mod value;

pub use column::{Column, ColumnInfo};
pub use element::{classify, ElementKind, ElementLayout};
pub use metadata::{nullable_from_raw, ColumnDescriptor};
pub use parameter::Parameter;
pub use row::Row;
pub use value::Value;
