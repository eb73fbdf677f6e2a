//! Row-array ("bulk") fetches over ODBC.
//!
//! Result columns are bound to driver-owned buffers once per execute, and
//! every fetch call returns up to `array_size` rows per round trip, which are
//! then decoded into [`Row`]s of [`Value`]s.
//!
//! The driver manager is reached through the [`Driver`] trait. Enable the
//! `odbc` feature for [`OdbcDriver`], which links the system driver manager;
//! [`InMemoryDriver`] is a scripted stand-in for tests.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "odbc")]
//! # fn main() -> odbc_bulk_rs::Result<()> {
//! use odbc_bulk_rs::{ConnectParams, Environment, OdbcDriver};
//!
//! let env = Environment::new(OdbcDriver::new())?;
//! let params = ConnectParams::new("DSN=warehouse;UID=reader;PWD=secret").with_array_size(500);
//! let mut conn = env.connect(&params)?;
//!
//! let mut cursor = conn.cursor()?;
//! cursor.prepare("SELECT id, name FROM customers")?;
//! cursor.execute()?;
//! while let Some(batch) = cursor.fetch_batch()? {
//!     for row in batch {
//!         println!("{:?}", row.values());
//!     }
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "odbc"))]
//! # fn main() {}
//! ```

pub mod connection;
pub mod cursor;
pub mod driver;
pub mod environment;
pub mod error;

// Re-export main types
pub use connection::{Connection, QueryResult};
pub use cursor::{BulkCursor, Cursor, CursorIter, CursorIterExt, CursorState, RowBatch};
pub use driver::types::Parameter;
pub use driver::{
    ColumnDescriptor, Column, ColumnInfo, ConnectParams, Driver, ElementKind, InMemoryDriver,
    NarrowEncoding, Operation, ResultSet, ResultSetBuilder, Row, Value,
};
#[cfg(feature = "odbc")]
pub use driver::OdbcDriver;
pub use environment::Environment;
pub use error::{Diagnostic, Error, Result};
