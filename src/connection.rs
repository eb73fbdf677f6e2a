//! Connections and query results.

use std::sync::Arc;

use crate::cursor::{BulkCursor, Cursor};
use crate::driver::diagnostics::{check, check_value, Target};
use crate::driver::{Completion, ConnectParams, Driver, Handle, HandleType};
use crate::driver::types::{ColumnInfo, Row};
use crate::environment::Environment;
use crate::error::{ErrorKind, Result};

/// Result of a query execution.
#[derive(Debug)]
pub struct QueryResult {
    /// Column information.
    pub columns: Arc<ColumnInfo>,
    /// Rows returned.
    pub rows: Vec<Row>,
    /// Total row count.
    pub row_count: u64,
    /// Row count reported by the driver after execute (-1 when unknown).
    pub affected_rows: i64,
}

impl QueryResult {
    /// Get the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.column_names()
    }

    /// Iterate over rows.
    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// A connection to an ODBC data source.
///
/// Autocommit is set right after connecting (off unless requested). When
/// autocommit is off, any open transaction is rolled back on close; there is
/// no commit API. Dropping a connection performs the same release as
/// [`Connection::close`] and logs failures instead of returning them.
#[derive(Debug)]
pub struct Connection<'env, D: Driver> {
    env: &'env Environment<D>,
    handle: Handle,
    params: ConnectParams,
    connected: bool,
}

impl<'env, D: Driver> Connection<'env, D> {
    /// Connect to a data source.
    ///
    /// The connection string is passed to the driver without interpretation.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # #[cfg(feature = "odbc")]
    /// # fn main() -> odbc_bulk_rs::Result<()> {
    /// use odbc_bulk_rs::{ConnectParams, Connection, Environment, OdbcDriver};
    ///
    /// let env = Environment::new(OdbcDriver::new())?;
    /// let params = ConnectParams::new("Driver={PostgreSQL Unicode};Server=localhost;Database=app")
    ///     .with_array_size(1000);
    /// let mut conn = Connection::connect(&env, &params)?;
    /// let result = conn.query("SELECT id, name FROM users")?;
    /// println!("{} rows", result.len());
    /// conn.close()?;
    /// # Ok(())
    /// # }
    /// # #[cfg(not(feature = "odbc"))]
    /// # fn main() {}
    /// ```
    pub fn connect(env: &'env Environment<D>, params: &ConnectParams) -> Result<Self> {
        params.validate()?;
        let driver = env.driver();
        let handle = check_value(
            driver,
            Target::new(HandleType::Env, env.handle()),
            ErrorKind::Allocation,
            "allocate connection handle",
            driver.alloc_handle(HandleType::Dbc, env.handle()),
        )?;
        let mut conn = Self {
            env,
            handle,
            params: params.clone(),
            connected: false,
        };

        conn.check(
            ErrorKind::Connect,
            "connect",
            driver.driver_connect(handle, &params.connection_string),
        )?;
        conn.connected = true;
        conn.check(
            ErrorKind::Connect,
            "set autocommit",
            driver.set_autocommit(handle, params.autocommit),
        )?;

        tracing::debug!(
            handle = handle.0,
            autocommit = params.autocommit,
            array_size = params.array_size,
            "connected"
        );
        Ok(conn)
    }

    /// Open a statement handle and wrap it in a cursor.
    ///
    /// The cursor borrows the connection mutably, so only one cursor can be
    /// active per connection.
    pub fn cursor(&mut self) -> Result<BulkCursor<'_, 'env, D>> {
        let driver = self.env.driver();
        let stmt = check_value(
            driver,
            self.target(),
            ErrorKind::Allocation,
            "allocate statement handle",
            driver.alloc_handle(HandleType::Stmt, self.handle),
        )?;
        Ok(BulkCursor::new(self, stmt))
    }

    /// Execute a query and fetch every row.
    pub fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let mut cursor = self.cursor()?;
        cursor.prepare(sql)?;
        cursor.execute()?;
        let rows = cursor.fetch_all()?;
        let columns = Arc::clone(cursor.column_info());
        let affected_rows = cursor.affected_rows().unwrap_or(-1);
        cursor.close()?;

        Ok(QueryResult {
            columns,
            row_count: rows.len() as u64,
            rows,
            affected_rows,
        })
    }

    /// Execute a statement without fetching and return the driver row count.
    pub fn execute(&mut self, sql: &str) -> Result<i64> {
        let mut cursor = self.cursor()?;
        cursor.prepare(sql)?;
        cursor.execute()?;
        let affected = cursor.affected_rows().unwrap_or(-1);
        cursor.close()?;
        Ok(affected)
    }

    /// Roll back, disconnect and free the handle.
    ///
    /// Every step runs even if an earlier one fails; the first failure is
    /// returned.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    /// Connection parameters.
    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    /// Whether autocommit is on.
    pub fn autocommit(&self) -> bool {
        self.params.autocommit
    }

    /// Connection handle.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// The environment this connection belongs to.
    pub fn environment(&self) -> &'env Environment<D> {
        self.env
    }

    fn target(&self) -> Target {
        Target::new(HandleType::Dbc, self.handle)
    }

    fn check(&self, kind: ErrorKind, operation: &str, status: crate::driver::SqlReturn) -> Result<()> {
        check(self.env.driver(), self.target(), kind, operation, status)
    }

    fn release(&mut self) -> Result<()> {
        if self.handle.is_null() {
            return Ok(());
        }
        let driver = self.env.driver();
        let mut first_error = None;

        if self.connected {
            if !self.params.autocommit {
                let status = driver.end_transaction(self.handle, Completion::Rollback);
                if let Err(e) = self.check(ErrorKind::Connect, "rollback", status) {
                    first_error.get_or_insert(e);
                }
            }
            let status = driver.disconnect(self.handle);
            if let Err(e) = self.check(ErrorKind::Connect, "disconnect", status) {
                first_error.get_or_insert(e);
            }
            self.connected = false;
        }

        let status = driver.free_handle(HandleType::Dbc, self.handle);
        if let Err(e) = self.check(ErrorKind::Allocation, "free connection handle", status) {
            first_error.get_or_insert(e);
        }
        tracing::debug!(handle = self.handle.0, "connection released");
        self.handle = Handle::NULL;

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<D: Driver> Drop for Connection<'_, D> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "failed to release connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::constants::*;
    use crate::driver::{InMemoryDriver, Operation, ResultSetBuilder, Value};
    use crate::error::Error;

    #[test]
    fn test_connect_sets_autocommit() {
        let driver = InMemoryDriver::new();
        let env = Environment::new(&driver).unwrap();
        let conn = Connection::connect(&env, &ConnectParams::new("DSN=memory")).unwrap();
        assert_eq!(driver.autocommit(conn.handle()), Some(false));
        assert_eq!(driver.connection_strings(), vec!["DSN=memory"]);
        conn.close().unwrap();
        assert_eq!(driver.rollback_count(), 1);
        assert_eq!(driver.open_handles(), 1);
    }

    #[test]
    fn test_autocommit_skips_rollback() {
        let driver = InMemoryDriver::new();
        let env = Environment::new(&driver).unwrap();
        let params = ConnectParams::new("DSN=memory").with_autocommit(true);
        let conn = Connection::connect(&env, &params).unwrap();
        assert!(conn.autocommit());
        conn.close().unwrap();
        assert_eq!(driver.rollback_count(), 0);
    }

    #[test]
    fn test_connect_failure_frees_handle() {
        let driver = InMemoryDriver::new().fail_on(Operation::Connect);
        let env = Environment::new(&driver).unwrap();
        let err = Connection::connect(&env, &ConnectParams::new("DSN=memory")).unwrap_err();
        assert!(matches!(err, Error::Connect { .. }));
        assert_eq!(err.sql_state(), Some(SQLSTATE_GENERAL_ERROR));
        assert_eq!(driver.open_handles(), 1);
    }

    #[test]
    fn test_autocommit_failure_disconnects() {
        let driver = InMemoryDriver::new().fail_on(Operation::SetAutocommit);
        let env = Environment::new(&driver).unwrap();
        assert!(Connection::connect(&env, &ConnectParams::new("DSN=memory")).is_err());
        assert_eq!(driver.call_count(Operation::Disconnect), 1);
        assert_eq!(driver.open_handles(), 1);
    }

    #[test]
    fn test_zero_array_size_rejected_before_connect() {
        let driver = InMemoryDriver::new();
        let env = Environment::new(&driver).unwrap();
        let params = ConnectParams::new("DSN=memory").with_array_size(0);
        assert!(matches!(
            Connection::connect(&env, &params),
            Err(Error::InvalidArraySize { size: 0 })
        ));
        assert_eq!(driver.call_count(Operation::Connect), 0);
    }

    #[test]
    fn test_query() {
        let driver = InMemoryDriver::new().with_result(
            ResultSetBuilder::new()
                .column("ID", SQL_INTEGER, 10)
                .column("NAME", SQL_VARCHAR, 20)
                .row(vec![Value::Int32(1), Value::from("Alice")])
                .row(vec![Value::Int32(2), Value::from("Bob")])
                .build(),
        );
        let env = Environment::new(&driver).unwrap();
        let mut conn = env
            .connect(&ConnectParams::new("DSN=memory").with_array_size(10))
            .unwrap();

        let result = conn.query("SELECT id, name FROM users").unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.row_count, 2);
        assert_eq!(result.column_names(), vec!["ID", "NAME"]);
        let names: Vec<_> = result
            .iter()
            .map(|row| row.get_by_name("name").and_then(Value::as_str).unwrap())
            .collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert_eq!(driver.prepared_statements(), vec!["SELECT id, name FROM users"]);
    }

    #[test]
    fn test_execute_reports_row_count() {
        let driver = InMemoryDriver::new()
            .with_result(ResultSetBuilder::new().row_count(3).build());
        let env = Environment::new(&driver).unwrap();
        let mut conn = env.connect(&ConnectParams::new("DSN=memory")).unwrap();
        assert_eq!(conn.execute("DELETE FROM t WHERE x > 1").unwrap(), 3);
    }
}
