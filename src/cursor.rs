//! Bulk-fetch cursors.
//!
//! The `Cursor` trait defines the common row-cursor interface; `BulkCursor`
//! implements it on top of row-array fetches. Each call to
//! [`BulkCursor::fetch_batch`] issues exactly one `SQLFetch`, which fills up
//! to `fetch_size` rows into the bound column buffers at once, and decodes
//! them into a [`RowBatch`].
//!
//! # States
//!
//! ```text
//! Unbound --execute--> Bound --fetch (rows)--> Bound
//!                        |
//!                        +--fetch (no data)--> Exhausted --close--> Closed
//! ```
//!
//! Re-executing from `Unbound`, `Bound` or `Exhausted` returns to `Bound` with
//! freshly built bindings. A driver failure during execute or fetch leaves the
//! cursor `Faulted`; from there only `close` (or drop) is accepted.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::connection::Connection;
use crate::driver::binding::BindingSet;
use crate::driver::constants::SQL_ROW_SUCCESS_WITH_INFO;
use crate::driver::diagnostics::{check, check_value, Target};
use crate::driver::types::{ColumnDescriptor, ColumnInfo, Parameter, Row};
use crate::driver::{Driver, FreeStmtOption, Handle, HandleType, SqlReturn, StatementAttribute};
use crate::error::{Error, ErrorKind, Result};

/// Base trait for all cursor types.
///
/// # Example
///
/// ```
/// use odbc_bulk_rs::driver::constants::SQL_INTEGER;
/// use odbc_bulk_rs::{ConnectParams, Cursor, Environment, InMemoryDriver, ResultSetBuilder, Row, Value};
///
/// // Generic function that works with any cursor type
/// fn count_rows<C: Cursor<Item = Row>>(cursor: &mut C) -> odbc_bulk_rs::Result<u64> {
///     let mut count = 0;
///     while cursor.next()?.is_some() {
///         count += 1;
///     }
///     Ok(count)
/// }
///
/// let driver = InMemoryDriver::new().with_result(
///     ResultSetBuilder::new()
///         .column("n", SQL_INTEGER, 10)
///         .rows((0..5).map(|i| vec![Value::Int32(i)]))
///         .build(),
/// );
/// let env = Environment::new(driver)?;
/// let mut conn = env.connect(&ConnectParams::new("DSN=memory").with_array_size(2))?;
/// let mut cursor = conn.cursor()?;
/// cursor.prepare("SELECT n FROM numbers")?;
/// cursor.execute()?;
/// assert_eq!(count_rows(&mut cursor)?, 5);
/// # Ok::<(), odbc_bulk_rs::Error>(())
/// ```
pub trait Cursor {
    /// The type of item this cursor yields.
    type Item;

    /// Column information of the current result set.
    fn columns(&self) -> &ColumnInfo;

    /// Number of rows fetched since the last execute.
    fn rows_fetched(&self) -> u64;

    /// Check if the cursor is closed.
    fn is_closed(&self) -> bool;

    /// Check if more items are available (buffered or still with the driver).
    fn has_more(&self) -> bool;

    /// Rows requested per fetch.
    fn fetch_size(&self) -> usize;

    /// Set rows per fetch. Takes effect at the next execute.
    fn set_fetch_size(&mut self, size: usize) -> Result<()>;

    /// Close the cursor and release the statement handle.
    fn close(&mut self) -> Result<()>;

    /// Get the next item, fetching a new batch when the buffer is empty.
    ///
    /// Returns `Ok(None)` when exhausted.
    fn next(&mut self) -> Result<Option<Self::Item>>;

    /// Fetch all remaining items into a vector.
    fn fetch_all(&mut self) -> Result<Vec<Self::Item>>;
}

/// Cursor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No result set bound (fresh or just prepared).
    Unbound,
    /// Executed, columns bound, rows may remain.
    Bound,
    /// The driver reported no more rows.
    Exhausted,
    /// A driver call failed mid-result; only close is accepted.
    Faulted,
    /// Statement handle released.
    Closed,
}

impl CursorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CursorState::Unbound => "unbound",
            CursorState::Bound => "bound",
            CursorState::Exhausted => "exhausted",
            CursorState::Faulted => "faulted",
            CursorState::Closed => "closed",
        }
    }
}

/// Rows decoded from one bulk fetch.
///
/// Owned by the caller; the cursor keeps nothing that refers to it.
#[derive(Debug, Clone)]
pub struct RowBatch {
    rows: Vec<Row>,
    columns: Arc<ColumnInfo>,
}

impl RowBatch {
    /// Number of rows in the batch.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the batch holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in fetch order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Column information shared by the rows.
    pub fn columns(&self) -> &Arc<ColumnInfo> {
        &self.columns
    }

    /// Take the rows.
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Iterate over rows.
    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }
}

impl IntoIterator for RowBatch {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Row-array cursor over one statement handle.
///
/// Holds a mutable reference to the connection, so only one cursor can be
/// active per connection at a time. Column buffers, the row status array and
/// the rows-fetched counter are owned here and registered with the driver;
/// they are unbound before being released and the statement handle is freed
/// before any of them is dropped.
///
/// # Lifecycle
///
/// 1. Created by `Connection::cursor()`
/// 2. `prepare()` then `execute()`
/// 3. Consumed with `fetch_batch()`, `fetch_many()`, `next()` or `fetch_all()`
/// 4. Closed explicitly via `close()` or on drop
#[derive(Debug)]
pub struct BulkCursor<'conn, 'env, D: Driver> {
    conn: &'conn mut Connection<'env, D>,
    stmt: Handle,
    state: CursorState,
    /// SQL of the prepared statement.
    sql: Option<String>,
    bindings: BindingSet,
    fetch_size: usize,
    /// Written by the driver on every fetch.
    rows_fetched: Box<usize>,
    /// Written by the driver on every fetch, one entry per row slot.
    row_status: Vec<u16>,
    /// Rows of the current batch not yet handed out by `next()`.
    buffer: VecDeque<Row>,
    total_rows: u64,
    affected_rows: Option<i64>,
}

impl<'conn, 'env, D: Driver> BulkCursor<'conn, 'env, D> {
    /// Wrap an allocated statement handle.
    ///
    /// Called by `Connection::cursor()`.
    pub(crate) fn new(conn: &'conn mut Connection<'env, D>, stmt: Handle) -> Self {
        let fetch_size = conn.params().array_size;
        Self {
            conn,
            stmt,
            state: CursorState::Unbound,
            sql: None,
            bindings: BindingSet::empty(fetch_size),
            fetch_size,
            rows_fetched: Box::new(0),
            row_status: Vec::new(),
            buffer: VecDeque::new(),
            total_rows: 0,
            affected_rows: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Statement handle.
    pub fn handle(&self) -> Handle {
        self.stmt
    }

    /// SQL of the prepared statement.
    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    /// Shared column information of the current result set.
    pub fn column_info(&self) -> &Arc<ColumnInfo> {
        self.bindings.column_info()
    }

    /// Bindings of the current result set.
    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    /// Row count reported by the driver after the last execute.
    ///
    /// `None` before the first execute. Many drivers report -1 for queries.
    pub fn affected_rows(&self) -> Option<i64> {
        self.affected_rows
    }

    /// Prepare a statement, closing any open result set first.
    pub fn prepare(&mut self, sql: &str) -> Result<()> {
        self.ensure_usable("prepare")?;
        self.reset()?;
        self.sql = None;

        let status = self.driver().prepare(self.stmt, sql);
        check(self.driver(), self.target(), ErrorKind::Execute, "prepare", status)?;
        self.sql = Some(sql.to_string());
        tracing::debug!(sql, "statement prepared");
        Ok(())
    }

    /// Execute the prepared statement and bind its result columns.
    pub fn execute(&mut self) -> Result<()> {
        self.execute_with(&[])
    }

    /// Execute the prepared statement with parameters.
    ///
    /// Parameter binding is not available yet: any non-empty list is rejected
    /// with `Error::NotImplemented` before the driver is called.
    pub fn execute_with(&mut self, params: &[Parameter]) -> Result<()> {
        if !params.is_empty() {
            return Err(Error::NotImplemented {
                feature: "parameter binding",
            });
        }
        self.ensure_usable("execute")?;
        if self.sql.is_none() {
            return Err(Error::InvalidState {
                state: "unprepared",
                operation: "execute",
            });
        }
        let result = self.execute_prepared();
        if result.is_err() {
            self.state = CursorState::Faulted;
        }
        result
    }

    /// Issue one bulk fetch and decode it.
    ///
    /// Returns `Ok(None)` once the driver reports no more data; later calls
    /// keep returning `Ok(None)` without calling the driver.
    pub fn fetch_batch(&mut self) -> Result<Option<RowBatch>> {
        match self.state {
            CursorState::Bound => {}
            CursorState::Exhausted => return Ok(None),
            state => {
                return Err(Error::InvalidState {
                    state: state.as_str(),
                    operation: "fetch",
                })
            }
        }
        let result = self.fetch_rows();
        if result.is_err() {
            self.state = CursorState::Faulted;
        }
        result
    }

    /// Rows still buffered from `next()`, or else the next batch.
    ///
    /// Returns an empty vector when exhausted.
    pub fn fetch_many(&mut self) -> Result<Vec<Row>> {
        if !self.buffer.is_empty() {
            return Ok(self.buffer.drain(..).collect());
        }
        Ok(self
            .fetch_batch()?
            .map(RowBatch::into_rows)
            .unwrap_or_default())
    }

    fn driver(&self) -> &'env D {
        self.conn.environment().driver()
    }

    fn target(&self) -> Target {
        Target::new(HandleType::Stmt, self.stmt)
    }

    fn ensure_usable(&self, operation: &'static str) -> Result<()> {
        match self.state {
            CursorState::Faulted | CursorState::Closed => Err(Error::InvalidState {
                state: self.state.as_str(),
                operation,
            }),
            _ => Ok(()),
        }
    }

    /// Close the driver-side result set and drop the current bindings.
    fn reset(&mut self) -> Result<()> {
        let driver = self.driver();
        if matches!(self.state, CursorState::Bound | CursorState::Exhausted) {
            let status = driver.free_stmt(self.stmt, FreeStmtOption::Close);
            check(driver, self.target(), ErrorKind::Execute, "close cursor", status)?;
        }
        self.state = CursorState::Unbound;
        self.unbind()?;
        self.buffer.clear();
        self.total_rows = 0;
        self.affected_rows = None;
        Ok(())
    }

    /// Unbind before releasing buffers; the driver keeps their addresses.
    fn unbind(&mut self) -> Result<()> {
        if self.bindings.is_empty() {
            return Ok(());
        }
        let driver = self.driver();
        let status = driver.free_stmt(self.stmt, FreeStmtOption::Unbind);
        check(driver, self.target(), ErrorKind::Bind, "unbind columns", status)?;
        self.bindings = BindingSet::empty(self.fetch_size);
        Ok(())
    }

    fn execute_prepared(&mut self) -> Result<()> {
        self.reset()?;
        let driver = self.driver();
        let target = self.target();
        let stmt = self.stmt;
        let capacity = self.fetch_size;

        self.row_status.clear();
        self.row_status.resize(capacity, 0);
        *self.rows_fetched = 0;
        // SAFETY: the row status array holds `capacity` entries and is not
        // resized again before the next execute re-registers it. Both targets
        // are owned by the cursor, which frees the statement handle before
        // dropping them.
        unsafe {
            let status = driver.set_stmt_attr(stmt, StatementAttribute::RowArraySize(capacity));
            check(driver, target, ErrorKind::Bind, "set row array size", status)?;
            let status = driver.set_stmt_attr(
                stmt,
                StatementAttribute::RowStatusPtr(self.row_status.as_mut_ptr()),
            );
            check(driver, target, ErrorKind::Bind, "set row status pointer", status)?;
            let status = driver.set_stmt_attr(
                stmt,
                StatementAttribute::RowsFetchedPtr(&mut *self.rows_fetched as *mut usize),
            );
            check(driver, target, ErrorKind::Bind, "set rows fetched pointer", status)?;
        }

        // No data on execute means a searched update or delete touched no rows.
        let status = driver.execute(stmt);
        if status != SqlReturn::NoData {
            check(driver, target, ErrorKind::Execute, "execute", status)?;
        }
        self.state = CursorState::Bound;

        let count = check_value(
            driver,
            target,
            ErrorKind::Execute,
            "count result columns",
            driver.num_result_cols(stmt),
        )?;
        let descriptors = (1..=count.max(0) as u16)
            .map(|column| {
                check_value(
                    driver,
                    target,
                    ErrorKind::Execute,
                    "describe column",
                    driver.describe_col(stmt, column),
                )
            })
            .collect::<Result<Vec<ColumnDescriptor>>>()?;

        self.bindings = BindingSet::new(descriptors, capacity, self.conn.params())?;
        // SAFETY: the bindings are owned by the cursor and only replaced or
        // dropped after `unbind` (or after the statement handle is freed), and
        // their capacity equals the row array size set above.
        unsafe { self.bindings.bind_all(driver, stmt)? };

        self.affected_rows = Some(check_value(
            driver,
            target,
            ErrorKind::Execute,
            "row count",
            driver.row_count(stmt),
        )?);
        if self.bindings.is_empty() {
            self.state = CursorState::Exhausted;
        }
        tracing::debug!(
            sql = self.sql.as_deref().unwrap_or_default(),
            columns = self.bindings.len(),
            array_size = capacity,
            "statement executed"
        );
        Ok(())
    }

    fn fetch_rows(&mut self) -> Result<Option<RowBatch>> {
        let driver = self.driver();
        *self.rows_fetched = 0;
        let status = driver.fetch(self.stmt);
        if status == SqlReturn::NoData {
            self.state = CursorState::Exhausted;
            tracing::trace!(total = self.total_rows, "result set exhausted");
            return Ok(None);
        }
        check(driver, self.target(), ErrorKind::Fetch, "fetch", status)?;

        let rows = *self.rows_fetched;
        let warnings = self
            .row_status
            .iter()
            .take(rows)
            .filter(|s| **s == SQL_ROW_SUCCESS_WITH_INFO)
            .count();
        if warnings > 0 {
            tracing::debug!(rows = warnings, "rows fetched with warnings");
        }

        let decoded = self
            .bindings
            .decode_rows(rows, self.conn.params().narrow_encoding)?;
        self.total_rows += rows as u64;
        tracing::trace!(rows, total = self.total_rows, "fetched batch");
        Ok(Some(RowBatch {
            rows: decoded,
            columns: Arc::clone(self.bindings.column_info()),
        }))
    }

    fn release(&mut self) -> Result<()> {
        if self.state == CursorState::Closed {
            return Ok(());
        }
        let driver = self.driver();
        let target = self.target();
        let mut first_error = None;

        if self.state != CursorState::Unbound {
            let status = driver.free_stmt(self.stmt, FreeStmtOption::Close);
            if let Err(e) = check(driver, target, ErrorKind::Execute, "close cursor", status) {
                first_error.get_or_insert(e);
            }
        }
        if !self.bindings.is_empty() {
            let status = driver.free_stmt(self.stmt, FreeStmtOption::Unbind);
            if let Err(e) = check(driver, target, ErrorKind::Bind, "unbind columns", status) {
                first_error.get_or_insert(e);
            }
        }
        let status = driver.free_handle(HandleType::Stmt, self.stmt);
        if let Err(e) = check(driver, target, ErrorKind::Allocation, "free statement handle", status) {
            first_error.get_or_insert(e);
        }

        self.state = CursorState::Closed;
        self.stmt = Handle::NULL;
        self.buffer.clear();
        match first_error {
            Some(e) => Err(e),
            None => {
                // The handle is gone, so nothing refers to the buffers anymore.
                self.bindings = BindingSet::empty(self.fetch_size);
                Ok(())
            }
        }
    }
}

impl<D: Driver> Cursor for BulkCursor<'_, '_, D> {
    type Item = Row;

    fn columns(&self) -> &ColumnInfo {
        self.bindings.column_info()
    }

    fn rows_fetched(&self) -> u64 {
        self.total_rows
    }

    fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    fn has_more(&self) -> bool {
        !self.buffer.is_empty() || self.state == CursorState::Bound
    }

    fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    fn set_fetch_size(&mut self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(Error::InvalidArraySize { size });
        }
        self.fetch_size = size;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.release()
    }

    fn next(&mut self) -> Result<Option<Self::Item>> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                return Ok(Some(row));
            }
            match self.fetch_batch()? {
                Some(batch) => self.buffer.extend(batch),
                None => return Ok(None),
            }
        }
    }

    fn fetch_all(&mut self) -> Result<Vec<Self::Item>> {
        let mut all_rows: Vec<Row> = self.buffer.drain(..).collect();
        while let Some(batch) = self.fetch_batch()? {
            all_rows.extend(batch);
        }
        Ok(all_rows)
    }
}

impl<D: Driver> Drop for BulkCursor<'_, '_, D> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "failed to release statement");
        }
    }
}

/// Iterator over the items of a cursor.
///
/// Yields `Err` at most once; iteration ends after the first error.
#[derive(Debug)]
pub struct CursorIter<C> {
    cursor: C,
    done: bool,
}

impl<C> CursorIter<C> {
    /// Recover the cursor.
    pub fn into_inner(self) -> C {
        self.cursor
    }
}

impl<C: Cursor> Iterator for CursorIter<C> {
    type Item = Result<C::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.cursor.next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Extension trait for converting a `Cursor` into an `Iterator`.
///
/// # Example
///
/// ```
/// use odbc_bulk_rs::driver::constants::SQL_VARCHAR;
/// use odbc_bulk_rs::{ConnectParams, CursorIterExt, Environment, InMemoryDriver, ResultSetBuilder, Value};
///
/// let driver = InMemoryDriver::new().with_result(
///     ResultSetBuilder::new()
///         .column("name", SQL_VARCHAR, 16)
///         .row(vec![Value::from("Alice")])
///         .row(vec![Value::from("Bob")])
///         .build(),
/// );
/// let env = Environment::new(driver)?;
/// let mut conn = env.connect(&ConnectParams::new("DSN=memory"))?;
/// let mut cursor = conn.cursor()?;
/// cursor.prepare("SELECT name FROM users")?;
/// cursor.execute()?;
///
/// let names: Vec<String> = cursor
///     .into_rows()
///     .map(|row| row.map(|r| r.get(0).unwrap().to_string()))
///     .collect::<Result<_, _>>()?;
/// assert_eq!(names, vec!["Alice", "Bob"]);
/// # Ok::<(), odbc_bulk_rs::Error>(())
/// ```
pub trait CursorIterExt: Cursor + Sized {
    /// Convert this cursor into an iterator yielding `Result<Item>`.
    fn into_rows(self) -> CursorIter<Self>;
}

impl<C: Cursor> CursorIterExt for C {
    fn into_rows(self) -> CursorIter<Self> {
        CursorIter {
            cursor: self,
            done: false,
        }
    }
}
