//! In-memory driver for tests.
//!
//! Behaves like an ODBC driver manager with one scripted data source: result
//! sets are queued up front and handed out in FIFO order, one per execute.
//! Fetches write into the buffers registered with `bind_col` exactly as a
//! native driver does (column-wise binding, row array size, rows-fetched and
//! row-status pointers, full-length indicators on truncation). Any boundary
//! operation can be made to fail, with or without a diagnostic record.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};

use super::connect::NarrowEncoding;
use super::constants::*;
use super::decode::{encode_narrow_text, encode_wide_text};
use super::types::{ColumnDescriptor, Value};
use super::{
    Completion, Driver, FreeStmtOption, Handle, HandleType, OdbcVersion, SqlReturn,
    StatementAttribute,
};
use crate::error::Diagnostic;

/// Boundary operations, used to inject failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AllocHandle,
    FreeHandle,
    SetOdbcVersion,
    Connect,
    SetAutocommit,
    EndTransaction,
    Disconnect,
    Prepare,
    Execute,
    NumResultCols,
    DescribeCol,
    SetStmtAttr,
    BindCol,
    RowCount,
    Fetch,
    FreeStmt,
    GetDiagRec,
}

/// A scripted result set.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Vec<Value>>,
    row_count: i64,
}

impl ResultSet {
    /// Statement without a result set (DDL/DML).
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: -1,
        }
    }

    /// Column metadata.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Row values.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }
}

/// Builder for scripted result sets.
///
/// # Example
///
/// ```
/// use odbc_bulk_rs::driver::constants::{SQL_INTEGER, SQL_VARCHAR};
/// use odbc_bulk_rs::{InMemoryDriver, ResultSetBuilder, Value};
///
/// let driver = InMemoryDriver::new().with_result(
///     ResultSetBuilder::new()
///         .column("id", SQL_INTEGER, 10)
///         .column("name", SQL_VARCHAR, 20)
///         .row(vec![Value::Int32(1), Value::from("Alice")])
///         .build(),
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResultSetBuilder {
    result: ResultSet,
    row_count: Option<i64>,
}

impl ResultSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a nullable column.
    pub fn column(mut self, name: &str, data_type: i16, size: usize) -> Self {
        self.result
            .columns
            .push(ColumnDescriptor::new(name, data_type, size));
        self
    }

    /// Add a column from a full descriptor.
    pub fn descriptor(mut self, descriptor: ColumnDescriptor) -> Self {
        self.result.columns.push(descriptor);
        self
    }

    /// Add a row of values.
    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.result.rows.push(values);
        self
    }

    /// Add several rows.
    pub fn rows(mut self, rows: impl IntoIterator<Item = Vec<Value>>) -> Self {
        self.result.rows.extend(rows);
        self
    }

    /// Value reported by `SQLRowCount` (default: -1, unknown).
    pub fn row_count(mut self, row_count: i64) -> Self {
        self.row_count = Some(row_count);
        self
    }

    /// Build the ResultSet.
    pub fn build(mut self) -> ResultSet {
        self.result.row_count = self.row_count.unwrap_or(-1);
        self.result
    }
}

#[derive(Debug, Clone)]
struct Failure {
    /// Calls that still succeed before the failure kicks in.
    skip: usize,
    diagnostic: Option<Diagnostic>,
}

#[derive(Debug, Clone, Copy)]
struct BoundColumn {
    c_type: i16,
    buffer: *mut u8,
    buffer_length: usize,
    indicator: *mut i64,
}

#[derive(Debug)]
struct StatementState {
    parent: Handle,
    sql: Option<String>,
    result: Option<ResultSet>,
    position: usize,
    array_size: usize,
    rows_fetched: *mut usize,
    row_status: *mut u16,
    bindings: BTreeMap<u16, BoundColumn>,
}

impl StatementState {
    fn new(parent: Handle) -> Self {
        Self {
            parent,
            sql: None,
            result: None,
            position: 0,
            array_size: 1,
            rows_fetched: std::ptr::null_mut(),
            row_status: std::ptr::null_mut(),
            bindings: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct ConnectionState {
    connected: bool,
    autocommit: bool,
    in_transaction: bool,
}

#[derive(Debug, Default)]
struct State {
    next_handle: usize,
    handles: HashMap<Handle, (HandleType, Handle)>,
    versions: HashMap<Handle, OdbcVersion>,
    connections: HashMap<Handle, ConnectionState>,
    statements: HashMap<Handle, StatementState>,
    diagnostics: HashMap<Handle, Vec<Diagnostic>>,
    responses: VecDeque<ResultSet>,
    failures: HashMap<Operation, Failure>,
    calls: Vec<Operation>,
    prepared: Vec<String>,
    connection_strings: Vec<String>,
    rollbacks: usize,
}

impl State {
    /// Record a call, clear the handle's diagnostics and apply injected failures.
    fn enter(&mut self, op: Operation, handle: Handle) -> Option<SqlReturn> {
        self.calls.push(op);
        self.diagnostics.remove(&handle);
        let failure = self.failures.get_mut(&op)?;
        if failure.skip > 0 {
            failure.skip -= 1;
            return None;
        }
        if let Some(diagnostic) = failure.diagnostic.clone() {
            self.diagnostics.insert(handle, vec![diagnostic]);
        }
        Some(SqlReturn::Error)
    }

    fn error(&mut self, handle: Handle, state: &str, message: impl Into<String>) -> SqlReturn {
        self.diagnostics
            .insert(handle, vec![Diagnostic::new(state, 0, message)]);
        SqlReturn::Error
    }

    fn info(&mut self, handle: Handle, state: &str, message: impl Into<String>) {
        self.diagnostics
            .entry(handle)
            .or_default()
            .push(Diagnostic::new(state, 0, message));
    }

    fn is_kind(&self, handle: Handle, kind: HandleType) -> bool {
        matches!(self.handles.get(&handle), Some((k, _)) if *k == kind)
    }

    fn children(&self, parent: Handle) -> usize {
        self.handles.values().filter(|(_, p)| *p == parent).count()
    }
}

/// Scripted ODBC driver. Single-threaded (`!Sync`), like the handles it models.
#[derive(Debug, Default)]
pub struct InMemoryDriver {
    state: RefCell<State>,
    narrow_encoding: NarrowEncoding,
}

impl InMemoryDriver {
    /// Create a driver with no queued result sets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result set for the next execute.
    pub fn with_result(self, result: ResultSet) -> Self {
        self.state.borrow_mut().responses.push_back(result);
        self
    }

    /// Queue several result sets.
    pub fn with_results(self, results: impl IntoIterator<Item = ResultSet>) -> Self {
        self.state.borrow_mut().responses.extend(results);
        self
    }

    /// Encoding used when writing `SQL_C_CHAR` data.
    pub fn with_narrow_encoding(mut self, encoding: NarrowEncoding) -> Self {
        self.narrow_encoding = encoding;
        self
    }

    /// Make every call of `op` fail with a generic `HY000` record.
    pub fn fail_on(self, op: Operation) -> Self {
        let diagnostic = Diagnostic::new(
            SQLSTATE_GENERAL_ERROR,
            -1,
            format!("injected failure in {:?}", op),
        );
        self.fail_with(op, 0, Some(diagnostic))
    }

    /// Make every call of `op` fail without leaving a diagnostic record.
    pub fn fail_on_silently(self, op: Operation) -> Self {
        self.fail_with(op, 0, None)
    }

    /// Let `skip` calls of `op` succeed, then fail every later one.
    pub fn fail_after(self, op: Operation, skip: usize) -> Self {
        let diagnostic = Diagnostic::new(
            SQLSTATE_GENERAL_ERROR,
            -1,
            format!("injected failure in {:?}", op),
        );
        self.fail_with(op, skip, Some(diagnostic))
    }

    /// Fully specified failure injection.
    pub fn fail_with(self, op: Operation, skip: usize, diagnostic: Option<Diagnostic>) -> Self {
        self.state
            .borrow_mut()
            .failures
            .insert(op, Failure { skip, diagnostic });
        self
    }

    /// SQL text of every prepare call, in order.
    pub fn prepared_statements(&self) -> Vec<String> {
        self.state.borrow().prepared.clone()
    }

    /// Connection strings passed to connect, in order.
    pub fn connection_strings(&self) -> Vec<String> {
        self.state.borrow().connection_strings.clone()
    }

    /// Number of calls made to an operation.
    pub fn call_count(&self, op: Operation) -> usize {
        self.state.borrow().calls.iter().filter(|c| **c == op).count()
    }

    /// Number of handles allocated and not yet freed.
    pub fn open_handles(&self) -> usize {
        self.state.borrow().handles.len()
    }

    /// Number of successful rollbacks.
    pub fn rollback_count(&self) -> usize {
        self.state.borrow().rollbacks
    }

    /// Autocommit mode of a connection handle.
    pub fn autocommit(&self, dbc: Handle) -> Option<bool> {
        self.state
            .borrow()
            .connections
            .get(&dbc)
            .map(|c| c.autocommit)
    }

    /// Number of result sets still queued.
    pub fn pending_results(&self) -> usize {
        self.state.borrow().responses.len()
    }

    fn encode_cell(&self, c_type: i16, value: &Value) -> Result<Vec<u8>, &'static str> {
        match (c_type, value) {
            (SQL_C_SLONG, Value::Int32(v)) => Ok(v.to_ne_bytes().to_vec()),
            (SQL_C_SLONG, Value::Int64(v)) => i32::try_from(*v)
                .map(|v| v.to_ne_bytes().to_vec())
                .map_err(|_| "22003"),
            (SQL_C_SBIGINT, Value::Int32(v)) => Ok((*v as i64).to_ne_bytes().to_vec()),
            (SQL_C_SBIGINT, Value::Int64(v)) => Ok(v.to_ne_bytes().to_vec()),
            (SQL_C_CHAR, Value::Text(s)) => Ok(encode_narrow_text(s, self.narrow_encoding)),
            (SQL_C_CHAR, v) => Ok(encode_narrow_text(&v.to_string(), self.narrow_encoding)),
            (SQL_C_WCHAR, Value::Text(s)) => Ok(encode_wide_text(s)),
            (SQL_C_WCHAR, v) => Ok(encode_wide_text(&v.to_string())),
            _ => Err("07006"),
        }
    }
}

/// Copy one cell into its slot.
///
/// Text is cut to fit in front of the terminator; the indicator keeps the full
/// length. Returns whether the value was truncated.
///
/// # Safety
///
/// `column` must describe live memory registered through `bind_col` with room
/// for `row + 1` slots.
unsafe fn write_cell(column: &BoundColumn, row: usize, bytes: Option<&[u8]>) -> bool {
    let indicator = column.indicator.add(row);
    let Some(bytes) = bytes else {
        *indicator = SQL_NULL_DATA;
        return false;
    };
    let slot = column.buffer.add(row * column.buffer_length);
    let terminator = match column.c_type {
        SQL_C_CHAR => 1,
        SQL_C_WCHAR => 2,
        _ => 0,
    };
    let room = column.buffer_length.saturating_sub(terminator);
    let mut n = bytes.len().min(room);
    if terminator == 2 {
        n -= n % 2;
    }
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), slot, n);
    std::ptr::write_bytes(slot.add(n), 0, terminator.min(column.buffer_length - n));
    *indicator = bytes.len() as i64;
    terminator > 0 && n < bytes.len()
}

impl Driver for InMemoryDriver {
    fn alloc_handle(&self, kind: HandleType, parent: Handle) -> (SqlReturn, Handle) {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.enter(Operation::AllocHandle, parent) {
            return (status, Handle::NULL);
        }
        let parent_ok = match kind {
            HandleType::Env => parent.is_null(),
            HandleType::Dbc => state.is_kind(parent, HandleType::Env),
            HandleType::Stmt => matches!(state.connections.get(&parent), Some(c) if c.connected),
        };
        if !parent_ok {
            return (SqlReturn::InvalidHandle, Handle::NULL);
        }
        state.next_handle += 1;
        let handle = Handle(state.next_handle);
        state.handles.insert(handle, (kind, parent));
        match kind {
            HandleType::Dbc => {
                state.connections.insert(
                    handle,
                    ConnectionState {
                        autocommit: true,
                        ..Default::default()
                    },
                );
            }
            HandleType::Stmt => {
                state.statements.insert(handle, StatementState::new(parent));
            }
            HandleType::Env => {}
        }
        (SqlReturn::Success, handle)
    }

    fn free_handle(&self, kind: HandleType, handle: Handle) -> SqlReturn {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.enter(Operation::FreeHandle, handle) {
            return status;
        }
        if !state.is_kind(handle, kind) {
            return SqlReturn::InvalidHandle;
        }
        if state.children(handle) > 0 {
            return state.error(handle, SQLSTATE_FUNCTION_SEQUENCE_ERROR, "child handles still allocated");
        }
        if matches!(state.connections.get(&handle), Some(c) if c.connected) {
            return state.error(handle, SQLSTATE_FUNCTION_SEQUENCE_ERROR, "connection still open");
        }
        state.handles.remove(&handle);
        state.statements.remove(&handle);
        state.connections.remove(&handle);
        state.versions.remove(&handle);
        state.diagnostics.remove(&handle);
        SqlReturn::Success
    }

    fn set_odbc_version(&self, env: Handle, version: OdbcVersion) -> SqlReturn {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.enter(Operation::SetOdbcVersion, env) {
            return status;
        }
        if !state.is_kind(env, HandleType::Env) {
            return SqlReturn::InvalidHandle;
        }
        state.versions.insert(env, version);
        SqlReturn::Success
    }

    fn driver_connect(&self, dbc: Handle, connection_string: &str) -> SqlReturn {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.enter(Operation::Connect, dbc) {
            return status;
        }
        let Some((_, env)) = state.handles.get(&dbc).copied() else {
            return SqlReturn::InvalidHandle;
        };
        if !state.versions.contains_key(&env) {
            return state.error(dbc, SQLSTATE_FUNCTION_SEQUENCE_ERROR, "ODBC version not set");
        }
        if connection_string.trim().is_empty() {
            return state.error(dbc, SQLSTATE_CONNECTION_FAILURE, "empty connection string");
        }
        state.connection_strings.push(connection_string.to_string());
        if let Some(conn) = state.connections.get_mut(&dbc) {
            conn.connected = true;
        }
        SqlReturn::Success
    }

    fn set_autocommit(&self, dbc: Handle, enabled: bool) -> SqlReturn {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.enter(Operation::SetAutocommit, dbc) {
            return status;
        }
        match state.connections.get_mut(&dbc) {
            Some(conn) => {
                conn.autocommit = enabled;
                SqlReturn::Success
            }
            None => SqlReturn::InvalidHandle,
        }
    }

    fn end_transaction(&self, dbc: Handle, completion: Completion) -> SqlReturn {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.enter(Operation::EndTransaction, dbc) {
            return status;
        }
        let Some(conn) = state.connections.get_mut(&dbc) else {
            return SqlReturn::InvalidHandle;
        };
        if !conn.connected {
            return state.error(dbc, "08003", "connection not open");
        }
        conn.in_transaction = false;
        match completion {
            Completion::Rollback => state.rollbacks += 1,
        }
        SqlReturn::Success
    }

    fn disconnect(&self, dbc: Handle) -> SqlReturn {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.enter(Operation::Disconnect, dbc) {
            return status;
        }
        let Some(conn) = state.connections.get(&dbc) else {
            return SqlReturn::InvalidHandle;
        };
        if !conn.connected {
            return state.error(dbc, "08003", "connection not open");
        }
        if conn.in_transaction {
            return state.error(dbc, "25000", "invalid transaction state");
        }
        if state.children(dbc) > 0 {
            return state.error(dbc, SQLSTATE_FUNCTION_SEQUENCE_ERROR, "statements still allocated");
        }
        if let Some(conn) = state.connections.get_mut(&dbc) {
            conn.connected = false;
        }
        SqlReturn::Success
    }

    fn prepare(&self, stmt: Handle, sql: &str) -> SqlReturn {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.enter(Operation::Prepare, stmt) {
            return status;
        }
        let Some(st) = state.statements.get_mut(&stmt) else {
            return SqlReturn::InvalidHandle;
        };
        if st.result.is_some() {
            return state.error(stmt, SQLSTATE_INVALID_CURSOR_STATE, "cursor still open");
        }
        st.sql = Some(sql.to_string());
        state.prepared.push(sql.to_string());
        SqlReturn::Success
    }

    fn execute(&self, stmt: Handle) -> SqlReturn {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.enter(Operation::Execute, stmt) {
            return status;
        }
        let Some(st) = state.statements.get(&stmt) else {
            return SqlReturn::InvalidHandle;
        };
        if st.sql.is_none() {
            return state.error(stmt, SQLSTATE_FUNCTION_SEQUENCE_ERROR, "statement not prepared");
        }
        if st.result.is_some() {
            return state.error(stmt, SQLSTATE_INVALID_CURSOR_STATE, "cursor still open");
        }
        let parent = st.parent;
        let result = state.responses.pop_front().unwrap_or_else(ResultSet::empty);
        if let Some(conn) = state.connections.get_mut(&parent) {
            conn.in_transaction = !conn.autocommit;
        }
        if let Some(st) = state.statements.get_mut(&stmt) {
            st.result = Some(result);
            st.position = 0;
        }
        SqlReturn::Success
    }

    fn num_result_cols(&self, stmt: Handle) -> (SqlReturn, i16) {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.enter(Operation::NumResultCols, stmt) {
            return (status, 0);
        }
        match state.statements.get(&stmt) {
            Some(st) => {
                let count = st.result.as_ref().map_or(0, |r| r.columns.len());
                (SqlReturn::Success, count as i16)
            }
            None => (SqlReturn::InvalidHandle, 0),
        }
    }

    fn describe_col(&self, stmt: Handle, column: u16) -> (SqlReturn, ColumnDescriptor) {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.enter(Operation::DescribeCol, stmt) {
            return (status, ColumnDescriptor::default());
        }
        let Some(st) = state.statements.get(&stmt) else {
            return (SqlReturn::InvalidHandle, ColumnDescriptor::default());
        };
        let descriptor = st
            .result
            .as_ref()
            .and_then(|r| r.columns.get((column as usize).wrapping_sub(1)))
            .cloned();
        match descriptor {
            Some(d) => (SqlReturn::Success, d),
            None => (
                state.error(stmt, SQLSTATE_INVALID_DESCRIPTOR_INDEX, "invalid descriptor index"),
                ColumnDescriptor::default(),
            ),
        }
    }

    unsafe fn set_stmt_attr(&self, stmt: Handle, attr: StatementAttribute) -> SqlReturn {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.enter(Operation::SetStmtAttr, stmt) {
            return status;
        }
        let Some(st) = state.statements.get_mut(&stmt) else {
            return SqlReturn::InvalidHandle;
        };
        match attr {
            StatementAttribute::RowArraySize(0) => {
                return state.error(stmt, "HY024", "invalid attribute value");
            }
            StatementAttribute::RowArraySize(n) => st.array_size = n,
            StatementAttribute::RowStatusPtr(ptr) => st.row_status = ptr,
            StatementAttribute::RowsFetchedPtr(ptr) => st.rows_fetched = ptr,
        }
        SqlReturn::Success
    }

    unsafe fn bind_col(
        &self,
        stmt: Handle,
        column: u16,
        c_type: i16,
        buffer: *mut u8,
        buffer_length: usize,
        indicator: *mut i64,
    ) -> SqlReturn {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.enter(Operation::BindCol, stmt) {
            return status;
        }
        let Some(st) = state.statements.get_mut(&stmt) else {
            return SqlReturn::InvalidHandle;
        };
        if column == 0 {
            return state.error(stmt, SQLSTATE_INVALID_DESCRIPTOR_INDEX, "bookmarks not supported");
        }
        if !matches!(c_type, SQL_C_SLONG | SQL_C_SBIGINT | SQL_C_CHAR | SQL_C_WCHAR) {
            return state.error(stmt, "HY003", "invalid application buffer type");
        }
        st.bindings.insert(
            column,
            BoundColumn {
                c_type,
                buffer,
                buffer_length,
                indicator,
            },
        );
        SqlReturn::Success
    }

    fn row_count(&self, stmt: Handle) -> (SqlReturn, i64) {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.enter(Operation::RowCount, stmt) {
            return (status, 0);
        }
        match state.statements.get(&stmt) {
            Some(st) => (
                SqlReturn::Success,
                st.result.as_ref().map_or(-1, |r| r.row_count),
            ),
            None => (SqlReturn::InvalidHandle, 0),
        }
    }

    fn fetch(&self, stmt: Handle) -> SqlReturn {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.enter(Operation::Fetch, stmt) {
            return status;
        }
        let Some(st) = state.statements.get(&stmt) else {
            return SqlReturn::InvalidHandle;
        };
        let Some(result) = st.result.as_ref() else {
            return state.error(stmt, SQLSTATE_INVALID_CURSOR_STATE, "no open cursor");
        };
        if result.columns.is_empty() {
            return state.error(stmt, SQLSTATE_INVALID_CURSOR_STATE, "no result set");
        }

        let start = st.position;
        let n = st.array_size.min(result.rows.len() - start);
        let array_size = st.array_size;
        let (rows_fetched, row_status) = (st.rows_fetched, st.row_status);

        // SAFETY: the pointers were registered through set_stmt_attr, whose
        // contract keeps them valid for `array_size` entries.
        unsafe {
            if !rows_fetched.is_null() {
                *rows_fetched = n;
            }
        }
        if n == 0 {
            return SqlReturn::NoData;
        }

        let mut truncated = false;
        let mut conversion_error = None;
        for (&number, column) in &st.bindings {
            let index = number as usize - 1;
            for i in 0..n {
                let value = result.rows[start + i].get(index).unwrap_or(&Value::Null);
                let bytes = match value {
                    Value::Null => None,
                    v => match self.encode_cell(column.c_type, v) {
                        Ok(bytes) => Some(bytes),
                        Err(sqlstate) => {
                            conversion_error = Some((sqlstate, number));
                            continue;
                        }
                    },
                };
                // SAFETY: bind_col's contract guarantees `array_size` slots.
                truncated |= unsafe { write_cell(column, i, bytes.as_deref()) };
            }
        }
        unsafe {
            if !row_status.is_null() {
                for i in 0..array_size {
                    *row_status.add(i) = if i < n { SQL_ROW_SUCCESS } else { SQL_ROW_NOROW };
                }
            }
        }

        if let Some(st) = state.statements.get_mut(&stmt) {
            st.position += n;
        }
        if let Some((sqlstate, number)) = conversion_error {
            return state.error(
                stmt,
                sqlstate,
                format!("value in column {} cannot be converted", number),
            );
        }
        if truncated {
            state.info(stmt, SQLSTATE_STRING_TRUNCATED, "String data, right truncated");
            return SqlReturn::SuccessWithInfo;
        }
        SqlReturn::Success
    }

    fn free_stmt(&self, stmt: Handle, option: FreeStmtOption) -> SqlReturn {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.enter(Operation::FreeStmt, stmt) {
            return status;
        }
        let Some(st) = state.statements.get_mut(&stmt) else {
            return SqlReturn::InvalidHandle;
        };
        match option {
            FreeStmtOption::Close => {
                st.result = None;
                st.position = 0;
            }
            FreeStmtOption::Unbind => st.bindings.clear(),
        }
        SqlReturn::Success
    }

    fn get_diag_rec(&self, _kind: HandleType, handle: Handle, record: i16) -> (SqlReturn, Diagnostic) {
        let mut state = self.state.borrow_mut();
        state.calls.push(Operation::GetDiagRec);
        if let Some(failure) = state.failures.get(&Operation::GetDiagRec) {
            if failure.skip == 0 {
                return (SqlReturn::Error, Diagnostic::default());
            }
        }
        if record < 1 {
            return (SqlReturn::Error, Diagnostic::default());
        }
        match state
            .diagnostics
            .get(&handle)
            .and_then(|records| records.get(record as usize - 1))
        {
            Some(diagnostic) => (SqlReturn::Success, diagnostic.clone()),
            None => (SqlReturn::NoData, Diagnostic::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(driver: &InMemoryDriver) -> (Handle, Handle) {
        let (_, env) = driver.alloc_handle(HandleType::Env, Handle::NULL);
        assert!(driver.set_odbc_version(env, OdbcVersion::Odbc3).is_success());
        let (_, dbc) = driver.alloc_handle(HandleType::Dbc, env);
        assert!(driver.driver_connect(dbc, "DSN=memory").is_success());
        (env, dbc)
    }

    #[test]
    fn test_connect_requires_version() {
        let driver = InMemoryDriver::new();
        let (_, env) = driver.alloc_handle(HandleType::Env, Handle::NULL);
        let (_, dbc) = driver.alloc_handle(HandleType::Dbc, env);
        assert_eq!(driver.driver_connect(dbc, "DSN=x"), SqlReturn::Error);
        let (status, diag) = driver.get_diag_rec(HandleType::Dbc, dbc, 1);
        assert!(status.is_success());
        assert_eq!(diag.state, SQLSTATE_FUNCTION_SEQUENCE_ERROR);
    }

    #[test]
    fn test_fetch_writes_bound_buffers() {
        let driver = InMemoryDriver::new().with_result(
            ResultSetBuilder::new()
                .column("n", SQL_INTEGER, 10)
                .rows((1..=3).map(|i| vec![Value::Int32(i)]))
                .build(),
        );
        let (_, dbc) = connected(&driver);
        let (_, stmt) = driver.alloc_handle(HandleType::Stmt, dbc);

        let mut values = [0u8; 8];
        let mut indicators = [0i64; 2];
        let mut fetched = 0usize;
        unsafe {
            assert!(driver
                .set_stmt_attr(stmt, StatementAttribute::RowArraySize(2))
                .is_success());
            assert!(driver
                .set_stmt_attr(stmt, StatementAttribute::RowsFetchedPtr(&mut fetched))
                .is_success());
        }
        assert!(driver.prepare(stmt, "SELECT n FROM t").is_success());
        assert!(driver.execute(stmt).is_success());
        unsafe {
            assert!(driver
                .bind_col(stmt, 1, SQL_C_SLONG, values.as_mut_ptr(), 4, indicators.as_mut_ptr())
                .is_success());
        }

        assert_eq!(driver.fetch(stmt), SqlReturn::Success);
        assert_eq!(fetched, 2);
        assert_eq!(i32::from_ne_bytes(values[4..8].try_into().unwrap()), 2);
        assert_eq!(indicators, [4, 4]);

        assert_eq!(driver.fetch(stmt), SqlReturn::Success);
        assert_eq!(fetched, 1);
        assert_eq!(driver.fetch(stmt), SqlReturn::NoData);
        assert_eq!(fetched, 0);
        assert_eq!(driver.prepared_statements(), vec!["SELECT n FROM t"]);
    }

    #[test]
    fn test_text_truncation_reports_full_length() {
        let driver = InMemoryDriver::new().with_result(
            ResultSetBuilder::new()
                .column("s", SQL_VARCHAR, 3)
                .row(vec![Value::from("abcdef")])
                .build(),
        );
        let (_, dbc) = connected(&driver);
        let (_, stmt) = driver.alloc_handle(HandleType::Stmt, dbc);
        let mut values = [0xffu8; 4];
        let mut indicator = 0i64;
        driver.prepare(stmt, "SELECT s FROM t");
        driver.execute(stmt);
        unsafe {
            driver.bind_col(stmt, 1, SQL_C_CHAR, values.as_mut_ptr(), 4, &mut indicator);
        }
        assert_eq!(driver.fetch(stmt), SqlReturn::SuccessWithInfo);
        assert_eq!(&values, b"abc\0");
        assert_eq!(indicator, 6);
        let (_, diag) = driver.get_diag_rec(HandleType::Stmt, stmt, 1);
        assert_eq!(diag.state, SQLSTATE_STRING_TRUNCATED);
    }

    #[test]
    fn test_execute_with_open_cursor_fails() {
        let driver = InMemoryDriver::new();
        let (_, dbc) = connected(&driver);
        let (_, stmt) = driver.alloc_handle(HandleType::Stmt, dbc);
        driver.prepare(stmt, "SELECT 1");
        assert!(driver.execute(stmt).is_success());
        assert_eq!(driver.execute(stmt), SqlReturn::Error);
        assert!(driver.free_stmt(stmt, FreeStmtOption::Close).is_success());
        assert!(driver.execute(stmt).is_success());
    }

    #[test]
    fn test_fail_after_skips_calls() {
        let driver = InMemoryDriver::new().fail_after(Operation::Prepare, 1);
        let (_, dbc) = connected(&driver);
        let (_, stmt) = driver.alloc_handle(HandleType::Stmt, dbc);
        assert!(driver.prepare(stmt, "SELECT 1").is_success());
        assert_eq!(driver.prepare(stmt, "SELECT 2"), SqlReturn::Error);
        assert_eq!(driver.call_count(Operation::Prepare), 2);
    }

    #[test]
    fn test_disconnect_requires_end_of_transaction() {
        let driver = InMemoryDriver::new();
        let (_, dbc) = connected(&driver);
        assert!(driver.set_autocommit(dbc, false).is_success());
        let (_, stmt) = driver.alloc_handle(HandleType::Stmt, dbc);
        driver.prepare(stmt, "DELETE FROM t");
        driver.execute(stmt);
        assert!(driver.free_handle(HandleType::Stmt, stmt).is_success());
        assert_eq!(driver.disconnect(dbc), SqlReturn::Error);
        assert!(driver.end_transaction(dbc, Completion::Rollback).is_success());
        assert!(driver.disconnect(dbc).is_success());
        assert_eq!(driver.rollback_count(), 1);
    }
}
