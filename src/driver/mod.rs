//! Driver manager boundary.
//!
//! Everything the crate needs from an ODBC driver manager goes through the
//! [`Driver`] trait. Each method mirrors one ODBC call: it returns the call's
//! status and, where the C function has out-parameters, the out-values next
//! to it. Interpreting the status (and fetching diagnostics on failure) is
//! the caller's job, see [`diagnostics`].

pub mod binding;
pub mod connect;
pub mod constants;
pub mod decode;
pub mod diagnostics;
pub mod in_memory;
#[cfg(feature = "odbc")]
pub mod odbc;
pub mod types;

use crate::error::Diagnostic;
use constants::*;

pub use binding::{BindingSet, ColumnBinding, ColumnBuffer};
pub use connect::{ConnectParams, NarrowEncoding};
pub use in_memory::{InMemoryDriver, Operation, ResultSet, ResultSetBuilder};
#[cfg(feature = "odbc")]
pub use odbc::OdbcDriver;
pub use types::{classify, Column, ColumnDescriptor, ColumnInfo, ElementKind, ElementLayout, Row, Value};

/// Opaque handle issued by the driver manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Handle(pub usize);

impl Handle {
    /// The null handle, used as parent when allocating an environment.
    pub const NULL: Handle = Handle(0);

    /// Check if this is the null handle.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Scope of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleType {
    Env,
    Dbc,
    Stmt,
}

impl HandleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleType::Env => "environment",
            HandleType::Dbc => "connection",
            HandleType::Stmt => "statement",
        }
    }
}

/// Status code returned by every boundary call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlReturn {
    Success,
    SuccessWithInfo,
    NoData,
    Error,
    InvalidHandle,
    StillExecuting,
    NeedData,
    Other(i16),
}

impl SqlReturn {
    /// Map a raw `SQLRETURN` value.
    pub fn from_raw(code: i16) -> Self {
        match code {
            SQL_SUCCESS => SqlReturn::Success,
            SQL_SUCCESS_WITH_INFO => SqlReturn::SuccessWithInfo,
            SQL_NO_DATA => SqlReturn::NoData,
            SQL_ERROR => SqlReturn::Error,
            SQL_INVALID_HANDLE => SqlReturn::InvalidHandle,
            SQL_STILL_EXECUTING => SqlReturn::StillExecuting,
            SQL_NEED_DATA => SqlReturn::NeedData,
            other => SqlReturn::Other(other),
        }
    }

    /// The raw `SQLRETURN` value.
    pub fn as_raw(&self) -> i16 {
        match self {
            SqlReturn::Success => SQL_SUCCESS,
            SqlReturn::SuccessWithInfo => SQL_SUCCESS_WITH_INFO,
            SqlReturn::NoData => SQL_NO_DATA,
            SqlReturn::Error => SQL_ERROR,
            SqlReturn::InvalidHandle => SQL_INVALID_HANDLE,
            SqlReturn::StillExecuting => SQL_STILL_EXECUTING,
            SqlReturn::NeedData => SQL_NEED_DATA,
            SqlReturn::Other(code) => *code,
        }
    }

    /// `SQL_SUCCESS` or `SQL_SUCCESS_WITH_INFO`.
    pub fn is_success(&self) -> bool {
        matches!(self, SqlReturn::Success | SqlReturn::SuccessWithInfo)
    }
}

/// ODBC behaviour version requested from the driver manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdbcVersion {
    Odbc3,
}

/// Transaction completion type for `SQLEndTran`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Rollback,
}

/// Option for `SQLFreeStmt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeStmtOption {
    /// Close the open cursor and discard pending results.
    Close,
    /// Release all column buffers bound by `SQLBindCol`.
    Unbind,
}

/// Statement attributes the fetch engine sets before each execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementAttribute {
    /// `SQL_ATTR_ROW_ARRAY_SIZE`: rows returned per `SQLFetch`.
    RowArraySize(usize),
    /// `SQL_ATTR_ROW_STATUS_PTR`: one status entry per row slot.
    RowStatusPtr(*mut u16),
    /// `SQL_ATTR_ROWS_FETCHED_PTR`: receives the row count of each fetch.
    RowsFetchedPtr(*mut usize),
}

/// The driver manager call surface.
///
/// All calls block the calling thread until the data source answers. Handles
/// and the buffers registered with them must be used from one thread at a
/// time.
pub trait Driver {
    /// `SQLAllocHandle`. `parent` is [`Handle::NULL`] for environments.
    fn alloc_handle(&self, kind: HandleType, parent: Handle) -> (SqlReturn, Handle);

    /// `SQLFreeHandle`.
    fn free_handle(&self, kind: HandleType, handle: Handle) -> SqlReturn;

    /// `SQLSetEnvAttr(SQL_ATTR_ODBC_VERSION)`.
    fn set_odbc_version(&self, env: Handle, version: OdbcVersion) -> SqlReturn;

    /// `SQLDriverConnect` without prompting. The string is passed through as is.
    fn driver_connect(&self, dbc: Handle, connection_string: &str) -> SqlReturn;

    /// `SQLSetConnectAttr(SQL_ATTR_AUTOCOMMIT)`.
    fn set_autocommit(&self, dbc: Handle, enabled: bool) -> SqlReturn;

    /// `SQLEndTran` on a connection handle.
    fn end_transaction(&self, dbc: Handle, completion: Completion) -> SqlReturn;

    /// `SQLDisconnect`.
    fn disconnect(&self, dbc: Handle) -> SqlReturn;

    /// `SQLPrepare`.
    fn prepare(&self, stmt: Handle, sql: &str) -> SqlReturn;

    /// `SQLExecute` of the prepared statement.
    fn execute(&self, stmt: Handle) -> SqlReturn;

    /// `SQLNumResultCols`.
    fn num_result_cols(&self, stmt: Handle) -> (SqlReturn, i16);

    /// `SQLDescribeCol` for a 1-based column number.
    fn describe_col(&self, stmt: Handle, column: u16) -> (SqlReturn, types::ColumnDescriptor);

    /// `SQLSetStmtAttr`.
    ///
    /// # Safety
    ///
    /// Pointer attributes are written by every later fetch. The pointee must
    /// stay valid (and, for the row status array, hold at least as many entries
    /// as the row array size) until the attribute is replaced or the statement
    /// handle is freed.
    unsafe fn set_stmt_attr(&self, stmt: Handle, attr: StatementAttribute) -> SqlReturn;

    /// `SQLBindCol` for a 1-based column number.
    ///
    /// # Safety
    ///
    /// `buffer` must point to `buffer_length * row_array_size` writable bytes and
    /// `indicator` to `row_array_size` writable values. Both must stay valid
    /// until the column is unbound (`FreeStmtOption::Unbind`) or the statement
    /// handle is freed.
    unsafe fn bind_col(
        &self,
        stmt: Handle,
        column: u16,
        c_type: i16,
        buffer: *mut u8,
        buffer_length: usize,
        indicator: *mut i64,
    ) -> SqlReturn;

    /// `SQLRowCount`.
    fn row_count(&self, stmt: Handle) -> (SqlReturn, i64);

    /// `SQLFetch`: fills the bound buffers with the next row set.
    fn fetch(&self, stmt: Handle) -> SqlReturn;

    /// `SQLFreeStmt`.
    fn free_stmt(&self, stmt: Handle, option: FreeStmtOption) -> SqlReturn;

    /// `SQLGetDiagRec` for a 1-based record number.
    fn get_diag_rec(&self, kind: HandleType, handle: Handle, record: i16) -> (SqlReturn, Diagnostic);
}

impl<D: Driver + ?Sized> Driver for &D {
    fn alloc_handle(&self, kind: HandleType, parent: Handle) -> (SqlReturn, Handle) {
        (**self).alloc_handle(kind, parent)
    }

    fn free_handle(&self, kind: HandleType, handle: Handle) -> SqlReturn {
        (**self).free_handle(kind, handle)
    }

    fn set_odbc_version(&self, env: Handle, version: OdbcVersion) -> SqlReturn {
        (**self).set_odbc_version(env, version)
    }

    fn driver_connect(&self, dbc: Handle, connection_string: &str) -> SqlReturn {
        (**self).driver_connect(dbc, connection_string)
    }

    fn set_autocommit(&self, dbc: Handle, enabled: bool) -> SqlReturn {
        (**self).set_autocommit(dbc, enabled)
    }

    fn end_transaction(&self, dbc: Handle, completion: Completion) -> SqlReturn {
        (**self).end_transaction(dbc, completion)
    }

    fn disconnect(&self, dbc: Handle) -> SqlReturn {
        (**self).disconnect(dbc)
    }

    fn prepare(&self, stmt: Handle, sql: &str) -> SqlReturn {
        (**self).prepare(stmt, sql)
    }

    fn execute(&self, stmt: Handle) -> SqlReturn {
        (**self).execute(stmt)
    }

    fn num_result_cols(&self, stmt: Handle) -> (SqlReturn, i16) {
        (**self).num_result_cols(stmt)
    }

    fn describe_col(&self, stmt: Handle, column: u16) -> (SqlReturn, types::ColumnDescriptor) {
        (**self).describe_col(stmt, column)
    }

    unsafe fn set_stmt_attr(&self, stmt: Handle, attr: StatementAttribute) -> SqlReturn {
        (**self).set_stmt_attr(stmt, attr)
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
        (**self).bind_col(stmt, column, c_type, buffer, buffer_length, indicator)
    }

    fn row_count(&self, stmt: Handle) -> (SqlReturn, i64) {
        (**self).row_count(stmt)
    }

    fn fetch(&self, stmt: Handle) -> SqlReturn {
        (**self).fetch(stmt)
    }

    fn free_stmt(&self, stmt: Handle, option: FreeStmtOption) -> SqlReturn {
        (**self).free_stmt(stmt, option)
    }

    fn get_diag_rec(&self, kind: HandleType, handle: Handle, record: i16) -> (SqlReturn, Diagnostic) {
        (**self).get_diag_rec(kind, handle, record)
    }
}
