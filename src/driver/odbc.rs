//! System driver manager backend (`odbc` feature).
//!
//! Thin forwarding layer over `odbc-sys`. Strings cross the boundary as
//! UTF-16 through the `W` entry points; everything else is passed as is.

use odbc_sys::{
    CDataType, CompletionType, ConnectionAttribute, DriverConnectOption, EnvironmentAttribute,
    HDbc, HEnv, HStmt, Integer, Len, Nullability as Nullable, Pointer, SmallInt, SqlDataType, ULen, WChar,
};

use super::constants::*;
use super::types::{nullable_from_raw, ColumnDescriptor};
use super::{
    Completion, Driver, FreeStmtOption, Handle, HandleType, OdbcVersion, SqlReturn,
    StatementAttribute,
};
use crate::error::Diagnostic;

// Indicators are bound as `i64`; SQLLEN must have the same layout.
const _: () = assert!(std::mem::size_of::<Len>() == std::mem::size_of::<i64>());

/// Initial column name buffer, in UTF-16 units.
const NAME_BUFFER_LEN: usize = 256;

/// Diagnostic message buffer, in UTF-16 units.
const MESSAGE_BUFFER_LEN: usize = 1024;

/// Driver backed by the system ODBC driver manager (unixODBC, iODBC or the
/// Windows driver manager).
#[derive(Debug, Default, Clone, Copy)]
pub struct OdbcDriver;

impl OdbcDriver {
    pub fn new() -> Self {
        Self
    }
}

fn status(ret: odbc_sys::SqlReturn) -> SqlReturn {
    SqlReturn::from_raw(ret.0)
}

fn handle_type(kind: HandleType) -> odbc_sys::HandleType {
    match kind {
        HandleType::Env => odbc_sys::HandleType::Env,
        HandleType::Dbc => odbc_sys::HandleType::Dbc,
        HandleType::Stmt => odbc_sys::HandleType::Stmt,
    }
}

fn c_data_type(c_type: i16) -> Option<CDataType> {
    match c_type {
        SQL_C_CHAR => Some(CDataType::Char),
        SQL_C_WCHAR => Some(CDataType::WChar),
        SQL_C_SLONG => Some(CDataType::SLong),
        SQL_C_SBIGINT => Some(CDataType::SBigInt),
        _ => None,
    }
}

fn to_wide(text: &str) -> Vec<WChar> {
    text.encode_utf16().collect()
}

fn from_wide(units: &[WChar]) -> String {
    String::from_utf16_lossy(units)
}

fn raw(handle: Handle) -> odbc_sys::Handle {
    handle.0 as odbc_sys::Handle
}

fn env(handle: Handle) -> HEnv {
    handle.0 as HEnv
}

fn dbc(handle: Handle) -> HDbc {
    handle.0 as HDbc
}

fn stmt(handle: Handle) -> HStmt {
    handle.0 as HStmt
}

impl Driver for OdbcDriver {
    fn alloc_handle(&self, kind: HandleType, parent: Handle) -> (SqlReturn, Handle) {
        let mut out: odbc_sys::Handle = std::ptr::null_mut();
        // SAFETY: `out` is a valid out-pointer; `parent` came from this driver.
        let ret = unsafe { odbc_sys::SQLAllocHandle(handle_type(kind), raw(parent), &mut out) };
        (status(ret), Handle(out as usize))
    }

    fn free_handle(&self, kind: HandleType, handle: Handle) -> SqlReturn {
        // SAFETY: callers free each handle once, children before parents.
        status(unsafe { odbc_sys::SQLFreeHandle(handle_type(kind), raw(handle)) })
    }

    fn set_odbc_version(&self, handle: Handle, version: OdbcVersion) -> SqlReturn {
        let value = match version {
            OdbcVersion::Odbc3 => odbc_sys::AttrOdbcVersion::Odbc3 as usize,
        };
        // SAFETY: integer attributes are passed by value in the pointer argument.
        status(unsafe {
            odbc_sys::SQLSetEnvAttr(
                env(handle),
                EnvironmentAttribute::OdbcVersion,
                value as Pointer,
                0,
            )
        })
    }

    fn driver_connect(&self, handle: Handle, connection_string: &str) -> SqlReturn {
        let wide = to_wide(connection_string);
        let Ok(length) = SmallInt::try_from(wide.len()) else {
            return SqlReturn::Error;
        };
        let mut out_length: SmallInt = 0;
        // SAFETY: the input string outlives the call; no output buffer is given.
        status(unsafe {
            odbc_sys::SQLDriverConnectW(
                dbc(handle),
                std::ptr::null_mut(),
                wide.as_ptr(),
                length,
                std::ptr::null_mut(),
                0,
                &mut out_length,
                DriverConnectOption::NoPrompt,
            )
        })
    }

    fn set_autocommit(&self, handle: Handle, enabled: bool) -> SqlReturn {
        let value = if enabled {
            SQL_AUTOCOMMIT_ON
        } else {
            SQL_AUTOCOMMIT_OFF
        };
        // SAFETY: integer attribute passed by value.
        status(unsafe {
            odbc_sys::SQLSetConnectAttrW(
                dbc(handle),
                ConnectionAttribute::AutoCommit,
                value as Pointer,
                0,
            )
        })
    }

    fn end_transaction(&self, handle: Handle, completion: Completion) -> SqlReturn {
        let completion = match completion {
            Completion::Rollback => CompletionType::Rollback,
        };
        // SAFETY: plain call on a live connection handle.
        status(unsafe {
            odbc_sys::SQLEndTran(odbc_sys::HandleType::Dbc, raw(handle), completion)
        })
    }

    fn disconnect(&self, handle: Handle) -> SqlReturn {
        // SAFETY: plain call on a live connection handle.
        status(unsafe { odbc_sys::SQLDisconnect(dbc(handle)) })
    }

    fn prepare(&self, handle: Handle, sql: &str) -> SqlReturn {
        let wide = to_wide(sql);
        let Ok(length) = Integer::try_from(wide.len()) else {
            return SqlReturn::Error;
        };
        // SAFETY: the statement text outlives the call.
        status(unsafe { odbc_sys::SQLPrepareW(stmt(handle), wide.as_ptr(), length) })
    }

    fn execute(&self, handle: Handle) -> SqlReturn {
        // SAFETY: plain call on a live statement handle.
        status(unsafe { odbc_sys::SQLExecute(stmt(handle)) })
    }

    fn num_result_cols(&self, handle: Handle) -> (SqlReturn, i16) {
        let mut count: SmallInt = 0;
        // SAFETY: valid out-pointer.
        let ret = unsafe { odbc_sys::SQLNumResultCols(stmt(handle), &mut count) };
        (status(ret), count)
    }

    fn describe_col(&self, handle: Handle, column: u16) -> (SqlReturn, ColumnDescriptor) {
        let mut name: Vec<WChar> = vec![0; NAME_BUFFER_LEN];
        loop {
            let mut name_length: SmallInt = 0;
            let mut data_type = SqlDataType::UNKNOWN_TYPE;
            let mut column_size: ULen = 0;
            let mut decimal_digits: SmallInt = 0;
            let mut nullable = Nullable::UNKNOWN;
            // SAFETY: every out-pointer refers to a live local and the name
            // buffer length is passed in characters.
            let ret = unsafe {
                odbc_sys::SQLDescribeColW(
                    stmt(handle),
                    column,
                    name.as_mut_ptr(),
                    name.len() as SmallInt,
                    &mut name_length,
                    &mut data_type,
                    &mut column_size,
                    &mut decimal_digits,
                    &mut nullable,
                )
            };
            let ret = status(ret);
            let needed = name_length.max(0) as usize;
            // The name did not fit, ask again with room for the terminator.
            if ret.is_success() && needed >= name.len() {
                name.resize(needed + 1, 0);
                continue;
            }
            let descriptor = ColumnDescriptor {
                name: from_wide(&name[..needed.min(name.len())]),
                data_type: data_type.0,
                column_size,
                decimal_digits,
                nullable: nullable_from_raw(nullable.0),
            };
            return (ret, descriptor);
        }
    }

    unsafe fn set_stmt_attr(&self, handle: Handle, attr: StatementAttribute) -> SqlReturn {
        let (attribute, value) = match attr {
            StatementAttribute::RowArraySize(size) => {
                (odbc_sys::StatementAttribute::RowArraySize, size as Pointer)
            }
            StatementAttribute::RowStatusPtr(ptr) => {
                (odbc_sys::StatementAttribute::RowStatusPtr, ptr as Pointer)
            }
            StatementAttribute::RowsFetchedPtr(ptr) => {
                (odbc_sys::StatementAttribute::RowsFetchedPtr, ptr as Pointer)
            }
        };
        status(odbc_sys::SQLSetStmtAttrW(stmt(handle), attribute, value, 0))
    }

    unsafe fn bind_col(
        &self,
        handle: Handle,
        column: u16,
        c_type: i16,
        buffer: *mut u8,
        buffer_length: usize,
        indicator: *mut i64,
    ) -> SqlReturn {
        let Some(target_type) = c_data_type(c_type) else {
            return SqlReturn::Error;
        };
        let Ok(buffer_length) = Len::try_from(buffer_length) else {
            return SqlReturn::Error;
        };
        status(odbc_sys::SQLBindCol(
            stmt(handle),
            column,
            target_type,
            buffer as Pointer,
            buffer_length,
            indicator as *mut Len,
        ))
    }

    fn row_count(&self, handle: Handle) -> (SqlReturn, i64) {
        let mut count: Len = 0;
        // SAFETY: valid out-pointer.
        let ret = unsafe { odbc_sys::SQLRowCount(stmt(handle), &mut count) };
        (status(ret), count as i64)
    }

    fn fetch(&self, handle: Handle) -> SqlReturn {
        // SAFETY: bound buffers are kept alive by the cursor that bound them.
        status(unsafe { odbc_sys::SQLFetch(stmt(handle)) })
    }

    fn free_stmt(&self, handle: Handle, option: FreeStmtOption) -> SqlReturn {
        let option = match option {
            FreeStmtOption::Close => odbc_sys::FreeStmtOption::Close,
            FreeStmtOption::Unbind => odbc_sys::FreeStmtOption::Unbind,
        };
        // SAFETY: plain call on a live statement handle.
        status(unsafe { odbc_sys::SQLFreeStmt(stmt(handle), option) })
    }

    fn get_diag_rec(&self, kind: HandleType, handle: Handle, record: i16) -> (SqlReturn, Diagnostic) {
        let mut state: [WChar; 6] = [0; 6];
        let mut native_error: Integer = 0;
        let mut message: Vec<WChar> = vec![0; MESSAGE_BUFFER_LEN];
        let mut message_length: SmallInt = 0;
        // SAFETY: the state buffer holds five characters plus terminator and
        // the message buffer length is passed in characters.
        let ret = unsafe {
            odbc_sys::SQLGetDiagRecW(
                handle_type(kind),
                raw(handle),
                record,
                state.as_mut_ptr(),
                &mut native_error,
                message.as_mut_ptr(),
                message.len() as SmallInt,
                &mut message_length,
            )
        };
        let length = (message_length.max(0) as usize).min(message.len().saturating_sub(1));
        let diagnostic = Diagnostic::new(
            from_wide(&state[..5]),
            native_error,
            from_wide(&message[..length]),
        );
        (status(ret), diagnostic)
    }
}
