//! ODBC constants.
//!
//! Values match `sql.h` / `sqlext.h` of the ODBC 3.x headers.

// Return codes
pub const SQL_SUCCESS: i16 = 0;
pub const SQL_SUCCESS_WITH_INFO: i16 = 1;
pub const SQL_NO_DATA: i16 = 100;
pub const SQL_ERROR: i16 = -1;
pub const SQL_INVALID_HANDLE: i16 = -2;
pub const SQL_STILL_EXECUTING: i16 = 2;
pub const SQL_NEED_DATA: i16 = 99;

// SQL data types reported by SQLDescribeCol
pub const SQL_CHAR: i16 = 1;
pub const SQL_NUMERIC: i16 = 2;
pub const SQL_DECIMAL: i16 = 3;
pub const SQL_INTEGER: i16 = 4;
pub const SQL_SMALLINT: i16 = 5;
pub const SQL_FLOAT: i16 = 6;
pub const SQL_REAL: i16 = 7;
pub const SQL_DOUBLE: i16 = 8;
pub const SQL_VARCHAR: i16 = 12;
pub const SQL_TYPE_DATE: i16 = 91;
pub const SQL_TYPE_TIMESTAMP: i16 = 93;
pub const SQL_LONGVARCHAR: i16 = -1;
pub const SQL_BINARY: i16 = -2;
pub const SQL_BIGINT: i16 = -5;
pub const SQL_TINYINT: i16 = -6;
pub const SQL_BIT: i16 = -7;
pub const SQL_WCHAR: i16 = -8;
pub const SQL_WVARCHAR: i16 = -9;
pub const SQL_WLONGVARCHAR: i16 = -10;

// C data types passed to SQLBindCol
pub const SQL_C_CHAR: i16 = SQL_CHAR;
pub const SQL_C_WCHAR: i16 = SQL_WCHAR;
pub const SQL_C_SLONG: i16 = -16;
pub const SQL_C_SBIGINT: i16 = -25;

// Length / indicator values
pub const SQL_NULL_DATA: i64 = -1;
pub const SQL_NO_TOTAL: i64 = -4;

// Nullability reported by SQLDescribeCol
pub const SQL_NO_NULLS: i16 = 0;
pub const SQL_NULLABLE: i16 = 1;
pub const SQL_NULLABLE_UNKNOWN: i16 = 2;

// Row status values written through SQL_ATTR_ROW_STATUS_PTR
pub const SQL_ROW_SUCCESS: u16 = 0;
pub const SQL_ROW_SUCCESS_WITH_INFO: u16 = 6;
pub const SQL_ROW_NOROW: u16 = 3;

// Autocommit
pub const SQL_AUTOCOMMIT_OFF: usize = 0;
pub const SQL_AUTOCOMMIT_ON: usize = 1;

// SQLSTATE values used by the crate's own drivers
pub const SQLSTATE_GENERAL_ERROR: &str = "HY000";
pub const SQLSTATE_STRING_TRUNCATED: &str = "01004";
pub const SQLSTATE_INVALID_CURSOR_STATE: &str = "24000";
pub const SQLSTATE_INVALID_DESCRIPTOR_INDEX: &str = "07009";
pub const SQLSTATE_FUNCTION_SEQUENCE_ERROR: &str = "HY010";
pub const SQLSTATE_CONNECTION_FAILURE: &str = "08001";
pub const SQLSTATE_MEMORY_ALLOCATION: &str = "HY001";
