//! Error paths and resource release against the in-memory driver.
//!
//! Run with: cargo test --test test_errors

use odbc_bulk_rs::driver::constants::*;
use odbc_bulk_rs::{
    ConnectParams, Connection, Cursor, CursorState, Diagnostic, Environment, Error,
    InMemoryDriver, Operation, Parameter, ResultSet, ResultSetBuilder, Value,
};

fn three_columns() -> ResultSet {
    ResultSetBuilder::new()
        .column("A", SQL_INTEGER, 10)
        .column("B", SQL_VARCHAR, 10)
        .column("C", SQL_BIGINT, 19)
        .rows((0..4).map(|i| vec![Value::Int32(i), Value::from("x"), Value::Int64(i as i64)]))
        .build()
}

fn params() -> ConnectParams {
    ConnectParams::new("DSN=memory").with_array_size(2)
}

#[test]
fn test_bind_failure_names_column() {
    let driver = InMemoryDriver::new()
        .with_result(three_columns())
        .fail_after(Operation::BindCol, 1);
    let env = Environment::new(&driver).unwrap();
    let mut conn = env.connect(&params()).unwrap();
    let mut cursor = conn.cursor().unwrap();
    cursor.prepare("SELECT a, b, c FROM t").unwrap();

    let err = cursor.execute().unwrap_err();
    match &err {
        Error::Bind { column, diagnostic, .. } => {
            assert_eq!(*column, Some(2));
            assert_eq!(diagnostic.state, SQLSTATE_GENERAL_ERROR);
        }
        other => panic!("Expected Bind error, got {:?}", other),
    }
    assert!(err.to_string().contains("for column 2"));
    assert_eq!(cursor.state(), CursorState::Faulted);

    match cursor.fetch_batch() {
        Err(Error::InvalidState { state, operation }) => {
            assert_eq!(state, "faulted");
            assert_eq!(operation, "fetch");
        }
        other => panic!("Expected InvalidState, got {:?}", other),
    }
    assert!(matches!(
        cursor.prepare("SELECT 1"),
        Err(Error::InvalidState { state: "faulted", .. })
    ));

    cursor.close().unwrap();
    assert!(cursor.is_closed());
}

#[test]
fn test_fetch_failure_carries_sql_state() {
    let driver = InMemoryDriver::new().with_result(three_columns()).fail_with(
        Operation::Fetch,
        1,
        Some(Diagnostic::new("08S01", 10054, "Communication link failure")),
    );
    let env = Environment::new(&driver).unwrap();
    let mut conn = env.connect(&params()).unwrap();
    let mut cursor = conn.cursor().unwrap();
    cursor.prepare("SELECT a, b, c FROM t").unwrap();
    cursor.execute().unwrap();

    assert_eq!(cursor.fetch_batch().unwrap().unwrap().len(), 2);
    let err = cursor.fetch_batch().unwrap_err();
    assert!(matches!(err, Error::Fetch { .. }));
    assert_eq!(err.sql_state(), Some("08S01"));
    assert_eq!(err.diagnostic().unwrap().native_error, 10054);
    assert_eq!(cursor.state(), CursorState::Faulted);
}

#[test]
fn test_failure_without_diagnostic() {
    let driver = InMemoryDriver::new()
        .with_result(three_columns())
        .fail_on_silently(Operation::Execute);
    let env = Environment::new(&driver).unwrap();
    let mut conn = env.connect(&params()).unwrap();
    let mut cursor = conn.cursor().unwrap();
    cursor.prepare("SELECT a, b, c FROM t").unwrap();

    match cursor.execute() {
        Err(Error::DiagnosticUnavailable { operation }) => assert_eq!(operation, "execute"),
        other => panic!("Expected DiagnosticUnavailable, got {:?}", other),
    }
}

#[test]
fn test_diagnostic_retrieval_failure() {
    let driver = InMemoryDriver::new()
        .fail_on(Operation::Prepare)
        .fail_on(Operation::GetDiagRec);
    let env = Environment::new(&driver).unwrap();
    let mut conn = env.connect(&params()).unwrap();
    let mut cursor = conn.cursor().unwrap();
    assert!(matches!(
        cursor.prepare("SELECT 1"),
        Err(Error::DiagnosticUnavailable { .. })
    ));
}

#[test]
fn test_prepare_failure_is_execute_error() {
    let driver = InMemoryDriver::new().fail_on(Operation::Prepare);
    let env = Environment::new(&driver).unwrap();
    let mut conn = env.connect(&params()).unwrap();
    let mut cursor = conn.cursor().unwrap();
    let err = cursor.prepare("SELEC 1").unwrap_err();
    assert!(matches!(err, Error::Execute { .. }));
    // A failed prepare leaves nothing to execute.
    assert_eq!(cursor.state(), CursorState::Unbound);
    assert!(cursor.sql().is_none());
}

#[test]
fn test_unsupported_type_rejected() {
    let result = ResultSetBuilder::new()
        .column("ID", SQL_INTEGER, 10)
        .column("CREATED", SQL_TYPE_DATE, 10)
        .row(vec![Value::Int32(1), Value::Null])
        .build();
    let driver = InMemoryDriver::new().with_result(result);
    let env = Environment::new(&driver).unwrap();
    let mut conn = env.connect(&params()).unwrap();
    let mut cursor = conn.cursor().unwrap();
    cursor.prepare("SELECT id, created FROM t").unwrap();

    match cursor.execute() {
        Err(Error::UnsupportedType { column, type_code }) => {
            assert_eq!(column, 2);
            assert_eq!(type_code, SQL_TYPE_DATE);
        }
        other => panic!("Expected UnsupportedType, got {:?}", other),
    }
    // No column was bound.
    assert_eq!(driver.call_count(Operation::BindCol), 0);
}

#[test]
fn test_truncation_detected() {
    let result = ResultSetBuilder::new()
        .column("CODE", SQL_VARCHAR, 3)
        .row(vec![Value::from("abc")])
        .row(vec![Value::from("abcdef")])
        .build();
    let driver = InMemoryDriver::new().with_result(result);
    let env = Environment::new(&driver).unwrap();
    let mut conn = env.connect(&params()).unwrap();
    let mut cursor = conn.cursor().unwrap();
    cursor.prepare("SELECT code FROM t").unwrap();
    cursor.execute().unwrap();

    match cursor.fetch_batch() {
        Err(Error::Truncated {
            column,
            row,
            length,
            capacity,
        }) => {
            assert_eq!((column, row, length, capacity), (1, 1, 6, 3));
        }
        other => panic!("Expected Truncated, got {:?}", other),
    }
    assert_eq!(cursor.state(), CursorState::Faulted);
}

#[test]
fn test_driver_conversion_error() {
    let result = ResultSetBuilder::new()
        .column("N", SQL_INTEGER, 10)
        .row(vec![Value::from("not a number")])
        .build();
    let driver = InMemoryDriver::new().with_result(result);
    let env = Environment::new(&driver).unwrap();
    let mut conn = env.connect(&params()).unwrap();
    let err = conn.query("SELECT n FROM t").unwrap_err();
    assert!(matches!(err, Error::Fetch { .. }));
    assert_eq!(err.sql_state(), Some("07006"));
}

#[test]
fn test_parameters_not_implemented() {
    let driver = InMemoryDriver::new().with_result(three_columns());
    let env = Environment::new(&driver).unwrap();
    let mut conn = env.connect(&params()).unwrap();
    let mut cursor = conn.cursor().unwrap();
    cursor.prepare("SELECT a, b, c FROM t WHERE a = ?").unwrap();

    let err = cursor.execute_with(&[Parameter::Int32(1)]).unwrap_err();
    assert!(matches!(err, Error::NotImplemented { .. }));
    assert_eq!(driver.call_count(Operation::Execute), 0);
    // The cursor is untouched and still executes without parameters.
    assert_eq!(cursor.state(), CursorState::Unbound);
    cursor.execute_with(&[]).unwrap();
    assert_eq!(cursor.fetch_all().unwrap().len(), 4);
}

#[test]
fn test_operations_after_close() {
    let driver = InMemoryDriver::new().with_result(three_columns());
    let env = Environment::new(&driver).unwrap();
    let mut conn = env.connect(&params()).unwrap();
    let mut cursor = conn.cursor().unwrap();
    cursor.prepare("SELECT a, b, c FROM t").unwrap();
    cursor.execute().unwrap();
    cursor.close().unwrap();

    assert!(matches!(
        cursor.fetch_batch(),
        Err(Error::InvalidState { state: "closed", .. })
    ));
    assert!(matches!(
        cursor.execute(),
        Err(Error::InvalidState { state: "closed", .. })
    ));
    assert!(matches!(
        cursor.next(),
        Err(Error::InvalidState { state: "closed", .. })
    ));
}

#[test]
fn test_handles_released_on_close() {
    let driver = InMemoryDriver::new().with_result(three_columns());
    let env = Environment::new(&driver).unwrap();
    let mut conn = env.connect(&params()).unwrap();
    let mut cursor = conn.cursor().unwrap();
    cursor.prepare("SELECT a, b, c FROM t").unwrap();
    cursor.execute().unwrap();
    cursor.fetch_batch().unwrap();
    assert_eq!(driver.open_handles(), 3);

    cursor.close().unwrap();
    assert_eq!(driver.open_handles(), 2);
    drop(cursor);
    conn.close().unwrap();
    assert_eq!(driver.open_handles(), 1);
    drop(env);
    assert_eq!(driver.open_handles(), 0);
}

#[test]
fn test_handles_released_on_drop() {
    let driver = InMemoryDriver::new().with_result(three_columns());
    {
        let env = Environment::new(&driver).unwrap();
        let mut conn = env.connect(&params()).unwrap();
        let mut cursor = conn.cursor().unwrap();
        cursor.prepare("SELECT a, b, c FROM t").unwrap();
        cursor.execute().unwrap();
        cursor.fetch_batch().unwrap();
    }
    assert_eq!(driver.open_handles(), 0);
    // Close and unbind on the statement, before the handle went away.
    assert_eq!(driver.call_count(Operation::FreeStmt), 2);
    assert_eq!(driver.rollback_count(), 1);
}

#[test]
fn test_failed_connect_releases_handle() {
    let driver = InMemoryDriver::new();
    let env = Environment::new(&driver).unwrap();
    let err = Connection::connect(&env, &ConnectParams::new("  ")).unwrap_err();
    assert_eq!(err.sql_state(), Some(SQLSTATE_CONNECTION_FAILURE));
    assert_eq!(driver.open_handles(), 1);
}

#[test]
fn test_statement_allocation_failure() {
    // Environment and connection allocations succeed, the statement fails.
    let driver = InMemoryDriver::new().fail_after(Operation::AllocHandle, 2);
    let env = Environment::new(&driver).unwrap();
    let mut conn = env.connect(&params()).unwrap();
    let err = conn.cursor().unwrap_err();
    assert!(matches!(err, Error::Allocation { .. }));
    assert_eq!(driver.open_handles(), 2);
}

#[test]
fn test_oversized_text_column_is_allocation_error() {
    let result = ResultSetBuilder::new()
        .column("ID", SQL_INTEGER, 10)
        .column("DOC", SQL_WLONGVARCHAR, 1 << 62)
        .row(vec![Value::Int32(1), Value::from("body")])
        .build();
    let driver = InMemoryDriver::new().with_result(result);
    let env = Environment::new(&driver).unwrap();
    let params = ConnectParams::new("DSN=memory")
        .with_array_size(3)
        .with_max_text_length(usize::MAX);
    let mut conn = env.connect(&params).unwrap();
    let mut cursor = conn.cursor().unwrap();
    cursor.prepare("SELECT id, doc FROM t").unwrap();

    let err = cursor.execute().unwrap_err();
    assert!(matches!(err, Error::Allocation { .. }));
    assert_eq!(err.sql_state(), Some(SQLSTATE_MEMORY_ALLOCATION));
    assert!(err.to_string().contains("column 2"));
    assert_eq!(cursor.state(), CursorState::Faulted);
    assert_eq!(driver.call_count(Operation::BindCol), 0);

    cursor.close().unwrap();
    assert_eq!(driver.open_handles(), 2);
}

#[test]
fn test_unbounded_declared_size_binds_long_text_length() {
    // MySQL reports LONGTEXT as 2^32 - 1 characters.
    let result = ResultSetBuilder::new()
        .column("DOC", SQL_WLONGVARCHAR, 4_294_967_295)
        .row(vec![Value::from("body")])
        .build();
    let driver = InMemoryDriver::new().with_result(result);
    let env = Environment::new(&driver).unwrap();
    let mut conn = env
        .connect(&params().with_long_text_length(64))
        .unwrap();
    let mut cursor = conn.cursor().unwrap();
    cursor.prepare("SELECT doc FROM t").unwrap();
    cursor.execute().unwrap();

    assert_eq!(cursor.bindings().get(0).unwrap().layout().width, 130);
    let rows = cursor.fetch_all().unwrap();
    assert_eq!(rows[0].get(0).and_then(Value::as_str), Some("body"));
}
