//! Status checking for boundary calls.
//!
//! Every driver call is followed by one of the `check*` functions. Success
//! and success-with-info pass, anything else pulls the first diagnostic
//! record off the failing handle and turns it into an [`Error`].

use super::{Driver, Handle, HandleType, SqlReturn};
use crate::error::{Diagnostic, Error, ErrorKind, Result};

/// Upper bound on records read when logging informational diagnostics.
const MAX_INFO_RECORDS: i16 = 8;

/// Identifies the handle a call was made on.
#[derive(Debug, Clone, Copy)]
pub struct Target {
    pub kind: HandleType,
    pub handle: Handle,
}

impl Target {
    pub fn new(kind: HandleType, handle: Handle) -> Self {
        Self { kind, handle }
    }
}

/// Check the status of a call without out-values.
pub fn check<D: Driver + ?Sized>(
    driver: &D,
    target: Target,
    error_kind: ErrorKind,
    operation: &str,
    status: SqlReturn,
) -> Result<()> {
    match status {
        SqlReturn::Success => Ok(()),
        SqlReturn::SuccessWithInfo => {
            log_info_records(driver, target, operation);
            Ok(())
        }
        _ => Err(failure(driver, target, error_kind, operation, status)),
    }
}

/// Check the status of a call and pass its out-value through on success.
pub fn check_value<D: Driver + ?Sized, T>(
    driver: &D,
    target: Target,
    error_kind: ErrorKind,
    operation: &str,
    (status, value): (SqlReturn, T),
) -> Result<T> {
    check(driver, target, error_kind, operation, status)?;
    Ok(value)
}

/// Build the error for a failed call.
///
/// Falls back to `Error::DiagnosticUnavailable` when the handle is null or the
/// driver has no record to give.
pub fn failure<D: Driver + ?Sized>(
    driver: &D,
    target: Target,
    error_kind: ErrorKind,
    operation: &str,
    status: SqlReturn,
) -> Error {
    tracing::debug!(
        operation,
        handle_type = target.kind.as_str(),
        status = status.as_raw(),
        "ODBC call failed"
    );
    match first_record(driver, target) {
        Some(diagnostic) => Error::from_diagnostic(error_kind, operation, diagnostic),
        None => Error::diagnostic_unavailable(operation),
    }
}

/// First diagnostic record of a handle, if one can be retrieved.
pub fn first_record<D: Driver + ?Sized>(driver: &D, target: Target) -> Option<Diagnostic> {
    if target.handle.is_null() {
        return None;
    }
    match driver.get_diag_rec(target.kind, target.handle, 1) {
        (status, record) if status.is_success() => Some(record),
        _ => None,
    }
}

/// All diagnostic records of a handle, in record order.
pub fn records<D: Driver + ?Sized>(driver: &D, target: Target) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    if target.handle.is_null() {
        return out;
    }
    for record in 1..=MAX_INFO_RECORDS {
        match driver.get_diag_rec(target.kind, target.handle, record) {
            (status, diagnostic) if status.is_success() => out.push(diagnostic),
            _ => break,
        }
    }
    out
}

fn log_info_records<D: Driver + ?Sized>(driver: &D, target: Target, operation: &str) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    for diagnostic in records(driver, target) {
        tracing::debug!(operation, %diagnostic, "ODBC call succeeded with info");
    }
}
