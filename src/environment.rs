//! ODBC environment.

use crate::connection::Connection;
use crate::driver::diagnostics::{check, check_value, Target};
use crate::driver::{ConnectParams, Driver, Handle, HandleType, OdbcVersion};
use crate::error::{ErrorKind, Result};

/// Owner of a driver and its environment handle.
///
/// Created once and passed by reference to every [`Connection`]; the borrow
/// keeps the environment alive for as long as any connection uses it. The
/// handle is freed on drop.
///
/// # Example
///
/// ```
/// use odbc_bulk_rs::{ConnectParams, Environment, InMemoryDriver};
///
/// let env = Environment::new(InMemoryDriver::new())?;
/// let conn = env.connect(&ConnectParams::new("DSN=memory"))?;
/// conn.close()?;
/// # Ok::<(), odbc_bulk_rs::Error>(())
/// ```
#[derive(Debug)]
pub struct Environment<D: Driver> {
    driver: D,
    handle: Handle,
}

impl<D: Driver> Environment<D> {
    /// Allocate the environment handle and request ODBC 3 behaviour.
    pub fn new(driver: D) -> Result<Self> {
        let handle = check_value(
            &driver,
            Target::new(HandleType::Env, Handle::NULL),
            ErrorKind::Allocation,
            "allocate environment handle",
            driver.alloc_handle(HandleType::Env, Handle::NULL),
        )?;
        // From here on Drop releases the handle if version negotiation fails.
        let env = Self { driver, handle };
        check(
            &env.driver,
            Target::new(HandleType::Env, handle),
            ErrorKind::Connect,
            "set ODBC version",
            env.driver.set_odbc_version(handle, OdbcVersion::Odbc3),
        )?;
        tracing::debug!(handle = handle.0, "ODBC environment ready");
        Ok(env)
    }

    /// The driver all handles of this environment go through.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Environment handle.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Open a connection. Same as [`Connection::connect`].
    pub fn connect(&self, params: &ConnectParams) -> Result<Connection<'_, D>> {
        Connection::connect(self, params)
    }
}

impl<D: Driver> Drop for Environment<D> {
    fn drop(&mut self) {
        let status = self.driver.free_handle(HandleType::Env, self.handle);
        if let Err(e) = check(
            &self.driver,
            Target::new(HandleType::Env, self.handle),
            ErrorKind::Allocation,
            "free environment handle",
            status,
        ) {
            tracing::warn!(error = %e, "failed to release ODBC environment");
        }
    }
}
