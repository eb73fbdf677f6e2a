//! Connection parameters.

use crate::error::{Error, Result};

/// Default rows per bulk fetch for new cursors.
pub const DEFAULT_ARRAY_SIZE: usize = 1;

/// Characters reserved for text columns whose declared size is unknown (0).
pub const DEFAULT_LONG_TEXT_LENGTH: usize = 4000;

/// Largest declared text size, in characters, bound as reported.
///
/// Drivers report unbounded types such as `LONGTEXT` or `NVARCHAR(MAX)` with
/// sizes up to 2^32 - 1; those are bound like a size of 0.
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 65_536;

/// Environment variable holding the connection string for `from_env`.
pub const ENV_CONNECTION_STRING: &str = "ODBC_CONNECTION_STRING";

/// Environment variable holding the default array size for `from_env`.
pub const ENV_ARRAY_SIZE: &str = "ODBC_ARRAY_SIZE";

/// Encoding of `SQL_C_CHAR` data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NarrowEncoding {
    /// ISO-8859-1, one byte per character.
    #[default]
    Latin1,
    /// UTF-8, for driver managers configured to return it for `SQL_C_CHAR`.
    Utf8,
}

/// Connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Driver specific connection string, passed to the driver uninterpreted.
    pub connection_string: String,
    /// Autocommit mode set right after connecting (default: off).
    pub autocommit: bool,
    /// Default rows per bulk fetch for cursors of this connection.
    pub array_size: usize,
    /// Characters bound for text columns reporting a declared size of 0.
    pub long_text_length: usize,
    /// Declared text sizes above this many characters are treated as unknown.
    pub max_text_length: usize,
    /// How `SQL_C_CHAR` bytes are decoded.
    pub narrow_encoding: NarrowEncoding,
}

impl ConnectParams {
    /// Create new connection parameters.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            autocommit: false,
            array_size: DEFAULT_ARRAY_SIZE,
            long_text_length: DEFAULT_LONG_TEXT_LENGTH,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            narrow_encoding: NarrowEncoding::default(),
        }
    }

    /// Set autocommit mode.
    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    /// Set the default array size.
    ///
    /// # Example
    ///
    /// ```
    /// use odbc_bulk_rs::ConnectParams;
    ///
    /// let params = ConnectParams::new("DSN=warehouse").with_array_size(500);
    /// assert_eq!(params.array_size, 500);
    /// ```
    pub fn with_array_size(mut self, array_size: usize) -> Self {
        self.array_size = array_size;
        self
    }

    /// Set the length bound for text columns of unknown size.
    pub fn with_long_text_length(mut self, length: usize) -> Self {
        self.long_text_length = length;
        self
    }

    /// Set the largest declared text size that is bound as reported.
    pub fn with_max_text_length(mut self, length: usize) -> Self {
        self.max_text_length = length;
        self
    }

    /// Characters to bind for a column with the given declared size.
    ///
    /// Sizes of 0 and sizes above `max_text_length` fall back to
    /// `long_text_length`.
    pub fn bound_text_length(&self, declared_size: usize) -> usize {
        if declared_size == 0 || declared_size > self.max_text_length {
            self.long_text_length
        } else {
            declared_size
        }
    }

    /// Set the narrow text encoding.
    pub fn with_narrow_encoding(mut self, encoding: NarrowEncoding) -> Self {
        self.narrow_encoding = encoding;
        self
    }

    /// Read parameters from `ODBC_CONNECTION_STRING` and `ODBC_ARRAY_SIZE`.
    ///
    /// Returns `None` when no connection string is set.
    pub fn from_env() -> Option<Result<Self>> {
        let connection_string = std::env::var(ENV_CONNECTION_STRING).ok()?;
        let params = Self::new(connection_string);
        Some(match std::env::var(ENV_ARRAY_SIZE) {
            Ok(raw) => parse_array_size(&raw).map(|size| params.with_array_size(size)),
            Err(_) => Ok(params),
        })
    }

    /// Validate settings that the driver cannot check.
    pub fn validate(&self) -> Result<()> {
        if self.array_size == 0 {
            return Err(Error::InvalidArraySize { size: 0 });
        }
        Ok(())
    }
}

fn parse_array_size(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(size) if size > 0 => Ok(size),
        Ok(size) => Err(Error::InvalidArraySize { size }),
        Err(_) => Err(Error::type_conversion(format!(
            "{} is not a row count: {}",
            ENV_ARRAY_SIZE, raw
        ))),
    }
}
