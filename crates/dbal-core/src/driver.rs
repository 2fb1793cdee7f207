//! Driver capability traits.
//!
//! This module defines the seam between the statement machinery and a
//! concrete native client:
//!
//! - [`Driver`] - connect, prepare, transaction pass-through, error info
//! - [`NativeStatement`] - bind, execute, fetch, column metadata
//! - [`ParameterStyle`] / [`BindTarget`] - placeholder addressing
//! - [`QuoteDialect`] - the quoting convention placeholder parsing must skip
//!
//! All calls are synchronous and block until the native client returns.

use crate::error::{DriverError, DriverOperation, Error, Result};
use crate::value::Value;
use std::fmt;

/// Placeholder style a driver understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterStyle {
    /// `?`
    Positional,
    /// `:identifier`
    Named,
}

/// A validated bind target.
///
/// Positions are 1-based. Names always carry their leading `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BindTarget {
    Position(usize),
    Name(String),
}

impl BindTarget {
    pub fn style(&self) -> ParameterStyle {
        match self {
            BindTarget::Position(_) => ParameterStyle::Positional,
            BindTarget::Name(_) => ParameterStyle::Named,
        }
    }
}

impl fmt::Display for BindTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindTarget::Position(p) => write!(f, "{}", p),
            BindTarget::Name(n) => f.write_str(n),
        }
    }
}

/// How a quote character is escaped inside its own quoted region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeStyle {
    /// `'it''s'`
    Doubled,
    /// `'it\'s'`
    Backslash,
}

/// Quoting convention of a SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteDialect {
    pub value_quote: char,
    pub value_escape: EscapeStyle,
    pub identifier_quote: char,
    pub identifier_escape: EscapeStyle,
}

impl QuoteDialect {
    /// SQL standard: `'value'` and `"identifier"`, both escaped by doubling.
    pub const ANSI: QuoteDialect = QuoteDialect {
        value_quote: '\'',
        value_escape: EscapeStyle::Doubled,
        identifier_quote: '"',
        identifier_escape: EscapeStyle::Doubled,
    };

    /// MySQL: backslash-escaped `'value'` and doubled `` `identifier` ``.
    pub const MYSQL: QuoteDialect = QuoteDialect {
        value_quote: '\'',
        value_escape: EscapeStyle::Backslash,
        identifier_quote: '`',
        identifier_escape: EscapeStyle::Doubled,
    };
}

impl Default for QuoteDialect {
    fn default() -> Self {
        QuoteDialect::ANSI
    }
}

/// Error details as reported by the native client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeErrorInfo {
    pub code: String,
    pub message: String,
    /// Byte offset of a syntax error, when the backend reports one
    pub offset: Option<usize>,
    /// Statement text the offset refers to
    pub sql: Option<String>,
}

impl NativeErrorInfo {
    /// Wrap this native error as a [`DriverError`] for `operation`.
    pub fn into_driver_error(self, operation: DriverOperation) -> DriverError {
        let mut err = DriverError::new(operation, self.message).code(self.code);
        err.sql = self.sql;
        err.offset = self.offset;
        err
    }
}

/// A connected native database client.
///
/// A driver is shared by every statement prepared from it; methods take
/// `&self` and any bookkeeping the client needs lives behind the driver's
/// own interior mutability.
pub trait Driver: Sized {
    /// Connection parameters; opaque to the statement machinery.
    type Config;

    /// Native prepared statement type.
    type Statement: NativeStatement;

    /// Establish a connection.
    fn connect(config: &Self::Config) -> Result<Self>;

    /// Does this driver accept the given placeholder style?
    fn supports_parameter_style(&self, style: ParameterStyle) -> bool;

    /// Quoting convention used to skip literals while parsing placeholders.
    fn quote_dialect(&self) -> QuoteDialect {
        QuoteDialect::ANSI
    }

    /// Allocate a native prepared statement.
    fn prepare_native(&self, sql: &str) -> Result<Self::Statement>;

    fn begin(&self) -> Result<()>;

    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;

    /// Identifier generated by the most recent insert.
    fn last_insert_id(&self) -> Result<Value>;

    /// Most recent connection-level error, if any.
    fn error_info(&self) -> Option<NativeErrorInfo>;
}

/// A native prepared statement exclusively owned by one statement object.
///
/// Dropping the value releases the native resource.
pub trait NativeStatement {
    /// Bind `value` to `target` for the next execution.
    fn bind_native(&mut self, target: &BindTarget, value: &Value) -> Result<()>;

    fn execute_native(&mut self) -> Result<()>;

    /// Next row of the current result, `None` at end of data.
    fn fetch_native_row(&mut self) -> Result<Option<Vec<Value>>>;

    /// Result column names in order; empty for statements without a result.
    fn column_metadata(&self) -> Vec<String>;

    fn affected_row_count(&self) -> u64;

    fn error_info(&self) -> Option<NativeErrorInfo>;

    /// Release the current result so the statement can be executed again.
    fn close_cursor(&mut self) -> Result<()>;

    /// Advance to the next result set. Most drivers have only one.
    fn next_rowset(&mut self) -> Result<bool> {
        Err(Error::NotImplemented(
            "multiple result sets are not supported by this driver".to_string(),
        ))
    }
}
