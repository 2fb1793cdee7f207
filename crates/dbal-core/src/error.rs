//! Error types for DBAL operations.
//!
//! Every public operation either succeeds or fails with exactly one
//! [`Error`] kind. Parse and bind errors are raised eagerly (at statement
//! construction or bind time); driver errors carry the native code and
//! message, and for syntax errors with a known offset the offending SQL is
//! rendered with a `*` marker at the failure position.

use std::fmt;

/// The primary error type for all DBAL operations.
#[derive(Debug)]
pub enum Error {
    /// Malformed placeholder usage, or a placeholder style the driver rejects
    Parse(ParseError),
    /// Bind call references a position or name absent from the SQL
    InvalidBindTarget(BindError),
    /// Unknown fetch-mode value
    InvalidFetchMode(FetchModeError),
    /// Failure surfaced by the native backend
    Driver(DriverError),
    /// Unknown or already-ended profile handle
    Profiler(ProfilerError),
    /// Optional feature the active driver does not support
    NotImplemented(String),
    /// Operation on a statement after `close()`
    StatementClosed,
    /// Typed access to a fetched value failed
    Type(TypeError),
    /// Invalid adapter configuration
    Config(ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub placeholder: Option<String>,
    pub sql: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Placeholder style the driver does not support
    UnsupportedPlaceholderStyle,
    /// Positional and named placeholders in the same statement
    MixedPlaceholderStyles,
    /// Quoted literal never closed
    UnterminatedQuote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindError {
    /// The target as the caller supplied it
    pub target: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchModeError {
    /// The rejected mode, rendered for display
    pub mode: String,
}

/// Which driver call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverOperation {
    Connect,
    Prepare,
    Bind,
    Execute,
    Fetch,
    Transaction,
}

impl DriverOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            DriverOperation::Connect => "connect",
            DriverOperation::Prepare => "prepare",
            DriverOperation::Bind => "bind",
            DriverOperation::Execute => "execute",
            DriverOperation::Fetch => "fetch",
            DriverOperation::Transaction => "transaction",
        }
    }
}

#[derive(Debug)]
pub struct DriverError {
    pub operation: DriverOperation,
    /// Native error code as reported by the backend
    pub code: Option<String>,
    pub message: String,
    pub sql: Option<String>,
    /// Byte offset into `sql` where the backend located the failure
    pub offset: Option<usize>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilerError {
    pub kind: ProfilerErrorKind,
    /// Handle the operation referred to; `None` for `Busy`
    pub handle: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilerErrorKind {
    /// Never allocated, or already evicted
    UnknownHandle,
    AlreadyEnded,
    /// The shared profiler is still borrowed by the caller
    Busy,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct ConfigError {
    pub key: String,
    pub message: String,
}

impl DriverError {
    /// Create a driver error for the given operation.
    pub fn new(operation: DriverOperation, message: impl Into<String>) -> Self {
        Self {
            operation,
            code: None,
            message: message.into(),
            sql: None,
            offset: None,
            source: None,
        }
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The SQL text with a `*` inserted at the failure offset.
    ///
    /// Returns `None` unless both the SQL and an in-range offset are known.
    pub fn marked_sql(&self) -> Option<String> {
        let sql = self.sql.as_deref()?;
        let offset = self.offset?;
        if offset > sql.len() || !sql.is_char_boundary(offset) {
            return None;
        }
        let (head, tail) = sql.split_at(offset);
        Some(format!("{head}*{tail}"))
    }
}

impl Error {
    /// Does this error wrap a lower-level cause?
    pub fn has_chained_cause(&self) -> bool {
        self.chained_cause().is_some()
    }

    /// The wrapped lower-level cause, if any.
    pub fn chained_cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Driver(e) => e.source.as_deref(),
            _ => None,
        }
    }

    /// Native error code, for driver errors that carry one.
    pub fn native_code(&self) -> Option<&str> {
        match self {
            Error::Driver(e) => e.code.as_deref(),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Parse(e) => Some(&e.sql),
            Error::Driver(e) => e.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "Parse error: {}", e),
            Error::InvalidBindTarget(e) => write!(f, "Invalid bind target: {}", e),
            Error::InvalidFetchMode(e) => write!(f, "Invalid fetch mode: {}", e),
            Error::Driver(e) => write!(f, "Driver error: {}", e),
            Error::Profiler(e) => write!(f, "Profiler error: {}", e),
            Error::NotImplemented(what) => write!(f, "Not implemented: {}", what),
            Error::StatementClosed => write!(f, "Statement is closed"),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Driver(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, &self.placeholder) {
            (ParseErrorKind::UnsupportedPlaceholderStyle, Some(p)) => {
                write!(f, "placeholder '{}' uses a style the driver does not support", p)
            }
            (ParseErrorKind::UnsupportedPlaceholderStyle, None) => {
                write!(f, "placeholder style not supported by the driver")
            }
            (ParseErrorKind::MixedPlaceholderStyles, _) => {
                write!(f, "positional and named placeholders cannot be mixed")
            }
            (ParseErrorKind::UnterminatedQuote, _) => write!(f, "unterminated quoted literal"),
        }
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.target, self.message)
    }
}

impl fmt::Display for FetchModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.mode)
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed", self.operation.as_str())?;
        if let Some(code) = &self.code {
            write!(f, " [{}]", code)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(marked) = self.marked_sql() {
            write!(f, "\n{}", marked)?;
        }
        Ok(())
    }
}

impl fmt::Display for ProfilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handle = self.handle.map_or_else(|| "?".to_string(), |h| h.to_string());
        match self.kind {
            ProfilerErrorKind::UnknownHandle => {
                write!(f, "profiler has no query with handle {}", handle)
            }
            ProfilerErrorKind::AlreadyEnded => {
                write!(f, "query with profiler handle {} has already ended", handle)
            }
            ProfilerErrorKind::Busy => {
                write!(f, "profiler is borrowed elsewhere; release it before running statements")
            }
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse(err)
    }
}

impl From<BindError> for Error {
    fn from(err: BindError) -> Self {
        Error::InvalidBindTarget(err)
    }
}

impl From<FetchModeError> for Error {
    fn from(err: FetchModeError) -> Self {
        Error::InvalidFetchMode(err)
    }
}

impl From<DriverError> for Error {
    fn from(err: DriverError) -> Self {
        Error::Driver(err)
    }
}

impl From<ProfilerError> for Error {
    fn from(err: ProfilerError) -> Self {
        Error::Profiler(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

/// Result type alias for DBAL operations.
pub type Result<T> = std::result::Result<T, Error>;
