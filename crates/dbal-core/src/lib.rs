//! Core types and driver traits for DBAL Rust.
//!
//! This crate provides the foundation the statement layer is built on:
//!
//! - `Value` for bound parameters and fetched columns
//! - `Row` / `ColumnInfo` for name and index access to results
//! - `Driver` / `NativeStatement`, the capability contract a native client implements
//! - `Error`, the single error taxonomy every operation reports through

pub mod driver;
pub mod error;
pub mod row;
pub mod value;

pub use driver::{
    BindTarget, Driver, EscapeStyle, NativeErrorInfo, NativeStatement, ParameterStyle,
    QuoteDialect,
};
pub use error::{
    BindError, ConfigError, DriverError, DriverOperation, Error, FetchModeError, ParseError,
    ParseErrorKind, ProfilerError, ProfilerErrorKind, Result, TypeError,
};
pub use row::{CaseFolding, ColumnInfo, FromValue, Row};
pub use value::Value;
