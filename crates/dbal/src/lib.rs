//! DBAL Rust - prepared statements, fetch modes and query profiling over
//! native database drivers.
//!
//! The pieces, from the bottom up:
//!
//! - [`PlaceholderParser`] splits SQL into literals and `?` / `:name` placeholders
//! - [`ParameterBinder`] validates bind calls against those placeholders
//! - [`Profiler`] records a [`QueryProfile`] per execution, with filters
//! - [`Statement`] drives prepare, bind, execute and fetch against a [`Driver`]
//! - [`Adapter`] owns the driver and the profiler
//!
//! # Example
//!
//! ```ignore
//! use dbal::{Adapter, AdapterOptions, FetchMode, Value};
//! use dbal_sqlite::{SqliteConfig, SqliteDriver};
//!
//! let db = Adapter::<SqliteDriver>::connect(&SqliteConfig::memory(), AdapterOptions::new().profiler(true))?;
//! db.query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", ())?;
//!
//! let mut insert = db.prepare("INSERT INTO users (name) VALUES (:name)")?;
//! insert.bind_value("name", "Alice")?;
//! insert.execute()?;
//!
//! let mut select = db.prepare("SELECT id, name FROM users WHERE id = ?")?;
//! select.bind_value(1, db.last_insert_id()?)?;
//! select.execute()?;
//! let row = select.fetch_with(FetchMode::Num)?;
//!
//! println!("{} queries profiled", db.profiler().total_num_queries(None));
//! ```
//!
//! All calls are synchronous. Statements, slots and the shared profiler use
//! `Rc`/`RefCell` and stay on the thread that created them.

pub mod adapter;
pub mod binder;
pub mod config;
pub mod fetch;
pub mod placeholder;
pub mod profiler;
pub mod slot;
pub mod statement;

#[cfg(test)]
mod testing;

pub use adapter::Adapter;
pub use binder::{ParamRef, ParameterBinder, Params};
pub use config::{AdapterOptions, ProfilerOptions};
pub use fetch::{FetchMode, Fetched, Record};
pub use placeholder::{PlaceholderParser, SqlToken, TokenSequence};
pub use profiler::{
    EndStatus, ProfileHandle, ProfileSummary, Profiler, QueryProfile, QueryReport, QueryType,
    QueryTypeSet, SharedProfiler,
};
pub use slot::Slot;
pub use statement::{ColumnRef, Statement, StatementState};

pub use dbal_core::{
    BindTarget, CaseFolding, ColumnInfo, Driver, DriverError, DriverOperation, Error,
    FromValue, NativeErrorInfo, NativeStatement, ParameterStyle, ParseErrorKind, ProfilerErrorKind,
    QuoteDialect, Result, Row, Value,
};
