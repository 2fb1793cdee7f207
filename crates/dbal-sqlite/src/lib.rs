//! SQLite driver for DBAL Rust.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! This crate implements the `Driver` and `NativeStatement` traits from
//! dbal-core on top of libsqlite3, so a `dbal::Adapter` can run against an
//! in-memory or file-based SQLite database.
//!
//! # Features
//!
//! - Positional (`?`) and named (`:name`) parameters, both native to SQLite
//! - Syntax errors carry the SQLite error offset
//! - Transactions via `BEGIN` / `COMMIT` / `ROLLBACK`
//! - Configurable open flags and busy timeout
//!
//! # Example
//!
//! ```rust,ignore
//! use dbal_core::{BindTarget, Driver, NativeStatement, Value};
//! use dbal_sqlite::{SqliteConfig, SqliteDriver};
//!
//! let driver = SqliteDriver::connect(&SqliteConfig::memory())?;
//! driver.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//!
//! let mut stmt = driver.prepare_native("INSERT INTO users (name) VALUES (?)")?;
//! stmt.bind_native(&BindTarget::Position(1), &Value::Text("Alice".into()))?;
//! stmt.execute_native()?;
//! assert_eq!(stmt.affected_row_count(), 1);
//! ```
//!
//! # Type Mapping
//!
//! | Value | SQLite Type |
//! |-------|-------------|
//! | `Bool` | INTEGER (0/1) |
//! | `Int`, `BigInt` | INTEGER |
//! | `Double` | REAL |
//! | `Text`, `Decimal` | TEXT |
//! | `Bytes` | BLOB |
//! | `Json` | TEXT |
//! | `Null` | NULL |
//!
//! Integers read back as `Int` when they fit in 32 bits, `BigInt` otherwise.
//!
//! # Thread Safety
//!
//! `SqliteDriver` and its statements share the connection handle through
//! `Rc` and are neither `Send` nor `Sync`.

pub mod connection;
pub mod ffi;
pub mod statement;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteDriver};
pub use statement::SqliteStatement;

/// Re-export the SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Re-export the SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
