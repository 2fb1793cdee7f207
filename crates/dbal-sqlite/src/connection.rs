//! SQLite connection and [`Driver`] implementation.

// FFI code needs to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::borrow_as_ptr)]

use crate::ffi;
use crate::statement::SqliteStatement;
use dbal_core::{
    Driver, DriverError, DriverOperation, Error, NativeErrorInfo, ParameterStyle, Result, Value,
};
use std::cell::RefCell;
use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::rc::Rc;

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
    /// Open in multi-thread mode.
    pub no_mutex: bool,
    /// Open in serialized mode.
    pub full_mutex: bool,
    /// Enable shared cache mode.
    pub shared_cache: bool,
    /// Disable shared cache mode.
    pub private_cache: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access (database must exist).
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.no_mutex {
            flags |= ffi::SQLITE_OPEN_NOMUTEX;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        }
        if self.shared_cache {
            flags |= ffi::SQLITE_OPEN_SHAREDCACHE;
        }
        if self.private_cache {
            flags |= ffi::SQLITE_OPEN_PRIVATECACHE;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

/// An open database handle, shared by the driver and its statements.
///
/// Closed with `sqlite3_close_v2` once the last owner drops, after every
/// statement holding a clone has been finalized.
pub(crate) struct DbHandle {
    db: *mut ffi::sqlite3,
    last_error: RefCell<Option<NativeErrorInfo>>,
}

impl DbHandle {
    pub(crate) fn raw(&self) -> *mut ffi::sqlite3 {
        self.db
    }

    /// Capture the current error state of the connection and remember it.
    pub(crate) fn capture_error(&self, rc: c_int, sql: Option<&str>) -> NativeErrorInfo {
        // SAFETY: db is a valid open handle for the lifetime of self
        let (message, offset) = unsafe {
            let msg_ptr = ffi::sqlite3_errmsg(self.db);
            let message = if msg_ptr.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                CStr::from_ptr(msg_ptr).to_string_lossy().into_owned()
            };
            let offset = usize::try_from(ffi::sqlite3_error_offset(self.db)).ok();
            (message, offset)
        };
        let info = NativeErrorInfo {
            code: rc.to_string(),
            message,
            offset: sql.and(offset),
            sql: sql.map(str::to_string),
        };
        *self.last_error.borrow_mut() = Some(info.clone());
        info
    }

    pub(crate) fn last_error(&self) -> Option<NativeErrorInfo> {
        self.last_error.borrow().clone()
    }

    fn exec(&self, sql: &str, operation: DriverOperation) -> Result<()> {
        let c_sql = CString::new(sql).map_err(|_| {
            DriverError::new(operation, "SQL contains null byte").sql(sql)
        })?;

        let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();

        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_exec(self.db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg)
        };

        if rc != ffi::SQLITE_OK {
            let mut info = self.capture_error(rc, Some(sql));
            if !errmsg.is_null() {
                // SAFETY: errmsg was allocated by SQLite and is released here
                unsafe {
                    info.message = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
                    ffi::sqlite3_free(errmsg.cast());
                }
            }
            return Err(info.into_driver_error(operation).into());
        }
        Ok(())
    }
}

impl Drop for DbHandle {
    fn drop(&mut self) {
        // SAFETY: db was opened by sqlite3_open_v2 and is closed exactly once
        unsafe {
            ffi::sqlite3_close_v2(self.db);
        }
    }
}

/// A connection to a SQLite database.
///
/// Supports both `?` and `:name` placeholders. Not `Send`: a driver and
/// the statements prepared from it stay on one thread.
pub struct SqliteDriver {
    handle: Rc<DbHandle>,
    path: String,
}

impl SqliteDriver {
    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::connect(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::connect(&SqliteConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Execute SQL directly without preparing (DDL, multi-statement scripts).
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        self.handle.exec(sql, DriverOperation::Execute)
    }

    /// Get the number of rows changed by the last statement.
    pub fn changes(&self) -> u64 {
        // SAFETY: db is valid
        let n = unsafe { ffi::sqlite3_changes(self.handle.raw()) };
        u64::try_from(n).unwrap_or(0)
    }
}

impl std::fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Driver for SqliteDriver {
    type Config = SqliteConfig;
    type Statement = SqliteStatement;

    fn connect(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            DriverError::new(DriverOperation::Connect, "Invalid path: contains null byte")
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db is valid, errmsg returns a valid C string
                unsafe {
                    let err_ptr = ffi::sqlite3_errmsg(db);
                    let msg = CStr::from_ptr(err_ptr).to_string_lossy().into_owned();
                    ffi::sqlite3_close_v2(db);
                    msg
                }
            };

            return Err(DriverError::new(
                DriverOperation::Connect,
                format!("Failed to open database '{}': {}", config.path, msg),
            )
            .code(rc.to_string())
            .into());
        }

        if config.busy_timeout_ms > 0 {
            let ms = c_int::try_from(config.busy_timeout_ms).unwrap_or(c_int::MAX);
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, ms);
            }
        }

        tracing::info!(path = %config.path, version = ffi::version(), "Opened SQLite database");
        Ok(Self {
            handle: Rc::new(DbHandle {
                db,
                last_error: RefCell::new(None),
            }),
            path: config.path.clone(),
        })
    }

    fn supports_parameter_style(&self, _style: ParameterStyle) -> bool {
        true
    }

    fn prepare_native(&self, sql: &str) -> Result<SqliteStatement> {
        let c_sql = CString::new(sql).map_err(|_| {
            Error::from(DriverError::new(DriverOperation::Prepare, "SQL contains null byte").sql(sql))
        })?;

        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        // SAFETY: All pointers are valid; -1 reads up to the NUL terminator
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                self.handle.raw(),
                c_sql.as_ptr(),
                -1,
                &mut stmt,
                ptr::null_mut(),
            )
        };

        if rc != ffi::SQLITE_OK {
            let info = self.handle.capture_error(rc, Some(sql));
            return Err(info.into_driver_error(DriverOperation::Prepare).into());
        }
        if stmt.is_null() {
            return Err(DriverError::new(DriverOperation::Prepare, "statement contains no SQL")
                .sql(sql)
                .into());
        }

        tracing::trace!(sql = %sql, "Prepared SQLite statement");
        Ok(SqliteStatement::new(Rc::clone(&self.handle), stmt, sql))
    }

    fn begin(&self) -> Result<()> {
        self.handle.exec("BEGIN", DriverOperation::Transaction)
    }

    fn commit(&self) -> Result<()> {
        self.handle.exec("COMMIT", DriverOperation::Transaction)
    }

    fn rollback(&self) -> Result<()> {
        self.handle.exec("ROLLBACK", DriverOperation::Transaction)
    }

    fn last_insert_id(&self) -> Result<Value> {
        // SAFETY: db is valid
        let id = unsafe { ffi::sqlite3_last_insert_rowid(self.handle.raw()) };
        Ok(Value::BigInt(id))
    }

    fn error_info(&self) -> Option<NativeErrorInfo> {
        self.handle.last_error()
    }
}
