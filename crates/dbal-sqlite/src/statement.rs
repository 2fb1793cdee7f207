//! SQLite prepared statements.
//!
//! Executing steps the statement once: a first row, if any, is buffered so
//! that column values and the affected-row count are known as soon as
//! `execute_native` returns. Later fetches keep stepping.

#![allow(clippy::cast_possible_truncation)]

use crate::connection::DbHandle;
use crate::ffi;
use crate::types;
use dbal_core::{
    BindTarget, DriverError, DriverOperation, NativeErrorInfo, NativeStatement, Result, Value,
};
use std::ffi::{CString, c_int};
use std::rc::Rc;

/// A native SQLite statement, finalized on drop.
pub struct SqliteStatement {
    conn: Rc<DbHandle>,
    stmt: *mut ffi::sqlite3_stmt,
    sql: String,
    columns: Vec<String>,
    buffered: Option<Vec<Value>>,
    executed: bool,
    done: bool,
    changes: u64,
    last_error: Option<NativeErrorInfo>,
}

impl SqliteStatement {
    pub(crate) fn new(conn: Rc<DbHandle>, stmt: *mut ffi::sqlite3_stmt, sql: &str) -> Self {
        Self {
            conn,
            stmt,
            sql: sql.to_string(),
            columns: read_column_names(stmt),
            buffered: None,
            executed: false,
            done: false,
            changes: 0,
            last_error: None,
        }
    }

    /// Number of parameters SQLite sees in the statement.
    pub fn parameter_count(&self) -> usize {
        // SAFETY: stmt is valid for the lifetime of self
        let n = unsafe { ffi::sqlite3_bind_parameter_count(self.stmt) };
        usize::try_from(n).unwrap_or(0)
    }

    fn fail(&mut self, rc: c_int, operation: DriverOperation) -> dbal_core::Error {
        let info = self.conn.capture_error(rc, Some(&self.sql));
        self.last_error = Some(info.clone());
        info.into_driver_error(operation).into()
    }

    fn parameter_index(&self, target: &BindTarget) -> Result<c_int> {
        let index = match target {
            BindTarget::Position(p) => c_int::try_from(*p).unwrap_or(0),
            BindTarget::Name(name) => {
                let c_name = CString::new(name.as_str()).map_err(|_| {
                    DriverError::new(DriverOperation::Bind, "parameter name contains null byte")
                })?;
                // SAFETY: stmt and c_name are valid
                unsafe { ffi::sqlite3_bind_parameter_index(self.stmt, c_name.as_ptr()) }
            }
        };
        if index <= 0 || usize::try_from(index).unwrap_or(usize::MAX) > self.parameter_count() {
            return Err(DriverError::new(
                DriverOperation::Bind,
                format!("no parameter {} in statement", target),
            )
            .code(ffi::SQLITE_RANGE.to_string())
            .sql(self.sql.clone())
            .into());
        }
        Ok(index)
    }

    fn read_row(&self) -> Vec<Value> {
        // SAFETY: stmt is valid and the last step returned SQLITE_ROW
        let count = unsafe { ffi::sqlite3_column_count(self.stmt) };
        (0..count)
            // SAFETY: i is within 0..column_count of the current row
            .map(|i| unsafe { types::read_column(self.stmt, i) })
            .collect()
    }

    fn reset(&mut self) {
        // SAFETY: stmt is valid; reset keeps bindings
        unsafe {
            ffi::sqlite3_reset(self.stmt);
        }
        self.buffered = None;
        self.executed = false;
        self.done = false;
    }
}

fn read_column_names(stmt: *mut ffi::sqlite3_stmt) -> Vec<String> {
    // SAFETY: stmt is a valid prepared statement
    let count = unsafe { ffi::sqlite3_column_count(stmt) };
    (0..count)
        // SAFETY: i is within 0..column_count
        .map(|i| unsafe { types::column_name(stmt, i) }.unwrap_or_else(|| format!("col{}", i)))
        .collect()
}

impl NativeStatement for SqliteStatement {
    fn bind_native(&mut self, target: &BindTarget, value: &Value) -> Result<()> {
        let index = self.parameter_index(target)?;
        // SAFETY: stmt is valid and index was checked against the parameter count
        let rc = unsafe { types::bind_value(self.stmt, index, value) };
        if rc != ffi::SQLITE_OK {
            return Err(self.fail(rc, DriverOperation::Bind));
        }
        Ok(())
    }

    fn execute_native(&mut self) -> Result<()> {
        self.buffered = None;
        self.done = false;

        // SAFETY: stmt is valid
        let rc = unsafe { ffi::sqlite3_step(self.stmt) };
        match rc {
            ffi::SQLITE_ROW => {
                self.buffered = Some(self.read_row());
            }
            ffi::SQLITE_DONE => {
                self.done = true;
            }
            _ => {
                let err = self.fail(rc, DriverOperation::Execute);
                self.reset();
                // SAFETY: stmt is valid
                unsafe {
                    ffi::sqlite3_clear_bindings(self.stmt);
                }
                return Err(err);
            }
        }

        // A schema change may have re-prepared the statement
        self.columns = read_column_names(self.stmt);
        self.executed = true;
        self.last_error = None;
        self.changes = if self.columns.is_empty() {
            // SAFETY: db is valid
            let n = unsafe { ffi::sqlite3_changes(self.conn.raw()) };
            u64::try_from(n).unwrap_or(0)
        } else {
            0
        };
        Ok(())
    }

    fn fetch_native_row(&mut self) -> Result<Option<Vec<Value>>> {
        if !self.executed {
            return Ok(None);
        }
        if let Some(row) = self.buffered.take() {
            return Ok(Some(row));
        }
        if self.done {
            return Ok(None);
        }

        // SAFETY: stmt is valid and has been stepped at least once
        let rc = unsafe { ffi::sqlite3_step(self.stmt) };
        match rc {
            ffi::SQLITE_ROW => Ok(Some(self.read_row())),
            ffi::SQLITE_DONE => {
                self.done = true;
                Ok(None)
            }
            _ => {
                let err = self.fail(rc, DriverOperation::Fetch);
                self.done = true;
                Err(err)
            }
        }
    }

    fn column_metadata(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn affected_row_count(&self) -> u64 {
        self.changes
    }

    fn error_info(&self) -> Option<NativeErrorInfo> {
        self.last_error.clone()
    }

    fn close_cursor(&mut self) -> Result<()> {
        self.reset();
        // SAFETY: stmt is valid
        unsafe {
            ffi::sqlite3_clear_bindings(self.stmt);
        }
        Ok(())
    }
}

impl Drop for SqliteStatement {
    fn drop(&mut self) {
        // SAFETY: stmt was prepared by sqlite3_prepare_v2 and is finalized once
        unsafe {
            ffi::sqlite3_finalize(self.stmt);
        }
    }
}

impl std::fmt::Debug for SqliteStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStatement")
            .field("sql", &self.sql)
            .field("columns", &self.columns)
            .field("executed", &self.executed)
            .finish_non_exhaustive()
    }
}
