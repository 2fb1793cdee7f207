//! The prepared-statement state machine.
//!
//! ```text
//! Constructed --prepare--> Prepared --execute--> Executed
//!                              ^                    |
//!                              +----close_cursor----+
//! any state --close--> Closed
//! ```
//!
//! SQL is tokenized when the statement is constructed, so placeholder
//! errors surface before anything reaches the driver. Every bind call is
//! validated against that token list immediately. Each successful execution
//! gets its own query profile when the shared profiler is enabled.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use dbal_core::{
    BindError, BindTarget, CaseFolding, ColumnInfo, Driver, Error, NativeErrorInfo,
    NativeStatement, Result, Row, Value,
};

use crate::binder::{ParamRef, ParameterBinder, Params};
use crate::fetch::{self, FetchMode, Fetched};
use crate::placeholder::{PlaceholderParser, TokenSequence};
use crate::profiler::{self, ProfileHandle, QueryProfile, SharedProfiler};
use crate::slot::Slot;

/// Lifecycle state of a [`Statement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// SQL parsed, no native statement yet
    Constructed,
    /// Native statement allocated
    Prepared,
    /// Executed; result metadata known and a cursor may be open
    Executed,
    /// Terminal
    Closed,
}

/// Result column addressed by `bind_column`, as the caller supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    /// 1-based column position
    Position(i64),
    Name(String),
}

impl From<usize> for ColumnRef {
    fn from(v: usize) -> Self {
        ColumnRef::Position(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<i32> for ColumnRef {
    fn from(v: i32) -> Self {
        ColumnRef::Position(i64::from(v))
    }
}

impl From<i64> for ColumnRef {
    fn from(v: i64) -> Self {
        ColumnRef::Position(v)
    }
}

impl From<&str> for ColumnRef {
    fn from(v: &str) -> Self {
        ColumnRef::Name(v.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(v: String) -> Self {
        ColumnRef::Name(v)
    }
}

/// Validated column binding key.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ColumnKey {
    /// 0-based index
    Index(usize),
    /// Name after case folding
    Name(String),
}

/// A prepared statement bound to the driver it was created from.
pub struct Statement<'conn, D: Driver> {
    driver: &'conn D,
    sql: String,
    native: Option<D::Statement>,
    binder: ParameterBinder,
    state: StatementState,
    fetch_mode: FetchMode,
    case_folding: CaseFolding,
    columns: Option<Arc<ColumnInfo>>,
    column_bindings: Vec<(ColumnKey, Slot)>,
    profiler: SharedProfiler,
    profile: Option<ProfileHandle>,
}

impl<'conn, D: Driver> Statement<'conn, D> {
    /// Tokenize `sql` for `driver`. No native statement is allocated yet.
    pub fn new(driver: &'conn D, sql: impl Into<String>, profiler: SharedProfiler) -> Result<Self> {
        let sql = sql.into();
        let parser = PlaceholderParser::for_driver(driver);
        let tokens = parser.parse(&sql)?;
        Ok(Self {
            driver,
            binder: ParameterBinder::new(tokens, &parser),
            sql,
            native: None,
            state: StatementState::Constructed,
            fetch_mode: FetchMode::default(),
            case_folding: CaseFolding::default(),
            columns: None,
            column_bindings: Vec::new(),
            profiler,
            profile: None,
        })
    }

    /// Set the default fetch mode.
    pub fn with_fetch_mode(mut self, mode: FetchMode) -> Self {
        self.fetch_mode = mode;
        self
    }

    /// Set the case policy for result column names.
    pub fn with_case_folding(mut self, folding: CaseFolding) -> Self {
        self.case_folding = folding;
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    pub fn tokens(&self) -> &TokenSequence {
        self.binder.tokens()
    }

    pub fn fetch_mode(&self) -> FetchMode {
        self.fetch_mode
    }

    pub fn case_folding(&self) -> CaseFolding {
        self.case_folding
    }

    /// Handle of the profile recorded for the most recent execution.
    pub fn profile_handle(&self) -> Option<ProfileHandle> {
        self.profile
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == StatementState::Closed {
            Err(Error::StatementClosed)
        } else {
            Ok(())
        }
    }

    fn native_mut(&mut self) -> Result<&mut D::Statement> {
        self.native.as_mut().ok_or(Error::StatementClosed)
    }

    /// Allocate the native statement. A no-op once prepared.
    pub fn prepare(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.state != StatementState::Constructed {
            return Ok(());
        }
        let native = self.driver.prepare_native(&self.sql)?;
        tracing::debug!(sql = %self.sql, "Prepared statement");
        self.native = Some(native);
        self.state = StatementState::Prepared;
        Ok(())
    }

    /// Bind a value captured now.
    pub fn bind_value(&mut self, target: impl Into<ParamRef>, value: impl Into<Value>) -> Result<()> {
        self.ensure_open()?;
        self.binder.bind_value(target, value).map(|_| ())
    }

    /// Bind a slot that is read each time the statement executes.
    pub fn bind_param(&mut self, target: impl Into<ParamRef>, slot: &Slot) -> Result<()> {
        self.ensure_open()?;
        self.binder.bind_slot(target, slot).map(|_| ())
    }

    /// Register `slot` to receive a result column on every `Bound` fetch.
    ///
    /// Names go through the statement's case policy, so they match the keys
    /// of fetched records.
    pub fn bind_column(&mut self, column: impl Into<ColumnRef>, slot: &Slot) -> Result<()> {
        self.ensure_open()?;
        let column = match column.into() {
            ColumnRef::Position(p) => match usize::try_from(p) {
                Ok(p) if p >= 1 => ColumnKey::Index(p - 1),
                _ => {
                    return Err(BindError {
                        target: p.to_string(),
                        message: "column positions start at 1".to_string(),
                    }
                    .into());
                }
            },
            ColumnRef::Name(name) => ColumnKey::Name(self.case_folding.fold(&name)),
        };
        match self.column_bindings.iter().position(|(c, _)| *c == column) {
            Some(i) => self.column_bindings[i].1 = slot.clone(),
            None => self.column_bindings.push((column, slot.clone())),
        }
        Ok(())
    }

    /// Execute with the stored bindings.
    pub fn execute(&mut self) -> Result<()> {
        self.run(None)
    }

    /// Execute with `params` instead of the stored bindings, for this call only.
    pub fn execute_with(&mut self, params: impl Into<Params>) -> Result<()> {
        let params = params.into();
        self.run(Some(&params))
    }

    #[tracing::instrument(level = "debug", skip(self, overrides), fields(sql = %self.sql))]
    fn run(&mut self, overrides: Option<&Params>) -> Result<()> {
        self.ensure_open()?;
        if self.state == StatementState::Constructed {
            self.prepare()?;
        }
        if self.state == StatementState::Executed {
            self.close_cursor()?;
        }

        let params = match overrides {
            Some(p) => self.binder.resolve_override(p)?,
            None => self.binder.resolve(),
        };

        let handle = self.start_profile(&params)?;
        let started = Instant::now();
        let outcome = self.execute_native(&params);

        if let Err(err) = outcome {
            if let Some(h) = handle {
                if let Ok(mut p) = profiler::borrow_shared(&self.profiler) {
                    p.discard(h);
                }
            }
            self.profile = None;
            // Drop half-applied native bindings
            if let Some(native) = self.native.as_mut() {
                if let Err(close_err) = native.close_cursor() {
                    tracing::warn!(error = %close_err, "Failed to release cursor");
                }
            }
            tracing::debug!(error = %err, "Statement execution failed");
            return Err(err);
        }

        if let Some(h) = handle {
            profiler::borrow_shared(&self.profiler)?.end(h)?;
        }

        let native = self.native_mut()?;
        let names = native.column_metadata();
        let affected = native.affected_row_count();
        self.columns = Some(Arc::new(ColumnInfo::folded(&names, self.case_folding)));
        self.state = StatementState::Executed;

        tracing::debug!(
            elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
            columns = names.len(),
            affected,
            "Executed statement"
        );
        Ok(())
    }

    /// Start a profile for this execution, reusing the text and type of
    /// the previous one when it has ended.
    fn start_profile(&mut self, params: &[(BindTarget, Value)]) -> Result<Option<ProfileHandle>> {
        let mut profiler = profiler::borrow_shared(&self.profiler)?;
        let reusable = self.profile.filter(|h| {
            profiler
                .query_profile(*h)
                .is_ok_and(QueryProfile::has_ended)
        });
        let handle = match reusable {
            Some(previous) => profiler.clone_for_reuse_with_params(previous, params.to_vec())?,
            None => profiler.start_with_params(&self.sql, None, params.to_vec()),
        };
        self.profile = handle;
        Ok(handle)
    }

    fn execute_native(&mut self, params: &[(BindTarget, Value)]) -> Result<()> {
        let native = self.native_mut()?;
        for (target, value) in params {
            native.bind_native(target, value)?;
        }
        native.execute_native()
    }

    /// Fetch the next row in the default mode.
    pub fn fetch(&mut self) -> Result<Option<Fetched>> {
        self.fetch_with(self.fetch_mode)
    }

    /// Fetch the next row in `mode`, for this call only.
    ///
    /// Returns `None` at end of data, and before the statement has executed.
    pub fn fetch_with(&mut self, mode: FetchMode) -> Result<Option<Fetched>> {
        self.ensure_open()?;
        if self.state != StatementState::Executed {
            return Ok(None);
        }
        // Checked before stepping so a bad index does not consume a row.
        // Statements without a result set simply report end of data.
        if let FetchMode::Column(index) = mode {
            let count = self.column_count();
            if count > 0 && index >= count {
                return Err(fetch::column_out_of_range(index, count));
            }
        }
        let Some(values) = self.native_mut()?.fetch_native_row()? else {
            return Ok(None);
        };
        let columns = match &self.columns {
            Some(columns) => Arc::clone(columns),
            None => Arc::new(ColumnInfo::new(Vec::new())),
        };
        let fetched = fetch::shape(mode, &columns, values)?;
        if mode == FetchMode::Bound {
            self.copy_bound_columns(&fetched);
        }
        Ok(Some(fetched))
    }

    /// Fetch with a raw mode code. Unknown codes close the cursor and fail.
    pub fn fetch_with_code(&mut self, code: i32) -> Result<Option<Fetched>> {
        self.ensure_open()?;
        let mode = self.check_mode_code(code)?;
        self.fetch_with(mode)
    }

    fn copy_bound_columns(&self, fetched: &Fetched) {
        let (Some(values), Some(record)) = (fetched.as_num(), fetched.as_record()) else {
            return;
        };
        for (column, slot) in &self.column_bindings {
            let value = match column {
                ColumnKey::Index(i) => values.get(*i),
                ColumnKey::Name(name) => record.get(name),
            };
            if let Some(value) = value {
                slot.set(value.clone());
            }
        }
    }

    /// Every remaining row in the default mode.
    pub fn fetch_all(&mut self) -> Result<Vec<Fetched>> {
        self.fetch_all_with(self.fetch_mode)
    }

    pub fn fetch_all_with(&mut self, mode: FetchMode) -> Result<Vec<Fetched>> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch_with(mode)? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// One column of the next row, by 0-based index.
    ///
    /// `None` means no more rows; a NULL or empty column is `Some`.
    pub fn fetch_column(&mut self, index: usize) -> Result<Option<Value>> {
        Ok(self
            .fetch_with(FetchMode::Column(index))?
            .and_then(Fetched::into_scalar))
    }

    /// One column of every remaining row.
    pub fn fetch_all_column(&mut self, index: usize) -> Result<Vec<Value>> {
        let mut values = Vec::new();
        while let Some(value) = self.fetch_column(index)? {
            values.push(value);
        }
        Ok(values)
    }

    /// The next row with name and index access.
    pub fn fetch_object(&mut self) -> Result<Option<Row>> {
        Ok(self.fetch_with(FetchMode::Object)?.and_then(Fetched::into_row))
    }

    pub fn set_fetch_mode(&mut self, mode: FetchMode) -> Result<()> {
        self.ensure_open()?;
        self.fetch_mode = mode;
        Ok(())
    }

    /// Set the default mode from a raw code.
    ///
    /// An unknown code closes the cursor before the error is returned.
    pub fn set_fetch_mode_code(&mut self, code: i32) -> Result<()> {
        self.ensure_open()?;
        let mode = self.check_mode_code(code)?;
        self.fetch_mode = mode;
        Ok(())
    }

    fn check_mode_code(&mut self, code: i32) -> Result<FetchMode> {
        match FetchMode::from_code(code) {
            Ok(mode) => Ok(mode),
            Err(err) => {
                tracing::warn!(code, sql = %self.sql, "Invalid fetch mode, closing cursor");
                if let Err(close_err) = self.close_cursor() {
                    tracing::warn!(error = %close_err, "Failed to close cursor");
                }
                Err(err)
            }
        }
    }

    /// Release the current result so the statement can execute again.
    pub fn close_cursor(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.state != StatementState::Executed {
            return Ok(());
        }
        self.native_mut()?.close_cursor()?;
        self.state = StatementState::Prepared;
        Ok(())
    }

    /// Release the native statement. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.state == StatementState::Closed {
            return Ok(());
        }
        let released = match (self.native.take(), self.state) {
            (Some(mut native), StatementState::Executed) => native.close_cursor(),
            _ => Ok(()),
        };
        self.columns = None;
        self.column_bindings.clear();
        self.state = StatementState::Closed;
        tracing::trace!(sql = %self.sql, "Closed statement");
        released
    }

    /// Number of result columns; zero before execution.
    pub fn column_count(&self) -> usize {
        self.columns.as_ref().map_or(0, |c| c.len())
    }

    /// Result column names after case folding.
    pub fn column_names(&self) -> Vec<String> {
        self.columns
            .as_ref()
            .map(|c| c.names().to_vec())
            .unwrap_or_default()
    }

    /// Rows affected by the last execution.
    pub fn row_count(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self
            .native
            .as_ref()
            .map_or(0, NativeStatement::affected_row_count))
    }

    /// Last native error for this statement, falling back to the connection.
    pub fn error_info(&self) -> Option<NativeErrorInfo> {
        self.native
            .as_ref()
            .and_then(NativeStatement::error_info)
            .or_else(|| self.driver.error_info())
    }

    /// Advance to the next result set, if the driver supports several.
    pub fn next_rowset(&mut self) -> Result<bool> {
        self.ensure_open()?;
        let more = self.native_mut()?.next_rowset()?;
        if more {
            let names = self.native_mut()?.column_metadata();
            self.columns = Some(Arc::new(ColumnInfo::folded(&names, self.case_folding)));
        }
        Ok(more)
    }

    /// The profiler this statement records into.
    pub fn profiler(&self) -> SharedProfiler {
        Rc::clone(&self.profiler)
    }
}

impl<D: Driver> std::fmt::Debug for Statement<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("state", &self.state)
            .field("fetch_mode", &self.fetch_mode)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::{Profiler, QueryType};
    use crate::testing::{MockConfig, MockDriver};
    use dbal_core::{ParseErrorKind, ProfilerErrorKind};

    fn driver() -> MockDriver {
        MockDriver::connect(&MockConfig::default()).unwrap()
    }

    fn users() -> MockDriver {
        MockDriver::connect(&MockConfig::default().with_rows(
            &["Id", "Name"],
            vec![
                vec![Value::Int(1), Value::Text("alice".into())],
                vec![Value::Int(2), Value::Text(String::new())],
            ],
        ))
        .unwrap()
    }

    #[test]
    fn construction_parses_before_touching_driver() {
        let d = MockDriver::connect(&MockConfig::positional_only()).unwrap();
        let err = Statement::new(&d, "SELECT * FROM t WHERE a = ? AND b = :name", Profiler::new().shared())
            .unwrap_err();
        match err {
            Error::Parse(e) => assert_eq!(e.kind, ParseErrorKind::UnsupportedPlaceholderStyle),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert_eq!(d.log().prepared, 0);
    }

    #[test]
    fn state_transitions() {
        let d = users();
        let mut stmt = Statement::new(&d, "SELECT * FROM users", Profiler::new().shared()).unwrap();
        assert_eq!(stmt.state(), StatementState::Constructed);
        stmt.prepare().unwrap();
        assert_eq!(stmt.state(), StatementState::Prepared);
        stmt.execute().unwrap();
        assert_eq!(stmt.state(), StatementState::Executed);
        stmt.close_cursor().unwrap();
        assert_eq!(stmt.state(), StatementState::Prepared);
        stmt.close().unwrap();
        assert_eq!(stmt.state(), StatementState::Closed);
        stmt.close().unwrap();
        assert!(matches!(stmt.execute(), Err(Error::StatementClosed)));
        assert!(matches!(stmt.fetch(), Err(Error::StatementClosed)));
        assert!(matches!(stmt.bind_value(1, 1), Err(Error::StatementClosed)));
    }

    #[test]
    fn execute_binds_in_placeholder_order() {
        let d = driver();
        let mut stmt = Statement::new(&d, "SELECT ?, ?", Profiler::new().shared()).unwrap();
        stmt.bind_value(2, "second").unwrap();
        stmt.bind_value(1, "first").unwrap();
        stmt.execute().unwrap();
        let row = stmt.fetch_with(FetchMode::Num).unwrap().unwrap();
        assert_eq!(
            row.as_num().unwrap(),
            [Value::Text("first".into()), Value::Text("second".into())]
        );
    }

    #[test]
    fn bind_param_reads_slot_at_execute() {
        let d = driver();
        let mut stmt = Statement::new(&d, "SELECT :v", Profiler::new().shared()).unwrap();
        let slot = Slot::new(1);
        stmt.bind_param("v", &slot).unwrap();
        slot.set(7);
        stmt.execute().unwrap();
        assert_eq!(stmt.fetch_column(0).unwrap(), Some(Value::Int(7)));

        slot.set(8);
        stmt.execute().unwrap();
        assert_eq!(stmt.fetch_column(0).unwrap(), Some(Value::Int(8)));
    }

    #[test]
    fn execute_with_overrides_stored_bindings_once() {
        let d = driver();
        let mut stmt = Statement::new(&d, "SELECT ?", Profiler::new().shared()).unwrap();
        stmt.bind_value(1, "stored").unwrap();
        stmt.execute_with(vec![Value::from("override")]).unwrap();
        assert_eq!(stmt.fetch_column(0).unwrap(), Some(Value::from("override")));
        stmt.execute().unwrap();
        assert_eq!(stmt.fetch_column(0).unwrap(), Some(Value::from("stored")));
    }

    #[test]
    fn fetch_modes_shape_rows() {
        let d = users();
        let mut stmt = Statement::new(&d, "SELECT * FROM users", Profiler::new().shared())
            .unwrap()
            .with_case_folding(CaseFolding::Lower);
        stmt.execute().unwrap();
        assert_eq!(stmt.column_names(), ["id", "name"]);

        let assoc = stmt.fetch().unwrap().unwrap();
        assert_eq!(assoc.as_record().unwrap().get("name"), Some(&Value::from("alice")));
        let obj = stmt.fetch_object().unwrap().unwrap();
        assert_eq!(obj.get_named::<i64>("id").unwrap(), 2);
        assert!(stmt.fetch().unwrap().is_none());
    }

    #[test]
    fn fetch_all_and_column_sentinel() {
        let d = users();
        let mut stmt = Statement::new(&d, "SELECT * FROM users", Profiler::new().shared()).unwrap();
        stmt.execute().unwrap();
        let names = stmt.fetch_all_column(1).unwrap();
        assert_eq!(names, vec![Value::from("alice"), Value::from("")]);

        stmt.execute().unwrap();
        assert_eq!(stmt.fetch_all().unwrap().len(), 2);
        assert_eq!(stmt.fetch_column(0).unwrap(), None);
    }

    #[test]
    fn bound_mode_copies_registered_columns() {
        let d = users();
        let mut stmt = Statement::new(&d, "SELECT * FROM users", Profiler::new().shared()).unwrap();
        let id = Slot::default();
        let name = Slot::default();
        let untouched = Slot::new("keep");
        stmt.bind_column(1, &id).unwrap();
        stmt.bind_column("Name", &name).unwrap();
        stmt.bind_column("missing", &untouched).unwrap();
        assert!(matches!(stmt.bind_column(0, &id), Err(Error::InvalidBindTarget(_))));

        stmt.set_fetch_mode(FetchMode::Bound).unwrap();
        stmt.execute().unwrap();
        let row = stmt.fetch().unwrap().unwrap();
        assert!(matches!(row, Fetched::Both(_, _)));
        assert_eq!(id.get(), Value::Int(1));
        assert_eq!(name.get(), Value::from("alice"));
        assert_eq!(untouched.get(), Value::from("keep"));
    }

    #[test]
    fn invalid_fetch_mode_closes_cursor() {
        let d = users();
        let mut stmt = Statement::new(&d, "SELECT * FROM users", Profiler::new().shared()).unwrap();
        stmt.execute().unwrap();
        assert!(matches!(stmt.set_fetch_mode_code(42), Err(Error::InvalidFetchMode(_))));
        assert_eq!(stmt.state(), StatementState::Prepared);
        assert_eq!(d.log().cursor_closes, 1);
        assert_eq!(stmt.fetch_mode(), FetchMode::Assoc);

        stmt.execute().unwrap();
        assert!(matches!(stmt.fetch_with_code(-1), Err(Error::InvalidFetchMode(_))));
        assert!(stmt.fetch().unwrap().is_none());
    }

    #[test]
    fn fetch_before_execute_is_empty() {
        let d = users();
        let mut stmt = Statement::new(&d, "SELECT * FROM users", Profiler::new().shared()).unwrap();
        assert!(stmt.fetch().unwrap().is_none());
        assert_eq!(stmt.column_count(), 0);
    }

    #[test]
    fn repeated_execution_records_distinct_profiles() {
        let d = driver();
        let profiler = Profiler::enabled().shared();
        let mut stmt = Statement::new(&d, "SELECT ?", Rc::clone(&profiler)).unwrap();
        stmt.bind_value(1, 1).unwrap();
        stmt.execute().unwrap();
        let first = stmt.profile_handle().unwrap();
        stmt.bind_value(1, 2).unwrap();
        stmt.execute().unwrap();
        let second = stmt.profile_handle().unwrap();
        assert_ne!(first, second);

        let p = profiler.borrow();
        let profiles = p.query_profiles(None, false);
        assert_eq!(profiles.len(), 2);
        assert!(profiles.iter().all(|q| q.query_type() == QueryType::Select));
        assert_eq!(profiles[0].params()[0].1, Value::Int(1));
        assert_eq!(profiles[1].params()[0].1, Value::Int(2));
    }

    #[test]
    fn failed_execution_discards_profile() {
        let d = MockDriver::connect(&MockConfig::default().failing_execute()).unwrap();
        let profiler = Profiler::enabled().shared();
        let mut stmt = Statement::new(&d, "UPDATE t SET a = 1", Rc::clone(&profiler)).unwrap();
        let err = stmt.execute().unwrap_err();
        assert!(matches!(err, Error::Driver(_)));
        assert!(stmt.profile_handle().is_none());
        assert!(profiler.borrow().query_profiles(None, true).is_empty());
        assert_eq!(stmt.state(), StatementState::Prepared);
    }

    #[test]
    fn failed_execution_releases_native_bindings() {
        let d = MockDriver::connect(&MockConfig::default().failing_execute()).unwrap();
        let mut stmt = Statement::new(&d, "INSERT INTO t VALUES (?, ?)", Profiler::new().shared()).unwrap();
        assert!(stmt.execute_with(vec![Value::Int(1), Value::from("stale")]).is_err());
        assert_eq!(d.log().cursor_closes, 1);
        assert_eq!(stmt.state(), StatementState::Prepared);
    }

    #[test]
    fn out_of_range_column_keeps_the_row() {
        let d = users();
        let mut stmt = Statement::new(&d, "SELECT * FROM users", Profiler::new().shared()).unwrap();
        stmt.execute().unwrap();
        assert!(matches!(stmt.fetch_column(5), Err(Error::Type(_))));
        assert_eq!(stmt.fetch_all().unwrap().len(), 2);
    }

    #[test]
    fn held_profiler_borrow_is_an_error() {
        let d = driver();
        let profiler = Profiler::enabled().shared();
        let mut stmt = Statement::new(&d, "SELECT 1", Rc::clone(&profiler)).unwrap();
        let view = profiler.borrow();
        match stmt.execute() {
            Err(Error::Profiler(e)) => {
                assert_eq!(e.kind, ProfilerErrorKind::Busy);
                assert_eq!(e.handle, None);
            }
            other => panic!("expected busy profiler, got {other:?}"),
        }
        drop(view);
        stmt.execute().unwrap();
        assert_eq!(profiler.borrow().total_num_queries(None), 1);
    }

    #[test]
    fn evicted_profile_does_not_break_reuse() {
        let d = driver();
        let profiler = Profiler::enabled().shared();
        profiler
            .borrow_mut()
            .set_filter_elapsed(Some(std::time::Duration::from_secs(3600)));
        let mut stmt = Statement::new(&d, "SELECT 1", Rc::clone(&profiler)).unwrap();
        stmt.execute().unwrap();
        stmt.execute().unwrap();
        assert!(profiler.borrow().query_profiles(None, true).is_empty());

        let stale = stmt.profile_handle().unwrap();
        match profiler.borrow_mut().end(stale) {
            Err(Error::Profiler(e)) => assert_eq!(e.kind, ProfilerErrorKind::UnknownHandle),
            other => panic!("expected unknown handle, got {other:?}"),
        }
    }

    #[test]
    fn next_rowset_unsupported_by_default() {
        let d = users();
        let mut stmt = Statement::new(&d, "SELECT * FROM users", Profiler::new().shared()).unwrap();
        stmt.execute().unwrap();
        assert!(matches!(stmt.next_rowset(), Err(Error::NotImplemented(_))));
    }

    #[test]
    fn row_count_reports_affected_rows() {
        let d = MockDriver::connect(&MockConfig::default().with_affected(3)).unwrap();
        let mut stmt = Statement::new(&d, "DELETE FROM t", Profiler::new().shared()).unwrap();
        stmt.execute().unwrap();
        assert_eq!(stmt.row_count().unwrap(), 3);
    }
}
