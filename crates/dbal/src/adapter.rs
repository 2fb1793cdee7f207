//! Connection-level entry point.
//!
//! An [`Adapter`] owns a connected driver and the profiler every statement
//! it prepares records into. Statements borrow the adapter, so they cannot
//! outlive the connection.

use std::cell::{Ref, RefMut};
use std::rc::Rc;

use dbal_core::{
    Driver, Error, NativeErrorInfo, ParameterStyle, Result, TypeError, Value,
};

use crate::binder::Params;
use crate::config::AdapterOptions;
use crate::fetch::{FetchMode, Fetched, Record};
use crate::profiler::{self, Profiler, QueryType, SharedProfiler};
use crate::statement::Statement;

pub struct Adapter<D: Driver> {
    driver: D,
    profiler: SharedProfiler,
    options: AdapterOptions,
}

impl<D: Driver> Adapter<D> {
    /// Connect through `D`, recording a `CONNECT` profile.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn connect(config: &D::Config, options: AdapterOptions) -> Result<Self> {
        let profiler = options.profiler.build().shared();
        let handle = profiler
            .borrow_mut()
            .start("connect", Some(QueryType::Connect));

        let driver = match D::connect(config) {
            Ok(driver) => driver,
            Err(err) => {
                if let Some(h) = handle {
                    profiler.borrow_mut().discard(h);
                }
                tracing::info!(error = %err, "Connection failed");
                return Err(err);
            }
        };
        if let Some(h) = handle {
            profiler.borrow_mut().end(h)?;
        }

        tracing::info!(
            profiling = options.profiler.enabled,
            fetch_mode = %options.fetch_mode,
            "Connected"
        );
        Ok(Self {
            driver,
            profiler,
            options,
        })
    }

    /// Wrap an already connected driver.
    pub fn with_driver(driver: D, options: AdapterOptions) -> Self {
        Self {
            driver,
            profiler: options.profiler.build().shared(),
            options,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    /// Borrow the profiler.
    ///
    /// The borrow must be released before statements from this adapter
    /// execute again.
    pub fn profiler(&self) -> Ref<'_, Profiler> {
        self.profiler.borrow()
    }

    pub fn profiler_mut(&self) -> RefMut<'_, Profiler> {
        self.profiler.borrow_mut()
    }

    pub fn shared_profiler(&self) -> SharedProfiler {
        Rc::clone(&self.profiler)
    }

    pub fn supports_parameters(&self, style: ParameterStyle) -> bool {
        self.driver.supports_parameter_style(style)
    }

    /// A statement with its SQL parsed but nothing sent to the driver.
    pub fn statement(&self, sql: impl Into<String>) -> Result<Statement<'_, D>> {
        Ok(Statement::new(&self.driver, sql, self.shared_profiler())?
            .with_fetch_mode(self.options.fetch_mode)
            .with_case_folding(self.options.case_folding))
    }

    /// A prepared statement.
    pub fn prepare(&self, sql: impl Into<String>) -> Result<Statement<'_, D>> {
        let mut stmt = self.statement(sql)?;
        stmt.prepare()?;
        Ok(stmt)
    }

    /// Prepare and execute `sql`, returning the executed statement.
    pub fn query(&self, sql: impl Into<String>, params: impl Into<Params>) -> Result<Statement<'_, D>> {
        let params = params.into();
        let mut stmt = self.prepare(sql)?;
        if params.is_empty() {
            stmt.execute()?;
        } else {
            stmt.execute_with(params)?;
        }
        Ok(stmt)
    }

    /// Every row, in the default fetch mode.
    pub fn fetch_all(&self, sql: impl Into<String>, params: impl Into<Params>) -> Result<Vec<Fetched>> {
        self.query(sql, params)?.fetch_all()
    }

    /// The first row, in the default fetch mode.
    pub fn fetch_row(&self, sql: impl Into<String>, params: impl Into<Params>) -> Result<Option<Fetched>> {
        self.query(sql, params)?.fetch()
    }

    /// The first column of every row.
    pub fn fetch_col(&self, sql: impl Into<String>, params: impl Into<Params>) -> Result<Vec<Value>> {
        self.query(sql, params)?.fetch_all_column(0)
    }

    /// The first column of the first row.
    pub fn fetch_one(&self, sql: impl Into<String>, params: impl Into<Params>) -> Result<Option<Value>> {
        self.query(sql, params)?.fetch_column(0)
    }

    /// First column paired with second column, for every row.
    pub fn fetch_pairs(
        &self,
        sql: impl Into<String>,
        params: impl Into<Params>,
    ) -> Result<Vec<(Value, Value)>> {
        let mut stmt = self.query(sql, params)?;
        let mut pairs = Vec::new();
        while let Some(row) = stmt.fetch_with(FetchMode::Num)? {
            let mut values = row.into_values().into_iter();
            match (values.next(), values.next()) {
                (Some(key), Some(value)) => pairs.push((key, value)),
                _ => {
                    return Err(Error::Type(TypeError {
                        expected: "at least two columns",
                        actual: format!("{} columns", stmt.column_count()),
                        column: None,
                    }));
                }
            }
        }
        Ok(pairs)
    }

    /// Rows keyed by their first column. A repeated key keeps its first
    /// position and the last row seen.
    pub fn fetch_assoc(
        &self,
        sql: impl Into<String>,
        params: impl Into<Params>,
    ) -> Result<Vec<(Value, Record)>> {
        let mut stmt = self.query(sql, params)?;
        let mut rows: Vec<(Value, Record)> = Vec::new();
        while let Some(row) = stmt.fetch_with(FetchMode::Both)? {
            let Fetched::Both(values, record) = row else {
                continue;
            };
            let Some(key) = values.into_iter().next() else {
                continue;
            };
            match rows.iter().position(|(k, _)| *k == key) {
                Some(i) => rows[i].1 = record,
                None => rows.push((key, record)),
            }
        }
        Ok(rows)
    }

    pub fn begin_transaction(&self) -> Result<()> {
        self.transaction_step("begin", D::begin)
    }

    pub fn commit(&self) -> Result<()> {
        self.transaction_step("commit", D::commit)
    }

    pub fn rollback(&self) -> Result<()> {
        self.transaction_step("rollback", D::rollback)
    }

    fn transaction_step(&self, label: &'static str, step: fn(&D) -> Result<()>) -> Result<()> {
        let handle = profiler::borrow_shared(&self.profiler)?
            .start(label, Some(QueryType::Transaction));
        match step(&self.driver) {
            Ok(()) => {
                if let Some(h) = handle {
                    profiler::borrow_shared(&self.profiler)?.end(h)?;
                }
                tracing::debug!(op = label, "Transaction step");
                Ok(())
            }
            Err(err) => {
                if let Some(h) = handle {
                    if let Ok(mut p) = profiler::borrow_shared(&self.profiler) {
                        p.discard(h);
                    }
                }
                tracing::debug!(op = label, error = %err, "Transaction step failed");
                Err(err)
            }
        }
    }

    /// Identifier generated by the most recent insert.
    pub fn last_insert_id(&self) -> Result<Value> {
        self.driver.last_insert_id()
    }

    pub fn error_info(&self) -> Option<NativeErrorInfo> {
        self.driver.error_info()
    }
}

impl<D: Driver + std::fmt::Debug> std::fmt::Debug for Adapter<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("driver", &self.driver)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
