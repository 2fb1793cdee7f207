//! Scripted in-memory driver for unit tests.
//!
//! Without canned rows, executing a statement yields a single row echoing
//! the bound values in bind-target order, which makes parameter routing
//! observable without a real backend.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use dbal_core::{
    BindTarget, Driver, DriverError, DriverOperation, NativeErrorInfo, NativeStatement,
    ParameterStyle, Result, Value,
};

#[derive(Debug, Clone)]
pub(crate) struct MockConfig {
    positional: bool,
    named: bool,
    columns: Vec<String>,
    rows: Option<Vec<Vec<Value>>>,
    fail_execute: bool,
    fail_connect: bool,
    affected: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            positional: true,
            named: true,
            columns: Vec::new(),
            rows: None,
            fail_execute: false,
            fail_connect: false,
            affected: 0,
        }
    }
}

impl MockConfig {
    pub(crate) fn positional_only() -> Self {
        Self {
            named: false,
            ..Self::default()
        }
    }

    pub(crate) fn with_rows(mut self, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        self.columns = columns.iter().map(|c| (*c).to_string()).collect();
        self.rows = Some(rows);
        self
    }

    pub(crate) fn failing_execute(mut self) -> Self {
        self.fail_execute = true;
        self
    }

    pub(crate) fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub(crate) fn with_affected(mut self, affected: u64) -> Self {
        self.affected = affected;
        self
    }
}

/// Calls the driver has seen.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockLog {
    pub prepared: usize,
    pub executed: usize,
    pub cursor_closes: usize,
    pub transactions: Vec<&'static str>,
}

#[derive(Debug)]
pub(crate) struct MockDriver {
    config: MockConfig,
    log: Rc<RefCell<MockLog>>,
    next_id: Cell<i64>,
}

impl MockDriver {
    pub(crate) fn log(&self) -> MockLog {
        self.log.borrow().clone()
    }

    fn record_transaction(&self, op: &'static str) {
        self.log.borrow_mut().transactions.push(op);
    }
}

impl Driver for MockDriver {
    type Config = MockConfig;
    type Statement = MockStatement;

    fn connect(config: &MockConfig) -> Result<Self> {
        if config.fail_connect {
            return Err(DriverError::new(DriverOperation::Connect, "connection refused")
                .code("08001")
                .into());
        }
        Ok(Self {
            config: config.clone(),
            log: Rc::new(RefCell::new(MockLog::default())),
            next_id: Cell::new(0),
        })
    }

    fn supports_parameter_style(&self, style: ParameterStyle) -> bool {
        match style {
            ParameterStyle::Positional => self.config.positional,
            ParameterStyle::Named => self.config.named,
        }
    }

    fn prepare_native(&self, sql: &str) -> Result<MockStatement> {
        if let Some(offset) = sql.find("FORM") {
            return Err(NativeErrorInfo {
                code: "1".to_string(),
                message: "syntax error".to_string(),
                offset: Some(offset),
                sql: Some(sql.to_string()),
            }
            .into_driver_error(DriverOperation::Prepare)
            .into());
        }
        self.log.borrow_mut().prepared += 1;
        if sql.trim_start().to_ascii_lowercase().starts_with("insert") {
            self.next_id.set(self.next_id.get() + 1);
        }
        Ok(MockStatement {
            config: self.config.clone(),
            log: Rc::clone(&self.log),
            bound: BTreeMap::new(),
            pending: VecDeque::new(),
            columns: Vec::new(),
        })
    }

    fn begin(&self) -> Result<()> {
        self.record_transaction("begin");
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.record_transaction("commit");
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.record_transaction("rollback");
        Ok(())
    }

    fn last_insert_id(&self) -> Result<Value> {
        Ok(Value::BigInt(self.next_id.get()))
    }

    fn error_info(&self) -> Option<NativeErrorInfo> {
        None
    }
}

#[derive(Debug)]
pub(crate) struct MockStatement {
    config: MockConfig,
    log: Rc<RefCell<MockLog>>,
    bound: BTreeMap<BindTarget, Value>,
    pending: VecDeque<Vec<Value>>,
    columns: Vec<String>,
}

impl NativeStatement for MockStatement {
    fn bind_native(&mut self, target: &BindTarget, value: &Value) -> Result<()> {
        self.bound.insert(target.clone(), value.clone());
        Ok(())
    }

    fn execute_native(&mut self) -> Result<()> {
        self.log.borrow_mut().executed += 1;
        if self.config.fail_execute {
            return Err(DriverError::new(DriverOperation::Execute, "constraint failed")
                .code("19")
                .into());
        }
        match &self.config.rows {
            Some(rows) => {
                self.columns.clone_from(&self.config.columns);
                self.pending = rows.iter().cloned().collect();
            }
            None if self.bound.is_empty() => {
                self.columns.clear();
                self.pending.clear();
            }
            None => {
                self.columns = self.bound.keys().map(ToString::to_string).collect();
                self.pending = VecDeque::from([self.bound.values().cloned().collect()]);
            }
        }
        Ok(())
    }

    fn fetch_native_row(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.pending.pop_front())
    }

    fn column_metadata(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn affected_row_count(&self) -> u64 {
        self.config.affected
    }

    fn error_info(&self) -> Option<NativeErrorInfo> {
        None
    }

    fn close_cursor(&mut self) -> Result<()> {
        self.log.borrow_mut().cursor_closes += 1;
        self.pending.clear();
        self.bound.clear();
        Ok(())
    }
}
