//! Caller-owned value slots.
//!
//! A [`Slot`] stands in for a variable the caller wants the statement to
//! read from (`bind_param`) or write into (`bind_column`). Clones share the
//! same cell: the statement keeps one clone, the caller keeps another.

use std::cell::RefCell;
use std::rc::Rc;

use dbal_core::Value;

#[derive(Debug, Clone, Default)]
pub struct Slot(Rc<RefCell<Value>>);

impl Slot {
    pub fn new(initial: impl Into<Value>) -> Self {
        Self(Rc::new(RefCell::new(initial.into())))
    }

    /// Current value.
    pub fn get(&self) -> Value {
        self.0.borrow().clone()
    }

    pub fn set(&self, value: impl Into<Value>) {
        *self.0.borrow_mut() = value.into();
    }

    /// Replace the value, returning the previous one.
    pub fn replace(&self, value: impl Into<Value>) -> Value {
        self.0.replace(value.into())
    }
}
