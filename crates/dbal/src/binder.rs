//! Bind-target validation and the bound parameter set.
//!
//! Every bind call is checked against the statement's [`TokenSequence`]
//! at the moment it is made. Integer targets are 1-based positions; string
//! targets are names, with the leading `:` added when missing. A string of
//! digits is read as a position.

use std::collections::BTreeMap;

use dbal_core::{BindError, BindTarget, ParameterStyle, Result, Value};

use crate::placeholder::{PlaceholderParser, TokenSequence};
use crate::slot::Slot;

/// A bind target as supplied by the caller, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamRef {
    Position(i64),
    Name(String),
}

impl From<usize> for ParamRef {
    fn from(v: usize) -> Self {
        ParamRef::Position(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<i32> for ParamRef {
    fn from(v: i32) -> Self {
        ParamRef::Position(i64::from(v))
    }
}

impl From<i64> for ParamRef {
    fn from(v: i64) -> Self {
        ParamRef::Position(v)
    }
}

impl From<&str> for ParamRef {
    fn from(v: &str) -> Self {
        ParamRef::Name(v.to_string())
    }
}

impl From<String> for ParamRef {
    fn from(v: String) -> Self {
        ParamRef::Name(v)
    }
}

impl std::fmt::Display for ParamRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamRef::Position(p) => write!(f, "{}", p),
            ParamRef::Name(n) => f.write_str(n),
        }
    }
}

/// Parameter values passed straight to `execute_with`, bypassing the
/// stored bindings for that one execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// Values for `?` placeholders, first element binds position 1
    Positional(Vec<Value>),
    /// Values keyed by placeholder name, with or without the `:`
    Named(Vec<(String, Value)>),
}

impl Params {
    pub fn is_empty(&self) -> bool {
        match self {
            Params::Positional(v) => v.is_empty(),
            Params::Named(v) => v.is_empty(),
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Params::Positional(Vec::new())
    }
}

impl From<()> for Params {
    fn from((): ()) -> Self {
        Params::default()
    }
}

impl From<Vec<Value>> for Params {
    fn from(v: Vec<Value>) -> Self {
        Params::Positional(v)
    }
}

impl From<&[Value]> for Params {
    fn from(v: &[Value]) -> Self {
        Params::Positional(v.to_vec())
    }
}

impl<const N: usize> From<[Value; N]> for Params {
    fn from(v: [Value; N]) -> Self {
        Params::Positional(v.into())
    }
}

impl<K: Into<String>> From<Vec<(K, Value)>> for Params {
    fn from(v: Vec<(K, Value)>) -> Self {
        Params::Named(v.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// What is held for a bound target.
#[derive(Debug, Clone)]
enum Bound {
    /// Captured at bind time
    Value(Value),
    /// Read when the statement executes
    Slot(Slot),
}

/// Validates bind calls and holds the bound parameter set.
#[derive(Debug, Clone)]
pub struct ParameterBinder {
    tokens: TokenSequence,
    positional_allowed: bool,
    named_allowed: bool,
    bound: BTreeMap<BindTarget, Bound>,
}

impl ParameterBinder {
    pub fn new(tokens: TokenSequence, parser: &PlaceholderParser) -> Self {
        Self {
            tokens,
            positional_allowed: parser.allows(ParameterStyle::Positional),
            named_allowed: parser.allows(ParameterStyle::Named),
            bound: BTreeMap::new(),
        }
    }

    pub fn tokens(&self) -> &TokenSequence {
        &self.tokens
    }

    /// Validate `target` against the token list.
    pub fn normalize(&self, target: &ParamRef) -> Result<BindTarget> {
        match target {
            ParamRef::Position(p) => self.normalize_position(*p, &target.to_string()),
            ParamRef::Name(name) => {
                if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
                    let p = name.parse::<i64>().unwrap_or(i64::MAX);
                    return self.normalize_position(p, name);
                }
                if !self.named_allowed {
                    return Err(invalid(name, "driver does not support named parameters"));
                }
                let name = if name.starts_with(':') {
                    name.clone()
                } else {
                    format!(":{}", name)
                };
                if self.tokens.contains_name(&name) {
                    Ok(BindTarget::Name(name))
                } else {
                    Err(invalid(&name, "no such placeholder in statement"))
                }
            }
        }
    }

    fn normalize_position(&self, position: i64, shown: &str) -> Result<BindTarget> {
        if !self.positional_allowed {
            return Err(invalid(shown, "driver does not support positional parameters"));
        }
        let count = self.tokens.positional_count();
        match usize::try_from(position) {
            Ok(p) if (1..=count).contains(&p) => Ok(BindTarget::Position(p)),
            _ => Err(invalid(
                shown,
                &format!("position out of range (statement has {} positional placeholders)", count),
            )),
        }
    }

    /// Bind a value captured now. Re-binding a target replaces it.
    pub fn bind_value(&mut self, target: impl Into<ParamRef>, value: impl Into<Value>) -> Result<BindTarget> {
        let target = self.normalize(&target.into())?;
        self.bound.insert(target.clone(), Bound::Value(value.into()));
        Ok(target)
    }

    /// Bind a slot whose value is read at execute time.
    pub fn bind_slot(&mut self, target: impl Into<ParamRef>, slot: &Slot) -> Result<BindTarget> {
        let target = self.normalize(&target.into())?;
        self.bound.insert(target.clone(), Bound::Slot(slot.clone()));
        Ok(target)
    }

    pub fn is_bound(&self, target: &BindTarget) -> bool {
        self.bound.contains_key(target)
    }

    pub fn bound_count(&self) -> usize {
        self.bound.len()
    }

    pub fn clear(&mut self) {
        self.bound.clear();
    }

    /// Current bound set in placeholder order, slots read now.
    pub fn resolve(&self) -> Vec<(BindTarget, Value)> {
        self.tokens
            .bind_targets()
            .into_iter()
            .filter_map(|target| {
                let value = match self.bound.get(&target)? {
                    Bound::Value(v) => v.clone(),
                    Bound::Slot(s) => s.get(),
                };
                Some((target, value))
            })
            .collect()
    }

    /// Validate an explicit parameter set without touching stored bindings.
    pub fn resolve_override(&self, params: &Params) -> Result<Vec<(BindTarget, Value)>> {
        let mut resolved = BTreeMap::new();
        match params {
            Params::Positional(values) => {
                for (i, value) in values.iter().enumerate() {
                    let target = self.normalize(&ParamRef::from(i + 1))?;
                    resolved.insert(target, value.clone());
                }
            }
            Params::Named(pairs) => {
                for (name, value) in pairs {
                    let target = self.normalize(&ParamRef::Name(name.clone()))?;
                    resolved.insert(target, value.clone());
                }
            }
        }
        Ok(self
            .tokens
            .bind_targets()
            .into_iter()
            .filter_map(|t| resolved.remove(&t).map(|v| (t, v)))
            .collect())
    }
}

fn invalid(target: &str, message: &str) -> dbal_core::Error {
    BindError {
        target: target.to_string(),
        message: message.to_string(),
    }
    .into()
}
