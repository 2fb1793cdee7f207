//! A single timed query record.

use std::fmt;
use std::ops::BitOr;
use std::time::{Duration, Instant};

use dbal_core::{BindTarget, Value};
use serde::Serialize;

/// Kind of statement a profile records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    Connect,
    Query,
    Insert,
    Update,
    Delete,
    Select,
    Transaction,
}

impl QueryType {
    pub const ALL: [QueryType; 7] = [
        QueryType::Connect,
        QueryType::Query,
        QueryType::Insert,
        QueryType::Update,
        QueryType::Delete,
        QueryType::Select,
        QueryType::Transaction,
    ];

    /// Bit used for this type in a [`QueryTypeSet`].
    pub const fn bit(self) -> u8 {
        match self {
            QueryType::Connect => 1,
            QueryType::Query => 2,
            QueryType::Insert => 4,
            QueryType::Update => 8,
            QueryType::Delete => 16,
            QueryType::Select => 32,
            QueryType::Transaction => 64,
        }
    }

    /// Infer the type from the first six non-blank characters of `sql`.
    pub fn infer(sql: &str) -> Self {
        let head: String = sql
            .trim_start()
            .chars()
            .take(6)
            .collect::<String>()
            .to_ascii_lowercase();
        match head.as_str() {
            "insert" => QueryType::Insert,
            "update" => QueryType::Update,
            "delete" => QueryType::Delete,
            "select" => QueryType::Select,
            _ => QueryType::Query,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            QueryType::Connect => "CONNECT",
            QueryType::Query => "QUERY",
            QueryType::Insert => "INSERT",
            QueryType::Update => "UPDATE",
            QueryType::Delete => "DELETE",
            QueryType::Select => "SELECT",
            QueryType::Transaction => "TRANSACTION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bitmask of query types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryTypeSet(u8);

impl QueryTypeSet {
    pub const EMPTY: QueryTypeSet = QueryTypeSet(0);

    pub const fn from_bits(bits: u8) -> Self {
        QueryTypeSet(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, ty: QueryType) -> bool {
        self.0 & ty.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parse a `|` or `,` separated list such as `"select|insert"`.
    pub fn parse(s: &str) -> Option<Self> {
        s.split(['|', ','])
            .filter(|part| !part.trim().is_empty())
            .try_fold(QueryTypeSet::EMPTY, |set, part| {
                QueryType::parse(part).map(|t| set | t)
            })
    }
}

impl From<QueryType> for QueryTypeSet {
    fn from(ty: QueryType) -> Self {
        QueryTypeSet(ty.bit())
    }
}

impl BitOr for QueryType {
    type Output = QueryTypeSet;

    fn bitor(self, rhs: QueryType) -> QueryTypeSet {
        QueryTypeSet(self.bit() | rhs.bit())
    }
}

impl BitOr<QueryType> for QueryTypeSet {
    type Output = QueryTypeSet;

    fn bitor(self, rhs: QueryType) -> QueryTypeSet {
        QueryTypeSet(self.0 | rhs.bit())
    }
}

impl BitOr for QueryTypeSet {
    type Output = QueryTypeSet;

    fn bitor(self, rhs: QueryTypeSet) -> QueryTypeSet {
        QueryTypeSet(self.0 | rhs.0)
    }
}

/// Timed record of one execution.
///
/// Parameters are fixed when the profile is created; the start instant is
/// stamped at creation and the end instant at most once.
#[derive(Debug, Clone)]
pub struct QueryProfile {
    text: String,
    query_type: QueryType,
    params: Vec<(BindTarget, Value)>,
    started_at: Instant,
    ended_at: Option<Instant>,
}

impl QueryProfile {
    pub(crate) fn start(
        text: impl Into<String>,
        query_type: QueryType,
        params: Vec<(BindTarget, Value)>,
    ) -> Self {
        Self {
            text: text.into(),
            query_type,
            params,
            started_at: Instant::now(),
            ended_at: None,
        }
    }

    /// Fresh copy for another execution of the same statement.
    pub(crate) fn restart(&self, params: Vec<(BindTarget, Value)>) -> Self {
        Self::start(self.text.clone(), self.query_type, params)
    }

    /// Stamp the end time. Returns `false` if it was already stamped.
    pub(crate) fn end(&mut self) -> bool {
        if self.ended_at.is_some() {
            return false;
        }
        self.ended_at = Some(Instant::now());
        true
    }

    pub fn query(&self) -> &str {
        &self.text
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// Parameters bound for this execution, in placeholder order.
    pub fn params(&self) -> &[(BindTarget, Value)] {
        &self.params
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<Instant> {
        self.ended_at
    }

    pub fn has_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Elapsed time, only once the profile has ended.
    pub fn elapsed(&self) -> Option<Duration> {
        self.ended_at
            .map(|end| end.saturating_duration_since(self.started_at))
    }

    pub fn elapsed_secs(&self) -> Option<f64> {
        self.elapsed().map(|d| d.as_secs_f64())
    }
}
