//! Fetch modes and fetched row shapes.

use std::fmt;
use std::sync::Arc;

use dbal_core::{ColumnInfo, Error, FetchModeError, Result, Row, TypeError, Value};

/// Row shape returned by a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Values by column position
    Num,
    /// Values keyed by (case-folded) column name
    #[default]
    Assoc,
    /// Positional values and named values together
    Both,
    /// A [`Row`] with name and index access
    Object,
    /// As `Both`, and copied into slots registered with `bind_column`
    Bound,
    /// One column of each row, by 0-based index
    Column(usize),
}

impl FetchMode {
    pub const ASSOC: i32 = 2;
    pub const NUM: i32 = 3;
    pub const BOTH: i32 = 4;
    pub const OBJ: i32 = 5;
    pub const BOUND: i32 = 6;
    pub const COLUMN: i32 = 7;

    /// Integer code of this mode.
    pub const fn code(self) -> i32 {
        match self {
            FetchMode::Assoc => Self::ASSOC,
            FetchMode::Num => Self::NUM,
            FetchMode::Both => Self::BOTH,
            FetchMode::Object => Self::OBJ,
            FetchMode::Bound => Self::BOUND,
            FetchMode::Column(_) => Self::COLUMN,
        }
    }

    /// Mode for an integer code. `COLUMN` selects the first column.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            Self::ASSOC => Ok(FetchMode::Assoc),
            Self::NUM => Ok(FetchMode::Num),
            Self::BOTH => Ok(FetchMode::Both),
            Self::OBJ => Ok(FetchMode::Object),
            Self::BOUND => Ok(FetchMode::Bound),
            Self::COLUMN => Ok(FetchMode::Column(0)),
            other => Err(FetchModeError {
                mode: other.to_string(),
            }
            .into()),
        }
    }

    /// Parse a mode name such as `assoc` or `num` (case-insensitive).
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "num" => Ok(FetchMode::Num),
            "assoc" => Ok(FetchMode::Assoc),
            "both" => Ok(FetchMode::Both),
            "obj" | "object" => Ok(FetchMode::Object),
            "bound" => Ok(FetchMode::Bound),
            "column" => Ok(FetchMode::Column(0)),
            _ => Err(FetchModeError {
                mode: name.to_string(),
            }
            .into()),
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::Num => f.write_str("NUM"),
            FetchMode::Assoc => f.write_str("ASSOC"),
            FetchMode::Both => f.write_str("BOTH"),
            FetchMode::Object => f.write_str("OBJ"),
            FetchMode::Bound => f.write_str("BOUND"),
            FetchMode::Column(i) => write!(f, "COLUMN({})", i),
        }
    }
}

/// Column values keyed by name, in column order.
///
/// When a result has two columns with the same name, the key keeps the
/// position of its first occurrence and the value of its last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn from_values(columns: &ColumnInfo, values: &[Value]) -> Self {
        let mut entries: Vec<(String, Value)> = Vec::with_capacity(values.len());
        for (name, value) in columns.names().iter().zip(values) {
            match entries.iter().position(|(n, _)| n == name) {
                Some(i) => entries[i].1 = value.clone(),
                None => entries.push((name.clone(), value.clone())),
            }
        }
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn into_pairs(self) -> Vec<(String, Value)> {
        self.entries
    }
}

/// One fetched row, shaped by the active [`FetchMode`].
#[derive(Debug, Clone)]
pub enum Fetched {
    Num(Vec<Value>),
    Assoc(Record),
    Both(Vec<Value>, Record),
    Object(Row),
    Scalar(Value),
}

impl Fetched {
    pub fn as_num(&self) -> Option<&[Value]> {
        match self {
            Fetched::Num(v) | Fetched::Both(v, _) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Fetched::Assoc(r) | Fetched::Both(_, r) => Some(r),
            _ => None,
        }
    }

    pub fn as_row(&self) -> Option<&Row> {
        match self {
            Fetched::Object(row) => Some(row),
            _ => None,
        }
    }

    pub fn into_row(self) -> Option<Row> {
        match self {
            Fetched::Object(row) => Some(row),
            _ => None,
        }
    }

    pub fn into_scalar(self) -> Option<Value> {
        match self {
            Fetched::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Values in column order, whatever the shape.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Fetched::Num(v) | Fetched::Both(v, _) => v,
            Fetched::Assoc(r) => r.into_pairs().into_iter().map(|(_, v)| v).collect(),
            Fetched::Object(row) => row.into_values(),
            Fetched::Scalar(v) => vec![v],
        }
    }
}

/// Shape a native row for `mode`. `Bound` shapes like `Both`.
pub(crate) fn shape(mode: FetchMode, columns: &Arc<ColumnInfo>, values: Vec<Value>) -> Result<Fetched> {
    Ok(match mode {
        FetchMode::Num => Fetched::Num(values),
        FetchMode::Assoc => Fetched::Assoc(Record::from_values(columns, &values)),
        FetchMode::Both | FetchMode::Bound => {
            let record = Record::from_values(columns, &values);
            Fetched::Both(values, record)
        }
        FetchMode::Object => Fetched::Object(Row::with_columns(Arc::clone(columns), values)),
        FetchMode::Column(index) => Fetched::Scalar(take_column(values, index)?),
    })
}

pub(crate) fn take_column(values: Vec<Value>, index: usize) -> Result<Value> {
    let len = values.len();
    values
        .into_iter()
        .nth(index)
        .ok_or_else(|| column_out_of_range(index, len))
}

pub(crate) fn column_out_of_range(index: usize, len: usize) -> Error {
    Error::Type(TypeError {
        expected: "column index",
        actual: format!("index {} out of bounds (row has {} columns)", index, len),
        column: None,
    })
}
