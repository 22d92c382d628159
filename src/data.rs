//! Core data types shared between the store and the HTTP server.

use indexmap::IndexMap;
use serde::Serialize;

/// One cell of the dataset.
///
/// Dimension columns hold `Text`, measure columns hold `Count`. Serializes
/// untagged, so a cell is a bare string or integer on the wire. `Eq` and
/// `Hash` let a tuple of group values key a partition map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Count(i64),
}

impl Value {
    /// Whether this cell equals a filter value in its textual form.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Value::Text(s) => s == text,
            Value::Count(n) => n.to_string() == text,
        }
    }
}

/// One row, keyed by column name in the dataset's native column order.
pub type Record = IndexMap<String, Value>;

/// A single "field equals value" predicate. A filter list is OR-combined:
/// a record survives filtering when at least one predicate matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub value: String,
}

impl Filter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Result of an aggregation query.
///
/// Exactly one group collapses to the bare record; anything else, including
/// an empty match set, is a list. Callers depend on the distinction, so it
/// stays a tagged enum in-process and only flattens at the serde boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Summary {
    One(Record),
    Many(Vec<Record>),
}
