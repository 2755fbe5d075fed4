//! Data sources
//!
//! The engine reads through the `DataSource` trait and never touches a
//! store directly. A source value is the scoped connection: it is acquired
//! when constructed and released when dropped.
//!
//! # Contract
//!
//! - `columns` lists the table's fields with a coarse type tag
//! - `scan` yields rows matching the predicate, ordered by the sort keys
//!   (natural order when there are none), restricted to the projection
//!   (all fields when empty)
//! - `scan_count` counts rows matching the predicate
//! - Raw predicates are evaluated natively; unknown columns in them are
//!   reported as `UnknownField` with the expression attached

mod dsl;
mod errors;
mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::filter::Predicate;
use crate::planner::SortKey;
use crate::record::{Record, Scalar};

pub use dsl::Condition;
pub use errors::{SourceError, SourceResult};
pub use memory::MemorySource;

/// Row iterator returned by `DataSource::scan`
pub type RowIter<'a> = Box<dyn Iterator<Item = SourceResult<Record>> + 'a>;

/// Coarse column type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Boolean,
    /// Only nulls seen, or mixed kinds
    Unknown,
}

impl ColumnKind {
    /// Kind implied by one value; null gives `Unknown`
    pub fn of(value: &Scalar) -> Self {
        match value {
            Scalar::Null => ColumnKind::Unknown,
            Scalar::Bool(_) => ColumnKind::Boolean,
            Scalar::Int(_) => ColumnKind::Integer,
            Scalar::Float(_) => ColumnKind::Float,
            Scalar::String(_) => ColumnKind::Text,
        }
    }

    /// Combines the kind seen so far with the kind of another value
    pub fn widen(self, other: ColumnKind) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnKind::Unknown, b) => b,
            (a, ColumnKind::Unknown) => a,
            (ColumnKind::Integer, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Integer) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Read-only tabular store the engine executes against
pub trait DataSource {
    /// Lists the columns of `table`, in table order
    fn columns(&self, table: &str) -> SourceResult<Vec<ColumnInfo>>;

    /// Streams rows of `table` matching `predicate`
    fn scan<'a>(
        &'a self,
        table: &str,
        predicate: &Predicate,
        sort: &[SortKey],
        projection: &[String],
    ) -> SourceResult<RowIter<'a>>;

    /// Counts rows of `table` matching `predicate`
    fn scan_count(&self, table: &str, predicate: &Predicate) -> SourceResult<u64>;
}
