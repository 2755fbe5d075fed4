//! Result types for query execution

use crate::record::Record;

/// Outcome of `QueryExecutor::run`
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// The plan was count-only (`limit(0)`)
    Count(u64),
    /// Rows in final order
    Rows(Vec<Record>),
}

impl QueryOutput {
    /// Number of matching rows for a count, number of rows otherwise
    pub fn len(&self) -> u64 {
        match self {
            QueryOutput::Count(n) => *n,
            QueryOutput::Rows(rows) => rows.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_count(&self) -> bool {
        matches!(self, QueryOutput::Count(_))
    }

    /// Returns the rows, if this output carries any
    pub fn rows(&self) -> Option<&[Record]> {
        match self {
            QueryOutput::Rows(rows) => Some(rows),
            QueryOutput::Count(_) => None,
        }
    }

    pub fn into_rows(self) -> Vec<Record> {
        match self {
            QueryOutput::Rows(rows) => rows,
            QueryOutput::Count(_) => Vec::new(),
        }
    }
}
