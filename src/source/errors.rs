//! Data source errors
//!
//! Sources report failures in their own terms; the executor maps them onto
//! `QueryError` so callers see one error type.

use thiserror::Error;

use crate::errors::{Clause, QueryError};

/// Result type for data source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors raised by a data source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The source is closed, unreachable or refused access
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The requested table does not exist
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// An expression referenced a column the table lacks
    #[error("unknown field '{field}'")]
    UnknownField {
        field: String,
        /// Raw predicate naming the field, when there is one
        expression: Option<String>,
    },

    /// A raw predicate could not be parsed
    #[error("cannot parse `{expression}`: {diagnostic}")]
    Syntax {
        expression: String,
        diagnostic: String,
    },
}

impl SourceError {
    pub fn syntax(expression: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        SourceError::Syntax {
            expression: expression.into(),
            diagnostic: diagnostic.into(),
        }
    }
}

impl From<SourceError> for QueryError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unavailable(reason) => QueryError::ConnectionError(reason),
            SourceError::UnknownTable(table) => {
                QueryError::ConnectionError(format!("unknown table '{}'", table))
            }
            SourceError::UnknownField {
                field,
                expression: Some(expression),
            } => QueryError::UnknownField {
                field,
                clause: Clause::Predicate(expression),
            },
            SourceError::UnknownField {
                field,
                expression: None,
            } => QueryError::UnknownField {
                field,
                clause: Clause::Filter,
            },
            SourceError::Syntax {
                expression,
                diagnostic,
            } => QueryError::PredicateSyntax {
                expression,
                diagnostic,
            },
        }
    }
}
