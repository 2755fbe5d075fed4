//! Engine error types
//!
//! Error codes:
//! - AGIR_QUERY_EMPTY_FILTER_VALUES (REJECT)
//! - AGIR_QUERY_UNKNOWN_FIELD (REJECT)
//! - AGIR_QUERY_PREDICATE_SYNTAX (REJECT)
//! - AGIR_QUERY_INVALID_SAMPLE (REJECT)
//! - AGIR_QUERY_INVALID_TOKEN (REJECT)
//! - AGIR_QUERY_INVALID_SPEC (REJECT)
//! - AGIR_CONFIG_INVALID (REJECT)
//! - AGIR_SOURCE_UNAVAILABLE (ERROR)
//! - AGIR_IO_FAILED (ERROR)
//!
//! Nothing here is retried. Every error is surfaced to the caller as soon
//! as it is detected.

use std::fmt;

use thiserror::Error;

/// Severity levels for engine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The request itself is wrong; fix the query
    Reject,
    /// The environment failed; the query may be fine
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// The part of a query that referenced a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Equality filter
    Filter,
    /// Raw predicate, with its original text
    Predicate(String),
    /// Projection list
    Projection,
    /// Sort keys
    Sort,
    /// Stratification fields of a sample directive
    Stratify,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Filter => write!(f, "filter"),
            Clause::Predicate(expr) => write!(f, "predicate `{}`", expr),
            Clause::Projection => write!(f, "projection"),
            Clause::Sort => write!(f, "sort"),
            Clause::Stratify => write!(f, "stratify"),
        }
    }
}

/// Errors raised while building, executing or recording a query
#[derive(Debug, Error)]
pub enum QueryError {
    /// An equality filter was given no values
    #[error("filter on '{field}' has no values")]
    EmptyFilterValues { field: String },

    /// A clause references a column the source does not have
    #[error("unknown field '{field}' in {clause}")]
    UnknownField { field: String, clause: Clause },

    /// The source rejected a raw predicate
    #[error("cannot parse predicate `{expression}`: {diagnostic}")]
    PredicateSyntax {
        expression: String,
        diagnostic: String,
    },

    /// The source is unreachable, closed or refused access
    #[error("data source unavailable: {0}")]
    ConnectionError(String),

    /// Sample directive violates its constraints
    #[error("invalid sample spec: {0}")]
    InvalidSampleSpec(String),

    /// A raw filter/sort/sample token could not be understood
    #[error("invalid token `{token}`: {reason}")]
    InvalidToken { token: String, reason: String },

    /// A QuerySpec document does not decode
    #[error("invalid query spec document: {0}")]
    InvalidSpecDocument(String),

    /// Engine or source configuration is malformed
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading or writing a spec document failed
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl QueryError {
    /// Create an invalid token error
    pub fn invalid_token(token: impl Into<String>, reason: impl Into<String>) -> Self {
        QueryError::InvalidToken {
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::EmptyFilterValues { .. } => "AGIR_QUERY_EMPTY_FILTER_VALUES",
            QueryError::UnknownField { .. } => "AGIR_QUERY_UNKNOWN_FIELD",
            QueryError::PredicateSyntax { .. } => "AGIR_QUERY_PREDICATE_SYNTAX",
            QueryError::ConnectionError(_) => "AGIR_SOURCE_UNAVAILABLE",
            QueryError::InvalidSampleSpec(_) => "AGIR_QUERY_INVALID_SAMPLE",
            QueryError::InvalidToken { .. } => "AGIR_QUERY_INVALID_TOKEN",
            QueryError::InvalidSpecDocument(_) => "AGIR_QUERY_INVALID_SPEC",
            QueryError::InvalidConfig(_) => "AGIR_CONFIG_INVALID",
            QueryError::Io(_) => "AGIR_IO_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            QueryError::ConnectionError(_) | QueryError::Io(_) => Severity::Error,
            _ => Severity::Reject,
        }
    }

    /// Returns the offending field name if applicable
    pub fn field(&self) -> Option<&str> {
        match self {
            QueryError::EmptyFilterValues { field } | QueryError::UnknownField { field, .. } => {
                Some(field)
            }
            _ => None,
        }
    }
}

/// Result type for engine operations
pub type QueryResult<T> = Result<T, QueryError>;
