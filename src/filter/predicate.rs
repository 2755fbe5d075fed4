//! Compiled predicate trees
//!
//! A compiled predicate is a flat conjunction. Its structure depends only on
//! the set of constraints that produced it, so two predicates compiled from
//! the same constraints compare equal and hash identically.

use std::fmt;

use crate::record::Scalar;

/// Opaque predicate text, evaluated natively by the data source.
///
/// The engine never parses or rewrites it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawPredicate(String);

impl RawPredicate {
    pub fn new(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RawPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A compiled filter predicate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// Every term must hold. An empty conjunction always holds.
    All(Vec<Predicate>),
    /// Field value must equal one of `values` (sorted, distinct)
    In { field: String, values: Vec<Scalar> },
    /// Source-native expression
    Raw(RawPredicate),
}

impl Predicate {
    /// The predicate that accepts every row
    pub fn always() -> Self {
        Predicate::All(Vec::new())
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Predicate::All(terms) if terms.iter().all(Predicate::is_always))
    }

    /// Returns the terms of a conjunction, or this predicate alone
    pub fn terms(&self) -> &[Predicate] {
        match self {
            Predicate::All(terms) => terms,
            other => std::slice::from_ref(other),
        }
    }

    /// Fields constrained by equality terms
    pub fn equality_fields(&self) -> Vec<&str> {
        match self {
            Predicate::All(terms) => terms.iter().flat_map(Predicate::equality_fields).collect(),
            Predicate::In { field, .. } => vec![field.as_str()],
            Predicate::Raw(_) => Vec::new(),
        }
    }

    /// Raw expressions, in compiled order
    pub fn raw_expressions(&self) -> Vec<&RawPredicate> {
        match self {
            Predicate::All(terms) => terms.iter().flat_map(Predicate::raw_expressions).collect(),
            Predicate::In { .. } => Vec::new(),
            Predicate::Raw(raw) => vec![raw],
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::All(terms) if terms.is_empty() => write!(f, "TRUE"),
            Predicate::All(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    write!(f, "{}", term)?;
                }
                Ok(())
            }
            Predicate::In { field, values } if values.len() == 1 => {
                write!(f, "{} = {}", field, values[0])
            }
            Predicate::In { field, values } => {
                write!(f, "{} IN (", field)?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
            Predicate::Raw(raw) => write!(f, "({})", raw),
        }
    }
}
