//! Filter accumulation and compilation
//!
//! A FilterSet is the conjunction of equality filters (one per field) and
//! raw predicates. Accumulation order never matters: the set is stored
//! sorted and compiles to the same predicate for the same constraints.

use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{QueryError, QueryResult};
use crate::record::Scalar;

use super::predicate::{Predicate, RawPredicate};

/// Conjunctive set of filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    equality: BTreeMap<String, BTreeSet<Scalar>>,
    raw: BTreeSet<RawPredicate>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality filter.
    ///
    /// Filtering a field that is already filtered merges the value sets, so
    /// each field keeps exactly one filter. An empty value set is rejected.
    pub fn add_equality<V: Into<Scalar>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> QueryResult<Self> {
        let field = field.into();
        let values: BTreeSet<Scalar> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(QueryError::EmptyFilterValues { field });
        }
        self.equality.entry(field).or_default().extend(values);
        Ok(self)
    }

    /// Adds a raw predicate; repeated expressions collapse into one
    pub fn add_raw(mut self, expression: impl Into<String>) -> Self {
        self.raw.insert(RawPredicate::new(expression));
        self
    }

    /// Compiles to a conjunction: equality terms by field name, then raw
    /// terms in lexical order.
    pub fn compile(&self) -> Predicate {
        let equality = self.equality.iter().map(|(field, values)| Predicate::In {
            field: field.clone(),
            values: values.iter().cloned().collect(),
        });
        let raw = self.raw.iter().cloned().map(Predicate::Raw);
        Predicate::All(equality.chain(raw).collect())
    }

    /// Equality filters keyed by field, values in ascending order
    pub fn equality(&self) -> &BTreeMap<String, BTreeSet<Scalar>> {
        &self.equality
    }

    pub fn raw(&self) -> impl Iterator<Item = &RawPredicate> {
        self.raw.iter()
    }

    /// Fields named by equality filters
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.equality.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.equality.is_empty() && self.raw.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_rejected() {
        let result = FilterSet::new().add_equality("species", Vec::<&str>::new());
        match result {
            Err(QueryError::EmptyFilterValues { field }) => assert_eq!(field, "species"),
            other => panic!("expected EmptyFilterValues, got {:?}", other),
        }
    }

    #[test]
    fn test_same_field_merges() {
        let set = FilterSet::new()
            .add_equality("species", ["barley"])
            .unwrap()
            .add_equality("species", ["wheat", "barley"])
            .unwrap();

        assert_eq!(set.equality().len(), 1);
        let values: Vec<&Scalar> = set.equality()["species"].iter().collect();
        assert_eq!(values, vec![&Scalar::from("barley"), &Scalar::from("wheat")]);
    }

    #[test]
    fn test_compile_order_independent() {
        let a = FilterSet::new()
            .add_equality("state", ["NC"])
            .unwrap()
            .add_raw("area > 10")
            .add_equality("species", ["wheat", "barley"])
            .unwrap()
            .add_raw("height is not null");

        let b = FilterSet::new()
            .add_raw("height is not null")
            .add_equality("species", ["barley"])
            .unwrap()
            .add_raw("area > 10")
            .add_equality("species", ["wheat"])
            .unwrap()
            .add_equality("state", ["NC"])
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(a.compile(), b.compile());
        assert_eq!(a.compile().to_string(), b.compile().to_string());
    }

    #[test]
    fn test_empty_set_compiles_to_always() {
        let set = FilterSet::new();
        assert!(set.is_empty());
        assert!(set.compile().is_always());
    }

    #[test]
    fn test_equality_before_raw() {
        let pred = FilterSet::new()
            .add_raw("a > 1")
            .add_equality("z", [1])
            .unwrap()
            .compile();
        assert!(matches!(pred.terms()[0], Predicate::In { .. }));
        assert!(matches!(pred.terms()[1], Predicate::Raw(_)));
    }
}
