//! Fluent query builder
//!
//! Builders are values: each call consumes the builder and returns the next
//! one, and `Clone` branches a partial query. Filters, projection, sort,
//! pagination and sampling are tracked independently; `compile()` decides
//! execution order, so filtering after `sample()` still narrows the rows the
//! sampler sees.

use crate::errors::{QueryError, QueryResult};
use crate::filter::FilterSet;
use crate::record::Scalar;
use crate::sample::SampleSpec;
use crate::schema::SourceRef;

use super::ast::{SortDirection, SortKey};
use super::plan::QueryPlan;

/// Accumulates a query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    source: SourceRef,
    filters: FilterSet,
    /// First field given an empty value set; reported by `compile()`
    empty_filter: Option<String>,
    projection: Vec<String>,
    sort: Vec<SortKey>,
    limit: Option<u64>,
    offset: Option<u64>,
    sample: SampleSpec,
}

impl QueryBuilder {
    /// Starts an unfiltered query over `source`
    pub fn new(source: SourceRef) -> Self {
        Self {
            source,
            filters: FilterSet::new(),
            empty_filter: None,
            projection: Vec::new(),
            sort: Vec::new(),
            limit: None,
            offset: None,
            sample: SampleSpec::None,
        }
    }

    /// Starts a query over the default SemiF table
    pub fn semif() -> Self {
        Self::new(SourceRef::semif())
    }

    /// Starts a query over the default Field table
    pub fn field() -> Self {
        Self::new(SourceRef::field())
    }

    pub(super) fn from_plan_parts(
        source: SourceRef,
        filters: FilterSet,
        sample: SampleSpec,
        sort: Vec<SortKey>,
        projection: Vec<String>,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Self {
        Self {
            source,
            filters,
            empty_filter: None,
            projection,
            sort,
            limit,
            offset,
            sample,
        }
    }

    /// Restricts `field` to `values`.
    ///
    /// An empty value set is reported as `EmptyFilterValues` by `compile()`.
    pub fn filter_eq<V: Into<Scalar>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let field = field.into();
        match self.filters.clone().add_equality(field.clone(), values) {
            Ok(filters) => self.filters = filters,
            Err(_) => {
                self.empty_filter.get_or_insert(field);
            }
        }
        self
    }

    /// Like `filter_eq`, but fails immediately on an empty value set
    pub fn try_filter_eq<V: Into<Scalar>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> QueryResult<Self> {
        self.filters = self.filters.add_equality(field, values)?;
        Ok(self)
    }

    /// Restricts `field` to a single value
    pub fn filter_value(self, field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.filter_eq(field, [value.into()])
    }

    /// Adds a raw predicate, passed to the source uninterpreted
    pub fn where_raw(mut self, expression: impl Into<String>) -> Self {
        self.filters = self.filters.add_raw(expression);
        self
    }

    /// Appends columns to the projection; repeats are ignored
    pub fn select<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        for field in fields {
            let field = field.into();
            if !self.projection.contains(&field) {
                self.projection.push(field);
            }
        }
        self
    }

    /// Appends a sort key
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(SortKey::new(field, direction));
        self
    }

    /// Caps the number of rows returned; `0` requests a count
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Skips the first `n` rows of the final ordering
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Sets the sampling directive, replacing any previous one
    pub fn sample(mut self, spec: SampleSpec) -> Self {
        self.sample = spec;
        self
    }

    pub fn sample_random(self, n: u64) -> Self {
        self.sample(SampleSpec::random(n))
    }

    pub fn sample_seeded(self, n: u64, seed: i64) -> Self {
        self.sample(SampleSpec::seeded(n, seed))
    }

    /// Sets a stratified directive; an empty `by` fails at `compile()`
    pub fn sample_stratified<S: Into<String>>(
        self,
        by: impl IntoIterator<Item = S>,
        per_group: u64,
        seed: Option<i64>,
    ) -> Self {
        self.sample(SampleSpec::Stratified {
            by: by.into_iter().map(Into::into).collect(),
            per_group,
            seed,
        })
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// Compiles into an immutable plan.
    ///
    /// The builder is left untouched and can keep being extended.
    pub fn compile(&self) -> QueryResult<QueryPlan> {
        if let Some(field) = &self.empty_filter {
            return Err(QueryError::EmptyFilterValues {
                field: field.clone(),
            });
        }
        self.sample.validate()?;

        Ok(QueryPlan::new(
            self.source.clone(),
            self.filters.clone(),
            self.sample.clone(),
            self.sort.clone(),
            self.projection.clone(),
            self.limit,
            self.offset,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_after_sample_still_filters() {
        let plan = QueryBuilder::semif()
            .sample_seeded(5, 42)
            .filter_eq("species", ["barley"])
            .compile()
            .unwrap();

        assert_eq!(plan.sample(), &SampleSpec::seeded(5, 42));
        assert_eq!(plan.predicate().equality_fields(), vec!["species"]);
    }

    #[test]
    fn test_empty_filter_surfaces_at_compile() {
        let builder = QueryBuilder::semif()
            .filter_eq("species", Vec::<&str>::new())
            .limit(3);
        match builder.compile() {
            Err(QueryError::EmptyFilterValues { field }) => assert_eq!(field, "species"),
            other => panic!("expected EmptyFilterValues, got {:?}", other),
        }
    }

    #[test]
    fn test_try_filter_eq_fails_fast() {
        let err = QueryBuilder::semif()
            .try_filter_eq("species", Vec::<String>::new())
            .unwrap_err();
        assert_eq!(err.code(), "AGIR_QUERY_EMPTY_FILTER_VALUES");
    }

    #[test]
    fn test_branching_does_not_alias() {
        let base = QueryBuilder::semif().filter_eq("state", ["NC"]);
        let seeded = base.clone().sample_seeded(10, 1);
        let stratified = base.clone().sample_stratified(["species"], 2, None);

        let base_plan = base.compile().unwrap();
        let seeded_plan = seeded.compile().unwrap();
        let stratified_plan = stratified.compile().unwrap();

        assert!(base_plan.sample().is_none());
        assert_eq!(seeded_plan.sample().kind_name(), "seeded");
        assert_eq!(stratified_plan.sample().kind_name(), "stratified");
        assert_eq!(base_plan.predicate(), seeded_plan.predicate());
    }

    #[test]
    fn test_compile_leaves_builder_reusable() {
        let builder = QueryBuilder::field().filter_eq("state", ["NC"]);
        let first = builder.compile().unwrap();
        let second = builder.clone().where_raw("height > 3").compile().unwrap();

        assert_eq!(first.filters().raw().count(), 0);
        assert_eq!(second.filters().raw().count(), 1);
        assert_eq!(first.primary_key(), "id");
    }

    #[test]
    fn test_invalid_stratified_rejected_at_compile() {
        let err = QueryBuilder::semif()
            .sample_stratified(Vec::<String>::new(), 3, None)
            .compile()
            .unwrap_err();
        assert_eq!(err.code(), "AGIR_QUERY_INVALID_SAMPLE");
    }

    #[test]
    fn test_select_ignores_repeats() {
        let plan = QueryBuilder::semif()
            .select(["species", "area"])
            .select(["area", "cutout_id"])
            .compile()
            .unwrap();
        assert_eq!(plan.projection(), &["species", "area", "cutout_id"]);
    }

    #[test]
    fn test_limit_zero_is_count_only() {
        let plan = QueryBuilder::semif().limit(0).compile().unwrap();
        assert!(plan.is_count_only());
        let plan = QueryBuilder::semif().limit(1).compile().unwrap();
        assert!(!plan.is_count_only());
    }

    #[test]
    fn test_plan_to_builder_round_trip() {
        let plan = QueryBuilder::semif()
            .filter_eq("species", ["wheat", "barley"])
            .where_raw("area > 10")
            .sort_by("area", SortDirection::Desc)
            .select(["cutout_id", "area"])
            .limit(5)
            .offset(2)
            .sample_seeded(20, 9)
            .compile()
            .unwrap();

        assert_eq!(plan.to_builder().compile().unwrap(), plan);
    }

    #[test]
    fn test_referenced_fields() {
        let plan = QueryBuilder::semif()
            .filter_eq("state", ["NC"])
            .select(["area"])
            .sort_by("datetime", SortDirection::Asc)
            .sample_stratified(["species"], 1, Some(3))
            .compile()
            .unwrap();

        let fields: Vec<&str> = plan.referenced_fields().into_iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec!["state", "area", "datetime", "species"]);
    }
}
