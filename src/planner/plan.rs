//! Compiled query plans
//!
//! A plan is immutable. Execution order is fixed by the plan, not by the
//! order builder calls were made in:
//!
//! filter → sample → sort → project → paginate

use crate::errors::Clause;
use crate::filter::{FilterSet, Predicate};
use crate::sample::SampleSpec;
use crate::schema::SourceRef;

use super::ast::SortKey;
use super::builder::QueryBuilder;

/// Immutable, executable query plan
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    source: SourceRef,
    filters: FilterSet,
    predicate: Predicate,
    sample: SampleSpec,
    sort: Vec<SortKey>,
    projection: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl QueryPlan {
    pub(super) fn new(
        source: SourceRef,
        filters: FilterSet,
        sample: SampleSpec,
        sort: Vec<SortKey>,
        projection: Vec<String>,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Self {
        let predicate = filters.compile();
        Self {
            source,
            filters,
            predicate,
            sample,
            sort,
            projection,
            limit,
            offset,
        }
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    pub fn table(&self) -> &str {
        self.source.table()
    }

    pub fn primary_key(&self) -> &'static str {
        self.source.primary_key()
    }

    /// The uncompiled filters this plan was built from
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// The compiled filter predicate
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn sample(&self) -> &SampleSpec {
        &self.sample
    }

    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    /// Requested columns; empty means all
    pub fn projection(&self) -> &[String] {
        &self.projection
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// True when `limit(0)` turned this plan into a count request
    pub fn is_count_only(&self) -> bool {
        self.limit == Some(0)
    }

    /// Every field the plan names, with the clause naming it.
    ///
    /// Raw predicates are opaque and not included; the source reports
    /// their unknown fields itself.
    pub fn referenced_fields(&self) -> Vec<(&str, Clause)> {
        let filters = self.filters.fields().map(|f| (f, Clause::Filter));
        let projection = self.projection.iter().map(|f| (f.as_str(), Clause::Projection));
        let sort = self.sort.iter().map(|k| (k.field.as_str(), Clause::Sort));
        let stratify = self
            .sample
            .stratify_fields()
            .iter()
            .map(|f| (f.as_str(), Clause::Stratify));
        filters.chain(projection).chain(sort).chain(stratify).collect()
    }

    /// Returns a builder holding this plan's parts, for branching
    pub fn to_builder(&self) -> QueryBuilder {
        QueryBuilder::from_plan_parts(
            self.source.clone(),
            self.filters.clone(),
            self.sample.clone(),
            self.sort.clone(),
            self.projection.clone(),
            self.limit,
            self.offset,
        )
    }
}
