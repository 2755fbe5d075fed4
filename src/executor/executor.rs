//! Query executor
//!
//! Drives a data source through a compiled plan. Stage order is fixed:
//!
//! 1. Fetch columns; an unreachable source fails here, before any row
//! 2. Check every field the plan names against the columns
//! 3. Filter (always pushed to the source)
//! 4. Sample, when the plan has a directive
//! 5. Sort
//! 6. Project; the primary key is always kept
//! 7. Paginate (offset, then limit)
//!
//! Without a sample directive, sort and projection are pushed to the
//! source as well and rows stream lazily. With one, the filtered candidates
//! are materialized so the sampler sees all of them.

use crate::errors::{QueryError, QueryResult};
use crate::observability::{log_event_with_fields, Event, ObservationScope, Timer};
use crate::planner::{ExplainPlan, QueryBuilder, QueryPlan};
use crate::record::{Record, Scalar};
use crate::sample::SamplePlanner;
use crate::schema::SourceRef;
use crate::source::{ColumnInfo, DataSource, RowIter, SourceResult};

use super::result::QueryOutput;
use super::sorter::ResultSorter;
use super::stream::RowStream;

/// Executes plans against one data source
pub struct QueryExecutor<'a, S: DataSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: DataSource + ?Sized> QueryExecutor<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Executes a plan, returning a lazy row stream.
    ///
    /// Validation and source errors detected before the first row are
    /// returned here; errors raised while streaming arrive as items.
    pub fn execute(&self, plan: &QueryPlan) -> QueryResult<RowStream<'a>> {
        let timer = Timer::new();
        let predicate = plan.predicate().to_string();
        let scope = ObservationScope::with_fields(
            "QUERY",
            &[
                ("predicate", predicate.as_str()),
                ("sample", plan.sample().kind_name()),
                ("table", plan.table()),
            ],
        );

        match self.open(plan) {
            Ok(rows) => Ok(RowStream::new(rows, plan.offset(), plan.limit(), scope, timer)),
            Err(err) => {
                let elapsed = timer.elapsed_ms();
                scope.fail_with_fields(
                    &err.to_string(),
                    &[("code", err.code()), ("elapsed_ms", elapsed.as_str())],
                );
                Err(err)
            }
        }
    }

    /// Executes a plan and collects every row
    pub fn collect(&self, plan: &QueryPlan) -> QueryResult<Vec<Record>> {
        self.execute(plan)?.collect()
    }

    /// Counts rows matching the plan's filters.
    ///
    /// Sampling, sort and pagination do not affect the count. A filter
    /// that matches nothing counts zero.
    pub fn count(&self, plan: &QueryPlan) -> QueryResult<u64> {
        let timer = Timer::new();
        let scope = ObservationScope::with_fields("COUNT", &[("table", plan.table())]);

        let result = self
            .validate(plan)
            .and_then(|_| Ok(self.source.scan_count(plan.table(), plan.predicate())?));

        let elapsed = timer.elapsed_ms();
        match result {
            Ok(count) => {
                let rows = count.to_string();
                scope.complete_with_fields(&[
                    ("elapsed_ms", elapsed.as_str()),
                    ("rows_matched", rows.as_str()),
                ]);
                Ok(count)
            }
            Err(err) => {
                scope.fail_with_fields(
                    &err.to_string(),
                    &[("code", err.code()), ("elapsed_ms", elapsed.as_str())],
                );
                Err(err)
            }
        }
    }

    /// Returns the first `n` rows of the full pipeline.
    ///
    /// Always a prefix of `collect`. Without a sample directive the rest
    /// is never read.
    pub fn preview(&self, plan: &QueryPlan, n: usize) -> QueryResult<Vec<Record>> {
        let mut stream = self.execute(plan)?;
        let rows = stream.by_ref().take(n).collect::<QueryResult<Vec<_>>>()?;
        stream.finish();
        Ok(rows)
    }

    /// Counts for count-only plans, collects otherwise
    pub fn run(&self, plan: &QueryPlan) -> QueryResult<QueryOutput> {
        if plan.is_count_only() {
            self.count(plan).map(QueryOutput::Count)
        } else {
            self.collect(plan).map(QueryOutput::Rows)
        }
    }

    /// Looks up one record by primary key
    pub fn get(&self, source: &SourceRef, id: impl Into<Scalar>) -> QueryResult<Option<Record>> {
        let plan = QueryBuilder::new(source.clone())
            .filter_value(source.primary_key(), id)
            .limit(1)
            .compile()?;
        Ok(self.collect(&plan)?.into_iter().next())
    }

    /// Explains a plan as this source would run it.
    ///
    /// Runs the checks `execute` runs before its first row, including
    /// parsing raw predicates, without reading any row. A plan the source
    /// would reject explains as rejected.
    pub fn explain(&self, plan: &QueryPlan) -> ExplainPlan {
        let checked = self.validate(plan).and_then(|_| {
            self.source.scan(plan.table(), plan.predicate(), &[], &[])?;
            Ok(())
        });
        match checked {
            Ok(()) => ExplainPlan::from_plan(plan),
            Err(err) => ExplainPlan::from_error(&err),
        }
    }

    /// Checks the plan against the source's columns
    fn validate(&self, plan: &QueryPlan) -> QueryResult<Vec<ColumnInfo>> {
        let columns = self.source.columns(plan.table())?;
        for (field, clause) in plan.referenced_fields() {
            if !columns.iter().any(|c| c.name == field) {
                return Err(QueryError::UnknownField {
                    field: field.to_string(),
                    clause,
                });
            }
        }
        Ok(columns)
    }

    /// Validates the plan and opens its row source, before pagination
    fn open(&self, plan: &QueryPlan) -> QueryResult<RowIter<'a>> {
        let columns = self.validate(plan)?;
        let projection = Self::projection(plan, &columns);

        if plan.is_count_only() {
            return Ok(Box::new(std::iter::empty::<SourceResult<Record>>()));
        }

        let source: &'a S = self.source;

        if plan.sample().is_none() {
            let rows = source.scan(plan.table(), plan.predicate(), plan.sort(), &projection)?;
            return Ok(rows);
        }

        let candidates = source
            .scan(plan.table(), plan.predicate(), &[], &[])?
            .collect::<Result<Vec<_>, _>>()?;
        let candidate_count = candidates.len();

        let mut selected = SamplePlanner::new(plan.primary_key()).select(candidates, plan.sample());

        let candidates = candidate_count.to_string();
        let sampled = selected.len().to_string();
        let spec = plan.sample().to_string();
        log_event_with_fields(
            Event::SampleApplied,
            &[
                ("candidates", candidates.as_str()),
                ("sample", spec.as_str()),
                ("selected", sampled.as_str()),
            ],
        );

        ResultSorter::sort(&mut selected, plan.sort());
        Ok(Box::new(
            selected
                .into_iter()
                .map(move |record| -> SourceResult<Record> { Ok(record.project(&projection)) }),
        ))
    }

    /// Requested columns plus the primary key, when the table has one
    fn projection(plan: &QueryPlan, columns: &[ColumnInfo]) -> Vec<String> {
        let requested = plan.projection();
        if requested.is_empty() {
            return Vec::new();
        }

        let pk = plan.primary_key();
        let has_pk = columns.iter().any(|c| c.name == pk);
        let mut out = Vec::with_capacity(requested.len() + 1);
        if has_pk && !requested.iter().any(|f| f == pk) {
            out.push(pk.to_string());
        }
        out.extend(requested.iter().cloned());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Clause;
    use crate::filter::Predicate;
    use crate::planner::{SortDirection, SortKey};
    use crate::source::{MemorySource, SourceError};
    use std::cell::Cell;

    fn semif_rows() -> Vec<Record> {
        let species = ["barley", "wheat", "wheat", "rye", "barley", "wheat"];
        species
            .iter()
            .enumerate()
            .map(|(i, s)| {
                Record::new()
                    .with("cutout_id", format!("c{:02}", i))
                    .with("species", *s)
                    .with("area", (i as i64 + 1) * 10)
                    .with("state", if i % 2 == 0 { "NC" } else { "TX" })
            })
            .collect()
    }

    fn source() -> MemorySource {
        MemorySource::new("semif", semif_rows())
    }

    fn ids(rows: &[Record]) -> Vec<&str> {
        rows.iter()
            .map(|r| r.get("cutout_id").and_then(Scalar::as_str).unwrap())
            .collect()
    }

    /// Counts rows handed out so tests can prove laziness
    struct CountingSource {
        inner: MemorySource,
        pulled: Cell<u64>,
    }

    impl DataSource for CountingSource {
        fn columns(&self, table: &str) -> SourceResult<Vec<ColumnInfo>> {
            self.inner.columns(table)
        }

        fn scan<'a>(
            &'a self,
            table: &str,
            predicate: &Predicate,
            sort: &[SortKey],
            projection: &[String],
        ) -> SourceResult<RowIter<'a>> {
            let rows = self.inner.scan(table, predicate, sort, projection)?;
            Ok(Box::new(rows.inspect(move |_| self.pulled.set(self.pulled.get() + 1))))
        }

        fn scan_count(&self, table: &str, predicate: &Predicate) -> SourceResult<u64> {
            self.inner.scan_count(table, predicate)
        }
    }

    /// A source that is never reachable
    struct DownSource;

    impl DataSource for DownSource {
        fn columns(&self, _: &str) -> SourceResult<Vec<ColumnInfo>> {
            Err(SourceError::Unavailable("connection refused".into()))
        }

        fn scan<'a>(&'a self, _: &str, _: &Predicate, _: &[SortKey], _: &[String]) -> SourceResult<RowIter<'a>> {
            panic!("scan must not be reached")
        }

        fn scan_count(&self, _: &str, _: &Predicate) -> SourceResult<u64> {
            panic!("scan_count must not be reached")
        }
    }

    #[test]
    fn test_filter_sort_limit() {
        let source = source();
        let plan = QueryBuilder::semif()
            .filter_eq("species", ["wheat"])
            .sort_by("area", SortDirection::Desc)
            .limit(2)
            .compile()
            .unwrap();

        let rows = QueryExecutor::new(&source).collect(&plan).unwrap();
        assert_eq!(ids(&rows), vec!["c05", "c02"]);
    }

    #[test]
    fn test_offset_then_limit() {
        let source = source();
        let plan = QueryBuilder::semif().offset(2).limit(3).compile().unwrap();
        let rows = QueryExecutor::new(&source).collect(&plan).unwrap();
        assert_eq!(ids(&rows), vec!["c02", "c03", "c04"]);
    }

    #[test]
    fn test_projection_keeps_primary_key() {
        let source = source();
        let plan = QueryBuilder::semif().select(["area"]).limit(1).compile().unwrap();
        let rows = QueryExecutor::new(&source).collect(&plan).unwrap();
        let names: Vec<&str> = rows[0].field_names().collect();
        assert_eq!(names, vec!["cutout_id", "area"]);
    }

    #[test]
    fn test_sampled_rows_are_projected_after_sampling() {
        let source = source();
        let plan = QueryBuilder::semif()
            .select(["species"])
            .sample_seeded(3, 42)
            .compile()
            .unwrap();
        let rows = QueryExecutor::new(&source).collect(&plan).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 2 && r.contains("cutout_id")));
    }

    #[test]
    fn test_sample_sorted_after_selection() {
        let source = source();
        let plan = QueryBuilder::semif()
            .sample_seeded(4, 7)
            .sort_by("area", SortDirection::Asc)
            .compile()
            .unwrap();
        let rows = QueryExecutor::new(&source).collect(&plan).unwrap();
        let areas: Vec<Scalar> = rows.iter().map(|r| r.value_or_null("area")).collect();
        let mut sorted = areas.clone();
        sorted.sort();
        assert_eq!(areas, sorted);
    }

    #[test]
    fn test_count_ignores_sample_and_limit() {
        let source = source();
        let plan = QueryBuilder::semif()
            .filter_eq("state", ["NC"])
            .sample_seeded(1, 3)
            .limit(1)
            .compile()
            .unwrap();
        assert_eq!(QueryExecutor::new(&source).count(&plan).unwrap(), 3);
    }

    #[test]
    fn test_run_limit_zero_counts() {
        let source = source();
        let plan = QueryBuilder::semif()
            .filter_eq("species", ["wheat"])
            .limit(0)
            .compile()
            .unwrap();
        let executor = QueryExecutor::new(&source);
        assert_eq!(executor.run(&plan).unwrap(), QueryOutput::Count(3));
        assert!(executor.collect(&plan).unwrap().is_empty());
    }

    #[test]
    fn test_preview_is_prefix_and_lazy() {
        let source = CountingSource {
            inner: source(),
            pulled: Cell::new(0),
        };
        let plan = QueryBuilder::semif().compile().unwrap();
        let executor = QueryExecutor::new(&source);

        let preview = executor.preview(&plan, 2).unwrap();
        assert_eq!(source.pulled.get(), 2);

        let all = executor.collect(&plan).unwrap();
        assert_eq!(preview[..], all[..2]);
    }

    #[test]
    fn test_unknown_field_in_each_clause() {
        let source = source();
        let executor = QueryExecutor::new(&source);
        let cases = [
            (QueryBuilder::semif().filter_eq("colour", ["red"]), Clause::Filter),
            (QueryBuilder::semif().select(["colour"]), Clause::Projection),
            (QueryBuilder::semif().sort_by("colour", SortDirection::Asc), Clause::Sort),
            (QueryBuilder::semif().sample_stratified(["colour"], 1, None), Clause::Stratify),
        ];

        for (builder, expected) in cases {
            let plan = builder.compile().unwrap();
            match executor.execute(&plan) {
                Err(QueryError::UnknownField { field, clause }) => {
                    assert_eq!(field, "colour");
                    assert_eq!(clause, expected);
                }
                other => panic!("expected UnknownField, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_unknown_field_in_raw_predicate() {
        let source = source();
        let plan = QueryBuilder::semif().where_raw("colour == 'red'").compile().unwrap();
        match QueryExecutor::new(&source).collect(&plan) {
            Err(QueryError::UnknownField { field, clause }) => {
                assert_eq!(field, "colour");
                assert_eq!(clause, Clause::Predicate("colour == 'red'".into()));
            }
            other => panic!("expected UnknownField, got {:?}", other),
        }
    }

    #[test]
    fn test_unreachable_source_fails_before_rows() {
        let plan = QueryBuilder::semif().compile().unwrap();
        let executor = QueryExecutor::new(&DownSource);
        assert_eq!(executor.execute(&plan).unwrap_err().code(), "AGIR_SOURCE_UNAVAILABLE");
        assert_eq!(executor.count(&plan).unwrap_err().code(), "AGIR_SOURCE_UNAVAILABLE");
    }

    #[test]
    fn test_get_by_primary_key() {
        let source = source();
        let executor = QueryExecutor::new(&source);
        let record = executor.get(&SourceRef::semif(), "c03").unwrap().unwrap();
        assert_eq!(record.get("species"), Some(&Scalar::from("rye")));
        assert!(executor.get(&SourceRef::semif(), "missing").unwrap().is_none());
    }

    #[test]
    fn test_explain_accepted_plan_reads_no_rows() {
        let source = CountingSource {
            inner: source(),
            pulled: Cell::new(0),
        };
        let plan = QueryBuilder::semif()
            .filter_eq("species", ["wheat"])
            .where_raw("area > 20 and state == 'TX'")
            .sort_by("area", SortDirection::Desc)
            .limit(2)
            .compile()
            .unwrap();

        let explain = QueryExecutor::new(&source).explain(&plan);
        assert!(explain.accepted);
        assert_eq!(explain.predicates.len(), 2);
        assert_eq!(explain.sort, vec!["area DESC".to_string()]);
        assert_eq!(explain.limit, Some(2));
        assert_eq!(source.pulled.get(), 0);
    }

    #[test]
    fn test_explain_rejections() {
        let source = source();
        let executor = QueryExecutor::new(&source);

        let unknown = QueryBuilder::semif().sort_by("colour", SortDirection::Asc).compile().unwrap();
        let explain = executor.explain(&unknown);
        assert!(!explain.accepted);
        assert_eq!(explain.rejection_code.as_deref(), Some("AGIR_QUERY_UNKNOWN_FIELD"));

        let bad_raw = QueryBuilder::semif().where_raw("area > 10 species").compile().unwrap();
        assert_eq!(
            executor.explain(&bad_raw).rejection_code.as_deref(),
            Some("AGIR_QUERY_PREDICATE_SYNTAX")
        );

        let down = QueryExecutor::new(&DownSource).explain(&QueryBuilder::semif().compile().unwrap());
        assert_eq!(down.rejection_code.as_deref(), Some("AGIR_SOURCE_UNAVAILABLE"));
        assert!(format!("{}", down).contains("REJECTED"));
    }
}
