//! Recording executed plans as QuerySpecs

use crate::observability::{log_event_with_fields, Event};
use crate::planner::QueryPlan;

use super::metadata::ExecutionMetadata;
use super::spec::{FilterSection, QuerySpec, SampleSection, SourceSection};
use super::tokens::RawTokens;

/// Builds QuerySpecs from compiled plans
pub struct QuerySpecRecorder;

impl QuerySpecRecorder {
    /// Records `plan` together with the tokens it was parsed from.
    ///
    /// The structured half comes from the plan alone. `metadata.reproducible`
    /// is overwritten from the plan's sample directive.
    pub fn record(plan: &QueryPlan, raw: RawTokens, metadata: ExecutionMetadata) -> QuerySpec {
        let mut metadata = metadata;
        metadata.reproducible = plan.sample().is_reproducible();

        let filters = FilterSection {
            raw: raw.filters,
            equality: plan
                .filters()
                .equality()
                .iter()
                .map(|(field, values)| (field.clone(), values.iter().cloned().collect()))
                .collect(),
            predicates: plan
                .predicate()
                .raw_expressions()
                .into_iter()
                .map(|raw| raw.as_str().to_string())
                .collect(),
        };

        let source = SourceSection {
            database_kind: plan.source().kind(),
            table: plan.table().to_string(),
        };

        let spec = QuerySpec::new(
            metadata,
            source,
            filters,
            plan.projection().to_vec(),
            plan.sort().to_vec(),
            raw.sort,
            plan.limit(),
            plan.offset(),
            SampleSection::from_spec(plan.sample(), raw.sample),
        );

        let reproducible = spec.metadata().reproducible.to_string();
        log_event_with_fields(
            Event::SpecRecorded,
            &[
                ("reproducible", reproducible.as_str()),
                ("run_id", spec.metadata().run_id.as_str()),
                ("sample", plan.sample().kind_name()),
                ("table", plan.table()),
            ],
        );
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::QueryBuilder;

    #[test]
    fn test_reproducible_follows_sample() {
        let meta = ExecutionMetadata::capture("json");
        let cases = [
            (QueryBuilder::semif(), true),
            (QueryBuilder::semif().sample_seeded(3, 1), true),
            (QueryBuilder::semif().sample_random(3), false),
            (QueryBuilder::semif().sample_stratified(["species"], 2, None), false),
            (QueryBuilder::semif().sample_stratified(["species"], 2, Some(5)), true),
        ];
        for (builder, expected) in cases {
            let plan = builder.compile().unwrap();
            let spec = QuerySpecRecorder::record(&plan, RawTokens::default(), meta.clone());
            assert_eq!(spec.metadata().reproducible, expected, "{}", plan.sample());
        }
    }

    #[test]
    fn test_records_raw_tokens_verbatim() {
        let plan = QueryBuilder::semif().compile().unwrap();
        let tokens = RawTokens::new()
            .with_filter("species=barley,wheat")
            .with_filter("area>=100")
            .with_sample("seeded:n=5");
        let spec = QuerySpecRecorder::record(&plan, tokens, ExecutionMetadata::capture("json"));

        assert_eq!(spec.filters().raw, vec!["species=barley,wheat", "area>=100"]);
        assert_eq!(spec.sample().raw.as_deref(), Some("seeded:n=5"));
        assert_eq!(spec.sort_raw(), None);
    }
}
