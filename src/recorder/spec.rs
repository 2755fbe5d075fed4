//! The QuerySpec document
//!
//! A QuerySpec is the replayable record of one executed query. It has two
//! halves:
//!
//! - the structured half (source, filters, projection, sort, pagination,
//!   sample) which alone rebuilds the query
//! - the audit half (metadata and the raw tokens the caller typed) which is
//!   never consulted when rebuilding
//!
//! The canonical form is JSON with object keys in sorted order. Two specs
//! are equivalent exactly when their canonical strings are byte-identical.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{QueryError, QueryResult};
use crate::observability::{log_event_with_fields, Event};
use crate::planner::{QueryBuilder, SortKey};
use crate::record::Scalar;
use crate::sample::SampleSpec;
use crate::schema::{DatabaseKind, SourceRef};

use super::metadata::ExecutionMetadata;

/// Database identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSection {
    pub database_kind: DatabaseKind,
    pub table: String,
}

/// Filters, raw and structured
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterSection {
    /// Filter tokens exactly as given; audit only
    #[serde(default)]
    pub raw: Vec<String>,
    /// Equality filters, values in ascending order
    #[serde(default)]
    pub equality: BTreeMap<String, Vec<Scalar>>,
    /// Raw predicate expressions, in compiled order
    #[serde(default)]
    pub predicates: Vec<String>,
}

/// Sampling directive in document form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSection {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_group: Option<i64>,
    /// Sample token exactly as given; audit only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl SampleSection {
    /// Document form of a directive.
    ///
    /// Compiled plans hold validated counts. A count above
    /// `MAX_SAMPLE_COUNT` is left out, so the document fails to replay
    /// instead of replaying a different draw.
    pub fn from_spec(spec: &SampleSpec, raw: Option<String>) -> Self {
        let signed = |v: u64| i64::try_from(v).ok();
        let mut section = Self {
            kind: spec.kind_name().to_string(),
            n: None,
            seed: None,
            by: None,
            per_group: None,
            raw,
        };
        match spec {
            SampleSpec::None => {}
            SampleSpec::Random { n } => section.n = signed(*n),
            SampleSpec::Seeded { n, seed } => {
                section.n = signed(*n);
                section.seed = Some(*seed);
            }
            SampleSpec::Stratified {
                by,
                per_group,
                seed,
            } => {
                section.by = Some(by.clone());
                section.per_group = signed(*per_group);
                section.seed = *seed;
            }
        }
        section
    }

    /// Decodes the directive, rejecting negative counts and unknown kinds
    pub fn to_spec(&self) -> QueryResult<SampleSpec> {
        SampleSpec::from_parts(&self.kind, self.n, self.seed, self.by.clone(), self.per_group)
    }
}

impl Default for SampleSection {
    fn default() -> Self {
        Self::from_spec(&SampleSpec::None, None)
    }
}

/// Canonical, replayable record of one executed query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    metadata: ExecutionMetadata,
    source: SourceSection,
    #[serde(default)]
    filters: FilterSection,
    #[serde(default)]
    projection: Vec<String>,
    #[serde(default)]
    sort: Vec<SortKey>,
    /// Sort token exactly as given; audit only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sort_raw: Option<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    #[serde(default)]
    sample: SampleSection,
}

impl QuerySpec {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        metadata: ExecutionMetadata,
        source: SourceSection,
        filters: FilterSection,
        projection: Vec<String>,
        sort: Vec<SortKey>,
        sort_raw: Option<String>,
        limit: Option<u64>,
        offset: Option<u64>,
        sample: SampleSection,
    ) -> Self {
        Self {
            metadata,
            source,
            filters,
            projection,
            sort,
            sort_raw,
            limit,
            offset,
            sample,
        }
    }

    pub fn metadata(&self) -> &ExecutionMetadata {
        &self.metadata
    }

    pub fn source(&self) -> &SourceSection {
        &self.source
    }

    pub fn filters(&self) -> &FilterSection {
        &self.filters
    }

    pub fn projection(&self) -> &[String] {
        &self.projection
    }

    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn sort_raw(&self) -> Option<&str> {
        self.sort_raw.as_deref()
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn sample(&self) -> &SampleSection {
        &self.sample
    }

    pub fn source_ref(&self) -> SourceRef {
        SourceRef::with_table(self.source.database_kind, self.source.table.clone())
    }

    /// Canonical JSON value; object keys are sorted.
    ///
    /// # Panics
    ///
    /// Panics if a filter value is a non-finite float. Such a value cannot
    /// be written to JSON, and a spec holding one cannot be replayed.
    pub fn to_canonical_json(&self) -> Value {
        if let Some((field, value)) = self
            .filters
            .equality
            .iter()
            .flat_map(|(f, values)| values.iter().map(move |v| (f, v)))
            .find(|(_, v)| !v.is_canonicalizable())
        {
            panic!(
                "query spec is not canonicalizable: filter on '{}' holds {:?}",
                field, value
            );
        }
        serde_json::to_value(self).expect("query spec serialization cannot fail")
    }

    /// Canonical compact JSON text
    pub fn to_canonical_string(&self) -> String {
        self.to_canonical_json().to_string()
    }

    /// Canonical JSON text, indented
    pub fn to_canonical_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.to_canonical_json())
            .expect("json value serialization cannot fail")
    }

    /// Decodes a canonical document
    pub fn from_canonical_json(value: &Value) -> QueryResult<Self> {
        let spec: QuerySpec = serde_json::from_value(value.clone())
            .map_err(|e| QueryError::InvalidSpecDocument(e.to_string()))?;
        spec.sample.to_spec()?;
        Ok(spec)
    }

    /// Decodes canonical JSON text
    pub fn from_canonical_str(text: &str) -> QueryResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| QueryError::InvalidSpecDocument(e.to_string()))?;
        Self::from_canonical_json(&value)
    }

    /// Rebuilds the query from the structured half.
    ///
    /// Raw tokens and metadata are ignored.
    pub fn to_builder(&self) -> QueryResult<QueryBuilder> {
        let mut builder = QueryBuilder::new(self.source_ref());

        for (field, values) in &self.filters.equality {
            builder = builder.try_filter_eq(field.clone(), values.iter().cloned())?;
        }
        for expression in &self.filters.predicates {
            builder = builder.where_raw(expression.clone());
        }

        builder = builder.select(self.projection.iter().cloned());
        for key in &self.sort {
            builder = builder.sort_by(key.field.clone(), key.direction);
        }
        if let Some(limit) = self.limit {
            builder = builder.limit(limit);
        }
        if let Some(offset) = self.offset {
            builder = builder.offset(offset);
        }

        Ok(builder.sample(self.sample.to_spec()?))
    }

    /// True when both canonical strings are byte-identical
    pub fn is_equivalent(&self, other: &QuerySpec) -> bool {
        self.to_canonical_string() == other.to_canonical_string()
    }

    /// Writes the canonical document, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> QueryResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_canonical_pretty())?;

        let shown = path.display().to_string();
        log_event_with_fields(
            Event::SpecSaved,
            &[("path", shown.as_str()), ("run_id", self.metadata.run_id.as_str())],
        );
        Ok(())
    }

    /// Reads a canonical document
    pub fn load(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let spec = Self::from_canonical_str(&fs::read_to_string(path)?)?;

        let shown = path.display().to_string();
        log_event_with_fields(
            Event::SpecLoaded,
            &[("path", shown.as_str()), ("run_id", spec.metadata.run_id.as_str())],
        );
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::SortDirection;
    use crate::recorder::{QuerySpecRecorder, RawTokens};
    use chrono::{TimeZone, Utc};

    fn metadata() -> ExecutionMetadata {
        ExecutionMetadata::capture("json")
            .with_run_id("run-0001")
            .with_timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
            .with_principal("tester")
            .with_host("bench")
    }

    fn spec() -> QuerySpec {
        let plan = QueryBuilder::semif()
            .filter_eq("species", ["wheat", "barley"])
            .filter_eq("year", [2024])
            .where_raw("area > 100")
            .select(["cutout_id", "area"])
            .sort_by("area", SortDirection::Desc)
            .limit(10)
            .sample_seeded(5, 42)
            .compile()
            .unwrap();
        QuerySpecRecorder::record(&plan, RawTokens::default(), metadata())
    }

    #[test]
    fn test_canonical_keys_sorted() {
        let text = spec().to_canonical_string();
        let filters = text.find("\"filters\"").unwrap();
        let limit = text.find("\"limit\"").unwrap();
        let metadata = text.find("\"metadata\"").unwrap();
        let sample = text.find("\"sample\"").unwrap();
        assert!(filters < limit && limit < metadata && metadata < sample);
    }

    #[test]
    fn test_canonical_round_trip() {
        let spec = spec();
        let json = spec.to_canonical_json();
        let back = QuerySpec::from_canonical_json(&json).unwrap();
        assert_eq!(back, spec);
        assert!(back.is_equivalent(&spec));
        assert_eq!(back.to_canonical_string(), spec.to_canonical_string());
    }

    #[test]
    fn test_document_shape() {
        let json = spec().to_canonical_json();
        assert_eq!(json["source"]["database_kind"], "semif");
        assert_eq!(json["source"]["table"], "semif");
        assert_eq!(json["filters"]["equality"]["species"], serde_json::json!(["barley", "wheat"]));
        assert_eq!(json["filters"]["equality"]["year"], serde_json::json!([2024]));
        assert_eq!(json["filters"]["predicates"], serde_json::json!(["area > 100"]));
        assert_eq!(json["sort"], serde_json::json!([{"direction": "desc", "field": "area"}]));
        assert_eq!(json["offset"], Value::Null);
        assert_eq!(json["sample"], serde_json::json!({"kind": "seeded", "n": 5, "seed": 42}));
        assert_eq!(json["metadata"]["reproducible"], true);
    }

    #[test]
    fn test_to_builder_rebuilds_plan() {
        let plan = QueryBuilder::field()
            .filter_eq("state", ["NC", "TX"])
            .where_raw("height is not null")
            .sort_by("datetime", SortDirection::Asc)
            .offset(20)
            .limit(10)
            .sample_stratified(["state"], 3, Some(7))
            .compile()
            .unwrap();
        let spec = QuerySpecRecorder::record(&plan, RawTokens::default(), metadata());
        assert_eq!(spec.to_builder().unwrap().compile().unwrap(), plan);
    }

    #[test]
    fn test_raw_tokens_ignored_by_builder() {
        let plan = QueryBuilder::semif().filter_eq("state", ["NC"]).compile().unwrap();
        let tokens = RawTokens::new()
            .with_filter("state=TX")
            .with_sort("area:desc")
            .with_sample("random:n=3");
        let spec = QuerySpecRecorder::record(&plan, tokens, metadata());

        assert_eq!(spec.filters().raw, vec!["state=TX".to_string()]);
        assert_eq!(spec.sort_raw(), Some("area:desc"));
        assert_eq!(spec.to_builder().unwrap().compile().unwrap(), plan);
    }

    #[test]
    fn test_invalid_documents() {
        let err = QuerySpec::from_canonical_str("{\"source\": 3}").unwrap_err();
        assert_eq!(err.code(), "AGIR_QUERY_INVALID_SPEC");

        let mut json = spec().to_canonical_json();
        json["sample"] = serde_json::json!({"kind": "seeded", "n": -1, "seed": 1});
        let err = QuerySpec::from_canonical_json(&json).unwrap_err();
        assert_eq!(err.code(), "AGIR_QUERY_INVALID_SAMPLE");

        json["sample"] = serde_json::json!({"kind": "reservoir", "n": 1});
        let err = QuerySpec::from_canonical_json(&json).unwrap_err();
        assert_eq!(err.code(), "AGIR_QUERY_INVALID_SAMPLE");
    }

    #[test]
    fn test_oversized_count_never_replays_as_another_draw() {
        let section = SampleSection::from_spec(&SampleSpec::seeded(u64::MAX, 7), None);
        assert_eq!(section.n, None);
        assert_eq!(section.to_spec().unwrap_err().code(), "AGIR_QUERY_INVALID_SAMPLE");

        let largest = SampleSpec::seeded(crate::sample::MAX_SAMPLE_COUNT, 7);
        let section = SampleSection::from_spec(&largest, None);
        assert_eq!(section.n, Some(i64::MAX));
        assert_eq!(section.to_spec().unwrap(), largest);
    }

    #[test]
    #[should_panic(expected = "not canonicalizable")]
    fn test_nan_is_not_canonicalizable() {
        let plan = QueryBuilder::semif()
            .filter_eq("area", [f64::NAN])
            .compile()
            .unwrap();
        QuerySpecRecorder::record(&plan, RawTokens::default(), metadata()).to_canonical_json();
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("query_spec.json");
        let spec = spec();

        spec.save(&path).unwrap();
        let loaded = QuerySpec::load(&path).unwrap();
        assert!(loaded.is_equivalent(&spec));

        let err = QuerySpec::load(dir.path().join("missing.json")).unwrap_err();
        assert_eq!(err.code(), "AGIR_IO_FAILED");
    }
}
