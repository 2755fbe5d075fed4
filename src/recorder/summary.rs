//! Human-readable summaries and replay arguments for QuerySpecs

use std::fmt::Write;

use serde_json::{Map, Value};

use crate::sample::SampleSpec;

use super::spec::QuerySpec;
use super::tokens::RawTokens;

impl QuerySpec {
    /// Multi-line description of the run and its query
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let meta = self.metadata();

        // Writing to a String cannot fail
        let _ = writeln!(out, "Run ID: {}", meta.run_id);
        let _ = writeln!(out, "Timestamp: {}", meta.timestamp.to_rfc3339());
        let _ = writeln!(out, "Database: {}", self.source().database_kind);
        let _ = writeln!(out, "Table: {}", self.source().table);

        let filters = self.filters();
        if !filters.equality.is_empty() || !filters.predicates.is_empty() {
            let _ = writeln!(out, "Filters:");
            for (field, values) in &filters.equality {
                match values.as_slice() {
                    [single] => {
                        let _ = writeln!(out, "  - {} = {}", field, single);
                    }
                    many => {
                        let shown: Vec<String> = many.iter().map(ToString::to_string).collect();
                        let _ = writeln!(out, "  - {} IN [{}]", field, shown.join(", "));
                    }
                }
            }
            for expression in &filters.predicates {
                let _ = writeln!(out, "  - {}", expression);
            }
        }

        if !self.projection().is_empty() {
            let _ = writeln!(out, "Columns: {}", self.projection().join(", "));
        }
        if !self.sort().is_empty() {
            let keys: Vec<String> = self.sort().iter().map(ToString::to_string).collect();
            let _ = writeln!(out, "Sort: {}", keys.join(", "));
        }

        match self.sample().to_spec() {
            Ok(SampleSpec::None) => {}
            Ok(SampleSpec::Random { n }) => {
                let _ = writeln!(out, "Sampling: Random ({} records)", n);
            }
            Ok(SampleSpec::Seeded { n, seed }) => {
                let _ = writeln!(out, "Sampling: Seeded ({} records, seed={})", n, seed);
            }
            Ok(SampleSpec::Stratified { by, per_group, seed }) => {
                let _ = write!(out, "Sampling: Stratified ({} per group by {}", per_group, by.join(", "));
                if let Some(seed) = seed {
                    let _ = write!(out, ", seed={}", seed);
                }
                let _ = writeln!(out, ")");
            }
            Err(e) => {
                let _ = writeln!(out, "Sampling: invalid ({})", e);
            }
        }

        if let Some(limit) = self.limit() {
            let _ = writeln!(out, "Limit: {} records", limit);
        }
        if let Some(offset) = self.offset() {
            let _ = writeln!(out, "Offset: {}", offset);
        }

        let _ = writeln!(out, "Output: {}", meta.output_format.to_uppercase());
        if meta.preview_mode {
            let _ = writeln!(out, "Preview: First {} records", meta.preview_count);
        }
        let _ = write!(
            out,
            "Reproducible: {}",
            if meta.reproducible { "yes" } else { "no" }
        );
        out
    }

    /// Tokens that rebuild the filters, sort and sample of this spec.
    ///
    /// Equality filters become one JSON block; raw predicates travel under
    /// `$raw` so they are never reinterpreted as shorthand.
    pub fn reproduce_tokens(&self) -> RawTokens {
        let mut tokens = RawTokens::new();
        let filters = self.filters();

        if !filters.equality.is_empty() {
            let block: Map<String, Value> = filters
                .equality
                .iter()
                .map(|(field, values)| {
                    let values = values
                        .iter()
                        .map(|v| serde_json::to_value(v).unwrap_or(Value::Null))
                        .collect();
                    (field.clone(), Value::Array(values))
                })
                .collect();
            tokens = tokens.with_filter(Value::Object(block).to_string());
        }
        if !filters.predicates.is_empty() {
            let mut block = Map::new();
            block.insert(
                "$raw".to_string(),
                Value::Array(filters.predicates.iter().cloned().map(Value::String).collect()),
            );
            tokens = tokens.with_filter(Value::Object(block).to_string());
        }

        if !self.sort().is_empty() {
            let keys: Vec<String> = self
                .sort()
                .iter()
                .map(|k| format!("{}:{}", k.field, k.direction))
                .collect();
            tokens = tokens.with_sort(keys.join(","));
        }

        if let Ok(spec) = self.sample().to_spec() {
            if let Some(token) = sample_token(&spec) {
                tokens = tokens.with_sample(token);
            }
        }
        tokens
    }

    /// Command-line style arguments that rerun this query
    pub fn reproduce_args(&self) -> Vec<String> {
        let mut args = vec![
            "--db".to_string(),
            self.source().database_kind.to_string(),
            "--table".to_string(),
            self.source().table.clone(),
        ];

        let tokens = self.reproduce_tokens();
        for filter in tokens.filters {
            args.push("--filters".to_string());
            args.push(filter);
        }
        if !self.projection().is_empty() {
            args.push("--projection".to_string());
            args.push(self.projection().join(","));
        }
        if let Some(sort) = tokens.sort {
            args.push("--sort".to_string());
            args.push(sort);
        }
        if let Some(limit) = self.limit() {
            args.push("--limit".to_string());
            args.push(limit.to_string());
        }
        if let Some(offset) = self.offset() {
            args.push("--offset".to_string());
            args.push(offset.to_string());
        }
        if let Some(sample) = tokens.sample {
            args.push("--sample".to_string());
            args.push(sample);
        }
        args.push("--out".to_string());
        args.push(self.metadata().output_format.clone());
        args
    }
}

fn sample_token(spec: &SampleSpec) -> Option<String> {
    match spec {
        SampleSpec::None => None,
        SampleSpec::Random { n } => Some(format!("random:n={}", n)),
        SampleSpec::Seeded { n, seed } => Some(format!("seeded:n={},seed={}", n, seed)),
        SampleSpec::Stratified { by, per_group, seed } => {
            let mut token = format!("stratified:by={},per_group={}", by.join("|"), per_group);
            if let Some(seed) = seed {
                token.push_str(&format!(",seed={}", seed));
            }
            Some(token)
        }
    }
}
