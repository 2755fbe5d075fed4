//! Textual filter, sort and sample tokens
//!
//! Filter tokens, in order of precedence:
//!
//! ```text
//! {"state": "NC", "species": ["barley", "wheat"]}   JSON block
//! {"area>=": 100, "$raw": "height is null"}         JSON block with expressions
//! area>=100   species == ['barley']   height is null  predicate expression (kept raw)
//! species=barley,wheat   state=NC   year=[2023, 2024] field=value shorthand
//! ```
//!
//! Sort tokens are `field[:asc|desc]` lists, e.g. `datetime:desc,cutout_id`.
//! Sample tokens are `kind[:key=value,...]`, e.g.
//! `stratified:by=species|state,per_group=3,seed=7`.

use serde_json::Value;

use crate::errors::{QueryError, QueryResult};
use crate::planner::{QueryBuilder, SortDirection, SortKey};
use crate::record::Scalar;
use crate::sample::SampleSpec;

const DEFAULT_SAMPLE_N: i64 = 100;
const DEFAULT_SAMPLE_SEED: i64 = 42;
const DEFAULT_PER_GROUP: i64 = 10;

/// Substrings that mark a token as a predicate expression
const EXPRESSION_MARKERS: [&str; 10] = [
    "==", "!=", ">=", "<=", ">", "<", " in ", " between ", " is null", " is not null",
];

/// Operators a JSON block key may end with, longest first
const KEY_OPERATORS: [&str; 6] = [">=", "<=", "!=", "==", ">", "<"];

/// JSON block keys with this prefix carry raw expressions, like `$raw`
const EXPRESSION_KEY_PREFIX: &str = "__expr__";

fn looks_like_expression(text: &str) -> bool {
    let lowered = text.to_ascii_lowercase();
    EXPRESSION_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Splits `area>=` into `("area", ">=")`
fn operator_key(key: &str) -> Option<(&str, &str)> {
    KEY_OPERATORS
        .iter()
        .find_map(|op| key.strip_suffix(op).map(|name| (name.trim(), *op)))
}

/// The tokens a query was given, verbatim
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTokens {
    pub filters: Vec<String>,
    pub sort: Option<String>,
    pub sample: Option<String>,
}

impl RawTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, token: impl Into<String>) -> Self {
        self.filters.push(token.into());
        self
    }

    pub fn with_sort(mut self, token: impl Into<String>) -> Self {
        self.sort = Some(token.into());
        self
    }

    pub fn with_sample(mut self, token: impl Into<String>) -> Self {
        self.sample = Some(token.into());
        self
    }

    /// Applies every token to `builder`
    pub fn apply(&self, builder: QueryBuilder) -> QueryResult<QueryBuilder> {
        let mut builder = builder;

        for token in &self.filters {
            for filter in parse_filter_token(token)? {
                builder = match filter {
                    FilterToken::Equality { field, values } => builder.try_filter_eq(field, values)?,
                    FilterToken::Raw(expression) => builder.where_raw(expression),
                };
            }
        }

        if let Some(sort) = &self.sort {
            for key in parse_sort_token(sort)? {
                builder = builder.sort_by(key.field, key.direction);
            }
        }

        if let Some(sample) = &self.sample {
            builder = builder.sample(parse_sample_token(sample)?);
        }

        Ok(builder)
    }
}

/// One filter a token expands to
#[derive(Debug, Clone, PartialEq)]
pub enum FilterToken {
    Equality { field: String, values: Vec<Scalar> },
    Raw(String),
}

/// Parses one filter token. A blank token yields nothing.
pub fn parse_filter_token(token: &str) -> QueryResult<Vec<FilterToken>> {
    let text = token.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    if text.starts_with('{') {
        return parse_json_block(token, text);
    }

    if looks_like_expression(text) {
        return Ok(vec![FilterToken::Raw(text.to_string())]);
    }

    if let Some((field, value)) = text.split_once('=') {
        let field = field.trim();
        if field.is_empty() {
            return Err(QueryError::invalid_token(token, "missing field name"));
        }
        let values = parse_value_list(value);
        if values.is_empty() {
            return Err(QueryError::invalid_token(token, "no values given"));
        }
        return Ok(vec![shorthand(field, values)]);
    }

    Ok(vec![FilterToken::Raw(text.to_string())])
}

/// `has_mask` / `has_masks` stand for a null check on `mask_path`
fn shorthand(field: &str, values: Vec<Scalar>) -> FilterToken {
    if field == "has_mask" || field == "has_masks" {
        let wanted = matches!(
            values.as_slice(),
            [Scalar::Bool(true)] | [Scalar::Int(1)]
        ) || matches!(values.as_slice(), [Scalar::String(s)] if s.eq_ignore_ascii_case("true"));
        let check = if wanted { "is not null" } else { "is null" };
        return FilterToken::Raw(format!("mask_path {}", check));
    }
    FilterToken::Equality {
        field: field.to_string(),
        values,
    }
}

/// `a,b,c` or `[a, b, c]` or a single value
fn parse_value_list(text: &str) -> Vec<Scalar> {
    let text = text.trim();
    if text.starts_with('[') && text.ends_with(']') {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(text) {
            if let Some(values) = items.iter().map(json_scalar).collect::<Option<Vec<_>>>() {
                return values;
            }
        }
        return split_values(&text[1..text.len() - 1]);
    }
    split_values(text)
}

fn split_values(text: &str) -> Vec<Scalar> {
    text.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(Scalar::parse_literal)
        .collect()
}

fn json_scalar(value: &Value) -> Option<Scalar> {
    match value {
        Value::Array(_) | Value::Object(_) => None,
        scalar => serde_json::from_value(scalar.clone()).ok(),
    }
}

fn parse_json_block(token: &str, text: &str) -> QueryResult<Vec<FilterToken>> {
    let object = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => object,
        Ok(_) => return Err(QueryError::invalid_token(token, "expected a JSON object")),
        Err(e) => return Err(QueryError::invalid_token(token, e.to_string())),
    };

    let mut out = Vec::with_capacity(object.len());
    for (field, value) in object {
        if field == "$raw" || field.starts_with(EXPRESSION_KEY_PREFIX) {
            match value {
                Value::String(expression) => out.push(FilterToken::Raw(expression)),
                Value::Array(items) => {
                    for item in items {
                        match item {
                            Value::String(expression) => out.push(FilterToken::Raw(expression)),
                            _ => {
                                return Err(QueryError::invalid_token(
                                    token,
                                    format!("'{}' entries must be strings", field),
                                ))
                            }
                        }
                    }
                }
                _ => {
                    return Err(QueryError::invalid_token(
                        token,
                        format!("'{}' must be a string or list", field),
                    ))
                }
            }
            continue;
        }

        if let Some((name, op)) = operator_key(&field) {
            if name.is_empty() {
                return Err(QueryError::invalid_token(token, format!("'{}' has no field name", field)));
            }
            if value.is_array() || value.is_object() {
                return Err(QueryError::invalid_token(
                    token,
                    format!("'{}' compares against a single value", field),
                ));
            }
            out.push(FilterToken::Raw(format!("{} {} {}", name, op, value)));
            continue;
        }

        let filter = match &value {
            Value::String(text) if looks_like_expression(text) => FilterToken::Raw(text.clone()),
            Value::String(text) if text.contains(',') && !text.trim_start().starts_with('[') => {
                let values: Vec<Scalar> = text
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(Scalar::from)
                    .collect();
                if values.is_empty() {
                    return Err(QueryError::EmptyFilterValues { field });
                }
                shorthand(&field, values)
            }
            Value::Array(items) => {
                let values = items
                    .iter()
                    .map(json_scalar)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| QueryError::invalid_token(token, format!("'{}' values must be scalars", field)))?;
                if values.is_empty() {
                    return Err(QueryError::EmptyFilterValues { field });
                }
                shorthand(&field, values)
            }
            Value::Object(range) => {
                let bounds = range
                    .get("between")
                    .or_else(|| range.get("in"))
                    .and_then(Value::as_array)
                    .filter(|b| b.len() == 2)
                    .ok_or_else(|| {
                        QueryError::invalid_token(token, format!("'{}' range must be {{\"between\": [lo, hi]}}", field))
                    })?;
                FilterToken::Raw(format!("{} between [{}, {}]", field, bounds[0], bounds[1]))
            }
            scalar => shorthand(&field, vec![json_scalar(scalar).unwrap_or(Scalar::Null)]),
        };
        out.push(filter);
    }
    Ok(out)
}

/// Parses `field[:dir],...`. A blank token yields no keys.
pub fn parse_sort_token(token: &str) -> QueryResult<Vec<SortKey>> {
    let mut keys = Vec::new();
    for part in token.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (field, direction) = match part.split_once(':') {
            Some((field, dir)) => {
                let direction = SortDirection::parse(dir).ok_or_else(|| {
                    QueryError::invalid_token(token, format!("unknown sort direction '{}'", dir.trim()))
                })?;
                (field.trim(), direction)
            }
            None => (part, SortDirection::Asc),
        };
        if field.is_empty() {
            return Err(QueryError::invalid_token(token, "missing sort field"));
        }
        keys.push(SortKey::new(field, direction));
    }
    Ok(keys)
}

/// Parses `kind[:key=value,...]`.
///
/// Missing counts default to n=100 and per_group=10; a seeded draw without
/// a seed uses 42. Stratified draws stay unseeded unless a seed is given.
pub fn parse_sample_token(token: &str) -> QueryResult<SampleSpec> {
    let (kind, rest) = match token.split_once(':') {
        Some((kind, rest)) => (kind.trim(), rest),
        None => (token.trim(), ""),
    };
    if kind.is_empty() {
        return Err(QueryError::invalid_token(token, "missing sample kind"));
    }

    let mut n = None;
    let mut seed = None;
    let mut by = None;
    let mut per_group = None;

    for part in rest.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .map(|(k, v)| (k.trim(), v.trim()))
            .ok_or_else(|| QueryError::invalid_token(token, format!("expected key=value, got '{}'", part)))?;

        let integer = || {
            value
                .parse::<i64>()
                .map_err(|_| QueryError::invalid_token(token, format!("'{}' must be an integer", key)))
        };

        match key {
            "n" => n = Some(integer()?),
            "seed" => seed = Some(integer()?),
            "per_group" => per_group = Some(integer()?),
            "by" => {
                by = Some(
                    value
                        .split('|')
                        .map(str::trim)
                        .filter(|f| !f.is_empty())
                        .map(str::to_string)
                        .collect::<Vec<_>>(),
                )
            }
            other => {
                return Err(QueryError::invalid_token(token, format!("unknown sample option '{}'", other)))
            }
        }
    }

    let kind = kind.to_ascii_lowercase();
    match kind.as_str() {
        "random" => SampleSpec::from_parts(&kind, n.or(Some(DEFAULT_SAMPLE_N)), seed, by, per_group),
        "seeded" => SampleSpec::from_parts(
            &kind,
            n.or(Some(DEFAULT_SAMPLE_N)),
            seed.or(Some(DEFAULT_SAMPLE_SEED)),
            by,
            per_group,
        ),
        "stratified" => SampleSpec::from_parts(&kind, n, seed, by, per_group.or(Some(DEFAULT_PER_GROUP))),
        _ => SampleSpec::from_parts(&kind, n, seed, by, per_group),
    }
}
