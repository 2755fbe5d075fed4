//! Query Spec Recorder
//!
//! Captures every executed query as a QuerySpec document that can be saved,
//! compared, summarized and replayed.
//!
//! # Invariants
//!
//! - Replay uses the structured half only; raw tokens are audit data
//! - Canonical JSON has sorted keys; equivalence is byte equality
//! - Recording never changes the plan it records

mod diff;
mod metadata;
mod recorder;
mod spec;
mod summary;
mod tokens;

pub use diff::{compare, SpecChange, SpecDiff};
pub use metadata::ExecutionMetadata;
pub use recorder::QuerySpecRecorder;
pub use spec::{FilterSection, QuerySpec, SampleSection, SourceSection};
pub use tokens::{parse_filter_token, parse_sample_token, parse_sort_token, FilterToken, RawTokens};
