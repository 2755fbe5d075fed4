//! Sample Planner
//!
//! Turns a sampling directive into a row selection over the filtered
//! candidate set.
//!
//! # Invariants
//!
//! - Seeded selection depends only on (seed, n, candidate keys)
//! - Stratified returns min(group size, per_group) rows per group
//! - Groups are emitted in ascending order of their key tuple
//! - Under-populated inputs are returned whole, never padded

mod planner;
mod score;
mod spec;

pub use planner::SamplePlanner;
pub use score::seeded_score;
pub use spec::{SampleSpec, MAX_SAMPLE_COUNT};
