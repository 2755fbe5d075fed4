//! Filter Compiler
//!
//! Merges equality filters (field → accepted values) and raw predicate
//! strings into one conjunctive predicate.
//!
//! # Invariants
//!
//! - At most one equality filter per field; re-filtering merges values
//! - An equality filter never has an empty value set
//! - Compilation depends on the set of constraints, not insertion order
//! - Field names are not checked here; the executor checks them against
//!   the source columns

mod filter_set;
mod predicate;

pub use filter_set::FilterSet;
pub use predicate::{Predicate, RawPredicate};
