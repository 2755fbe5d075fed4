//! Query builder and compiled plans
//!
//! # Invariants
//!
//! - Builders are persistent values; branching never aliases state
//! - Compilation is deterministic: the same constraints yield the same plan
//!   regardless of call order
//! - Execution order is fixed at compile time:
//!   filter → sample → sort → project → paginate
//! - Malformed builders fail at `compile()`, never at execution

mod ast;
mod builder;
mod explain;
mod plan;

pub use ast::{SortDirection, SortKey};
pub use builder::QueryBuilder;
pub use explain::ExplainPlan;
pub use plan::QueryPlan;
