//! Query execution
//!
//! The executor consumes compiled plans and produces rows, counts or
//! previews.
//!
//! # Invariants
//!
//! - Stage order is filter → sample → sort → project → paginate
//! - Same plan + same data + same seed = same rows
//! - An unreachable source fails before any row is produced
//! - Unknown fields fail before the first row
//! - Records handed in by the source are never mutated

mod executor;
mod result;
mod sorter;
mod stream;

pub use executor::QueryExecutor;
pub use result::QueryOutput;
pub use sorter::ResultSorter;
pub use stream::RowStream;
