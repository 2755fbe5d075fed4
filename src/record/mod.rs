//! Record and value types
//!
//! Records are immutable rows of scalar values. Values form a closed tagged
//! union; filters match values exactly, without coercion between kinds.

mod record;
mod scalar;

pub use record::Record;
pub use scalar::Scalar;
