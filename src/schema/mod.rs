//! Database identity
//!
//! The engine has no schema access of its own. It knows only which kind of
//! database it is talking to, which fixes the primary key column, and which
//! table to read. Column names are discovered from the source at execution.

mod kind;

pub use kind::{DatabaseKind, SourceRef};
