//! agir-query - A deterministic query and sampling engine for agricultural
//! image metadata
//!
//! Queries run against SemiF cutout and Field image tables. A query is built
//! with [`QueryBuilder`], compiled to an immutable [`QueryPlan`], executed
//! by a [`QueryExecutor`] over any [`DataSource`], and recorded as a
//! replayable [`QuerySpec`].
//!
//! ```no_run
//! use agir_query::{
//!     ExecutionMetadata, MemorySource, QueryBuilder, QueryExecutor, QuerySpecRecorder,
//!     RawTokens, SortDirection,
//! };
//!
//! # fn main() -> Result<(), agir_query::QueryError> {
//! let source = MemorySource::load("semif.json", "semif")?;
//! let plan = QueryBuilder::semif()
//!     .filter_eq("category_common_name", ["barley", "wheat"])
//!     .sort_by("area", SortDirection::Desc)
//!     .sample_seeded(50, 42)
//!     .compile()?;
//!
//! let rows = QueryExecutor::new(&source).collect(&plan)?;
//! let spec = QuerySpecRecorder::record(&plan, RawTokens::default(), ExecutionMetadata::capture("json"));
//! spec.save("runs/query_spec.json")?;
//! # let _ = rows;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod executor;
pub mod filter;
pub mod observability;
pub mod planner;
pub mod record;
pub mod recorder;
pub mod sample;
pub mod schema;
pub mod source;

pub use config::{EngineConfig, SourceConfig};
pub use errors::{Clause, QueryError, QueryResult};
pub use executor::{QueryExecutor, QueryOutput, RowStream};
pub use filter::{FilterSet, Predicate};
pub use planner::{ExplainPlan, QueryBuilder, QueryPlan, SortDirection, SortKey};
pub use record::{Record, Scalar};
pub use recorder::{compare, ExecutionMetadata, QuerySpec, QuerySpecRecorder, RawTokens, SpecDiff};
pub use sample::{SampleSpec, MAX_SAMPLE_COUNT};
pub use schema::{DatabaseKind, SourceRef};
pub use source::{ColumnInfo, ColumnKind, DataSource, MemorySource, SourceError};
