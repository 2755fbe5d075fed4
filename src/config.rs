//! Engine configuration
//!
//! Configuration is JSON:
//!
//! ```json
//! {
//!   "default_preview": 10,
//!   "sources": {
//!     "cutouts": { "kind": "semif", "path": "data/semif.json" },
//!     "field":   {
//!       "kind": "field",
//!       "table": "records",
//!       "path": "data/field.json",
//!       "columns": [{ "name": "id", "kind": "text" }]
//!     }
//!   }
//! }
//! ```
//!
//! Omitted tables and id columns default from the database kind. Declared
//! `columns` stay queryable when the rows file is empty or lacks them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{QueryError, QueryResult};
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{DatabaseKind, SourceRef};
use crate::source::{ColumnInfo, MemorySource};

/// One configured database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: DatabaseKind,

    /// Table name (optional, default from kind)
    #[serde(default)]
    pub table: Option<String>,

    /// Primary key column (optional); must match the kind's key
    #[serde(default)]
    pub id_column: Option<String>,

    /// JSON rows file backing a memory source (optional)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Columns known ahead of the rows (optional)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnInfo>,
}

impl SourceConfig {
    pub fn new(kind: DatabaseKind) -> Self {
        Self {
            kind,
            table: None,
            id_column: None,
            path: None,
            columns: Vec::new(),
        }
    }

    pub fn validate(&self) -> QueryResult<()> {
        match self.problem() {
            Some(problem) => Err(QueryError::InvalidConfig(problem)),
            None => Ok(()),
        }
    }

    fn problem(&self) -> Option<String> {
        if self.table.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Some("table must not be empty".into());
        }
        match self.id_column.as_deref() {
            Some(id) if id.trim().is_empty() => Some("id_column must not be empty".into()),
            Some(id) if id != self.kind.primary_key() => Some(format!(
                "id_column for {} must be '{}', got '{}'",
                self.kind,
                self.kind.primary_key(),
                id
            )),
            _ => self
                .columns
                .iter()
                .find(|c| c.name.trim().is_empty())
                .map(|_| "column names must not be empty".into()),
        }
    }

    /// The table reference this configuration names
    pub fn to_source_ref(&self) -> SourceRef {
        match &self.table {
            Some(table) => SourceRef::with_table(self.kind, table.clone()),
            None => SourceRef::new(self.kind),
        }
    }

    /// Opens the configured rows file as a memory source.
    ///
    /// Relative paths resolve against `base`.
    pub fn open(&self, base: &Path) -> QueryResult<MemorySource> {
        let path = self.path.as_ref().ok_or_else(|| {
            QueryError::InvalidConfig(format!("source of kind {} has no path", self.kind))
        })?;
        let path = if path.is_absolute() {
            path.clone()
        } else {
            base.join(path)
        };
        Ok(MemorySource::load_with_columns(
            path,
            self.to_source_ref().table(),
            self.columns.clone(),
        )?)
    }
}

fn default_preview() -> u64 {
    10
}

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Named databases
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,

    /// Rows shown by a preview (optional, default 10)
    #[serde(default = "default_preview")]
    pub default_preview: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sources: BTreeMap::new(),
            default_preview: default_preview(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate configuration text
    pub fn from_json_str(text: &str) -> QueryResult<Self> {
        let config: EngineConfig = serde_json::from_str(text)
            .map_err(|e| QueryError::InvalidConfig(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| QueryError::InvalidConfig(format!("failed to read config: {}", e)))?;
        let config = Self::from_json_str(&content)?;

        let shown = path.display().to_string();
        let sources = config.sources.len().to_string();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[("path", shown.as_str()), ("sources", sources.as_str())],
        );
        Ok(config)
    }

    pub fn validate(&self) -> QueryResult<()> {
        if self.default_preview == 0 {
            return Err(QueryError::InvalidConfig("default_preview must be > 0".into()));
        }
        for (name, source) in &self.sources {
            if name.trim().is_empty() {
                return Err(QueryError::InvalidConfig("source names must not be empty".into()));
            }
            if let Some(problem) = source.problem() {
                return Err(QueryError::InvalidConfig(format!("source '{}': {}", name, problem)));
            }
        }
        Ok(())
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.get(name)
    }

    /// Table reference of a named source
    pub fn source_ref(&self, name: &str) -> QueryResult<SourceRef> {
        self.source(name)
            .map(SourceConfig::to_source_ref)
            .ok_or_else(|| QueryError::InvalidConfig(format!("no source named '{}'", name)))
    }
}
