//! Database kinds and table identity
//!
//! Two record schemas exist. Each fixes its primary key column and the
//! table queried when none is named.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Metadata schema of a database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// Semi-field cutouts, keyed by `cutout_id`
    #[serde(rename = "semif")]
    SemiF,
    /// Field images, keyed by `id`
    Field,
}

impl DatabaseKind {
    /// Returns the primary key column
    pub fn primary_key(&self) -> &'static str {
        match self {
            DatabaseKind::SemiF => "cutout_id",
            DatabaseKind::Field => "id",
        }
    }

    /// Returns the table used when none is configured
    pub fn default_table(&self) -> &'static str {
        match self {
            DatabaseKind::SemiF => "semif",
            DatabaseKind::Field => "records",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::SemiF => "semif",
            DatabaseKind::Field => "field",
        }
    }

    /// Parses a kind name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "semif" => Some(DatabaseKind::SemiF),
            "field" => Some(DatabaseKind::Field),
            _ => None,
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The table a query runs against
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef {
    kind: DatabaseKind,
    table: String,
}

impl SourceRef {
    /// Refers to the default table of `kind`
    pub fn new(kind: DatabaseKind) -> Self {
        Self {
            kind,
            table: kind.default_table().to_string(),
        }
    }

    /// Refers to a named table of `kind`
    pub fn with_table(kind: DatabaseKind, table: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
        }
    }

    pub fn semif() -> Self {
        Self::new(DatabaseKind::SemiF)
    }

    pub fn field() -> Self {
        Self::new(DatabaseKind::Field)
    }

    pub fn kind(&self) -> DatabaseKind {
        self.kind
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &'static str {
        self.kind.primary_key()
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_keys() {
        assert_eq!(DatabaseKind::SemiF.primary_key(), "cutout_id");
        assert_eq!(DatabaseKind::Field.primary_key(), "id");
    }

    #[test]
    fn test_default_tables() {
        assert_eq!(SourceRef::semif().table(), "semif");
        assert_eq!(SourceRef::field().table(), "records");
        assert_eq!(
            SourceRef::with_table(DatabaseKind::Field, "field_v2").table(),
            "field_v2"
        );
    }

    #[test]
    fn test_kind_serde_names() {
        assert_eq!(
            serde_json::to_string(&DatabaseKind::SemiF).unwrap(),
            "\"semif\""
        );
        let kind: DatabaseKind = serde_json::from_str("\"field\"").unwrap();
        assert_eq!(kind, DatabaseKind::Field);
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(DatabaseKind::parse("SemiF"), Some(DatabaseKind::SemiF));
        assert_eq!(DatabaseKind::parse(" FIELD "), Some(DatabaseKind::Field));
        assert_eq!(DatabaseKind::parse("cvat"), None);
    }
}
