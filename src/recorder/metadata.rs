//! Execution metadata carried by a QuerySpec

use std::env;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who ran a query, where, when and how its output was written.
///
/// Run naming lives here only; it never influences query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub principal: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_revision: Option<String>,
    pub preview_mode: bool,
    #[serde(default)]
    pub preview_count: u64,
    pub output_format: String,
    /// Whether a replay yields the same rows; set when recorded
    #[serde(default)]
    pub reproducible: bool,
}

impl ExecutionMetadata {
    /// Captures metadata for a run starting now
    pub fn capture(output_format: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            principal: first_env(&["USER", "USERNAME"]),
            host: first_env(&["HOSTNAME", "COMPUTERNAME"]),
            source_revision: None,
            preview_mode: false,
            preview_count: 0,
            output_format: output_format.into(),
            reproducible: false,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = principal.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Records the revision of the code or data the run used
    pub fn with_source_revision(mut self, revision: impl Into<String>) -> Self {
        self.source_revision = Some(revision.into());
        self
    }

    /// Marks the run as a preview of `count` rows; zero clears it
    pub fn with_preview(mut self, count: u64) -> Self {
        self.preview_mode = count > 0;
        self.preview_count = count;
        self
    }
}

fn first_env(names: &[&str]) -> String {
    names
        .iter()
        .find_map(|name| env::var(name).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_fills_identity() {
        let meta = ExecutionMetadata::capture("json");
        assert_eq!(meta.output_format, "json");
        assert!(Uuid::parse_str(&meta.run_id).is_ok());
        assert!(!meta.principal.is_empty());
        assert!(!meta.host.is_empty());
        assert!(!meta.preview_mode);
    }

    #[test]
    fn test_run_ids_differ() {
        let a = ExecutionMetadata::capture("json");
        let b = ExecutionMetadata::capture("json");
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn test_with_preview() {
        let meta = ExecutionMetadata::capture("csv").with_preview(25);
        assert!(meta.preview_mode);
        assert_eq!(meta.preview_count, 25);

        let meta = meta.with_preview(0);
        assert!(!meta.preview_mode);
    }

    #[test]
    fn test_timestamp_is_rfc3339() {
        let meta = ExecutionMetadata::capture("json");
        let value = serde_json::to_value(&meta).unwrap();
        let text = value["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(text).is_ok());
        assert!(value.get("source_revision").is_none());
    }
}
