//! ObservationScope for automatic begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when closed explicitly
//! - Logs `{name}_INCOMPLETE` on drop if never closed

use std::time::Instant;

use super::logger::Logger;

/// A scope that logs begin and end events around one unit of work.
///
/// Fields given at creation are repeated on every line the scope emits,
/// so begin and end lines can be joined.
///
/// ```ignore
/// let scope = ObservationScope::with_fields("QUERY", &[("table", "semif")]);
/// // ... do work ...
/// scope.complete_with_fields(&[("rows_returned", "10")]);
/// ```
#[derive(Debug)]
pub struct ObservationScope {
    name: &'static str,
    completed: bool,
    fields: Vec<(&'static str, String)>,
}

impl ObservationScope {
    /// Create a new observation scope; logs `{name}_BEGIN` immediately
    pub fn new(name: &'static str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Create a new observation scope with fields
    pub fn with_fields(name: &'static str, fields: &[(&'static str, &str)]) -> Self {
        let event = format!("{}_BEGIN", name);
        Logger::info(&event, fields);

        Self {
            name,
            completed: false,
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
        }
    }

    fn merged<'s>(&'s self, extra: &[(&'s str, &'s str)]) -> Vec<(&'s str, &'s str)> {
        let mut all: Vec<(&str, &str)> = self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all.extend(extra.iter().copied());
        all
    }

    /// Mark the scope as successfully completed
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Mark the scope as completed; logs `{name}_COMPLETE` at INFO
    pub fn complete_with_fields(mut self, extra_fields: &[(&str, &str)]) {
        self.completed = true;
        let event = format!("{}_COMPLETE", self.name);
        Logger::info(&event, &self.merged(extra_fields));
    }

    /// Mark the scope as failed; logs `{name}_FAILED` at ERROR
    pub fn fail(self, reason: &str) {
        self.fail_with_fields(reason, &[]);
    }

    pub fn fail_with_fields(mut self, reason: &str, extra_fields: &[(&str, &str)]) {
        self.completed = true;
        let event = format!("{}_FAILED", self.name);
        let mut fields = self.merged(extra_fields);
        fields.push(("reason", reason));
        Logger::error(&event, &fields);
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.completed {
            let event = format!("{}_INCOMPLETE", self.name);
            let fields = self.merged(&[("reason", "scope dropped without completion")]);
            Logger::warn(&event, &fields);
        }
    }
}

/// A simple duration timer for logging elapsed time
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed milliseconds as a string
    pub fn elapsed_ms(&self) -> String {
        self.start.elapsed().as_millis().to_string()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
