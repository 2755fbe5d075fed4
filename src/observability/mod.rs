//! Observability for the query engine
//!
//! - Structured logging (JSON lines)
//! - Typed events
//! - Begin/complete scopes with timing
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. Logging never changes a query result
//! 3. No background threads
//! 4. Deterministic output for the same fields
//!
//! # Usage
//!
//! ```ignore
//! use agir_query::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::SpecSaved, &[("path", "runs/q1.json")]);
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::{ObservationScope, Timer};

/// Log an event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::SourceClosed);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::ConfigLoaded, &[("sources", "2")]);
    }
}
