//! Observable engine events
//!
//! Events are explicit and typed. Each maps to one stable line name.
//! Query and count execution are logged by scopes instead (`QUERY_BEGIN`,
//! `QUERY_COMPLETE`, `QUERY_FAILED`, and the same for `COUNT`).

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Query execution
    /// Sampling narrowed the candidate set
    SampleApplied,

    // Query specs
    /// A QuerySpec was built for an executed plan
    SpecRecorded,
    /// A QuerySpec was written to disk
    SpecSaved,
    /// A QuerySpec was read back from disk
    SpecLoaded,

    // Sources
    /// A memory source was populated
    SourceLoaded,
    /// A source was closed
    SourceClosed,

    // Configuration
    /// Engine configuration loaded
    ConfigLoaded,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SampleApplied => "SAMPLE_APPLIED",

            Event::SpecRecorded => "SPEC_RECORDED",
            Event::SpecSaved => "SPEC_SAVED",
            Event::SpecLoaded => "SPEC_LOADED",

            Event::SourceLoaded => "SOURCE_LOADED",
            Event::SourceClosed => "SOURCE_CLOSED",

            Event::ConfigLoaded => "CONFIG_LOADED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::SampleApplied => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
