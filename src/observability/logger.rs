//! Structured JSON logger
//!
//! - One log line = one event
//! - Deterministic key ordering
//! - Explicit severity levels
//! - Synchronous, no buffering
//!
//! Lines below the process-wide minimum severity are dropped before
//! formatting. The minimum defaults to INFO and can be overridden with the
//! `AGIR_LOG` environment variable (`trace`, `info`, `warn`, `error`,
//! `fatal`, or `off`).

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug-level detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
    /// Unrecoverable
    Fatal = 4,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Parses a level name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Some(Severity::Trace),
            "INFO" => Some(Severity::Info),
            "WARN" => Some(Severity::Warn),
            "ERROR" => Some(Severity::Error),
            "FATAL" => Some(Severity::Fatal),
            _ => None,
        }
    }

    fn from_u8(level: u8) -> Option<Self> {
        match level {
            0 => Some(Severity::Trace),
            1 => Some(Severity::Info),
            2 => Some(Severity::Warn),
            3 => Some(Severity::Error),
            4 => Some(Severity::Fatal),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const LEVEL_UNSET: u8 = u8::MAX;
const LEVEL_OFF: u8 = u8::MAX - 1;

static MIN_LEVEL: AtomicU8 = AtomicU8::new(LEVEL_UNSET);

/// A structured logger that outputs JSON lines
pub struct Logger;

impl Logger {
    /// Sets the process-wide minimum severity; `None` silences logging
    pub fn set_min_severity(severity: Option<Severity>) {
        let level = severity.map(|s| s as u8).unwrap_or(LEVEL_OFF);
        MIN_LEVEL.store(level, Ordering::Relaxed);
    }

    /// Returns the minimum severity, or `None` when logging is off
    pub fn min_severity() -> Option<Severity> {
        let mut level = MIN_LEVEL.load(Ordering::Relaxed);
        if level == LEVEL_UNSET {
            level = Self::level_from_env();
            MIN_LEVEL.store(level, Ordering::Relaxed);
        }
        Severity::from_u8(level)
    }

    fn level_from_env() -> u8 {
        match std::env::var("AGIR_LOG") {
            Ok(value) if value.trim().eq_ignore_ascii_case("off") => LEVEL_OFF,
            Ok(value) => Severity::parse(&value).unwrap_or(Severity::Info) as u8,
            Err(_) => Severity::Info as u8,
        }
    }

    /// Returns true if a line at `severity` would be written
    pub fn enabled(severity: Severity) -> bool {
        Self::min_severity().map_or(false, |min| severity >= min)
    }

    /// Log an event with the given severity and fields.
    ///
    /// Fields are output in alphabetical key order. ERROR and FATAL lines
    /// go to stderr, everything else to stdout.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if !Self::enabled(severity) {
            return;
        }
        if severity >= Severity::Error {
            Self::log_to_writer(severity, event, fields, &mut io::stderr());
        } else {
            Self::log_to_writer(severity, event, fields, &mut io::stdout());
        }
    }

    fn log_to_writer<W: Write>(
        severity: Severity,
        event: &str,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        let _ = writer.write_all(Self::format_line(severity, event, fields).as_bytes());
        let _ = writer.flush();
    }

    /// Renders one log line, newline included
    pub fn format_line(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut output = String::with_capacity(256);

        output.push('{');

        // Event first, then severity
        output.push_str("\"event\":\"");
        Self::escape_json_string(&mut output, event);
        output.push('"');

        output.push_str(",\"severity\":\"");
        output.push_str(severity.as_str());
        output.push('"');

        let mut sorted_fields: Vec<_> = fields.iter().collect();
        sorted_fields.sort_by_key(|(k, _)| *k);

        for (key, value) in sorted_fields {
            output.push_str(",\"");
            Self::escape_json_string(&mut output, key);
            output.push_str("\":\"");
            Self::escape_json_string(&mut output, value);
            output.push('"');
        }

        output.push_str("}\n");
        output
    }

    fn escape_json_string(output: &mut String, s: &str) {
        for c in s.chars() {
            match c {
                '"' => output.push_str("\\\""),
                '\\' => output.push_str("\\\\"),
                '\n' => output.push_str("\\n"),
                '\r' => output.push_str("\\r"),
                '\t' => output.push_str("\\t"),
                c if c.is_control() => {
                    output.push_str(&format!("\\u{:04x}", c as u32));
                }
                c => output.push(c),
            }
        }
    }

    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Fatal, event, fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("warn"), Some(Severity::Warn));
        assert_eq!(Severity::parse(" TRACE "), Some(Severity::Trace));
        assert_eq!(Severity::parse("verbose"), None);
    }

    #[test]
    fn test_log_json_format() {
        let output = Logger::format_line(Severity::Info, "QUERY_BEGIN", &[]);

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "QUERY_BEGIN");
        assert_eq!(parsed["severity"], "INFO");
    }

    #[test]
    fn test_log_deterministic_ordering() {
        let output1 = Logger::format_line(
            Severity::Info,
            "TEST",
            &[("table", "semif"), ("elapsed_ms", "2"), ("rows_returned", "3")],
        );
        let output2 = Logger::format_line(
            Severity::Info,
            "TEST",
            &[("rows_returned", "3"), ("table", "semif"), ("elapsed_ms", "2")],
        );

        assert_eq!(output1, output2);

        let elapsed_pos = output1.find("elapsed_ms").unwrap();
        let rows_pos = output1.find("rows_returned").unwrap();
        let table_pos = output1.find("table").unwrap();
        assert!(elapsed_pos < rows_pos);
        assert!(rows_pos < table_pos);
    }

    #[test]
    fn test_log_escapes_special_chars() {
        let output = Logger::format_line(
            Severity::Warn,
            "TEST",
            &[("predicate", "species == \"barley\"\nnext")],
        );

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["predicate"], "species == \"barley\"\nnext");
    }

    #[test]
    fn test_log_one_line() {
        let output = Logger::format_line(Severity::Info, "TEST", &[("a", "1"), ("b", "2")]);
        assert_eq!(output.chars().filter(|c| *c == '\n').count(), 1);
        assert!(output.ends_with('\n'));
    }

    #[test]
    fn test_fatal_always_passes_default_threshold() {
        // Whatever the environment chose, FATAL is never below it unless off
        if let Some(min) = Logger::min_severity() {
            assert!(Severity::Fatal >= min);
            assert!(Logger::enabled(Severity::Fatal));
        }
    }
}
