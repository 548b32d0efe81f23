// bifrost-gateway/src/diagnostics.rs
// ============================================================================
// Module: Bifrost Diagnostics
// Description: Process-level structured diagnostics, distinct from the
//              Rune audit trail.
// Purpose: Give the proxy a swappable destination for startup/shutdown
//          notices, sink failures, and key-load/signature-failure warnings.
// Dependencies: bifrost_core::time, serde_json
// ============================================================================

//! ## Overview
//! The runechain (`bifrost_core::runechain`) is the tamper-evident record of
//! *decisions*; this module is for everything else a running process wants
//! to say about its own health, following the same hand-rolled sink-trait
//! idiom rather than pulling in a logging framework. Each emitted record is
//! one line of JSON: a timestamp, a level, a message, and caller-supplied
//! structured fields.

use std::io::Write as _;

use bifrost_core::Timestamp;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Diagnostic Level
// ============================================================================

/// Severity of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    /// Routine, expected events: startup, shutdown, baseline updates.
    Info,
    /// Recoverable anomalies: an absorbed sink failure, a drift warning.
    Warn,
    /// Failures that affect correctness or durability: a key-load failure,
    /// a signature failure on an otherwise-persisted rune.
    Error,
}

// ============================================================================
// SECTION: Diagnostic Record
// ============================================================================

/// One emitted diagnostic line.
#[derive(Debug, Clone, Serialize)]
struct DiagnosticRecord {
    timestamp: Timestamp,
    level: DiagnosticLevel,
    message: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    fields: Value,
}

// ============================================================================
// SECTION: Diagnostic Sink
// ============================================================================

/// A destination for process diagnostics. Implementations must not panic;
/// a diagnostics failure should never take down the proxy it is describing.
pub trait DiagnosticSink: Send + Sync {
    /// Emits one diagnostic record.
    fn emit(&self, level: DiagnosticLevel, message: &str, fields: Value);

    /// Emits an [`DiagnosticLevel::Info`] record with no extra fields.
    fn info(&self, message: &str) {
        self.emit(DiagnosticLevel::Info, message, Value::Null);
    }

    /// Emits a [`DiagnosticLevel::Warn`] record with no extra fields.
    fn warn(&self, message: &str) {
        self.emit(DiagnosticLevel::Warn, message, Value::Null);
    }

    /// Emits an [`DiagnosticLevel::Error`] record with no extra fields.
    fn error(&self, message: &str) {
        self.emit(DiagnosticLevel::Error, message, Value::Null);
    }
}

// ============================================================================
// SECTION: Stderr Sink
// ============================================================================

/// Writes each diagnostic record as one line of JSON to stderr.
#[derive(Debug, Default)]
pub struct StderrDiagnosticSink;

impl StderrDiagnosticSink {
    /// Creates a stderr diagnostic sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DiagnosticSink for StderrDiagnosticSink {
    fn emit(&self, level: DiagnosticLevel, message: &str, fields: Value) {
        let record = DiagnosticRecord { timestamp: Timestamp::now(), level, message: message.to_string(), fields };
        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.write_all(b"\n");
    }
}

// ============================================================================
// SECTION: Noop Sink
// ============================================================================

/// Discards every diagnostic record. Used when an operator wants a silent
/// process, or in tests that do not want stderr noise.
#[derive(Debug, Default)]
pub struct NoopDiagnosticSink;

impl NoopDiagnosticSink {
    /// Creates a no-op diagnostic sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DiagnosticSink for NoopDiagnosticSink {
    fn emit(&self, _level: DiagnosticLevel, _message: &str, _fields: Value) {}
}

/// Builds the structured-fields payload for an absorbed sink failure,
/// the shape [`DiagnosticSink`] callers use when a rune's fan-out to one
/// sink fails.
#[must_use]
pub fn sink_failure_fields(sink_name: &str, error: &str) -> Value {
    json!({ "sink": sink_name, "error": error })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
    #![allow(clippy::expect_used, reason = "Tests use expect for explicit failure messages.")]
    use super::*;

    struct RecordingSink {
        records: std::sync::Mutex<Vec<(DiagnosticLevel, String, Value)>>,
    }

    impl DiagnosticSink for RecordingSink {
        fn emit(&self, level: DiagnosticLevel, message: &str, fields: Value) {
            self.records.lock().expect("lock").push((level, message.to_string(), fields));
        }
    }

    #[test]
    fn noop_sink_emits_nothing_observable() {
        let sink = NoopDiagnosticSink::new();
        sink.info("startup");
        sink.warn("sink failure");
        sink.error("key load failed");
    }

    #[test]
    fn stderr_sink_does_not_panic_on_emit() {
        let sink = StderrDiagnosticSink::new();
        sink.emit(DiagnosticLevel::Info, "proxy started", json!({ "realm": "prod" }));
    }

    #[test]
    fn convenience_methods_carry_the_right_level() {
        let sink = RecordingSink { records: std::sync::Mutex::new(Vec::new()) };
        sink.info("a");
        sink.warn("b");
        sink.error("c");
        let records = sink.records.into_inner().expect("lock");
        assert_eq!(records[0].0, DiagnosticLevel::Info);
        assert_eq!(records[1].0, DiagnosticLevel::Warn);
        assert_eq!(records[2].0, DiagnosticLevel::Error);
    }

    #[test]
    fn sink_failure_fields_carries_name_and_error() {
        let fields = sink_failure_fields("webhook", "connection refused");
        assert_eq!(fields["sink"], "webhook");
        assert_eq!(fields["error"], "connection refused");
    }
}
