// bifrost-broker/src/sinks/stdout.rs
// ============================================================================
// Module: Stdout Sink
// Description: Emits one NDJSON line per rune to the process's stdout.
// Purpose: The simplest audit destination; useful for local development and
//          piping into another process.
// Dependencies: bifrost_core::interfaces, serde_json, std::io
// ============================================================================

use std::io::Write as _;
use std::sync::Mutex;

use bifrost_core::Sink;
use bifrost_core::SinkError;
use bifrost_core::model::Rune;

/// Writes each rune as one line of JSON to stdout.
pub struct StdoutSink {
    name: String,
    lock: Mutex<()>,
}

impl StdoutSink {
    /// Creates a stdout sink with the given diagnostic name.
    #[must_use]
    pub fn new(name: String) -> Self {
        Self { name, lock: Mutex::new(()) }
    }
}

impl Sink for StdoutSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&self, rune: &Rune) -> Result<(), SinkError> {
        let line = serde_json::to_string(rune).map_err(|err| SinkError::Emit(err.to_string()))?;
        let _guard = self.lock.lock().map_err(|_| SinkError::Emit("stdout sink lock poisoned".to_string()))?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(line.as_bytes()).map_err(|err| SinkError::Emit(err.to_string()))?;
        stdout.write_all(b"\n").map_err(|err| SinkError::Emit(err.to_string()))?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        std::io::stdout().flush().map_err(|err| SinkError::Emit(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
    #![allow(clippy::expect_used, reason = "Tests use expect for explicit failure messages.")]
    use super::*;
    use bifrost_core::SessionId;
    use bifrost_core::Timestamp;
    use bifrost_core::model::WardDecision;

    fn sample_rune() -> Rune {
        Rune {
            sequence: 1,
            timestamp: Timestamp::now(),
            session_id: SessionId::new("sess-1"),
            tool_name: "read_file".to_string(),
            arguments_hash: "deadbeef".to_string(),
            arguments_summary: "{}".to_string(),
            decision: WardDecision::Pass,
            matched_wards: Vec::new(),
            ward_chain: Vec::new(),
            rationale: "no ward matched".to_string(),
            response_summary: None,
            duration_ms: None,
            previous_hash: "GENESIS".to_string(),
            content_hash: "abc123".to_string(),
            is_genesis: true,
            signature: None,
            risk_score: None,
            risk_tier: None,
            ai_reasoning: None,
        }
    }

    #[test]
    fn emits_without_error() {
        let sink = StdoutSink::new("stdout".to_string());
        sink.emit(&sample_rune()).expect("emit");
        sink.flush().expect("flush");
    }
}
