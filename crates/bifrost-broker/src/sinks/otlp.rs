// bifrost-broker/src/sinks/otlp.rs
// ============================================================================
// Module: OTLP Span Sink
// Description: Emits each rune as an OTLP-over-HTTP/JSON span.
// Purpose: Let a rune's decision and duration show up as a span in an
//          existing tracing backend without Bifrost depending on the OTLP
//          SDK directly.
// Dependencies: bifrost_core::interfaces, reqwest (blocking, rustls)
// ============================================================================

//! ## Overview
//! This sink builds the minimal `ExportTraceServiceRequest` JSON shape OTLP
//! collectors accept over their HTTP/JSON endpoint (`/v1/traces`), with one
//! span per rune: the tool name as the span name, the decision/session/
//! sequence as attributes, and `duration_ms` (when known) as the span's
//! elapsed time. No full OTLP SDK is pulled in for this.

use bifrost_core::Sink;
use bifrost_core::SinkError;
use bifrost_core::model::Rune;
use reqwest::blocking::Client;
use serde_json::Value;
use serde_json::json;

/// Emits one OTLP span per rune to `endpoint`.
pub struct OtlpSpanSink {
    name: String,
    endpoint: String,
    client: Client,
}

impl OtlpSpanSink {
    /// Builds an OTLP span sink posting to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(name: String, endpoint: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self { name, endpoint, client })
    }

    /// Builds an OTLP span sink using an already-constructed client.
    #[must_use]
    pub fn with_client(name: String, endpoint: String, client: Client) -> Self {
        Self { name, endpoint, client }
    }
}

impl Sink for OtlpSpanSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&self, rune: &Rune) -> Result<(), SinkError> {
        let body = rune_to_otlp_request(rune);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|err| SinkError::Emit(err.to_string()))?;
        if !response.status().is_success() {
            return Err(SinkError::Emit(format!("otlp collector returned status {}", response.status())));
        }
        Ok(())
    }
}

/// Builds the OTLP/HTTP JSON trace-export body for one rune.
fn rune_to_otlp_request(rune: &Rune) -> Value {
    let start_nanos = unix_nanos(rune);
    let end_nanos = start_nanos + u128::from(rune.duration_ms.unwrap_or(0)) * 1_000_000;
    json!({
        "resourceSpans": [{
            "resource": {
                "attributes": [
                    { "key": "service.name", "value": { "stringValue": "bifrost-gate" } }
                ]
            },
            "scopeSpans": [{
                "scope": { "name": "bifrost-broker" },
                "spans": [{
                    "name": rune.tool_name,
                    "kind": 3,
                    "startTimeUnixNano": start_nanos.to_string(),
                    "endTimeUnixNano": end_nanos.to_string(),
                    "attributes": [
                        { "key": "bifrost.decision", "value": { "stringValue": decision_label(rune) } },
                        { "key": "bifrost.session_id", "value": { "stringValue": rune.session_id.as_str() } },
                        { "key": "bifrost.sequence", "value": { "intValue": rune.sequence.to_string() } }
                    ]
                }]
            }]
        }]
    })
}

/// Renders a rune's decision as the string OTLP attribute expects.
fn decision_label(rune: &Rune) -> String {
    serde_json::to_value(rune.decision)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

/// Approximates the rune's inscription instant as nanoseconds since the
/// Unix epoch, for span timing. Falls back to `0` if the timestamp cannot
/// be parsed, which never happens for a timestamp produced by
/// [`bifrost_core::Timestamp::now`].
fn unix_nanos(rune: &Rune) -> u128 {
    let text = rune.timestamp.to_string();
    time::OffsetDateTime::parse(&text, &time::format_description::well_known::Rfc3339)
        .map(|dt| u128::try_from(dt.unix_timestamp_nanos()).unwrap_or(0))
        .unwrap_or(0)
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
            sequence: 7,
            timestamp: Timestamp::now(),
            session_id: SessionId::new("sess-1"),
            tool_name: "read_file".to_string(),
            arguments_hash: "deadbeef".to_string(),
            arguments_summary: "{}".to_string(),
            decision: WardDecision::Halt,
            matched_wards: Vec::new(),
            ward_chain: Vec::new(),
            rationale: "blocked".to_string(),
            response_summary: None,
            duration_ms: Some(42),
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
    fn builds_one_span_with_the_tool_name_and_decision() {
        let body = rune_to_otlp_request(&sample_rune());
        let span = &body["resourceSpans"][0]["scopeSpans"][0]["spans"][0];
        assert_eq!(span["name"], "read_file");
        assert_eq!(span["attributes"][0]["value"]["stringValue"], "HALT");
    }

    #[test]
    fn end_time_is_after_start_time_when_duration_is_known() {
        let body = rune_to_otlp_request(&sample_rune());
        let span = &body["resourceSpans"][0]["scopeSpans"][0]["spans"][0];
        let start: u128 = span["startTimeUnixNano"].as_str().expect("start").parse().expect("parse");
        let end: u128 = span["endTimeUnixNano"].as_str().expect("end").parse().expect("parse");
        assert!(end > start);
    }
}
