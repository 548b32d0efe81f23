// bifrost-contract/src/jsonrpc.rs
// ============================================================================
// Module: JSON-RPC Framing
// Description: Minimal JSON-RPC 2.0 request/response/error shapes used by
//              both the downstream client and the upstream transport.
// Purpose: Give both halves of the proxy's pipe a single wire vocabulary.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Bifrost does not fix the downstream/upstream framing at the trait level
//! (`bifrost_core::DownstreamClient` is transport-agnostic); this module is
//! the concrete line-delimited JSON-RPC 2.0 framing this crate's stdio
//! transports use, matching the tool-provider protocol most MCP-style
//! servers already speak.

use serde_json::Value;
use serde_json::json;

/// Builds a JSON-RPC request object for `method` with the given `id` and
/// `params`.
#[must_use]
pub fn build_request(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Builds a JSON-RPC success response echoing `id`.
#[must_use]
pub fn build_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

/// Builds a JSON-RPC error response echoing `id`.
#[must_use]
pub fn build_error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message,
        },
    })
}

/// Returns the numeric `id` field of a parsed JSON-RPC object, if present
/// and representable as a non-negative integer.
#[must_use]
pub fn numeric_id(value: &Value) -> Option<u64> {
    value.get("id").and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_method_and_params() {
        let request = build_request(3, "tools/call", json!({"name": "read_file"}));
        assert_eq!(request["id"], 3);
        assert_eq!(request["method"], "tools/call");
        assert_eq!(request["params"]["name"], "read_file");
    }

    #[test]
    fn error_response_has_no_result_field() {
        let response = build_error_response(json!(3), -32000, "boom");
        assert_eq!(response["error"]["message"], "boom");
        assert!(response.get("result").is_none());
    }
}
