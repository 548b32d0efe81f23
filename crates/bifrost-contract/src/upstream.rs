// bifrost-contract/src/upstream.rs
// ============================================================================
// Module: Stdio Upstream Transport
// Description: Reads agent-facing JSON-RPC requests from a byte stream and
//              drives a `BifrostProxy` to answer them.
// Purpose: The agent-facing half of the proxy's one downstream session /
//          one upstream session pairing.
// Dependencies: bifrost_core::{runtime, interfaces, model}
// ============================================================================

//! ## Overview
//! [`serve`] is the upstream server session: it owns nothing of its own
//! beyond the byte streams it is given, reading one JSON-RPC request per
//! line and translating `tools/list`/`tools/call` into the proxy's
//! `list_tools`/`call_tool`. It never returns except on a read error or a
//! closed input stream, matching the specification's "serve until
//! cancelled" proxy lifecycle.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::io::Write as _;

use bifrost_core::ServerId;
use bifrost_core::SessionId;
use bifrost_core::interfaces::DownstreamClient;
use bifrost_core::interfaces::RunechainStore;
use bifrost_core::model::ToolCallContext;
use bifrost_core::runtime::BifrostProxy;
use bifrost_core::runtime::ProxyError;
use serde_json::Value;

use crate::jsonrpc::build_error_response;
use crate::jsonrpc::build_response;

/// Serves upstream JSON-RPC requests read from `input`, one per line,
/// writing one JSON-RPC response line per request to `output`, until
/// `input` is exhausted or a read/write error occurs.
///
/// # Errors
///
/// Returns an [`std::io::Error`] if `input` cannot be read or `output`
/// cannot be written to. Proxy-level failures (a halted request, a
/// downstream transport error) are translated into JSON-RPC error
/// responses and do not stop the loop.
pub fn serve<S, D>(
    proxy: &mut BifrostProxy<S, D>,
    server_id: &ServerId,
    session_id: &SessionId,
    mut input: impl BufRead,
    mut output: impl std::io::Write,
) -> std::io::Result<()>
where
    S: RunechainStore,
    D: DownstreamClient,
{
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = input.read_line(&mut line)?;
        if bytes_read == 0 {
            return Ok(());
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Ok(request) = serde_json::from_str::<Value>(trimmed) else {
            continue;
        };
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request.get("method").and_then(Value::as_str).unwrap_or_default();

        let response = match method {
            "tools/list" => handle_list_tools(proxy, server_id, id),
            "tools/call" => handle_call_tool(proxy, session_id, server_id, &request, id),
            other => build_error_response(id, -32601, &format!("unknown method '{other}'")),
        };

        let mut rendered = serde_json::to_string(&response).unwrap_or_else(|_| {
            build_error_response(Value::Null, -32603, "failed to render response").to_string()
        });
        rendered.push('\n');
        output.write_all(rendered.as_bytes())?;
        output.flush()?;
    }
}

/// Handles one `tools/list` request.
fn handle_list_tools<S, D>(proxy: &mut BifrostProxy<S, D>, server_id: &ServerId, id: Value) -> Value
where
    S: RunechainStore,
    D: DownstreamClient,
{
    match proxy.list_tools(server_id) {
        Ok(outcome) => {
            let tools: Vec<Value> = outcome
                .tools
                .iter()
                .map(|tool| {
                    serde_json::json!({
                        "name": tool.name,
                        "description": tool.description,
                        "inputSchema": tool.input_schema,
                    })
                })
                .collect();
            build_response(id, serde_json::json!({ "tools": tools }))
        }
        Err(ProxyError::DriftHalted(changes)) => {
            build_error_response(id, -32001, &format!("tool catalogue drift halted listTools: {} change(s)", changes.len()))
        }
        Err(err) => build_error_response(id, -32000, &err.to_string()),
    }
}

/// Handles one `tools/call` request.
fn handle_call_tool<S, D>(
    proxy: &mut BifrostProxy<S, D>,
    session_id: &SessionId,
    server_id: &ServerId,
    request: &Value,
    id: Value,
) -> Value
where
    S: RunechainStore,
    D: DownstreamClient,
{
    let params = request.get("params").cloned().unwrap_or(Value::Null);
    let tool_name = params.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    let ctx = ToolCallContext {
        tool_name,
        arguments: value_to_argument_map(&arguments),
        session_id: session_id.clone(),
        agent_id: None,
        server_id: Some(server_id.clone()),
    };

    match proxy.call_tool(ctx) {
        Ok(outcome) => match outcome.downstream_result {
            Some(Ok(value)) => build_response(id, value),
            Some(Err(snapshot)) => build_error_response(id, -32002, &snapshot.0),
            None => build_error_response(id, -32003, &format!("blocked by policy: {}", outcome.rune.rationale)),
        },
        Err(err) => build_error_response(id, -32000, &err.to_string()),
    }
}

/// Converts a JSON-RPC `arguments` value into the map shape
/// [`ToolCallContext::arguments`] expects, treating anything that is not a
/// JSON object as no arguments at all.
fn value_to_argument_map(value: &Value) -> BTreeMap<String, Value> {
    value.as_object().cloned().map(|map| map.into_iter().collect()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
    #![allow(clippy::expect_used, reason = "Tests use expect for explicit failure messages.")]
    use super::*;
    use bifrost_core::BifrostProxy;
    use bifrost_core::DownstreamError;
    use bifrost_core::InMemoryRateLimiter;
    use bifrost_core::InMemoryRunechainStore;
    use bifrost_core::LiveBus;
    use bifrost_core::Runechain;
    use bifrost_core::WardEngine;
    use bifrost_core::interfaces::DownstreamClient;
    use bifrost_core::model::DriftConfig;
    use bifrost_core::model::ToolDescriptor;
    use std::io::Cursor;
    use std::sync::Arc;

    struct StubDownstream {
        tools: Vec<ToolDescriptor>,
    }

    impl DownstreamClient for StubDownstream {
        fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, DownstreamError> {
            Ok(self.tools.clone())
        }

        fn call_tool(&mut self, tool_name: &str, arguments: &Value) -> Result<Value, DownstreamError> {
            Ok(serde_json::json!({ "echoed": tool_name, "arguments": arguments }))
        }
    }

    fn build_proxy() -> BifrostProxy<InMemoryRunechainStore, StubDownstream> {
        let ward_engine = WardEngine::new(Vec::new(), bifrost_core::model::WardDecision::Pass).expect("ward engine");
        let runechain = Runechain::new(InMemoryRunechainStore::default());
        let downstream = StubDownstream { tools: vec![ToolDescriptor { name: "echo".to_string(), description: None, input_schema: None }] };
        BifrostProxy::new(
            ward_engine,
            runechain,
            Arc::new(InMemoryRateLimiter::new()),
            Vec::new(),
            Arc::new(LiveBus::new()),
            DriftConfig::default(),
            false,
            downstream,
        )
    }

    #[test]
    fn serves_a_tools_call_request_and_writes_one_response_line() {
        let mut proxy = build_proxy();
        let request = "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/call\",\"params\":{\"name\":\"echo\",\"arguments\":{\"x\":1}}}\n";
        let mut output = Vec::new();
        serve(&mut proxy, &ServerId::new("srv"), &SessionId::new("sess"), Cursor::new(request), &mut output).expect("serve");
        let rendered = String::from_utf8(output).expect("utf8");
        let response: Value = serde_json::from_str(rendered.trim()).expect("json");
        assert_eq!(response["result"]["echoed"], "echo");
    }

    #[test]
    fn serves_a_tools_list_request_on_first_call_with_no_changes() {
        let mut proxy = build_proxy();
        let request = "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n";
        let mut output = Vec::new();
        serve(&mut proxy, &ServerId::new("srv"), &SessionId::new("sess"), Cursor::new(request), &mut output).expect("serve");
        let rendered = String::from_utf8(output).expect("utf8");
        let response: Value = serde_json::from_str(rendered.trim()).expect("json");
        assert_eq!(response["result"]["tools"][0]["name"], "echo");
    }
}
