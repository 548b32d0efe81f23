// bifrost-contract/src/downstream.rs
// ============================================================================
// Module: Stdio Downstream Client
// Description: A `DownstreamClient` implementation that speaks line-
//              delimited JSON-RPC over a child process's piped stdio.
// Purpose: Connect the Bifrost proxy to a real tool provider launched as a
//          subprocess.
// Dependencies: bifrost_core::interfaces, std::process
// ============================================================================

//! ## Overview
//! [`StdioDownstreamClient`] owns one child process for its entire
//! lifetime, matching the specification's "one downstream client session"
//! model: requests are pipelined serially over the same stdin/stdout pair,
//! each tagged with a monotonically increasing id so the response reader
//! can skip anything out of order. The child's stderr is left inherited so
//! its own diagnostics reach the operator's terminal unmodified.

use std::io::BufRead as _;
use std::io::BufReader;
use std::io::Write as _;
use std::process::Child;
use std::process::ChildStdin;
use std::process::ChildStdout;
use std::process::Command;
use std::process::Stdio;

use bifrost_core::interfaces::DownstreamClient;
use bifrost_core::interfaces::DownstreamError;
use bifrost_core::model::ToolDescriptor;
use serde_json::Value;

use crate::jsonrpc::build_request;
use crate::jsonrpc::numeric_id;

/// A downstream session backed by a spawned child process's stdio.
pub struct StdioDownstreamClient {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl StdioDownstreamClient {
    /// Spawns `command` with `args`, piping its stdin/stdout and leaving
    /// stderr inherited.
    ///
    /// # Errors
    ///
    /// Returns [`DownstreamError::Transport`] if the process cannot be
    /// spawned or its stdio handles are unavailable.
    pub fn spawn(command: &str, args: &[String]) -> Result<Self, DownstreamError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| DownstreamError::Transport(err.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DownstreamError::Transport("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownstreamError::Transport("child stdout unavailable".to_string()))?;
        Ok(Self { child, stdin, reader: BufReader::new(stdout), next_id: 1 })
    }

    /// Sends one JSON-RPC request and waits for its matching response line,
    /// skipping any line whose `id` does not match (e.g. an unsolicited
    /// notification).
    fn call(&mut self, method: &str, params: Value) -> Result<Value, DownstreamError> {
        let id = self.next_id;
        self.next_id += 1;

        let mut line = serde_json::to_string(&build_request(id, method, params))
            .map_err(|err| DownstreamError::Transport(err.to_string()))?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).map_err(|err| DownstreamError::Transport(err.to_string()))?;
        self.stdin.flush().map_err(|err| DownstreamError::Transport(err.to_string()))?;

        let mut buffer = String::new();
        loop {
            buffer.clear();
            let bytes_read =
                self.reader.read_line(&mut buffer).map_err(|err| DownstreamError::Transport(err.to_string()))?;
            if bytes_read == 0 {
                return Err(DownstreamError::Transport("downstream closed its stdout".to_string()));
            }
            let trimmed = buffer.trim();
            if trimmed.is_empty() {
                continue;
            }
            let parsed: Value =
                serde_json::from_str(trimmed).map_err(|err| DownstreamError::Transport(err.to_string()))?;
            if numeric_id(&parsed) != Some(id) {
                continue;
            }
            if let Some(error) = parsed.get("error") {
                let message = error.get("message").and_then(Value::as_str).unwrap_or("downstream reported an error");
                return Err(DownstreamError::ToolError(message.to_string()));
            }
            return Ok(parsed.get("result").cloned().unwrap_or(Value::Null));
        }
    }
}

impl Drop for StdioDownstreamClient {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

impl DownstreamClient for StdioDownstreamClient {
    fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, DownstreamError> {
        let result = self.call("tools/list", serde_json::json!({}))?;
        let tools = result.get("tools").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(tools.iter().map(tool_descriptor_from_wire).collect())
    }

    fn call_tool(&mut self, tool_name: &str, arguments: &Value) -> Result<Value, DownstreamError> {
        self.call("tools/call", serde_json::json!({ "name": tool_name, "arguments": arguments }))
    }
}

/// Normalizes one wire-format tool entry into a [`ToolDescriptor`],
/// accepting both the MCP `inputSchema` key and a `input_schema` fallback.
fn tool_descriptor_from_wire(tool: &Value) -> ToolDescriptor {
    let name = tool.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
    let description = tool.get("description").and_then(Value::as_str).map(str::to_string);
    let input_schema = tool.get("inputSchema").or_else(|| tool.get("input_schema")).cloned();
    ToolDescriptor { name, description, input_schema }
}
