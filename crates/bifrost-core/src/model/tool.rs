// bifrost-core/src/model/tool.rs
// ============================================================================
// Module: Bifrost Tool Descriptor
// Description: Downstream tool catalogue entries used by the drift detector.
// Purpose: Represent one entry of a `listTools` response, transport-agnostic.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! The wire framing of `listTools` is abstracted behind
//! [`crate::interfaces::DownstreamClient`]; this type is the normalized shape
//! the drift detector and baseline store operate on regardless of transport.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// One entry of a downstream tool catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within a catalogue.
    pub name: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema describing accepted arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}
