// bifrost-core/src/drift.rs
// ============================================================================
// Module: Bifrost Drift Detector
// Description: Canonical hashing and structural diffing of tool catalogues.
// Purpose: Detect and classify discrepancies between a stored baseline and
//          the downstream tool catalogue observed on a `listTools` call.
// Dependencies: crate::{hashing, model}
// ============================================================================

//! ## Overview
//! Drift detection is a pure, two-step pipeline: [`canonical_tools_hash`]
//! produces a single hash an unchanged catalogue reproduces exactly, and
//! [`diff_tool_catalogues`] explains *what* changed when the hash does not
//! match. Severity is assigned by policy, not by the caller: additions and
//! removals are `high`; an `inputSchema` change is `critical`; a
//! description-only change is `low`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::hashing::HashError;
use crate::hashing::hash_canonical_json;
use crate::model::DriftChange;
use crate::model::DriftChangeType;
use crate::model::ToolDescriptor;
use crate::model::WardSeverity;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while hashing a tool catalogue.
#[derive(Debug, Error)]
pub enum DriftError {
    /// Canonical hashing failed.
    #[error("drift detector hashing error: {0}")]
    Hashing(#[from] HashError),
}

// ============================================================================
// SECTION: Canonical Hash
// ============================================================================

/// Computes a canonical hash of a tool catalogue, stable under tool
/// reordering and key reordering within tool objects: tools are sorted by
/// `name` before hashing, and the hasher itself recursively sorts object
/// keys.
///
/// # Errors
///
/// Returns [`DriftError`] if canonicalization fails.
pub fn canonical_tools_hash(tools: &[ToolDescriptor]) -> Result<String, DriftError> {
    let mut sorted: Vec<&ToolDescriptor> = tools.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(hash_canonical_json(&sorted)?)
}

// ============================================================================
// SECTION: Structural Diff
// ============================================================================

/// Diffs `current` against `baseline` by tool name. Additions and removals
/// are reported first, then modifications, each in name order.
#[must_use]
pub fn diff_tool_catalogues(baseline: &[ToolDescriptor], current: &[ToolDescriptor]) -> Vec<DriftChange> {
    let baseline_by_name: BTreeMap<&str, &ToolDescriptor> =
        baseline.iter().map(|tool| (tool.name.as_str(), tool)).collect();
    let current_by_name: BTreeMap<&str, &ToolDescriptor> =
        current.iter().map(|tool| (tool.name.as_str(), tool)).collect();

    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut modified = Vec::new();

    for name in current_by_name.keys() {
        if !baseline_by_name.contains_key(name) {
            added.push(DriftChange {
                change_type: DriftChangeType::Added,
                tool_name: (*name).to_string(),
                severity: WardSeverity::High,
                details: "tool present in current catalogue but absent from baseline".to_string(),
            });
        }
    }

    for (name, _) in &baseline_by_name {
        if !current_by_name.contains_key(name) {
            removed.push(DriftChange {
                change_type: DriftChangeType::Removed,
                tool_name: (*name).to_string(),
                severity: WardSeverity::High,
                details: "tool present in baseline but absent from current catalogue".to_string(),
            });
        }
    }

    for (name, current_tool) in &current_by_name {
        let Some(baseline_tool) = baseline_by_name.get(name) else {
            continue;
        };
        if let Some(change) = diff_overlapping_tool(name, baseline_tool, current_tool) {
            modified.push(change);
        }
    }

    added.sort_by(|a, b| a.tool_name.cmp(&b.tool_name));
    removed.sort_by(|a, b| a.tool_name.cmp(&b.tool_name));
    modified.sort_by(|a, b| a.tool_name.cmp(&b.tool_name));

    let mut changes = Vec::with_capacity(added.len() + removed.len() + modified.len());
    changes.extend(added);
    changes.extend(removed);
    changes.extend(modified);
    changes
}

/// Diffs one tool present in both catalogues. An `inputSchema` change is
/// `critical`; absent that, a description-only change is `low`.
fn diff_overlapping_tool(name: &str, baseline: &ToolDescriptor, current: &ToolDescriptor) -> Option<DriftChange> {
    if baseline.input_schema != current.input_schema {
        return Some(DriftChange {
            change_type: DriftChangeType::Modified,
            tool_name: name.to_string(),
            severity: WardSeverity::Critical,
            details: "inputSchema changed".to_string(),
        });
    }
    if baseline.description != current.description {
        return Some(DriftChange {
            change_type: DriftChangeType::Modified,
            tool_name: name.to_string(),
            severity: WardSeverity::Low,
            details: "description changed".to_string(),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
    #![allow(clippy::expect_used, reason = "Tests use expect for explicit failure messages.")]
    use super::*;

    fn tool(name: &str, description: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: Some(description.to_string()),
            input_schema: None,
        }
    }

    #[test]
    fn canonical_hash_is_invariant_under_tool_reordering() {
        let a = vec![tool("a", "first"), tool("b", "second")];
        let b = vec![tool("b", "second"), tool("a", "first")];
        assert_eq!(canonical_tools_hash(&a).expect("hash"), canonical_tools_hash(&b).expect("hash"));
    }

    #[test]
    fn detects_added_tool_as_high_severity() {
        let baseline = vec![tool("list_files", "x"), tool("read_file", "y")];
        let current = vec![tool("list_files", "x"), tool("read_file", "y"), tool("send_report", "z")];
        let changes = diff_tool_catalogues(&baseline, &current);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, DriftChangeType::Added);
        assert_eq!(changes[0].tool_name, "send_report");
        assert_eq!(changes[0].severity, WardSeverity::High);
    }

    #[test]
    fn detects_removed_tool_as_high_severity() {
        let baseline = vec![tool("list_files", "x"), tool("read_file", "y")];
        let current = vec![tool("list_files", "x")];
        let changes = diff_tool_catalogues(&baseline, &current);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, DriftChangeType::Removed);
        assert_eq!(changes[0].tool_name, "read_file");
    }

    #[test]
    fn schema_change_is_critical_and_description_change_is_low() {
        let mut baseline_tool = tool("send_report", "sends a report");
        baseline_tool.input_schema = Some(serde_json::json!({"type": "object"}));
        let mut schema_changed = baseline_tool.clone();
        schema_changed.input_schema = Some(serde_json::json!({"type": "string"}));
        let description_changed = tool("send_report", "sends a report (updated)");

        let schema_changes = diff_tool_catalogues(&[baseline_tool.clone()], &[schema_changed]);
        assert_eq!(schema_changes[0].severity, WardSeverity::Critical);

        let description_changes = diff_tool_catalogues(&[tool("send_report", "sends a report")], &[description_changed]);
        assert_eq!(description_changes[0].severity, WardSeverity::Low);
    }

    #[test]
    fn identical_catalogues_produce_no_changes() {
        let tools = vec![tool("list_files", "x")];
        assert!(diff_tool_catalogues(&tools, &tools).is_empty());
    }
}
