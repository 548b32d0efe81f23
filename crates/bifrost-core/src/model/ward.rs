// bifrost-core/src/model/ward.rs
// ============================================================================
// Module: Bifrost Ward Data Model
// Description: Ward declarations, conditions, call context, and evaluation
//              results.
// Purpose: Define the deterministic inputs and outputs of the ward engine.
// Dependencies: crate::identifiers, serde_json
// ============================================================================

//! ## Overview
//! A [`Ward`] is a single declarative rule evaluated against a
//! [`ToolCallContext`]. Evaluating a full ward set produces one
//! [`WardEvaluation`], never an error: a malformed ward is rejected at config
//! load time, not at evaluation time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::identifiers::AgentId;
use crate::identifiers::ServerId;
use crate::identifiers::SessionId;
use crate::identifiers::WardId;

// ============================================================================
// SECTION: Ward Decision & Severity
// ============================================================================

/// The three terminal decisions a ward evaluation may reach, ordered by
/// strictness: `Pass < Reshape < Halt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WardDecision {
    /// Forward the call unchanged.
    Pass,
    /// Forward the call with rewritten arguments.
    Reshape,
    /// Block the call entirely.
    Halt,
}

impl WardDecision {
    /// Returns the decision's priority for upgrade comparisons. Higher wins.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Pass => 0,
            Self::Reshape => 1,
            Self::Halt => 2,
        }
    }
}

impl Default for WardDecision {
    fn default() -> Self {
        Self::Pass
    }
}

/// Informational severity attached to a ward or drift change. Never affects
/// evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WardSeverity {
    /// Low severity.
    #[default]
    Low,
    /// Medium severity.
    Medium,
    /// High severity.
    High,
    /// Critical severity.
    Critical,
}

// ============================================================================
// SECTION: Ward Condition
// ============================================================================

/// An AND-conjunction of zero or more clauses. An empty condition always
/// matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WardCondition {
    /// Per-argument case-insensitive regex patterns. Every named field must
    /// be present in the call's arguments and match; a missing field fails
    /// the clause (fail-closed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_matches: Option<BTreeMap<String, String>>,
    /// A single case-insensitive regex evaluated against the canonical JSON
    /// rendering of all arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_contains_pattern: Option<String>,
    /// Boolean short-circuit. `Some(true)` always contributes a pass;
    /// `Some(false)` always contributes a fail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always: Option<bool>,
    /// Matches iff the rate-limit provider reports at least this many recent
    /// calls in the last 60 seconds for the effective counting key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_calls_per_minute: Option<u32>,
    /// Unrecognized keys, dispatched to registered condition plugins at
    /// evaluation time. An unrecognized key with no matching plugin fails
    /// the clause.
    #[serde(flatten)]
    pub plugin_conditions: BTreeMap<String, Value>,
}

impl WardCondition {
    /// Returns `true` when the condition has no clauses at all (always
    /// matches).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.argument_matches.is_none()
            && self.argument_contains_pattern.is_none()
            && self.always.is_none()
            && self.max_calls_per_minute.is_none()
            && self.plugin_conditions.is_empty()
    }
}

// ============================================================================
// SECTION: Ward Declaration
// ============================================================================

/// Sentinel reshape value that deletes the named argument instead of
/// replacing it.
pub const DELETE_SENTINEL: &str = "__DELETE__";

/// A single declarative policy rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ward {
    /// Unique, stable identifier.
    pub id: WardId,
    /// Human-readable description, not evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Glob pattern over the tool name (`*` and `?` wildcards).
    pub tool: String,
    /// Condition evaluated against the call context.
    #[serde(default)]
    pub when: WardCondition,
    /// Decision applied when the ward matches.
    pub action: WardDecision,
    /// Rationale surfaced when this ward wins arbitration.
    pub message: String,
    /// Informational severity.
    #[serde(default)]
    pub severity: WardSeverity,
    /// Argument overrides applied on `Reshape`; `__DELETE__` removes a key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reshape: Option<BTreeMap<String, Value>>,
}

// ============================================================================
// SECTION: Tool Call Context
// ============================================================================

/// The inputs to a single ward evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallContext {
    /// Name of the tool being called.
    pub tool_name: String,
    /// Arguments passed to the call.
    pub arguments: BTreeMap<String, Value>,
    /// Session the call belongs to.
    pub session_id: SessionId,
    /// Agent issuing the call, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    /// Downstream server the call targets, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<ServerId>,
}

// ============================================================================
// SECTION: Ward Evaluation
// ============================================================================

/// One step of the per-ward evaluation trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardChainStep {
    /// Ward evaluated.
    pub ward_id: WardId,
    /// Whether the ward's tool glob and condition both matched.
    pub matched: bool,
    /// The ward's declared action (informational regardless of match).
    pub decision: WardDecision,
    /// Human-readable explanation for this step's outcome.
    pub reason: String,
}

/// The result of evaluating a [`ToolCallContext`] against a ward set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardEvaluation {
    /// The winning decision after arbitration.
    pub decision: WardDecision,
    /// Ids of wards that matched, in declaration order.
    pub matched_wards: Vec<WardId>,
    /// One step per evaluated ward, in declaration order.
    pub ward_chain: Vec<WardChainStep>,
    /// Rationale for the winning decision.
    pub rationale: String,
    /// Reshaped arguments, present only when `decision == Reshape`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reshaped_arguments: Option<BTreeMap<String, Value>>,
    /// Wall-clock duration of the evaluation itself.
    pub evaluation_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
    #![allow(clippy::expect_used, reason = "Tests use expect for explicit failure messages.")]
    use super::*;

    #[test]
    fn decision_priority_matches_strictness_order() {
        assert!(WardDecision::Pass.priority() < WardDecision::Reshape.priority());
        assert!(WardDecision::Reshape.priority() < WardDecision::Halt.priority());
        assert!(WardDecision::Pass < WardDecision::Reshape);
        assert!(WardDecision::Reshape < WardDecision::Halt);
    }

    #[test]
    fn empty_condition_reports_empty() {
        assert!(WardCondition::default().is_empty());
    }

    #[test]
    fn decision_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&WardDecision::Halt).expect("serialize");
        assert_eq!(json, "\"HALT\"");
    }
}
