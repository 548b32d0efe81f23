// bifrost-core/src/model/rune.rs
// ============================================================================
// Module: Bifrost Rune Data Model
// Description: Audit records, baselines, drift changes, and receipts.
// Purpose: Define the persisted and exported shapes of the runechain.
// Dependencies: crate::{identifiers, model::ward, model::tool, time}
// ============================================================================

//! ## Overview
//! A [`Rune`] is one immutable audit record for one tool call. The full,
//! ordered, hash-linked sequence of runes is the runechain; see
//! [`crate::runechain::Runechain`] for the inscription and verification
//! algorithm that produces and checks these records.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::ServerId;
use crate::identifiers::SessionId;
use crate::identifiers::WardId;
use crate::model::tool::ToolDescriptor;
use crate::model::ward::WardChainStep;
use crate::model::ward::WardDecision;
use crate::model::ward::WardSeverity;
use crate::time::Timestamp;

/// Sentinel `previous_hash` value for the first rune in a chain.
pub const GENESIS_HASH: &str = "GENESIS";

/// Maximum length of a redacted argument/response summary, in characters.
pub const SUMMARY_MAX_CHARS: usize = 200;

// ============================================================================
// SECTION: Rune
// ============================================================================

/// One immutable audit record for one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rune {
    /// 1-based monotonic sequence number, strictly increasing with no gaps.
    pub sequence: u64,
    /// UTC timestamp at inscription time.
    pub timestamp: Timestamp,
    /// Session the call belonged to.
    pub session_id: SessionId,
    /// Name of the called tool.
    pub tool_name: String,
    /// Hex SHA-256 of the JSON-serialized arguments.
    pub arguments_hash: String,
    /// Redacted arguments summary, truncated to
    /// [`SUMMARY_MAX_CHARS`] characters.
    pub arguments_summary: String,
    /// Winning ward decision for this call.
    pub decision: WardDecision,
    /// Ids of wards that matched, in evaluation order.
    pub matched_wards: Vec<WardId>,
    /// Full per-ward evaluation trace.
    pub ward_chain: Vec<WardChainStep>,
    /// Rationale for the decision.
    pub rationale: String,
    /// Redacted summary of the downstream response, absent for HALT calls
    /// that were never forwarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_summary: Option<String>,
    /// Downstream call duration in milliseconds, when a call was made.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Content hash of the previous rune, or `"GENESIS"` for the first.
    pub previous_hash: String,
    /// Hex SHA-256 of this rune's canonicalized payload, excluding the
    /// signature itself.
    pub content_hash: String,
    /// Whether this is the first rune in the chain.
    pub is_genesis: bool,
    /// Base64 Ed25519 signature over `content_hash`, absent when unsigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Optional advisory risk score, 0-100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<u8>,
    /// Optional advisory risk tier label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_tier: Option<String>,
    /// Optional advisory AI-assisted analysis text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_reasoning: Option<String>,
}

/// A canonicalizable projection of [`Rune`] used to compute `content_hash`.
/// Mirrors every field of [`Rune`] except `content_hash`, `signature`, and
/// the optional AI/risk metadata, per the specification's content-hash
/// invariant.
#[derive(Debug, Clone, Serialize)]
pub struct RuneContentPayload<'a> {
    /// See [`Rune::sequence`].
    pub sequence: u64,
    /// See [`Rune::timestamp`].
    pub timestamp: Timestamp,
    /// See [`Rune::session_id`].
    pub session_id: &'a SessionId,
    /// See [`Rune::tool_name`].
    pub tool_name: &'a str,
    /// See [`Rune::arguments_hash`].
    pub arguments_hash: &'a str,
    /// See [`Rune::arguments_summary`].
    pub arguments_summary: &'a str,
    /// See [`Rune::decision`].
    pub decision: WardDecision,
    /// See [`Rune::matched_wards`].
    pub matched_wards: &'a [WardId],
    /// See [`Rune::ward_chain`].
    pub ward_chain: &'a [WardChainStep],
    /// See [`Rune::rationale`].
    pub rationale: &'a str,
    /// See [`Rune::response_summary`].
    pub response_summary: &'a Option<String>,
    /// See [`Rune::duration_ms`].
    pub duration_ms: Option<u64>,
    /// See [`Rune::previous_hash`].
    pub previous_hash: &'a str,
    /// See [`Rune::is_genesis`].
    pub is_genesis: bool,
}

impl Rune {
    /// Projects this rune to the payload hashed to produce `content_hash`.
    #[must_use]
    pub fn content_payload(&self) -> RuneContentPayload<'_> {
        RuneContentPayload {
            sequence: self.sequence,
            timestamp: self.timestamp,
            session_id: &self.session_id,
            tool_name: &self.tool_name,
            arguments_hash: &self.arguments_hash,
            arguments_summary: &self.arguments_summary,
            decision: self.decision,
            matched_wards: &self.matched_wards,
            ward_chain: &self.ward_chain,
            rationale: &self.rationale,
            response_summary: &self.response_summary,
            duration_ms: self.duration_ms,
            previous_hash: &self.previous_hash,
            is_genesis: self.is_genesis,
        }
    }
}

// ============================================================================
// SECTION: Filters
// ============================================================================

/// Query filters accepted by [`crate::interfaces::RunechainStore::get_runes`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuneFilter {
    /// Restrict to a single session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Restrict to a single tool name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Restrict to a single decision class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<WardDecision>,
    /// Maximum number of runes returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Number of matching runes to skip, applied before `limit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

// ============================================================================
// SECTION: Chain Verification
// ============================================================================

/// Result of walking and verifying the entire runechain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerificationResult {
    /// Whether the entire chain verified without error.
    pub valid: bool,
    /// Sequence number at which verification failed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broken_at_sequence: Option<u64>,
    /// Human-readable reason for the failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broken_reason: Option<String>,
    /// Number of runes verified before the walk stopped (or the full chain).
    pub verified_runes: u64,
    /// Total runes in the chain.
    pub total_runes: u64,
    /// Number of distinct sessions observed.
    pub distinct_sessions: u64,
    /// Number of distinct tool names observed.
    pub distinct_tools: u64,
    /// Count of runes per decision class.
    pub pass_count: u64,
    /// Count of HALT runes.
    pub halt_count: u64,
    /// Count of RESHAPE runes.
    pub reshape_count: u64,
    /// Number of runes carrying a verified signature.
    pub signatures_verified: u64,
    /// Number of runes with no signature present.
    pub signatures_missing: u64,
    /// Timestamp of the first rune, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_timestamp: Option<Timestamp>,
    /// Timestamp of the last rune, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_timestamp: Option<Timestamp>,
    /// Self-provenance hash over the outcome and the tail content hash.
    pub verification_hash: String,
}

// ============================================================================
// SECTION: Baselines & Drift
// ============================================================================

/// Snapshot of a downstream tool catalogue for one server, used to detect
/// drift on subsequent `listTools` calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolBaseline {
    /// Downstream server this baseline belongs to.
    pub server_id: ServerId,
    /// Canonical hash of the tool catalogue.
    pub tools_hash: String,
    /// Serialized snapshot of the tool descriptors backing `tools_hash`.
    pub tools_snapshot: Vec<ToolDescriptor>,
    /// When this baseline was first recorded. Preserved across updates.
    pub first_seen: Timestamp,
    /// When this baseline was last confirmed unchanged or approved.
    pub last_verified: Timestamp,
}

/// A baseline awaiting operator approval, written whenever drift is
/// detected. Never overwrites the active baseline on its own.
pub type PendingBaseline = ToolBaseline;

/// The kind of structural change detected between a baseline and the
/// current tool catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftChangeType {
    /// A tool present in the current catalogue but absent from the baseline.
    Added,
    /// A tool present in the baseline but absent from the current
    /// catalogue.
    Removed,
    /// A tool present in both, but with a changed description or schema.
    Modified,
}

/// One structural difference between a baseline and the current catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftChange {
    /// Kind of change.
    #[serde(rename = "type")]
    pub change_type: DriftChangeType,
    /// Name of the affected tool.
    pub tool_name: String,
    /// Severity assigned by policy (see [`crate::drift`]).
    pub severity: WardSeverity,
    /// Human-readable detail, e.g. which field changed.
    pub details: String,
}

// ============================================================================
// SECTION: Signed Receipt
// ============================================================================

/// A minimal, self-contained proof of one rune's existence and content,
/// verifiable offline without access to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedReceipt {
    /// Receipt format version.
    pub version: u32,
    /// Subset of rune fields required to recompute and verify the content
    /// hash.
    pub rune: ReceiptRune,
    /// Position of this rune within the chain at export time.
    pub chain_position: ChainPosition,
    /// Base64 Ed25519 signature over the rune's `content_hash`.
    pub signature: String,
    /// Base64 Ed25519 public key the signature verifies against.
    pub public_key: String,
}

/// The rune subset bundled into a [`SignedReceipt`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRune {
    /// See [`Rune::sequence`].
    pub sequence: u64,
    /// See [`Rune::timestamp`].
    pub timestamp: Timestamp,
    /// See [`Rune::tool_name`].
    pub tool_name: String,
    /// See [`Rune::decision`].
    pub decision: WardDecision,
    /// See [`Rune::rationale`].
    pub rationale: String,
    /// See [`Rune::matched_wards`].
    pub matched_wards: Vec<WardId>,
    /// See [`Rune::arguments_hash`].
    pub arguments_hash: String,
    /// See [`Rune::content_hash`].
    pub content_hash: String,
    /// See [`Rune::previous_hash`].
    pub previous_hash: String,
    /// See [`Rune::is_genesis`].
    pub is_genesis: bool,
}

/// Chain-length context bundled into a [`SignedReceipt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainPosition {
    /// Total number of runes in the chain at export time.
    pub chain_length: u64,
}
