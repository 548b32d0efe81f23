// bifrost-core/src/interfaces.rs
// ============================================================================
// Module: Bifrost Interfaces
// Description: Backend-agnostic interfaces for storage, dispatch, sinks, and
//              rate limiting.
// Purpose: Define the contract surfaces the proxy integrates through.
// Dependencies: crate::{identifiers, model}
// ============================================================================

//! ## Overview
//! Interfaces define how Bifrost integrates with external systems without
//! embedding backend-specific details. Implementations must be deterministic
//! and fail closed on missing or invalid data. Every trait here is
//! synchronous: the hot path (`record -> evaluate -> decide`) never
//! suspends, and I/O-bound implementations are expected to perform their own
//! blocking calls, bridged to async transports by the caller where needed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::identifiers::ServerId;
use crate::identifiers::SessionId;
use crate::model::ChainVerificationResult;
use crate::model::PendingBaseline;
use crate::model::Rune;
use crate::model::RuneFilter;
use crate::model::SignedReceipt;
use crate::model::ToolBaseline;
use crate::model::ToolCallContext;
use crate::model::WardEvaluation;
use crate::risk::RiskAssessment;

// ============================================================================
// SECTION: Runechain Store
// ============================================================================

/// Errors raised by a [`RunechainStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("runechain store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails an integrity check.
    #[error("runechain store corruption: {0}")]
    Corrupt(String),
    /// Store schema version is incompatible.
    #[error("runechain store version mismatch: {0}")]
    VersionMismatch(String),
    /// The requested update is invalid (e.g. updating a non-tail rune).
    #[error("runechain store invalid operation: {0}")]
    Invalid(String),
    /// Store reported a generic error.
    #[error("runechain store error: {0}")]
    Store(String),
}

/// The storage adapter port: append/query/verify/baseline/receipt
/// operations. Implemented by [`crate::runtime::InMemoryRunechainStore`] and
/// `bifrost-store-sqlite::SqliteRunechainStore`.
pub trait RunechainStore: Send + Sync {
    /// Appends a new rune built from `ctx`, `eval`, and the optional
    /// downstream response. `risk` carries the pure, cheap advisory
    /// assessment computed by [`crate::risk::assess`]; `None` when the
    /// caller opts out of attaching risk metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the row cannot be persisted.
    fn inscribe(
        &self,
        ctx: &ToolCallContext,
        eval: &WardEvaluation,
        response_summary: Option<String>,
        duration_ms: Option<u64>,
        risk: Option<RiskAssessment>,
    ) -> Result<Rune, StoreError>;

    /// Updates the tail rune's `response_summary`/`duration_ms`, recomputing
    /// `content_hash` and `signature`. Returns `Ok(None)` if the chain is
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if any later rune exists.
    fn update_last_response(
        &self,
        response_summary: Option<String>,
        duration_ms: Option<u64>,
    ) -> Result<Option<Rune>, StoreError>;

    /// Walks the chain and verifies linkage, content hashes, and signatures.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only for I/O failures; a broken chain is a
    /// successful call with `valid = false`.
    fn verify_chain(&self) -> Result<ChainVerificationResult, StoreError>;

    /// Exports an offline-verifiable receipt for the rune at `sequence`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn export_receipt(&self, sequence: u64) -> Result<Option<SignedReceipt>, StoreError>;

    /// Returns runes matching `filter`, newest-first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_runes(&self, filter: &RuneFilter) -> Result<Vec<Rune>, StoreError>;

    /// Returns the rune at `sequence`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_rune_by_sequence(&self, sequence: u64) -> Result<Option<Rune>, StoreError>;

    /// Returns the last verification outcome's summary statistics without
    /// re-walking the chain, when cheaply available; implementations may
    /// simply delegate to [`RunechainStore::verify_chain`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_chain_stats(&self) -> Result<ChainVerificationResult, StoreError>;

    /// Returns the total number of inscribed runes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_rune_count(&self) -> Result<u64, StoreError>;

    /// Returns the sequence number of the last inscribed rune, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_last_sequence(&self) -> Result<Option<u64>, StoreError>;

    /// Counts runes newer than `now - window_ms` for `session`, optionally
    /// restricted to `tool` (pass `"*"` for all tools).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_recent_call_count(
        &self,
        session: &SessionId,
        tool: &str,
        window_ms: u64,
    ) -> Result<u64, StoreError>;

    /// Returns the active baseline for `server_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_baseline(&self, server_id: &ServerId) -> Result<Option<ToolBaseline>, StoreError>;

    /// Upserts the active baseline for `server_id`, preserving `first_seen`
    /// if a baseline already exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn set_baseline(&self, baseline: ToolBaseline) -> Result<(), StoreError>;

    /// Clears the active baseline for `server_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn clear_baseline(&self, server_id: &ServerId) -> Result<(), StoreError>;

    /// Clears every active baseline.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn clear_all_baselines(&self) -> Result<(), StoreError>;

    /// Returns every active baseline.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_all_baselines(&self) -> Result<Vec<ToolBaseline>, StoreError>;

    /// Replaces the pending baseline for `server_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn set_pending_baseline(&self, baseline: PendingBaseline) -> Result<(), StoreError>;

    /// Returns the pending baseline for `server_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_pending_baseline(
        &self,
        server_id: &ServerId,
    ) -> Result<Option<PendingBaseline>, StoreError>;

    /// Promotes the pending baseline for `server_id` to the active
    /// baseline, returning `true` if a pending baseline existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn approve_pending(&self, server_id: &ServerId) -> Result<bool, StoreError>;

    /// Returns the base64 Ed25519 public key used to sign runes, if a
    /// signing key is loaded.
    fn get_public_key(&self) -> Option<String>;
}

// ============================================================================
// SECTION: Rate Limit Provider
// ============================================================================

/// A pluggable source of "how many calls has this key made recently"
/// counts, queried synchronously by the ward engine.
pub trait RateLimitProvider: Send + Sync {
    /// Records one call for `(session, tool)` at the current instant.
    fn record(&self, session: &SessionId, tool: &str);

    /// Returns the number of calls recorded for `(session, tool)` within
    /// the last `window_ms` milliseconds.
    fn count(&self, session: &SessionId, tool: &str, window_ms: u64) -> u64;
}

// ============================================================================
// SECTION: Condition Plugin
// ============================================================================

/// Errors raised by a [`ConditionPlugin`].
#[derive(Debug, Error)]
pub enum ConditionPluginError {
    /// The plugin reported an internal error; treated as a clause failure.
    #[error("condition plugin error: {0}")]
    Evaluation(String),
}

/// A capability that resolves ward-condition keys the engine does not
/// natively understand. Registered by name at config-load time.
pub trait ConditionPlugin: Send + Sync {
    /// The condition key this plugin handles, e.g. `"source_ip_in_cidr"`.
    fn key(&self) -> &str;

    /// Evaluates the clause's configured value against the call context.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionPluginError`] when evaluation fails; callers
    /// treat this identically to a failed clause.
    fn evaluate(&self, value: &Value, ctx: &ToolCallContext) -> Result<bool, ConditionPluginError>;
}

// ============================================================================
// SECTION: Sink
// ============================================================================

/// Errors raised by a [`Sink`].
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink's transport reported an error.
    #[error("sink error: {0}")]
    Emit(String),
}

/// A fire-and-forget audit destination. Emission failures are absorbed by
/// the caller and never propagated to the agent.
pub trait Sink: Send + Sync {
    /// Stable name used in diagnostics.
    fn name(&self) -> &str;

    /// Emits one rune to the sink.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] on transport failure.
    fn emit(&self, rune: &Rune) -> Result<(), SinkError>;

    /// Flushes any buffered output. Default is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] on transport failure.
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Releases any held resources. Default is a no-op.
    fn close(&self) {}
}

// ============================================================================
// SECTION: Downstream Client
// ============================================================================

/// Errors raised by a [`DownstreamClient`].
#[derive(Debug, Error)]
pub enum DownstreamError {
    /// The transport failed to deliver or receive a message.
    #[error("downstream transport error: {0}")]
    Transport(String),
    /// The downstream provider returned a protocol-level error response.
    #[error("downstream tool error: {0}")]
    ToolError(String),
}

/// The abstract downstream/upstream protocol port. Concrete framing (e.g. a
/// JSON-RPC-over-pipe child process session) is provided by `bifrost-contract`
/// and `bifrost-gateway`.
pub trait DownstreamClient: Send {
    /// Requests the downstream tool catalogue.
    ///
    /// # Errors
    ///
    /// Returns [`DownstreamError`] on transport or protocol failure.
    fn list_tools(&mut self) -> Result<Vec<crate::model::ToolDescriptor>, DownstreamError>;

    /// Invokes `tool_name` with `arguments` and returns the raw result
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns [`DownstreamError`] on transport or protocol failure.
    fn call_tool(&mut self, tool_name: &str, arguments: &Value) -> Result<Value, DownstreamError>;
}
