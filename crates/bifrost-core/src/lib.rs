// bifrost-core/src/lib.rs
// ============================================================================
// Module: Bifrost Core Library
// Description: Public API surface for the Bifrost Gate core.
// Purpose: Expose data model, interfaces, and runtime engines.
// Dependencies: crate::{model, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Bifrost core provides deterministic policy evaluation, tamper-evident
//! audit inscription, and tool-catalogue drift detection for an interception
//! gateway sitting between an agent and a downstream tool provider. It is
//! backend-agnostic and integrates through explicit interfaces rather than
//! embedding into any particular transport.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod drift;
pub mod hashing;
pub mod identifiers;
pub mod interfaces;
pub mod live_bus;
pub mod model;
pub mod rate_limit;
pub mod risk;
pub mod runechain;
pub mod runtime;
pub mod time;
pub mod ward_engine;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use drift::DriftError;
pub use drift::canonical_tools_hash;
pub use drift::diff_tool_catalogues;
pub use hashing::HashError;
pub use hashing::canonical_json_bytes;
pub use hashing::hash_canonical_json;
pub use hashing::sha256_hex;
pub use identifiers::AgentId;
pub use identifiers::Realm;
pub use identifiers::ServerId;
pub use identifiers::SessionId;
pub use identifiers::ToolName;
pub use identifiers::WardId;
pub use interfaces::ConditionPlugin;
pub use interfaces::ConditionPluginError;
pub use interfaces::DownstreamClient;
pub use interfaces::DownstreamError;
pub use interfaces::RateLimitProvider;
pub use interfaces::RunechainStore;
pub use interfaces::Sink;
pub use interfaces::SinkError;
pub use interfaces::StoreError;
pub use live_bus::LiveBus;
pub use live_bus::LiveEvent;
pub use model::*;
pub use rate_limit::InMemoryRateLimiter;
pub use risk::RiskAssessment;
pub use risk::assess as assess_risk;
pub use runechain::Runechain;
pub use runechain::RunechainError;
pub use runtime::BifrostProxy;
pub use runtime::CallOutcome;
pub use runtime::InMemoryRunechainStore;
pub use runtime::ListToolsOutcome;
pub use runtime::ProxyError;
pub use time::Timestamp;
pub use ward_engine::WardConfigError;
pub use ward_engine::WardEngine;
