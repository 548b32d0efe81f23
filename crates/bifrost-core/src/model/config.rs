// bifrost-core/src/model/config.rs
// ============================================================================
// Module: Bifrost Config Model
// Description: Immutable, validated configuration value objects.
// Purpose: Represent a fully resolved Bifrost configuration after `extends`
//          prepending and environment-variable interpolation.
// Dependencies: crate::{identifiers, model::ward}
// ============================================================================

//! ## Overview
//! `BifrostConfig` is read-only after load. Parsing, `extends` resolution,
//! environment interpolation, and validation are performed by
//! `bifrost-config`, which constructs this type only once it is already
//! known to satisfy every invariant in the specification's validation rules.

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::Realm;
use crate::model::ward::Ward;
use crate::model::ward::WardDecision;
use crate::model::ward::WardSeverity;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// The action and severity applied when no ward matches a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    /// Action applied when no ward matches.
    #[serde(default = "Defaults::default_action")]
    pub action: WardDecision,
    /// Severity applied when no ward matches.
    #[serde(default)]
    pub severity: WardSeverity,
}

impl Defaults {
    /// Default action used when no wards match: `PASS`.
    #[must_use]
    pub const fn default_action() -> WardDecision {
        WardDecision::Pass
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            action: Self::default_action(),
            severity: WardSeverity::default(),
        }
    }
}

// ============================================================================
// SECTION: Drift Configuration
// ============================================================================

/// What the proxy does when drift is detected on a `listTools` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftAction {
    /// Publish a drift alert and log it, but continue.
    Warn,
    /// Log only, no live-bus alert.
    Log,
    /// Fail the `listTools` request with a structured error.
    #[default]
    Halt,
}

/// Drift-handling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DriftConfig {
    /// Action taken when drift is detected.
    #[serde(default)]
    pub action: DriftAction,
    /// Optional message appended to drift alerts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// SECTION: Sinks & Storage
// ============================================================================

/// Decision classes a sink may be filtered to.
pub type SinkEventFilter = Vec<WardDecision>;

/// One declared sink in the fan-out configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkDeclaration {
    /// Sink instance name, used in diagnostics.
    pub name: String,
    /// Sink type: `stdout`, `webhook`, or `otlp`.
    #[serde(rename = "type")]
    pub sink_type: String,
    /// Decision classes this sink receives; empty means all.
    #[serde(default)]
    pub events: SinkEventFilter,
    /// Webhook destination URL. Required when `sink_type == "webhook"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// OTLP span-exporter endpoint. Required when `sink_type == "otlp"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Storage adapter selection for the runechain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDeclaration {
    /// Adapter name: `memory` or `sqlite`.
    pub adapter: String,
    /// Filesystem path to the durable store, when `adapter == "sqlite"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Default for StorageDeclaration {
    fn default() -> Self {
        Self {
            adapter: "memory".to_string(),
            path: None,
        }
    }
}

// ============================================================================
// SECTION: AI Analysis
// ============================================================================

/// Advisory risk-analysis knobs. The analysis itself is an external
/// collaborator; only its activation contract lives here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AiAnalysisConfig {
    /// Whether advisory analysis is enabled at all.
    #[serde(default)]
    pub enabled: bool,
    /// Minimum risk score (0-100) that triggers analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u8>,
    /// Advisory token budget for the analysis call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<u32>,
}

// ============================================================================
// SECTION: Bifrost Config
// ============================================================================

/// A fully resolved, validated Bifrost configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BifrostConfig {
    /// Config schema version, e.g. `"1"`.
    pub version: String,
    /// Named policy scope tag.
    pub realm: Realm,
    /// Paths that were prepended to produce this resolved config, retained
    /// for provenance; resolution has already happened by the time this
    /// type exists.
    #[serde(default)]
    pub extends: Vec<String>,
    /// Ordered ward list. Declaration order is preserved and drives
    /// evaluation order, but never priority arbitration.
    #[serde(default)]
    pub wards: Vec<Ward>,
    /// Fallback action/severity when no ward matches.
    #[serde(default)]
    pub defaults: Defaults,
    /// Declared audit sinks.
    #[serde(default)]
    pub sinks: Vec<SinkDeclaration>,
    /// Runechain storage adapter selection.
    #[serde(default)]
    pub storage: StorageDeclaration,
    /// Drift-handling configuration.
    #[serde(default)]
    pub drift: DriftConfig,
    /// Advisory AI-analysis configuration.
    #[serde(default)]
    pub ai_analysis: AiAnalysisConfig,
}
