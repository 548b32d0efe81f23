// bifrost-core/src/ward_engine.rs
// ============================================================================
// Module: Bifrost Ward Engine
// Description: Deterministic policy evaluation over a declarative ward set.
// Purpose: Turn a `ToolCallContext` into a `WardEvaluation` with priority
//          arbitration, regex conditions, and argument reshaping.
// Dependencies: crate::{interfaces, model}, regex, fancy-regex
// ============================================================================

//! ## Overview
//! The engine is pure with respect to its configured wards: the only
//! observable input besides the call context is the registered rate-limit
//! provider and condition plugins. Evaluation never fails; a malformed ward
//! is rejected at construction time by [`WardEngine::new`], which is the only
//! place a [`WardConfigError`] can occur.
//!
//! Tool-name globs are anchored literal/wildcard patterns and are compiled
//! with `regex`. `argument_matches` and `argument_contains_pattern` are
//! operator-authored and may rely on lookaround (e.g. a negative lookahead
//! excluding an internal hostname suffix), so those are compiled with
//! `fancy-regex` instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use fancy_regex::Regex as ConditionRegex;
use regex::Regex;
use regex::RegexBuilder;
use serde_json::Value;
use thiserror::Error;

use crate::interfaces::ConditionPlugin;
use crate::interfaces::RateLimitProvider;
use crate::model::Ward;
use crate::model::WardChainStep;
use crate::model::WardCondition;
use crate::model::WardDecision;
use crate::model::WardEvaluation;
use crate::model::ward::DELETE_SENTINEL;

/// Window over which `max_calls_per_minute` is evaluated, in milliseconds.
const RATE_LIMIT_WINDOW_MS: u64 = 60_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while compiling a ward set into an engine.
#[derive(Debug, Error)]
pub enum WardConfigError {
    /// A ward's `tool` glob could not be compiled into a regex.
    #[error("ward '{ward_id}': invalid tool glob '{pattern}': {source}")]
    InvalidToolGlob {
        /// The offending ward's id.
        ward_id: String,
        /// The glob pattern that failed to compile.
        pattern: String,
        /// Underlying regex compilation error.
        #[source]
        source: regex::Error,
    },
    /// A ward's `argument_matches` or `argument_contains_pattern` regex
    /// could not be compiled.
    #[error("ward '{ward_id}': invalid condition pattern '{pattern}': {source}")]
    InvalidConditionPattern {
        /// The offending ward's id.
        ward_id: String,
        /// The pattern that failed to compile.
        pattern: String,
        /// Underlying regex compilation error.
        #[source]
        source: fancy_regex::Error,
    },
    /// Two wards declared the same id.
    #[error("duplicate ward id: {0}")]
    DuplicateWardId(String),
}

// ============================================================================
// SECTION: Compiled Ward
// ============================================================================

/// A ward with its glob and regex conditions pre-compiled at load time.
struct CompiledWard {
    /// Source declaration, retained for message/reshape/severity.
    ward: Ward,
    /// Tool-name glob, compiled to a fully anchored, case-insensitive regex.
    tool_pattern: Regex,
    /// Compiled `argument_matches` patterns, keyed by argument name.
    argument_matches: BTreeMap<String, ConditionRegex>,
    /// Compiled `argument_contains_pattern`, if declared.
    argument_contains: Option<ConditionRegex>,
}

// ============================================================================
// SECTION: Ward Engine
// ============================================================================

/// A stateless evaluator over a fixed, pre-compiled ward set.
pub struct WardEngine {
    /// Compiled wards, in declaration order.
    wards: Vec<CompiledWard>,
    /// Action applied when no ward matches.
    default_action: WardDecision,
    /// Rate-limit provider consulted by `max_calls_per_minute` clauses.
    rate_limiter: Option<Arc<dyn RateLimitProvider>>,
    /// Condition plugins, keyed by the condition key they handle.
    plugins: BTreeMap<String, Arc<dyn ConditionPlugin>>,
}

impl WardEngine {
    /// Compiles `wards` into an engine that applies `default_action` when
    /// nothing matches.
    ///
    /// # Errors
    ///
    /// Returns [`WardConfigError`] if any ward declares a duplicate id or an
    /// invalid glob/regex pattern.
    pub fn new(wards: Vec<Ward>, default_action: WardDecision) -> Result<Self, WardConfigError> {
        let mut seen_ids = std::collections::BTreeSet::new();
        let mut compiled = Vec::with_capacity(wards.len());
        for ward in wards {
            if !seen_ids.insert(ward.id.as_str().to_string()) {
                return Err(WardConfigError::DuplicateWardId(ward.id.as_str().to_string()));
            }
            compiled.push(compile_ward(ward)?);
        }
        Ok(Self {
            wards: compiled,
            default_action,
            rate_limiter: None,
            plugins: BTreeMap::new(),
        })
    }

    /// Registers the rate-limit provider consulted by `max_calls_per_minute`
    /// clauses. Absent a provider, such clauses never match.
    pub fn with_rate_limiter(mut self, provider: Arc<dyn RateLimitProvider>) -> Self {
        self.rate_limiter = Some(provider);
        self
    }

    /// Registers a condition plugin, keyed by [`ConditionPlugin::key`].
    pub fn with_plugin(mut self, plugin: Arc<dyn ConditionPlugin>) -> Self {
        self.plugins.insert(plugin.key().to_string(), plugin);
        self
    }

    /// Evaluates `ctx` against the configured ward set.
    ///
    /// Total: this call never fails. Regex or plugin errors at this point
    /// would be a programming error, since malformed wards are rejected by
    /// [`WardEngine::new`].
    #[must_use]
    pub fn evaluate(&self, ctx: &crate::model::ToolCallContext) -> WardEvaluation {
        let started = Instant::now();
        let mut decision = self.default_action;
        let mut rationale = "No wards matched; applying default action.".to_string();
        let mut matched_wards = Vec::new();
        let mut ward_chain = Vec::with_capacity(self.wards.len());
        let mut reshaped_arguments = None;

        for compiled in &self.wards {
            if !compiled.tool_pattern.is_match(&ctx.tool_name) {
                ward_chain.push(WardChainStep {
                    ward_id: compiled.ward.id.clone(),
                    matched: false,
                    decision: compiled.ward.action,
                    reason: "tool pattern did not apply".to_string(),
                });
                continue;
            }

            if !self.condition_matches(compiled, ctx) {
                ward_chain.push(WardChainStep {
                    ward_id: compiled.ward.id.clone(),
                    matched: false,
                    decision: compiled.ward.action,
                    reason: "condition did not match".to_string(),
                });
                continue;
            }

            ward_chain.push(WardChainStep {
                ward_id: compiled.ward.id.clone(),
                matched: true,
                decision: compiled.ward.action,
                reason: compiled.ward.message.clone(),
            });
            matched_wards.push(compiled.ward.id.clone());

            if compiled.ward.action.priority() > decision.priority() {
                decision = compiled.ward.action;
                rationale = compiled.ward.message.clone();
                if decision == WardDecision::Reshape {
                    reshaped_arguments = Some(apply_reshape(compiled, &ctx.arguments));
                }
            }
        }

        if !matched_wards.is_empty() && decision == WardDecision::Pass {
            rationale = format!("{} ward(s) matched with PASS decision.", matched_wards.len());
        }

        let evaluation_duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        WardEvaluation {
            decision,
            matched_wards,
            ward_chain,
            rationale,
            reshaped_arguments,
            evaluation_duration_ms,
        }
    }

    /// Evaluates a compiled ward's `when` clauses with AND semantics.
    fn condition_matches(&self, compiled: &CompiledWard, ctx: &crate::model::ToolCallContext) -> bool {
        let when = &compiled.ward.when;

        if let Some(always) = when.always {
            if !always {
                return false;
            }
        }

        if let Some(patterns) = &when.argument_matches {
            for name in patterns.keys() {
                let Some(value) = ctx.arguments.get(name) else {
                    return false;
                };
                let Some(pattern) = compiled.argument_matches.get(name) else {
                    return false;
                };
                let text = value_to_match_text(value);
                if !pattern.is_match(&text).unwrap_or(false) {
                    return false;
                }
            }
        }

        if let Some(pattern) = &compiled.argument_contains {
            let serialized = serde_json::to_string(&ctx.arguments).unwrap_or_default();
            if !pattern.is_match(&serialized).unwrap_or(false) {
                return false;
            }
        }

        if let Some(threshold) = when.max_calls_per_minute {
            let Some(provider) = &self.rate_limiter else {
                return false;
            };
            let counting_key = if compiled.ward.tool == "*" { "*" } else { ctx.tool_name.as_str() };
            let count = provider.count(&ctx.session_id, counting_key, RATE_LIMIT_WINDOW_MS);
            if count < u64::from(threshold) {
                return false;
            }
        }

        for (key, value) in &when.plugin_conditions {
            let Some(plugin) = self.plugins.get(key) else {
                return false;
            };
            match plugin.evaluate(value, ctx) {
                Ok(true) => {}
                Ok(false) | Err(_) => return false,
            }
        }

        true
    }
}

// ============================================================================
// SECTION: Compilation Helpers
// ============================================================================

/// Compiles a single declared ward, pre-building its glob and regexes.
fn compile_ward(ward: Ward) -> Result<CompiledWard, WardConfigError> {
    let tool_pattern = compile_tool_glob(&ward.id, &ward.tool)?;

    let mut argument_matches = BTreeMap::new();
    if let Some(patterns) = &ward.when.argument_matches {
        for (name, pattern) in patterns {
            let compiled = compile_condition_pattern(&ward.id, pattern)?;
            argument_matches.insert(name.clone(), compiled);
        }
    }

    let argument_contains = match &ward.when.argument_contains_pattern {
        Some(pattern) => Some(compile_condition_pattern(&ward.id, pattern)?),
        None => None,
    };

    Ok(CompiledWard {
        ward,
        tool_pattern,
        argument_matches,
        argument_contains,
    })
}

/// Compiles an `argument_matches` / `argument_contains_pattern` regex,
/// case-insensitively. Uses `fancy-regex` rather than `regex` so operators
/// can write lookaround assertions (e.g. excluding an internal hostname
/// suffix with a negative lookahead).
fn compile_condition_pattern(ward_id: &crate::identifiers::WardId, pattern: &str) -> Result<ConditionRegex, WardConfigError> {
    ConditionRegex::new(&format!("(?i){pattern}")).map_err(|source| WardConfigError::InvalidConditionPattern {
        ward_id: ward_id.as_str().to_string(),
        pattern: pattern.to_string(),
        source,
    })
}

/// Compiles a `*`/`?` glob into a fully anchored, case-insensitive regex.
fn compile_tool_glob(ward_id: &crate::identifiers::WardId, glob: &str) -> Result<Regex, WardConfigError> {
    let mut pattern = String::with_capacity(glob.len() + 2);
    pattern.push('^');
    for ch in glob.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');

    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| WardConfigError::InvalidToolGlob {
            ward_id: ward_id.as_str().to_string(),
            pattern: glob.to_string(),
            source,
        })
}

/// Renders a JSON value to the text tested by an `argument_matches` pattern.
fn value_to_match_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Shallow-merges `ward.reshape` over `arguments`, honoring the
/// `__DELETE__` sentinel by removing the key instead of replacing it.
fn apply_reshape(compiled: &CompiledWard, arguments: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    let mut reshaped = arguments.clone();
    if let Some(overrides) = &compiled.ward.reshape {
        for (key, value) in overrides {
            if matches!(value, Value::String(text) if text == DELETE_SENTINEL) {
                reshaped.remove(key);
            } else {
                reshaped.insert(key.clone(), value.clone());
            }
        }
    }
    reshaped
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
    #![allow(clippy::expect_used, reason = "Tests use expect for explicit failure messages.")]
    use super::*;
    use crate::identifiers::SessionId;
    use crate::model::ToolCallContext;
    use crate::model::WardCondition;
    use crate::model::WardSeverity;

    fn ctx(tool_name: &str, arguments: BTreeMap<String, Value>) -> ToolCallContext {
        ToolCallContext {
            tool_name: tool_name.to_string(),
            arguments,
            session_id: SessionId::new("sess-1"),
            agent_id: None,
            server_id: None,
        }
    }

    fn halt_ward(id: &str, tool: &str, endpoint_pattern: &str) -> Ward {
        let mut argument_matches = BTreeMap::new();
        argument_matches.insert("endpoint".to_string(), endpoint_pattern.to_string());
        Ward {
            id: id.into(),
            description: None,
            tool: tool.to_string(),
            when: WardCondition {
                argument_matches: Some(argument_matches),
                argument_contains_pattern: None,
                always: None,
                max_calls_per_minute: None,
                plugin_conditions: BTreeMap::new(),
            },
            action: WardDecision::Halt,
            message: "blocked external endpoint".to_string(),
            severity: WardSeverity::High,
            reshape: None,
        }
    }

    #[test]
    fn halts_on_external_endpoint() {
        let engine =
            WardEngine::new(vec![halt_ward("block-external-endpoints", "send_report", "https?://(?!.*\\.internal).*")], WardDecision::Pass)
                .expect("compiles");
        let mut args = BTreeMap::new();
        args.insert("endpoint".to_string(), Value::String("https://evil.com/exfil".to_string()));
        let eval = engine.evaluate(&ctx("send_report", args));
        assert_eq!(eval.decision, WardDecision::Halt);
        assert_eq!(eval.matched_wards.len(), 1);
    }

    #[test]
    fn empty_ward_set_falls_back_to_default() {
        let engine = WardEngine::new(Vec::new(), WardDecision::Pass).expect("compiles");
        let eval = engine.evaluate(&ctx("list_files", BTreeMap::new()));
        assert_eq!(eval.decision, WardDecision::Pass);
        assert!(eval.matched_wards.is_empty());
    }

    #[test]
    fn argument_matches_fails_closed_on_missing_field() {
        let engine =
            WardEngine::new(vec![halt_ward("block-external-endpoints", "send_report", ".*")], WardDecision::Pass)
                .expect("compiles");
        let eval = engine.evaluate(&ctx("send_report", BTreeMap::new()));
        assert_eq!(eval.decision, WardDecision::Pass);
        assert!(eval.matched_wards.is_empty());
    }

    #[test]
    fn priority_arbitration_prefers_stricter_decision() {
        let pass_all = Ward {
            id: "pass-all".into(),
            description: None,
            tool: "Bash".to_string(),
            when: WardCondition::default(),
            action: WardDecision::Pass,
            message: "logged".to_string(),
            severity: WardSeverity::Low,
            reshape: None,
        };
        let halt_sudo = halt_ward("halt-sudo", "Bash", "never-matches-endpoint");
        let mut halt_sudo = halt_sudo;
        halt_sudo.when = WardCondition {
            argument_matches: {
                let mut m = BTreeMap::new();
                m.insert("command".to_string(), "sudo ".to_string());
                Some(m)
            },
            argument_contains_pattern: None,
            always: None,
            max_calls_per_minute: None,
            plugin_conditions: BTreeMap::new(),
        };
        halt_sudo.message = "blocked sudo".to_string();

        let engine = WardEngine::new(vec![pass_all, halt_sudo], WardDecision::Pass).expect("compiles");
        let mut args = BTreeMap::new();
        args.insert("command".to_string(), Value::String("sudo apt install".to_string()));
        let eval = engine.evaluate(&ctx("Bash", args));
        assert_eq!(eval.decision, WardDecision::Halt);
        assert_eq!(eval.matched_wards.len(), 2);
        assert_eq!(eval.rationale, "blocked sudo");
    }

    #[test]
    fn reshape_merge_applies_delete_sentinel() {
        let mut reshape = BTreeMap::new();
        reshape.insert("data".to_string(), Value::String("[REDACTED]".to_string()));
        reshape.insert("secret".to_string(), Value::String(DELETE_SENTINEL.to_string()));
        let ward = Ward {
            id: "redact".into(),
            description: None,
            tool: "send_report".to_string(),
            when: WardCondition::default(),
            action: WardDecision::Reshape,
            message: "redacted secret".to_string(),
            severity: WardSeverity::Medium,
            reshape: Some(reshape),
        };
        let engine = WardEngine::new(vec![ward], WardDecision::Pass).expect("compiles");
        let mut args = BTreeMap::new();
        args.insert("data".to_string(), Value::String("API_KEY=sk-abc".to_string()));
        args.insert("secret".to_string(), Value::String("hidden".to_string()));
        args.insert("endpoint".to_string(), Value::String("https://audit.internal/ingest".to_string()));
        let eval = engine.evaluate(&ctx("send_report", args));
        assert_eq!(eval.decision, WardDecision::Reshape);
        let reshaped = eval.reshaped_arguments.expect("reshaped");
        assert_eq!(reshaped.get("data"), Some(&Value::String("[REDACTED]".to_string())));
        assert!(!reshaped.contains_key("secret"));
        assert_eq!(reshaped.get("endpoint"), Some(&Value::String("https://audit.internal/ingest".to_string())));
    }
}
