// bifrost-core/src/runtime/memory_store.rs
// ============================================================================
// Module: Bifrost In-Memory Runechain Store
// Description: Process-local, non-durable `RunechainStore` implementation.
// Purpose: Back the `memory` storage adapter, tests, and demos.
// Dependencies: crate::{interfaces, runechain, model}, std::sync
// ============================================================================

//! ## Overview
//! All chain state lives behind one `Mutex`, mirroring the locking
//! discipline of the durable adapter (single writer, multiple readers) even
//! though nothing here touches disk. Signing material is generated fresh on
//! construction: there is no "next to the store" file location for an
//! adapter with no file, so every chain built with
//! [`InMemoryRunechainStore::new`] is signed from the moment it exists.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::identifiers::ServerId;
use crate::identifiers::SessionId;
use crate::interfaces::RunechainStore;
use crate::interfaces::StoreError;
use crate::model::ChainVerificationResult;
use crate::model::PendingBaseline;
use crate::model::Rune;
use crate::model::RuneFilter;
use crate::model::SignedReceipt;
use crate::model::ToolBaseline;
use crate::model::ToolCallContext;
use crate::model::WardEvaluation;
use crate::model::rune::ChainPosition;
use crate::model::rune::GENESIS_HASH;
use crate::model::rune::ReceiptRune;
use crate::risk::RiskAssessment;
use crate::runechain::SigningMaterial;
use crate::runechain::compute_content_hash;
use crate::runechain::compute_verification_hash;
use crate::runechain::redact_and_summarize;
use crate::runechain::verify_signature;
use crate::time::Timestamp;

/// Mutable chain state guarded by a single mutex.
struct ChainState {
    /// Every inscribed rune, in sequence order.
    runes: Vec<Rune>,
    /// Active baselines, keyed by server.
    baselines: BTreeMap<ServerId, ToolBaseline>,
    /// Pending baselines awaiting approval, keyed by server.
    pending_baselines: BTreeMap<ServerId, PendingBaseline>,
}

/// A non-durable `RunechainStore` holding its entire chain in memory.
pub struct InMemoryRunechainStore {
    /// Guarded chain state.
    state: Mutex<ChainState>,
    /// Signing material generated fresh for this process's lifetime.
    signing: SigningMaterial,
}

impl InMemoryRunechainStore {
    /// Creates an empty store with fresh, in-memory-only signing material.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState {
                runes: Vec::new(),
                baselines: BTreeMap::new(),
                pending_baselines: BTreeMap::new(),
            }),
            signing: SigningMaterial::generate(),
        }
    }

    /// Locks the chain state, reporting mutex poisoning as a store error.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ChainState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Store("runechain mutex poisoned".to_string()))
    }
}

impl Default for InMemoryRunechainStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RunechainStore for InMemoryRunechainStore {
    fn inscribe(
        &self,
        ctx: &ToolCallContext,
        eval: &WardEvaluation,
        response_summary: Option<String>,
        duration_ms: Option<u64>,
        risk: Option<RiskAssessment>,
    ) -> Result<Rune, StoreError> {
        let mut state = self.lock()?;
        let sequence = state.runes.last().map_or(1, |tail| tail.sequence + 1);
        let previous_hash = state.runes.last().map_or_else(|| GENESIS_HASH.to_string(), |tail| tail.content_hash.clone());
        let arguments_json =
            serde_json::to_string(&ctx.arguments).map_err(|err| StoreError::Store(err.to_string()))?;

        let mut rune = Rune {
            sequence,
            timestamp: Timestamp::now(),
            session_id: ctx.session_id.clone(),
            tool_name: ctx.tool_name.clone(),
            arguments_hash: crate::hashing::hash_canonical_json(&ctx.arguments)
                .map_err(|err| StoreError::Store(err.to_string()))?,
            arguments_summary: redact_and_summarize(&arguments_json),
            decision: eval.decision,
            matched_wards: eval.matched_wards.clone(),
            ward_chain: eval.ward_chain.clone(),
            rationale: eval.rationale.clone(),
            response_summary: response_summary.as_deref().map(redact_and_summarize),
            duration_ms,
            previous_hash,
            content_hash: String::new(),
            is_genesis: state.runes.is_empty(),
            signature: None,
            risk_score: risk.map(|assessment| assessment.score),
            risk_tier: risk.map(|assessment| assessment.tier.to_string()),
            ai_reasoning: None,
        };
        rune.content_hash = compute_content_hash(&rune).map_err(|err| StoreError::Store(err.to_string()))?;
        rune.signature = Some(self.signing.sign(&rune.content_hash));

        state.runes.push(rune.clone());
        Ok(rune)
    }

    fn update_last_response(
        &self,
        response_summary: Option<String>,
        duration_ms: Option<u64>,
    ) -> Result<Option<Rune>, StoreError> {
        let mut state = self.lock()?;
        let Some(tail) = state.runes.last().cloned() else {
            return Ok(None);
        };
        let mut updated = tail;
        updated.response_summary = response_summary.as_deref().map(redact_and_summarize);
        updated.duration_ms = duration_ms;
        updated.content_hash = compute_content_hash(&updated).map_err(|err| StoreError::Store(err.to_string()))?;
        updated.signature = Some(self.signing.sign(&updated.content_hash));
        let last_index = state.runes.len() - 1;
        state.runes[last_index] = updated.clone();
        Ok(Some(updated))
    }

    fn verify_chain(&self) -> Result<ChainVerificationResult, StoreError> {
        let state = self.lock()?;
        verify_runes(&state.runes, self.signing.public_key_base64())
    }

    fn export_receipt(&self, sequence: u64) -> Result<Option<SignedReceipt>, StoreError> {
        let state = self.lock()?;
        let Some(rune) = state.runes.iter().find(|rune| rune.sequence == sequence) else {
            return Ok(None);
        };
        let Some(signature) = rune.signature.clone() else {
            return Ok(None);
        };
        Ok(Some(SignedReceipt {
            version: 1,
            rune: ReceiptRune {
                sequence: rune.sequence,
                timestamp: rune.timestamp,
                tool_name: rune.tool_name.clone(),
                decision: rune.decision,
                rationale: rune.rationale.clone(),
                matched_wards: rune.matched_wards.clone(),
                arguments_hash: rune.arguments_hash.clone(),
                content_hash: rune.content_hash.clone(),
                previous_hash: rune.previous_hash.clone(),
                is_genesis: rune.is_genesis,
            },
            chain_position: ChainPosition { chain_length: u64::try_from(state.runes.len()).unwrap_or(u64::MAX) },
            signature,
            public_key: self.signing.public_key_base64().to_string(),
        }))
    }

    fn get_runes(&self, filter: &RuneFilter) -> Result<Vec<Rune>, StoreError> {
        let state = self.lock()?;
        let mut matches: Vec<Rune> = state
            .runes
            .iter()
            .rev()
            .filter(|rune| filter.session_id.as_ref().is_none_or(|session| &rune.session_id == session))
            .filter(|rune| filter.tool_name.as_ref().is_none_or(|tool| &rune.tool_name == tool))
            .filter(|rune| filter.decision.is_none_or(|decision| rune.decision == decision))
            .cloned()
            .collect();
        if let Some(offset) = filter.offset {
            matches = matches.into_iter().skip(offset).collect();
        }
        if let Some(limit) = filter.limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    fn get_rune_by_sequence(&self, sequence: u64) -> Result<Option<Rune>, StoreError> {
        let state = self.lock()?;
        Ok(state.runes.iter().find(|rune| rune.sequence == sequence).cloned())
    }

    fn get_chain_stats(&self) -> Result<ChainVerificationResult, StoreError> {
        self.verify_chain()
    }

    fn get_rune_count(&self) -> Result<u64, StoreError> {
        let state = self.lock()?;
        Ok(u64::try_from(state.runes.len()).unwrap_or(u64::MAX))
    }

    fn get_last_sequence(&self) -> Result<Option<u64>, StoreError> {
        let state = self.lock()?;
        Ok(state.runes.last().map(|rune| rune.sequence))
    }

    fn get_recent_call_count(&self, session: &SessionId, tool: &str, window_ms: u64) -> Result<u64, StoreError> {
        let state = self.lock()?;
        let now = Timestamp::now();
        let count = state
            .runes
            .iter()
            .filter(|rune| &rune.session_id == session)
            .filter(|rune| tool == "*" || rune.tool_name == tool)
            .filter(|rune| now.since_ms(&rune.timestamp) < window_ms)
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    fn get_baseline(&self, server_id: &ServerId) -> Result<Option<ToolBaseline>, StoreError> {
        let state = self.lock()?;
        Ok(state.baselines.get(server_id).cloned())
    }

    fn set_baseline(&self, mut baseline: ToolBaseline) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if let Some(existing) = state.baselines.get(&baseline.server_id) {
            baseline.first_seen = existing.first_seen;
        }
        state.baselines.insert(baseline.server_id.clone(), baseline);
        Ok(())
    }

    fn clear_baseline(&self, server_id: &ServerId) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.baselines.remove(server_id);
        Ok(())
    }

    fn clear_all_baselines(&self) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.baselines.clear();
        Ok(())
    }

    fn get_all_baselines(&self) -> Result<Vec<ToolBaseline>, StoreError> {
        let state = self.lock()?;
        Ok(state.baselines.values().cloned().collect())
    }

    fn set_pending_baseline(&self, baseline: PendingBaseline) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.pending_baselines.insert(baseline.server_id.clone(), baseline);
        Ok(())
    }

    fn get_pending_baseline(&self, server_id: &ServerId) -> Result<Option<PendingBaseline>, StoreError> {
        let state = self.lock()?;
        Ok(state.pending_baselines.get(server_id).cloned())
    }

    fn approve_pending(&self, server_id: &ServerId) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let Some(pending) = state.pending_baselines.remove(server_id) else {
            return Ok(false);
        };
        state.baselines.insert(server_id.clone(), pending);
        Ok(true)
    }

    fn get_public_key(&self) -> Option<String> {
        Some(self.signing.public_key_base64().to_string())
    }
}

/// Walks `runes` verifying hash linkage, content hashes, and signatures.
fn verify_runes(runes: &[Rune], public_key: &str) -> Result<ChainVerificationResult, StoreError> {
    let mut sessions = std::collections::HashSet::new();
    let mut tools = std::collections::HashSet::new();
    let mut pass_count = 0u64;
    let mut halt_count = 0u64;
    let mut reshape_count = 0u64;
    let mut signatures_verified = 0u64;
    let mut signatures_missing = 0u64;

    let mut broken_at_sequence = None;
    let mut broken_reason = None;
    let mut verified_runes = 0u64;
    let mut expected_previous_hash = GENESIS_HASH.to_string();

    for rune in runes {
        sessions.insert(rune.session_id.clone());
        tools.insert(rune.tool_name.clone());
        match rune.decision {
            crate::model::WardDecision::Pass => pass_count += 1,
            crate::model::WardDecision::Halt => halt_count += 1,
            crate::model::WardDecision::Reshape => reshape_count += 1,
        }

        if broken_at_sequence.is_some() {
            continue;
        }

        if rune.previous_hash != expected_previous_hash {
            broken_at_sequence = Some(rune.sequence);
            broken_reason = Some(format!("previous_hash link mismatch at sequence {}", rune.sequence));
            continue;
        }
        let recomputed = compute_content_hash(rune).map_err(|err| StoreError::Store(err.to_string()))?;
        if recomputed != rune.content_hash {
            broken_at_sequence = Some(rune.sequence);
            broken_reason = Some(format!("Content hash mismatch at sequence {}", rune.sequence));
            continue;
        }

        match &rune.signature {
            Some(signature) if verify_signature(public_key, &rune.content_hash, signature) => {
                signatures_verified += 1;
            }
            Some(_) => {
                broken_at_sequence = Some(rune.sequence);
                broken_reason = Some(format!("signature verification failed at sequence {}", rune.sequence));
                continue;
            }
            None => signatures_missing += 1,
        }

        verified_runes += 1;
        expected_previous_hash.clone_from(&rune.content_hash);
    }

    let valid = broken_at_sequence.is_none();
    let total_runes = u64::try_from(runes.len()).unwrap_or(u64::MAX);
    let tail_content_hash = runes.last().map_or_else(|| GENESIS_HASH.to_string(), |tail| tail.content_hash.clone());

    Ok(ChainVerificationResult {
        valid,
        broken_at_sequence,
        broken_reason,
        verified_runes,
        total_runes,
        distinct_sessions: u64::try_from(sessions.len()).unwrap_or(u64::MAX),
        distinct_tools: u64::try_from(tools.len()).unwrap_or(u64::MAX),
        pass_count,
        halt_count,
        reshape_count,
        signatures_verified,
        signatures_missing,
        first_timestamp: runes.first().map(|rune| rune.timestamp),
        last_timestamp: runes.last().map(|rune| rune.timestamp),
        verification_hash: compute_verification_hash(valid, total_runes, &tail_content_hash),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
    #![allow(clippy::expect_used, reason = "Tests use expect for explicit failure messages.")]
    use super::*;
    use crate::model::WardDecision;

    fn ctx(tool: &str) -> ToolCallContext {
        ToolCallContext {
            tool_name: tool.to_string(),
            arguments: BTreeMap::new(),
            session_id: SessionId::new("sess-1"),
            agent_id: None,
            server_id: None,
        }
    }

    fn pass_eval() -> WardEvaluation {
        WardEvaluation {
            decision: WardDecision::Pass,
            matched_wards: Vec::new(),
            ward_chain: Vec::new(),
            rationale: "no wards matched".to_string(),
            reshaped_arguments: None,
            evaluation_duration_ms: 0,
        }
    }

    #[test]
    fn empty_chain_is_valid_with_well_defined_verification_hash() {
        let store = InMemoryRunechainStore::new();
        let result = store.verify_chain().expect("verify");
        assert!(result.valid);
        assert_eq!(result.total_runes, 0);
        assert!(!result.verification_hash.is_empty());
    }

    #[test]
    fn sequential_inscriptions_form_a_valid_chain() {
        let store = InMemoryRunechainStore::new();
        for _ in 0..3 {
            store.inscribe(&ctx("list_files"), &pass_eval(), Some("ok".to_string()), Some(5), None).expect("inscribe");
        }
        let result = store.verify_chain().expect("verify");
        assert!(result.valid);
        assert_eq!(result.total_runes, 3);
        assert_eq!(result.signatures_verified, 3);
        assert_eq!(result.signatures_missing, 0);
    }

    #[test]
    fn tampering_with_a_persisted_field_breaks_verification_at_that_sequence() {
        let store = InMemoryRunechainStore::new();
        for _ in 0..3 {
            store.inscribe(&ctx("list_files"), &pass_eval(), None, None, None).expect("inscribe");
        }
        {
            let mut state = store.state.lock().expect("lock");
            state.runes[1].decision = WardDecision::Halt;
        }
        let result = store.verify_chain().expect("verify");
        assert!(!result.valid);
        assert_eq!(result.broken_at_sequence, Some(2));
        assert!(result.broken_reason.as_deref().is_some_and(|reason| reason.contains("Content hash mismatch")));
        assert_eq!(result.verified_runes, 1);
    }

    #[test]
    fn export_receipt_round_trips_a_verifiable_signature() {
        let store = InMemoryRunechainStore::new();
        let rune = store.inscribe(&ctx("list_files"), &pass_eval(), None, None, None).expect("inscribe");
        let receipt = store.export_receipt(rune.sequence).expect("export").expect("present");
        assert!(verify_signature(&receipt.public_key, &receipt.rune.content_hash, &receipt.signature));
    }

    #[test]
    fn baseline_upsert_preserves_first_seen() {
        let store = InMemoryRunechainStore::new();
        let server = ServerId::new("srv-1");
        let first_seen = Timestamp::now();
        store
            .set_baseline(ToolBaseline {
                server_id: server.clone(),
                tools_hash: "abc".to_string(),
                tools_snapshot: Vec::new(),
                first_seen,
                last_verified: first_seen,
            })
            .expect("set");
        store
            .set_baseline(ToolBaseline {
                server_id: server.clone(),
                tools_hash: "def".to_string(),
                tools_snapshot: Vec::new(),
                first_seen: Timestamp::now(),
                last_verified: Timestamp::now(),
            })
            .expect("set");
        let stored = store.get_baseline(&server).expect("get").expect("present");
        assert_eq!(stored.first_seen, first_seen);
        assert_eq!(stored.tools_hash, "def");
    }

    #[test]
    fn approve_pending_promotes_and_clears_pending() {
        let store = InMemoryRunechainStore::new();
        let server = ServerId::new("srv-1");
        let now = Timestamp::now();
        store
            .set_pending_baseline(ToolBaseline {
                server_id: server.clone(),
                tools_hash: "abc".to_string(),
                tools_snapshot: Vec::new(),
                first_seen: now,
                last_verified: now,
            })
            .expect("set pending");
        assert!(store.approve_pending(&server).expect("approve"));
        assert!(store.get_pending_baseline(&server).expect("get").is_none());
        assert!(store.get_baseline(&server).expect("get").is_some());
        assert!(!store.approve_pending(&server).expect("approve again"));
    }
}
