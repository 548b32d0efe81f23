// bifrost-cli/src/backend.rs
// ============================================================================
// Module: Runechain Store Backend
// Description: Runtime choice between the in-memory and SQLite runechain
//              stores, behind one `RunechainStore` impl.
// Purpose: `BifrostProxy` is generic over its store type; the CLI picks
//          the concrete type from config at startup, so one enum carries
//          whichever the operator configured through a single type param.
// Dependencies: bifrost-core, bifrost-store-sqlite
// ============================================================================

use bifrost_core::identifiers::ServerId;
use bifrost_core::identifiers::SessionId;
use bifrost_core::interfaces::RunechainStore;
use bifrost_core::interfaces::StoreError;
use bifrost_core::model::ChainVerificationResult;
use bifrost_core::model::PendingBaseline;
use bifrost_core::model::Rune;
use bifrost_core::model::RuneFilter;
use bifrost_core::model::SignedReceipt;
use bifrost_core::model::ToolBaseline;
use bifrost_core::model::ToolCallContext;
use bifrost_core::model::WardEvaluation;
use bifrost_core::risk::RiskAssessment;
use bifrost_core::runtime::InMemoryRunechainStore;
use bifrost_store_sqlite::SqliteRunechainStore;

/// The runechain store selected at startup by `storage.adapter`.
pub enum StoreBackend {
    /// Process-local, non-durable store.
    Memory(InMemoryRunechainStore),
    /// `SQLite`-backed durable store.
    Sqlite(SqliteRunechainStore),
}

impl RunechainStore for StoreBackend {
    fn inscribe(
        &self,
        ctx: &ToolCallContext,
        eval: &WardEvaluation,
        response_summary: Option<String>,
        duration_ms: Option<u64>,
        risk: Option<RiskAssessment>,
    ) -> Result<Rune, StoreError> {
        match self {
            Self::Memory(store) => store.inscribe(ctx, eval, response_summary, duration_ms, risk),
            Self::Sqlite(store) => store.inscribe(ctx, eval, response_summary, duration_ms, risk),
        }
    }

    fn update_last_response(
        &self,
        response_summary: Option<String>,
        duration_ms: Option<u64>,
    ) -> Result<Option<Rune>, StoreError> {
        match self {
            Self::Memory(store) => store.update_last_response(response_summary, duration_ms),
            Self::Sqlite(store) => store.update_last_response(response_summary, duration_ms),
        }
    }

    fn verify_chain(&self) -> Result<ChainVerificationResult, StoreError> {
        match self {
            Self::Memory(store) => store.verify_chain(),
            Self::Sqlite(store) => store.verify_chain(),
        }
    }

    fn export_receipt(&self, sequence: u64) -> Result<Option<SignedReceipt>, StoreError> {
        match self {
            Self::Memory(store) => store.export_receipt(sequence),
            Self::Sqlite(store) => store.export_receipt(sequence),
        }
    }

    fn get_runes(&self, filter: &RuneFilter) -> Result<Vec<Rune>, StoreError> {
        match self {
            Self::Memory(store) => store.get_runes(filter),
            Self::Sqlite(store) => store.get_runes(filter),
        }
    }

    fn get_rune_by_sequence(&self, sequence: u64) -> Result<Option<Rune>, StoreError> {
        match self {
            Self::Memory(store) => store.get_rune_by_sequence(sequence),
            Self::Sqlite(store) => store.get_rune_by_sequence(sequence),
        }
    }

    fn get_chain_stats(&self) -> Result<ChainVerificationResult, StoreError> {
        match self {
            Self::Memory(store) => store.get_chain_stats(),
            Self::Sqlite(store) => store.get_chain_stats(),
        }
    }

    fn get_rune_count(&self) -> Result<u64, StoreError> {
        match self {
            Self::Memory(store) => store.get_rune_count(),
            Self::Sqlite(store) => store.get_rune_count(),
        }
    }

    fn get_last_sequence(&self) -> Result<Option<u64>, StoreError> {
        match self {
            Self::Memory(store) => store.get_last_sequence(),
            Self::Sqlite(store) => store.get_last_sequence(),
        }
    }

    fn get_recent_call_count(&self, session: &SessionId, tool: &str, window_ms: u64) -> Result<u64, StoreError> {
        match self {
            Self::Memory(store) => store.get_recent_call_count(session, tool, window_ms),
            Self::Sqlite(store) => store.get_recent_call_count(session, tool, window_ms),
        }
    }

    fn get_baseline(&self, server_id: &ServerId) -> Result<Option<ToolBaseline>, StoreError> {
        match self {
            Self::Memory(store) => store.get_baseline(server_id),
            Self::Sqlite(store) => store.get_baseline(server_id),
        }
    }

    fn set_baseline(&self, baseline: ToolBaseline) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.set_baseline(baseline),
            Self::Sqlite(store) => store.set_baseline(baseline),
        }
    }

    fn clear_baseline(&self, server_id: &ServerId) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.clear_baseline(server_id),
            Self::Sqlite(store) => store.clear_baseline(server_id),
        }
    }

    fn clear_all_baselines(&self) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.clear_all_baselines(),
            Self::Sqlite(store) => store.clear_all_baselines(),
        }
    }

    fn get_all_baselines(&self) -> Result<Vec<ToolBaseline>, StoreError> {
        match self {
            Self::Memory(store) => store.get_all_baselines(),
            Self::Sqlite(store) => store.get_all_baselines(),
        }
    }

    fn set_pending_baseline(&self, baseline: PendingBaseline) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.set_pending_baseline(baseline),
            Self::Sqlite(store) => store.set_pending_baseline(baseline),
        }
    }

    fn get_pending_baseline(&self, server_id: &ServerId) -> Result<Option<PendingBaseline>, StoreError> {
        match self {
            Self::Memory(store) => store.get_pending_baseline(server_id),
            Self::Sqlite(store) => store.get_pending_baseline(server_id),
        }
    }

    fn approve_pending(&self, server_id: &ServerId) -> Result<bool, StoreError> {
        match self {
            Self::Memory(store) => store.approve_pending(server_id),
            Self::Sqlite(store) => store.approve_pending(server_id),
        }
    }

    fn get_public_key(&self) -> Option<String> {
        match self {
            Self::Memory(store) => store.get_public_key(),
            Self::Sqlite(store) => store.get_public_key(),
        }
    }
}
