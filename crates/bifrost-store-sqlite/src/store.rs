// bifrost-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Runechain Store
// Description: Durable RunechainStore backed by SQLite WAL.
// Purpose: Persist the hash-chained audit trail with deterministic
//          serialization and file-resident Ed25519 signing material.
// Dependencies: bifrost-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Each rune is stored as a canonical JSON blob alongside indexed columns
//! (`sequence`, `session_id`, `tool_name`, `decision`, `timestamp`) so the
//! proxy's hot-path queries never deserialize the whole table. Loads
//! recompute nothing; the inscribe/verify algorithm itself lives in
//! `bifrost_core::runechain` and is reproduced here exactly as the
//! in-memory adapter reproduces it, per the specification's "each adapter
//! owns its own key material" design. Security posture: database contents
//! are untrusted; every read that feeds `verify_chain` re-derives its hash
//! and signature rather than trusting the stored `content_hash` column.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

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
use bifrost_core::model::WardDecision;
use bifrost_core::model::WardEvaluation;
use bifrost_core::model::rune::ChainPosition;
use bifrost_core::model::rune::GENESIS_HASH;
use bifrost_core::model::rune::ReceiptRune;
use bifrost_core::risk::RiskAssessment;
use bifrost_core::runechain::SigningMaterial;
use bifrost_core::runechain::compute_content_hash;
use bifrost_core::runechain::compute_verification_hash;
use bifrost_core::runechain::redact_and_summarize;
use bifrost_core::runechain::verify_signature;
use bifrost_core::time::Timestamp;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

use crate::keys;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` runechain store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data or operation.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Signing key material could not be loaded or generated.
    #[error("sqlite store key error: {0}")]
    Key(#[from] crate::keys::KeyError),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::Key(err) => Self::Io(err.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed runechain store with WAL support and durable Ed25519
/// signing material.
pub struct SqliteRunechainStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
    /// Signing material loaded from, or generated and persisted to, the key
    /// files alongside the database.
    signing: SigningMaterial,
}

impl SqliteRunechainStore {
    /// Opens a `SQLite`-backed runechain store, loading or generating its
    /// signing key material.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database or key files cannot
    /// be opened, created, or initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        let (key_path, pub_path) = keys::key_paths(&config.path);
        let signing = keys::load_or_generate(&key_path, &pub_path)?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)), signing })
    }

    /// Locks the shared connection, reporting mutex poisoning as a store
    /// error.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("connection mutex poisoned".to_string()))
    }

    /// Returns the tail rune (highest sequence number), if any.
    fn tail_rune(connection: &Connection) -> Result<Option<Rune>, SqliteStoreError> {
        let row: Option<Vec<u8>> = connection
            .query_row("SELECT rune_json FROM runes ORDER BY sequence DESC LIMIT 1", params![], |row| row.get(0))
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        row.map(|bytes| serde_json::from_slice(&bytes).map_err(|err| SqliteStoreError::Corrupt(err.to_string())))
            .transpose()
    }

    /// Inserts `rune` into the `runes` table.
    fn insert_rune(connection: &Connection, rune: &Rune) -> Result<(), SqliteStoreError> {
        let rune_json = serde_json::to_vec(rune).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        connection
            .execute(
                "INSERT INTO runes (
                    sequence, session_id, tool_name, decision, timestamp, rune_json
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    rune.sequence,
                    rune.session_id.as_str(),
                    rune.tool_name,
                    decision_label(rune.decision),
                    rune.timestamp.to_rfc3339().map_err(|err| SqliteStoreError::Invalid(err.to_string()))?,
                    rune_json,
                ],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    /// Replaces the stored row for `rune`, keyed by its (unchanged)
    /// sequence number.
    fn replace_rune(connection: &Connection, rune: &Rune) -> Result<(), SqliteStoreError> {
        let rune_json = serde_json::to_vec(rune).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        connection
            .execute(
                "UPDATE runes SET rune_json = ?1 WHERE sequence = ?2",
                params![rune_json, rune.sequence],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    /// Fetches every rune, ordered by ascending sequence.
    fn all_runes(connection: &Connection) -> Result<Vec<Rune>, SqliteStoreError> {
        let mut statement = connection
            .prepare("SELECT rune_json FROM runes ORDER BY sequence ASC")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = statement
            .query_map(params![], |row| row.get::<_, Vec<u8>>(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut runes = Vec::new();
        for row in rows {
            let bytes = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            runes.push(
                serde_json::from_slice(&bytes).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?,
            );
        }
        Ok(runes)
    }
}

impl RunechainStore for SqliteRunechainStore {
    fn inscribe(
        &self,
        ctx: &ToolCallContext,
        eval: &WardEvaluation,
        response_summary: Option<String>,
        duration_ms: Option<u64>,
        risk: Option<RiskAssessment>,
    ) -> Result<Rune, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        let tail = Self::tail_rune(&connection).map_err(StoreError::from)?;
        let sequence = tail.as_ref().map_or(1, |tail| tail.sequence + 1);
        let previous_hash = tail.as_ref().map_or_else(|| GENESIS_HASH.to_string(), |tail| tail.content_hash.clone());
        let arguments_json =
            serde_json::to_string(&ctx.arguments).map_err(|err| StoreError::Store(err.to_string()))?;

        let mut rune = Rune {
            sequence,
            timestamp: Timestamp::now(),
            session_id: ctx.session_id.clone(),
            tool_name: ctx.tool_name.clone(),
            arguments_hash: bifrost_core::hashing::hash_canonical_json(&ctx.arguments)
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
            is_genesis: tail.is_none(),
            signature: None,
            risk_score: risk.map(|assessment| assessment.score),
            risk_tier: risk.map(|assessment| assessment.tier.to_string()),
            ai_reasoning: None,
        };
        rune.content_hash = compute_content_hash(&rune).map_err(|err| StoreError::Store(err.to_string()))?;
        rune.signature = Some(self.signing.sign(&rune.content_hash));

        Self::insert_rune(&connection, &rune).map_err(StoreError::from)?;
        Ok(rune)
    }

    fn update_last_response(
        &self,
        response_summary: Option<String>,
        duration_ms: Option<u64>,
    ) -> Result<Option<Rune>, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        let Some(mut updated) = Self::tail_rune(&connection).map_err(StoreError::from)? else {
            return Ok(None);
        };
        updated.response_summary = response_summary.as_deref().map(redact_and_summarize);
        updated.duration_ms = duration_ms;
        updated.content_hash = compute_content_hash(&updated).map_err(|err| StoreError::Store(err.to_string()))?;
        updated.signature = Some(self.signing.sign(&updated.content_hash));
        Self::replace_rune(&connection, &updated).map_err(StoreError::from)?;
        Ok(Some(updated))
    }

    fn verify_chain(&self) -> Result<ChainVerificationResult, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        let runes = Self::all_runes(&connection).map_err(StoreError::from)?;
        verify_runes(&runes, self.signing.public_key_base64())
    }

    fn export_receipt(&self, sequence: u64) -> Result<Option<SignedReceipt>, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        let row: Option<Vec<u8>> = connection
            .query_row("SELECT rune_json FROM runes WHERE sequence = ?1", params![sequence], |row| row.get(0))
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
            .map_err(StoreError::from)?;
        let Some(bytes) = row else {
            return Ok(None);
        };
        let rune: Rune =
            serde_json::from_slice(&bytes).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        let Some(signature) = rune.signature.clone() else {
            return Ok(None);
        };
        let chain_length: i64 = connection
            .query_row("SELECT COUNT(*) FROM runes", params![], |row| row.get(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
            .map_err(StoreError::from)?;
        Ok(Some(SignedReceipt {
            version: 1,
            rune: ReceiptRune {
                sequence: rune.sequence,
                timestamp: rune.timestamp,
                tool_name: rune.tool_name,
                decision: rune.decision,
                rationale: rune.rationale,
                matched_wards: rune.matched_wards,
                arguments_hash: rune.arguments_hash,
                content_hash: rune.content_hash,
                previous_hash: rune.previous_hash,
                is_genesis: rune.is_genesis,
            },
            chain_position: ChainPosition { chain_length: u64::try_from(chain_length).unwrap_or(u64::MAX) },
            signature,
            public_key: self.signing.public_key_base64().to_string(),
        }))
    }

    fn get_runes(&self, filter: &RuneFilter) -> Result<Vec<Rune>, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        let mut clauses = Vec::new();
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(session_id) = &filter.session_id {
            clauses.push(format!("session_id = ?{}", bound.len() + 1));
            bound.push(Box::new(session_id.as_str().to_string()));
        }
        if let Some(tool_name) = &filter.tool_name {
            clauses.push(format!("tool_name = ?{}", bound.len() + 1));
            bound.push(Box::new(tool_name.clone()));
        }
        if let Some(decision) = filter.decision {
            clauses.push(format!("decision = ?{}", bound.len() + 1));
            bound.push(Box::new(decision_label(decision).to_string()));
        }
        let where_clause =
            if clauses.is_empty() { String::new() } else { format!("WHERE {}", clauses.join(" AND ")) };
        let query = format!("SELECT rune_json FROM runes {where_clause} ORDER BY sequence DESC");
        let mut statement = connection.prepare(&query).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|boxed| boxed.as_ref()).collect();
        let rows = statement
            .query_map(params_ref.as_slice(), |row| row.get::<_, Vec<u8>>(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut runes = Vec::new();
        for row in rows {
            let bytes = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            runes.push(
                serde_json::from_slice::<Rune>(&bytes).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?,
            );
        }
        if let Some(offset) = filter.offset {
            runes = runes.into_iter().skip(offset).collect();
        }
        if let Some(limit) = filter.limit {
            runes.truncate(limit);
        }
        Ok(runes)
    }

    fn get_rune_by_sequence(&self, sequence: u64) -> Result<Option<Rune>, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        let row: Option<Vec<u8>> = connection
            .query_row("SELECT rune_json FROM runes WHERE sequence = ?1", params![sequence], |row| row.get(0))
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
            .map_err(StoreError::from)?;
        row.map(|bytes| {
            serde_json::from_slice::<Rune>(&bytes).map_err(|err| StoreError::Corrupt(err.to_string()))
        })
        .transpose()
    }

    fn get_chain_stats(&self) -> Result<ChainVerificationResult, StoreError> {
        self.verify_chain()
    }

    fn get_rune_count(&self) -> Result<u64, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM runes", params![], |row| row.get(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
            .map_err(StoreError::from)?;
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    fn get_last_sequence(&self) -> Result<Option<u64>, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        let sequence: Option<i64> = connection
            .query_row("SELECT MAX(sequence) FROM runes", params![], |row| row.get(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
            .map_err(StoreError::from)?;
        Ok(sequence.map(|value| u64::try_from(value).unwrap_or(0)))
    }

    fn get_recent_call_count(&self, session: &SessionId, tool: &str, window_ms: u64) -> Result<u64, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        let mut statement = if tool == "*" {
            connection
                .prepare("SELECT rune_json FROM runes WHERE session_id = ?1")
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
        } else {
            connection
                .prepare("SELECT rune_json FROM runes WHERE session_id = ?1 AND tool_name = ?2")
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
        };
        let rows = if tool == "*" {
            statement.query_map(params![session.as_str()], |row| row.get::<_, Vec<u8>>(0))
        } else {
            statement.query_map(params![session.as_str(), tool], |row| row.get::<_, Vec<u8>>(0))
        }
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let now = Timestamp::now();
        let mut count = 0u64;
        for row in rows {
            let bytes = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let rune: Rune =
                serde_json::from_slice(&bytes).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
            if now.since_ms(&rune.timestamp) < window_ms {
                count += 1;
            }
        }
        Ok(count)
    }

    fn get_baseline(&self, server_id: &ServerId) -> Result<Option<ToolBaseline>, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        fetch_baseline(&connection, "baselines", server_id).map_err(StoreError::from)
    }

    fn set_baseline(&self, mut baseline: ToolBaseline) -> Result<(), StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        if let Some(existing) =
            fetch_baseline(&connection, "baselines", &baseline.server_id).map_err(StoreError::from)?
        {
            baseline.first_seen = existing.first_seen;
        }
        upsert_baseline(&connection, "baselines", &baseline).map_err(StoreError::from)
    }

    fn clear_baseline(&self, server_id: &ServerId) -> Result<(), StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        connection
            .execute("DELETE FROM baselines WHERE server_id = ?1", params![server_id.as_str()])
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
            .map_err(StoreError::from)?;
        Ok(())
    }

    fn clear_all_baselines(&self) -> Result<(), StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        connection
            .execute("DELETE FROM baselines", params![])
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
            .map_err(StoreError::from)?;
        Ok(())
    }

    fn get_all_baselines(&self) -> Result<Vec<ToolBaseline>, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        all_baselines(&connection, "baselines").map_err(StoreError::from)
    }

    fn set_pending_baseline(&self, baseline: PendingBaseline) -> Result<(), StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        upsert_baseline(&connection, "pending_baselines", &baseline).map_err(StoreError::from)
    }

    fn get_pending_baseline(&self, server_id: &ServerId) -> Result<Option<PendingBaseline>, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        fetch_baseline(&connection, "pending_baselines", server_id).map_err(StoreError::from)
    }

    fn approve_pending(&self, server_id: &ServerId) -> Result<bool, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        let Some(pending) =
            fetch_baseline(&connection, "pending_baselines", server_id).map_err(StoreError::from)?
        else {
            return Ok(false);
        };
        upsert_baseline(&connection, "baselines", &pending).map_err(StoreError::from)?;
        connection
            .execute("DELETE FROM pending_baselines WHERE server_id = ?1", params![server_id.as_str()])
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
            .map_err(StoreError::from)?;
        Ok(true)
    }

    fn get_public_key(&self) -> Option<String> {
        Some(self.signing.public_key_base64().to_string())
    }
}

// ============================================================================
// SECTION: Baseline Helpers
// ============================================================================

/// Fetches one baseline row from `table` by `server_id`.
fn fetch_baseline(
    connection: &Connection,
    table: &str,
    server_id: &ServerId,
) -> Result<Option<ToolBaseline>, SqliteStoreError> {
    let query = format!("SELECT baseline_json FROM {table} WHERE server_id = ?1");
    let row: Option<Vec<u8>> = connection
        .query_row(&query, params![server_id.as_str()], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    row.map(|bytes| serde_json::from_slice(&bytes).map_err(|err| SqliteStoreError::Corrupt(err.to_string())))
        .transpose()
}

/// Returns every baseline row stored in `table`.
fn all_baselines(connection: &Connection, table: &str) -> Result<Vec<ToolBaseline>, SqliteStoreError> {
    let query = format!("SELECT baseline_json FROM {table} ORDER BY server_id ASC");
    let mut statement = connection.prepare(&query).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let rows = statement
        .query_map(params![], |row| row.get::<_, Vec<u8>>(0))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let mut baselines = Vec::new();
    for row in rows {
        let bytes = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        baselines.push(
            serde_json::from_slice(&bytes).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?,
        );
    }
    Ok(baselines)
}

/// Inserts or replaces the baseline row for `baseline.server_id` in `table`.
fn upsert_baseline(connection: &Connection, table: &str, baseline: &ToolBaseline) -> Result<(), SqliteStoreError> {
    let baseline_json = serde_json::to_vec(baseline).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    let query = format!(
        "INSERT INTO {table} (server_id, baseline_json) VALUES (?1, ?2) \
         ON CONFLICT(server_id) DO UPDATE SET baseline_json = excluded.baseline_json"
    );
    connection
        .execute(&query, params![baseline.server_id.as_str(), baseline_json])
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: Chain Verification
// ============================================================================

/// Renders a [`WardDecision`] as the stable label stored in the `decision`
/// column.
const fn decision_label(decision: WardDecision) -> &'static str {
    match decision {
        WardDecision::Pass => "PASS",
        WardDecision::Reshape => "RESHAPE",
        WardDecision::Halt => "HALT",
    }
}

/// Walks `runes` verifying hash linkage, content hashes, and signatures.
/// Mirrors `bifrost_core::runtime::InMemoryRunechainStore`'s verification
/// walk exactly, since both adapters must agree on what "valid" means.
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
            WardDecision::Pass => pass_count += 1,
            WardDecision::Halt => halt_count += 1,
            WardDecision::Reshape => reshape_count += 1,
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
            broken_reason = Some(format!("content hash mismatch at sequence {}", rune.sequence));
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

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid("store path contains an overlong component".to_string()));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid("store path must be a file, not a directory".to_string()));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS runes (
                    sequence INTEGER PRIMARY KEY,
                    session_id TEXT NOT NULL,
                    tool_name TEXT NOT NULL,
                    decision TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    rune_json BLOB NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_runes_session ON runes (session_id);
                CREATE INDEX IF NOT EXISTS idx_runes_tool ON runes (tool_name);
                CREATE INDEX IF NOT EXISTS idx_runes_decision ON runes (decision);
                CREATE INDEX IF NOT EXISTS idx_runes_session_tool_time
                    ON runes (session_id, tool_name, timestamp);
                CREATE TABLE IF NOT EXISTS baselines (
                    server_id TEXT PRIMARY KEY,
                    baseline_json BLOB NOT NULL
                );
                CREATE TABLE IF NOT EXISTS pending_baselines (
                    server_id TEXT PRIMARY KEY,
                    baseline_json BLOB NOT NULL
                );",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!("unsupported schema version: {value}")));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
    #![allow(clippy::expect_used, reason = "Tests use expect for explicit failure messages.")]
    use std::collections::BTreeMap;

    use bifrost_core::identifiers::SessionId;

    use super::*;

    /// Builds a test store at a fresh temp-dir path.
    fn test_store() -> (tempfile::TempDir, SqliteRunechainStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chain.db");
        let store = SqliteRunechainStore::new(SqliteStoreConfig {
            path,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        })
        .expect("open store");
        (dir, store)
    }

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
        let (_dir, store) = test_store();
        let result = store.verify_chain().expect("verify");
        assert!(result.valid);
        assert_eq!(result.total_runes, 0);
        assert!(!result.verification_hash.is_empty());
    }

    #[test]
    fn sequential_inscriptions_form_a_valid_chain_and_survive_reopen() {
        let (dir, store) = test_store();
        for _ in 0..3 {
            store.inscribe(&ctx("list_files"), &pass_eval(), Some("ok".to_string()), Some(5), None).expect("inscribe");
        }
        let result = store.verify_chain().expect("verify");
        assert!(result.valid);
        assert_eq!(result.total_runes, 3);
        assert_eq!(result.signatures_verified, 3);

        let path = dir.path().join("chain.db");
        let reopened = SqliteRunechainStore::new(SqliteStoreConfig {
            path,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        })
        .expect("reopen");
        assert_eq!(reopened.get_public_key(), store.get_public_key());
        let reopened_result = reopened.verify_chain().expect("verify");
        assert_eq!(reopened_result.total_runes, 3);
        assert!(reopened_result.valid);
    }

    #[test]
    fn update_last_response_recomputes_hash_and_signature() {
        let (_dir, store) = test_store();
        let rune = store.inscribe(&ctx("list_files"), &pass_eval(), None, None, None).expect("inscribe");
        let updated =
            store.update_last_response(Some("done".to_string()), Some(12)).expect("update").expect("tail exists");
        assert_ne!(updated.content_hash, rune.content_hash);
        assert!(store.verify_chain().expect("verify").valid);
    }

    #[test]
    fn export_receipt_round_trips_a_verifiable_signature() {
        let (_dir, store) = test_store();
        let rune = store.inscribe(&ctx("list_files"), &pass_eval(), None, None, None).expect("inscribe");
        let receipt = store.export_receipt(rune.sequence).expect("export").expect("present");
        assert!(verify_signature(&receipt.public_key, &receipt.rune.content_hash, &receipt.signature));
    }

    #[test]
    fn baseline_upsert_preserves_first_seen() {
        let (_dir, store) = test_store();
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
        let (_dir, store) = test_store();
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

    #[test]
    fn get_runes_filters_by_session_and_tool() {
        let (_dir, store) = test_store();
        store.inscribe(&ctx("list_files"), &pass_eval(), None, None, None).expect("inscribe");
        store.inscribe(&ctx("write_file"), &pass_eval(), None, None, None).expect("inscribe");
        let filtered = store
            .get_runes(&RuneFilter { tool_name: Some("write_file".to_string()), ..RuneFilter::default() })
            .expect("query");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].tool_name, "write_file");
    }

    #[test]
    fn tampering_with_a_persisted_rune_breaks_verification_at_that_sequence() {
        let (_dir, store) = test_store();
        for _ in 0..3 {
            store.inscribe(&ctx("list_files"), &pass_eval(), None, None, None).expect("inscribe");
        }
        {
            let connection = store.lock().expect("lock");
            let mut rune = connection
                .query_row("SELECT rune_json FROM runes WHERE sequence = 2", params![], |row| row.get::<_, Vec<u8>>(0))
                .map(|bytes| serde_json::from_slice::<Rune>(&bytes).expect("decode"))
                .expect("row");
            rune.decision = WardDecision::Halt;
            SqliteRunechainStore::replace_rune(&connection, &rune).expect("replace");
        }
        let result = store.verify_chain().expect("verify");
        assert!(!result.valid);
        assert_eq!(result.broken_at_sequence, Some(2));
    }
}
