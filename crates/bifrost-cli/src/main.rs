// bifrost-cli/src/main.rs
// ============================================================================
// Module: Bifrost CLI Entry Point
// Description: Starts one Bifrost Gate proxy session in front of a
//              downstream tool process, speaking JSON-RPC over stdio.
// Purpose: Thin wrapper wiring config, policy engine, storage, sinks, and
//          the downstream/upstream transports into one running proxy.
// Dependencies: clap, tokio, bifrost-{config,core,broker,contract,gateway,store-sqlite}
// ============================================================================

//! ## Overview
//! `bifrost-gate` parses a config path and a downstream command, builds a
//! [`bifrost_core::runtime::BifrostProxy`] from them, and serves it against
//! this process's own stdin/stdout until the downstream session ends. No
//! other CLI surface is exposed; offline runechain inspection is a job for
//! a separate tool, not this one.

mod backend;
mod error;

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use backend::StoreBackend;
use bifrost_broker::CompositeSinkFanout;
use bifrost_contract::StdioDownstreamClient;
use bifrost_core::InMemoryRateLimiter;
use bifrost_core::LiveBus;
use bifrost_core::RateLimitProvider;
use bifrost_core::Runechain;
use bifrost_core::ServerId;
use bifrost_core::SessionId;
use bifrost_core::WardEngine;
use bifrost_core::model::StorageDeclaration;
use bifrost_core::runtime::BifrostProxy;
use bifrost_core::runtime::InMemoryRunechainStore;
use bifrost_gateway::DiagnosticSink;
use bifrost_gateway::NoopDiagnosticSink;
use bifrost_gateway::StderrDiagnosticSink;
use bifrost_store_sqlite::SqliteRunechainStore;
use bifrost_store_sqlite::SqliteStoreConfig;
use clap::Parser;
use error::CliError;

type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: CLI Arguments
// ============================================================================

/// Starts a Bifrost Gate proxy in front of a downstream tool process.
#[derive(Parser, Debug)]
#[command(name = "bifrost-gate", version, about)]
struct Cli {
    /// Path to the bifrost config file. Falls back to `BIFROST_CONFIG`, then
    /// a built-in default path.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Server identity recorded on every inscribed rune.
    #[arg(long, default_value = "default")]
    server_id: String,
    /// Evaluate wards and audit every call, but forward regardless of
    /// decision; `HALT` is inscribed with the actual response attached
    /// instead of blocking the call.
    #[arg(long)]
    dry_run: bool,
    /// Suppress stderr diagnostics.
    #[arg(long)]
    quiet: bool,
    /// Downstream command to spawn and speak JSON-RPC to over stdio.
    downstream_command: String,
    /// Arguments passed to the downstream command.
    downstream_args: Vec<String>,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Builds and serves the proxy described by the parsed arguments.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let diagnostics: Arc<dyn DiagnosticSink> =
        if cli.quiet { Arc::new(NoopDiagnosticSink::new()) } else { Arc::new(StderrDiagnosticSink::new()) };

    let config = bifrost_config::load(cli.config.as_deref())?;
    diagnostics.info("configuration loaded");

    let rate_limiter: Arc<dyn RateLimitProvider> = Arc::new(InMemoryRateLimiter::new());
    let ward_engine =
        WardEngine::new(config.wards.clone(), config.defaults.action)?.with_rate_limiter(Arc::clone(&rate_limiter));

    let store = open_store(&config.storage)?;
    let runechain = Runechain::new(store);

    let sinks = CompositeSinkFanout::from_declarations(&config.sinks)?.into_sinks();
    let live_bus = Arc::new(LiveBus::new());

    let downstream = StdioDownstreamClient::spawn(&cli.downstream_command, &cli.downstream_args)?;
    diagnostics.info("downstream process spawned");

    let mut proxy =
        BifrostProxy::new(ward_engine, runechain, rate_limiter, sinks, live_bus, config.drift.clone(), cli.dry_run, downstream);

    let server_id = ServerId::new(cli.server_id);
    let session_id = SessionId::new(format!("pid-{}", std::process::id()));
    diagnostics.info("proxy serving");

    tokio::task::spawn_blocking(move || {
        bifrost_contract::serve(&mut proxy, &server_id, &session_id, std::io::stdin().lock(), std::io::stdout().lock())
    })
    .await??;

    diagnostics.info("proxy stopped");
    Ok(ExitCode::SUCCESS)
}

/// Opens the runechain store named by `storage.adapter`.
fn open_store(storage: &StorageDeclaration) -> CliResult<StoreBackend> {
    match storage.adapter.as_str() {
        "memory" => Ok(StoreBackend::Memory(InMemoryRunechainStore::new())),
        "sqlite" => {
            let path = storage.path.clone().ok_or(CliError::MissingStoragePath)?;
            let sqlite_config = SqliteStoreConfig {
                path: PathBuf::from(path),
                busy_timeout_ms: 5_000,
                journal_mode: Default::default(),
                sync_mode: Default::default(),
            };
            Ok(StoreBackend::Sqlite(SqliteRunechainStore::new(sqlite_config)?))
        }
        other => Err(CliError::UnknownStorageAdapter(other.to_string())),
    }
}

/// Writes `message` to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "{message}");
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
    #![allow(clippy::expect_used, reason = "Tests use expect for explicit failure messages.")]
    use super::*;

    #[test]
    fn open_store_rejects_unknown_adapter() {
        let storage = StorageDeclaration { adapter: "postgres".to_string(), path: None };
        let err = open_store(&storage).expect_err("unknown adapter must fail");
        assert!(matches!(err, CliError::UnknownStorageAdapter(name) if name == "postgres"));
    }

    #[test]
    fn open_store_rejects_sqlite_without_path() {
        let storage = StorageDeclaration { adapter: "sqlite".to_string(), path: None };
        let err = open_store(&storage).expect_err("missing path must fail");
        assert!(matches!(err, CliError::MissingStoragePath));
    }

    #[test]
    fn open_store_opens_sqlite_at_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("runechain.sqlite3");
        let storage = StorageDeclaration { adapter: "sqlite".to_string(), path: Some(path.display().to_string()) };
        let store = open_store(&storage).expect("sqlite store should open");
        assert!(matches!(store, StoreBackend::Sqlite(_)));
    }

    #[test]
    fn open_store_opens_memory_store() {
        let storage = StorageDeclaration { adapter: "memory".to_string(), path: None };
        let store = open_store(&storage).expect("memory store should open");
        assert!(matches!(store, StoreBackend::Memory(_)));
    }
}
