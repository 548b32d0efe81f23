// bifrost-cli/src/error.rs
// ============================================================================
// Module: CLI Errors
// Description: Top-level error type the binary maps to a process exit code.
// Purpose: Fold every subsystem's error type into one place `main` can
//          report and translate to `ExitCode::FAILURE`.
// Dependencies: bifrost-{config,core,broker,contract,store-sqlite}
// ============================================================================

use thiserror::Error;

/// Everything that can go wrong before or while the proxy is serving.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded or failed validation.
    #[error("config error: {0}")]
    Config(#[from] bifrost_config::ConfigError),
    /// A ward failed to compile.
    #[error("ward configuration error: {0}")]
    Ward(#[from] bifrost_core::WardConfigError),
    /// A declared sink could not be built.
    #[error("sink configuration error: {0}")]
    Fanout(#[from] bifrost_broker::FanoutError),
    /// The `SQLite` storage adapter could not be opened.
    #[error("storage error: {0}")]
    Sqlite(#[from] bifrost_store_sqlite::SqliteStoreError),
    /// The downstream child process could not be spawned.
    #[error("downstream error: {0}")]
    Downstream(#[from] bifrost_core::DownstreamError),
    /// The upstream transport loop failed.
    #[error("upstream io error: {0}")]
    Io(#[from] std::io::Error),
    /// The blocking serve task panicked or was cancelled.
    #[error("serve task error: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// `storage.adapter` named something other than `memory` or `sqlite`.
    #[error("unknown storage adapter '{0}'")]
    UnknownStorageAdapter(String),
    /// `storage.adapter` was `sqlite` with no `path` configured.
    #[error("storage adapter is sqlite but no path was configured")]
    MissingStoragePath,
}
