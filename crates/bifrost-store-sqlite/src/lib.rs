// bifrost-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Runechain Store
// Description: Durable RunechainStore backed by SQLite WAL.
// Purpose: Provide production-grade persistence for the Bifrost runechain.
// Dependencies: bifrost-core, rusqlite, ed25519-dalek
// ============================================================================

//! ## Overview
//! This crate provides a `SQLite`-backed [`bifrost_core::interfaces::RunechainStore`]
//! implementation. Every inscribed rune is written as a canonical JSON blob
//! alongside indexed columns for the lookups the proxy performs on the hot
//! path; signing material is generated on first use and persisted next to
//! the database file so the chain's public key survives a restart.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod keys;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use keys::KeyError;
pub use store::SqliteRunechainStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
