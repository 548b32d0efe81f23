// bifrost-config/src/lib.rs
// ============================================================================
// Module: Bifrost Config Library
// Description: TOML configuration loading, `extends` resolution, environment
//              interpolation, and validation for `bifrost.toml`.
// Purpose: Single source of truth for turning a config file on disk into a
//          validated `bifrost_core::model::BifrostConfig`.
// Dependencies: bifrost-core, serde, toml
// ============================================================================

//! ## Overview
//! `bifrost-config` owns everything between "bytes on disk" and a
//! [`bifrost_core::model::BifrostConfig`] the rest of Bifrost can trust:
//! reading the file, resolving `extends`, interpolating `${VAR}` /
//! `${VAR:-default}` placeholders, and validating the result.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod env_interp;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::CONFIG_ENV_VAR;
pub use config::ConfigError;
pub use config::load;
