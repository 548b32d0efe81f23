// bifrost-config/src/config.rs
// ============================================================================
// Module: Bifrost Configuration Loader
// Description: TOML loading, `extends` resolution, and validation for
//              `bifrost.toml`.
// Purpose: Produce a `bifrost_core::model::BifrostConfig` that is already
//          known to satisfy every invariant the ward engine, runechain, and
//          sink fan-out assume at construction time.
// Dependencies: bifrost-core, serde, toml, crate::env_interp
// ============================================================================

//! ## Overview
//! Loading happens in four steps: read and size-check the file, interpolate
//! `${VAR}` / `${VAR:-default}` placeholders against the environment, parse
//! the TOML, then resolve `extends` by prepending each extended file's wards
//! and sinks ahead of the main file's own. `extends` targets are policy
//! fragments: only `wards` and `sinks` are read from them, since `version`,
//! `realm`, `defaults`, `storage`, `drift`, and `ai_analysis` are considered
//! properties of the top-level deployment, not of a shared policy file.
//! Validation is strict and fail-closed: an unknown `action`/`severity`, a
//! duplicate ward id, or a sink missing its required field is rejected with
//! the offending field named.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use bifrost_core::model::BifrostConfig;
use bifrost_core::model::SinkDeclaration;
use bifrost_core::model::Ward;
use bifrost_core::model::WardDecision;
use serde::Deserialize;
use thiserror::Error;

use crate::env_interp;
use crate::env_interp::EnvInterpError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is given.
const DEFAULT_CONFIG_NAME: &str = "bifrost.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "BIFROST_CONFIG";
/// Maximum configuration file size in bytes, main file or any extended file.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum number of `extends` hops resolved before rejecting the config.
pub(crate) const MAX_EXTENDS_DEPTH: usize = 16;
/// Maximum number of wards accepted in a single resolved config.
pub(crate) const MAX_WARDS: usize = 4096;
/// Maximum number of sink declarations accepted in a single resolved config.
pub(crate) const MAX_SINKS: usize = 256;
/// Sink event-filter values accepted in `sinks[].events`.
const VALID_SINK_EVENTS: [&str; 3] = ["PASS", "HALT", "RESHAPE"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading or validating a Bifrost configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading the config file or one of its `extends`
    /// targets.
    #[error("config io error reading '{path}': {source}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file (or an extended file) exceeds [`MAX_CONFIG_FILE_SIZE`].
    #[error("config file '{0}' exceeds the maximum size")]
    TooLarge(String),
    /// `${VAR}`/`${VAR:-default}` interpolation failed.
    #[error("config interpolation error in '{path}': {source}")]
    Interp {
        /// Path being interpolated.
        path: String,
        /// Underlying interpolation error.
        #[source]
        source: EnvInterpError,
    },
    /// TOML parsing failed.
    #[error("config parse error in '{path}': {source}")]
    Parse {
        /// Path being parsed.
        path: String,
        /// Underlying TOML parse error.
        #[source]
        source: Box<toml::de::Error>,
    },
    /// `extends` resolution exceeded [`MAX_EXTENDS_DEPTH`] or formed a cycle.
    #[error("config 'extends' chain from '{0}' is too deep or cyclic")]
    ExtendsTooDeep(String),
    /// A field failed validation; `field` names the offending config path.
    #[error("invalid config field '{field}': {reason}")]
    Invalid {
        /// Dotted path to the offending field, e.g. `wards[2].action`.
        field: String,
        /// Human-readable reason.
        reason: String,
    },
}

// ============================================================================
// SECTION: Policy Fragment (extends targets)
// ============================================================================

/// The subset of config fields an `extends` target may contribute: a shared
/// policy file is a library of wards and sinks, not a full deployment config.
#[derive(Debug, Default, Deserialize)]
struct PolicyFragment {
    /// Wards prepended ahead of the including file's own wards.
    #[serde(default)]
    wards: Vec<Ward>,
    /// Sinks prepended ahead of the including file's own sinks.
    #[serde(default)]
    sinks: Vec<SinkDeclaration>,
    /// Further `extends` targets, resolved transitively.
    #[serde(default)]
    extends: Vec<String>,
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Loads and fully resolves a Bifrost configuration from `path`, or from the
/// default resolution rules (the `BIFROST_CONFIG` environment variable, then
/// `bifrost.toml` in the current directory) when `path` is `None`.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read, interpolated, parsed,
/// or if the resolved configuration fails validation.
pub fn load(path: Option<&Path>) -> Result<BifrostConfig, ConfigError> {
    let resolved = resolve_path(path);
    let mut config = parse_file(&resolved)?;

    let mut prepended_wards = Vec::new();
    let mut prepended_sinks = Vec::new();
    resolve_extends(&resolved, &config.extends, 0, &mut BTreeSet::new(), &mut prepended_wards, &mut prepended_sinks)?;

    prepended_wards.append(&mut config.wards);
    config.wards = prepended_wards;
    prepended_sinks.append(&mut config.sinks);
    config.sinks = prepended_sinks;

    validate(&config)?;
    Ok(config)
}

/// Resolves the config path from the explicit argument, then the
/// `BIFROST_CONFIG` environment variable, then the default filename.
fn resolve_path(path: Option<&Path>) -> PathBuf {
    if let Some(path) = path {
        return path.to_path_buf();
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(env_path);
    }
    PathBuf::from(DEFAULT_CONFIG_NAME)
}

/// Reads, interpolates, and parses one config file into a [`BifrostConfig`].
fn parse_file(path: &Path) -> Result<BifrostConfig, ConfigError> {
    let text = read_and_interpolate(path)?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source: Box::new(source),
    })
}

/// Reads, interpolates, and parses one `extends` target into a fragment.
fn parse_fragment(path: &Path) -> Result<PolicyFragment, ConfigError> {
    let text = read_and_interpolate(path)?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source: Box::new(source),
    })
}

/// Reads `path`, enforces the size limit, and interpolates environment
/// placeholders, returning the resulting UTF-8 text.
fn read_and_interpolate(path: &Path) -> Result<String, ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::TooLarge(path.display().to_string()));
    }
    let content = String::from_utf8_lossy(&bytes);
    env_interp::interpolate(&content).map_err(|source| ConfigError::Interp {
        path: path.display().to_string(),
        source,
    })
}

/// Recursively resolves `extends` targets declared by the file at `from`,
/// appending their wards/sinks (in declaration order, depth-first) to
/// `wards`/`sinks`. `visited` guards against cycles; `depth` guards against
/// runaway chains.
fn resolve_extends(
    from: &Path,
    extends: &[String],
    depth: usize,
    visited: &mut BTreeSet<PathBuf>,
    wards: &mut Vec<Ward>,
    sinks: &mut Vec<SinkDeclaration>,
) -> Result<(), ConfigError> {
    if depth >= MAX_EXTENDS_DEPTH {
        return Err(ConfigError::ExtendsTooDeep(from.display().to_string()));
    }
    let base_dir = from.parent().unwrap_or_else(|| Path::new("."));
    for target in extends {
        let target_path = base_dir.join(target);
        let canonical = fs::canonicalize(&target_path).unwrap_or_else(|_| target_path.clone());
        if !visited.insert(canonical) {
            return Err(ConfigError::ExtendsTooDeep(target_path.display().to_string()));
        }
        let fragment = parse_fragment(&target_path)?;
        resolve_extends(&target_path, &fragment.extends, depth + 1, visited, wards, sinks)?;
        wards.extend(fragment.wards);
        sinks.extend(fragment.sinks);
    }
    Ok(())
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates a fully resolved configuration: duplicate ward ids, sink field
/// requirements, and storage adapter selection.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] naming the offending field.
fn validate(config: &BifrostConfig) -> Result<(), ConfigError> {
    if config.wards.len() > MAX_WARDS {
        return Err(invalid("wards", "exceeds the maximum number of wards"));
    }
    if config.sinks.len() > MAX_SINKS {
        return Err(invalid("sinks", "exceeds the maximum number of sinks"));
    }

    let mut seen_ids = BTreeSet::new();
    for (index, ward) in config.wards.iter().enumerate() {
        if !seen_ids.insert(ward.id.as_str().to_string()) {
            return Err(invalid(&format!("wards[{index}].id"), "duplicate ward id"));
        }
        if ward.tool.is_empty() {
            return Err(invalid(&format!("wards[{index}].tool"), "must not be empty"));
        }
        if ward.message.is_empty() {
            return Err(invalid(&format!("wards[{index}].message"), "must not be empty"));
        }
    }

    for (index, sink) in config.sinks.iter().enumerate() {
        match sink.sink_type.as_str() {
            "webhook" if sink.url.is_none() => {
                return Err(invalid(&format!("sinks[{index}].url"), "required when type is 'webhook'"));
            }
            "otlp" if sink.endpoint.is_none() => {
                return Err(invalid(&format!("sinks[{index}].endpoint"), "required when type is 'otlp'"));
            }
            "stdout" | "webhook" | "otlp" => {}
            other => {
                return Err(invalid(
                    &format!("sinks[{index}].type"),
                    &format!("unknown sink type '{other}'"),
                ));
            }
        }
        for event in &sink.events {
            let tag = sink_decision_tag(*event);
            if !VALID_SINK_EVENTS.contains(&tag) {
                return Err(invalid(&format!("sinks[{index}].events"), "must be one of PASS|HALT|RESHAPE"));
            }
        }
    }

    match config.storage.adapter.as_str() {
        "memory" => {}
        "sqlite" => {
            if config.storage.path.is_none() {
                return Err(invalid("storage.path", "required when adapter is 'sqlite'"));
            }
        }
        other => {
            return Err(invalid("storage.adapter", &format!("unknown storage adapter '{other}'")));
        }
    }

    if config.version.is_empty() {
        return Err(invalid("version", "must not be empty"));
    }
    if config.realm.as_str().is_empty() {
        return Err(invalid("realm", "must not be empty"));
    }

    Ok(())
}

/// Renders a [`WardDecision`] as the event-filter tag spelling used in
/// config validation messages.
const fn sink_decision_tag(decision: WardDecision) -> &'static str {
    match decision {
        WardDecision::Pass => "PASS",
        WardDecision::Reshape => "RESHAPE",
        WardDecision::Halt => "HALT",
    }
}

/// Builds a [`ConfigError::Invalid`] for `field`.
fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
