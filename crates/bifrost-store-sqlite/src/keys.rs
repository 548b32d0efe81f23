// bifrost-store-sqlite/src/keys.rs
// ============================================================================
// Module: Signing Key File Management
// Description: Loads or generates the Ed25519 key pair that signs a
//              `SQLite`-backed runechain, persisting it next to the database.
// Purpose: Give the durable store adapter its own key material, since
//          `bifrost_core::runechain::SigningMaterial` exposes no accessor
//          for the raw signing key it wraps.
// Dependencies: bifrost-core, ed25519-dalek, rand, base64
// ============================================================================

//! ## Overview
//! A store at `<name>.db` keeps its private key at `<name>.db.key` (raw
//! 32-byte seed, owner-only permissions) and its public key at
//! `<name>.db.pub` (base64 text). On open, an existing key is loaded; absent
//! a key file, a fresh pair is generated and both files are written before
//! the store signs its first rune.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bifrost_core::runechain::SigningMaterial;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use thiserror::Error;

/// File extension appended to the store path for the private key file.
const KEY_EXTENSION: &str = "key";
/// File extension appended to the store path for the public key file.
const PUB_EXTENSION: &str = "pub";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading or generating signing key material.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Reading or writing a key file failed.
    #[error("signing key io error: {0}")]
    Io(#[from] io::Error),
    /// The private key file did not contain a 32-byte seed.
    #[error("signing key file is malformed: expected 32 bytes, found {0}")]
    Malformed(usize),
}

// ============================================================================
// SECTION: Key Paths
// ============================================================================

/// Returns the `(private, public)` key file paths for a store at `db_path`.
#[must_use]
pub fn key_paths(db_path: &Path) -> (PathBuf, PathBuf) {
    let mut key_path = db_path.as_os_str().to_owned();
    key_path.push(".");
    key_path.push(KEY_EXTENSION);
    let mut pub_path = db_path.as_os_str().to_owned();
    pub_path.push(".");
    pub_path.push(PUB_EXTENSION);
    (PathBuf::from(key_path), PathBuf::from(pub_path))
}

// ============================================================================
// SECTION: Load / Generate
// ============================================================================

/// Loads the signing key at `key_path`, or generates and persists a fresh
/// one alongside `pub_path` if no key file exists yet.
///
/// # Errors
///
/// Returns [`KeyError`] if the key files cannot be read or written, or if
/// an existing private key file is malformed.
pub fn load_or_generate(key_path: &Path, pub_path: &Path) -> Result<SigningMaterial, KeyError> {
    if key_path.exists() {
        let bytes = fs::read(key_path)?;
        let seed: [u8; 32] =
            bytes.clone().try_into().map_err(|_| KeyError::Malformed(bytes.len()))?;
        let signing_key = SigningKey::from_bytes(&seed);
        return Ok(SigningMaterial::from_signing_key(signing_key));
    }
    let signing_key = SigningKey::generate(&mut OsRng);
    write_key_file(key_path, &signing_key.to_bytes())?;
    let public_b64 = BASE64.encode(signing_key.verifying_key().to_bytes());
    fs::write(pub_path, public_b64)?;
    Ok(SigningMaterial::from_signing_key(signing_key))
}

/// Writes the raw 32-byte seed to `path`, restricting permissions to the
/// owner where the platform supports it.
fn write_key_file(path: &Path, seed: &[u8; 32]) -> Result<(), io::Error> {
    fs::write(path, seed)?;
    set_owner_only(path)
}

/// Restricts `path` to owner read/write. A no-op on platforms without Unix
/// permission bits.
#[cfg(unix)]
fn set_owner_only(path: &Path) -> Result<(), io::Error> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

/// Restricts `path` to owner read/write. A no-op on platforms without Unix
/// permission bits.
#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> Result<(), io::Error> {
    Ok(())
}
