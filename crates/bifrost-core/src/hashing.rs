// bifrost-core/src/hashing.rs
// ============================================================================
// Module: Bifrost Canonical Hashing
// Description: RFC 8785 JSON canonicalization and SHA-256 content hashing.
// Purpose: Provide deterministic hashes for rune content and tool catalogues.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! The runechain and drift detector both depend on a single deterministic
//! hashing primitive: RFC 8785 (JCS) canonicalization followed by SHA-256.
//! Canonicalization recursively sorts object keys and preserves array order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing canonical hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes the canonical JSON rendering of `value`, returning lowercase hex.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn hash_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(sha256_hex(&bytes))
}

/// Hashes raw bytes with SHA-256, returning lowercase hex.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    hex_encode(&digest)
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
    #![allow(clippy::expect_used, reason = "Tests use expect for explicit failure messages.")]
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_hash_is_stable_under_key_reordering() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(hash_canonical_json(&a).unwrap(), hash_canonical_json(&b).unwrap());
    }

    #[test]
    fn canonical_hash_is_sensitive_to_array_order() {
        let a = json!({"xs": [1, 2, 3]});
        let b = json!({"xs": [3, 2, 1]});
        assert_ne!(hash_canonical_json(&a).unwrap(), hash_canonical_json(&b).unwrap());
    }

    #[test]
    fn sha256_hex_is_lowercase_and_64_chars() {
        let digest = sha256_hex(b"bifrost");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    proptest::proptest! {
        /// `sha256_hex` always returns 64 lowercase hex characters, for any input.
        #[test]
        fn sha256_hex_is_always_well_formed(bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            let digest = sha256_hex(&bytes);
            proptest::prop_assert_eq!(digest.len(), 64);
            proptest::prop_assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }

        /// Reordering an object's keys before serialization never changes its
        /// canonical hash.
        #[test]
        fn canonical_hash_ignores_insertion_order(
            first in "[a-z]{1,8}", second in "[a-z]{1,8}",
            first_value in proptest::prelude::any::<i32>(), second_value in proptest::prelude::any::<i32>(),
        ) {
            proptest::prop_assume!(first != second);
            let forward = serde_json::json!({ first.clone(): first_value, second.clone(): second_value });
            let reversed = serde_json::json!({ second: second_value, first: first_value });
            proptest::prop_assert_eq!(hash_canonical_json(&forward).unwrap(), hash_canonical_json(&reversed).unwrap());
        }
    }
}
