// bifrost-config/src/env_interp.rs
// ============================================================================
// Module: Bifrost Config Environment Interpolation
// Description: Resolves `${VAR}` / `${VAR:-default}` placeholders in config
//              text against the process environment.
// Purpose: Let operators keep secrets and per-environment values out of
//          checked-in config files.
// Dependencies: std::env
// ============================================================================

//! ## Overview
//! Interpolation runs once, over the raw config text, before TOML parsing.
//! A bare `${VAR}` is required: an unset variable is a fatal config error. A
//! `${VAR:-default}` falls back to `default` when `VAR` is unset, silently.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while interpolating environment placeholders.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvInterpError {
    /// A required `${VAR}` placeholder had no corresponding environment
    /// variable set.
    #[error("environment variable '{0}' is required but not set")]
    MissingVariable(String),
    /// A `${...}` placeholder was opened but never closed.
    #[error("unterminated '${{' placeholder starting at byte {0}")]
    Unterminated(usize),
}

// ============================================================================
// SECTION: Interpolation
// ============================================================================

/// Replaces every `${VAR}` / `${VAR:-default}` placeholder in `input` against
/// the process environment.
///
/// # Errors
///
/// Returns [`EnvInterpError`] if a required variable is unset or a
/// placeholder is malformed.
pub fn interpolate(input: &str) -> Result<String, EnvInterpError> {
    interpolate_with(input, |key| env::var(key).ok())
}

/// Same as [`interpolate`], resolving variables through `resolve` instead of
/// the process environment. Exposed for testability.
pub(crate) fn interpolate_with(
    input: &str,
    resolve: impl Fn(&str) -> Option<String>,
) -> Result<String, EnvInterpError> {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            let start = i;
            let Some(close_offset) = input[i + 2..].find('}') else {
                return Err(EnvInterpError::Unterminated(start));
            };
            let body = &input[i + 2..i + 2 + close_offset];
            out.push_str(&resolve_placeholder(body, &resolve)?);
            i = i + 2 + close_offset + 1;
        } else {
            let ch_len = input[i..].chars().next().map_or(1, char::len_utf8);
            out.push_str(&input[i..i + ch_len]);
            i += ch_len;
        }
    }
    Ok(out)
}

/// Resolves one placeholder body (the text between `${` and `}`), which is
/// either `VAR` or `VAR:-default`.
fn resolve_placeholder(
    body: &str,
    resolve: &impl Fn(&str) -> Option<String>,
) -> Result<String, EnvInterpError> {
    match body.split_once(":-") {
        Some((name, default)) => Ok(resolve(name).unwrap_or_else(|| default.to_string())),
        None => resolve(body).ok_or_else(|| EnvInterpError::MissingVariable(body.to_string())),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
    #![allow(clippy::expect_used, reason = "Tests use expect for explicit failure messages.")]
    use super::*;

    fn env_of(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| (*v).to_string())
    }

    #[test]
    fn resolves_required_placeholder() {
        let result = interpolate_with("url = \"${HOST}/x\"", env_of(&[("HOST", "example.internal")]));
        assert_eq!(result.expect("ok"), "url = \"example.internal/x\"");
    }

    #[test]
    fn falls_back_when_unset() {
        let result = interpolate_with("port = \"${PORT:-8080}\"", env_of(&[]));
        assert_eq!(result.expect("ok"), "port = \"8080\"");
    }

    #[test]
    fn prefers_set_value_over_default() {
        let result = interpolate_with("port = \"${PORT:-8080}\"", env_of(&[("PORT", "9090")]));
        assert_eq!(result.expect("ok"), "port = \"9090\"");
    }

    #[test]
    fn missing_required_variable_is_an_error() {
        let result = interpolate_with("${MISSING}", env_of(&[]));
        assert_eq!(result.unwrap_err(), EnvInterpError::MissingVariable("MISSING".to_string()));
    }

    #[test]
    fn unterminated_placeholder_is_an_error() {
        let result = interpolate_with("${OPEN", env_of(&[]));
        assert!(matches!(result, Err(EnvInterpError::Unterminated(0))));
    }

    #[test]
    fn leaves_text_without_placeholders_untouched() {
        let result = interpolate_with("plain text, no placeholders", env_of(&[]));
        assert_eq!(result.expect("ok"), "plain text, no placeholders");
    }
}
