// bifrost-core/src/rate_limit.rs
// ============================================================================
// Module: Bifrost Rate Limiter
// Description: In-memory sliding-window call counter.
// Purpose: Back the ward engine's `max_calls_per_minute` clause and expose a
//          bounded-memory `RateLimitProvider`.
// Dependencies: crate::interfaces, std::sync
// ============================================================================

//! ## Overview
//! Each `record` call stamps both the specific `(session, tool)` key and the
//! session-wide wildcard key `(session, "*")`, so a ward with `tool = "*"`
//! can rate-limit across every tool a session calls. A low-frequency garbage
//! collection pass bounds memory by evicting keys that have gone quiet.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Instant;

use crate::identifiers::SessionId;
use crate::interfaces::RateLimitProvider;

/// Wildcard counting key recorded alongside every specific tool key.
const WILDCARD_TOOL: &str = "*";

/// Number of `record` calls between garbage-collection sweeps.
const GC_INTERVAL_CALLS: u64 = 256;

/// Minimum age, relative to the query window, after which a quiet key is
/// evicted entirely rather than merely trimmed.
const GC_MAX_AGE_WINDOW_MULTIPLE: u64 = 2;

/// Widest window, in milliseconds, this limiter is expected to be queried
/// with; used to size the garbage-collection retention horizon.
const GC_RETENTION_WINDOW_MS: u64 = 60_000;

// ============================================================================
// SECTION: In-Memory Rate Limiter
// ============================================================================

/// A bounded-memory sliding-window counter keyed by `(session, tool)`.
pub struct InMemoryRateLimiter {
    /// Recent call instants per key, newest pushed last.
    calls: Mutex<HashMap<(String, String), Vec<Instant>>>,
    /// Number of `record` calls observed, used to pace garbage collection.
    call_count: AtomicU64,
}

impl InMemoryRateLimiter {
    /// Creates an empty rate limiter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            call_count: AtomicU64::new(0),
        }
    }

    /// Drops map entries whose newest stamp is older than the retention
    /// horizon. Runs inline on every `GC_INTERVAL_CALLS`th call to avoid a
    /// background thread.
    fn maybe_gc(&self) {
        let seen = self.call_count.fetch_add(1, Ordering::Relaxed) + 1;
        if seen % GC_INTERVAL_CALLS != 0 {
            return;
        }
        let max_age = std::time::Duration::from_millis(GC_RETENTION_WINDOW_MS * GC_MAX_AGE_WINDOW_MULTIPLE);
        let now = Instant::now();
        let Ok(mut calls) = self.calls.lock() else {
            return;
        };
        calls.retain(|_, stamps| stamps.last().is_some_and(|newest| now.duration_since(*newest) < max_age));
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitProvider for InMemoryRateLimiter {
    fn record(&self, session: &SessionId, tool: &str) {
        let now = Instant::now();
        if let Ok(mut calls) = self.calls.lock() {
            calls
                .entry((session.as_str().to_string(), tool.to_string()))
                .or_default()
                .push(now);
            if tool != WILDCARD_TOOL {
                calls
                    .entry((session.as_str().to_string(), WILDCARD_TOOL.to_string()))
                    .or_default()
                    .push(now);
            }
        }
        self.maybe_gc();
    }

    fn count(&self, session: &SessionId, tool: &str, window_ms: u64) -> u64 {
        let cutoff = std::time::Duration::from_millis(window_ms);
        let now = Instant::now();
        let Ok(mut calls) = self.calls.lock() else {
            return 0;
        };
        let key = (session.as_str().to_string(), tool.to_string());
        let Some(stamps) = calls.get_mut(&key) else {
            return 0;
        };
        stamps.retain(|stamp| now.duration_since(*stamp) < cutoff);
        u64::try_from(stamps.len()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_then_count_reports_exact_call_count() {
        let limiter = InMemoryRateLimiter::new();
        let session = SessionId::new("sess-1");
        for _ in 0..5 {
            limiter.record(&session, "send_report");
        }
        assert_eq!(limiter.count(&session, "send_report", 60_000), 5);
    }

    #[test]
    fn wildcard_key_aggregates_across_tools() {
        let limiter = InMemoryRateLimiter::new();
        let session = SessionId::new("sess-1");
        limiter.record(&session, "send_report");
        limiter.record(&session, "list_files");
        assert_eq!(limiter.count(&session, "*", 60_000), 2);
    }

    #[test]
    fn count_with_no_recorded_calls_is_zero() {
        let limiter = InMemoryRateLimiter::new();
        let session = SessionId::new("sess-unused");
        assert_eq!(limiter.count(&session, "send_report", 60_000), 0);
    }

    #[test]
    fn distinct_sessions_are_isolated() {
        let limiter = InMemoryRateLimiter::new();
        let a = SessionId::new("sess-a");
        let b = SessionId::new("sess-b");
        limiter.record(&a, "send_report");
        assert_eq!(limiter.count(&a, "send_report", 60_000), 1);
        assert_eq!(limiter.count(&b, "send_report", 60_000), 0);
    }
}
