// bifrost-core/src/time.rs
// ============================================================================
// Module: Bifrost Time Model
// Description: Canonical UTC timestamp representation for runes and baselines.
// Purpose: Provide a single, serializable ISO-8601 timestamp type.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Runes and baselines are stamped with wall-clock UTC time at the moment
//! they are recorded. Unlike a replayed scenario log, the audit trail is not
//! expected to be deterministic across runs, so this type wraps
//! [`time::OffsetDateTime`] directly rather than an explicit logical clock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// A UTC instant, serialized as an ISO-8601 / RFC 3339 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Captures the current UTC instant.
    #[must_use]
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Wraps an existing offset date-time, normalizing it to UTC.
    #[must_use]
    pub fn from_offset_date_time(value: OffsetDateTime) -> Self {
        Self(value.to_offset(time::UtcOffset::UTC))
    }

    /// Returns the number of whole milliseconds elapsed since `earlier`.
    ///
    /// Returns `0` if `earlier` is not before `self`.
    #[must_use]
    pub fn since_ms(&self, earlier: &Self) -> u64 {
        let delta = self.0 - earlier.0;
        u64::try_from(delta.whole_milliseconds()).unwrap_or(0)
    }

    /// Renders the timestamp as an RFC 3339 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying time value cannot be formatted,
    /// which does not happen for any instant produced by [`Timestamp::now`].
    pub fn to_rfc3339(self) -> Result<String, time::error::Format> {
        self.0.format(&Rfc3339)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Ok(text) => f.write_str(&text),
            Err(_) => f.write_str("<invalid-timestamp>"),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let text = self.to_rfc3339().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let parsed = OffsetDateTime::parse(&text, &Rfc3339).map_err(serde::de::Error::custom)?;
        Ok(Self::from_offset_date_time(parsed))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
    #![allow(clippy::expect_used, reason = "Tests use expect for explicit failure messages.")]
    use super::*;

    #[test]
    fn round_trips_through_rfc3339() {
        let stamp = Timestamp::now();
        let text = stamp.to_rfc3339().expect("format");
        let json = serde_json::to_string(&stamp).expect("serialize");
        assert_eq!(json, format!("\"{text}\""));
        let parsed: Timestamp = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, stamp);
    }

    #[test]
    fn since_ms_is_monotonic_for_later_instants() {
        let earlier = Timestamp::now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let later = Timestamp::now();
        assert!(later.since_ms(&earlier) >= 1);
        assert_eq!(earlier.since_ms(&later), 0);
    }
}
