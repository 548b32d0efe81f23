// bifrost-core/src/live_bus.rs
// ============================================================================
// Module: Bifrost Live Bus
// Description: Single-process publish/subscribe fan-out for live observers.
// Purpose: Push inscribed runes and drift findings to websocket-style
//          subscribers without blocking the hot path on a slow reader.
// Dependencies: tokio::sync::mpsc, crate::model
// ============================================================================

//! ## Overview
//! [`LiveBus`] holds a list of per-subscriber bounded channels. A publish
//! tries to send to every subscriber; a subscriber whose queue is full or
//! whose receiver has been dropped is disconnected rather than allowed to
//! block the publisher. Per-subscriber order always matches publish order;
//! there is no ordering guarantee across subscribers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc::Receiver;
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::channel;

use crate::model::DriftChange;
use crate::model::Rune;

/// Default bound of a subscriber's outstanding-event queue.
const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

// ============================================================================
// SECTION: Live Event
// ============================================================================

/// A message pushed to live subscribers, tagged by kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LiveEvent {
    /// A rune was just inscribed into the runechain.
    Rune(Rune),
    /// Drift was detected against a stored baseline.
    Drift(Vec<DriftChange>),
}

// ============================================================================
// SECTION: Live Bus
// ============================================================================

/// A single-process publisher with zero or more live subscribers.
pub struct LiveBus {
    /// Active subscriber senders; pruned lazily on publish.
    subscribers: Mutex<Vec<Sender<LiveEvent>>>,
}

impl LiveBus {
    /// Creates a live bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self { subscribers: Mutex::new(Vec::new()) }
    }

    /// Registers a new subscriber and returns its receiving end.
    ///
    /// # Panics
    ///
    /// Panics if the internal subscriber list's mutex is poisoned.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<LiveEvent> {
        let (tx, rx) = channel(DEFAULT_SUBSCRIBER_CAPACITY);
        let mut subscribers = self.subscribers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        subscribers.push(tx);
        rx
    }

    /// Number of currently connected subscribers.
    ///
    /// # Panics
    ///
    /// Panics if the internal subscriber list's mutex is poisoned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let subscribers = self.subscribers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        subscribers.len()
    }

    /// Publishes an event to every connected subscriber. A subscriber whose
    /// queue is full or whose receiver has dropped is disconnected.
    ///
    /// # Panics
    ///
    /// Panics if the internal subscriber list's mutex is poisoned.
    pub fn publish(&self, event: LiveEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        subscribers.retain(|tx| tx.try_send(event.clone()).is_ok());
    }
}

impl Default for LiveBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
    #![allow(clippy::expect_used, reason = "Tests use expect for explicit failure messages.")]
    use super::*;
    use crate::model::DriftChangeType;
    use crate::model::WardSeverity;

    fn sample_drift() -> Vec<DriftChange> {
        vec![DriftChange {
            change_type: DriftChangeType::Added,
            tool_name: "send_report".to_string(),
            severity: WardSeverity::High,
            details: "tool present in current catalogue but absent from baseline".to_string(),
        }]
    }

    #[tokio::test]
    async fn subscriber_receives_published_event_in_order() {
        let bus = LiveBus::new();
        let mut rx = bus.subscribe();
        bus.publish(LiveEvent::Drift(sample_drift()));
        bus.publish(LiveEvent::Drift(Vec::new()));

        let first = rx.recv().await.expect("first event");
        let second = rx.recv().await.expect("second event");
        match (first, second) {
            (LiveEvent::Drift(a), LiveEvent::Drift(b)) => {
                assert_eq!(a.len(), 1);
                assert!(b.is_empty());
            }
            _ => unreachable!("events should be drift variants"),
        }
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned_on_next_publish() {
        let bus = LiveBus::new();
        let rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(rx);
        bus.publish(LiveEvent::Drift(Vec::new()));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = LiveBus::new();
        bus.publish(LiveEvent::Drift(sample_drift()));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_the_event() {
        let bus = LiveBus::new();
        let mut rx_a = bus.subscribe();
        let mut rx_b = bus.subscribe();
        bus.publish(LiveEvent::Drift(sample_drift()));
        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }
}
