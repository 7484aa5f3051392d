// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engine events published to the (external) event bus.
//!
//! Events are a *result* of a committed state change, never a trigger for
//! one. Publishing is fire-and-forget: a full or missing subscriber never
//! fails the operation that produced the event.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Kind of engine event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A player's daily score changed (approval or growth completion).
    ScoreChanged,
    /// The daily generator created a new task instance.
    InstanceCreated,
}

impl EventType {
    /// Stable string form used in event payloads and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScoreChanged => "score_changed",
            Self::InstanceCreated => "instance_created",
        }
    }
}

/// A state-change notification published by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    /// What happened.
    pub event_type: EventType,
    /// The player the event concerns.
    pub player_id: String,
    /// The calendar day (reference timezone) the event concerns.
    pub date: NaiveDate,
    /// Event-specific details (instance/template ids, points).
    pub payload: serde_json::Value,
}

/// Sink for engine events. Delivery to UIs is out of scope here.
pub trait EventBus: Send + Sync {
    /// Publish an event. Must not block and must not fail the caller.
    fn publish(&self, event: EngineEvent);
}

/// Event bus backed by a tokio broadcast channel.
///
/// Subscribers that lag simply miss events; the engine does not care.
pub struct BroadcastBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl BroadcastBus {
    /// Create a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus for BroadcastBus {
    fn publish(&self, event: EngineEvent) {
        // send() only errs when there are no subscribers; that is fine.
        if self.tx.send(event).is_err() {
            debug!("No event subscribers; dropping event");
        }
    }
}

/// Event bus that drops everything. Useful for jobs and tests that do not
/// observe events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBus;

impl EventBus for NullBus {
    fn publish(&self, _event: EngineEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_event() -> EngineEvent {
        EngineEvent {
            event_type: EventType::ScoreChanged,
            player_id: "kid-1".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            payload: serde_json::json!({ "points_awarded": 150 }),
        }
    }

    #[tokio::test]
    async fn test_broadcast_bus_delivers_to_subscriber() {
        let bus = BroadcastBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(sample_event());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::ScoreChanged);
        assert_eq!(event.player_id, "kid-1");
        assert_eq!(event.payload["points_awarded"], 150);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_does_not_panic() {
        let bus = BroadcastBus::new(8);
        bus.publish(sample_event());

        let null = NullBus;
        null.publish(sample_event());
    }

    #[test]
    fn test_event_type_as_str() {
        assert_eq!(EventType::ScoreChanged.as_str(), "score_changed");
        assert_eq!(EventType::InstanceCreated.as_str(), "instance_created");
    }

    #[test]
    fn test_event_serializes_snake_case() {
        let json = serde_json::to_value(sample_event()).unwrap();
        assert_eq!(json["event_type"], "score_changed");
        assert_eq!(json["date"], "2025-03-10");
    }
}
