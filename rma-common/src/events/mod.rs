//! Event types for the automation event system
//!
//! Workers publish what they did on a broadcast [`EventBus`]; logging and
//! telemetry subscribe. Nothing in the scheduling path depends on an event
//! being received.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Automation event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AutomationEvent {
    /// Play command issued for a catalog clip
    ClipStarted {
        media_id: i64,
        path: String,
        artist: String,
        title: String,
        /// Artist cooldown was ignored after the draw budget ran out
        forced_artist: bool,
        timestamp: DateTime<Utc>,
    },

    /// Monitor observed the playing → not-playing edge
    ClipFinished {
        /// Last polled position (seconds)
        position: f64,
        /// Last polled length (seconds)
        duration: f64,
        timestamp: DateTime<Utc>,
    },

    /// Every clip was inside the anti-repeat window; repeats were allowed
    SelectionDegraded { timestamp: DateTime<Utc> },

    /// Bumper/stinger sequence ran
    StingerPlayed { timestamp: DateTime<Utc> },

    /// One catalog sync pass finished
    CatalogRefreshed {
        added: usize,
        removed: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// Clip excluded from future selection
    ClipBlocked { path: String, timestamp: DateTime<Utc> },

    /// Supervisor replaced a dead worker
    WorkerRestarted {
        worker: String,
        timestamp: DateTime<Utc>,
    },
}

impl AutomationEvent {
    /// Event name, as used in log lines
    pub fn event_type(&self) -> &'static str {
        match self {
            AutomationEvent::ClipStarted { .. } => "ClipStarted",
            AutomationEvent::ClipFinished { .. } => "ClipFinished",
            AutomationEvent::SelectionDegraded { .. } => "SelectionDegraded",
            AutomationEvent::StingerPlayed { .. } => "StingerPlayed",
            AutomationEvent::CatalogRefreshed { .. } => "CatalogRefreshed",
            AutomationEvent::ClipBlocked { .. } => "ClipBlocked",
            AutomationEvent::WorkerRestarted { .. } => "WorkerRestarted",
        }
    }
}

/// Broadcast bus for [`AutomationEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AutomationEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering `capacity` events per slow subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<AutomationEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: AutomationEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit_lossy(AutomationEvent::StingerPlayed {
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "StingerPlayed");
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit_lossy(AutomationEvent::SelectionDegraded {
            timestamp: Utc::now(),
        });
        assert_eq!(bus.capacity(), 256);
    }

    #[test]
    fn test_serialized_with_type_tag() {
        let event = AutomationEvent::ClipBlocked {
            path: "ROCK MUSIC/A-B".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ClipBlocked");
        assert_eq!(json["path"], "ROCK MUSIC/A-B");
    }
}
