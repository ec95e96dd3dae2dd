//! Event log
//!
//! Writes every automation event to the log as one JSON line.

use rma_common::events::AutomationEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub async fn log_events(mut rx: broadcast::Receiver<AutomationEvent>, shutdown: CancellationToken) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = rx.recv() => event,
        };

        match event {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => debug!(event = event.event_type(), "{}", json),
                Err(e) => warn!("Could not encode {} event: {}", event.event_type(), e),
            },
            Err(RecvError::Lagged(skipped)) => warn!("Event log fell behind, {} events skipped", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}
