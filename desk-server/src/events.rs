//! Event bus - 通知事件分发
//!
//! ```text
//! AssignmentLedger / SlaTracker / SlaBreachSweeper
//!        │ publish (after commit)
//!        ▼
//!   EventBus (broadcast)
//!        └──► NotificationForwarder ──► tracing target "notification"
//! ```
//!
//! Publishing never fails the caller: events are at-most-once and a lagging or
//! missing receiver only costs a log line.

use shared::message::DeskEvent;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Event broadcast channel capacity
const EVENT_CHANNEL_CAPACITY: usize = 4096;

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DeskEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeskEvent> {
        self.tx.subscribe()
    }

    /// Fire-and-forget publish
    pub fn publish(&self, event: DeskEvent) {
        let kind = event.kind();
        if self.tx.send(event).is_err() {
            tracing::warn!(event = kind, "No receivers for desk event, dropped");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Drains the bus and hands every event to the notification transport.
///
/// The transport itself lives outside this service; events are emitted as
/// structured JSON on the `notification` tracing target.
pub struct NotificationForwarder {
    rx: broadcast::Receiver<DeskEvent>,
}

impl NotificationForwarder {
    pub fn new(bus: &EventBus) -> Self {
        Self { rx: bus.subscribe() }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!("Notification forwarder started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Notification forwarder shutting down");
                    break;
                }
                received = self.rx.recv() => match received {
                    Ok(event) => Self::forward(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Notification forwarder lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, notification forwarder stopping");
                        break;
                    }
                },
            }
        }
    }

    fn forward(event: &DeskEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => tracing::info!(
                target: "notification",
                event = event.kind(),
                ticket_id = %event.ticket_id(),
                %payload,
                "Desk notification"
            ),
            Err(e) => tracing::error!(error = %e, "Failed to serialize desk event"),
        }
    }
}
