use tokio::sync::broadcast;

use crate::dto::events::SessionEvent;

/// Per-session fan-out hub pushing state deltas to subscribed viewers.
///
/// Delivery is best-effort: a hub with no subscribers or a lagging viewer
/// never blocks the session task.
#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventHub {
    /// Construct a hub backed by a Tokio broadcast channel of `capacity`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }
}
