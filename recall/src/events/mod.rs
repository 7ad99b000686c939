//! In-process event bus (§4.12). The teacher has no pub/sub layer of its
//! own; this is new, grounded in the `tokio::sync::broadcast` fan-out idiom
//! axum/tower-http WebSocket examples use for a single-process subscriber
//! registry — one broadcast channel shared by every publisher, one receiver
//! cloned per subscriber. Delivery is tenant-scoped and best-effort: a lagged
//! subscriber drops missed events rather than blocking the publisher or
//! replaying history (§4.12).

mod bridge;

pub use bridge::PubSubBridge;

use tokio::sync::broadcast;

use crate::models::{Event, EventType};

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publishes an event to every current subscriber. A send with zero
    /// subscribers is not an error (§4.12: best-effort, no replay).
    pub fn publish(&self, event_type: EventType, tenant_id: impl Into<String>, payload: serde_json::Value) {
        let event = Event::new(event_type, tenant_id.into(), payload);
        tracing::debug!(event_type = event.event_type.as_str(), tenant_id = %event.tenant_id, "publishing event");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription { receiver: self.sender.subscribe() }
    }
}

/// A per-connection subscription. Tenant scoping is applied at receive time:
/// `recv` only ever returns an event whose `tenant_id` matches the caller's,
/// silently skipping everything else (§4.12: "a message with `tenant_id=T`
/// is never delivered to a subscriber whose user lives outside `T`").
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    pub async fn recv(&mut self, tenant_id: &str) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.tenant_id == tenant_id => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged, dropping missed events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
