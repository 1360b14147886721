//! Broadcast bus for memory lifecycle and proactive-trigger events.
//!
//! Fire-and-forget: publishing never blocks and never fails. Slow
//! subscribers miss events rather than backpressure the publisher.

use tokio::sync::broadcast;
use tracing::trace;

use keepsake_types::event::MemoryEvent;

const DEFAULT_CAPACITY: usize = 256;

/// Clonable handle to the event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MemoryEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to every current subscriber. Events published with
    /// no subscribers are dropped silently.
    pub fn publish(&self, event: MemoryEvent) {
        trace!(?event, "publishing memory event");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
