//! Outbound notification sink.

use async_trait::async_trait;
use domain::{DomainEvent, InventoryEvent};
use tokio::sync::broadcast;

use crate::Result;

/// Receives events after the transaction that produced them has committed.
///
/// Implementations must not block the caller for long; a failed publish is
/// logged by the caller and never undoes the committed change.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: InventoryEvent) -> Result<()>;
}

/// Default channel capacity; slow subscribers past this lag and skip events.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Publisher backed by a tokio broadcast channel.
///
/// Every subscriber sees every event published after it subscribed.
#[derive(Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<InventoryEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Opens a new subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<InventoryEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: InventoryEvent) -> Result<()> {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(delivered) => {
                tracing::debug!(event_type, delivered, "notification published");
            }
            Err(_) => {
                tracing::debug!(event_type, "notification dropped, no subscribers");
            }
        }
        metrics::counter!("notifications_published", "type" => event_type).increment(1);
        Ok(())
    }
}
