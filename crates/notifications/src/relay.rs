//! Feeds a broadcast subscription into registered projections.

use domain::{DomainEvent, InventoryEvent};
use tokio::sync::{broadcast, watch};

use crate::projection::Projection;

/// Delivers every received notification to each registered projection.
///
/// A projection that fails on one event is logged and keeps receiving the
/// next ones.
#[derive(Default)]
pub struct NotificationRelay {
    projections: Vec<Box<dyn Projection>>,
}

impl NotificationRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Delivers one event to all projections.
    #[tracing::instrument(skip(self, event), fields(event_type = event.event_type()))]
    pub async fn deliver(&self, event: &InventoryEvent) {
        for projection in &self.projections {
            if let Err(e) = projection.handle(event).await {
                tracing::warn!(projection = projection.name(), error = %e, "projection failed");
                metrics::counter!("notifications_projection_failures").increment(1);
            }
        }
    }

    /// Consumes `events` until the channel closes or `shutdown` flips to true.
    pub async fn run(
        self,
        mut events: broadcast::Receiver<InventoryEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!(projections = self.projections.len(), "notification relay started");

        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => self.deliver(&event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "notification relay lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("notification relay stopped");
    }
}
