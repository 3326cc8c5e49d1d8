//! Projection trait and position tracking.

use async_trait::async_trait;
use domain::InventoryEvent;

use crate::Result;

/// Number of notifications a projection has applied since it was last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    pub events_applied: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self { events_applied: 0 }
    }

    pub fn advance(&self) -> Self {
        Self {
            events_applied: self.events_applied + 1,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "applied({})", self.events_applied)
    }
}

/// Consumer that folds notifications into a read model.
///
/// Notifications are not replayable, so a projection only ever reflects
/// what it saw since it started or was reset.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Applies a single notification.
    async fn handle(&self, event: &InventoryEvent) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops everything the projection has accumulated.
    async fn reset(&self) -> Result<()>;
}
