//! Core aggregate and domain event traits.

use common::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for events published after a state change has been committed.
///
/// Events are facts: they are named in past tense and never rejected.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name used for routing and subscriptions.
    fn event_type(&self) -> &'static str;
}

/// Trait for versioned aggregates persisted as rows.
///
/// An aggregate guards its own invariants; the store only checks that the
/// version a writer read is still current when it writes back.
pub trait Aggregate: Send + Sync {
    /// Returns the aggregate type name, used in concurrency diagnostics.
    fn aggregate_type() -> &'static str;

    /// Returns the version this instance was loaded at.
    ///
    /// `Version::initial()` means the aggregate has never been persisted.
    fn version(&self) -> Version;

    /// Sets the version after a successful write.
    fn set_version(&mut self, version: Version);

    /// Returns true if the aggregate has never been persisted.
    fn is_new(&self) -> bool {
        self.version() == Version::initial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InventoryEvent, InventoryItem, LowStockAlert, StockKey};
    use chrono::Utc;
    use common::{TenantId, VariantId, WarehouseId};
    use rust_decimal::Decimal;

    fn item() -> InventoryItem {
        let key = StockKey::new(TenantId::new(), VariantId::new(), WarehouseId::new());
        InventoryItem::new(key, false, None, Utc::now())
    }

    #[test]
    fn item_is_new_until_written() {
        let mut item = item();
        assert!(item.is_new());

        item.set_version(Version::first());
        assert!(!item.is_new());
        assert_eq!(InventoryItem::aggregate_type(), "InventoryItem");
    }

    #[test]
    fn notifications_carry_their_type_name() {
        let item = item();
        let alert = LowStockAlert::check(&item, Decimal::ONE).expect("empty item is low");
        let event = InventoryEvent::LowStockAlert(alert);

        assert_eq!(event.event_type(), "LowStockAlert");
        assert_eq!(event.tenant_id(), item.tenant_id());
    }
}
