//! Notifications published after a committed change.

use chrono::{DateTime, Utc};
use common::{MovementId, ReservationId, TenantId, VariantId, WarehouseId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::inventory::{InventoryItem, MovementType, StockMovement};
use crate::reservation::Reservation;

/// Events pushed to the real-time notification channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InventoryEvent {
    StockLevelChanged(StockLevelChanged),
    LowStockAlert(LowStockAlert),
    ReservationExpiring(ReservationExpiring),
}

impl DomainEvent for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::StockLevelChanged(_) => "StockLevelChanged",
            InventoryEvent::LowStockAlert(_) => "LowStockAlert",
            InventoryEvent::ReservationExpiring(_) => "ReservationExpiring",
        }
    }
}

impl InventoryEvent {
    /// Returns the tenant the event belongs to.
    pub fn tenant_id(&self) -> TenantId {
        match self {
            InventoryEvent::StockLevelChanged(e) => e.tenant_id,
            InventoryEvent::LowStockAlert(e) => e.tenant_id,
            InventoryEvent::ReservationExpiring(e) => e.tenant_id,
        }
    }
}

/// Post-mutation balances of an inventory item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevelChanged {
    pub tenant_id: TenantId,
    pub variant_id: VariantId,
    pub warehouse_id: WarehouseId,
    pub total_stock: Decimal,
    pub reserved_stock: Decimal,
    pub available_stock: Decimal,
    /// The ledger entry behind the change; `None` for reserve/release.
    pub movement_id: Option<MovementId>,
    pub movement_type: Option<MovementType>,
    pub occurred_at: DateTime<Utc>,
}

impl StockLevelChanged {
    pub fn from_item(item: &InventoryItem, movement: Option<&StockMovement>) -> Self {
        Self {
            tenant_id: item.tenant_id(),
            variant_id: item.variant_id(),
            warehouse_id: item.warehouse_id(),
            total_stock: item.total_stock(),
            reserved_stock: item.reserved_stock(),
            available_stock: item.available_stock(),
            movement_id: movement.map(|m| m.id),
            movement_type: movement.map(|m| m.movement_type),
            occurred_at: item.updated_at(),
        }
    }
}

/// Available stock dropped to or below the variant's threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub tenant_id: TenantId,
    pub variant_id: VariantId,
    pub warehouse_id: WarehouseId,
    pub available_stock: Decimal,
    pub threshold: Decimal,
    pub occurred_at: DateTime<Utc>,
}

impl LowStockAlert {
    /// Returns an alert if the item's available stock is at or below `threshold`.
    pub fn check(item: &InventoryItem, threshold: Decimal) -> Option<Self> {
        (item.available_stock() <= threshold).then(|| Self {
            tenant_id: item.tenant_id(),
            variant_id: item.variant_id(),
            warehouse_id: item.warehouse_id(),
            available_stock: item.available_stock(),
            threshold,
            occurred_at: item.updated_at(),
        })
    }
}

/// An active reservation is about to lapse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationExpiring {
    pub reservation_id: ReservationId,
    pub tenant_id: TenantId,
    pub variant_id: VariantId,
    pub warehouse_id: WarehouseId,
    pub quantity: Decimal,
    pub expires_at: DateTime<Utc>,
}

impl From<&Reservation> for ReservationExpiring {
    fn from(reservation: &Reservation) -> Self {
        Self {
            reservation_id: reservation.id(),
            tenant_id: reservation.tenant_id(),
            variant_id: reservation.variant_id(),
            warehouse_id: reservation.warehouse_id(),
            quantity: reservation.quantity(),
            expires_at: reservation.expires_at(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{MovementContext, StockKey};
    use common::ActorId;
    use rust_decimal_macros::dec;

    fn item(total: Decimal) -> InventoryItem {
        let key = StockKey::new(TenantId::new(), VariantId::new(), WarehouseId::new());
        let mut item = InventoryItem::new(key, false, None, Utc::now());
        item.set_opening_balance(total, &MovementContext::new("open", ActorId::system()))
            .unwrap();
        item
    }

    #[test]
    fn stock_level_reflects_item_and_movement() {
        let mut item = item(dec!(10));
        let movement = item
            .record_sale(dec!(3), &MovementContext::new("sale", ActorId::system()))
            .unwrap();

        let event = StockLevelChanged::from_item(&item, Some(&movement));
        assert_eq!(event.total_stock, dec!(7));
        assert_eq!(event.available_stock, dec!(7));
        assert_eq!(event.movement_type, Some(MovementType::Sale));
    }

    #[test]
    fn low_stock_alert_at_threshold() {
        let item = item(dec!(5));
        assert!(LowStockAlert::check(&item, dec!(5)).is_some());
        assert!(LowStockAlert::check(&item, dec!(4)).is_none());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = InventoryEvent::LowStockAlert(LowStockAlert::check(&item(dec!(0)), dec!(1)).unwrap());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "LowStockAlert");
        assert_eq!(event.event_type(), "LowStockAlert");
    }
}
