//! Application services: one per aggregate family.

mod catalog;
mod inventory;
mod reservation;

pub use catalog::CatalogService;
pub use inventory::{InventoryService, Transfer};
pub use reservation::{ReservationChange, ReservationService};

use std::sync::Arc;

use common::{ReservationId, TenantId, VariantId, WarehouseId};
use domain::{
    Aggregate, CatalogError, InventoryError, InventoryEvent, InventoryItem, LowStockAlert,
    Reservation, ReservationError, ReservationExpiring, StockKey, StockLevelChanged, StockMovement,
    Variant, Warehouse,
};
use notifications::EventPublisher;
use rust_decimal::Decimal;
use store::UnitOfWork;

use crate::error::Result;

/// An item after a committed command, with the movements it produced.
#[derive(Debug, Clone)]
pub struct StockChange {
    pub item: InventoryItem,
    pub movements: Vec<StockMovement>,
    /// The variant's threshold, read in the same transaction.
    pub low_stock_threshold: Option<Decimal>,
}

impl StockChange {
    pub(crate) fn new(
        item: InventoryItem,
        movements: Vec<StockMovement>,
        low_stock_threshold: Option<Decimal>,
    ) -> Self {
        Self {
            item,
            movements,
            low_stock_threshold,
        }
    }

    /// True if the item sits at or below its variant's threshold.
    pub fn is_low(&self) -> bool {
        self.low_stock_threshold
            .is_some_and(|threshold| self.item.available_stock() <= threshold)
    }
}

/// Publishes notifications for committed changes.
///
/// Publishing never fails a command: the state change is already durable.
#[derive(Clone)]
pub(crate) struct Notifier {
    publisher: Arc<dyn EventPublisher>,
}

impl Notifier {
    pub(crate) fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    pub(crate) async fn stock_changed(&self, change: &StockChange) {
        for movement in &change.movements {
            metrics::counter!(
                "inventory_movements_recorded",
                "type" => movement.movement_type.as_str()
            )
            .increment(1);
        }

        let level = StockLevelChanged::from_item(&change.item, change.movements.last());
        self.send(InventoryEvent::StockLevelChanged(level)).await;

        if let Some(alert) = change
            .low_stock_threshold
            .and_then(|threshold| LowStockAlert::check(&change.item, threshold))
        {
            tracing::info!(
                item = %change.item.key(),
                available = %alert.available_stock,
                threshold = %alert.threshold,
                "low stock"
            );
            self.send(InventoryEvent::LowStockAlert(alert)).await;
        }
    }

    pub(crate) async fn reservation_expiring(&self, reservation: &Reservation) {
        self.send(InventoryEvent::ReservationExpiring(ReservationExpiring::from(
            reservation,
        )))
        .await;
    }

    async fn send(&self, event: InventoryEvent) {
        if let Err(e) = self.publisher.publish(event).await {
            tracing::warn!(error = %e, "failed to publish notification");
        }
    }
}

/// Loads a live item under the transaction's lock.
pub(crate) async fn load_item<U: UnitOfWork>(uow: &mut U, key: &StockKey) -> Result<InventoryItem> {
    match uow.get_by_variant_and_warehouse(key).await? {
        Some(item) if !item.is_deleted() => Ok(item),
        _ => Err(InventoryError::NotFound {
            variant_id: key.variant_id,
            warehouse_id: key.warehouse_id,
        }
        .into()),
    }
}

/// Writes an existing item and adopts the stored version.
pub(crate) async fn save_item<U: UnitOfWork>(uow: &mut U, item: &mut InventoryItem) -> Result<()> {
    let version = uow.update_item(item).await?;
    item.set_version(version);
    Ok(())
}

pub(crate) async fn load_reservation<U: UnitOfWork>(
    uow: &mut U,
    tenant_id: TenantId,
    id: ReservationId,
) -> Result<Reservation> {
    match uow.get_by_id(tenant_id, id).await? {
        Some(reservation) if !reservation.is_deleted() => Ok(reservation),
        _ => Err(ReservationError::NotFound(id).into()),
    }
}

pub(crate) async fn save_reservation<U: UnitOfWork>(
    uow: &mut U,
    reservation: &mut Reservation,
) -> Result<()> {
    let version = uow.update_reservation(reservation).await?;
    reservation.set_version(version);
    Ok(())
}

pub(crate) async fn require_variant<U: UnitOfWork>(
    uow: &mut U,
    tenant_id: TenantId,
    id: VariantId,
) -> Result<Variant> {
    match uow.get_variant(tenant_id, id).await? {
        Some(variant) if !variant.is_deleted() => Ok(variant),
        _ => Err(CatalogError::VariantNotFound(id).into()),
    }
}

pub(crate) async fn require_warehouse<U: UnitOfWork>(
    uow: &mut U,
    tenant_id: TenantId,
    id: WarehouseId,
) -> Result<Warehouse> {
    match uow.get_warehouse(tenant_id, id).await? {
        Some(warehouse) if !warehouse.is_deleted() => Ok(warehouse),
        _ => Err(CatalogError::WarehouseNotFound(id).into()),
    }
}

/// Threshold of the item's variant; `None` if the variant is gone.
pub(crate) async fn low_stock_threshold<U: UnitOfWork>(
    uow: &mut U,
    key: &StockKey,
) -> Result<Option<Decimal>> {
    Ok(uow
        .get_variant(key.tenant_id, key.variant_id)
        .await?
        .filter(|variant| !variant.is_deleted())
        .map(|variant| variant.low_stock_threshold))
}
