use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_core::Stream;

use common::{InventoryItemId, ProductId, ReservationId, TenantId, VariantId, WarehouseId};
use domain::{InventoryItem, Product, Reservation, StockKey, StockMovement, Variant, Warehouse};

use crate::{
    LowStockEntry, MovementQuery, Page, ReservationQuery, Result,
    repository::{CatalogRepository, InventoryRepository, MovementRepository, ReservationRepository},
};

/// A stream of ledger entries in append order.
pub type LedgerStream = Pin<Box<dyn Stream<Item = Result<StockMovement>> + Send>>;

/// One open transaction.
///
/// Writes made through the repositories become visible to other callers
/// only on `commit`. Dropping a unit of work without committing discards
/// everything it staged.
#[async_trait]
pub trait UnitOfWork:
    InventoryRepository + MovementRepository + ReservationRepository + CatalogRepository + Sized + 'static
{
    /// Makes every staged write durable.
    async fn commit(self) -> Result<()>;

    /// Discards every staged write.
    async fn rollback(self) -> Result<()>;
}

/// Entry point to persistence.
///
/// `begin` opens a transaction for a command; every other method is a
/// read outside any transaction and only sees committed data.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type UnitOfWork: UnitOfWork;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::UnitOfWork>;

    /// Returns the live (not soft-deleted) item for a key.
    async fn find_inventory(&self, key: &StockKey) -> Result<Option<InventoryItem>>;

    /// Returns a reservation unless it was soft-deleted.
    async fn find_reservation(
        &self,
        tenant_id: TenantId,
        id: ReservationId,
    ) -> Result<Option<Reservation>>;

    /// Lists reservations, newest first.
    async fn list_reservations(&self, query: ReservationQuery) -> Result<Page<Reservation>>;

    /// Returns ids of Active reservations whose expiry is at or before `now`,
    /// oldest expiry first.
    async fn due_for_expiry(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<(TenantId, ReservationId)>>;

    /// Returns Active reservations expiring in `(from, to]`.
    async fn expiring_reservations(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>>;

    /// Movement history ordered by occurrence.
    async fn movement_history(&self, query: MovementQuery) -> Result<Page<StockMovement>>;

    /// Every movement of a tenant carrying `reference`, in append order.
    async fn movements_by_reference(
        &self,
        tenant_id: TenantId,
        reference: &str,
    ) -> Result<Vec<StockMovement>>;

    /// Streams an item's complete ledger in append order.
    async fn stream_ledger(&self, item_id: InventoryItemId) -> Result<LedgerStream>;

    /// Live items whose available stock is at or below their variant's
    /// low-stock threshold.
    async fn low_stock_items(
        &self,
        tenant_id: TenantId,
        warehouse_id: Option<WarehouseId>,
    ) -> Result<Vec<LowStockEntry>>;

    async fn find_product(&self, tenant_id: TenantId, id: ProductId) -> Result<Option<Product>>;

    async fn find_variant(&self, tenant_id: TenantId, id: VariantId) -> Result<Option<Variant>>;

    async fn find_warehouse(
        &self,
        tenant_id: TenantId,
        id: WarehouseId,
    ) -> Result<Option<Warehouse>>;

    /// Live warehouses of a tenant ordered by code.
    async fn list_warehouses(&self, tenant_id: TenantId) -> Result<Vec<Warehouse>>;
}
