//! Write-side repositories, one per aggregate.
//!
//! Every repository is implemented by a unit of work, so all reads and
//! writes made through it belong to the same transaction.

use async_trait::async_trait;
use common::{ProductId, ReservationId, TenantId, VariantId, Version, WarehouseId};
use domain::{InventoryItem, Product, Reservation, StockKey, StockMovement, Variant, Warehouse};

use crate::Result;

#[async_trait]
pub trait InventoryRepository: Send {
    /// Loads the item for a (tenant, variant, warehouse) key, soft-deleted
    /// rows included.
    ///
    /// The row stays locked until the transaction ends.
    async fn get_by_variant_and_warehouse(&mut self, key: &StockKey)
    -> Result<Option<InventoryItem>>;

    /// Inserts a new item and returns its stored version.
    ///
    /// Fails with `Duplicate` if the key is already taken.
    async fn add_item(&mut self, item: &InventoryItem) -> Result<Version>;

    /// Writes back an item loaded in this transaction.
    ///
    /// Fails with `ConcurrencyConflict` if the stored version no longer
    /// matches `item.version()`. Returns the new version.
    async fn update_item(&mut self, item: &InventoryItem) -> Result<Version>;
}

#[async_trait]
pub trait MovementRepository: Send {
    /// Appends a ledger entry. Movements are never updated or deleted.
    async fn add_movement(&mut self, movement: &StockMovement) -> Result<()>;

    /// Loads every movement of a tenant carrying `reference`.
    ///
    /// Concurrent callers for the same (tenant, reference) are serialized
    /// until the transaction ends.
    async fn get_movements_by_reference(
        &mut self,
        tenant_id: TenantId,
        reference: &str,
    ) -> Result<Vec<StockMovement>>;
}

#[async_trait]
pub trait ReservationRepository: Send {
    /// Loads and locks a reservation.
    async fn get_by_id(
        &mut self,
        tenant_id: TenantId,
        id: ReservationId,
    ) -> Result<Option<Reservation>>;

    async fn add_reservation(&mut self, reservation: &Reservation) -> Result<Version>;

    /// Writes back a reservation with the same version check as `update_item`.
    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<Version>;
}

#[async_trait]
pub trait CatalogRepository: Send {
    async fn get_product(&mut self, tenant_id: TenantId, id: ProductId)
    -> Result<Option<Product>>;

    async fn add_product(&mut self, product: &Product) -> Result<()>;

    async fn get_variant(&mut self, tenant_id: TenantId, id: VariantId)
    -> Result<Option<Variant>>;

    async fn find_variant_by_sku(
        &mut self,
        tenant_id: TenantId,
        sku: &str,
    ) -> Result<Option<Variant>>;

    async fn add_variant(&mut self, variant: &Variant) -> Result<()>;

    async fn get_warehouse(
        &mut self,
        tenant_id: TenantId,
        id: WarehouseId,
    ) -> Result<Option<Warehouse>>;

    async fn find_warehouse_by_code(
        &mut self,
        tenant_id: TenantId,
        code: &str,
    ) -> Result<Option<Warehouse>>;

    async fn add_warehouse(&mut self, warehouse: &Warehouse) -> Result<()>;
}
