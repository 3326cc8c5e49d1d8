use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use common::{
    InventoryItemId, ProductId, ReservationId, TenantId, VariantId, Version, WarehouseId,
};
use domain::{
    Aggregate, InventoryItem, Product, Reservation, StockKey, StockMovement, Variant, Warehouse,
};

use crate::{
    LowStockEntry, MovementQuery, Page, ReservationQuery, Result, StoreError,
    repository::{CatalogRepository, InventoryRepository, MovementRepository, ReservationRepository},
    store::{LedgerStream, Store, UnitOfWork},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    items: HashMap<InventoryItemId, InventoryItem>,
    keys: HashMap<StockKey, InventoryItemId>,
    movements: Vec<StockMovement>,
    reservations: HashMap<ReservationId, Reservation>,
    products: HashMap<ProductId, Product>,
    variants: HashMap<VariantId, Variant>,
    warehouses: HashMap<WarehouseId, Warehouse>,
}

/// In-memory store for tests and local runs.
///
/// A unit of work holds the write lock for its whole lifetime and works on
/// a copy of the tables, so writers are serialized and a dropped or rolled
/// back unit of work leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    fail_movement_writes: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `add_movement` fail with `Unavailable`.
    pub fn fail_movement_writes(&self, fail: bool) {
        self.fail_movement_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of movements stored.
    pub async fn movement_count(&self) -> usize {
        self.tables.read().await.movements.len()
    }

    /// Clears all data.
    pub async fn clear(&self) {
        *self.tables.write().await = Tables::default();
    }
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryUnitOfWork {
    guard: OwnedRwLockWriteGuard<Tables>,
    staged: Tables,
    fail_movement_writes: Arc<AtomicBool>,
}

fn insert_new<K, A>(
    rows: &mut HashMap<K, A>,
    id: K,
    aggregate: &A,
) -> Result<Version>
where
    K: Eq + Hash + Display,
    A: Aggregate + Clone,
{
    if rows.contains_key(&id) {
        return Err(StoreError::Duplicate {
            entity: A::aggregate_type(),
            key: id.to_string(),
        });
    }
    let mut stored = aggregate.clone();
    stored.set_version(Version::first());
    rows.insert(id, stored);
    Ok(Version::first())
}

fn update_versioned<K, A>(
    rows: &mut HashMap<K, A>,
    id: K,
    aggregate: &A,
) -> Result<Version>
where
    K: Eq + Hash + Display,
    A: Aggregate + Clone,
{
    let Some(current) = rows.get_mut(&id) else {
        return Err(StoreError::NotFound {
            entity: A::aggregate_type(),
            id: id.to_string(),
        });
    };
    if current.version() != aggregate.version() {
        return Err(StoreError::ConcurrencyConflict {
            aggregate_type: A::aggregate_type(),
            id: id.to_string(),
            expected: aggregate.version(),
            actual: current.version(),
        });
    }

    let next = aggregate.version().next();
    let mut stored = aggregate.clone();
    stored.set_version(next);
    *current = stored;
    Ok(next)
}

fn paginate<T>(items: Vec<T>, limit: usize, offset: usize) -> Page<T> {
    let total = items.len() as u64;
    let items = items.into_iter().skip(offset).take(limit).collect();
    Page {
        items,
        total,
        limit,
        offset,
    }
}

#[async_trait]
impl InventoryRepository for InMemoryUnitOfWork {
    async fn get_by_variant_and_warehouse(
        &mut self,
        key: &StockKey,
    ) -> Result<Option<InventoryItem>> {
        Ok(self
            .staged
            .keys
            .get(key)
            .and_then(|id| self.staged.items.get(id))
            .cloned())
    }

    async fn add_item(&mut self, item: &InventoryItem) -> Result<Version> {
        if self.staged.keys.contains_key(&item.key()) {
            return Err(StoreError::Duplicate {
                entity: InventoryItem::aggregate_type(),
                key: item.key().to_string(),
            });
        }
        let version = insert_new(&mut self.staged.items, item.id(), item)?;
        self.staged.keys.insert(item.key(), item.id());
        Ok(version)
    }

    async fn update_item(&mut self, item: &InventoryItem) -> Result<Version> {
        update_versioned(&mut self.staged.items, item.id(), item)
    }
}

#[async_trait]
impl MovementRepository for InMemoryUnitOfWork {
    async fn add_movement(&mut self, movement: &StockMovement) -> Result<()> {
        if self.fail_movement_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "movement writes are disabled".to_string(),
            ));
        }
        if !self.staged.items.contains_key(&movement.inventory_item_id) {
            return Err(StoreError::NotFound {
                entity: InventoryItem::aggregate_type(),
                id: movement.inventory_item_id.to_string(),
            });
        }
        self.staged.movements.push(movement.clone());
        Ok(())
    }

    async fn get_movements_by_reference(
        &mut self,
        tenant_id: TenantId,
        reference: &str,
    ) -> Result<Vec<StockMovement>> {
        Ok(self
            .staged
            .movements
            .iter()
            .filter(|m| m.tenant_id == tenant_id && m.reference.as_deref() == Some(reference))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReservationRepository for InMemoryUnitOfWork {
    async fn get_by_id(
        &mut self,
        tenant_id: TenantId,
        id: ReservationId,
    ) -> Result<Option<Reservation>> {
        Ok(self
            .staged
            .reservations
            .get(&id)
            .filter(|r| r.tenant_id() == tenant_id)
            .cloned())
    }

    async fn add_reservation(&mut self, reservation: &Reservation) -> Result<Version> {
        insert_new(&mut self.staged.reservations, reservation.id(), reservation)
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<Version> {
        update_versioned(&mut self.staged.reservations, reservation.id(), reservation)
    }
}

#[async_trait]
impl CatalogRepository for InMemoryUnitOfWork {
    async fn get_product(&mut self, tenant_id: TenantId, id: ProductId) -> Result<Option<Product>> {
        Ok(self
            .staged
            .products
            .get(&id)
            .filter(|p| p.tenant_id == tenant_id)
            .cloned())
    }

    async fn add_product(&mut self, product: &Product) -> Result<()> {
        self.staged.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_variant(&mut self, tenant_id: TenantId, id: VariantId) -> Result<Option<Variant>> {
        Ok(self
            .staged
            .variants
            .get(&id)
            .filter(|v| v.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_variant_by_sku(
        &mut self,
        tenant_id: TenantId,
        sku: &str,
    ) -> Result<Option<Variant>> {
        Ok(self
            .staged
            .variants
            .values()
            .find(|v| v.tenant_id == tenant_id && v.sku == sku)
            .cloned())
    }

    async fn add_variant(&mut self, variant: &Variant) -> Result<()> {
        let taken = self
            .staged
            .variants
            .values()
            .any(|v| v.tenant_id == variant.tenant_id && v.sku == variant.sku);
        if taken {
            return Err(StoreError::Duplicate {
                entity: "Variant",
                key: variant.sku.clone(),
            });
        }
        self.staged.variants.insert(variant.id, variant.clone());
        Ok(())
    }

    async fn get_warehouse(
        &mut self,
        tenant_id: TenantId,
        id: WarehouseId,
    ) -> Result<Option<Warehouse>> {
        Ok(self
            .staged
            .warehouses
            .get(&id)
            .filter(|w| w.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_warehouse_by_code(
        &mut self,
        tenant_id: TenantId,
        code: &str,
    ) -> Result<Option<Warehouse>> {
        Ok(self
            .staged
            .warehouses
            .values()
            .find(|w| w.tenant_id == tenant_id && w.code == code)
            .cloned())
    }

    async fn add_warehouse(&mut self, warehouse: &Warehouse) -> Result<()> {
        let taken = self
            .staged
            .warehouses
            .values()
            .any(|w| w.tenant_id == warehouse.tenant_id && w.code == warehouse.code);
        if taken {
            return Err(StoreError::Duplicate {
                entity: "Warehouse",
                key: warehouse.code.clone(),
            });
        }
        self.staged.warehouses.insert(warehouse.id, warehouse.clone());
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(self) -> Result<()> {
        let Self {
            mut guard, staged, ..
        } = self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type UnitOfWork = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<InMemoryUnitOfWork> {
        let guard = self.tables.clone().write_owned().await;
        let staged = (*guard).clone();
        Ok(InMemoryUnitOfWork {
            guard,
            staged,
            fail_movement_writes: self.fail_movement_writes.clone(),
        })
    }

    async fn find_inventory(&self, key: &StockKey) -> Result<Option<InventoryItem>> {
        let tables = self.tables.read().await;
        Ok(tables
            .keys
            .get(key)
            .and_then(|id| tables.items.get(id))
            .filter(|item| !item.is_deleted())
            .cloned())
    }

    async fn find_reservation(
        &self,
        tenant_id: TenantId,
        id: ReservationId,
    ) -> Result<Option<Reservation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reservations
            .get(&id)
            .filter(|r| r.tenant_id() == tenant_id && !r.is_deleted())
            .cloned())
    }

    async fn list_reservations(&self, query: ReservationQuery) -> Result<Page<Reservation>> {
        let tables = self.tables.read().await;
        let mut matches: Vec<Reservation> = tables
            .reservations
            .values()
            .filter(|r| {
                r.tenant_id() == query.tenant_id
                    && !r.is_deleted()
                    && query.status.is_none_or(|s| r.status() == s)
                    && query.variant_id.is_none_or(|v| r.variant_id() == v)
                    && query.warehouse_id.is_none_or(|w| r.warehouse_id() == w)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        Ok(paginate(
            matches,
            query.effective_limit(),
            query.effective_offset(),
        ))
    }

    async fn due_for_expiry(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<(TenantId, ReservationId)>> {
        let tables = self.tables.read().await;
        let mut due: Vec<&Reservation> = tables
            .reservations
            .values()
            .filter(|r| !r.is_deleted() && r.is_due_for_expiry(now))
            .collect();
        due.sort_by_key(|r| r.expires_at());

        Ok(due
            .into_iter()
            .take(limit)
            .map(|r| (r.tenant_id(), r.id()))
            .collect())
    }

    async fn expiring_reservations(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>> {
        let tables = self.tables.read().await;
        let mut expiring: Vec<Reservation> = tables
            .reservations
            .values()
            .filter(|r| {
                !r.is_deleted()
                    && r.status().is_active()
                    && r.expires_at() > from
                    && r.expires_at() <= to
            })
            .cloned()
            .collect();
        expiring.sort_by_key(|r| r.expires_at());
        expiring.truncate(limit);
        Ok(expiring)
    }

    async fn movement_history(&self, query: MovementQuery) -> Result<Page<StockMovement>> {
        let tables = self.tables.read().await;
        let mut matches: Vec<StockMovement> = tables
            .movements
            .iter()
            .filter(|m| query.matches(m))
            .cloned()
            .collect();
        // Stable, so equal timestamps keep append order.
        matches.sort_by_key(|m| m.occurred_at);

        Ok(paginate(
            matches,
            query.effective_limit(),
            query.effective_offset(),
        ))
    }

    async fn movements_by_reference(
        &self,
        tenant_id: TenantId,
        reference: &str,
    ) -> Result<Vec<StockMovement>> {
        let tables = self.tables.read().await;
        Ok(tables
            .movements
            .iter()
            .filter(|m| m.tenant_id == tenant_id && m.reference.as_deref() == Some(reference))
            .cloned()
            .collect())
    }

    async fn stream_ledger(&self, item_id: InventoryItemId) -> Result<LedgerStream> {
        let tables = self.tables.read().await;
        let ledger: Vec<Result<StockMovement>> = tables
            .movements
            .iter()
            .filter(|m| m.inventory_item_id == item_id)
            .cloned()
            .map(Ok)
            .collect();

        Ok(Box::pin(futures_util::stream::iter(ledger)))
    }

    async fn low_stock_items(
        &self,
        tenant_id: TenantId,
        warehouse_id: Option<WarehouseId>,
    ) -> Result<Vec<LowStockEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<LowStockEntry> = tables
            .items
            .values()
            .filter(|item| {
                item.tenant_id() == tenant_id
                    && !item.is_deleted()
                    && warehouse_id.is_none_or(|w| item.warehouse_id() == w)
            })
            .filter_map(|item| {
                let variant = tables.variants.get(&item.variant_id())?;
                (!variant.is_deleted() && variant.is_low(item.available_stock())).then(|| {
                    LowStockEntry {
                        item: item.clone(),
                        sku: variant.sku.clone(),
                        threshold: variant.low_stock_threshold,
                    }
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            a.sku
                .cmp(&b.sku)
                .then_with(|| a.item.warehouse_id().cmp(&b.item.warehouse_id()))
        });
        Ok(entries)
    }

    async fn find_product(&self, tenant_id: TenantId, id: ProductId) -> Result<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .get(&id)
            .filter(|p| p.tenant_id == tenant_id && !p.is_deleted())
            .cloned())
    }

    async fn find_variant(&self, tenant_id: TenantId, id: VariantId) -> Result<Option<Variant>> {
        let tables = self.tables.read().await;
        Ok(tables
            .variants
            .get(&id)
            .filter(|v| v.tenant_id == tenant_id && !v.is_deleted())
            .cloned())
    }

    async fn find_warehouse(
        &self,
        tenant_id: TenantId,
        id: WarehouseId,
    ) -> Result<Option<Warehouse>> {
        let tables = self.tables.read().await;
        Ok(tables
            .warehouses
            .get(&id)
            .filter(|w| w.tenant_id == tenant_id && !w.is_deleted())
            .cloned())
    }

    async fn list_warehouses(&self, tenant_id: TenantId) -> Result<Vec<Warehouse>> {
        let tables = self.tables.read().await;
        let mut warehouses: Vec<Warehouse> = tables
            .warehouses
            .values()
            .filter(|w| w.tenant_id == tenant_id && !w.is_deleted())
            .cloned()
            .collect();
        warehouses.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(warehouses)
    }
}
