use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::TryStreamExt;
use rust_decimal::Decimal;
use sqlx::{
    PgPool, Postgres, Row, Transaction,
    postgres::{PgArguments, PgRow},
    query::Query,
};
use uuid::Uuid;

use common::{
    ActorId, InventoryItemId, MovementId, ProductId, ReservationId, TenantId, VariantId, Version,
    WarehouseId,
};
use domain::{
    Aggregate, InventoryItem, InventoryItemParts, Product, Reservation, ReservationParts, StockKey,
    StockMovement, Variant, Warehouse,
};

use crate::{
    LowStockEntry, MovementQuery, Page, ReservationQuery, Result, StoreError,
    repository::{CatalogRepository, InventoryRepository, MovementRepository, ReservationRepository},
    store::{LedgerStream, Store, UnitOfWork},
};

const ITEM_COLUMNS: &str = "id, tenant_id, variant_id, warehouse_id, total_stock, reserved_stock, \
     allow_negative_stock, expiry_date, opened_at, created_at, updated_at, deleted_at, deleted_by, version";

const MOVEMENT_COLUMNS: &str = "seq, id, tenant_id, inventory_item_id, variant_id, warehouse_id, \
     movement_type, entry_type, quantity, running_balance, reason, actor, occurred_at, reference, \
     metadata, paired_movement_id";

const RESERVATION_COLUMNS: &str = "id, tenant_id, variant_id, warehouse_id, quantity, expires_at, \
     status, reference, reason, created_by, created_at, updated_by, updated_at, used_by, used_at, \
     used_quantity, cancelled_by, cancelled_at, cancellation_reason, deleted_by, deleted_at, version";

const PRODUCT_COLUMNS: &str = "id, tenant_id, name, description, created_at, deleted_at, deleted_by";

const VARIANT_COLUMNS: &str = "id, tenant_id, product_id, sku, name, low_stock_threshold, \
     created_at, deleted_at, deleted_by";

const WAREHOUSE_COLUMNS: &str = "id, tenant_id, code, name, created_at, deleted_at, deleted_by";

/// Rows fetched per round trip when streaming a ledger.
const LEDGER_PAGE_SIZE: i64 = 500;

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

/// Transaction over a [`PostgresStore`].
///
/// Dropping it without `commit` rolls the transaction back.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

fn actor(value: Option<String>) -> Option<ActorId> {
    value.map(ActorId::from)
}

fn row_to_item(row: &PgRow) -> Result<InventoryItem> {
    Ok(InventoryItem::rehydrate(InventoryItemParts {
        id: InventoryItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        key: StockKey::new(
            TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id")?),
            VariantId::from_uuid(row.try_get::<Uuid, _>("variant_id")?),
            WarehouseId::from_uuid(row.try_get::<Uuid, _>("warehouse_id")?),
        ),
        total_stock: row.try_get("total_stock")?,
        reserved_stock: row.try_get("reserved_stock")?,
        allow_negative_stock: row.try_get("allow_negative_stock")?,
        expiry_date: row.try_get::<Option<NaiveDate>, _>("expiry_date")?,
        opened_at: row.try_get("opened_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
        deleted_by: actor(row.try_get("deleted_by")?),
        version: Version::new(row.try_get("version")?),
    }))
}

fn row_to_movement(row: &PgRow) -> Result<StockMovement> {
    let metadata_json: serde_json::Value = row.try_get("metadata")?;
    let metadata: HashMap<String, String> = serde_json::from_value(metadata_json)?;
    let movement_type: String = row.try_get("movement_type")?;
    let entry_type: String = row.try_get("entry_type")?;

    Ok(StockMovement {
        id: MovementId::from_uuid(row.try_get::<Uuid, _>("id")?),
        tenant_id: TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id")?),
        inventory_item_id: InventoryItemId::from_uuid(row.try_get::<Uuid, _>("inventory_item_id")?),
        variant_id: VariantId::from_uuid(row.try_get::<Uuid, _>("variant_id")?),
        warehouse_id: WarehouseId::from_uuid(row.try_get::<Uuid, _>("warehouse_id")?),
        movement_type: movement_type.parse()?,
        entry_type: entry_type.parse()?,
        quantity: row.try_get("quantity")?,
        running_balance: row.try_get("running_balance")?,
        reason: row.try_get("reason")?,
        actor: ActorId::from(row.try_get::<String, _>("actor")?),
        occurred_at: row.try_get("occurred_at")?,
        reference: row.try_get("reference")?,
        metadata,
        paired_movement_id: row
            .try_get::<Option<Uuid>, _>("paired_movement_id")?
            .map(MovementId::from_uuid),
    })
}

fn row_to_reservation(row: &PgRow) -> Result<Reservation> {
    let status: String = row.try_get("status")?;

    Ok(Reservation::rehydrate(ReservationParts {
        id: ReservationId::from_uuid(row.try_get::<Uuid, _>("id")?),
        key: StockKey::new(
            TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id")?),
            VariantId::from_uuid(row.try_get::<Uuid, _>("variant_id")?),
            WarehouseId::from_uuid(row.try_get::<Uuid, _>("warehouse_id")?),
        ),
        quantity: row.try_get("quantity")?,
        expires_at: row.try_get("expires_at")?,
        status: status.parse()?,
        reference: row.try_get("reference")?,
        reason: row.try_get("reason")?,
        created_by: ActorId::from(row.try_get::<String, _>("created_by")?),
        created_at: row.try_get("created_at")?,
        updated_by: actor(row.try_get("updated_by")?),
        updated_at: row.try_get("updated_at")?,
        used_by: actor(row.try_get("used_by")?),
        used_at: row.try_get("used_at")?,
        used_quantity: row.try_get::<Option<Decimal>, _>("used_quantity")?,
        cancelled_by: actor(row.try_get("cancelled_by")?),
        cancelled_at: row.try_get("cancelled_at")?,
        cancellation_reason: row.try_get("cancellation_reason")?,
        deleted_by: actor(row.try_get("deleted_by")?),
        deleted_at: row.try_get("deleted_at")?,
        version: Version::new(row.try_get("version")?),
    }))
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        tenant_id: TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        deleted_at: row.try_get("deleted_at")?,
        deleted_by: actor(row.try_get("deleted_by")?),
    })
}

fn row_to_variant(row: &PgRow) -> Result<Variant> {
    Ok(Variant {
        id: VariantId::from_uuid(row.try_get::<Uuid, _>("id")?),
        tenant_id: TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        sku: row.try_get("sku")?,
        name: row.try_get("name")?,
        low_stock_threshold: row.try_get("low_stock_threshold")?,
        created_at: row.try_get("created_at")?,
        deleted_at: row.try_get("deleted_at")?,
        deleted_by: actor(row.try_get("deleted_by")?),
    })
}

fn row_to_warehouse(row: &PgRow) -> Result<Warehouse> {
    Ok(Warehouse {
        id: WarehouseId::from_uuid(row.try_get::<Uuid, _>("id")?),
        tenant_id: TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id")?),
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        deleted_at: row.try_get("deleted_at")?,
        deleted_by: actor(row.try_get("deleted_by")?),
    })
}

/// Maps a violation of `constraint` to `Duplicate`; anything else stays a
/// database error.
fn duplicate_on(
    err: sqlx::Error,
    constraint: &str,
    entity: &'static str,
    key: impl FnOnce() -> String,
) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.constraint() == Some(constraint)
    {
        return StoreError::Duplicate { entity, key: key() };
    }
    StoreError::Database(err)
}

impl PostgresUnitOfWork {
    /// Explains why a versioned update matched no row.
    async fn update_miss(
        &mut self,
        table: &str,
        aggregate_type: &'static str,
        id: Uuid,
        expected: Version,
    ) -> StoreError {
        let sql = format!("SELECT version FROM {table} WHERE id = $1");
        let actual: std::result::Result<Option<i64>, sqlx::Error> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await;

        match actual {
            Ok(Some(actual)) => StoreError::ConcurrencyConflict {
                aggregate_type,
                id: id.to_string(),
                expected,
                actual: Version::new(actual),
            },
            Ok(None) => StoreError::NotFound {
                entity: aggregate_type,
                id: id.to_string(),
            },
            Err(e) => StoreError::Database(e),
        }
    }
}

#[async_trait]
impl InventoryRepository for PostgresUnitOfWork {
    async fn get_by_variant_and_warehouse(
        &mut self,
        key: &StockKey,
    ) -> Result<Option<InventoryItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items \
             WHERE tenant_id = $1 AND variant_id = $2 AND warehouse_id = $3 FOR UPDATE"
        );
        let row = sqlx::query(&sql)
            .bind(key.tenant_id.as_uuid())
            .bind(key.variant_id.as_uuid())
            .bind(key.warehouse_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_item).transpose()
    }

    async fn add_item(&mut self, item: &InventoryItem) -> Result<Version> {
        let key = item.key();
        sqlx::query(
            r#"
            INSERT INTO inventory_items (id, tenant_id, variant_id, warehouse_id, total_stock,
                reserved_stock, allow_negative_stock, expiry_date, opened_at, created_at,
                updated_at, deleted_at, deleted_by, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 1)
            "#,
        )
        .bind(item.id().as_uuid())
        .bind(key.tenant_id.as_uuid())
        .bind(key.variant_id.as_uuid())
        .bind(key.warehouse_id.as_uuid())
        .bind(item.total_stock())
        .bind(item.reserved_stock())
        .bind(item.allow_negative_stock())
        .bind(item.expiry_date())
        .bind(item.opened_at())
        .bind(item.created_at())
        .bind(item.updated_at())
        .bind(item.deleted_at())
        .bind(item.deleted_by().map(ActorId::as_str))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            duplicate_on(e, "unique_inventory_key", InventoryItem::aggregate_type(), || {
                key.to_string()
            })
        })?;

        Ok(Version::first())
    }

    async fn update_item(&mut self, item: &InventoryItem) -> Result<Version> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE inventory_items
            SET total_stock = $2, reserved_stock = $3, allow_negative_stock = $4,
                expiry_date = $5, opened_at = $6, updated_at = $7, deleted_at = $8,
                deleted_by = $9, version = version + 1
            WHERE id = $1 AND version = $10
            RETURNING version
            "#,
        )
        .bind(item.id().as_uuid())
        .bind(item.total_stock())
        .bind(item.reserved_stock())
        .bind(item.allow_negative_stock())
        .bind(item.expiry_date())
        .bind(item.opened_at())
        .bind(item.updated_at())
        .bind(item.deleted_at())
        .bind(item.deleted_by().map(ActorId::as_str))
        .bind(item.version().as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        match version {
            Some(version) => Ok(Version::new(version)),
            None => Err(self
                .update_miss(
                    "inventory_items",
                    InventoryItem::aggregate_type(),
                    item.id().as_uuid(),
                    item.version(),
                )
                .await),
        }
    }
}

#[async_trait]
impl MovementRepository for PostgresUnitOfWork {
    async fn add_movement(&mut self, movement: &StockMovement) -> Result<()> {
        let metadata_json = serde_json::to_value(&movement.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO stock_movements (id, tenant_id, inventory_item_id, variant_id,
                warehouse_id, movement_type, entry_type, quantity, running_balance, reason,
                actor, occurred_at, reference, metadata, paired_movement_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.tenant_id.as_uuid())
        .bind(movement.inventory_item_id.as_uuid())
        .bind(movement.variant_id.as_uuid())
        .bind(movement.warehouse_id.as_uuid())
        .bind(movement.movement_type.as_str())
        .bind(movement.entry_type.as_str())
        .bind(movement.quantity)
        .bind(movement.running_balance)
        .bind(&movement.reason)
        .bind(movement.actor.as_str())
        .bind(movement.occurred_at)
        .bind(movement.reference.as_deref())
        .bind(metadata_json)
        .bind(movement.paired_movement_id.map(|id| id.as_uuid()))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn get_movements_by_reference(
        &mut self,
        tenant_id: TenantId,
        reference: &str,
    ) -> Result<Vec<StockMovement>> {
        // Held until commit/rollback; serializes refunds against one sale.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("{tenant_id}:{reference}"))
            .execute(&mut *self.tx)
            .await?;

        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE tenant_id = $1 AND reference = $2 ORDER BY seq ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(reference)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter().map(row_to_movement).collect()
    }
}

#[async_trait]
impl ReservationRepository for PostgresUnitOfWork {
    async fn get_by_id(
        &mut self,
        tenant_id: TenantId,
        id: ReservationId,
    ) -> Result<Option<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE id = $1 AND tenant_id = $2 FOR UPDATE"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_reservation).transpose()
    }

    async fn add_reservation(&mut self, reservation: &Reservation) -> Result<Version> {
        let key = reservation.key();
        sqlx::query(
            r#"
            INSERT INTO reservations (id, tenant_id, variant_id, warehouse_id, quantity,
                expires_at, status, reference, reason, created_by, created_at, updated_by,
                updated_at, used_by, used_at, used_quantity, cancelled_by, cancelled_at,
                cancellation_reason, deleted_by, deleted_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, 1)
            "#,
        )
        .bind(reservation.id().as_uuid())
        .bind(key.tenant_id.as_uuid())
        .bind(key.variant_id.as_uuid())
        .bind(key.warehouse_id.as_uuid())
        .bind(reservation.quantity())
        .bind(reservation.expires_at())
        .bind(reservation.status().as_str())
        .bind(reservation.reference())
        .bind(reservation.reason())
        .bind(reservation.created_by().as_str())
        .bind(reservation.created_at())
        .bind(reservation.updated_by().map(ActorId::as_str))
        .bind(reservation.updated_at())
        .bind(reservation.used_by().map(ActorId::as_str))
        .bind(reservation.used_at())
        .bind(reservation.used_quantity())
        .bind(reservation.cancelled_by().map(ActorId::as_str))
        .bind(reservation.cancelled_at())
        .bind(reservation.cancellation_reason())
        .bind(reservation.deleted_by().map(ActorId::as_str))
        .bind(reservation.deleted_at())
        .execute(&mut *self.tx)
        .await?;

        Ok(Version::first())
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<Version> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE reservations
            SET quantity = $2, expires_at = $3, status = $4, reason = $5, updated_by = $6,
                updated_at = $7, used_by = $8, used_at = $9, used_quantity = $10,
                cancelled_by = $11, cancelled_at = $12, cancellation_reason = $13,
                deleted_by = $14, deleted_at = $15, version = version + 1
            WHERE id = $1 AND version = $16
            RETURNING version
            "#,
        )
        .bind(reservation.id().as_uuid())
        .bind(reservation.quantity())
        .bind(reservation.expires_at())
        .bind(reservation.status().as_str())
        .bind(reservation.reason())
        .bind(reservation.updated_by().map(ActorId::as_str))
        .bind(reservation.updated_at())
        .bind(reservation.used_by().map(ActorId::as_str))
        .bind(reservation.used_at())
        .bind(reservation.used_quantity())
        .bind(reservation.cancelled_by().map(ActorId::as_str))
        .bind(reservation.cancelled_at())
        .bind(reservation.cancellation_reason())
        .bind(reservation.deleted_by().map(ActorId::as_str))
        .bind(reservation.deleted_at())
        .bind(reservation.version().as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        match version {
            Some(version) => Ok(Version::new(version)),
            None => Err(self
                .update_miss(
                    "reservations",
                    Reservation::aggregate_type(),
                    reservation.id().as_uuid(),
                    reservation.version(),
                )
                .await),
        }
    }
}

#[async_trait]
impl CatalogRepository for PostgresUnitOfWork {
    async fn get_product(&mut self, tenant_id: TenantId, id: ProductId) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND tenant_id = $2");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn add_product(&mut self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, tenant_id, name, description, created_at, deleted_at, deleted_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.tenant_id.as_uuid())
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.created_at)
        .bind(product.deleted_at)
        .bind(product.deleted_by.as_ref().map(ActorId::as_str))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn get_variant(&mut self, tenant_id: TenantId, id: VariantId) -> Result<Option<Variant>> {
        let sql = format!("SELECT {VARIANT_COLUMNS} FROM variants WHERE id = $1 AND tenant_id = $2");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_variant).transpose()
    }

    async fn find_variant_by_sku(
        &mut self,
        tenant_id: TenantId,
        sku: &str,
    ) -> Result<Option<Variant>> {
        let sql = format!("SELECT {VARIANT_COLUMNS} FROM variants WHERE tenant_id = $1 AND sku = $2");
        let row = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(sku)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_variant).transpose()
    }

    async fn add_variant(&mut self, variant: &Variant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO variants (id, tenant_id, product_id, sku, name, low_stock_threshold,
                created_at, deleted_at, deleted_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(variant.id.as_uuid())
        .bind(variant.tenant_id.as_uuid())
        .bind(variant.product_id.as_uuid())
        .bind(&variant.sku)
        .bind(&variant.name)
        .bind(variant.low_stock_threshold)
        .bind(variant.created_at)
        .bind(variant.deleted_at)
        .bind(variant.deleted_by.as_ref().map(ActorId::as_str))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| duplicate_on(e, "unique_tenant_sku", "Variant", || variant.sku.clone()))?;

        Ok(())
    }

    async fn get_warehouse(
        &mut self,
        tenant_id: TenantId,
        id: WarehouseId,
    ) -> Result<Option<Warehouse>> {
        let sql =
            format!("SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = $1 AND tenant_id = $2");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_warehouse).transpose()
    }

    async fn find_warehouse_by_code(
        &mut self,
        tenant_id: TenantId,
        code: &str,
    ) -> Result<Option<Warehouse>> {
        let sql =
            format!("SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE tenant_id = $1 AND code = $2");
        let row = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_warehouse).transpose()
    }

    async fn add_warehouse(&mut self, warehouse: &Warehouse) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO warehouses (id, tenant_id, code, name, created_at, deleted_at, deleted_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(warehouse.id.as_uuid())
        .bind(warehouse.tenant_id.as_uuid())
        .bind(&warehouse.code)
        .bind(&warehouse.name)
        .bind(warehouse.created_at)
        .bind(warehouse.deleted_at)
        .bind(warehouse.deleted_by.as_ref().map(ActorId::as_str))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            duplicate_on(e, "unique_tenant_warehouse_code", "Warehouse", || {
                warehouse.code.clone()
            })
        })?;

        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Builds the WHERE clause for a movement query; binds happen in the same
/// order in `bind_movement_filters`.
fn movement_filters(query: &MovementQuery) -> (String, usize) {
    let mut sql = String::from(" WHERE tenant_id = $1");
    let mut param_count = 1;

    if query.variant_id.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND variant_id = ${param_count}"));
    }
    if query.warehouse_id.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND warehouse_id = ${param_count}"));
    }
    if query.movement_types.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND movement_type = ANY(${param_count})"));
    }
    if query.reference.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND reference = ${param_count}"));
    }
    if query.from_timestamp.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND occurred_at >= ${param_count}"));
    }
    if query.to_timestamp.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND occurred_at <= ${param_count}"));
    }

    (sql, param_count)
}

fn bind_movement_filters<'q>(mut q: PgQuery<'q>, query: &'q MovementQuery) -> PgQuery<'q> {
    q = q.bind(query.tenant_id.as_uuid());
    if let Some(variant_id) = query.variant_id {
        q = q.bind(variant_id.as_uuid());
    }
    if let Some(warehouse_id) = query.warehouse_id {
        q = q.bind(warehouse_id.as_uuid());
    }
    if let Some(ref types) = query.movement_types {
        let types: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
        q = q.bind(types);
    }
    if let Some(ref reference) = query.reference {
        q = q.bind(reference.as_str());
    }
    if let Some(from) = query.from_timestamp {
        q = q.bind(from);
    }
    if let Some(to) = query.to_timestamp {
        q = q.bind(to);
    }
    q
}

fn reservation_filters(query: &ReservationQuery) -> (String, usize) {
    let mut sql = String::from(" WHERE tenant_id = $1 AND deleted_at IS NULL");
    let mut param_count = 1;

    if query.status.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND status = ${param_count}"));
    }
    if query.variant_id.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND variant_id = ${param_count}"));
    }
    if query.warehouse_id.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND warehouse_id = ${param_count}"));
    }

    (sql, param_count)
}

fn bind_reservation_filters<'q>(mut q: PgQuery<'q>, query: &'q ReservationQuery) -> PgQuery<'q> {
    q = q.bind(query.tenant_id.as_uuid());
    if let Some(status) = query.status {
        q = q.bind(status.as_str());
    }
    if let Some(variant_id) = query.variant_id {
        q = q.bind(variant_id.as_uuid());
    }
    if let Some(warehouse_id) = query.warehouse_id {
        q = q.bind(warehouse_id.as_uuid());
    }
    q
}

#[async_trait]
impl Store for PostgresStore {
    type UnitOfWork = PostgresUnitOfWork;

    async fn begin(&self) -> Result<PostgresUnitOfWork> {
        let tx = self.pool.begin().await?;
        Ok(PostgresUnitOfWork { tx })
    }

    async fn find_inventory(&self, key: &StockKey) -> Result<Option<InventoryItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items \
             WHERE tenant_id = $1 AND variant_id = $2 AND warehouse_id = $3 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(key.tenant_id.as_uuid())
            .bind(key.variant_id.as_uuid())
            .bind(key.warehouse_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_item).transpose()
    }

    async fn find_reservation(
        &self,
        tenant_id: TenantId,
        id: ReservationId,
    ) -> Result<Option<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_reservation).transpose()
    }

    async fn list_reservations(&self, query: ReservationQuery) -> Result<Page<Reservation>> {
        let (filters, param_count) = reservation_filters(&query);
        let limit = query.effective_limit();
        let offset = query.effective_offset();

        let count_sql = format!("SELECT COUNT(*) AS total FROM reservations{filters}");
        let total: i64 = bind_reservation_filters(sqlx::query(&count_sql), &query)
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;

        let page_sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations{filters} \
             ORDER BY created_at DESC, id ASC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );
        let rows = bind_reservation_filters(sqlx::query(&page_sql), &query)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items: rows.iter().map(row_to_reservation).collect::<Result<_>>()?,
            total: total as u64,
            limit,
            offset,
        })
    }

    async fn due_for_expiry(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<(TenantId, ReservationId)>> {
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, id FROM reservations
            WHERE status = 'Active' AND deleted_at IS NULL AND expires_at <= $1
            ORDER BY expires_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<_> {
                Ok((
                    TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id")?),
                    ReservationId::from_uuid(row.try_get::<Uuid, _>("id")?),
                ))
            })
            .collect()
    }

    async fn expiring_reservations(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE status = 'Active' AND deleted_at IS NULL AND expires_at > $1 AND expires_at <= $2 \
             ORDER BY expires_at ASC LIMIT $3"
        );
        let rows = sqlx::query(&sql)
            .bind(from)
            .bind(to)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_reservation).collect()
    }

    async fn movement_history(&self, query: MovementQuery) -> Result<Page<StockMovement>> {
        let (filters, param_count) = movement_filters(&query);
        let limit = query.effective_limit();
        let offset = query.effective_offset();

        let count_sql = format!("SELECT COUNT(*) AS total FROM stock_movements{filters}");
        let total: i64 = bind_movement_filters(sqlx::query(&count_sql), &query)
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;

        let page_sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements{filters} \
             ORDER BY occurred_at ASC, seq ASC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );
        let rows = bind_movement_filters(sqlx::query(&page_sql), &query)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items: rows.iter().map(row_to_movement).collect::<Result<_>>()?,
            total: total as u64,
            limit,
            offset,
        })
    }

    async fn movements_by_reference(
        &self,
        tenant_id: TenantId,
        reference: &str,
    ) -> Result<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE tenant_id = $1 AND reference = $2 ORDER BY seq ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(reference)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_movement).collect()
    }

    async fn stream_ledger(&self, item_id: InventoryItemId) -> Result<LedgerStream> {
        let pool = self.pool.clone();
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE inventory_item_id = $1 AND seq > $2 ORDER BY seq ASC LIMIT $3"
        );

        // Keyset paging on seq; the cursor is None once a short page is seen.
        let pages = futures_util::stream::try_unfold(Some(0_i64), move |cursor| {
            let pool = pool.clone();
            let sql = sql.clone();
            async move {
                let Some(after) = cursor else {
                    return Ok(None);
                };
                let rows = sqlx::query(&sql)
                    .bind(item_id.as_uuid())
                    .bind(after)
                    .bind(LEDGER_PAGE_SIZE)
                    .fetch_all(&pool)
                    .await?;
                let Some(last) = rows.last() else {
                    return Ok(None);
                };

                let last_seq: i64 = last.try_get("seq")?;
                let next = (rows.len() as i64 == LEDGER_PAGE_SIZE).then_some(last_seq);
                let movements = rows
                    .iter()
                    .map(row_to_movement)
                    .collect::<Result<Vec<_>>>()?;
                Ok::<_, StoreError>(Some((movements, next)))
            }
        });

        let stream = pages
            .map_ok(|page| futures_util::stream::iter(page.into_iter().map(Ok)))
            .try_flatten();

        Ok(Box::pin(stream))
    }

    async fn low_stock_items(
        &self,
        tenant_id: TenantId,
        warehouse_id: Option<WarehouseId>,
    ) -> Result<Vec<LowStockEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT items.*, v.sku, v.low_stock_threshold
            FROM inventory_items AS items
            JOIN variants v ON v.id = items.variant_id
            WHERE items.tenant_id = $1
              AND items.deleted_at IS NULL
              AND v.deleted_at IS NULL
              AND ($2::uuid IS NULL OR items.warehouse_id = $2)
              AND (items.total_stock - items.reserved_stock) <= v.low_stock_threshold
            ORDER BY v.sku ASC, items.warehouse_id ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(warehouse_id.map(|w| w.as_uuid()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<_> {
                Ok(LowStockEntry {
                    item: row_to_item(row)?,
                    sku: row.try_get("sku")?,
                    threshold: row.try_get("low_stock_threshold")?,
                })
            })
            .collect()
    }

    async fn find_product(&self, tenant_id: TenantId, id: ProductId) -> Result<Option<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn find_variant(&self, tenant_id: TenantId, id: VariantId) -> Result<Option<Variant>> {
        let sql = format!(
            "SELECT {VARIANT_COLUMNS} FROM variants \
             WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_variant).transpose()
    }

    async fn find_warehouse(
        &self,
        tenant_id: TenantId,
        id: WarehouseId,
    ) -> Result<Option<Warehouse>> {
        let sql = format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM warehouses \
             WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_warehouse).transpose()
    }

    async fn list_warehouses(&self, tenant_id: TenantId) -> Result<Vec<Warehouse>> {
        let sql = format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM warehouses \
             WHERE tenant_id = $1 AND deleted_at IS NULL ORDER BY code ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_warehouse).collect()
    }
}
