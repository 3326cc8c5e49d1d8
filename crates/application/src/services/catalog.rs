use chrono::Utc;
use common::{ProductId, TenantId, VariantId, WarehouseId};
use domain::{CatalogError, Product, Variant, Warehouse};
use store::{CatalogRepository, Store};

use crate::commands::{CreateProduct, CreateVariant, CreateWarehouse};
use crate::error::Result;
use crate::handler::CommandHandler;
use crate::validation::validate;

/// Products, variants and warehouses.
pub struct CatalogService<S: Store> {
    handler: CommandHandler<S>,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_product(&self, cmd: CreateProduct) -> Result<Product> {
        validate(&cmd)?;
        let product = Product::new(cmd.tenant_id, &cmd.name, cmd.description, Utc::now())?;

        self.handler
            .execute("create_product", move |uow| {
                Box::pin(async move {
                    uow.add_product(&product).await?;
                    Ok(product)
                })
            })
            .await
    }

    /// Adds a variant; the SKU must be unused within the tenant.
    #[tracing::instrument(skip(self))]
    pub async fn create_variant(&self, cmd: CreateVariant) -> Result<Variant> {
        validate(&cmd)?;
        let now = Utc::now();

        self.handler
            .execute("create_variant", move |uow| {
                Box::pin(async move {
                    let product = uow
                        .get_product(cmd.tenant_id, cmd.product_id)
                        .await?
                        .ok_or(CatalogError::ProductNotFound(cmd.product_id))?;
                    let variant =
                        Variant::new(&product, &cmd.sku, &cmd.name, cmd.low_stock_threshold, now)?;

                    if uow
                        .find_variant_by_sku(cmd.tenant_id, &variant.sku)
                        .await?
                        .is_some()
                    {
                        return Err(CatalogError::DuplicateSku(variant.sku).into());
                    }
                    uow.add_variant(&variant).await?;
                    Ok(variant)
                })
            })
            .await
    }

    /// Adds a warehouse; the code must be unused within the tenant.
    #[tracing::instrument(skip(self))]
    pub async fn create_warehouse(&self, cmd: CreateWarehouse) -> Result<Warehouse> {
        validate(&cmd)?;
        let warehouse = Warehouse::new(cmd.tenant_id, &cmd.code, &cmd.name, Utc::now())?;

        self.handler
            .execute("create_warehouse", move |uow| {
                Box::pin(async move {
                    if uow
                        .find_warehouse_by_code(warehouse.tenant_id, &warehouse.code)
                        .await?
                        .is_some()
                    {
                        return Err(CatalogError::DuplicateWarehouseCode(warehouse.code).into());
                    }
                    uow.add_warehouse(&warehouse).await?;
                    Ok(warehouse)
                })
            })
            .await
    }

    pub async fn get_product(&self, tenant_id: TenantId, id: ProductId) -> Result<Product> {
        self.handler
            .store()
            .find_product(tenant_id, id)
            .await?
            .ok_or_else(|| CatalogError::ProductNotFound(id).into())
    }

    pub async fn get_variant(&self, tenant_id: TenantId, id: VariantId) -> Result<Variant> {
        self.handler
            .store()
            .find_variant(tenant_id, id)
            .await?
            .ok_or_else(|| CatalogError::VariantNotFound(id).into())
    }

    pub async fn get_warehouse(&self, tenant_id: TenantId, id: WarehouseId) -> Result<Warehouse> {
        self.handler
            .store()
            .find_warehouse(tenant_id, id)
            .await?
            .ok_or_else(|| CatalogError::WarehouseNotFound(id).into())
    }

    pub async fn list_warehouses(&self, tenant_id: TenantId) -> Result<Vec<Warehouse>> {
        Ok(self.handler.store().list_warehouses(tenant_id).await?)
    }
}
