//! Products and their sellable variants.

use chrono::{DateTime, Utc};
use common::{ActorId, ProductId, TenantId, VariantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CatalogError, require};

/// A catalog product. Stock is never held against a product directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<ActorId>,
}

impl Product {
    pub fn new(
        tenant_id: TenantId,
        name: &str,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            id: ProductId::new(),
            tenant_id,
            name: require(name, "product name")?,
            description,
            created_at: now,
            deleted_at: None,
            deleted_by: None,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn soft_delete(&mut self, actor: ActorId, now: DateTime<Utc>) {
        self.deleted_at = Some(now);
        self.deleted_by = Some(actor);
    }
}

/// A sellable variant of a product, identified by SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    /// Available stock at or below this level raises a low-stock alert.
    pub low_stock_threshold: Decimal,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<ActorId>,
}

impl Variant {
    pub fn new(
        product: &Product,
        sku: &str,
        name: &str,
        low_stock_threshold: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Self, CatalogError> {
        if product.is_deleted() {
            return Err(CatalogError::ProductNotFound(product.id));
        }
        if low_stock_threshold < Decimal::ZERO {
            return Err(CatalogError::NegativeThreshold(low_stock_threshold));
        }

        Ok(Self {
            id: VariantId::new(),
            tenant_id: product.tenant_id,
            product_id: product.id,
            sku: require(sku, "sku")?.to_uppercase(),
            name: require(name, "variant name")?,
            low_stock_threshold,
            created_at: now,
            deleted_at: None,
            deleted_by: None,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns true if `available` stock should raise a low-stock alert.
    pub fn is_low(&self, available: Decimal) -> bool {
        available <= self.low_stock_threshold
    }

    pub fn soft_delete(&mut self, actor: ActorId, now: DateTime<Utc>) {
        self.deleted_at = Some(now);
        self.deleted_by = Some(actor);
    }
}
