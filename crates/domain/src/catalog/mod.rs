//! Catalog entities: products, their variants, and warehouses.

mod product;
mod warehouse;

pub use product::{Product, Variant};
pub use warehouse::Warehouse;

use common::{ProductId, VariantId, WarehouseId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::error::ErrorCode;

/// Errors that can occur during catalog operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Variant not found: {0}")]
    VariantNotFound(VariantId),

    #[error("Warehouse not found: {0}")]
    WarehouseNotFound(WarehouseId),

    #[error("SKU {0} is already in use")]
    DuplicateSku(String),

    #[error("Warehouse code {0} is already in use")]
    DuplicateWarehouseCode(String),

    #[error("{field} must not be empty")]
    Blank { field: &'static str },

    #[error("Low stock threshold {0} must not be negative")]
    NegativeThreshold(Decimal),
}

impl CatalogError {
    /// Returns the stable failure code.
    pub fn code(&self) -> ErrorCode {
        match self {
            CatalogError::ProductNotFound(_) => ErrorCode::ProductNotFound,
            CatalogError::VariantNotFound(_) => ErrorCode::VariantNotFound,
            CatalogError::WarehouseNotFound(_) => ErrorCode::WarehouseNotFound,
            CatalogError::DuplicateSku(_) | CatalogError::DuplicateWarehouseCode(_) => {
                ErrorCode::AlreadyExists
            }
            CatalogError::Blank { .. } => ErrorCode::InvalidInput,
            CatalogError::NegativeThreshold(_) => ErrorCode::InvalidQuantity,
        }
    }
}

pub(crate) fn require(value: &str, field: &'static str) -> Result<String, CatalogError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::Blank { field });
    }
    Ok(trimmed.to_string())
}
