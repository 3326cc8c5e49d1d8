//! Inventory item ledger aggregate and related types.

mod item;
mod ledger;
mod movement;
mod refund;

pub use item::{InventoryItem, InventoryItemParts, ReleaseOutcome, StockKey};
pub use ledger::{LedgerDiscrepancy, LedgerReport, LedgerVerifier};
pub use movement::{EntryType, MovementContext, MovementType, StockMovement};
pub use refund::RefundLedger;

use common::{VariantId, WarehouseId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::error::ErrorCode;

/// Errors that can occur during inventory operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InventoryError {
    /// No inventory item exists for the pair, or it was deleted.
    #[error("Inventory not found for variant {variant_id} in warehouse {warehouse_id}")]
    NotFound {
        variant_id: VariantId,
        warehouse_id: WarehouseId,
    },

    /// The opening balance for the pair was already recorded.
    #[error(
        "Opening balance already exists for variant {variant_id} in warehouse {warehouse_id}"
    )]
    OpeningBalanceExists {
        variant_id: VariantId,
        warehouse_id: WarehouseId,
    },

    /// Quantity outside the range the operation accepts.
    #[error("Invalid quantity {quantity}: {expected}")]
    InvalidQuantity {
        quantity: Decimal,
        expected: &'static str,
    },

    /// Not enough available stock and negative stock is not allowed.
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        requested: Decimal,
        available: Decimal,
    },

    /// No sale movement carries the reference a refund points at.
    #[error("Original sale not found for reference {reference}")]
    OriginalSaleNotFound { reference: String },

    /// The refund would return more than was sold and not yet refunded.
    #[error(
        "Refund of {requested} exceeds the refundable quantity {remaining} for reference {reference}"
    )]
    RefundExceedsSale {
        reference: String,
        requested: Decimal,
        remaining: Decimal,
    },

    /// A malformed argument other than a quantity.
    #[error("{0}")]
    InvalidInput(String),

    /// A state-dependent rule not covered by a more specific variant.
    #[error("{0}")]
    BusinessRule(String),
}

impl InventoryError {
    /// Returns the stable failure code.
    pub fn code(&self) -> ErrorCode {
        match self {
            InventoryError::NotFound { .. } => ErrorCode::InventoryNotFound,
            InventoryError::OpeningBalanceExists { .. } => ErrorCode::OpeningBalanceExists,
            InventoryError::InvalidQuantity { .. } => ErrorCode::InvalidQuantity,
            InventoryError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            InventoryError::OriginalSaleNotFound { .. } => ErrorCode::OriginalSaleNotFound,
            InventoryError::RefundExceedsSale { .. } => ErrorCode::RefundExceedsSale,
            InventoryError::InvalidInput(_) => ErrorCode::InvalidInput,
            InventoryError::BusinessRule(_) => ErrorCode::BusinessRuleViolation,
        }
    }
}
