//! Domain error types and the stable error code taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::inventory::InventoryError;
use crate::reservation::ReservationError;

/// The two general categories of domain failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was well-formed but violates a business rule or state.
    BusinessRule,
    /// The request carried an invalid argument.
    InvalidInput,
}

/// Stable, machine-readable failure codes surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InventoryNotFound,
    ReservationNotFound,
    OriginalSaleNotFound,
    ProductNotFound,
    VariantNotFound,
    WarehouseNotFound,
    ReservationNotActive,
    OpeningBalanceExists,
    AlreadyExists,
    InsufficientStock,
    InvalidQuantity,
    RefundExceedsSale,
    BusinessRuleViolation,
    InvalidInput,
    ValidationFailed,
    ConcurrencyConflict,
}

impl ErrorCode {
    /// Returns the wire representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InventoryNotFound => "INVENTORY_NOT_FOUND",
            ErrorCode::ReservationNotFound => "RESERVATION_NOT_FOUND",
            ErrorCode::OriginalSaleNotFound => "ORIGINAL_SALE_NOT_FOUND",
            ErrorCode::ProductNotFound => "PRODUCT_NOT_FOUND",
            ErrorCode::VariantNotFound => "VARIANT_NOT_FOUND",
            ErrorCode::WarehouseNotFound => "WAREHOUSE_NOT_FOUND",
            ErrorCode::ReservationNotActive => "RESERVATION_NOT_ACTIVE",
            ErrorCode::OpeningBalanceExists => "OPENING_BALANCE_EXISTS",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorCode::InvalidQuantity => "INVALID_QUANTITY",
            ErrorCode::RefundExceedsSale => "REFUND_EXCEEDS_SALE",
            ErrorCode::BusinessRuleViolation => "BUSINESS_RULE_VIOLATION",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
        }
    }

    /// Returns the failure category this code belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::InvalidQuantity | ErrorCode::InvalidInput | ErrorCode::ValidationFailed => {
                ErrorKind::InvalidInput
            }
            _ => ErrorKind::BusinessRule,
        }
    }

    /// Returns true for the `*_NOT_FOUND` family.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ErrorCode::InventoryNotFound
                | ErrorCode::ReservationNotFound
                | ErrorCode::OriginalSaleNotFound
                | ErrorCode::ProductNotFound
                | ErrorCode::VariantNotFound
                | ErrorCode::WarehouseNotFound
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the domain layer.
///
/// Every variant carries a stable [`ErrorCode`]; none of them indicate a
/// system fault.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Reservation(#[from] ReservationError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl DomainError {
    /// Returns the stable failure code.
    pub fn code(&self) -> ErrorCode {
        match self {
            DomainError::Inventory(e) => e.code(),
            DomainError::Reservation(e) => e.code(),
            DomainError::Catalog(e) => e.code(),
        }
    }

    /// Returns the failure category.
    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }
}

/// Returned when a persisted enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
