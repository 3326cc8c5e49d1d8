//! Refundable-quantity policy over the movements sharing a sale reference.

use common::VariantId;
use rust_decimal::Decimal;

use super::{InventoryError, MovementType, StockMovement};

/// Sold and refunded totals for one sale reference.
///
/// Built from the movements loaded inside the refund's own transaction, so
/// the remainder is never cached between requests.
#[derive(Debug, Clone, PartialEq)]
pub struct RefundLedger {
    reference: String,
    has_sale: bool,
    sold: Decimal,
    refunded: Decimal,
}

impl RefundLedger {
    /// Tallies the sale and refund movements carrying `reference`.
    pub fn from_movements<'a>(
        reference: &str,
        movements: impl IntoIterator<Item = &'a StockMovement>,
    ) -> Self {
        let mut ledger = Self {
            reference: reference.to_string(),
            has_sale: false,
            sold: Decimal::ZERO,
            refunded: Decimal::ZERO,
        };

        for movement in movements {
            if movement.reference.as_deref() != Some(reference) {
                continue;
            }
            match movement.movement_type {
                MovementType::Sale => {
                    ledger.has_sale = true;
                    if movement.quantity < Decimal::ZERO {
                        ledger.sold += movement.quantity.abs();
                    }
                }
                MovementType::Refund if movement.quantity > Decimal::ZERO => {
                    ledger.refunded += movement.quantity;
                }
                _ => {}
            }
        }

        ledger
    }

    /// Like [`from_movements`](Self::from_movements), counting only the
    /// movements of `variant_id`. A refund may only return goods of the
    /// variant that was sold.
    pub fn for_variant<'a>(
        reference: &str,
        variant_id: VariantId,
        movements: impl IntoIterator<Item = &'a StockMovement>,
    ) -> Self {
        Self::from_movements(
            reference,
            movements
                .into_iter()
                .filter(move |movement| movement.variant_id == variant_id),
        )
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Total quantity sold under the reference.
    pub fn sold(&self) -> Decimal {
        self.sold
    }

    /// Total quantity already refunded under the reference.
    pub fn refunded(&self) -> Decimal {
        self.refunded
    }

    /// Quantity that can still be refunded.
    pub fn remaining(&self) -> Decimal {
        (self.sold - self.refunded).max(Decimal::ZERO)
    }

    /// Checks that `requested` can be refunded against this reference.
    pub fn ensure_refundable(&self, requested: Decimal) -> Result<(), InventoryError> {
        if !self.has_sale {
            return Err(InventoryError::OriginalSaleNotFound {
                reference: self.reference.clone(),
            });
        }
        if requested > self.remaining() {
            return Err(InventoryError::RefundExceedsSale {
                reference: self.reference.clone(),
                requested,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }
}
