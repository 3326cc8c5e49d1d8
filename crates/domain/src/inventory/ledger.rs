//! Ledger/balance agreement checks.

use common::MovementId;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{EntryType, MovementType, StockMovement};

/// A single inconsistency found while walking a ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerDiscrepancy {
    /// The first entry is not an opening balance.
    MissingOpeningBalance,
    /// An opening balance appears after the first entry.
    MisplacedOpeningBalance { movement_id: MovementId },
    /// `running_balance` does not equal the previous balance plus `quantity`.
    RunningBalanceMismatch {
        movement_id: MovementId,
        expected: Decimal,
        recorded: Decimal,
    },
    /// Debit/credit side disagrees with the quantity sign.
    EntryTypeMismatch { movement_id: MovementId },
    /// The item's stored total disagrees with the ledger.
    TotalMismatch {
        ledger_total: Decimal,
        recorded_total: Decimal,
    },
}

/// Outcome of verifying one item's ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerReport {
    pub movement_count: usize,
    pub opening_balance: Option<Decimal>,
    pub ledger_total: Decimal,
    pub recorded_total: Decimal,
    pub discrepancies: Vec<LedgerDiscrepancy>,
}

impl LedgerReport {
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// Incrementally checks movements in ledger order.
///
/// Fed one movement at a time so a ledger can be verified straight off a
/// stream without buffering it.
#[derive(Debug, Default)]
pub struct LedgerVerifier {
    count: usize,
    opening_balance: Option<Decimal>,
    sum: Decimal,
    last_running: Option<Decimal>,
    discrepancies: Vec<LedgerDiscrepancy>,
}

impl LedgerVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks a complete ledger against the item's recorded total.
    pub fn verify<'a>(
        movements: impl IntoIterator<Item = &'a StockMovement>,
        recorded_total: Decimal,
    ) -> LedgerReport {
        let mut verifier = Self::new();
        for movement in movements {
            verifier.push(movement);
        }
        verifier.finish(recorded_total)
    }

    pub fn push(&mut self, movement: &StockMovement) {
        let is_opening = movement.movement_type == MovementType::OpeningBalance;
        if self.count == 0 {
            if is_opening {
                self.opening_balance = Some(movement.quantity);
            } else {
                self.discrepancies
                    .push(LedgerDiscrepancy::MissingOpeningBalance);
            }
        } else if is_opening {
            self.discrepancies
                .push(LedgerDiscrepancy::MisplacedOpeningBalance {
                    movement_id: movement.id,
                });
        }

        let expected = self.last_running.unwrap_or(Decimal::ZERO) + movement.quantity;
        if expected != movement.running_balance {
            self.discrepancies
                .push(LedgerDiscrepancy::RunningBalanceMismatch {
                    movement_id: movement.id,
                    expected,
                    recorded: movement.running_balance,
                });
        }

        if movement.entry_type != EntryType::for_quantity(movement.quantity) {
            self.discrepancies.push(LedgerDiscrepancy::EntryTypeMismatch {
                movement_id: movement.id,
            });
        }

        self.count += 1;
        self.sum += movement.quantity;
        // Next entry is checked against this row as recorded.
        self.last_running = Some(movement.running_balance);
    }

    pub fn finish(mut self, recorded_total: Decimal) -> LedgerReport {
        let last = self.last_running.unwrap_or(Decimal::ZERO);
        if self.sum != recorded_total || last != recorded_total {
            self.discrepancies.push(LedgerDiscrepancy::TotalMismatch {
                ledger_total: self.sum,
                recorded_total,
            });
        }

        LedgerReport {
            movement_count: self.count,
            opening_balance: self.opening_balance,
            ledger_total: self.sum,
            recorded_total,
            discrepancies: self.discrepancies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{InventoryItem, MovementContext, StockKey};
    use chrono::Utc;
    use common::{ActorId, ReservationId, TenantId, VariantId, WarehouseId};
    use rust_decimal_macros::dec;

    fn ctx() -> MovementContext {
        MovementContext::new("test", ActorId::new("tester"))
    }

    #[test]
    fn ledger_agrees_with_balance_after_mixed_mutations() {
        let key = StockKey::new(TenantId::new(), VariantId::new(), WarehouseId::new());
        let mut item = InventoryItem::new(key, false, None, Utc::now());
        let mut ledger = vec![item.set_opening_balance(dec!(100), &ctx()).unwrap()];

        ledger.push(item.record_purchase(dec!(50), &ctx()).unwrap());
        ledger.push(
            item.record_sale(dec!(30.5), &ctx().with_reference("S1"))
                .unwrap(),
        );
        ledger.push(item.record_refund(dec!(0.5), "S1", &ctx()).unwrap());
        ledger.push(item.record_adjustment(dec!(-2), &ctx()).unwrap());
        ledger.push(item.record_write_off(dec!(8), &ctx()).unwrap());
        item.reserve_stock(dec!(10), ReservationId::new(), Utc::now())
            .unwrap();

        let report = LedgerVerifier::verify(&ledger, item.total_stock());

        assert!(report.is_consistent(), "{:?}", report.discrepancies);
        assert_eq!(report.movement_count, 6);
        assert_eq!(report.opening_balance, Some(dec!(100)));
        assert_eq!(report.ledger_total, dec!(110));
        assert_eq!(ledger.last().unwrap().running_balance, item.total_stock());
    }

    #[test]
    fn detects_tampered_running_balance_and_total() {
        let key = StockKey::new(TenantId::new(), VariantId::new(), WarehouseId::new());
        let mut item = InventoryItem::new(key, false, None, Utc::now());
        let mut ledger = vec![item.set_opening_balance(dec!(10), &ctx()).unwrap()];
        ledger.push(item.record_purchase(dec!(5), &ctx()).unwrap());
        ledger[1].running_balance = dec!(16);

        let report = LedgerVerifier::verify(&ledger, dec!(15));

        assert!(!report.is_consistent());
        assert!(report.discrepancies.iter().any(|d| matches!(
            d,
            LedgerDiscrepancy::RunningBalanceMismatch { expected, .. } if *expected == dec!(15)
        )));
        assert!(report
            .discrepancies
            .iter()
            .any(|d| matches!(d, LedgerDiscrepancy::TotalMismatch { .. })));
    }

    #[test]
    fn empty_ledger_has_no_opening_balance() {
        let report = LedgerVerifier::verify(std::iter::empty(), dec!(0));
        assert!(report.is_consistent());
        assert_eq!(report.opening_balance, None);
    }
}
