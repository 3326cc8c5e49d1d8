//! Cross-aggregate scenarios over the pure domain model.

use chrono::{Duration, Utc};
use common::{ActorId, TenantId, VariantId, WarehouseId};
use domain::{
    ErrorCode, InventoryItem, LedgerVerifier, MovementContext, RefundLedger, Reservation,
    ReservationStatus, StockKey, StockMovement,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn ctx(reason: &str) -> MovementContext {
    MovementContext::new(reason, ActorId::new("integration"))
}

fn opened(quantity: Decimal) -> (InventoryItem, Vec<StockMovement>) {
    let key = StockKey::new(TenantId::new(), VariantId::new(), WarehouseId::new());
    let mut item = InventoryItem::new(key, false, None, Utc::now());
    let opening = item.set_opening_balance(quantity, &ctx("opening")).unwrap();
    (item, vec![opening])
}

/// Small deterministic generator so the sequence test is reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn quantity(&mut self) -> Decimal {
        Decimal::new((self.next() % 2000) as i64 + 1, 2)
    }
}

#[test]
fn ledger_matches_balance_after_arbitrary_sequences() {
    for seed in 1..=25u64 {
        let mut rng = Lcg(seed);
        let (mut item, mut ledger) = opened(dec!(50));
        let mut sales: Vec<(String, Decimal)> = Vec::new();

        for step in 0..60 {
            let quantity = rng.quantity();
            let result = match rng.next() % 5 {
                0 => item.record_purchase(quantity, &ctx("po")),
                1 => {
                    let reference = format!("SALE-{seed}-{step}");
                    let movement = item.record_sale(quantity, &ctx("sale").with_reference(&reference));
                    if movement.is_ok() {
                        sales.push((reference, quantity));
                    }
                    movement
                }
                2 => match sales.last() {
                    Some((reference, _)) => {
                        let remaining = RefundLedger::from_movements(reference, &ledger).remaining();
                        let refund = quantity.min(remaining);
                        if refund > Decimal::ZERO {
                            item.record_refund(refund, reference, &ctx("rma"))
                        } else {
                            continue;
                        }
                    }
                    None => continue,
                },
                3 => {
                    let delta = if rng.next() % 2 == 0 { quantity } else { -quantity };
                    item.record_adjustment(delta, &ctx("cycle count"))
                }
                _ => item.record_write_off(quantity, &ctx("damaged")),
            };

            match result {
                Ok(movement) => ledger.push(movement),
                Err(err) => assert_eq!(err.code(), ErrorCode::InsufficientStock),
            }

            assert!(item.total_stock() >= Decimal::ZERO);
            assert_eq!(ledger.last().unwrap().running_balance, item.total_stock());
        }

        let report = LedgerVerifier::verify(&ledger, item.total_stock());
        assert!(report.is_consistent(), "seed {seed}: {:?}", report.discrepancies);
        let signed_sum: Decimal = ledger.iter().map(|m| m.quantity).sum();
        assert_eq!(signed_sum, item.total_stock());
    }
}

#[test]
fn reservation_lifecycle_against_item() {
    let (mut item, _) = opened(dec!(100));
    let now = Utc::now();

    let mut reservation = Reservation::create(
        item.key(),
        dec!(20),
        now + Duration::hours(2),
        Some("ORD-77".to_string()),
        None,
        ActorId::new("clerk"),
        now,
    )
    .unwrap();
    item.reserve_stock(reservation.quantity(), reservation.id(), now)
        .unwrap();

    let delta = reservation
        .modify_quantity(dec!(5), ActorId::new("clerk"), now)
        .unwrap();
    assert_eq!(delta, dec!(-15));
    item.release_reserved_stock(-delta, reservation.id(), now)
        .unwrap();
    assert_eq!(item.reserved_stock(), dec!(5));

    let released = reservation
        .cancel(ActorId::new("clerk"), None, now)
        .unwrap();
    item.release_reserved_stock(released, reservation.id(), now)
        .unwrap();
    assert_eq!(item.reserved_stock(), dec!(0));

    let err = reservation
        .cancel(ActorId::new("clerk"), None, now)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ReservationNotActive);
    assert_eq!(reservation.status(), ReservationStatus::Cancelled);
    assert_eq!(item.reserved_stock(), dec!(0));
}

#[test]
fn reservation_increase_beyond_availability_leaves_item_untouched() {
    let (mut item, _) = opened(dec!(10));
    let now = Utc::now();
    let mut reservation = Reservation::create(
        item.key(),
        dec!(8),
        now + Duration::hours(1),
        None,
        None,
        ActorId::new("clerk"),
        now,
    )
    .unwrap();
    item.reserve_stock(dec!(8), reservation.id(), now).unwrap();

    let delta = reservation
        .modify_quantity(dec!(12), ActorId::new("clerk"), now)
        .unwrap();
    let err = item
        .reserve_stock(delta, reservation.id(), now)
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::InsufficientStock);
    assert_eq!(item.reserved_stock(), dec!(8));
}
