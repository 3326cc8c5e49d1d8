use chrono::Utc;
use common::{ActorId, TenantId, VariantId, WarehouseId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{InventoryItem, LedgerVerifier, MovementContext, RefundLedger, StockKey};
use rust_decimal::Decimal;

fn opened() -> InventoryItem {
    let key = StockKey::new(TenantId::new(), VariantId::new(), WarehouseId::new());
    let mut item = InventoryItem::new(key, false, None, Utc::now());
    item.set_opening_balance(
        Decimal::from(1_000_000),
        &MovementContext::new("opening", ActorId::system()),
    )
    .unwrap();
    item
}

fn bench_record_sale(c: &mut Criterion) {
    let mut item = opened();
    let context = MovementContext::new("sale", ActorId::system()).with_reference("SALE-BENCH");

    c.bench_function("domain/record_sale", |b| {
        b.iter(|| item.record_sale(Decimal::ONE, &context).unwrap());
    });
}

fn bench_refund_ledger(c: &mut Criterion) {
    let mut item = opened();
    let context = MovementContext::new("sale", ActorId::system()).with_reference("SALE-BENCH");
    let movements: Vec<_> = (0..1_000)
        .map(|_| item.record_sale(Decimal::ONE, &context).unwrap())
        .collect();

    c.bench_function("domain/refund_ledger_1000", |b| {
        b.iter(|| RefundLedger::from_movements("SALE-BENCH", &movements).remaining());
    });
}

fn bench_verify_ledger(c: &mut Criterion) {
    let mut item = opened();
    let mut movements = Vec::with_capacity(1_001);
    let context = MovementContext::new("po", ActorId::system());
    for _ in 0..1_000 {
        movements.push(item.record_purchase(Decimal::ONE, &context).unwrap());
    }

    c.bench_function("domain/verify_ledger_1000", |b| {
        b.iter(|| LedgerVerifier::verify(&movements, item.total_stock()));
    });
}

criterion_group!(
    benches,
    bench_record_sale,
    bench_refund_ledger,
    bench_verify_ledger
);
criterion_main!(benches);
