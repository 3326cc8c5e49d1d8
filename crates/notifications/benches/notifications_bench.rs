use chrono::Utc;
use common::{TenantId, VariantId, WarehouseId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{InventoryEvent, StockLevelChanged};
use notifications::{DashboardView, Projection};
use rust_decimal::Decimal;

fn level_events(tenant: TenantId, n: usize) -> Vec<InventoryEvent> {
    let warehouse = WarehouseId::new();
    (0..n)
        .map(|i| {
            let available = Decimal::from(i as i64 % 50);
            InventoryEvent::StockLevelChanged(StockLevelChanged {
                tenant_id: tenant,
                variant_id: VariantId::new(),
                warehouse_id: warehouse,
                total_stock: available,
                reserved_stock: Decimal::ZERO,
                available_stock: available,
                movement_id: None,
                movement_type: None,
                occurred_at: Utc::now(),
            })
        })
        .collect()
}

fn bench_dashboard_handle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let events = level_events(TenantId::new(), 1_000);

    c.bench_function("notifications/dashboard_handle_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                let view = DashboardView::new();
                for event in &events {
                    view.handle(event).await.unwrap();
                }
            });
        });
    });
}

fn bench_dashboard_snapshot(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let tenant = TenantId::new();
    let view = DashboardView::new();
    rt.block_on(async {
        for event in level_events(tenant, 1_000) {
            view.handle(&event).await.unwrap();
        }
    });

    c.bench_function("notifications/dashboard_snapshot", |b| {
        b.iter(|| rt.block_on(view.snapshot(tenant, Utc::now())));
    });
}

criterion_group!(benches, bench_dashboard_handle, bench_dashboard_snapshot);
criterion_main!(benches);
