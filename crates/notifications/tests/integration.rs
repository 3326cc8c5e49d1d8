//! Publisher → relay → dashboard, end to end.

use std::time::Duration;

use chrono::Utc;
use common::{ActorId, TenantId, VariantId, WarehouseId};
use domain::{
    InventoryEvent, InventoryItem, LowStockAlert, MovementContext, StockKey, StockLevelChanged,
};
use notifications::{
    BroadcastPublisher, DashboardView, EventPublisher, NotificationRelay, Projection,
};
use rust_decimal_macros::dec;
use tokio::sync::watch;

#[tokio::test]
async fn published_events_reach_the_dashboard() {
    let publisher = BroadcastPublisher::default();
    let dashboard = DashboardView::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut relay = NotificationRelay::new();
    relay.register(Box::new(dashboard.clone()));
    let relay = tokio::spawn(relay.run(publisher.subscribe(), shutdown_rx));

    let key = StockKey::new(TenantId::new(), VariantId::new(), WarehouseId::new());
    let mut item = InventoryItem::new(key, false, None, Utc::now());
    item.set_opening_balance(dec!(10), &MovementContext::new("count", ActorId::system()))
        .unwrap();
    let sale = item
        .record_sale(dec!(8), &MovementContext::new("order", ActorId::system()))
        .unwrap();

    publisher
        .publish(InventoryEvent::StockLevelChanged(StockLevelChanged::from_item(
            &item,
            Some(&sale),
        )))
        .await
        .unwrap();
    if let Some(alert) = LowStockAlert::check(&item, dec!(3)) {
        publisher
            .publish(InventoryEvent::LowStockAlert(alert))
            .await
            .unwrap();
    }

    // Wait for the relay to drain the channel.
    for _ in 0..50 {
        if dashboard.position().await.events_applied == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let snapshot = dashboard.snapshot(key.tenant_id, Utc::now()).await;
    assert_eq!(snapshot.levels.len(), 1);
    assert_eq!(snapshot.levels[0].available_stock, dec!(2));
    assert_eq!(snapshot.low_stock.len(), 1);
    assert_eq!(snapshot.low_stock[0].threshold, dec!(3));

    shutdown_tx.send(true).unwrap();
    relay.await.unwrap();
}
