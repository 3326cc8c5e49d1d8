//! Read-side behaviour of the in-memory store.

use chrono::{Duration, Utc};
use common::{ActorId, TenantId, Version};
use domain::{
    Aggregate, InventoryItem, MovementContext, MovementType, Product, Reservation,
    ReservationStatus, StockKey, Variant, Warehouse,
};
use futures_util::TryStreamExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use store::{InMemoryStore, MovementQuery, ReservationQuery, Store, UnitOfWork};
use store::{CatalogRepository, InventoryRepository, MovementRepository, ReservationRepository};

struct Fixture {
    store: InMemoryStore,
    tenant: TenantId,
    variant: Variant,
    warehouse: Warehouse,
}

impl Fixture {
    async fn new(threshold: Decimal) -> Self {
        let store = InMemoryStore::new();
        let tenant = TenantId::new();
        let now = Utc::now();
        let product = Product::new(tenant, "Widget", None, now).unwrap();
        let variant = Variant::new(&product, "wid-red", "Red", threshold, now).unwrap();
        let warehouse = Warehouse::new(tenant, "main", "Main", now).unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.add_product(&product).await.unwrap();
        uow.add_variant(&variant).await.unwrap();
        uow.add_warehouse(&warehouse).await.unwrap();
        uow.commit().await.unwrap();

        Self {
            store,
            tenant,
            variant,
            warehouse,
        }
    }

    fn key(&self) -> StockKey {
        StockKey::new(self.tenant, self.variant.id, self.warehouse.id)
    }

    /// Opens the item and applies a sale and a purchase.
    async fn seed_ledger(&self) -> InventoryItem {
        let actor = ActorId::from("clerk");
        let mut uow = self.store.begin().await.unwrap();
        let mut item = InventoryItem::new(self.key(), false, None, Utc::now());

        let opening = item
            .set_opening_balance(dec!(100), &MovementContext::new("count", actor.clone()))
            .unwrap();
        let version = uow.add_item(&item).await.unwrap();
        item.set_version(version);
        uow.add_movement(&opening).await.unwrap();

        let sale = item
            .record_sale(
                dec!(10),
                &MovementContext::new("order", actor.clone()).with_reference("SALE-1"),
            )
            .unwrap();
        let purchase = item
            .record_purchase(
                dec!(5),
                &MovementContext::new("restock", actor).with_reference("PO-1"),
            )
            .unwrap();
        let version = uow.update_item(&item).await.unwrap();
        item.set_version(version);
        uow.add_movement(&sale).await.unwrap();
        uow.add_movement(&purchase).await.unwrap();
        uow.commit().await.unwrap();

        item
    }
}

#[tokio::test]
async fn movement_history_filters_and_pages() {
    let fixture = Fixture::new(dec!(0)).await;
    fixture.seed_ledger().await;

    let all = fixture
        .store
        .movement_history(MovementQuery::for_tenant(fixture.tenant))
        .await
        .unwrap();
    assert_eq!(all.total, 3);
    assert_eq!(all.items[0].movement_type, MovementType::OpeningBalance);

    let sales = fixture
        .store
        .movement_history(
            MovementQuery::for_tenant(fixture.tenant)
                .variant(fixture.variant.id)
                .movement_type(MovementType::Sale),
        )
        .await
        .unwrap();
    assert_eq!(sales.total, 1);
    assert_eq!(sales.items[0].quantity, dec!(-10));

    let page = fixture
        .store
        .movement_history(MovementQuery::for_tenant(fixture.tenant).limit(2).offset(2))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(!page.has_more());

    let other_tenant = fixture
        .store
        .movement_history(MovementQuery::for_tenant(TenantId::new()))
        .await
        .unwrap();
    assert_eq!(other_tenant.total, 0);
}

#[tokio::test]
async fn ledger_stream_is_in_append_order() {
    let fixture = Fixture::new(dec!(0)).await;
    let item = fixture.seed_ledger().await;

    let ledger: Vec<_> = fixture
        .store
        .stream_ledger(item.id())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    let balances: Vec<Decimal> = ledger.iter().map(|m| m.running_balance).collect();
    assert_eq!(balances, vec![dec!(100), dec!(90), dec!(95)]);
    assert_eq!(ledger.last().unwrap().running_balance, item.total_stock());
}

#[tokio::test]
async fn movements_by_reference_are_tenant_scoped() {
    let fixture = Fixture::new(dec!(0)).await;
    fixture.seed_ledger().await;

    let sale = fixture
        .store
        .movements_by_reference(fixture.tenant, "SALE-1")
        .await
        .unwrap();
    assert_eq!(sale.len(), 1);

    let foreign = fixture
        .store
        .movements_by_reference(TenantId::new(), "SALE-1")
        .await
        .unwrap();
    assert!(foreign.is_empty());
}

#[tokio::test]
async fn low_stock_uses_variant_threshold() {
    let fixture = Fixture::new(dec!(95)).await;
    fixture.seed_ledger().await;

    let low = fixture
        .store
        .low_stock_items(fixture.tenant, None)
        .await
        .unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].sku, "WID-RED");
    assert_eq!(low[0].item.available_stock(), dec!(95));

    let elsewhere = fixture
        .store
        .low_stock_items(fixture.tenant, Some(common::WarehouseId::new()))
        .await
        .unwrap();
    assert!(elsewhere.is_empty());
}

#[tokio::test]
async fn reservation_sweep_queries() {
    let fixture = Fixture::new(dec!(0)).await;
    fixture.seed_ledger().await;
    let now = Utc::now();
    let actor = ActorId::from("clerk");

    let mut uow = fixture.store.begin().await.unwrap();
    let soon = Reservation::create(
        fixture.key(),
        dec!(2),
        now + Duration::minutes(5),
        None,
        None,
        actor.clone(),
        now,
    )
    .unwrap();
    let later = Reservation::create(
        fixture.key(),
        dec!(3),
        now + Duration::hours(5),
        Some("CART-9".to_string()),
        None,
        actor,
        now,
    )
    .unwrap();
    assert_eq!(uow.add_reservation(&soon).await.unwrap(), Version::first());
    uow.add_reservation(&later).await.unwrap();
    uow.commit().await.unwrap();

    let expiring = fixture
        .store
        .expiring_reservations(now, now + Duration::minutes(10), 10)
        .await
        .unwrap();
    assert_eq!(expiring.len(), 1);
    assert_eq!(expiring[0].id(), soon.id());

    let due = fixture
        .store
        .due_for_expiry(now + Duration::hours(1), 10)
        .await
        .unwrap();
    assert_eq!(due, vec![(fixture.tenant, soon.id())]);

    let active = fixture
        .store
        .list_reservations(ReservationQuery::for_tenant(fixture.tenant).status(ReservationStatus::Active))
        .await
        .unwrap();
    assert_eq!(active.total, 2);
}
