//! Service behaviour against the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use application::{
    AdjustStock, CancelReservation, CatalogService, CreateProduct, CreateReservation,
    CreateVariant, CreateWarehouse, DeleteInventoryItem, ExpirySettings, InventoryService,
    ModifyReservationQuantity, MovementDetails, RecordPurchase, RecordRefund, RecordSale,
    ReservationExpiryWorker, ReservationService, SetOpeningBalance, TransferStock,
    UseReservation, WriteOffStock,
};
use chrono::{Duration, Utc};
use common::{ActorId, ReservationId, TenantId};
use domain::{ErrorCode, InventoryEvent, MovementType, ReservationStatus, StockKey};
use notifications::{BroadcastPublisher, EventPublisher};
use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use store::{InMemoryStore, MovementQuery, ReservationQuery, Store};

struct Fixture {
    store: InMemoryStore,
    publisher: Arc<BroadcastPublisher>,
    inventory: InventoryService<InMemoryStore>,
    reservations: Arc<ReservationService<InMemoryStore>>,
    catalog: CatalogService<InMemoryStore>,
    tenant: TenantId,
    key: StockKey,
}

fn actor() -> ActorId {
    ActorId::new("clerk")
}

fn details(reason: &str) -> MovementDetails {
    MovementDetails::new(reason, actor())
}

impl Fixture {
    async fn new() -> Self {
        let store = InMemoryStore::new();
        let publisher = Arc::new(BroadcastPublisher::default());
        let sink: Arc<dyn EventPublisher> = publisher.clone();

        let catalog = CatalogService::new(store.clone());
        let tenant = TenantId::new();
        let product = catalog
            .create_product(CreateProduct {
                tenant_id: tenant,
                name: "Espresso beans".into(),
                description: None,
            })
            .await
            .unwrap();
        let variant = catalog
            .create_variant(CreateVariant {
                tenant_id: tenant,
                product_id: product.id,
                sku: "bean-1kg".into(),
                name: "1 kg".into(),
                low_stock_threshold: dec!(5),
            })
            .await
            .unwrap();
        let warehouse = catalog
            .create_warehouse(CreateWarehouse {
                tenant_id: tenant,
                code: "ams".into(),
                name: "Amsterdam".into(),
            })
            .await
            .unwrap();

        Self {
            inventory: InventoryService::new(store.clone(), sink.clone()),
            reservations: Arc::new(ReservationService::new(store.clone(), sink)),
            catalog,
            store,
            publisher,
            tenant,
            key: StockKey::new(tenant, variant.id, warehouse.id),
        }
    }

    async fn open(&self, quantity: Decimal) {
        self.inventory
            .set_opening_balance(SetOpeningBalance::new(self.key, quantity, details("count")))
            .await
            .unwrap();
    }

    async fn reserve(&self, quantity: Decimal) -> ReservationId {
        self.reservations
            .create_reservation(CreateReservation::new(
                self.key,
                quantity,
                Utc::now() + Duration::minutes(30),
                actor(),
            ))
            .await
            .unwrap()
            .reservation
            .id()
    }

    async fn levels(&self) -> (Decimal, Decimal, Decimal) {
        let item = self.inventory.get_inventory(&self.key).await.unwrap();
        (
            item.total_stock(),
            item.reserved_stock(),
            item.available_stock(),
        )
    }
}

#[tokio::test]
async fn purchase_and_reservation_move_the_balances() {
    let fx = Fixture::new().await;
    fx.open(dec!(100)).await;

    fx.inventory
        .record_purchase(RecordPurchase::new(fx.key, dec!(50), details("restock")))
        .await
        .unwrap();
    fx.reserve(dec!(30)).await;

    assert_eq!(fx.levels().await, (dec!(150), dec!(30), dec!(120)));
    // Reserving writes no movement.
    assert_eq!(fx.store.movement_count().await, 2);
}

#[tokio::test]
async fn second_opening_balance_is_rejected() {
    let fx = Fixture::new().await;
    fx.open(dec!(10)).await;

    let err = fx
        .inventory
        .set_opening_balance(SetOpeningBalance::new(fx.key, dec!(5), details("recount")))
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::OpeningBalanceExists));
    assert_eq!(fx.levels().await.0, dec!(10));
}

#[tokio::test]
async fn opening_balance_requires_a_known_variant() {
    let fx = Fixture::new().await;
    let key = StockKey::new(fx.tenant, common::VariantId::new(), fx.key.warehouse_id);

    let err = fx
        .inventory
        .set_opening_balance(SetOpeningBalance::new(key, dec!(1), details("count")))
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::VariantNotFound));
}

#[tokio::test]
async fn commands_on_a_missing_item_are_not_found() {
    let fx = Fixture::new().await;

    let err = fx
        .inventory
        .record_sale(RecordSale::new(fx.key, dec!(1), details("order")))
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::InventoryNotFound));
}

#[tokio::test]
async fn non_positive_quantities_are_invalid() {
    let fx = Fixture::new().await;
    fx.open(dec!(10)).await;

    for quantity in [dec!(0), dec!(-3)] {
        let err = fx
            .inventory
            .record_purchase(RecordPurchase::new(fx.key, quantity, details("po")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidQuantity));
    }
}

#[tokio::test]
async fn oversell_leaves_item_and_ledger_untouched() {
    let fx = Fixture::new().await;
    fx.open(dec!(10)).await;
    fx.reserve(dec!(4)).await;

    let err = fx
        .inventory
        .record_sale(RecordSale::new(fx.key, dec!(7), details("order")))
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::InsufficientStock));
    assert_eq!(fx.levels().await, (dec!(10), dec!(4), dec!(6)));
    assert_eq!(fx.store.movement_count().await, 1);
}

#[tokio::test]
async fn failed_movement_write_rolls_back_the_item() {
    let fx = Fixture::new().await;
    fx.open(dec!(10)).await;
    let before = fx.inventory.get_inventory(&fx.key).await.unwrap();

    fx.store.fail_movement_writes(true);
    let err = fx
        .inventory
        .write_off_stock(WriteOffStock::new(fx.key, dec!(3), details("damaged")))
        .await
        .unwrap_err();
    fx.store.fail_movement_writes(false);

    assert_eq!(err.code(), None);
    let after = fx.inventory.get_inventory(&fx.key).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(fx.store.movement_count().await, 1);
}

#[tokio::test]
async fn adjustment_needs_a_reason() {
    let fx = Fixture::new().await;
    fx.open(dec!(10)).await;

    let err = fx
        .inventory
        .adjust_stock(AdjustStock::new(fx.key, dec!(-2), details("")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidInput));

    let change = fx
        .inventory
        .adjust_stock(AdjustStock::new(fx.key, dec!(-2), details("cycle count")))
        .await
        .unwrap();
    assert_eq!(change.item.total_stock(), dec!(8));
    assert_eq!(change.movements[0].running_balance, dec!(8));
}

#[tokio::test]
async fn refunds_are_capped_by_the_original_sale() {
    let fx = Fixture::new().await;
    fx.open(dec!(20)).await;
    fx.inventory
        .record_sale(RecordSale::new(
            fx.key,
            dec!(10),
            details("order").with_reference("ORD-1"),
        ))
        .await
        .unwrap();

    let refund = |quantity: Decimal| {
        RecordRefund::new(fx.key, quantity, "ORD-1", details("customer return"))
    };

    let err = fx.inventory.record_refund(refund(dec!(11))).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::RefundExceedsSale));

    fx.inventory.record_refund(refund(dec!(6))).await.unwrap();
    fx.inventory.record_refund(refund(dec!(4))).await.unwrap();

    let err = fx.inventory.record_refund(refund(dec!(5))).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::RefundExceedsSale));

    let ledger = fx
        .inventory
        .refundable_quantity(fx.tenant, "ORD-1", None)
        .await
        .unwrap();
    assert_eq!(ledger.sold(), dec!(10));
    assert_eq!(ledger.remaining(), dec!(0));
    assert_eq!(fx.levels().await.0, dec!(20));
}

#[tokio::test]
async fn refund_without_a_sale_is_not_found() {
    let fx = Fixture::new().await;
    fx.open(dec!(20)).await;

    let err = fx
        .inventory
        .record_refund(RecordRefund::new(fx.key, dec!(1), "NOPE", details("return")))
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::OriginalSaleNotFound));
}

impl Fixture {
    /// Adds a second variant of the fixture product, stocked in the same warehouse.
    async fn second_variant(&self, quantity: Decimal) -> StockKey {
        let first = self
            .catalog
            .get_variant(self.tenant, self.key.variant_id)
            .await
            .unwrap();
        let variant = self
            .catalog
            .create_variant(CreateVariant {
                tenant_id: self.tenant,
                product_id: first.product_id,
                sku: "bean-250g".into(),
                name: "250 g".into(),
                low_stock_threshold: dec!(5),
            })
            .await
            .unwrap();
        let key = StockKey::new(self.tenant, variant.id, self.key.warehouse_id);
        self.inventory
            .set_opening_balance(SetOpeningBalance::new(key, quantity, details("count")))
            .await
            .unwrap();
        key
    }
}

#[tokio::test]
async fn refund_only_restocks_the_variant_that_was_sold() {
    let fx = Fixture::new().await;
    fx.open(dec!(20)).await;
    let other = fx.second_variant(dec!(8)).await;
    fx.inventory
        .record_sale(RecordSale::new(
            fx.key,
            dec!(10),
            details("order").with_reference("ORD-X"),
        ))
        .await
        .unwrap();

    let err = fx
        .inventory
        .record_refund(RecordRefund::new(other, dec!(5), "ORD-X", details("return")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::OriginalSaleNotFound));
    assert_eq!(
        fx.inventory.get_inventory(&other).await.unwrap().total_stock(),
        dec!(8)
    );

    // The sold variant keeps its full refundable remainder.
    let err = fx
        .inventory
        .record_refund(RecordRefund::new(fx.key, dec!(11), "ORD-X", details("return")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::RefundExceedsSale));
    fx.inventory
        .record_refund(RecordRefund::new(fx.key, dec!(10), "ORD-X", details("return")))
        .await
        .unwrap();

    let err = fx
        .inventory
        .refundable_quantity(fx.tenant, "ORD-X", Some(other.variant_id))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::OriginalSaleNotFound));
}

#[tokio::test]
async fn modifying_a_reservation_down_releases_the_difference() {
    let fx = Fixture::new().await;
    fx.open(dec!(50)).await;
    let id = fx.reserve(dec!(20)).await;

    fx.reservations
        .modify_quantity(ModifyReservationQuantity {
            tenant_id: fx.tenant,
            reservation_id: id,
            quantity: dec!(5),
            actor: actor(),
        })
        .await
        .unwrap();

    assert_eq!(fx.levels().await, (dec!(50), dec!(5), dec!(45)));
}

#[tokio::test]
async fn growing_a_reservation_past_availability_changes_nothing() {
    let fx = Fixture::new().await;
    fx.open(dec!(10)).await;
    let id = fx.reserve(dec!(5)).await;

    let err = fx
        .reservations
        .modify_quantity(ModifyReservationQuantity {
            tenant_id: fx.tenant,
            reservation_id: id,
            quantity: dec!(11),
            actor: actor(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::InsufficientStock));
    let reservation = fx.reservations.get_reservation(fx.tenant, id).await.unwrap();
    assert_eq!(reservation.quantity(), dec!(5));
}

#[tokio::test]
async fn cancelling_twice_is_rejected() {
    let fx = Fixture::new().await;
    fx.open(dec!(10)).await;
    let id = fx.reserve(dec!(4)).await;
    let cancel = || CancelReservation {
        tenant_id: fx.tenant,
        reservation_id: id,
        reason: Some("customer changed mind".into()),
        actor: actor(),
    };

    let change = fx.reservations.cancel(cancel()).await.unwrap();
    assert_eq!(change.reservation.status(), ReservationStatus::Cancelled);
    assert_eq!(fx.levels().await, (dec!(10), dec!(0), dec!(10)));

    let err = fx.reservations.cancel(cancel()).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::ReservationNotActive));
}

#[tokio::test]
async fn using_part_of_a_reservation_sells_it_and_frees_the_rest() {
    let fx = Fixture::new().await;
    fx.open(dec!(20)).await;
    let id = fx
        .reservations
        .create_reservation(
            CreateReservation::new(fx.key, dec!(10), Utc::now() + Duration::hours(1), actor())
                .with_reference("ORD-7"),
        )
        .await
        .unwrap()
        .reservation
        .id();

    let change = fx
        .reservations
        .use_reservation(UseReservation {
            tenant_id: fx.tenant,
            reservation_id: id,
            quantity_used: dec!(6),
            actor: actor(),
        })
        .await
        .unwrap();

    assert_eq!(change.reservation.status(), ReservationStatus::PartiallyFulfilled);
    assert_eq!(fx.levels().await, (dec!(14), dec!(0), dec!(14)));

    let sale = &change.stock.movements[0];
    assert_eq!(sale.movement_type, MovementType::Sale);
    assert_eq!(sale.reference.as_deref(), Some("ORD-7"));
    assert_eq!(
        fx.inventory
            .refundable_quantity(fx.tenant, "ORD-7", None)
            .await
            .unwrap()
            .remaining(),
        dec!(6)
    );
}

#[tokio::test]
async fn transfer_moves_stock_between_warehouses() {
    let fx = Fixture::new().await;
    fx.open(dec!(30)).await;
    let second = fx
        .catalog
        .create_warehouse(CreateWarehouse {
            tenant_id: fx.tenant,
            code: "rtm".into(),
            name: "Rotterdam".into(),
        })
        .await
        .unwrap();
    let destination = StockKey::new(fx.tenant, fx.key.variant_id, second.id);
    fx.inventory
        .set_opening_balance(SetOpeningBalance::new(destination, dec!(0), details("count")))
        .await
        .unwrap();

    let transfer = fx
        .inventory
        .transfer_stock(TransferStock {
            tenant_id: fx.tenant,
            variant_id: fx.key.variant_id,
            from_warehouse_id: fx.key.warehouse_id,
            to_warehouse_id: second.id,
            quantity: dec!(12),
            details: details("rebalance"),
        })
        .await
        .unwrap();

    assert_eq!(transfer.source.item.total_stock(), dec!(18));
    assert_eq!(transfer.destination.item.total_stock(), dec!(12));

    let legs = fx
        .inventory
        .movements_by_reference(fx.tenant, &transfer.reference)
        .await
        .unwrap();
    assert_eq!(legs.len(), 2);
    assert_eq!(legs[0].quantity + legs[1].quantity, dec!(0));

    let history = fx
        .inventory
        .movement_history(
            MovementQuery::for_tenant(fx.tenant).movement_type(MovementType::Transfer),
        )
        .await
        .unwrap();
    assert_eq!(history.total, 2);
}

#[tokio::test]
async fn item_with_reserved_stock_cannot_be_deleted() {
    let fx = Fixture::new().await;
    fx.open(dec!(10)).await;
    fx.reserve(dec!(1)).await;

    let err = fx
        .inventory
        .delete_item(DeleteInventoryItem {
            key: fx.key,
            actor: actor(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::BusinessRuleViolation));
}

#[tokio::test]
async fn sale_into_low_stock_publishes_an_alert() {
    let fx = Fixture::new().await;
    fx.open(dec!(10)).await;
    let mut events = fx.publisher.subscribe();

    fx.inventory
        .record_sale(RecordSale::new(fx.key, dec!(6), details("order")))
        .await
        .unwrap();

    let first = events.recv().await.unwrap();
    assert!(matches!(first, InventoryEvent::StockLevelChanged(ref e) if e.available_stock == dec!(4)));
    let second = events.recv().await.unwrap();
    assert!(matches!(second, InventoryEvent::LowStockAlert(ref a) if a.threshold == dec!(5)));

    let low = fx.inventory.low_stock(fx.tenant, None).await.unwrap();
    assert_eq!(low.len(), 1);
}

#[tokio::test]
async fn ledger_verifies_after_mixed_activity() {
    let fx = Fixture::new().await;
    fx.open(dec!(10)).await;
    fx.inventory
        .record_purchase(RecordPurchase::new(fx.key, dec!(5), details("po")))
        .await
        .unwrap();
    fx.inventory
        .record_sale(RecordSale::new(fx.key, dec!(3), details("order")))
        .await
        .unwrap();

    let report = fx.inventory.verify_ledger(&fx.key).await.unwrap();

    assert!(report.is_consistent());
    assert_eq!(report.movement_count, 3);
    assert_eq!(report.ledger_total, dec!(12));
}

#[tokio::test]
async fn duplicate_sku_is_rejected() {
    let fx = Fixture::new().await;
    let variant = fx.catalog.get_variant(fx.tenant, fx.key.variant_id).await.unwrap();

    let err = fx
        .catalog
        .create_variant(CreateVariant {
            tenant_id: fx.tenant,
            product_id: variant.product_id,
            sku: "BEAN-1KG".into(),
            name: "again".into(),
            low_stock_threshold: dec!(0),
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::AlreadyExists));
}

#[tokio::test]
async fn expiry_sweep_releases_lapsed_reservations_once() {
    let fx = Fixture::new().await;
    fx.open(dec!(10)).await;
    let id = fx.reserve(dec!(4)).await;
    let worker = ReservationExpiryWorker::new(fx.reservations.clone(), ExpirySettings::default());

    let later = Utc::now() + Duration::hours(1);
    let report = worker.sweep(later).await.unwrap();
    assert_eq!(report.expired, 1);

    let reservation = fx.reservations.get_reservation(fx.tenant, id).await.unwrap();
    assert_eq!(reservation.status(), ReservationStatus::Expired);
    assert_eq!(fx.levels().await, (dec!(10), dec!(0), dec!(10)));

    let report = worker.sweep(later).await.unwrap();
    assert_eq!(report.expired, 0);
}

#[tokio::test]
async fn expiring_reservations_are_announced_once() {
    let fx = Fixture::new().await;
    fx.open(dec!(10)).await;
    fx.reserve(dec!(2)).await;
    let worker = ReservationExpiryWorker::new(
        fx.reservations.clone(),
        ExpirySettings {
            warning_window: Duration::hours(1),
            ..ExpirySettings::default()
        },
    );
    let mut events = fx.publisher.subscribe();

    let now = Utc::now();
    assert_eq!(worker.sweep(now).await.unwrap().warned, 1);
    assert_eq!(worker.sweep(now).await.unwrap().warned, 0);

    assert!(matches!(
        events.recv().await.unwrap(),
        InventoryEvent::ReservationExpiring(_)
    ));

    let active = fx
        .store
        .list_reservations(ReservationQuery::for_tenant(fx.tenant).status(ReservationStatus::Active))
        .await
        .unwrap();
    assert_eq!(active.total, 1);
}

/// Counts increments of one counter, whatever its labels.
struct CounterTally {
    name: &'static str,
    total: Arc<AtomicU64>,
}

impl Recorder for CounterTally {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        if key.name() == self.name {
            Counter::from_arc(self.total.clone())
        } else {
            Counter::noop()
        }
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

#[tokio::test]
async fn each_committed_movement_is_counted_once() {
    let tally = CounterTally {
        name: "inventory_movements_recorded",
        total: Arc::new(AtomicU64::new(0)),
    };
    // The test runtime is single-threaded, so the local recorder sees every await.
    let _guard = metrics::set_default_local_recorder(&tally);

    let fx = Fixture::new().await;
    fx.open(dec!(10)).await;
    fx.inventory
        .record_sale(RecordSale::new(fx.key, dec!(3), details("order")))
        .await
        .unwrap();
    fx.inventory
        .record_sale(RecordSale::new(fx.key, dec!(30), details("order")))
        .await
        .unwrap_err();

    assert_eq!(tally.total.load(Ordering::Relaxed), 2);
}
