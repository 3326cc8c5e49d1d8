//! HTTP API server with observability for the inventory ledger.
//!
//! Provides REST endpoints for catalog, ledger and reservation operations,
//! a dashboard read model with a server-sent event stream, structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod context;
pub mod error;
pub mod routes;

use std::sync::Arc;

use application::{
    CatalogService, ExpirySettings, InventoryService, ReservationExpiryWorker, ReservationService,
};
use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use notifications::{BroadcastPublisher, DashboardView, EventPublisher, NotificationRelay};
use store::Store;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub inventory: InventoryService<S>,
    pub reservations: Arc<ReservationService<S>>,
    pub catalog: CatalogService<S>,
    pub dashboard: DashboardView,
    pub publisher: BroadcastPublisher,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    use routes::{catalog, dashboard, inventory, movements, reservations};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        // Catalog
        .route("/products", post(catalog::create_product::<S>))
        .route("/products/{id}", get(catalog::get_product::<S>))
        .route("/variants", post(catalog::create_variant::<S>))
        .route("/variants/{id}", get(catalog::get_variant::<S>))
        .route(
            "/warehouses",
            post(catalog::create_warehouse::<S>).get(catalog::list_warehouses::<S>),
        )
        .route("/warehouses/{id}", get(catalog::get_warehouse::<S>))
        // Ledger
        .route(
            "/inventory/opening-balance",
            post(inventory::opening_balance::<S>),
        )
        .route("/inventory/purchases", post(inventory::purchase::<S>))
        .route("/inventory/sales", post(inventory::sale::<S>))
        .route("/inventory/refunds", post(inventory::refund::<S>))
        .route("/inventory/adjustments", post(inventory::adjust::<S>))
        .route("/inventory/write-offs", post(inventory::write_off::<S>))
        .route("/inventory/transfers", post(inventory::transfer::<S>))
        .route("/inventory/low-stock", get(inventory::low_stock::<S>))
        .route(
            "/inventory/{variant_id}/{warehouse_id}",
            get(inventory::get::<S>)
                .patch(inventory::update_settings::<S>)
                .delete(inventory::delete::<S>),
        )
        .route(
            "/inventory/{variant_id}/{warehouse_id}/ledger-check",
            get(inventory::ledger_check::<S>),
        )
        .route("/movements", get(movements::history::<S>))
        .route(
            "/movements/by-reference/{reference}",
            get(movements::by_reference::<S>),
        )
        .route(
            "/refunds/{reference}/remaining",
            get(movements::refundable::<S>),
        )
        // Reservations
        .route(
            "/reservations",
            post(reservations::create::<S>).get(reservations::list::<S>),
        )
        .route(
            "/reservations/{id}",
            get(reservations::get::<S>).delete(reservations::delete::<S>),
        )
        .route(
            "/reservations/{id}/quantity",
            patch(reservations::modify_quantity::<S>),
        )
        .route("/reservations/{id}/expiry", patch(reservations::extend::<S>))
        .route(
            "/reservations/{id}/reason",
            patch(reservations::update_reason::<S>),
        )
        .route("/reservations/{id}/cancel", post(reservations::cancel::<S>))
        .route(
            "/reservations/{id}/use",
            post(reservations::use_reservation::<S>),
        )
        // Notifications
        .route("/dashboard", get(dashboard::snapshot::<S>))
        .route("/events", get(dashboard::events::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over one store.
pub fn create_default_state<S: Store + Clone>(store: S) -> Arc<AppState<S>> {
    let publisher = BroadcastPublisher::default();
    let sink: Arc<dyn EventPublisher> = Arc::new(publisher.clone());

    Arc::new(AppState {
        inventory: InventoryService::new(store.clone(), sink.clone()),
        reservations: Arc::new(ReservationService::new(store.clone(), sink)),
        catalog: CatalogService::new(store),
        dashboard: DashboardView::new(),
        publisher,
    })
}

/// Starts the dashboard relay and the reservation expiry worker.
///
/// Both stop when `shutdown` flips to true.
pub fn spawn_background_tasks<S: Store>(
    state: &AppState<S>,
    expiry: ExpirySettings,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let mut relay = NotificationRelay::new();
    relay.register(Box::new(state.dashboard.clone()));
    let relay = tokio::spawn(relay.run(state.publisher.subscribe(), shutdown.clone()));

    let worker = ReservationExpiryWorker::new(state.reservations.clone(), expiry);
    let worker = tokio::spawn(worker.run(shutdown));

    vec![relay, worker]
}
