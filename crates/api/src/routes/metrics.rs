//! Prometheus exposition of the ledger's counters and histograms.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusHandle;

const CONTENT_TYPE_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Registers help text for the metrics the services emit.
///
/// Must run after the recorder is installed.
pub fn describe() {
    describe_counter!(
        "inventory_commands_committed",
        "Commands whose transaction committed"
    );
    describe_counter!(
        "inventory_commands_rolled_back",
        "Commands rejected or failed and rolled back"
    );
    describe_histogram!(
        "inventory_command_duration_seconds",
        Unit::Seconds,
        "Time spent inside a command's transaction"
    );
    describe_counter!(
        "inventory_movements_recorded",
        "Ledger movements committed, by movement type"
    );
    describe_counter!(
        "inventory_ledger_discrepancies",
        "Ledger checks that disagreed with the recorded total"
    );
    describe_counter!(
        "inventory_reserved_release_floored",
        "Releases that asked for more than was reserved"
    );
    describe_counter!(
        "reservations_expired",
        "Reservations expired by the background sweep"
    );
    describe_counter!(
        "notifications_published",
        "Notifications handed to the broadcast channel, by type"
    );
}

/// GET /metrics
pub async fn render(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    ([(CONTENT_TYPE, CONTENT_TYPE_TEXT)], handle.render())
}
