//! Liveness endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use notifications::ReadModel;
use serde::Serialize;
use store::Store;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Open notification subscriptions (dashboard relay plus SSE clients).
    pub subscribers: usize,
    /// Items the dashboard view currently tracks.
    pub tracked_items: usize,
}

/// GET /health
pub async fn check<S: Store>(State(state): State<Arc<AppState<S>>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        subscribers: state.publisher.subscriber_count(),
        tracked_items: state.dashboard.count(),
    })
}
