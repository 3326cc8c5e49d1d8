//! Dashboard snapshot and the live notification stream.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::Utc;
use domain::DomainEvent;
use notifications::DashboardSnapshot;
use store::Store;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::AppState;
use crate::context::RequestContext;

/// GET /dashboard
pub async fn snapshot<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
) -> Json<DashboardSnapshot> {
    Json(state.dashboard.snapshot(ctx.tenant_id, Utc::now()).await)
}

/// GET /events: server-sent notifications for the caller's tenant.
///
/// A client that falls behind the channel silently misses events.
pub async fn events<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let tenant_id = ctx.tenant_id;
    let stream = BroadcastStream::new(state.publisher.subscribe()).filter_map(move |received| {
        let event = received.ok().filter(|e| e.tenant_id() == tenant_id)?;
        Event::default()
            .event(event.event_type())
            .json_data(&event)
            .ok()
            .map(Ok)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
