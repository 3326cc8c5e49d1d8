//! Reservation lifecycle endpoints.

use std::sync::Arc;

use application::{
    CancelReservation, CreateReservation, DeleteReservation, ExtendReservation,
    ModifyReservationQuantity, ReservationChange, UpdateReservationReason, UseReservation,
};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{ReservationId, VariantId, WarehouseId};
use domain::{Reservation, ReservationStatus, StockKey, StockMovement};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::{ReservationQuery, Store};

use super::inventory::InventoryResponse;
use super::movements::PageResponse;
use crate::AppState;
use crate::context::RequestContext;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub variant_id: VariantId,
    pub warehouse_id: WarehouseId,
    pub quantity: Decimal,
    pub expires_at: DateTime<Utc>,
    pub reference: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ExpiryRequest {
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UseRequest {
    pub quantity_used: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub variant_id: Option<VariantId>,
    pub warehouse_id: Option<WarehouseId>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct ReservationChangeResponse {
    pub reservation: Reservation,
    pub inventory: InventoryResponse,
    pub movements: Vec<StockMovement>,
}

impl From<ReservationChange> for ReservationChangeResponse {
    fn from(change: ReservationChange) -> Self {
        Self {
            inventory: InventoryResponse::from(&change.stock.item),
            reservation: change.reservation,
            movements: change.stock.movements,
        }
    }
}

// -- Handlers --

/// POST /reservations
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Json(req): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ReservationChangeResponse>), ApiError> {
    let cmd = CreateReservation {
        key: StockKey::new(ctx.tenant_id, req.variant_id, req.warehouse_id),
        quantity: req.quantity,
        expires_at: req.expires_at,
        reference: req.reference,
        reason: req.reason,
        actor: ctx.actor,
    };
    let change = state.reservations.create_reservation(cmd).await?;
    Ok((StatusCode::CREATED, Json(change.into())))
}

/// GET /reservations
#[tracing::instrument(skip(state))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Query(params): Query<ListParams>,
) -> Result<Json<PageResponse<Reservation>>, ApiError> {
    let mut query = ReservationQuery::for_tenant(ctx.tenant_id);
    if let Some(raw) = params.status.as_deref() {
        let status: ReservationStatus = raw
            .parse()
            .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
        query = query.status(status);
    }
    if let Some(variant_id) = params.variant_id {
        query = query.variant(variant_id);
    }
    if let Some(warehouse_id) = params.warehouse_id {
        query = query.warehouse(warehouse_id);
    }
    if let Some(limit) = params.limit {
        query = query.limit(limit);
    }
    if let Some(offset) = params.offset {
        query = query.offset(offset);
    }

    let page = state.reservations.list_reservations(query).await?;
    Ok(Json(page.into()))
}

/// GET /reservations/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<ReservationId>,
) -> Result<Json<Reservation>, ApiError> {
    let reservation = state.reservations.get_reservation(ctx.tenant_id, id).await?;
    Ok(Json(reservation))
}

/// PATCH /reservations/{id}/quantity
#[tracing::instrument(skip(state))]
pub async fn modify_quantity<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<ReservationId>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<ReservationChangeResponse>, ApiError> {
    let cmd = ModifyReservationQuantity {
        tenant_id: ctx.tenant_id,
        reservation_id: id,
        quantity: req.quantity,
        actor: ctx.actor,
    };
    let change = state.reservations.modify_quantity(cmd).await?;
    Ok(Json(change.into()))
}

/// PATCH /reservations/{id}/expiry
#[tracing::instrument(skip(state))]
pub async fn extend<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<ReservationId>,
    Json(req): Json<ExpiryRequest>,
) -> Result<Json<Reservation>, ApiError> {
    let cmd = ExtendReservation {
        tenant_id: ctx.tenant_id,
        reservation_id: id,
        expires_at: req.expires_at,
        actor: ctx.actor,
    };
    Ok(Json(state.reservations.extend_expiry(cmd).await?))
}

/// PATCH /reservations/{id}/reason
#[tracing::instrument(skip(state))]
pub async fn update_reason<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<ReservationId>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<Reservation>, ApiError> {
    let cmd = UpdateReservationReason {
        tenant_id: ctx.tenant_id,
        reservation_id: id,
        reason: req.reason,
        actor: ctx.actor,
    };
    Ok(Json(state.reservations.update_reason(cmd).await?))
}

/// POST /reservations/{id}/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<ReservationId>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<ReservationChangeResponse>, ApiError> {
    let cmd = CancelReservation {
        tenant_id: ctx.tenant_id,
        reservation_id: id,
        reason: req.reason,
        actor: ctx.actor,
    };
    let change = state.reservations.cancel(cmd).await?;
    Ok(Json(change.into()))
}

/// POST /reservations/{id}/use
#[tracing::instrument(skip(state))]
pub async fn use_reservation<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<ReservationId>,
    Json(req): Json<UseRequest>,
) -> Result<Json<ReservationChangeResponse>, ApiError> {
    let cmd = UseReservation {
        tenant_id: ctx.tenant_id,
        reservation_id: id,
        quantity_used: req.quantity_used,
        actor: ctx.actor,
    };
    let change = state.reservations.use_reservation(cmd).await?;
    Ok(Json(change.into()))
}

/// DELETE /reservations/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<ReservationId>,
) -> Result<StatusCode, ApiError> {
    let cmd = DeleteReservation {
        tenant_id: ctx.tenant_id,
        reservation_id: id,
        actor: ctx.actor,
    };
    state.reservations.delete(cmd).await?;
    Ok(StatusCode::NO_CONTENT)
}
