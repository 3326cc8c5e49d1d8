//! Movement history and refund lookups.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use common::{VariantId, WarehouseId};
use domain::{MovementType, StockMovement};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::{MovementQuery, Page, Store};

use crate::AppState;
use crate::context::RequestContext;
use crate::error::ApiError;

/// `movement_type` takes a comma-separated list.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub variant_id: Option<VariantId>,
    pub warehouse_id: Option<WarehouseId>,
    pub movement_type: Option<String>,
    pub reference: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

impl<T> From<Page<T>> for PageResponse<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            has_more: page.has_more(),
            items: page.items,
            total: page.total,
            limit: page.limit,
            offset: page.offset,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefundableResponse {
    pub reference: String,
    pub sold: Decimal,
    pub refunded: Decimal,
    pub remaining: Decimal,
}

fn parse_types(raw: &str) -> Result<Vec<MovementType>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|e| ApiError::BadRequest(format!("{e}"))))
        .collect()
}

/// GET /movements
#[tracing::instrument(skip(state))]
pub async fn history<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Query(params): Query<HistoryParams>,
) -> Result<Json<PageResponse<StockMovement>>, ApiError> {
    let mut query = MovementQuery::for_tenant(ctx.tenant_id);
    if let Some(variant_id) = params.variant_id {
        query = query.variant(variant_id);
    }
    if let Some(warehouse_id) = params.warehouse_id {
        query = query.warehouse(warehouse_id);
    }
    if let Some(raw) = params.movement_type.as_deref() {
        query = query.movement_types(parse_types(raw)?);
    }
    if let Some(reference) = params.reference {
        query = query.reference(reference);
    }
    if let Some(from) = params.from {
        query = query.from_timestamp(from);
    }
    if let Some(to) = params.to {
        query = query.to_timestamp(to);
    }
    if let Some(limit) = params.limit {
        query = query.limit(limit);
    }
    if let Some(offset) = params.offset {
        query = query.offset(offset);
    }

    let page = state.inventory.movement_history(query).await?;
    Ok(Json(page.into()))
}

/// GET /movements/by-reference/{reference}
#[tracing::instrument(skip(state))]
pub async fn by_reference<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(reference): Path<String>,
) -> Result<Json<Vec<StockMovement>>, ApiError> {
    let movements = state
        .inventory
        .movements_by_reference(ctx.tenant_id, &reference)
        .await?;
    Ok(Json(movements))
}

#[derive(Debug, Default, Deserialize)]
pub struct RefundableParams {
    pub variant_id: Option<VariantId>,
}

/// GET /refunds/{reference}/remaining
#[tracing::instrument(skip(state))]
pub async fn refundable<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(reference): Path<String>,
    Query(params): Query<RefundableParams>,
) -> Result<Json<RefundableResponse>, ApiError> {
    let ledger = state
        .inventory
        .refundable_quantity(ctx.tenant_id, &reference, params.variant_id)
        .await?;
    Ok(Json(RefundableResponse {
        reference: ledger.reference().to_string(),
        sold: ledger.sold(),
        refunded: ledger.refunded(),
        remaining: ledger.remaining(),
    }))
}
