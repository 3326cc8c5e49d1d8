//! Ledger commands and stock queries.

use std::collections::HashMap;
use std::sync::Arc;

use application::{
    AdjustStock, DeleteInventoryItem, MovementDetails, RecordPurchase, RecordRefund, RecordSale,
    SetOpeningBalance, StockChange, Transfer, TransferStock, UpdateInventorySettings,
    WriteOffStock,
};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use common::{ActorId, InventoryItemId, TenantId, VariantId, WarehouseId};
use domain::{Aggregate, InventoryItem, LedgerReport, StockKey, StockMovement};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::{LowStockEntry, Store};

use crate::AppState;
use crate::context::RequestContext;
use crate::error::ApiError;

// -- Request types --

/// Body shared by purchases, sales, adjustments and write-offs.
///
/// For adjustments `quantity` is the signed delta.
#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub variant_id: VariantId,
    pub warehouse_id: WarehouseId,
    pub quantity: Decimal,
    #[serde(default)]
    pub reason: String,
    pub reference: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl MovementRequest {
    fn key(&self, tenant_id: TenantId) -> StockKey {
        StockKey::new(tenant_id, self.variant_id, self.warehouse_id)
    }

    fn details(&self, actor: ActorId) -> MovementDetails {
        MovementDetails {
            reason: self.reason.clone(),
            reference: self.reference.clone(),
            metadata: self.metadata.clone(),
            actor,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OpeningBalanceRequest {
    #[serde(flatten)]
    pub movement: MovementRequest,
    #[serde(default)]
    pub allow_negative_stock: bool,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub variant_id: VariantId,
    pub warehouse_id: WarehouseId,
    pub quantity: Decimal,
    pub original_sale_reference: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub variant_id: VariantId,
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    pub quantity: Decimal,
    #[serde(default)]
    pub reason: String,
    pub reference: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// `clear_expiry_date` wins over `expiry_date`.
#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub allow_negative_stock: Option<bool>,
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub clear_expiry_date: bool,
}

#[derive(Debug, Deserialize)]
pub struct LowStockParams {
    pub warehouse_id: Option<WarehouseId>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct InventoryResponse {
    pub id: InventoryItemId,
    pub tenant_id: TenantId,
    pub variant_id: VariantId,
    pub warehouse_id: WarehouseId,
    pub total_stock: Decimal,
    pub reserved_stock: Decimal,
    pub available_stock: Decimal,
    pub allow_negative_stock: bool,
    pub expiry_date: Option<NaiveDate>,
    pub opened_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl From<&InventoryItem> for InventoryResponse {
    fn from(item: &InventoryItem) -> Self {
        Self {
            id: item.id(),
            tenant_id: item.tenant_id(),
            variant_id: item.variant_id(),
            warehouse_id: item.warehouse_id(),
            total_stock: item.total_stock(),
            reserved_stock: item.reserved_stock(),
            available_stock: item.available_stock(),
            allow_negative_stock: item.allow_negative_stock(),
            expiry_date: item.expiry_date(),
            opened_at: item.opened_at(),
            updated_at: item.updated_at(),
            deleted_at: item.deleted_at(),
            version: item.version().as_i64(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StockChangeResponse {
    pub inventory: InventoryResponse,
    pub movements: Vec<StockMovement>,
    pub low_stock: bool,
}

impl From<StockChange> for StockChangeResponse {
    fn from(change: StockChange) -> Self {
        Self {
            inventory: InventoryResponse::from(&change.item),
            low_stock: change.is_low(),
            movements: change.movements,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub reference: String,
    pub source: StockChangeResponse,
    pub destination: StockChangeResponse,
}

impl From<Transfer> for TransferResponse {
    fn from(transfer: Transfer) -> Self {
        Self {
            reference: transfer.reference,
            source: transfer.source.into(),
            destination: transfer.destination.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LowStockResponse {
    pub sku: String,
    pub threshold: Decimal,
    pub inventory: InventoryResponse,
}

impl From<&LowStockEntry> for LowStockResponse {
    fn from(entry: &LowStockEntry) -> Self {
        Self {
            sku: entry.sku.clone(),
            threshold: entry.threshold,
            inventory: InventoryResponse::from(&entry.item),
        }
    }
}

type Created<T> = Result<(StatusCode, Json<T>), ApiError>;

// -- Handlers --

/// POST /inventory/opening-balance
#[tracing::instrument(skip(state, req))]
pub async fn opening_balance<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Json(req): Json<OpeningBalanceRequest>,
) -> Created<StockChangeResponse> {
    let cmd = SetOpeningBalance {
        key: req.movement.key(ctx.tenant_id),
        quantity: req.movement.quantity,
        allow_negative_stock: req.allow_negative_stock,
        expiry_date: req.expiry_date,
        details: req.movement.details(ctx.actor),
    };
    let change = state.inventory.set_opening_balance(cmd).await?;
    Ok((StatusCode::CREATED, Json(change.into())))
}

/// POST /inventory/purchases
#[tracing::instrument(skip(state, req))]
pub async fn purchase<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Json(req): Json<MovementRequest>,
) -> Created<StockChangeResponse> {
    let cmd = RecordPurchase::new(req.key(ctx.tenant_id), req.quantity, req.details(ctx.actor));
    let change = state.inventory.record_purchase(cmd).await?;
    Ok((StatusCode::CREATED, Json(change.into())))
}

/// POST /inventory/sales
#[tracing::instrument(skip(state, req))]
pub async fn sale<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Json(req): Json<MovementRequest>,
) -> Created<StockChangeResponse> {
    let cmd = RecordSale::new(req.key(ctx.tenant_id), req.quantity, req.details(ctx.actor));
    let change = state.inventory.record_sale(cmd).await?;
    Ok((StatusCode::CREATED, Json(change.into())))
}

/// POST /inventory/refunds
#[tracing::instrument(skip(state, req))]
pub async fn refund<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Json(req): Json<RefundRequest>,
) -> Created<StockChangeResponse> {
    let details = MovementDetails {
        reason: req.reason,
        reference: None,
        metadata: req.metadata,
        actor: ctx.actor,
    };
    let cmd = RecordRefund::new(
        StockKey::new(ctx.tenant_id, req.variant_id, req.warehouse_id),
        req.quantity,
        req.original_sale_reference,
        details,
    );
    let change = state.inventory.record_refund(cmd).await?;
    Ok((StatusCode::CREATED, Json(change.into())))
}

/// POST /inventory/adjustments
#[tracing::instrument(skip(state, req))]
pub async fn adjust<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Json(req): Json<MovementRequest>,
) -> Created<StockChangeResponse> {
    let cmd = AdjustStock::new(req.key(ctx.tenant_id), req.quantity, req.details(ctx.actor));
    let change = state.inventory.adjust_stock(cmd).await?;
    Ok((StatusCode::CREATED, Json(change.into())))
}

/// POST /inventory/write-offs
#[tracing::instrument(skip(state, req))]
pub async fn write_off<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Json(req): Json<MovementRequest>,
) -> Created<StockChangeResponse> {
    let cmd = WriteOffStock::new(req.key(ctx.tenant_id), req.quantity, req.details(ctx.actor));
    let change = state.inventory.write_off_stock(cmd).await?;
    Ok((StatusCode::CREATED, Json(change.into())))
}

/// POST /inventory/transfers
#[tracing::instrument(skip(state, req))]
pub async fn transfer<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Json(req): Json<TransferRequest>,
) -> Created<TransferResponse> {
    let cmd = TransferStock {
        tenant_id: ctx.tenant_id,
        variant_id: req.variant_id,
        from_warehouse_id: req.from_warehouse_id,
        to_warehouse_id: req.to_warehouse_id,
        quantity: req.quantity,
        details: MovementDetails {
            reason: req.reason,
            reference: req.reference,
            metadata: req.metadata,
            actor: ctx.actor,
        },
    };
    let transfer = state.inventory.transfer_stock(cmd).await?;
    Ok((StatusCode::CREATED, Json(transfer.into())))
}

/// GET /inventory/{variant_id}/{warehouse_id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path((variant_id, warehouse_id)): Path<(VariantId, WarehouseId)>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let key = StockKey::new(ctx.tenant_id, variant_id, warehouse_id);
    let item = state.inventory.get_inventory(&key).await?;
    Ok(Json(InventoryResponse::from(&item)))
}

/// PATCH /inventory/{variant_id}/{warehouse_id}
#[tracing::instrument(skip(state, req))]
pub async fn update_settings<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path((variant_id, warehouse_id)): Path<(VariantId, WarehouseId)>,
    Json(req): Json<SettingsRequest>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let expiry_date = if req.clear_expiry_date {
        Some(None)
    } else {
        req.expiry_date.map(Some)
    };
    let cmd = UpdateInventorySettings {
        key: StockKey::new(ctx.tenant_id, variant_id, warehouse_id),
        allow_negative_stock: req.allow_negative_stock,
        expiry_date,
        actor: ctx.actor,
    };
    let item = state.inventory.update_settings(cmd).await?;
    Ok(Json(InventoryResponse::from(&item)))
}

/// DELETE /inventory/{variant_id}/{warehouse_id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path((variant_id, warehouse_id)): Path<(VariantId, WarehouseId)>,
) -> Result<StatusCode, ApiError> {
    let cmd = DeleteInventoryItem {
        key: StockKey::new(ctx.tenant_id, variant_id, warehouse_id),
        actor: ctx.actor,
    };
    state.inventory.delete_item(cmd).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /inventory/{variant_id}/{warehouse_id}/ledger-check
#[tracing::instrument(skip(state))]
pub async fn ledger_check<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path((variant_id, warehouse_id)): Path<(VariantId, WarehouseId)>,
) -> Result<Json<LedgerReport>, ApiError> {
    let key = StockKey::new(ctx.tenant_id, variant_id, warehouse_id);
    let report = state.inventory.verify_ledger(&key).await?;
    Ok(Json(report))
}

/// GET /inventory/low-stock
#[tracing::instrument(skip(state))]
pub async fn low_stock<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Query(params): Query<LowStockParams>,
) -> Result<Json<Vec<LowStockResponse>>, ApiError> {
    let entries = state
        .inventory
        .low_stock(ctx.tenant_id, params.warehouse_id)
        .await?;
    Ok(Json(entries.iter().map(LowStockResponse::from).collect()))
}
