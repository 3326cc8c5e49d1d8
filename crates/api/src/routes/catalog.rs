//! Products, variants and warehouses.

use std::sync::Arc;

use application::{CreateProduct, CreateVariant, CreateWarehouse};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ProductId, VariantId, WarehouseId};
use domain::{Product, Variant, Warehouse};
use rust_decimal::Decimal;
use serde::Deserialize;
use store::Store;

use crate::AppState;
use crate::context::RequestContext;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VariantRequest {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub low_stock_threshold: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct WarehouseRequest {
    pub code: String,
    pub name: String,
}

/// POST /products
#[tracing::instrument(skip(state))]
pub async fn create_product<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Json(req): Json<ProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state
        .catalog
        .create_product(CreateProduct {
            tenant_id: ctx.tenant_id,
            name: req.name,
            description: req.description,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products/{id}
pub async fn get_product<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.catalog.get_product(ctx.tenant_id, id).await?))
}

/// POST /variants
#[tracing::instrument(skip(state))]
pub async fn create_variant<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Json(req): Json<VariantRequest>,
) -> Result<(StatusCode, Json<Variant>), ApiError> {
    let variant = state
        .catalog
        .create_variant(CreateVariant {
            tenant_id: ctx.tenant_id,
            product_id: req.product_id,
            sku: req.sku,
            name: req.name,
            low_stock_threshold: req.low_stock_threshold,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(variant)))
}

/// GET /variants/{id}
pub async fn get_variant<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<VariantId>,
) -> Result<Json<Variant>, ApiError> {
    Ok(Json(state.catalog.get_variant(ctx.tenant_id, id).await?))
}

/// POST /warehouses
#[tracing::instrument(skip(state))]
pub async fn create_warehouse<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Json(req): Json<WarehouseRequest>,
) -> Result<(StatusCode, Json<Warehouse>), ApiError> {
    let warehouse = state
        .catalog
        .create_warehouse(CreateWarehouse {
            tenant_id: ctx.tenant_id,
            code: req.code,
            name: req.name,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(warehouse)))
}

/// GET /warehouses/{id}
pub async fn get_warehouse<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<WarehouseId>,
) -> Result<Json<Warehouse>, ApiError> {
    Ok(Json(state.catalog.get_warehouse(ctx.tenant_id, id).await?))
}

/// GET /warehouses
pub async fn list_warehouses<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
) -> Result<Json<Vec<Warehouse>>, ApiError> {
    Ok(Json(state.catalog.list_warehouses(ctx.tenant_id).await?))
}
