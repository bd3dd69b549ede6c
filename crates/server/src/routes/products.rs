//! Public product listing and detail.

use axum::extract::{Path, RawQuery, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::catalog::{Pagination, ProductDetail, ProductFilter, ProductListItem};
use crate::error::{AppError, AppResult};
use crate::routes::helpers::{ApiResponse, ok};
use crate::state::AppState;

/// Listing envelope: `{ ok, data, pagination }`.
#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub ok: bool,
    pub data: Vec<ProductListItem>,
    pub pagination: Pagination,
}

/// GET /api/products
async fn list_products(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> AppResult<Json<ProductListResponse>> {
    let filter = ProductFilter::from_query(query.as_deref(), state.page_limits())?;
    let page = state.catalog().list_products(&filter).await?;

    Ok(Json(ProductListResponse {
        ok: true,
        data: page.items,
        pagination: page.pagination,
    }))
}

/// GET /api/products/{slug}
async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<ApiResponse<ProductDetail>>> {
    let detail = state
        .catalog()
        .product_by_slug(&slug.to_lowercase())
        .await?
        .ok_or(AppError::NotFound("product"))?;

    Ok(ok(detail))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/{slug}", get(get_product))
}
