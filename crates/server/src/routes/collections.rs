//! Public storefront collections.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::error::{AppError, AppResult};
use crate::models::Collection;
use crate::routes::helpers::{ApiResponse, ok, parse_id};
use crate::state::AppState;

/// GET /api/collections (active only, in display order)
async fn list_collections(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Collection>>>> {
    let collections = Collection::list_active(state.db())
        .await
        .map_err(AppError::query)?;
    Ok(ok(collections))
}

/// GET /api/collections/{id}
async fn get_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Collection>>> {
    let id = parse_id(&id, "collection")?;
    let collection = Collection::find_by_id(state.db(), id)
        .await
        .map_err(AppError::query)?
        .filter(|c| c.is_active)
        .ok_or(AppError::NotFound("collection"))?;
    Ok(ok(collection))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/collections", get(list_collections))
        .route("/api/collections/{id}", get(get_collection))
}
