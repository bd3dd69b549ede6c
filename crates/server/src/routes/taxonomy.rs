//! Public category, material and tag lookups.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::error::{AppError, AppResult};
use crate::models::{Category, Material, Tag};
use crate::routes::helpers::{ApiResponse, ok};
use crate::state::AppState;

async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Category>>>> {
    let categories = Category::list(state.db()).await.map_err(AppError::query)?;
    Ok(ok(categories))
}

async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<ApiResponse<Category>>> {
    let category = Category::find_by_slug(state.db(), &slug)
        .await
        .map_err(AppError::query)?
        .ok_or(AppError::NotFound("category"))?;
    Ok(ok(category))
}

async fn list_materials(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Material>>>> {
    let materials = Material::list(state.db()).await.map_err(AppError::query)?;
    Ok(ok(materials))
}

async fn get_material(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<ApiResponse<Material>>> {
    let material = Material::find_by_slug(state.db(), &slug)
        .await
        .map_err(AppError::query)?
        .ok_or(AppError::NotFound("material"))?;
    Ok(ok(material))
}

async fn list_tags(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Vec<Tag>>>> {
    let tags = Tag::list(state.db()).await.map_err(AppError::query)?;
    Ok(ok(tags))
}

async fn get_tag(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<ApiResponse<Tag>>> {
    let tag = Tag::find_by_slug(state.db(), &slug)
        .await
        .map_err(AppError::query)?
        .ok_or(AppError::NotFound("tag"))?;
    Ok(ok(tag))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list_categories))
        .route("/api/categories/{slug}", get(get_category))
        .route("/api/materials", get(list_materials))
        .route("/api/materials/{slug}", get(get_material))
        .route("/api/tags", get(list_tags))
        .route("/api/tags/{slug}", get(get_tag))
}
