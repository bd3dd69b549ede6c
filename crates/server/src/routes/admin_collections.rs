//! Admin management of storefront collections.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::Collection;
use crate::models::collection::{CollectionOrder, CreateCollection, UpdateCollection};
use crate::routes::helpers::{
    ApiResponse, MessageResponse, MultipartForm, UploadedFile, created, message, ok, parse_id,
};
use crate::state::AppState;
use crate::validation::{COLLECTION_TITLE_MAX, Validator, normalize_slug};

const COLLECTION_FOLDER: &str = "collections";

#[derive(Debug, Default, PartialEq)]
struct CollectionFields {
    category_id: Option<i64>,
    title: Option<String>,
    description: Option<String>,
    display_order: Option<i32>,
    is_active: Option<bool>,
}

impl CollectionFields {
    fn read(form: &MultipartForm, v: &mut Validator, create: bool) -> Self {
        let fields = Self {
            category_id: form.int(v, "category_id"),
            title: form.string("title"),
            description: form.string("description"),
            display_order: form.int(v, "display_order"),
            is_active: form.bool(v, "is_active"),
        };

        match fields.category_id {
            Some(id) if id <= 0 => v.error("category_id", "category_id must be positive"),
            None if create => v.error("category_id", "category_id is required"),
            _ => {}
        }
        match &fields.title {
            Some(title) => {
                v.max_chars("title", title, COLLECTION_TITLE_MAX);
            }
            None if create => v.error("title", "title is required"),
            None => {}
        }
        if let Some(order) = fields.display_order {
            v.non_negative("display_order", order);
        }

        fields
    }
}

/// Store an uploaded collection image, named after the collection title.
async fn store_image(state: &AppState, file: UploadedFile, title: &str) -> AppResult<String> {
    let url = state
        .media()
        .store_image(COLLECTION_FOLDER, &normalize_slug(title), file.data)
        .await?;
    Ok(url)
}

/// GET /api/admin/collections
async fn list_collections(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Collection>>>> {
    let collections = Collection::list_all(state.db())
        .await
        .map_err(AppError::query)?;
    Ok(ok(collections))
}

/// GET /api/admin/collections/{id}
async fn get_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Collection>>> {
    let id = parse_id(&id, "collection")?;
    let collection = Collection::find_by_id(state.db(), id)
        .await
        .map_err(AppError::query)?
        .ok_or(AppError::NotFound("collection"))?;
    Ok(ok(collection))
}

/// POST /api/admin/collections (multipart, `image` required)
async fn create_collection(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<Collection>>)> {
    let mut form = MultipartForm::read(multipart).await?;
    let image = form.take_files("image").into_iter().next();

    let mut v = Validator::new();
    let fields = CollectionFields::read(&form, &mut v, true);
    if image.is_none() {
        v.error("image", "image is required");
    }
    v.finish()?;

    let (Some(category_id), Some(title), Some(image)) = (fields.category_id, fields.title, image)
    else {
        return Err(AppError::BadRequest("missing required fields".to_string()));
    };

    let image_url = store_image(&state, image, &title).await?;

    let input = CreateCollection {
        category_id,
        title,
        description: fields.description,
        image_url: image_url.clone(),
        display_order: fields.display_order,
        is_active: fields.is_active,
    };

    let collection = match Collection::create(state.db(), input).await {
        Ok(collection) => collection,
        Err(e) => {
            state.media().remove_urls(&[image_url]).await;
            return Err(AppError::mutation(e));
        }
    };

    info!(collection_id = collection.id, "collection created");
    Ok(created(collection))
}

/// PUT /api/admin/collections/{id} (multipart, `image` optional)
async fn update_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Collection>>> {
    let id = parse_id(&id, "collection")?;
    let mut form = MultipartForm::read(multipart).await?;
    let image = form.take_files("image").into_iter().next();

    let mut v = Validator::new();
    let fields = CollectionFields::read(&form, &mut v, false);
    v.finish()?;

    let image_url = match image {
        Some(file) => {
            let name_hint = fields.title.clone().unwrap_or_else(|| format!("collection-{id}"));
            Some(store_image(&state, file, &name_hint).await?)
        }
        None => None,
    };

    let input = UpdateCollection {
        category_id: fields.category_id,
        title: fields.title,
        description: fields.description,
        image_url: image_url.clone(),
        display_order: fields.display_order,
        is_active: fields.is_active,
    };

    let new_files: Vec<String> = image_url.into_iter().collect();
    let (collection, replaced) = match Collection::update(state.db(), id, input).await {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            state.media().remove_urls(&new_files).await;
            return Err(AppError::NotFound("collection"));
        }
        Err(e) => {
            state.media().remove_urls(&new_files).await;
            return Err(AppError::mutation(e));
        }
    };

    if let Some(old) = replaced {
        state.media().remove_urls(&[old]).await;
    }

    info!(collection_id = id, "collection updated");
    Ok(ok(collection))
}

/// DELETE /api/admin/collections/{id}
async fn delete_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, "collection")?;
    let image_url = Collection::delete(state.db(), id)
        .await
        .map_err(AppError::mutation)?
        .ok_or(AppError::NotFound("collection"))?;

    state.media().remove_urls(&[image_url]).await;
    info!(collection_id = id, "collection deleted");
    Ok(message("collection deleted"))
}

#[derive(Debug, Serialize)]
struct ReorderResult {
    updated: u64,
}

/// PATCH /api/admin/collections/reorder
async fn reorder_collections(
    State(state): State<AppState>,
    Json(orders): Json<Vec<CollectionOrder>>,
) -> AppResult<Json<ApiResponse<ReorderResult>>> {
    let mut v = Validator::new();
    if orders.is_empty() {
        v.error("orders", "at least one collection is required");
    }
    for order in &orders {
        if order.id <= 0 {
            v.error("id", "ids must be positive");
        }
        v.non_negative("display_order", order.display_order);
    }
    v.finish()?;

    let updated = Collection::reorder(state.db(), &orders)
        .await
        .map_err(AppError::mutation)?;

    info!(updated, "collections reordered");
    Ok(ok(ReorderResult { updated }))
}

/// Collection admin routes. Guards are applied by the caller.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/collections",
            get(list_collections).post(create_collection),
        )
        .route(
            "/api/admin/collections/reorder",
            patch(reorder_collections),
        )
        .route(
            "/api/admin/collections/{id}",
            get(get_collection)
                .put(update_collection)
                .delete(delete_collection),
        )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn create_requires_category_and_title() {
        let form = MultipartForm::from_fields(&[("description", "x")]);
        let mut v = Validator::new();
        CollectionFields::read(&form, &mut v, true);
        let AppError::Validation(fields) = v.finish().unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(fields.contains_key("category_id"));
        assert!(fields.contains_key("title"));
    }

    #[test]
    fn update_reads_only_supplied_fields() {
        let form = MultipartForm::from_fields(&[("display_order", "3"), ("is_active", "false")]);
        let mut v = Validator::new();
        let fields = CollectionFields::read(&form, &mut v, false);
        assert!(v.is_empty());
        assert_eq!(
            fields,
            CollectionFields {
                display_order: Some(3),
                is_active: Some(false),
                ..Default::default()
            }
        );
    }

    #[test]
    fn long_titles_are_rejected() {
        let title = "t".repeat(COLLECTION_TITLE_MAX + 1);
        let form = MultipartForm::from_fields(&[("title", title.as_str())]);
        let mut v = Validator::new();
        CollectionFields::read(&form, &mut v, false);
        assert!(!v.is_empty());
    }
}
