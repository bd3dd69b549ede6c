//! Admin CRUD for categories, materials and tags.
//!
//! Taxonomy rows referenced by a product cannot be deleted; the client gets a
//! 409 naming how many products still use the row.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::category::{CreateCategory, UpdateCategory};
use crate::models::material::{CreateMaterial, UpdateMaterial};
use crate::models::tag::{CreateTag, UpdateTag};
use crate::models::{Category, DeleteOutcome, Material, Tag};
use crate::routes::helpers::{ApiResponse, MessageResponse, created, message, ok, parse_id};
use crate::state::AppState;
use crate::validation::{TAXONOMY_FIELD_MAX, Validator};

/// Body accepted by every taxonomy create and update.
///
/// On create `name` and `slug` are required; on update every field is
/// optional and only supplied fields change.
#[derive(Debug, Default, Deserialize)]
pub struct TaxonomyInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl TaxonomyInput {
    fn trimmed(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value.map(|v| v.trim().to_string())
        }
        Self {
            name: clean(self.name),
            slug: clean(self.slug).map(|s| s.to_lowercase()),
            description: clean(self.description).filter(|d| !d.is_empty()),
            image_url: clean(self.image_url).filter(|u| !u.is_empty()),
        }
    }

    /// Validate for a create: name and slug must be present.
    fn validate_create(&self) -> AppResult<(String, String)> {
        let name = self.name.clone().unwrap_or_default();
        let slug = self.slug.clone().unwrap_or_default();

        let mut v = Validator::new();
        v.required("name", &name)
            .max_chars("name", &name, TAXONOMY_FIELD_MAX)
            .slug("slug", &slug, TAXONOMY_FIELD_MAX);
        v.finish()?;

        Ok((name, slug))
    }

    /// Validate for an update: only supplied fields are checked.
    fn validate_update(&self) -> AppResult<()> {
        let mut v = Validator::new();
        if let Some(name) = &self.name {
            v.required("name", name)
                .max_chars("name", name, TAXONOMY_FIELD_MAX);
        }
        if let Some(slug) = &self.slug {
            v.slug("slug", slug, TAXONOMY_FIELD_MAX);
        }
        v.finish()
    }
}

/// Rows that keep a material or tag alive.
const LINK_DEPENDENTS: &str = "product(s)";

/// Rows that keep a category alive.
const CATEGORY_DEPENDENTS: &str = "product(s) or collection(s)";

/// Map a guarded delete to a response.
fn delete_response(
    outcome: DeleteOutcome,
    what: &'static str,
    dependents_label: &'static str,
) -> AppResult<Json<MessageResponse>> {
    match outcome {
        DeleteOutcome::Deleted => Ok(message("deleted")),
        DeleteOutcome::NotFound => Err(AppError::NotFound(what)),
        DeleteOutcome::InUse { dependents } => Err(AppError::ConstraintViolation(format!(
            "cannot delete {what}: {dependents} {dependents_label} still use it"
        ))),
    }
}

// -------------------------------------------------------------------------
// Categories
// -------------------------------------------------------------------------

async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Category>>>> {
    let categories = Category::list(state.db()).await.map_err(AppError::query)?;
    Ok(ok(categories))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Category>>> {
    let id = parse_id(&id, "category")?;
    let category = Category::find_by_id(state.db(), id)
        .await
        .map_err(AppError::query)?
        .ok_or(AppError::NotFound("category"))?;
    Ok(ok(category))
}

async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<TaxonomyInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<Category>>)> {
    let body = body.trimmed();
    let (name, slug) = body.validate_create()?;

    let category = Category::create(
        state.db(),
        CreateCategory {
            name,
            slug,
            description: body.description,
            image_url: body.image_url,
        },
    )
    .await
    .map_err(AppError::mutation)?;

    info!(category_id = category.id, slug = %category.slug, "category created");
    Ok(created(category))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TaxonomyInput>,
) -> AppResult<Json<ApiResponse<Category>>> {
    let id = parse_id(&id, "category")?;
    let body = body.trimmed();
    body.validate_update()?;

    let category = Category::update(
        state.db(),
        id,
        UpdateCategory {
            name: body.name,
            slug: body.slug,
            description: body.description,
            image_url: body.image_url,
        },
    )
    .await
    .map_err(AppError::mutation)?
    .ok_or(AppError::NotFound("category"))?;

    info!(category_id = id, "category updated");
    Ok(ok(category))
}

async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, "category")?;
    let outcome = Category::delete(state.db(), id)
        .await
        .map_err(AppError::mutation)?;
    if outcome == DeleteOutcome::Deleted {
        info!(category_id = id, "category deleted");
    }
    delete_response(outcome, "category", CATEGORY_DEPENDENTS)
}

// -------------------------------------------------------------------------
// Materials
// -------------------------------------------------------------------------

async fn list_materials(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Material>>>> {
    let materials = Material::list(state.db()).await.map_err(AppError::query)?;
    Ok(ok(materials))
}

async fn get_material(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Material>>> {
    let id = parse_id(&id, "material")?;
    let material = Material::find_by_id(state.db(), id)
        .await
        .map_err(AppError::query)?
        .ok_or(AppError::NotFound("material"))?;
    Ok(ok(material))
}

async fn create_material(
    State(state): State<AppState>,
    Json(body): Json<TaxonomyInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<Material>>)> {
    let body = body.trimmed();
    let (name, slug) = body.validate_create()?;

    let material = Material::create(
        state.db(),
        CreateMaterial {
            name,
            slug,
            description: body.description,
        },
    )
    .await
    .map_err(AppError::mutation)?;

    info!(material_id = material.id, slug = %material.slug, "material created");
    Ok(created(material))
}

async fn update_material(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TaxonomyInput>,
) -> AppResult<Json<ApiResponse<Material>>> {
    let id = parse_id(&id, "material")?;
    let body = body.trimmed();
    body.validate_update()?;

    let material = Material::update(
        state.db(),
        id,
        UpdateMaterial {
            name: body.name,
            slug: body.slug,
            description: body.description,
        },
    )
    .await
    .map_err(AppError::mutation)?
    .ok_or(AppError::NotFound("material"))?;

    info!(material_id = id, "material updated");
    Ok(ok(material))
}

async fn delete_material(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, "material")?;
    let outcome = Material::delete(state.db(), id)
        .await
        .map_err(AppError::mutation)?;
    if outcome == DeleteOutcome::Deleted {
        info!(material_id = id, "material deleted");
    }
    delete_response(outcome, "material", LINK_DEPENDENTS)
}

// -------------------------------------------------------------------------
// Tags
// -------------------------------------------------------------------------

async fn list_tags(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Vec<Tag>>>> {
    let tags = Tag::list(state.db()).await.map_err(AppError::query)?;
    Ok(ok(tags))
}

async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Tag>>> {
    let id = parse_id(&id, "tag")?;
    let tag = Tag::find_by_id(state.db(), id)
        .await
        .map_err(AppError::query)?
        .ok_or(AppError::NotFound("tag"))?;
    Ok(ok(tag))
}

async fn create_tag(
    State(state): State<AppState>,
    Json(body): Json<TaxonomyInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<Tag>>)> {
    let body = body.trimmed();
    let (name, slug) = body.validate_create()?;

    let tag = Tag::create(state.db(), CreateTag { name, slug })
        .await
        .map_err(AppError::mutation)?;

    info!(tag_id = tag.id, slug = %tag.slug, "tag created");
    Ok(created(tag))
}

async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TaxonomyInput>,
) -> AppResult<Json<ApiResponse<Tag>>> {
    let id = parse_id(&id, "tag")?;
    let body = body.trimmed();
    body.validate_update()?;

    let tag = Tag::update(
        state.db(),
        id,
        UpdateTag {
            name: body.name,
            slug: body.slug,
        },
    )
    .await
    .map_err(AppError::mutation)?
    .ok_or(AppError::NotFound("tag"))?;

    info!(tag_id = id, "tag updated");
    Ok(ok(tag))
}

async fn delete_tag(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, "tag")?;
    let outcome = Tag::delete(state.db(), id)
        .await
        .map_err(AppError::mutation)?;
    if outcome == DeleteOutcome::Deleted {
        info!(tag_id = id, "tag deleted");
    }
    delete_response(outcome, "tag", LINK_DEPENDENTS)
}

/// Taxonomy admin routes. Guards are applied by the caller.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/api/admin/categories/{id}",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
        .route(
            "/api/admin/materials",
            get(list_materials).post(create_material),
        )
        .route(
            "/api/admin/materials/{id}",
            get(get_material)
                .put(update_material)
                .delete(delete_material),
        )
        .route("/api/admin/tags", get(list_tags).post(create_tag))
        .route(
            "/api/admin/tags/{id}",
            get(get_tag).put(update_tag).delete(delete_tag),
        )
}
