//! Admin product management.
//!
//! Creates and updates arrive as `multipart/form-data`: scalar fields as text
//! parts, gallery images as `images` file parts. Updates may also be sent as
//! a JSON object when no new images are attached. Images are stored before the
//! database transaction runs; if the transaction fails, the stored files are
//! removed again.

use axum::extract::{Multipart, Path, RawQuery, Request, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tracing::info;

use crate::catalog::{ProductDetail, ProductFilter};
use crate::error::{AppError, AppResult};
use crate::models::Product;
use crate::models::product::{CreateProduct, NewProductImage, UpdateProduct};
use crate::routes::helpers::{
    ApiResponse, MessageResponse, MultipartForm, UploadedFile, created, message, ok, parse_id,
};
use crate::routes::products::ProductListResponse;
use crate::state::AppState;
use crate::validation::{PRODUCT_NAME_MAX, PRODUCT_SLUG_MAX, Validator, normalize_slug};

/// Most images accepted in one request.
pub const MAX_IMAGES_PER_REQUEST: usize = 6;

/// Storage folder for product images.
const PRODUCT_FOLDER: &str = "products";

/// Scalar product fields read from a form.
#[derive(Debug, Default, PartialEq)]
struct ProductFields {
    slug: Option<String>,
    name: Option<String>,
    category_id: Option<i64>,
    description: Option<String>,
    featured: Option<bool>,
    stock: Option<i32>,
    low_stock_threshold: Option<i32>,
    wa_template: Option<String>,
    is_active: Option<bool>,
    material_ids: Option<Vec<i64>>,
    tag_ids: Option<Vec<i64>>,
    primary_image: Option<usize>,
}

impl ProductFields {
    /// Read and validate. On create, slug, name and category are required.
    fn read(form: &MultipartForm, v: &mut Validator, create: bool) -> Self {
        let fields = Self {
            slug: form.text("slug").map(normalize_slug),
            name: form.string("name"),
            category_id: form.int(v, "category_id"),
            description: form.string("description"),
            featured: form.bool(v, "featured"),
            stock: form.int(v, "stock"),
            low_stock_threshold: form.int(v, "low_stock_threshold"),
            wa_template: form.string("wa_template"),
            is_active: form.bool(v, "is_active"),
            material_ids: form.ids(v, "material_ids"),
            tag_ids: form.ids(v, "tag_ids"),
            primary_image: form.int(v, "primary_image"),
        };

        match (&fields.slug, create) {
            (Some(slug), _) => {
                v.slug("slug", slug, PRODUCT_SLUG_MAX);
            }
            (None, true) => v.error("slug", "slug is required"),
            (None, false) => {}
        }

        match (&fields.name, create) {
            (Some(name), _) => {
                v.max_chars("name", name, PRODUCT_NAME_MAX);
            }
            (None, true) => v.error("name", "name is required"),
            (None, false) => {}
        }

        match fields.category_id {
            Some(id) if id <= 0 => v.error("category_id", "category_id must be positive"),
            None if create => v.error("category_id", "category_id is required"),
            _ => {}
        }

        if let Some(stock) = fields.stock {
            v.non_negative("stock", stock);
        }
        if let Some(threshold) = fields.low_stock_threshold {
            v.non_negative("low_stock_threshold", threshold);
        }

        fields
    }
}

fn check_image_count(files: &[UploadedFile]) -> AppResult<()> {
    if files.len() > MAX_IMAGES_PER_REQUEST {
        return Err(AppError::BadRequest(format!(
            "at most {MAX_IMAGES_PER_REQUEST} images per request"
        )));
    }
    Ok(())
}

/// Store uploads in order. If any one fails, the ones already stored are
/// removed before the error is returned.
async fn store_images(state: &AppState, slug: &str, files: Vec<UploadedFile>) -> AppResult<Vec<String>> {
    let mut urls = Vec::with_capacity(files.len());
    for file in files {
        match state.media().store_image(PRODUCT_FOLDER, slug, file.data).await {
            Ok(url) => urls.push(url),
            Err(e) => {
                state.media().remove_urls(&urls).await;
                return Err(e.into());
            }
        }
    }
    Ok(urls)
}

async fn refreshed(state: &AppState, id: i64) -> AppResult<ProductDetail> {
    state
        .catalog()
        .product_by_id(id)
        .await?
        .ok_or(AppError::NotFound("product"))
}

/// GET /api/admin/products (inactive products included)
async fn list_products(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> AppResult<Json<ProductListResponse>> {
    let mut filter = ProductFilter::from_query(query.as_deref(), state.page_limits())?;
    filter.include_inactive = true;
    let page = state.catalog().list_products(&filter).await?;

    Ok(Json(ProductListResponse {
        ok: true,
        data: page.items,
        pagination: page.pagination,
    }))
}

/// GET /api/admin/products/{id}
async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<ProductDetail>>> {
    let id = parse_id(&id, "product")?;
    Ok(ok(refreshed(&state, id).await?))
}

/// POST /api/admin/products
async fn create_product(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<ProductDetail>>)> {
    let mut form = MultipartForm::read(multipart).await?;
    let files = form.take_files("images");

    let mut v = Validator::new();
    let fields = ProductFields::read(&form, &mut v, true);
    v.finish()?;
    check_image_count(&files)?;

    let (Some(slug), Some(name), Some(category_id)) =
        (fields.slug, fields.name, fields.category_id)
    else {
        return Err(AppError::BadRequest("missing required fields".to_string()));
    };

    let urls = store_images(&state, &slug, files).await?;
    let images: Vec<NewProductImage> = urls
        .iter()
        .enumerate()
        .map(|(i, url)| NewProductImage {
            image_url: url.clone(),
            is_primary: fields.primary_image == Some(i),
            alt_text: Some(name.clone()),
        })
        .collect();

    let input = CreateProduct {
        slug,
        name,
        category_id,
        description: fields.description,
        featured: fields.featured,
        stock: fields.stock,
        low_stock_threshold: fields.low_stock_threshold,
        wa_template: fields.wa_template,
        is_active: fields.is_active,
        images,
        material_ids: fields.material_ids.unwrap_or_default(),
        tag_ids: fields.tag_ids.unwrap_or_default(),
    };

    let product = match Product::create(state.db(), input).await {
        Ok(product) => product,
        Err(e) => {
            state.media().remove_urls(&urls).await;
            return Err(AppError::mutation(e));
        }
    };

    Ok(created(refreshed(&state, product.id).await?))
}

/// PUT /api/admin/products/{id}
async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Request,
) -> AppResult<Json<ApiResponse<ProductDetail>>> {
    let id = parse_id(&id, "product")?;
    let mut form = MultipartForm::read_request(request, &state).await?;
    let files = form.take_files("images");

    let mut v = Validator::new();
    let fields = ProductFields::read(&form, &mut v, false);
    let removed_image_urls = form.string_list(&mut v, "deleted_images");
    v.finish()?;
    check_image_count(&files)?;

    let existing = Product::find_by_id(state.db(), id)
        .await
        .map_err(AppError::query)?
        .ok_or(AppError::NotFound("product"))?;

    let slug = fields.slug.clone().unwrap_or_else(|| existing.slug.clone());
    let alt_text = fields.name.clone().unwrap_or_else(|| existing.name.clone());
    let urls = store_images(&state, &slug, files).await?;

    let input = UpdateProduct {
        slug: fields.slug,
        name: fields.name,
        category_id: fields.category_id,
        description: fields.description,
        featured: fields.featured,
        stock: fields.stock,
        low_stock_threshold: fields.low_stock_threshold,
        wa_template: fields.wa_template,
        is_active: fields.is_active,
        material_ids: fields.material_ids,
        tag_ids: fields.tag_ids,
        removed_image_urls,
        new_images: urls
            .iter()
            .map(|url| NewProductImage {
                image_url: url.clone(),
                is_primary: false,
                alt_text: Some(alt_text.clone()),
            })
            .collect(),
    };

    let updated = match Product::update(state.db(), id, input).await {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            state.media().remove_urls(&urls).await;
            return Err(AppError::NotFound("product"));
        }
        Err(e) => {
            state.media().remove_urls(&urls).await;
            return Err(AppError::mutation(e));
        }
    };

    state.media().remove_urls(&updated.removed_image_urls).await;
    Ok(ok(refreshed(&state, updated.product.id).await?))
}

/// DELETE /api/admin/products/{id} (hard delete)
async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, "product")?;
    let urls = Product::delete(state.db(), id)
        .await
        .map_err(AppError::mutation)?
        .ok_or(AppError::NotFound("product"))?;

    state.media().remove_urls(&urls).await;
    Ok(message("product deleted"))
}

/// POST /api/admin/products/{id}/images
async fn add_images(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<ProductDetail>>)> {
    let id = parse_id(&id, "product")?;
    let mut form = MultipartForm::read(multipart).await?;
    let files = form.take_files("images");

    if files.is_empty() {
        return Err(AppError::BadRequest("no images were sent".to_string()));
    }
    check_image_count(&files)?;

    let product = Product::find_by_id(state.db(), id)
        .await
        .map_err(AppError::query)?
        .ok_or(AppError::NotFound("product"))?;

    let urls = store_images(&state, &product.slug, files).await?;
    let images: Vec<NewProductImage> = urls
        .iter()
        .map(|url| NewProductImage {
            image_url: url.clone(),
            is_primary: false,
            alt_text: Some(product.name.clone()),
        })
        .collect();

    match Product::add_images(state.db(), id, &images).await {
        Ok(Some(inserted)) => {
            info!(product_id = id, images = inserted.len(), "product images added");
        }
        Ok(None) => {
            state.media().remove_urls(&urls).await;
            return Err(AppError::NotFound("product"));
        }
        Err(e) => {
            state.media().remove_urls(&urls).await;
            return Err(AppError::mutation(e));
        }
    }

    Ok(created(refreshed(&state, id).await?))
}

/// DELETE /api/admin/products/{id}/images/{image_id}
async fn delete_image(
    State(state): State<AppState>,
    Path((id, image_id)): Path<(String, String)>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, "product")?;
    let image_id = parse_id(&image_id, "image")?;

    let removed = Product::delete_image(state.db(), id, image_id)
        .await
        .map_err(AppError::mutation)?
        .ok_or(AppError::NotFound("image"))?;

    state.media().remove_urls(&[removed.image_url]).await;
    info!(product_id = id, image_id, "product image deleted");
    Ok(message("image deleted"))
}

/// Product admin routes. Guards are applied by the caller.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/products",
            get(list_products).post(create_product),
        )
        .route(
            "/api/admin/products/{id}",
            get(get_product)
                .put(update_product)
                .delete(delete_product),
        )
        .route("/api/admin/products/{id}/images", post(add_images))
        .route(
            "/api/admin/products/{id}/images/{image_id}",
            delete(delete_image),
        )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn read(pairs: &[(&str, &str)], create: bool) -> Result<ProductFields, AppError> {
        let form = MultipartForm::from_fields(pairs);
        let mut v = Validator::new();
        let fields = ProductFields::read(&form, &mut v, create);
        v.finish().map(|()| fields)
    }

    fn field_errors(err: AppError) -> Vec<String> {
        match err {
            AppError::Validation(fields) => fields.into_keys().collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn create_requires_slug_name_and_category() {
        let errors = field_errors(read(&[], true).unwrap_err());
        assert_eq!(errors, vec!["category_id", "name", "slug"]);
    }

    #[test]
    fn update_accepts_an_empty_form() {
        assert_eq!(read(&[], false).unwrap(), ProductFields::default());
    }

    #[test]
    fn slug_is_normalized_before_validation() {
        let fields = read(
            &[("slug", "  Anillo  Sol "), ("name", "Anillo"), ("category_id", "1")],
            true,
        )
        .unwrap();
        assert_eq!(fields.slug.as_deref(), Some("anillo-sol"));
    }

    #[test]
    fn negative_stock_is_rejected() {
        let errors = field_errors(
            read(&[("stock", "-1"), ("low_stock_threshold", "-2")], false).unwrap_err(),
        );
        assert_eq!(errors, vec!["low_stock_threshold", "stock"]);
    }

    #[test]
    fn scalar_fields_are_parsed() {
        let fields = read(
            &[
                ("slug", "collar-luna"),
                ("name", "Collar Luna"),
                ("category_id", "2"),
                ("featured", "true"),
                ("stock", "7"),
                ("is_active", "false"),
                ("material_ids", "[1,2,2]"),
                ("tag_ids", ""),
                ("primary_image", "1"),
            ],
            true,
        )
        .unwrap();
        assert_eq!(fields.category_id, Some(2));
        assert_eq!(fields.featured, Some(true));
        assert_eq!(fields.stock, Some(7));
        assert_eq!(fields.is_active, Some(false));
        assert_eq!(fields.material_ids, Some(vec![1, 2, 2]));
        assert_eq!(fields.tag_ids, Some(vec![]));
        assert_eq!(fields.primary_image, Some(1));
    }

    #[test]
    fn too_many_images_are_refused() {
        let files = vec![
            UploadedFile {
                file_name: None,
                data: vec![1],
            };
            MAX_IMAGES_PER_REQUEST + 1
        ];
        assert!(check_image_count(&files).is_err());
        assert!(check_image_count(&files[..MAX_IMAGES_PER_REQUEST]).is_ok());
    }
}
