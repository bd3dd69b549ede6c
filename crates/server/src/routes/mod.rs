//! HTTP route handlers.

pub mod admin_collections;
pub mod admin_products;
pub mod admin_taxonomy;
pub mod auth;
pub mod collections;
pub mod contact;
pub mod health;
pub mod helpers;
pub mod products;
pub mod taxonomy;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};

use crate::file::MAX_UPLOAD_SIZE;
use crate::middleware::{authenticate, require_admin};
use crate::state::AppState;

/// Body limit for admin requests: a full gallery plus form fields.
const ADMIN_BODY_LIMIT: usize = MAX_UPLOAD_SIZE * (admin_products::MAX_IMAGES_PER_REQUEST + 1);

/// Admin routes behind the bearer and admin-role guards.
pub fn admin_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(admin_products::router())
        .merge(admin_taxonomy::router())
        .merge(admin_collections::router())
        // Last added runs first: authenticate, then require_admin.
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), authenticate))
        .layer(DefaultBodyLimit::max(ADMIN_BODY_LIMIT))
}

/// Every API route, public and admin.
pub fn api_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(products::router())
        .merge(taxonomy::router())
        .merge(collections::router())
        .merge(contact::router())
        .merge(auth::router(state))
        .merge(admin_router(state))
}
