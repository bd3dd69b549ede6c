//! Bearer token authentication middleware.
//!
//! Checks `Authorization: Bearer <token>` headers, verifies the JWT and
//! stores the caller in request extensions for handlers and later guards.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::error::AppError;
use crate::models::user::ROLE_ADMIN;
use crate::state::AppState;

/// Caller identity taken from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

/// Require a valid Bearer token. Missing or invalid tokens get 401.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized("missing bearer token"))?;

    let claims = state.tokens().verify(token).map_err(|e| {
        debug!(error = %e, "invalid bearer token");
        AppError::Unauthorized("invalid or expired token")
    })?;

    request.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        email: claims.email,
        role: claims.role,
    });

    Ok(next.run(request).await)
}

/// Require an authenticated admin. Runs after [`authenticate`].
pub async fn require_admin(request: Request<Body>, next: Next) -> Result<Response, AppError> {
    let Some(user) = request.extensions().get::<AuthUser>() else {
        return Err(AppError::Unauthorized("missing bearer token"));
    };
    if !user.is_admin() {
        debug!(user_id = user.user_id, role = %user.role, "admin route refused");
        return Err(AppError::Forbidden);
    }
    Ok(next.run(request).await)
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthorized("missing bearer token"))
    }
}
