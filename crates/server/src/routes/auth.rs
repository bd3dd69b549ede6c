//! Authentication routes: login, current user, password change and admin
//! registration.

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::middleware::{AuthUser, authenticate, require_admin};
use crate::models::User;
use crate::models::user::{CreateUser, ROLE_ADMIN};
use crate::routes::helpers::{ApiResponse, MessageResponse, created, message, ok};
use crate::state::AppState;
use crate::validation::{PASSWORD_MIN, Validator};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub ok: bool,
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub full_name: String,
}

const INVALID_CREDENTIALS: &str = "invalid email or password";

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let mut v = Validator::new();
    v.email("email", &body.email).required("password", &body.password);
    v.finish()?;

    let user = User::find_by_email(state.db(), &body.email)
        .await
        .map_err(AppError::query)?;

    let Some(user) = user.filter(|u| u.verify_password(&body.password)) else {
        info!(email = %body.email.trim(), "failed login attempt");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS));
    };

    if !user.is_active {
        info!(user_id = user.id, "login refused for inactive user");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS));
    }

    if let Err(e) = User::touch_last_login(state.db(), user.id).await {
        warn!(error = %e, user_id = user.id, "failed to record last login");
    }

    let token = state.tokens().issue(&user)?;
    info!(user_id = user.id, "user logged in");

    Ok(Json(LoginResponse {
        ok: true,
        token,
        user,
    }))
}

/// GET /api/auth/me
async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<ApiResponse<User>>> {
    let user = User::find_by_id(state.db(), auth.user_id)
        .await
        .map_err(AppError::query)?
        .filter(|u| u.is_active)
        .ok_or(AppError::Unauthorized("user no longer exists"))?;

    Ok(ok(user))
}

/// POST /api/auth/change-password
async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let mut v = Validator::new();
    v.required("current_password", &body.current_password);
    if body.new_password.chars().count() < PASSWORD_MIN {
        v.error(
            "new_password",
            format!("new_password must be at least {PASSWORD_MIN} characters"),
        );
    }
    v.finish()?;

    let user = User::find_by_id(state.db(), auth.user_id)
        .await
        .map_err(AppError::query)?
        .ok_or(AppError::Unauthorized("user no longer exists"))?;

    if !user.verify_password(&body.current_password) {
        let mut v = Validator::new();
        v.error("current_password", "current password is incorrect");
        v.finish()?;
    }

    User::update_password(state.db(), user.id, &body.new_password)
        .await
        .map_err(AppError::mutation)?;

    info!(user_id = user.id, "password changed");
    Ok(message("password updated"))
}

/// POST /api/auth/register (admins only)
async fn register(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    let mut v = Validator::new();
    v.email("email", &body.email)
        .required("full_name", &body.full_name)
        .max_chars("full_name", &body.full_name, 255);
    if body.password.chars().count() < PASSWORD_MIN {
        v.error(
            "password",
            format!("password must be at least {PASSWORD_MIN} characters"),
        );
    }
    v.finish()?;

    let user = User::create(
        state.db(),
        CreateUser {
            email: body.email,
            password: body.password,
            full_name: body.full_name,
            role: Some(ROLE_ADMIN.to_string()),
        },
    )
    .await
    .map_err(AppError::mutation)?;

    info!(user_id = user.id, created_by = auth.user_id, "admin user registered");
    Ok(created(user))
}

/// Create the auth router.
pub fn router(state: &AppState) -> Router<AppState> {
    let admin_only = Router::new()
        .route("/api/auth/register", post(register))
        .route_layer(from_fn(require_admin));

    let authenticated = Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/auth/change-password", post(change_password))
        .merge(admin_only)
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .route("/api/auth/login", post(login))
        .merge(authenticated)
}
