//! Application error types.
//!
//! Every handler returns [`AppResult`]; the error is rendered as
//! `{ "ok": false, "error": "...", "errors": { field: message } }`. Failures
//! that map to a 5xx status are logged with their cause and answered with a
//! generic message.

use std::collections::BTreeMap;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::catalog::{CatalogError, FilterError};
use crate::file::UploadError;

/// Per-field validation messages, keyed by field name.
pub type FieldErrors = BTreeMap<String, String>;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    ConstraintViolation(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("forbidden")]
    Forbidden,

    #[error("too many requests")]
    TooManyRequests { retry_after: u64 },

    #[error("{0}")]
    ServiceUnavailable(&'static str),

    #[error("query failed")]
    QueryFailed(#[source] anyhow::Error),

    #[error("mutation failed")]
    MutationFailed(#[source] anyhow::Error),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Wrap a failed read.
    pub fn query(err: anyhow::Error) -> Self {
        AppError::QueryFailed(err)
    }

    /// Wrap a failed write, surfacing unique and foreign-key violations as
    /// [`AppError::ConstraintViolation`].
    pub fn mutation(err: anyhow::Error) -> Self {
        match constraint_kind(&err) {
            Some(ErrorKind::UniqueViolation) => AppError::ConstraintViolation(
                "a record with the same unique value already exists".to_string(),
            ),
            Some(ErrorKind::ForeignKeyViolation) => AppError::ConstraintViolation(
                "the record references a missing row or is still referenced".to_string(),
            ),
            Some(ErrorKind::CheckViolation) => {
                AppError::BadRequest("a value is outside its allowed range".to_string())
            }
            _ => AppError::MutationFailed(err),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidFilter(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ConstraintViolation(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::QueryFailed(_) | AppError::MutationFailed(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::InvalidFilter(e) => AppError::InvalidFilter(e),
            CatalogError::QueryFailed(e) => AppError::QueryFailed(e),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Invalid(e) => AppError::BadRequest(e.to_string()),
            UploadError::Storage(e) => AppError::Internal(e),
        }
    }
}

/// Find the database constraint class behind an error, if any.
fn constraint_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain().find_map(|cause| match cause.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) => Some(db.kind()),
        _ => None,
    })
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    ok: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a FieldErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            AppError::QueryFailed(e) => {
                tracing::error!(error = %format!("{e:#}"), "query failed");
                "Failed to load data".to_string()
            }
            AppError::MutationFailed(e) => {
                tracing::error!(error = %format!("{e:#}"), "mutation failed");
                "Failed to save changes".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), "internal server error");
                "Internal server error".to_string()
            }
            AppError::Validation(_) => "Validation failed".to_string(),
            _ => self.to_string(),
        };

        let errors = match &self {
            AppError::Validation(fields) => Some(fields),
            _ => None,
        };

        let body = ErrorBody {
            ok: false,
            error: message,
            errors,
        };
        let mut response = (status, Json(body)).into_response();

        if let AppError::TooManyRequests { retry_after } = self
            && let Ok(value) = HeaderValue::from_str(&retry_after.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }

        response
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_class() {
        assert_eq!(
            AppError::Validation(FieldErrors::new()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InvalidFilter(FilterError::ZeroLimit).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NotFound("product").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::ConstraintViolation("in use".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Unauthorized("missing token").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::QueryFailed(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn plain_errors_are_not_constraint_violations() {
        let err = AppError::mutation(anyhow::anyhow!("connection reset"));
        assert!(matches!(err, AppError::MutationFailed(_)));
    }

    #[test]
    fn too_many_requests_sets_retry_after() {
        let response = AppError::TooManyRequests { retry_after: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn server_errors_hide_the_cause() {
        let response =
            AppError::QueryFailed(anyhow::anyhow!("relation \"products\" does not exist"))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
