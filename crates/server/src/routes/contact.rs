//! Contact form: validated visit requests forwarded to the shop inbox.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{Extensions, HeaderMap};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::middleware::get_client_id;
use crate::routes::helpers::{MessageResponse, message};
use crate::state::AppState;
use crate::validation::Validator;

const SUBJECT: &str = "New visit request - website";

#[derive(Debug, Default, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub telefono: String,
    pub fecha: Option<String>,
    pub origen: Option<String>,
    pub mensaje: Option<String>,
}

impl ContactRequest {
    fn validate(&self) -> AppResult<()> {
        let mut v = Validator::new();
        v.chars_between("nombre", &self.nombre, 2, 80)
            .email("email", &self.email)
            .chars_between("telefono", &self.telefono, 5, 30);
        if let Some(mensaje) = &self.mensaje {
            v.max_chars("mensaje", mensaje, 1000);
        }
        v.finish()
    }

    /// Plain-text body; optional lines are left out when blank.
    fn body(&self) -> String {
        let mut lines = vec![
            "New visit request".to_string(),
            format!("Name: {}", self.nombre.trim()),
            format!("Email: {}", self.email.trim()),
            format!("Phone: {}", self.telefono.trim()),
        ];
        let optional = [
            ("Preferred date", &self.fecha),
            ("How they found us", &self.origen),
            ("Message", &self.mensaje),
        ];
        for (label, value) in optional {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                lines.push(format!("{label}: {value}"));
            }
        }
        lines.push(String::new());
        lines.push("Sent from the website contact form.".to_string());
        lines.join("\n")
    }
}

/// POST /api/contact
async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
    Json(body): Json<ContactRequest>,
) -> AppResult<Json<MessageResponse>> {
    let addr = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = get_client_id(addr, &headers);

    state
        .contact_limiter()
        .check(&client)
        .map_err(|retry_after| AppError::TooManyRequests { retry_after })?;

    body.validate()?;

    let Some(email) = state.email() else {
        return Err(AppError::ServiceUnavailable("email delivery is not configured"));
    };

    email
        .send_to_inbox(body.email.trim(), SUBJECT, &body.body())
        .await?;

    info!(client = %client, "contact request forwarded");
    Ok(message("message sent"))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/contact", post(submit))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn valid() -> ContactRequest {
        ContactRequest {
            nombre: "Ana".into(),
            email: "ana@example.com".into(),
            telefono: "5512345678".into(),
            ..Default::default()
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn each_rule_reports_its_field() {
        let request = ContactRequest {
            nombre: "A".into(),
            email: "not-an-email".into(),
            telefono: "12".into(),
            mensaje: Some("x".repeat(1001)),
            ..Default::default()
        };
        let AppError::Validation(fields) = request.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        let keys: Vec<_> = fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["email", "mensaje", "nombre", "telefono"]);
    }

    #[test]
    fn body_skips_blank_optional_lines() {
        let mut request = valid();
        request.origen = Some("  ".into());
        request.mensaje = Some("Hola".into());
        let body = request.body();
        assert!(body.contains("Name: Ana"));
        assert!(body.contains("Message: Hola"));
        assert!(!body.contains("How they found us"));
        assert!(!body.contains("Preferred date"));
    }
}
