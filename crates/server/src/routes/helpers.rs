//! Shared route helpers: response envelopes and form parsing.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{StatusCode, header};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::file::MAX_UPLOAD_SIZE;
use crate::validation::Validator;

/// Success envelope: `{ "ok": true, "data": ... }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub data: T,
}

/// Wrap `data` in a 200 envelope.
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

/// Wrap `data` in a 201 envelope.
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}

/// Envelope for operations with nothing to return.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub ok: bool,
    pub message: &'static str,
}

pub fn message(message: &'static str) -> Json<MessageResponse> {
    Json(MessageResponse { ok: true, message })
}

/// An uploaded file part.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub data: Vec<u8>,
}

/// A fully read multipart form: text fields plus file parts.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl MultipartForm {
    /// Read every part. Parts with a filename are files; empty file parts
    /// (a file input left blank) are skipped.
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "malformed multipart body");
                    return Err(AppError::BadRequest(format!("malformed form data: {e}")));
                }
            };

            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);

            if file_name.is_some() {
                let data = field.bytes().await.map_err(|e| {
                    AppError::BadRequest(format!("failed to read file data: {e}"))
                })?;
                if data.is_empty() {
                    continue;
                }
                if data.len() > MAX_UPLOAD_SIZE {
                    return Err(AppError::BadRequest(format!(
                        "file too large: {} bytes (max {MAX_UPLOAD_SIZE} bytes)",
                        data.len()
                    )));
                }
                form.files.entry(name).or_default().push(UploadedFile {
                    file_name,
                    data: data.to_vec(),
                });
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("failed to read field: {e}")))?;
                form.fields.entry(name).or_default().push(text);
            }
        }

        Ok(form)
    }

    /// Read a body sent either as JSON or as multipart form data, chosen by
    /// its `Content-Type`. JSON bodies carry no files.
    pub async fn read_request<S: Send + Sync>(request: Request, state: &S) -> AppResult<Self> {
        let is_json = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| {
                value
                    .trim_start()
                    .to_ascii_lowercase()
                    .starts_with("application/json")
            });

        if is_json {
            let Json(body) = Json::<Value>::from_request(request, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Self::from_json(body)
        } else {
            let multipart = Multipart::from_request(request, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Self::read(multipart).await
        }
    }

    /// Flatten a JSON object into text fields. Strings keep their value,
    /// other scalars and arrays keep their JSON text so the typed readers
    /// below parse them the same way as form input. Nulls count as absent.
    pub fn from_json(body: Value) -> AppResult<Self> {
        let Value::Object(map) = body else {
            return Err(AppError::BadRequest(
                "request body must be a JSON object".to_string(),
            ));
        };

        let mut form = Self::default();
        for (name, value) in map {
            let text = match value {
                Value::Null => continue,
                Value::String(text) => text,
                other => other.to_string(),
            };
            form.fields.entry(name).or_default().push(text);
        }
        Ok(form)
    }

    #[cfg(test)]
    pub(crate) fn from_fields(pairs: &[(&str, &str)]) -> Self {
        let mut form = Self::default();
        for (name, value) in pairs {
            form.fields
                .entry((*name).to_string())
                .or_default()
                .push((*value).to_string());
        }
        form
    }

    /// First value of a text field, trimmed. Blank values count as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Owned copy of [`text`](Self::text).
    pub fn string(&self, name: &str) -> Option<String> {
        self.text(name).map(str::to_string)
    }

    /// File parts sent under `name`, in submission order.
    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        self.files.remove(name).unwrap_or_default()
    }

    /// Parse an integer field, recording a field error when malformed.
    pub fn int<T: std::str::FromStr>(&self, v: &mut Validator, name: &str) -> Option<T> {
        let raw = self.text(name)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                v.error(name, "must be a whole number");
                None
            }
        }
    }

    /// Parse a boolean field (`true`/`1`/`on` or `false`/`0`/`off`).
    pub fn bool(&self, v: &mut Validator, name: &str) -> Option<bool> {
        let raw = self.text(name)?;
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "on" => Some(true),
            "false" | "0" | "off" => Some(false),
            _ => {
                v.error(name, "must be true or false");
                None
            }
        }
    }

    /// Parse an id list sent as a JSON array (`[1,2]`), a comma list
    /// (`1,2`) or repeated fields. `None` when the field was not sent.
    pub fn ids(&self, v: &mut Validator, name: &str) -> Option<Vec<i64>> {
        let values = self.fields.get(name)?;
        let mut ids = Vec::new();

        for raw in values {
            let raw = raw.trim();
            if raw.starts_with('[') {
                match serde_json::from_str::<Vec<i64>>(raw) {
                    Ok(parsed) => ids.extend(parsed),
                    Err(_) => {
                        v.error(name, "must be a list of ids");
                        return None;
                    }
                }
                continue;
            }
            for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                match part.parse::<i64>() {
                    Ok(id) => ids.push(id),
                    Err(_) => {
                        v.error(name, "must be a list of ids");
                        return None;
                    }
                }
            }
        }

        if ids.iter().any(|id| *id <= 0) {
            v.error(name, "ids must be positive");
            return None;
        }
        Some(ids)
    }

    /// Parse a JSON array of strings (used for `deleted_images`).
    pub fn string_list(&self, v: &mut Validator, name: &str) -> Vec<String> {
        let Some(raw) = self.text(name) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(list) => list,
            Err(_) => {
                v.error(name, "must be a JSON array of strings");
                Vec::new()
            }
        }
    }
}

/// Parse a numeric path id, answering 404 for non-numeric ids.
pub fn parse_id(raw: &str, what: &'static str) -> AppResult<i64> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or(AppError::NotFound(what))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_counts_as_absent() {
        let form = MultipartForm::from_fields(&[("name", "  "), ("slug", " anillo ")]);
        assert_eq!(form.text("name"), None);
        assert_eq!(form.text("slug"), Some("anillo"));
        assert_eq!(form.text("missing"), None);
    }

    #[test]
    fn ids_accept_json_comma_and_repeated_forms() {
        let mut v = Validator::new();
        let json = MultipartForm::from_fields(&[("material_ids", "[3, 1]")]);
        assert_eq!(json.ids(&mut v, "material_ids"), Some(vec![3, 1]));

        let comma = MultipartForm::from_fields(&[("tag_ids", "4,5")]);
        assert_eq!(comma.ids(&mut v, "tag_ids"), Some(vec![4, 5]));

        let repeated = MultipartForm::from_fields(&[("tag_ids", "4"), ("tag_ids", "6")]);
        assert_eq!(repeated.ids(&mut v, "tag_ids"), Some(vec![4, 6]));

        let empty = MultipartForm::from_fields(&[("tag_ids", "[]")]);
        assert_eq!(empty.ids(&mut v, "tag_ids"), Some(vec![]));

        assert_eq!(json.ids(&mut v, "tag_ids"), None);
        assert!(v.is_empty());
    }

    #[test]
    fn malformed_values_record_field_errors() {
        let mut v = Validator::new();
        let form = MultipartForm::from_fields(&[
            ("stock", "many"),
            ("featured", "maybe"),
            ("material_ids", "[1, \"x\"]"),
            ("deleted_images", "not json"),
        ]);
        assert_eq!(form.int::<i32>(&mut v, "stock"), None);
        assert_eq!(form.bool(&mut v, "featured"), None);
        assert_eq!(form.ids(&mut v, "material_ids"), None);
        assert!(form.string_list(&mut v, "deleted_images").is_empty());

        let err = v.finish().unwrap_err();
        let AppError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields.len(), 4);
    }

    #[test]
    fn json_bodies_read_like_form_fields() {
        let mut v = Validator::new();
        let form = MultipartForm::from_json(serde_json::json!({
            "name": " Anillo Luna ",
            "stock": 4,
            "featured": true,
            "material_ids": [2, 5],
            "deleted_images": ["/uploads/products/a.webp"],
            "description": null,
        }))
        .unwrap();

        assert_eq!(form.text("name"), Some("Anillo Luna"));
        assert_eq!(form.int::<i32>(&mut v, "stock"), Some(4));
        assert_eq!(form.bool(&mut v, "featured"), Some(true));
        assert_eq!(form.ids(&mut v, "material_ids"), Some(vec![2, 5]));
        assert_eq!(
            form.string_list(&mut v, "deleted_images"),
            vec!["/uploads/products/a.webp".to_string()]
        );
        assert_eq!(form.text("description"), None);
        assert!(v.is_empty());
    }

    #[test]
    fn json_bodies_must_be_objects() {
        assert!(matches!(
            MultipartForm::from_json(serde_json::json!([1, 2])),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn path_ids_must_be_positive_numbers() {
        assert_eq!(parse_id("12", "product").unwrap(), 12);
        assert!(matches!(parse_id("0", "product"), Err(AppError::NotFound("product"))));
        assert!(parse_id("abc", "product").is_err());
    }
}
