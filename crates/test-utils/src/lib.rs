//! Alahas test utilities.
//!
//! Fixture builders for catalog payloads, a multipart body encoder for the
//! admin endpoints, and JSON assertion helpers.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

/// A slug that will not collide with other test runs: `{prefix}-{uuid}`.
pub fn unique_slug(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::now_v7().simple())
}

/// Encode a solid-color PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

/// Encode a solid-color JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([212, 175, 55])))
        .write_to(&mut buf, format)
        .unwrap_or_else(|e| panic!("failed to encode test image: {e}"));
    buf.into_inner()
}

/// Builder for `multipart/form-data` request bodies.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: format!("alahas-test-{}", Uuid::now_v7().simple()),
            body: Vec::new(),
        }
    }

    /// Add a text part.
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    /// Add a file part.
    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Close the body. Returns the `Content-Type` header value and the bytes.
    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}

/// Create a product fixture with sensible defaults.
pub fn test_product(category_id: i64, name: &str) -> TestProduct {
    TestProduct {
        slug: unique_slug(&name.to_lowercase().replace(' ', "-")),
        name: name.to_string(),
        category_id,
        description: None,
        featured: false,
        stock: 10,
        low_stock_threshold: 5,
        is_active: true,
        material_ids: Vec::new(),
        tag_ids: Vec::new(),
        images: Vec::new(),
    }
}

/// A product builder that renders to the admin multipart form.
#[derive(Debug, Clone)]
pub struct TestProduct {
    pub slug: String,
    pub name: String,
    pub category_id: i64,
    pub description: Option<String>,
    pub featured: bool,
    pub stock: i32,
    pub low_stock_threshold: i32,
    pub is_active: bool,
    pub material_ids: Vec<i64>,
    pub tag_ids: Vec<i64>,
    /// PNG payloads sent as `images` parts, in order.
    pub images: Vec<Vec<u8>>,
}

impl TestProduct {
    pub fn with_slug(mut self, slug: &str) -> Self {
        self.slug = slug.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn featured(mut self) -> Self {
        self.featured = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn with_stock(mut self, stock: i32, low_stock_threshold: i32) -> Self {
        self.stock = stock;
        self.low_stock_threshold = low_stock_threshold;
        self
    }

    pub fn with_materials(mut self, ids: &[i64]) -> Self {
        self.material_ids = ids.to_vec();
        self
    }

    pub fn with_tags(mut self, ids: &[i64]) -> Self {
        self.tag_ids = ids.to_vec();
        self
    }

    /// Attach `count` small PNG images.
    pub fn with_images(mut self, count: usize) -> Self {
        self.images = (0..count).map(|i| png_bytes(8 + i as u32, 8)).collect();
        self
    }

    /// Render as the create form.
    pub fn into_multipart(self) -> (String, Vec<u8>) {
        let mut body = MultipartBody::new()
            .text("slug", &self.slug)
            .text("name", &self.name)
            .text("category_id", &self.category_id.to_string())
            .text("featured", &self.featured.to_string())
            .text("stock", &self.stock.to_string())
            .text("low_stock_threshold", &self.low_stock_threshold.to_string())
            .text("is_active", &self.is_active.to_string())
            .text("material_ids", &json!(self.material_ids).to_string())
            .text("tag_ids", &json!(self.tag_ids).to_string());
        if let Some(description) = &self.description {
            body = body.text("description", description);
        }
        for (i, image) in self.images.iter().enumerate() {
            body = body.file("images", &format!("image-{i}.png"), "image/png", image);
        }
        body.finish()
    }
}

/// JSON body for a category, material or tag create.
pub fn taxonomy_json(name: &str, slug: &str) -> JsonValue {
    json!({ "name": name, "slug": slug })
}

/// Assertion helpers for JSON responses.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert the `{ ok: true }` envelope.
    pub fn ok(value: &Value) {
        assert_eq!(value["ok"], true, "Expected ok envelope, got: {value}");
    }

    /// Assert the `{ ok: false, error }` envelope.
    pub fn error(value: &Value) {
        assert_eq!(value["ok"], false, "Expected error envelope, got: {value}");
        has_key(value, "error");
    }

    /// Slugs of the objects in `value[key]`, in order.
    pub fn slugs(value: &Value, key: &str) -> Vec<String> {
        value[key]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["slug"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn unique_slugs_are_valid_and_distinct() {
        let a = unique_slug("anillo");
        let b = unique_slug("anillo");
        assert_ne!(a, b);
        assert!(a.starts_with("anillo-"));
        assert!(
            a.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        );
    }

    #[test]
    fn multipart_body_is_well_formed() {
        let (content_type, body) = MultipartBody::new()
            .text("name", "Anillo")
            .file("images", "a.png", "image/png", b"PNG")
            .finish();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap();
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with(&format!("--{boundary}\r\n")));
        assert!(text.contains("name=\"name\"\r\n\r\nAnillo\r\n"));
        assert!(text.contains("filename=\"a.png\""));
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn product_builder_renders_fields_and_images() {
        let (_, body) = test_product(3, "Collar Luna")
            .featured()
            .with_materials(&[1, 2])
            .with_images(2)
            .into_multipart();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("name=\"category_id\"\r\n\r\n3\r\n"));
        assert!(text.contains("name=\"featured\"\r\n\r\ntrue\r\n"));
        assert!(text.contains("name=\"material_ids\"\r\n\r\n[1,2]\r\n"));
        assert_eq!(text.matches("filename=\"image-").count(), 2);
    }

    #[test]
    fn generated_images_are_real_images() {
        assert_eq!(&png_bytes(4, 4)[1..4], b"PNG");
        assert_eq!(&jpeg_bytes(4, 4)[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn assertion_helpers() {
        let value = json!({ "ok": true, "data": [{ "slug": "a" }, { "slug": "b" }] });
        assert::ok(&value);
        assert::has_key(&value, "data");
        assert_eq!(assert::slugs(&value, "data"), vec!["a", "b"]);
        assert::error(&json!({ "ok": false, "error": "nope" }));
    }
}
