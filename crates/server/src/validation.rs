//! Input validation shared by the admin, auth and contact endpoints.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AppError, AppResult, FieldErrors};

/// Slugs are lowercase ASCII letters, digits and hyphens.
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("valid regex literal"));

/// Pragmatic email shape check; delivery is the real test.
#[allow(clippy::expect_used)]
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex literal")
});

#[allow(clippy::expect_used)]
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex literal"));

pub const PRODUCT_SLUG_MAX: usize = 150;
pub const PRODUCT_NAME_MAX: usize = 255;
pub const TAXONOMY_FIELD_MAX: usize = 100;
pub const COLLECTION_TITLE_MAX: usize = 255;
pub const PASSWORD_MIN: usize = 6;

/// Lowercase a slug and turn whitespace runs into single hyphens.
pub fn normalize_slug(raw: &str) -> String {
    WHITESPACE
        .replace_all(raw.trim(), "-")
        .to_lowercase()
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG.is_match(slug)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Collects per-field messages and turns them into a single
/// [`AppError::Validation`].
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for `field`. The first message per field wins.
    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.error(field, format!("{field} is required"));
        }
        self
    }

    pub fn max_chars(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        if value.chars().count() > max {
            self.error(field, format!("{field} must be at most {max} characters"));
        }
        self
    }

    pub fn chars_between(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let len = value.trim().chars().count();
        if len < min || len > max {
            self.error(
                field,
                format!("{field} must be between {min} and {max} characters"),
            );
        }
        self
    }

    pub fn slug(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        if value.is_empty() {
            self.error(field, format!("{field} is required"));
        } else if !is_valid_slug(value) {
            self.error(
                field,
                format!("{field} may only contain lowercase letters, digits and hyphens"),
            );
        } else if value.len() > max {
            self.error(field, format!("{field} must be at most {max} characters"));
        }
        self
    }

    pub fn non_negative(&mut self, field: &str, value: i32) -> &mut Self {
        if value < 0 {
            self.error(field, format!("{field} must be zero or greater"));
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if !is_valid_email(value.trim()) {
            self.error(field, format!("{field} must be a valid email address"));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok` when nothing was recorded.
    pub fn finish(self) -> AppResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn normalize_slug_lowercases_and_hyphenates() {
        assert_eq!(normalize_slug("  Anillo  Sol Dorado "), "anillo-sol-dorado");
        assert_eq!(normalize_slug("ya-es-slug"), "ya-es-slug");
    }

    #[test]
    fn slug_shape() {
        assert!(is_valid_slug("anillo-oro-18k"));
        assert!(!is_valid_slug("Anillo"));
        assert!(!is_valid_slug("anillo_oro"));
        assert!(!is_valid_slug("añillo"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("ana@alahas.pe"));
        assert!(!is_valid_email("ana@alahas"));
        assert!(!is_valid_email("ana alahas@x.pe"));
    }

    #[test]
    fn collects_one_message_per_field() {
        let mut v = Validator::new();
        v.required("name", " ")
            .max_chars("name", "", 10)
            .slug("slug", "Bad Slug", 150)
            .non_negative("stock", -1);

        let Err(AppError::Validation(errors)) = v.finish() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 3);
        assert_eq!(errors["name"], "name is required");
        assert!(errors.contains_key("slug"));
        assert!(errors.contains_key("stock"));
    }

    #[test]
    fn slug_length_is_bounded() {
        let mut v = Validator::new();
        v.slug("slug", &"a".repeat(151), PRODUCT_SLUG_MAX);
        assert!(!v.is_empty());

        let mut ok = Validator::new();
        ok.slug("slug", &"a".repeat(150), PRODUCT_SLUG_MAX);
        assert!(ok.finish().is_ok());
    }

    #[test]
    fn chars_between_counts_characters_not_bytes() {
        let mut v = Validator::new();
        v.chars_between("nombre", "Ñu", 2, 80);
        assert!(v.finish().is_ok());
    }
}
