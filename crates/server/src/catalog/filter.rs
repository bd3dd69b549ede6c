//! Product listing filter and its query-string parser.
//!
//! The storefront sends multi-select facets as repeated keys
//! (`?material=oro&material=plata`), so the raw query string is parsed with
//! `form_urlencoded` rather than a struct extractor.

use serde::Serialize;
use thiserror::Error;

/// Errors raised while turning request parameters into a [`ProductFilter`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("{field} must be a positive integer, got {value:?}")]
    NotAPositiveInteger { field: &'static str, value: String },

    #[error("limit must be greater than zero")]
    ZeroLimit,
}

/// Sort order of a product listing.
///
/// Every ordering is completed with the product id so that pagination is
/// stable across requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductSort {
    /// Featured first, then newest.
    #[default]
    Relevance,
    NameAsc,
    NameDesc,
    /// Newest first.
    Recent,
}

impl ProductSort {
    /// Parse a sort key. Unknown keys fall back to [`ProductSort::Relevance`].
    ///
    /// The storefront historically used Spanish keys, so both spellings are
    /// accepted.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "name-asc" | "nombre-asc" => ProductSort::NameAsc,
            "name-desc" | "nombre-desc" => ProductSort::NameDesc,
            "recent" | "recientes" | "newest" => ProductSort::Recent,
            _ => ProductSort::Relevance,
        }
    }
}

/// Page-size bounds applied while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 100,
        }
    }
}

/// Normalized listing filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFilter {
    /// Category slugs; a product matches when its category is in the set.
    pub categories: Vec<String>,
    /// Material slugs; a product matches when it has any of them.
    pub materials: Vec<String>,
    /// Tag slugs; a product matches when it has any of them.
    pub tags: Vec<String>,
    /// Case-insensitive substring searched in name and description.
    pub search: Option<String>,
    /// Exact match on the featured flag, only when supplied.
    pub featured: Option<bool>,
    /// Admin listings also show soft-deleted products.
    pub include_inactive: bool,
    pub sort: ProductSort,
    /// 1-indexed page number.
    pub page: u32,
    pub limit: u32,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            materials: Vec::new(),
            tags: Vec::new(),
            search: None,
            featured: None,
            include_inactive: false,
            sort: ProductSort::default(),
            page: 1,
            limit: PageLimits::default().default_limit,
        }
    }
}

impl ProductFilter {
    /// Parse a raw query string (without the leading `?`).
    ///
    /// Empty values are ignored, slugs are lowercased and de-duplicated while
    /// keeping their first-seen order. A `limit` above `limits.max_limit` is
    /// clamped; a malformed or zero `page`/`limit` is rejected.
    pub fn from_query(query: Option<&str>, limits: PageLimits) -> Result<Self, FilterError> {
        let mut filter = ProductFilter {
            limit: limits.default_limit,
            ..ProductFilter::default()
        };

        let Some(query) = query else {
            return Ok(filter);
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match key.as_ref() {
                "categoria" | "category" => push_slug(&mut filter.categories, value),
                "material" => push_slug(&mut filter.materials, value),
                "tag" => push_slug(&mut filter.tags, value),
                "q" => filter.search = Some(value.to_string()),
                "featured" => filter.featured = parse_flag(value),
                "sort" => filter.sort = ProductSort::parse(value),
                "page" => filter.page = parse_positive("page", value)?,
                "limit" => {
                    filter.limit = parse_positive("limit", value)?.min(limits.max_limit);
                }
                _ => {}
            }
        }

        Ok(filter)
    }

    /// Number of rows skipped before the requested page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

fn push_slug(target: &mut Vec<String>, value: &str) {
    let slug = value.to_lowercase();
    if !target.contains(&slug) {
        target.push(slug);
    }
}

/// Only explicit boolean spellings set the flag; anything else means "not
/// supplied" rather than `false`.
fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_positive(field: &'static str, value: &str) -> Result<u32, FilterError> {
    match value.parse::<u32>() {
        Ok(0) if field == "limit" => Err(FilterError::ZeroLimit),
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(FilterError::NotAPositiveInteger {
            field,
            value: value.to_string(),
        }),
    }
}
