//! Response shapes for product listings and product detail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use crate::models::{Category, Material, Product, ProductImage, Tag};

/// Lightweight `{name, slug}` reference used in listing rows.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaxonomyRef {
    pub name: String,
    pub slug: String,
}

/// Availability bucket derived from stock and its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// Out of stock wins over low stock.
    pub fn classify(stock: i32, low_stock_threshold: i32) -> Self {
        if stock <= 0 {
            StockStatus::OutOfStock
        } else if stock <= low_stock_threshold {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}

/// One aggregated row of the listing query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductListRow {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub category_id: i64,
    pub description: Option<String>,
    pub featured: bool,
    pub stock: i32,
    pub low_stock_threshold: i32,
    pub wa_template: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub category: String,
    pub category_slug: String,
    pub image_url: Option<String>,
    pub materials: Json<Vec<TaxonomyRef>>,
    pub tags: Json<Vec<TaxonomyRef>>,
}

/// Product card in the storefront grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductListItem {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub category_id: i64,
    pub category: String,
    pub category_slug: String,
    pub description: Option<String>,
    pub featured: bool,
    pub stock: i32,
    pub low_stock_threshold: i32,
    pub is_out_of_stock: bool,
    pub stock_status: StockStatus,
    pub is_active: bool,
    /// Primary image URL, or null when the product has none.
    pub image_url: Option<String>,
    pub materials: Vec<TaxonomyRef>,
    pub tags: Vec<TaxonomyRef>,
    pub created_at: DateTime<Utc>,
}

impl From<ProductListRow> for ProductListItem {
    fn from(row: ProductListRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            name: row.name,
            category_id: row.category_id,
            category: row.category,
            category_slug: row.category_slug,
            description: row.description,
            featured: row.featured,
            stock: row.stock,
            low_stock_threshold: row.low_stock_threshold,
            is_out_of_stock: row.stock <= 0,
            stock_status: StockStatus::classify(row.stock, row.low_stock_threshold),
            is_active: row.is_active,
            image_url: row.image_url,
            materials: normalize_refs(row.materials.0),
            tags: normalize_refs(row.tags.0),
            created_at: row.created_at,
        }
    }
}

/// Sort by name and drop repeated slugs.
fn normalize_refs(mut refs: Vec<TaxonomyRef>) -> Vec<TaxonomyRef> {
    refs.sort();
    refs.dedup_by(|a, b| a.slug == b.slug);
    refs
}

/// Full product view: ordered gallery, category object and the complete
/// material and tag records.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub category: Category,
    pub images: Vec<ProductImage>,
    pub materials: Vec<Material>,
    pub tags: Vec<Tag>,
    pub is_out_of_stock: bool,
    pub stock_status: StockStatus,
    /// `wa_template` with the product name filled in.
    pub whatsapp_message: Option<String>,
}

impl ProductDetail {
    /// Assemble the view, normalizing gallery order and de-duplicating links.
    pub fn assemble(
        product: Product,
        category: Category,
        mut images: Vec<ProductImage>,
        mut materials: Vec<Material>,
        mut tags: Vec<Tag>,
    ) -> Self {
        images.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then(b.is_primary.cmp(&a.is_primary))
                .then(a.id.cmp(&b.id))
        });

        materials.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        materials.dedup_by_key(|m| m.id);
        tags.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        tags.dedup_by_key(|t| t.id);

        let whatsapp_message = product
            .wa_template
            .as_deref()
            .map(|template| render_wa_template(template, &product.name));

        Self {
            is_out_of_stock: product.stock <= 0,
            stock_status: StockStatus::classify(product.stock, product.low_stock_threshold),
            product,
            category,
            images,
            materials,
            tags,
            whatsapp_message,
        }
    }
}

/// Substitute `{nombre}` and `{name}` with the product name.
pub fn render_wa_template(template: &str, product_name: &str) -> String {
    template
        .replace("{nombre}", product_name)
        .replace("{name}", product_name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn product(stock: i32, threshold: i32) -> Product {
        Product {
            id: 7,
            slug: "anillo-sol".into(),
            name: "Anillo Sol".into(),
            category_id: 1,
            description: None,
            featured: false,
            stock,
            low_stock_threshold: threshold,
            wa_template: Some("Hola, me interesa {nombre}".into()),
            is_active: true,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    fn category() -> Category {
        Category {
            id: 1,
            name: "Anillos".into(),
            slug: "anillos".into(),
            description: None,
            image_url: None,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    fn image(id: i64, order: i32, primary: bool) -> ProductImage {
        ProductImage {
            id,
            product_id: 7,
            image_url: format!("/uploads/{id}.jpg"),
            display_order: order,
            is_primary: primary,
            alt_text: None,
            created_at: at(0),
        }
    }

    fn material(id: i64, name: &str) -> Material {
        Material {
            id,
            name: name.into(),
            slug: name.to_lowercase(),
            description: None,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    fn list_row(stock: i32, threshold: i32) -> ProductListRow {
        ProductListRow {
            id: 1,
            slug: "collar-luna".into(),
            name: "Collar Luna".into(),
            category_id: 2,
            description: Some("Plata 950".into()),
            featured: true,
            stock,
            low_stock_threshold: threshold,
            wa_template: None,
            is_active: true,
            created_at: at(10),
            updated_at: at(10),
            category: "Collares".into(),
            category_slug: "collares".into(),
            image_url: None,
            materials: Json(vec![
                TaxonomyRef {
                    name: "Plata".into(),
                    slug: "plata".into(),
                },
                TaxonomyRef {
                    name: "Oro".into(),
                    slug: "oro".into(),
                },
                TaxonomyRef {
                    name: "Plata".into(),
                    slug: "plata".into(),
                },
            ]),
            tags: Json(Vec::new()),
        }
    }

    #[test]
    fn stock_status_buckets() {
        assert_eq!(StockStatus::classify(0, 5), StockStatus::OutOfStock);
        assert_eq!(StockStatus::classify(-1, 5), StockStatus::OutOfStock);
        assert_eq!(StockStatus::classify(5, 5), StockStatus::LowStock);
        assert_eq!(StockStatus::classify(1, 5), StockStatus::LowStock);
        assert_eq!(StockStatus::classify(6, 5), StockStatus::InStock);
    }

    #[test]
    fn out_of_stock_wins_over_low_stock() {
        // threshold 0 and stock 0 satisfy both rules
        assert_eq!(StockStatus::classify(0, 0), StockStatus::OutOfStock);
    }

    #[test]
    fn list_item_flags_follow_stock() {
        let item = ProductListItem::from(list_row(0, 5));
        assert!(item.is_out_of_stock);
        assert_eq!(item.stock_status, StockStatus::OutOfStock);

        let item = ProductListItem::from(list_row(3, 5));
        assert!(!item.is_out_of_stock);
        assert_eq!(item.stock_status, StockStatus::LowStock);
    }

    #[test]
    fn list_item_taxonomy_is_sorted_and_unique() {
        let item = ProductListItem::from(list_row(10, 5));
        let names: Vec<_> = item.materials.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Oro", "Plata"]);
        assert!(item.tags.is_empty());
        assert_eq!(item.image_url, None);
    }

    #[test]
    fn list_item_serializes_expected_fields() {
        let json = serde_json::to_value(ProductListItem::from(list_row(3, 5))).unwrap();
        assert_eq!(json["category"], "Collares");
        assert_eq!(json["category_slug"], "collares");
        assert_eq!(json["stock_status"], "low_stock");
        assert_eq!(json["is_out_of_stock"], false);
        assert!(json["image_url"].is_null());
        assert_eq!(json["materials"][0]["slug"], "oro");
    }

    #[test]
    fn detail_orders_gallery_and_dedups_links() {
        let detail = ProductDetail::assemble(
            product(3, 5),
            category(),
            vec![image(3, 2, false), image(2, 1, false), image(1, 1, true)],
            vec![material(2, "Plata"), material(1, "Oro"), material(2, "Plata")],
            Vec::new(),
        );

        let ids: Vec<_> = detail.images.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        let primary: Vec<_> = detail.images.iter().filter(|i| i.is_primary).map(|i| i.id).collect();
        assert_eq!(primary, vec![1]);

        let names: Vec<_> = detail.materials.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Oro", "Plata"]);
        assert_eq!(detail.stock_status, StockStatus::LowStock);
    }

    #[test]
    fn detail_serializes_flat_product_fields() {
        let detail =
            ProductDetail::assemble(product(0, 5), category(), Vec::new(), Vec::new(), Vec::new());
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["slug"], "anillo-sol");
        assert_eq!(json["category"]["slug"], "anillos");
        assert_eq!(json["is_out_of_stock"], true);
        assert!(json["images"].as_array().unwrap().is_empty());
        assert!(json["whatsapp_message"].is_string());
    }

    #[test]
    fn whatsapp_placeholders_are_substituted() {
        assert_eq!(
            render_wa_template("Quiero {nombre} / I want {name}", "Aretes Luna"),
            "Quiero Aretes Luna / I want Aretes Luna"
        );
        assert_eq!(render_wa_template("Sin marcador", "X"), "Sin marcador");

        let detail =
            ProductDetail::assemble(product(1, 5), category(), Vec::new(), Vec::new(), Vec::new());
        assert_eq!(
            detail.whatsapp_message.as_deref(),
            Some("Hola, me interesa Anillo Sol")
        );
    }
}
