//! Products and their image gallery.
//!
//! Product writes are multi-table: the product row, its images and its
//! material and tag links are always written inside one transaction so a
//! failure leaves no partial product behind.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_query::{Expr, PostgresQueryBuilder, Query};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::db::pg_arguments;
use crate::schema::Products;

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub category_id: i64,
    pub description: Option<String>,
    pub featured: bool,
    pub stock: i32,
    pub low_stock_threshold: i32,
    /// WhatsApp message template; `{nombre}`/`{name}` expand to the product name.
    pub wa_template: Option<String>,
    /// Soft-delete flag. Inactive products are hidden from the storefront.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One image in a product gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductImage {
    pub id: i64,
    pub product_id: i64,
    pub image_url: String,
    pub display_order: i32,
    pub is_primary: bool,
    pub alt_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An image to attach to a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewProductImage {
    pub image_url: String,
    /// Request this image as the primary one.
    #[serde(default)]
    pub is_primary: bool,
    pub alt_text: Option<String>,
}

/// Input for creating a product.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateProduct {
    pub slug: String,
    pub name: String,
    pub category_id: i64,
    pub description: Option<String>,
    pub featured: Option<bool>,
    pub stock: Option<i32>,
    pub low_stock_threshold: Option<i32>,
    pub wa_template: Option<String>,
    pub is_active: Option<bool>,
    /// Gallery in display order.
    #[serde(default)]
    pub images: Vec<NewProductImage>,
    #[serde(default)]
    pub material_ids: Vec<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

/// Partial product update. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProduct {
    pub slug: Option<String>,
    pub name: Option<String>,
    pub category_id: Option<i64>,
    pub description: Option<String>,
    pub featured: Option<bool>,
    pub stock: Option<i32>,
    pub low_stock_threshold: Option<i32>,
    pub wa_template: Option<String>,
    pub is_active: Option<bool>,
    /// Replaces the material set when present.
    pub material_ids: Option<Vec<i64>>,
    /// Replaces the tag set when present.
    pub tag_ids: Option<Vec<i64>>,
    /// Gallery images to drop, by URL.
    #[serde(default)]
    pub removed_image_urls: Vec<String>,
    /// Images appended after the current gallery.
    #[serde(default)]
    pub new_images: Vec<NewProductImage>,
}

/// Result of a successful update.
#[derive(Debug, Clone)]
pub struct UpdatedProduct {
    pub product: Product,
    /// URLs of the gallery rows that were removed; their files can go.
    pub removed_image_urls: Vec<String>,
}

/// Association tables written by the pipeline.
#[derive(Debug, Clone, Copy)]
enum Link {
    Materials,
    Tags,
}

impl Link {
    fn clear_sql(self) -> &'static str {
        match self {
            Link::Materials => "DELETE FROM product_materials WHERE product_id = $1",
            Link::Tags => "DELETE FROM product_tags WHERE product_id = $1",
        }
    }

    fn insert_sql(self) -> &'static str {
        match self {
            Link::Materials => {
                "INSERT INTO product_materials (product_id, material_id) \
                 SELECT $1, UNNEST($2::BIGINT[]) ON CONFLICT DO NOTHING"
            }
            Link::Tags => {
                "INSERT INTO product_tags (product_id, tag_id) \
                 SELECT $1, UNNEST($2::BIGINT[]) ON CONFLICT DO NOTHING"
            }
        }
    }
}

impl Product {
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let product = sqlx::query_as::<_, Self>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch product")?;

        Ok(product)
    }

    /// Storefront lookup: inactive products are treated as missing.
    pub async fn find_active_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>> {
        let product = sqlx::query_as::<_, Self>(
            "SELECT * FROM products WHERE slug = $1 AND is_active = TRUE",
        )
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("failed to fetch product by slug")?;

        Ok(product)
    }

    /// Create a product with its gallery and links in one transaction.
    pub async fn create(pool: &PgPool, input: CreateProduct) -> Result<Self> {
        let mut tx = pool.begin().await.context("failed to begin transaction")?;

        let product = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO products
                (slug, name, category_id, description, featured, stock,
                 low_stock_threshold, wa_template, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&input.slug)
        .bind(&input.name)
        .bind(input.category_id)
        .bind(&input.description)
        .bind(input.featured.unwrap_or(false))
        .bind(input.stock.unwrap_or(0))
        .bind(input.low_stock_threshold.unwrap_or(5))
        .bind(&input.wa_template)
        .bind(input.is_active.unwrap_or(true))
        .fetch_one(&mut *tx)
        .await
        .context("failed to insert product")?;

        insert_images(
            &mut tx,
            product.id,
            &input.images,
            1,
            resolve_primary(&input.images),
        )
        .await?;
        replace_links(&mut tx, Link::Materials, product.id, &input.material_ids).await?;
        replace_links(&mut tx, Link::Tags, product.id, &input.tag_ids).await?;

        tx.commit().await.context("failed to commit product")?;

        tracing::info!(product_id = product.id, slug = %product.slug, "product created");
        Ok(product)
    }

    /// Apply a partial update in one transaction.
    ///
    /// Returns `None` when the product does not exist. Re-applying the same
    /// update leaves the product unchanged apart from `updated_at`.
    pub async fn update(
        pool: &PgPool,
        id: i64,
        input: UpdateProduct,
    ) -> Result<Option<UpdatedProduct>> {
        // The statement is not Send; build it before the first await.
        let (sql, values) = {
            let mut stmt = Query::update();
            stmt.table(Products::Table)
                .value(Products::UpdatedAt, Expr::current_timestamp());

            if let Some(slug) = input.slug {
                stmt.value(Products::Slug, slug);
            }
            if let Some(name) = input.name {
                stmt.value(Products::Name, name);
            }
            if let Some(category_id) = input.category_id {
                stmt.value(Products::CategoryId, category_id);
            }
            if let Some(description) = input.description {
                stmt.value(Products::Description, description);
            }
            if let Some(featured) = input.featured {
                stmt.value(Products::Featured, featured);
            }
            if let Some(stock) = input.stock {
                stmt.value(Products::Stock, stock);
            }
            if let Some(threshold) = input.low_stock_threshold {
                stmt.value(Products::LowStockThreshold, threshold);
            }
            if let Some(template) = input.wa_template {
                stmt.value(Products::WaTemplate, template);
            }
            if let Some(active) = input.is_active {
                stmt.value(Products::IsActive, active);
            }

            stmt.and_where(Expr::col(Products::Id).eq(id))
                .returning_all();
            stmt.build(PostgresQueryBuilder)
        };

        let mut tx = pool.begin().await.context("failed to begin transaction")?;

        let Some(product) = sqlx::query_as_with::<_, Self, _>(&sql, pg_arguments(&values)?)
            .fetch_optional(&mut *tx)
            .await
            .context("failed to update product")?
        else {
            return Ok(None);
        };

        let removed_image_urls = if input.removed_image_urls.is_empty() {
            Vec::new()
        } else {
            sqlx::query_scalar::<_, String>(
                "DELETE FROM product_images WHERE product_id = $1 AND image_url = ANY($2) \
                 RETURNING image_url",
            )
            .bind(id)
            .bind(&input.removed_image_urls)
            .fetch_all(&mut *tx)
            .await
            .context("failed to remove product images")?
        };

        if let Some(material_ids) = &input.material_ids {
            replace_links(&mut tx, Link::Materials, id, material_ids).await?;
        }
        if let Some(tag_ids) = &input.tag_ids {
            replace_links(&mut tx, Link::Tags, id, tag_ids).await?;
        }

        // Surviving images are promoted before new uploads are considered.
        if !removed_image_urls.is_empty() {
            ensure_primary(&mut tx, id).await?;
        }
        if !input.new_images.is_empty() {
            append_images(&mut tx, id, &input.new_images).await?;
        }

        tx.commit().await.context("failed to commit product update")?;

        tracing::info!(product_id = id, "product updated");
        Ok(Some(UpdatedProduct {
            product,
            removed_image_urls,
        }))
    }

    /// Hard-delete a product: gallery rows first, then the product (links
    /// cascade). Returns the removed image URLs, or `None` if not found.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<Option<Vec<String>>> {
        let mut tx = pool.begin().await.context("failed to begin transaction")?;

        let urls = sqlx::query_scalar::<_, String>(
            "DELETE FROM product_images WHERE product_id = $1 RETURNING image_url",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .context("failed to delete product images")?;

        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("failed to delete product")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        tx.commit().await.context("failed to commit product delete")?;

        tracing::info!(product_id = id, images = urls.len(), "product deleted");
        Ok(Some(urls))
    }

    /// Append images after the current gallery. Returns `None` when the
    /// product does not exist.
    pub async fn add_images(
        pool: &PgPool,
        id: i64,
        images: &[NewProductImage],
    ) -> Result<Option<Vec<ProductImage>>> {
        let mut tx = pool.begin().await.context("failed to begin transaction")?;

        let exists: Option<i64> =
            sqlx::query_scalar("SELECT id FROM products WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .context("failed to lock product")?;
        if exists.is_none() {
            return Ok(None);
        }

        let inserted = append_images(&mut tx, id, images).await?;
        tx.commit().await.context("failed to commit product images")?;

        Ok(Some(inserted))
    }

    /// Delete one gallery image. When it was the primary image, the next one
    /// in display order is promoted.
    pub async fn delete_image(
        pool: &PgPool,
        product_id: i64,
        image_id: i64,
    ) -> Result<Option<ProductImage>> {
        let mut tx = pool.begin().await.context("failed to begin transaction")?;

        let removed = sqlx::query_as::<_, ProductImage>(
            "DELETE FROM product_images WHERE id = $1 AND product_id = $2 RETURNING *",
        )
        .bind(image_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await
        .context("failed to delete product image")?;

        if removed.as_ref().is_some_and(|image| image.is_primary) {
            ensure_primary(&mut tx, product_id).await?;
        }

        tx.commit().await.context("failed to commit image delete")?;
        Ok(removed)
    }
}

impl ProductImage {
    /// Gallery in display order; the primary image wins a tie.
    pub async fn list_for_product(pool: &PgPool, product_id: i64) -> Result<Vec<Self>> {
        let images = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM product_images
            WHERE product_id = $1
            ORDER BY display_order, is_primary DESC, id
            "#,
        )
        .bind(product_id)
        .fetch_all(pool)
        .await
        .context("failed to list product images")?;

        Ok(images)
    }
}

/// Index of the image that becomes primary: the first one flagged, else the
/// first one submitted.
pub fn resolve_primary(images: &[NewProductImage]) -> Option<usize> {
    if images.is_empty() {
        return None;
    }
    Some(images.iter().position(|img| img.is_primary).unwrap_or(0))
}

/// Collapse duplicate ids, keeping first-seen order.
pub fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    unique
}

async fn insert_images(
    conn: &mut PgConnection,
    product_id: i64,
    images: &[NewProductImage],
    first_order: i32,
    primary: Option<usize>,
) -> Result<Vec<ProductImage>> {
    let mut inserted = Vec::with_capacity(images.len());

    for (i, image) in images.iter().enumerate() {
        let offset = i32::try_from(i).context("too many images")?;
        let row = sqlx::query_as::<_, ProductImage>(
            r#"
            INSERT INTO product_images (product_id, image_url, display_order, is_primary, alt_text)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(product_id)
        .bind(&image.image_url)
        .bind(first_order + offset)
        .bind(primary == Some(i))
        .bind(&image.alt_text)
        .fetch_one(&mut *conn)
        .await
        .context("failed to insert product image")?;
        inserted.push(row);
    }

    Ok(inserted)
}

/// Append after the current max `display_order`. New images only become
/// primary when the gallery has none.
async fn append_images(
    conn: &mut PgConnection,
    product_id: i64,
    images: &[NewProductImage],
) -> Result<Vec<ProductImage>> {
    let (max_order, has_primary): (i32, bool) = sqlx::query_as(
        r#"
        SELECT COALESCE(MAX(display_order), 0), COALESCE(BOOL_OR(is_primary), FALSE)
        FROM product_images
        WHERE product_id = $1
        "#,
    )
    .bind(product_id)
    .fetch_one(&mut *conn)
    .await
    .context("failed to read gallery state")?;

    let primary = if has_primary {
        None
    } else {
        resolve_primary(images)
    };

    insert_images(conn, product_id, images, max_order + 1, primary).await
}

/// Promote the first image when the gallery has no primary one.
async fn ensure_primary(conn: &mut PgConnection, product_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE product_images SET is_primary = TRUE
        WHERE id = (
            SELECT id FROM product_images
            WHERE product_id = $1
            ORDER BY display_order, id
            LIMIT 1
        )
        AND NOT EXISTS (
            SELECT 1 FROM product_images WHERE product_id = $1 AND is_primary
        )
        "#,
    )
    .bind(product_id)
    .execute(&mut *conn)
    .await
    .context("failed to promote primary image")?;

    Ok(())
}

/// Replace a product's association set: delete then insert.
async fn replace_links(
    conn: &mut PgConnection,
    link: Link,
    product_id: i64,
    ids: &[i64],
) -> Result<()> {
    sqlx::query(link.clear_sql())
        .bind(product_id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to clear {link:?} links"))?;

    let ids = dedup_ids(ids);
    if ids.is_empty() {
        return Ok(());
    }

    sqlx::query(link.insert_sql())
        .bind(product_id)
        .bind(&ids)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to insert {link:?} links"))?;

    Ok(())
}
