//! Storefront collections: image tiles that link to a category listing.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// A collection joined with its category's name and slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Collection {
    pub id: i64,
    pub category_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub category_name: String,
    pub category_slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCollection {
    pub category_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCollection {
    pub category_id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

/// New position of one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CollectionOrder {
    pub id: i64,
    pub display_order: i32,
}

/// Columns selected by every read.
const SELECT_JOINED: &str = r#"
    SELECT col.*, c.name AS category_name, c.slug AS category_slug
    FROM collections col
    JOIN categories c ON c.id = col.category_id
"#;

impl Collection {
    /// Active collections in display order, for the storefront.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>> {
        let sql = format!("{SELECT_JOINED} WHERE col.is_active = TRUE ORDER BY col.display_order, col.id");
        let collections = sqlx::query_as::<_, Self>(&sql)
            .fetch_all(pool)
            .await
            .context("failed to list active collections")?;

        Ok(collections)
    }

    /// Every collection, for the back office.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>> {
        let sql = format!(
            "{SELECT_JOINED} ORDER BY col.display_order ASC, col.created_at DESC, col.id DESC"
        );
        let collections = sqlx::query_as::<_, Self>(&sql)
            .fetch_all(pool)
            .await
            .context("failed to list collections")?;

        Ok(collections)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let sql = format!("{SELECT_JOINED} WHERE col.id = $1");
        let collection = sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch collection")?;

        Ok(collection)
    }

    pub async fn create(pool: &PgPool, input: CreateCollection) -> Result<Self> {
        let collection = sqlx::query_as::<_, Self>(
            r#"
            WITH inserted AS (
                INSERT INTO collections
                    (category_id, title, description, image_url, display_order, is_active)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT i.*, c.name AS category_name, c.slug AS category_slug
            FROM inserted i
            JOIN categories c ON c.id = i.category_id
            "#,
        )
        .bind(input.category_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.image_url)
        .bind(input.display_order.unwrap_or(0))
        .bind(input.is_active.unwrap_or(true))
        .fetch_one(pool)
        .await
        .context("failed to create collection")?;

        Ok(collection)
    }

    /// Partial update. Returns the updated collection and, when the image was
    /// replaced, the previous image URL.
    pub async fn update(
        pool: &PgPool,
        id: i64,
        input: UpdateCollection,
    ) -> Result<Option<(Self, Option<String>)>> {
        let mut tx = pool.begin().await.context("failed to begin transaction")?;

        let previous_image: Option<String> =
            sqlx::query_scalar("SELECT image_url FROM collections WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .context("failed to lock collection")?;
        let Some(previous_image) = previous_image else {
            return Ok(None);
        };

        let collection = sqlx::query_as::<_, Self>(
            r#"
            WITH updated AS (
                UPDATE collections
                SET category_id = COALESCE($1, category_id),
                    title = COALESCE($2, title),
                    description = COALESCE($3, description),
                    image_url = COALESCE($4, image_url),
                    display_order = COALESCE($5, display_order),
                    is_active = COALESCE($6, is_active),
                    updated_at = NOW()
                WHERE id = $7
                RETURNING *
            )
            SELECT u.*, c.name AS category_name, c.slug AS category_slug
            FROM updated u
            JOIN categories c ON c.id = u.category_id
            "#,
        )
        .bind(input.category_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.image_url)
        .bind(input.display_order)
        .bind(input.is_active)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("failed to update collection")?;

        tx.commit().await.context("failed to commit collection update")?;

        let replaced = (collection.image_url != previous_image).then_some(previous_image);
        Ok(Some((collection, replaced)))
    }

    /// Delete a collection, returning its image URL.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<Option<String>> {
        let image_url: Option<String> =
            sqlx::query_scalar("DELETE FROM collections WHERE id = $1 RETURNING image_url")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("failed to delete collection")?;

        Ok(image_url)
    }

    /// Apply many `display_order` changes atomically. Returns how many
    /// collections were updated.
    pub async fn reorder(pool: &PgPool, orders: &[CollectionOrder]) -> Result<u64> {
        let mut tx = pool.begin().await.context("failed to begin transaction")?;
        let mut updated = 0;

        for order in orders {
            let result = sqlx::query(
                "UPDATE collections SET display_order = $1, updated_at = NOW() WHERE id = $2",
            )
            .bind(order.display_order)
            .bind(order.id)
            .execute(&mut *tx)
            .await
            .context("failed to reorder collection")?;
            updated += result.rows_affected();
        }

        tx.commit().await.context("failed to commit collection order")?;
        Ok(updated)
    }
}
