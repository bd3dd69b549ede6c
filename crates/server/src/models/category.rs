//! Product categories.
//!
//! Every product belongs to exactly one category; a category cannot be
//! deleted while a product still points at it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::DeleteOutcome;

/// A product category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// Unique URL segment used by the storefront filter.
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Input for updating a category. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl Category {
    /// List all categories ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let categories = sqlx::query_as::<_, Self>("SELECT * FROM categories ORDER BY name, id")
            .fetch_all(pool)
            .await
            .context("failed to list categories")?;

        Ok(categories)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let category = sqlx::query_as::<_, Self>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch category")?;

        Ok(category)
    }

    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>> {
        let category = sqlx::query_as::<_, Self>("SELECT * FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await
            .context("failed to fetch category by slug")?;

        Ok(category)
    }

    /// Create a new category.
    pub async fn create(pool: &PgPool, input: CreateCategory) -> Result<Self> {
        let category = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO categories (name, slug, description, image_url)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(&input.image_url)
        .fetch_one(pool)
        .await
        .context("failed to create category")?;

        Ok(category)
    }

    /// Update a category. Returns `None` when it does not exist.
    pub async fn update(pool: &PgPool, id: i64, input: UpdateCategory) -> Result<Option<Self>> {
        let category = sqlx::query_as::<_, Self>(
            r#"
            UPDATE categories
            SET name = COALESCE($1, name),
                slug = COALESCE($2, slug),
                description = COALESCE($3, description),
                image_url = COALESCE($4, image_url),
                updated_at = NOW()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(&input.image_url)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to update category")?;

        Ok(category)
    }

    /// Delete a category unless products or collections still reference it.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<DeleteOutcome> {
        let mut tx = pool.begin().await.context("failed to begin transaction")?;

        let dependents: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM products WHERE category_id = $1)
                 + (SELECT COUNT(*) FROM collections WHERE category_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("failed to count category dependents")?;

        if dependents > 0 {
            return Ok(DeleteOutcome::InUse { dependents });
        }

        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("failed to delete category")?;

        tx.commit().await.context("failed to commit category delete")?;

        Ok(if result.rows_affected() > 0 {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NotFound
        })
    }
}
