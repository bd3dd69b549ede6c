//! Free-form product tags ("boda", "regalo", ...).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::DeleteOutcome;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTag {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTag {
    pub name: Option<String>,
    pub slug: Option<String>,
}

impl Tag {
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let tags = sqlx::query_as::<_, Self>("SELECT * FROM tags ORDER BY name, id")
            .fetch_all(pool)
            .await
            .context("failed to list tags")?;

        Ok(tags)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let tag = sqlx::query_as::<_, Self>("SELECT * FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch tag")?;

        Ok(tag)
    }

    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>> {
        let tag = sqlx::query_as::<_, Self>("SELECT * FROM tags WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await
            .context("failed to fetch tag by slug")?;

        Ok(tag)
    }

    pub async fn list_for_product(pool: &PgPool, product_id: i64) -> Result<Vec<Self>> {
        let tags = sqlx::query_as::<_, Self>(
            r#"
            SELECT t.*
            FROM tags t
            JOIN product_tags pt ON pt.tag_id = t.id
            WHERE pt.product_id = $1
            ORDER BY t.name, t.id
            "#,
        )
        .bind(product_id)
        .fetch_all(pool)
        .await
        .context("failed to list product tags")?;

        Ok(tags)
    }

    pub async fn create(pool: &PgPool, input: CreateTag) -> Result<Self> {
        let tag = sqlx::query_as::<_, Self>(
            "INSERT INTO tags (name, slug) VALUES ($1, $2) RETURNING *",
        )
        .bind(&input.name)
        .bind(&input.slug)
        .fetch_one(pool)
        .await
        .context("failed to create tag")?;

        Ok(tag)
    }

    pub async fn update(pool: &PgPool, id: i64, input: UpdateTag) -> Result<Option<Self>> {
        let tag = sqlx::query_as::<_, Self>(
            r#"
            UPDATE tags
            SET name = COALESCE($1, name),
                slug = COALESCE($2, slug),
                updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.slug)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to update tag")?;

        Ok(tag)
    }

    /// Delete a tag unless products are still linked to it.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<DeleteOutcome> {
        let mut tx = pool.begin().await.context("failed to begin transaction")?;

        let dependents: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM product_tags WHERE tag_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .context("failed to count tag links")?;

        if dependents > 0 {
            return Ok(DeleteOutcome::InUse { dependents });
        }

        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("failed to delete tag")?;

        tx.commit().await.context("failed to commit tag delete")?;

        Ok(if result.rows_affected() > 0 {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NotFound
        })
    }
}
