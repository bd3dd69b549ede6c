//! Materials (gold, silver, ...) linked many-to-many with products.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::DeleteOutcome;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Material {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMaterial {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMaterial {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
}

impl Material {
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let materials = sqlx::query_as::<_, Self>("SELECT * FROM materials ORDER BY name, id")
            .fetch_all(pool)
            .await
            .context("failed to list materials")?;

        Ok(materials)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let material = sqlx::query_as::<_, Self>("SELECT * FROM materials WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch material")?;

        Ok(material)
    }

    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>> {
        let material = sqlx::query_as::<_, Self>("SELECT * FROM materials WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await
            .context("failed to fetch material by slug")?;

        Ok(material)
    }

    /// Materials linked to a product, ordered by name.
    pub async fn list_for_product(pool: &PgPool, product_id: i64) -> Result<Vec<Self>> {
        let materials = sqlx::query_as::<_, Self>(
            r#"
            SELECT m.*
            FROM materials m
            JOIN product_materials pm ON pm.material_id = m.id
            WHERE pm.product_id = $1
            ORDER BY m.name, m.id
            "#,
        )
        .bind(product_id)
        .fetch_all(pool)
        .await
        .context("failed to list product materials")?;

        Ok(materials)
    }

    pub async fn create(pool: &PgPool, input: CreateMaterial) -> Result<Self> {
        let material = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO materials (name, slug, description)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .fetch_one(pool)
        .await
        .context("failed to create material")?;

        Ok(material)
    }

    pub async fn update(pool: &PgPool, id: i64, input: UpdateMaterial) -> Result<Option<Self>> {
        let material = sqlx::query_as::<_, Self>(
            r#"
            UPDATE materials
            SET name = COALESCE($1, name),
                slug = COALESCE($2, slug),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to update material")?;

        Ok(material)
    }

    /// Delete a material unless products are still linked to it.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<DeleteOutcome> {
        let mut tx = pool.begin().await.context("failed to begin transaction")?;

        let dependents: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM product_materials WHERE material_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .context("failed to count material links")?;

        if dependents > 0 {
            return Ok(DeleteOutcome::InUse { dependents });
        }

        let result = sqlx::query("DELETE FROM materials WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("failed to delete material")?;

        tx.commit().await.context("failed to commit material delete")?;

        Ok(if result.rows_affected() > 0 {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NotFound
        })
    }
}
