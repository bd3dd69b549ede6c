//! Catalog read service: product listings and product detail.

use anyhow::Context;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, warn};

use super::filter::{FilterError, ProductFilter};
use super::pagination::Pagination;
use super::query_builder::ProductQueryBuilder;
use super::view::{ProductDetail, ProductListItem, ProductListRow};
use crate::db::pg_arguments;
use crate::models::{Category, Material, Product, ProductImage, Tag};

/// Errors from catalog reads.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    InvalidFilter(#[from] FilterError),

    #[error("catalog query failed")]
    QueryFailed(#[from] anyhow::Error),
}

/// One page of products.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub items: Vec<ProductListItem>,
    pub pagination: Pagination,
}

/// Executes listing and detail reads.
#[derive(Clone)]
pub struct CatalogService {
    pool: PgPool,
}

impl CatalogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the page and count queries for `filter`.
    ///
    /// Both statements run in one read-only repeatable-read transaction so the
    /// total and the rows describe the same snapshot.
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<ProductPage, CatalogError> {
        if filter.limit == 0 {
            return Err(FilterError::ZeroLimit.into());
        }

        let builder = ProductQueryBuilder::new(filter);
        let (count_sql, count_values) = builder.build_count();
        let (rows_sql, rows_values) = builder.build();

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .context("failed to set transaction mode")?;

        sqlx::query("SET LOCAL statement_timeout = '10s'")
            .execute(&mut *tx)
            .await
            .context("failed to set statement timeout")?;

        let total: i64 = sqlx::query_scalar_with(&count_sql, pg_arguments(&count_values)?)
            .fetch_one(&mut *tx)
            .await
            .context("failed to execute product count query")?;

        let rows = sqlx::query_as_with::<_, ProductListRow, _>(&rows_sql, pg_arguments(&rows_values)?)
            .fetch_all(&mut *tx)
            .await
            .context("failed to execute product query")?;

        tx.commit()
            .await
            .context("failed to commit query transaction")?;

        let total = u64::try_from(total).unwrap_or_default();
        let pagination = Pagination::new(filter.page, filter.limit, total)?;

        if rows.len() as u64 != pagination.expected_rows() {
            warn!(
                rows = rows.len(),
                expected = pagination.expected_rows(),
                "product page size disagrees with count"
            );
        }

        debug!(
            total,
            page = filter.page,
            limit = filter.limit,
            "product listing executed"
        );

        Ok(ProductPage {
            items: rows.into_iter().map(ProductListItem::from).collect(),
            pagination,
        })
    }

    /// Storefront detail by slug; inactive products are not found.
    pub async fn product_by_slug(&self, slug: &str) -> Result<Option<ProductDetail>, CatalogError> {
        let Some(product) = Product::find_active_by_slug(&self.pool, slug).await? else {
            return Ok(None);
        };
        self.detail(product).await
    }

    /// Back-office detail by id, regardless of `is_active`.
    pub async fn product_by_id(&self, id: i64) -> Result<Option<ProductDetail>, CatalogError> {
        let Some(product) = Product::find_by_id(&self.pool, id).await? else {
            return Ok(None);
        };
        self.detail(product).await
    }

    async fn detail(&self, product: Product) -> Result<Option<ProductDetail>, CatalogError> {
        let (category, images, materials, tags) = tokio::try_join!(
            Category::find_by_id(&self.pool, product.category_id),
            ProductImage::list_for_product(&self.pool, product.id),
            Material::list_for_product(&self.pool, product.id),
            Tag::list_for_product(&self.pool, product.id),
        )?;

        // The FK makes a missing category impossible unless a delete raced us.
        let Some(category) = category else {
            return Ok(None);
        };

        Ok(Some(ProductDetail::assemble(
            product, category, images, materials, tags,
        )))
    }
}
