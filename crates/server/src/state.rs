//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::catalog::{CatalogService, PageLimits};
use crate::config::Config;
use crate::db;
use crate::file::{LocalFileStorage, MediaService};
use crate::middleware::RateLimiter;
use crate::services::{EmailService, TokenService};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// PostgreSQL connection pool.
    db: PgPool,

    /// Page size bounds for list endpoints.
    page_limits: PageLimits,

    /// Read side of the catalog.
    catalog: CatalogService,

    /// JWT issuing and verification.
    tokens: TokenService,

    /// Image validation and storage.
    media: MediaService,

    /// Contact form rate limiter.
    contact_limiter: RateLimiter,

    /// Email delivery (available when SMTP_HOST is configured).
    email: Option<Arc<EmailService>>,
}

impl AppState {
    /// Connect to the database, apply migrations and build the state.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        db::run_migrations(&db)
            .await
            .context("failed to run migrations")?;

        Self::with_pool(config, db)
    }

    /// Build the state around an existing pool. No queries are issued.
    pub fn with_pool(config: &Config, db: PgPool) -> Result<Self> {
        let storage = LocalFileStorage::new(config.uploads_dir.clone(), config.files_url.clone());
        let media = MediaService::new(Arc::new(storage));

        let email = EmailService::from_config(config)
            .context("failed to configure email")?
            .map(Arc::new);
        if email.is_some() {
            info!("email service enabled");
        } else {
            info!("SMTP_HOST not set, contact form disabled");
        }

        let page_limits = PageLimits {
            default_limit: config.default_page_size,
            max_limit: config.max_page_size,
        };

        Ok(Self {
            inner: Arc::new(AppStateInner {
                catalog: CatalogService::new(db.clone()),
                db,
                page_limits,
                tokens: TokenService::new(config.jwt_secret.as_bytes(), config.jwt_ttl),
                media,
                contact_limiter: RateLimiter::contact(),
                email,
            }),
        })
    }

    /// Get the database pool.
    pub fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub fn page_limits(&self) -> PageLimits {
        self.inner.page_limits
    }

    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    pub fn media(&self) -> &MediaService {
        &self.inner.media
    }

    pub fn contact_limiter(&self) -> &RateLimiter {
        &self.inner.contact_limiter
    }

    /// Get the email service (None if SMTP is not configured).
    pub fn email(&self) -> Option<&Arc<EmailService>> {
        self.inner.email.as_ref()
    }

    /// Check if PostgreSQL is healthy.
    pub async fn postgres_healthy(&self) -> bool {
        db::check_health(&self.inner.db).await
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("page_limits", &self.inner.page_limits)
            .field("email", &self.inner.email.is_some())
            .finish_non_exhaustive()
    }
}
