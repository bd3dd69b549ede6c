//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Minimum accepted length of the JWT signing secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 20).
    pub database_max_connections: u32,

    /// How long a request waits for a pooled connection (default: 5s).
    pub database_acquire_timeout: Duration,

    /// HS256 signing secret for admin tokens.
    pub jwt_secret: String,

    /// Admin token lifetime (default: 7 days).
    pub jwt_ttl: Duration,

    /// Path to uploads directory (default: ./uploads).
    pub uploads_dir: PathBuf,

    /// Base URL for serving uploaded files (default: /uploads).
    pub files_url: String,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Page size used when a listing request does not supply `limit`.
    pub default_page_size: u32,

    /// Upper bound applied to a requested `limit`.
    pub max_page_size: u32,

    /// SMTP host for the contact form. When None, the contact form answers 503.
    pub smtp_host: Option<String>,

    /// SMTP port (default: 587).
    pub smtp_port: u16,

    /// SMTP username for authentication.
    pub smtp_username: Option<String>,

    /// SMTP password for authentication.
    pub smtp_password: Option<String>,

    /// SMTP encryption mode: "starttls" (default), "tls", or "none".
    pub smtp_encryption: String,

    /// From address for outgoing email.
    pub mail_from: String,

    /// Mailbox that receives contact form submissions (default: `mail_from`).
    pub mail_to: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let acquire_secs: u64 = env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .context("DATABASE_ACQUIRE_TIMEOUT_SECS must be a valid u64")?;

        let jwt_secret =
            env::var("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes long");
        }

        let jwt_ttl_secs: u64 = env::var("JWT_TTL_SECS")
            .unwrap_or_else(|_| "604800".to_string())
            .parse()
            .context("JWT_TTL_SECS must be a valid u64")?;

        let uploads_dir = env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));

        let files_url =
            normalize_files_url(&env::var("FILES_URL").unwrap_or_else(|_| "/uploads".to_string()))?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let default_page_size: u32 = env::var("DEFAULT_PAGE_SIZE")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .context("DEFAULT_PAGE_SIZE must be a valid u32")?;

        let max_page_size: u32 = env::var("MAX_PAGE_SIZE")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .context("MAX_PAGE_SIZE must be a valid u32")?;

        if default_page_size == 0 || max_page_size == 0 {
            anyhow::bail!("DEFAULT_PAGE_SIZE and MAX_PAGE_SIZE must be greater than zero");
        }

        let smtp_host = env::var("SMTP_HOST").ok().filter(|h| !h.trim().is_empty());

        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse()
            .context("SMTP_PORT must be a valid u16")?;

        let smtp_username = env::var("SMTP_USERNAME").ok();
        let smtp_password = env::var("SMTP_PASSWORD").ok();

        let smtp_encryption = env::var("SMTP_ENCRYPTION")
            .unwrap_or_else(|_| "starttls".to_string())
            .to_lowercase();

        let mail_from = env::var("MAIL_FROM").unwrap_or_else(|_| "noreply@localhost".to_string());
        let mail_to = env::var("MAIL_TO").unwrap_or_else(|_| mail_from.clone());

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            database_acquire_timeout: Duration::from_secs(acquire_secs),
            jwt_secret,
            jwt_ttl: Duration::from_secs(jwt_ttl_secs),
            uploads_dir,
            files_url,
            cors_allowed_origins,
            default_page_size: default_page_size.min(max_page_size),
            max_page_size,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            smtp_encryption,
            mail_from,
            mail_to,
        })
    }
}

/// Uploaded files are mounted below the root: `/uploads/` becomes `/uploads`;
/// `/` and relative paths are refused.
fn normalize_files_url(raw: &str) -> Result<String> {
    let url = raw.trim().trim_end_matches('/');
    if !url.starts_with('/') || url.len() < 2 {
        anyhow::bail!("FILES_URL must be an absolute path below the root, such as /uploads");
    }
    Ok(url.to_string())
}
