//! File storage backends.
//!
//! Files are addressed by a relative key such as
//! `products/anillo-sol-1718000000000-a1b2c3.jpg`; the backend maps keys to
//! its own location and to a public URL.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// File storage backend trait.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Write data under `key`, creating parent folders as needed.
    async fn write(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Delete the file under `key`. A missing file is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Public URL for `key`.
    fn public_url(&self, key: &str) -> String;

    /// Inverse of [`public_url`](Self::public_url). `None` for URLs this
    /// backend does not own.
    fn key_from_url(&self, url: &str) -> Option<String>;
}

/// Local filesystem storage.
pub struct LocalFileStorage {
    /// Base path for file storage.
    base_path: PathBuf,
    /// Base URL for public file access.
    base_url: String,
}

impl LocalFileStorage {
    pub fn new(base_path: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a key to a path under the base directory.
    ///
    /// Rejects absolute keys and `..` components to prevent directory
    /// traversal.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        if key.is_empty() {
            anyhow::bail!("empty storage key");
        }
        for component in relative.components() {
            if !matches!(component, Component::Normal(_)) {
                anyhow::bail!("storage key must be a plain relative path: {key}");
            }
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("failed to create directories")?;
        }

        let mut file = fs::File::create(&path)
            .await
            .context("failed to create file")?;
        file.write_all(data).await.context("failed to write file")?;
        file.flush().await.context("failed to flush file")?;

        debug!(key = %key, path = ?path, size = data.len(), "file written");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "file deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(key = %key, "file not found for deletion");
                Ok(())
            }
            Err(e) => Err(e).context("failed to delete file"),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        let key = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
        (!key.is_empty()).then(|| key.to_string())
    }
}

impl std::fmt::Debug for LocalFileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFileStorage")
            .field("base_path", &self.base_path)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("alahas-storage-{}", uuid::Uuid::now_v7()))
    }

    fn temp_storage() -> LocalFileStorage {
        LocalFileStorage::new(temp_dir(), "/uploads/")
    }

    #[test]
    fn traversal_keys_are_rejected() {
        let storage = temp_storage();
        assert!(storage.resolve("../etc/passwd").is_err());
        assert!(storage.resolve("products/../../x").is_err());
        assert!(storage.resolve("/etc/passwd").is_err());
        assert!(storage.resolve("").is_err());
        assert!(storage.resolve("products/a.jpg").is_ok());
    }

    #[test]
    fn urls_and_keys_are_inverse() {
        let storage = temp_storage();
        let url = storage.public_url("products/a.jpg");
        assert_eq!(url, "/uploads/products/a.jpg");
        assert_eq!(storage.key_from_url(&url).as_deref(), Some("products/a.jpg"));
        assert_eq!(storage.key_from_url("https://cdn.example.com/a.jpg"), None);
        assert_eq!(storage.key_from_url("/uploads/"), None);
    }

    #[tokio::test]
    async fn write_then_delete() {
        let dir = temp_dir();
        let storage = LocalFileStorage::new(&dir, "/uploads/");
        storage.write("products/a.bin", b"hello").await.unwrap();

        let path = dir.join("products/a.bin");
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");

        storage.delete("products/a.bin").await.unwrap();
        assert!(!path.exists());

        // Deleting again is not an error.
        storage.delete("products/a.bin").await.unwrap();

        std::fs::remove_dir_all(&dir).ok();
    }
}
