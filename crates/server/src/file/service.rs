//! Image upload service: validation, resizing, naming and storage.

use std::sync::Arc;

use rand::Rng;
use rand::distributions::Alphanumeric;
use thiserror::Error;
use tracing::{debug, warn};

use super::image::{ImageError, process_image};
use super::storage::FileStorage;

/// Errors while accepting an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Invalid(#[from] ImageError),

    #[error("failed to store file")]
    Storage(#[source] anyhow::Error),
}

/// Stores catalog images and removes them when their rows go away.
#[derive(Clone)]
pub struct MediaService {
    storage: Arc<dyn FileStorage>,
}

impl MediaService {
    pub fn new(storage: Arc<dyn FileStorage>) -> Self {
        Self { storage }
    }

    /// Validate and store one image under `folder`, named after `slug`.
    /// Returns the public URL.
    pub async fn store_image(
        &self,
        folder: &str,
        slug: &str,
        data: Vec<u8>,
    ) -> Result<String, UploadError> {
        let processed = tokio::task::spawn_blocking(move || process_image(&data))
            .await
            .map_err(|e| UploadError::Storage(anyhow::anyhow!("image worker failed: {e}")))??;

        let key = format!(
            "{folder}/{}",
            unique_filename(slug, processed.extension)
        );
        self.storage
            .write(&key, &processed.bytes)
            .await
            .map_err(UploadError::Storage)?;

        debug!(
            key = %key,
            width = processed.width,
            height = processed.height,
            "image stored"
        );
        Ok(self.storage.public_url(&key))
    }

    /// Delete stored files by public URL. Failures are logged, never
    /// surfaced; URLs the backend does not own are skipped.
    pub async fn remove_urls(&self, urls: &[String]) {
        for url in urls {
            let Some(key) = self.storage.key_from_url(url) else {
                debug!(url = %url, "skipping delete of foreign image URL");
                continue;
            };
            if let Err(e) = self.storage.delete(&key).await {
                warn!(url = %url, error = %e, "failed to delete stored image");
            }
        }
    }
}

impl std::fmt::Debug for MediaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaService").finish_non_exhaustive()
    }
}

/// `{slug}-{timestamp}-{random}.{ext}` with the slug reduced to `[a-z0-9-]`.
pub fn unique_filename(slug: &str, extension: &str) -> String {
    let mut base: String = slug
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .take(80)
        .collect();
    if base.is_empty() {
        base.push_str("image");
    }

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();

    format!(
        "{base}-{}-{suffix}.{extension}",
        chrono::Utc::now().timestamp_millis()
    )
}
