//! Asset resolution
//!
//! Maps an image URL to a local file, downloading it once into a shared cache
//! directory. The cache filename is derived deterministically from the URL,
//! so a second resolve of the same URL returns the cached path without any
//! network traffic.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("imgcap-enrich/", env!("CARGO_PKG_VERSION"));
const DOWNLOAD_TIMEOUT_SECS: u64 = 60;
const MAX_FILENAME_STEM: usize = 120;
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg"];
const DEFAULT_EXTENSION: &str = "jpg";

/// Asset retrieval errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Request failed before a response arrived
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// Remote answered with a non-success status
    #[error("Failed to get '{url}' ({status})")]
    Status { url: String, status: u16 },

    /// Cache directory or file could not be written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves image URLs to local files
#[async_trait]
pub trait AssetResolver: Send + Sync {
    /// Return a local path for `url`, fetching it if not yet cached
    async fn resolve(&self, url: &str) -> Result<PathBuf, FetchError>;
}

/// HTTP-backed resolver with an on-disk cache
pub struct HttpAssetResolver {
    http_client: reqwest::Client,
    cache_dir: PathBuf,
}

impl HttpAssetResolver {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            cache_dir: cache_dir.into(),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Cache location for a URL (whether or not it exists yet)
    pub fn cached_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(cache_filename(url))
    }

    async fn download(&self, url: &str, target: &Path) -> Result<(), FetchError> {
        tracing::info!(url = %url, "Downloading image");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        // Write beside the target, then rename, so a partial download is never
        // picked up as a cached asset
        let partial = target.with_file_name(format!(
            "{}.{}.part",
            cache_stem(url),
            uuid::Uuid::new_v4()
        ));
        if let Err(e) = tokio::fs::write(&partial, &bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&partial, target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        tracing::debug!(url = %url, bytes = bytes.len(), path = %target.display(), "Image cached");
        Ok(())
    }
}

#[async_trait]
impl AssetResolver for HttpAssetResolver {
    async fn resolve(&self, url: &str) -> Result<PathBuf, FetchError> {
        let path = self.cached_path(url);

        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(url = %url, path = %path.display(), "Image already cached");
            return Ok(path);
        }

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        self.download(url, &path).await?;
        Ok(path)
    }
}

/// Filesystem-safe stem derived from a URL
///
/// Lower-cased, `https://` dropped, every run of characters outside
/// `[a-z0-9]` collapsed to `_`, truncated to 120 characters.
pub fn cache_stem(url: &str) -> String {
    let lower = url.to_lowercase().replace("https://", "");
    let mut stem = String::with_capacity(lower.len());
    let mut in_run = false;
    for c in lower.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            stem.push(c);
            in_run = false;
        } else if !in_run {
            stem.push('_');
            in_run = true;
        }
    }
    stem.truncate(MAX_FILENAME_STEM);
    stem
}

/// Image extension named in the URL, `jpg` when none is recognized
///
/// The extension must be followed by `?`, `#` or the end of the URL.
pub fn image_extension(url: &str) -> &'static str {
    let lower = url.to_ascii_lowercase();
    for (dot, _) in lower.match_indices('.') {
        let rest = &lower[dot + 1..];
        for &ext in IMAGE_EXTENSIONS {
            if let Some(after) = rest.strip_prefix(ext) {
                if after.is_empty() || after.starts_with('?') || after.starts_with('#') {
                    return ext;
                }
            }
        }
    }
    DEFAULT_EXTENSION
}

/// Full cache filename for a URL
pub fn cache_filename(url: &str) -> String {
    format!("{}.{}", cache_stem(url), image_extension(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stem_sanitizes() {
        assert_eq!(
            cache_stem("https://Cdn.Example.com/img/Logo-1.PNG?v=2"),
            "cdn_example_com_img_logo_1_png_v_2"
        );
    }

    #[test]
    fn test_cache_stem_truncates() {
        let url = format!("https://x.com/{}", "a".repeat(300));
        assert_eq!(cache_stem(&url).len(), 120);
    }

    #[test]
    fn test_image_extension_detection() {
        assert_eq!(image_extension("https://x.com/a.png"), "png");
        assert_eq!(image_extension("https://x.com/a.JPEG?w=100"), "jpeg");
        assert_eq!(image_extension("https://x.com/a.webp#frag"), "webp");
        assert_eq!(image_extension("https://x.com/a.png.html"), "jpg");
        assert_eq!(image_extension("https://x.com/image"), "jpg");
    }

    #[test]
    fn test_cache_filename_is_deterministic() {
        let url = "https://x.com/photos/a.gif";
        assert_eq!(cache_filename(url), cache_filename(url));
        assert_eq!(cache_filename(url), "x_com_photos_a_gif.gif");
    }
}
