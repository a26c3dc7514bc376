//! Download of incoming media into private temporary directories.
//!
//! Every file gets its own `lookmyimg_<uuid>` directory so album members with
//! the same name never collide. The directory is removed when the
//! [`StagedFile`] is cleaned up or dropped; removal failures are only logged.

use super::media::MediaItem;
use super::transport::ChatTransport;
use crate::config::Settings;
use crate::utils::bytes_to_mb;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Errors raised while staging or validating a file
#[derive(Error, Debug)]
pub enum StagingError {
    /// Extension not in the allow-list
    #[error("Unsupported file type: {ext}. Allowed: {}", .allowed.join(", "))]
    UnsupportedExtension {
        /// Offending extension with leading dot
        ext: String,
        /// Allowed extensions
        allowed: Vec<String>,
    },
    /// File exceeds the configured size limit
    #[error("File too large: {size_mb:.1} MB > {max_mb} MB")]
    TooLarge {
        /// Measured size in megabytes
        size_mb: f64,
        /// Configured limit in megabytes
        max_mb: f64,
    },
    /// Telegram download failed
    #[error("Download failed: {0}")]
    Download(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Telegram download did not finish in time
    #[error("Download timed out after {0} s")]
    DownloadTimeout(u64),
    /// Local filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Temporary directory removed on drop
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
    released: bool,
}

impl StagingDir {
    /// Create a fresh, uniquely named directory under the system temp dir
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory cannot be created.
    pub async fn create() -> std::io::Result<Self> {
        let path = std::env::temp_dir().join(format!(
            "lookmyimg_{}",
            Uuid::new_v4().as_simple()
        ));
        tokio::fs::create_dir(&path).await?;
        Ok(Self {
            path,
            released: false,
        })
    }

    /// Directory path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory without blocking the runtime, ignoring failures
    pub async fn remove(mut self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(path = %self.path.display(), error = %e, "Failed to remove staging dir");
            }
        }
        self.released = true;
    }
}

// Fallback for error paths that drop the directory without `remove`
impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(path = %self.path.display(), error = %e, "Failed to remove staging dir");
            }
        }
    }
}

/// A downloaded file living in its own staging directory
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    dir: StagingDir,
}

impl StagedFile {
    /// Local path of the file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file and its directory, ignoring failures
    pub async fn cleanup(self) {
        self.dir.remove().await;
    }
}

/// Downloads media and enforces the extension and size limits
#[derive(Debug, Clone)]
pub struct FileStager {
    allowed_exts: Vec<String>,
    max_file_mb: f64,
    download_timeout: Duration,
}

impl FileStager {
    /// Create a stager.
    ///
    /// `allowed_exts` are lower-case with a leading dot.
    #[must_use]
    pub const fn new(allowed_exts: Vec<String>, max_file_mb: f64, download_timeout: Duration) -> Self {
        Self {
            allowed_exts,
            max_file_mb,
            download_timeout,
        }
    }

    /// Build a stager from application settings
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.allowed_exts(),
            settings.max_file_mb,
            settings.download_timeout(),
        )
    }

    /// Allowed extensions
    #[must_use]
    pub fn allowed_exts(&self) -> &[String] {
        &self.allowed_exts
    }

    /// Size limit in megabytes
    #[must_use]
    pub const fn max_file_mb(&self) -> f64 {
        self.max_file_mb
    }

    /// Download `item` into a new staging directory and validate it
    ///
    /// # Errors
    ///
    /// Returns a `StagingError` if the download fails or the file breaks a limit.
    /// The staging directory is removed before the error is returned.
    pub async fn download_and_validate(
        &self,
        transport: &dyn ChatTransport,
        item: &MediaItem,
    ) -> Result<StagedFile, StagingError> {
        let dir = StagingDir::create().await?;
        let path = dir.path().join(item.file_name());

        tokio::time::timeout(self.download_timeout, transport.download(item.file_id(), &path))
            .await
            .map_err(|_| StagingError::DownloadTimeout(self.download_timeout.as_secs()))?
            .map_err(|e| StagingError::Download(e.into()))?;

        self.validate(&path).await?;
        Ok(StagedFile { path, dir })
    }

    /// Check extension and size of a local file
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedExtension`, `TooLarge`, or `Io` if the file cannot be inspected.
    pub async fn validate(&self, path: &Path) -> Result<(), StagingError> {
        let ext = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        if !self.allowed_exts.contains(&ext) {
            return Err(StagingError::UnsupportedExtension {
                ext: if ext.is_empty() { "(none)".to_string() } else { ext },
                allowed: self.allowed_exts.clone(),
            });
        }

        let size_mb = bytes_to_mb(tokio::fs::metadata(path).await?.len());
        if size_mb > self.max_file_mb {
            return Err(StagingError::TooLarge {
                size_mb,
                max_mb: self.max_file_mb,
            });
        }
        Ok(())
    }
}
