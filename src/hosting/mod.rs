//! Image host abstraction.
//!
//! The bot only needs one operation from a host: take a local file and return
//! a public URL for it.

/// URL discovery in loosely shaped host responses
pub mod extract;
/// LookMyImg (Chevereto-style) multipart upload client
pub mod lookmyimg;

pub use extract::{extract_url, extract_url_from_value, ResponseBody};
pub use lookmyimg::{HostConfig, LookMyImgClient};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while uploading a staged file
#[derive(Error, Debug)]
pub enum UploadError {
    /// The host answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Http {
        /// Response status code
        status: u16,
        /// Full response body text
        body: String,
    },
    /// DNS resolution or TCP connection to the host failed
    #[error("{0}")]
    Connect(#[source] reqwest::Error),
    /// Any other request failure (timeout, body read, bad header)
    #[error("Request error: {0}")]
    Request(#[source] reqwest::Error),
    /// The upload returned 2xx but no URL could be found in the body
    #[error("Upload succeeded but URL not found in response.")]
    UrlNotFound {
        /// Response body as received
        body: String,
    },
    /// The staged file could not be read
    #[error("Failed to read staged file: {0}")]
    File(#[from] std::io::Error),
}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            Self::Connect(e)
        } else {
            Self::Request(e)
        }
    }
}

/// Interface for image hosts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload the file at `path` and return its public URL
    async fn upload(&self, path: &Path) -> Result<String, UploadError>;
}
