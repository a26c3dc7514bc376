//! LookMyImg upload client.
//!
//! Sends one multipart `POST` per file and pulls the hosted link out of
//! whatever the host answers with.

use super::extract::{extract_url, ResponseBody};
use super::{ImageHost, UploadError};
use crate::config::{
    Settings, UPLOAD_MAX_CONCURRENT, UPLOAD_POOL_MAX_IDLE, UPLOAD_TIMEOUT_SECS,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client as HttpClient;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// Header carrying the API key
const API_KEY_HEADER: &str = "X-API-Key";

/// Connection details for the upload endpoint
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Upload endpoint URL
    pub endpoint: String,
    /// API key sent with every request
    pub api_key: String,
    /// Multipart field name for the file
    pub file_field: String,
    /// Extra static form fields sent before the file
    pub extra_fields: Vec<(String, String)>,
}

impl HostConfig {
    /// Build the host configuration from application settings
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `EXTRA_FORM_FIELDS` cannot be parsed.
    pub fn from_settings(settings: &Settings) -> Result<Self, ::config::ConfigError> {
        Ok(Self {
            endpoint: settings.lookmyimg_endpoint.clone(),
            api_key: settings.lookmyimg_api_key.clone(),
            file_field: settings.form_file_field.clone(),
            extra_fields: settings.extra_form_fields()?,
        })
    }
}

/// HTTP client for the LookMyImg upload API
pub struct LookMyImgClient {
    http: HttpClient,
    config: HostConfig,
    permits: Semaphore,
}

impl LookMyImgClient {
    /// Create a client with the upload timeout, IPv4-only connections, a
    /// bounded idle pool and at most `UPLOAD_MAX_CONCURRENT` requests in flight.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: HostConfig) -> Result<Self, reqwest::Error> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            // Binding to 0.0.0.0 restricts outgoing connections to IPv4
            .local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
            .pool_max_idle_per_host(UPLOAD_POOL_MAX_IDLE)
            .build()?;
        Ok(Self {
            http,
            config,
            permits: Semaphore::new(UPLOAD_MAX_CONCURRENT),
        })
    }

    /// Replace the limit on concurrent upload requests
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.permits = Semaphore::new(max_concurrent.max(1));
        self
    }

    async fn build_form(&self, path: &Path) -> Result<Form, UploadError> {
        let mut form = Form::new();
        for (name, value) in &self.config.extra_fields {
            form = form.text(name.clone(), value.clone());
        }

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/octet-stream")?;

        Ok(form.part(self.config.file_field.clone(), part))
    }
}

#[async_trait]
impl ImageHost for LookMyImgClient {
    async fn upload(&self, path: &Path) -> Result<String, UploadError> {
        // The semaphore is never closed, so a permit is always granted
        let _permit = self.permits.acquire().await.ok();
        let form = self.build_form(path).await?;
        debug!(path = %path.display(), endpoint = %self.config.endpoint, "Uploading file");

        let response = self
            .http
            .post(&self.config.endpoint)
            .header(API_KEY_HEADER, &self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(UploadError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let body = ResponseBody::parse(text);
        if content_type.contains("application/json") && matches!(body, ResponseBody::Text(_)) {
            debug!(content_type = %content_type, "Host declared JSON but body did not parse");
        }

        match extract_url(&body) {
            Some(url) => {
                info!(url = %url, "Upload complete");
                Ok(url)
            }
            None => {
                let body = body.to_string();
                error!(body = %body, "Upload OK but no URL in response");
                Err(UploadError::UrlNotFound { body })
            }
        }
    }
}
