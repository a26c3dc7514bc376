//! Configuration and settings management
//!
//! Loads settings from environment variables (and optional config files) and
//! defines the upload constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Default LookMyImg upload endpoint
pub const DEFAULT_ENDPOINT: &str = "https://lookmyimg.com/api/1/upload";
/// Default multipart field carrying the file
pub const DEFAULT_FORM_FILE_FIELD: &str = "source";
/// Default maximum file size in megabytes
pub const DEFAULT_MAX_FILE_MB: f64 = 30.0;
/// The single administrator allowed to use the bot
pub const DEFAULT_ADMIN_ID: i64 = 6_167_872_503;
/// Image extensions accepted when `ALLOWED_EXTS` is not set
pub const DEFAULT_ALLOWED_EXTS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp"];

/// Total timeout of one upload request
pub const UPLOAD_TIMEOUT_SECS: u64 = 180;
/// Maximum idle connections kept per upload host
pub const UPLOAD_POOL_MAX_IDLE: usize = 100;
/// Maximum upload requests in flight at once
pub const UPLOAD_MAX_CONCURRENT: usize = 100;
/// How long an album key suppresses duplicate processing
pub const ALBUM_TTL_SECS: u64 = 180;
/// Characters of an error body shown to the user
pub const ERROR_DETAILS_MAX_CHARS: usize = 500;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(default)]
    pub bot_token: String,

    /// API key sent as `X-API-Key`
    #[serde(default)]
    pub lookmyimg_api_key: String,

    /// Upload endpoint URL
    #[serde(default = "default_endpoint")]
    pub lookmyimg_endpoint: String,

    /// Multipart field name for the file
    #[serde(default = "default_form_file_field")]
    pub form_file_field: String,

    /// JSON object with extra static form fields
    #[serde(rename = "extra_form_fields")]
    pub extra_form_fields_str: Option<String>,

    /// Comma-separated list of allowed extensions
    #[serde(rename = "allowed_exts")]
    pub allowed_exts_str: Option<String>,

    /// Maximum accepted file size in megabytes
    #[serde(default = "default_max_file_mb")]
    pub max_file_mb: f64,

    /// Telegram ID of the administrator
    #[serde(default = "default_admin_id")]
    pub admin_id: i64,

    /// How long an admitted album waits for its sibling messages
    #[serde(default = "default_album_settle_ms")]
    pub album_settle_ms: u64,

    /// Upper bound for downloading one file from Telegram
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_form_file_field() -> String {
    DEFAULT_FORM_FILE_FIELD.to_string()
}

const fn default_max_file_mb() -> f64 {
    DEFAULT_MAX_FILE_MB
}

const fn default_admin_id() -> i64 {
    DEFAULT_ADMIN_ID
}

const fn default_album_settle_ms() -> u64 {
    1500
}

const fn default_download_timeout_secs() -> u64 {
    300
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            lookmyimg_api_key: String::new(),
            lookmyimg_endpoint: default_endpoint(),
            form_file_field: default_form_file_field(),
            extra_form_fields_str: None,
            allowed_exts_str: None,
            max_file_mb: DEFAULT_MAX_FILE_MB,
            admin_id: DEFAULT_ADMIN_ID,
            album_settle_ms: default_album_settle_ms(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lookmyimg_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP__MAX_FILE_MB=10 ./target/app`
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Plain UPPER_SNAKE_CASE variables, empty values treated as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?
            .try_deserialize()
    }

    /// Names of required environment variables that are missing
    #[must_use]
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.bot_token.trim().is_empty() {
            missing.push("BOT_TOKEN");
        }
        if self.lookmyimg_api_key.trim().is_empty() {
            missing.push("LOOKMYIMG_API_KEY");
        }
        missing
    }

    /// Extra static form fields as ordered name/value pairs
    ///
    /// String values are used verbatim, other JSON values in their JSON form.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `EXTRA_FORM_FIELDS` is not a JSON object.
    pub fn extra_form_fields(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let Some(raw) = self
            .extra_form_fields_str
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return Ok(Vec::new());
        };

        let map: serde_json::Map<String, Value> = serde_json::from_str(raw).map_err(|e| {
            ConfigError::Message(format!("EXTRA_FORM_FIELDS must be a JSON object: {e}"))
        })?;

        Ok(map
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect())
    }

    /// Allowed extensions, lower-cased with a leading dot, sorted
    #[must_use]
    pub fn allowed_exts(&self) -> Vec<String> {
        let mut exts: Vec<String> = match self.allowed_exts_str.as_deref() {
            Some(s) if !s.trim().is_empty() => s
                .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                .filter(|token| !token.is_empty())
                .map(|ext| format!(".{}", ext.trim_start_matches('.').to_lowercase()))
                .collect(),
            _ => DEFAULT_ALLOWED_EXTS
                .iter()
                .map(|ext| format!(".{ext}"))
                .collect(),
        };
        exts.sort();
        exts.dedup();
        exts
    }

    /// Settle window for album collection
    #[must_use]
    pub const fn album_settle(&self) -> Duration {
        Duration::from_millis(self.album_settle_ms)
    }

    /// Download bound for a single Telegram file
    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}
