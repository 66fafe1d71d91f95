use std::env;
use std::time::Duration;
use thiserror::Error;

/// Smallest part size S3-compatible stores accept for multipart uploads.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL for {name}: {value}")]
    InvalidUrl { name: &'static str, value: String },
}

/// Upload pipeline configuration
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Backend API base URL (default: "http://127.0.0.1:8080")
    pub api_base_url: String,

    /// Login entry point to send the user to when the session expires (default: "login.html")
    pub login_url: String,

    /// Region used for request signing (default: "us-east-1")
    pub store_region: String,

    /// Multipart part size in bytes (default: 5 MB, never below 5 MB)
    pub part_size: usize,

    /// How long the progress panel stays visible after a batch (default: 1000 ms)
    pub panel_hide_delay: Duration,

    /// Content type sent for files with none declared (default: "application/octet-stream")
    pub default_content_type: String,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".to_string(),
            login_url: "login.html".to_string(),
            store_region: "us-east-1".to_string(),
            part_size: MIN_PART_SIZE,
            panel_hide_delay: Duration::from_millis(1000),
            default_content_type: mime::APPLICATION_OCTET_STREAM.to_string(),
        }
    }
}

impl UploaderConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            api_base_url: env::var("API_BASE_URL").unwrap_or(default.api_base_url),

            login_url: env::var("LOGIN_URL").unwrap_or(default.login_url),

            store_region: env::var("STORE_REGION").unwrap_or(default.store_region),

            part_size: env::var("UPLOAD_PART_SIZE")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .map(|v| v.max(MIN_PART_SIZE))
                .unwrap_or(default.part_size),

            panel_hide_delay: env::var("PANEL_HIDE_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default.panel_hide_delay),

            default_content_type: env::var("DEFAULT_CONTENT_TYPE")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(default.default_content_type),
        }
    }

    /// Create config for local development (panel hides immediately)
    pub fn development() -> Self {
        Self {
            panel_hide_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Validated API base URL.
    pub fn api_base(&self) -> Result<reqwest::Url, ConfigError> {
        reqwest::Url::parse(&self.api_base_url).map_err(|_| ConfigError::InvalidUrl {
            name: "API_BASE_URL",
            value: self.api_base_url.clone(),
        })
    }
}
