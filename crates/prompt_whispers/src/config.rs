//! Client configuration.
//!
//! Loaded from a TOML file, then overridden by environment variables:
//! `PROMPT_WHISPERS_URL`, `PROMPT_WHISPERS_POLL_MS` and
//! `PROMPT_WHISPERS_SESSION`.

use std::path::Path;
use std::time::Duration;

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::ConfigError;

/// Environment variable overriding the backend URL.
pub const ENV_URL: &str = "PROMPT_WHISPERS_URL";
/// Environment variable overriding the poll interval in milliseconds.
pub const ENV_POLL_MS: &str = "PROMPT_WHISPERS_POLL_MS";
/// Environment variable holding the session cookie.
pub const ENV_SESSION: &str = "PROMPT_WHISPERS_SESSION";

/// Connection and polling settings.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL, without trailing slash.
    #[serde(default = "default_base_url")]
    base_url: String,

    /// Delay between snapshot fetches.
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,

    /// Timeout for image generation, which waits on the image model.
    #[serde(default = "default_image_timeout_ms")]
    image_timeout_ms: u64,

    /// Opaque session cookie forwarded with every request.
    #[serde(default)]
    session_cookie: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_image_timeout_ms() -> u64 {
    120_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            image_timeout_ms: default_image_timeout_ms(),
            session_cookie: None,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for the given backend with default timings.
    #[instrument(skip(base_url))]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_url(base_url.into()),
            ..Self::default()
        }
    }

    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let mut config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.base_url = normalize_url(config.base_url);
        config.validate()?;

        info!(base_url = %config.base_url, "Config loaded successfully");
        Ok(config)
    }

    /// Loads from `path` if given and present, otherwise starts from defaults,
    /// then applies environment overrides.
    #[instrument(skip(path))]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) if p.exists() => Self::from_file(p)?,
            Some(p) => {
                warn!(path = %p.display(), "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from a variable lookup (usually the process environment).
    #[instrument(skip(self, lookup))]
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = lookup(ENV_URL) {
            debug!(url = %url, "Overriding base URL from environment");
            self.base_url = normalize_url(url);
        }
        if let Some(ms) = lookup(ENV_POLL_MS) {
            self.poll_interval_ms = ms.trim().parse().map_err(|e| {
                ConfigError::new(format!("{} must be milliseconds: {}", ENV_POLL_MS, e))
            })?;
        }
        if let Some(session) = lookup(ENV_SESSION) {
            self.session_cookie = Some(session);
        }
        self.validate()?;
        Ok(self)
    }

    /// Sets the poll interval.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the interval rounds down to zero milliseconds.
    #[instrument(skip(self))]
    pub fn with_poll_interval(mut self, interval: Duration) -> Result<Self, ConfigError> {
        self.poll_interval_ms = interval.as_millis() as u64;
        self.validate()?;
        Ok(self)
    }

    /// Sets the session cookie.
    #[instrument(skip(self, cookie))]
    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Image generation timeout as a duration.
    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::new(format!(
                "base_url must start with http:// or https://, got {}",
                self.base_url
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::new("poll_interval_ms must be positive"));
        }
        if self.request_timeout_ms == 0 || self.image_timeout_ms == 0 {
            return Err(ConfigError::new("timeouts must be positive"));
        }
        Ok(())
    }
}

fn normalize_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
