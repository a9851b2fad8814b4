//! Scraper configuration
//!
//! One [`ScraperConfig`] is built at startup (usually from a TOML file) and
//! handed to the transport, the façade and the thumbnail pipeline. It is not
//! mutated afterwards; reloading means building new instances.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::{ClientConfig, MAX_RETRIES_CAP};
use crate::url::BASE_URL;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

const PROXY_SCHEMES: &[&str] = &["http://", "https://", "socks5://", "socks5h://"];

/// Settings consumed by the scraper core
///
/// Missing keys take their default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Site root, overridable for mirrors and tests
    pub base_url: String,

    /// Proxy URI (http, https, socks5); empty disables the proxy
    pub proxy: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Transport retries for transient failures (0 = none)
    pub max_retries: u32,

    /// Thumbnail blur, 0 (off) to 100
    pub blur_level: u8,

    /// Maximum number of summaries returned per listing
    pub max_search_results: usize,

    /// Concurrent detail lookups when resolving related videos
    pub related_concurrency: usize,

    /// Directory for thumbnail temp files; system temp dir when unset
    pub thumbnail_dir: Option<PathBuf>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            proxy: String::new(),
            timeout_secs: 30,
            max_retries: 0,
            blur_level: 0,
            max_search_results: 10,
            related_concurrency: 4,
            thumbnail_dir: None,
        }
    }
}

impl ScraperConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ScraperConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url cannot be empty".to_string()));
        }
        if let Some(proxy) = self.proxy() {
            let lower = proxy.to_ascii_lowercase();
            if !PROXY_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
                return Err(ConfigError::Invalid(format!(
                    "unsupported proxy scheme: {}",
                    proxy
                )));
            }
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be > 0".to_string()));
        }
        if self.max_retries > MAX_RETRIES_CAP {
            return Err(ConfigError::Invalid(format!(
                "max_retries must be <= {}",
                MAX_RETRIES_CAP
            )));
        }
        if self.blur_level > 100 {
            return Err(ConfigError::Invalid("blur_level must be within 0..=100".to_string()));
        }
        if self.max_search_results == 0 {
            return Err(ConfigError::Invalid("max_search_results must be > 0".to_string()));
        }
        if self.related_concurrency == 0 {
            return Err(ConfigError::Invalid("related_concurrency must be > 0".to_string()));
        }
        Ok(())
    }

    /// The proxy URI, or `None` when disabled
    pub fn proxy(&self) -> Option<&str> {
        let proxy = self.proxy.trim();
        (!proxy.is_empty()).then_some(proxy)
    }

    /// Transport settings derived from this config
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            proxy: self.proxy().map(str::to_string),
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            referer: Some(format!("{}/", self.base_url.trim_end_matches('/'))),
            ..ClientConfig::default()
        }
    }

    /// Directory used for thumbnail temp files
    pub fn thumbnail_dir(&self) -> PathBuf {
        self.thumbnail_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("hanime-thumbnails"))
    }
}
