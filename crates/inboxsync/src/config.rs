//! Configuration for the provider client and the sync flow
//!
//! Provider settings are loaded from (in order of priority):
//! 1. JSON file (`provider.json` in the inboxsync config directory)
//! 2. Runtime environment variables
//! 3. Built-in defaults

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Provider settings filename in the config directory
const PROVIDER_FILE: &str = "provider.json";

/// Default regional API endpoint
pub const DEFAULT_API_URI: &str = "https://api.us.nylas.com";

/// Connection settings for the remote provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_api_uri")]
    pub api_uri: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_uri() -> String {
    DEFAULT_API_URI.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_uri: default_api_uri(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    /// Load settings from the config file, then the environment, then defaults
    pub fn load() -> Result<Self> {
        if config::config_exists(PROVIDER_FILE) {
            let cfg: ProviderConfig = config::load_json(PROVIDER_FILE)?;
            return cfg.validated();
        }

        Self::from_env()
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let cfg: ProviderConfig = config::load_json_file(path)?;
        cfg.validated()
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: ProviderConfig =
            serde_json::from_str(json).context("Failed to parse provider config JSON")?;
        cfg.validated()
    }

    /// Read `NYLAS_API_URI` and `NYLAS_TIMEOUT_SECS`, defaulting missing values
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(uri) = std::env::var("NYLAS_API_URI")
            && !uri.is_empty()
        {
            cfg.api_uri = uri;
        }

        if let Ok(secs) = std::env::var("NYLAS_TIMEOUT_SECS")
            && !secs.is_empty()
        {
            cfg.timeout_secs = secs
                .parse()
                .with_context(|| format!("NYLAS_TIMEOUT_SECS is not a number: {}", secs))?;
        }

        cfg.validated()
    }

    fn validated(self) -> Result<Self> {
        let url = url::Url::parse(&self.api_uri)
            .with_context(|| format!("Invalid provider API URI: {}", self.api_uri))?;
        if url.scheme() != "https" && url.scheme() != "http" {
            bail!("Provider API URI must be http(s): {}", self.api_uri);
        }
        if self.timeout_secs == 0 {
            bail!("Provider timeout must be greater than zero");
        }
        Ok(self)
    }
}

/// Tuning for one account sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Result limit for the standard fetch strategies
    pub limit: usize,
    /// Limit used by the high-limit strategy
    pub high_limit: usize,
    /// Window for the bounded-recency strategy
    pub recency_days: i64,
    /// Folders for the folder-scoped strategy
    pub folders: Vec<String>,
    /// Projection for the field-restricted strategy
    pub select_fields: String,
    pub readiness_timeout: Duration,
    pub readiness_interval: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            high_limit: 500,
            recency_days: 30,
            folders: vec!["INBOX".to_string(), "SENT".to_string(), "DRAFT".to_string()],
            select_fields: "id,thread_id,subject,body,snippet,from,to,cc,bcc,date,unread,starred,attachments,reply_to"
                .to_string(),
            readiness_timeout: Duration::from_secs(30),
            readiness_interval: Duration::from_secs(2),
        }
    }
}

impl SyncOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_readiness(mut self, timeout: Duration, interval: Duration) -> Self {
        self.readiness_timeout = timeout;
        self.readiness_interval = interval;
        self
    }
}
