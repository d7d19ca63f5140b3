//! # Client Configuration
//!
//! Connection settings for the backup service. Values come from a JSON file,
//! from `POLICY_SDK_*` environment variables, or from [`Default`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use policy_engine::LEGACY_BATCH_LIMIT;

const DEFAULT_BASE_URL: &str = "http://localhost/webconsole/api";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_COMMCELL_ID: u32 = 2;

/// Smallest legacy batch limit accepted; one id must always fit.
const MIN_LEGACY_BATCH_LIMIT: usize = 16;

const ENV_BASE_URL: &str = "POLICY_SDK_BASE_URL";
const ENV_AUTH_TOKEN: &str = "POLICY_SDK_AUTH_TOKEN";
const ENV_CONNECT_TIMEOUT_MS: &str = "POLICY_SDK_CONNECT_TIMEOUT_MS";
const ENV_REQUEST_TIMEOUT_MS: &str = "POLICY_SDK_REQUEST_TIMEOUT_MS";
const ENV_COMMCELL_ID: &str = "POLICY_SDK_COMMCELL_ID";
const ENV_LEGACY_BATCH_LIMIT: &str = "POLICY_SDK_LEGACY_BATCH_LIMIT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Service root; endpoint paths are joined onto it.
    pub base_url: String,
    /// Sent as the `Authtoken` header when set.
    pub auth_token: Option<String>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub commcell_id: u32,
    /// Longest comma-joined id list per legacy job-marking call.
    pub legacy_batch_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_token: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            commcell_id: DEFAULT_COMMCELL_ID,
            legacy_batch_limit: LEGACY_BATCH_LIMIT,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    /// Reads `POLICY_SDK_*` variables; unset or unparsable values keep
    /// their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_BASE_URL).filter(|u| !u.trim().is_empty()) {
            config.base_url = url;
        }
        if let Some(token) = lookup(ENV_AUTH_TOKEN).filter(|t| !t.is_empty()) {
            config.auth_token = Some(token);
        }
        if let Some(ms) = lookup(ENV_CONNECT_TIMEOUT_MS).and_then(|v| v.trim().parse().ok()) {
            config.connect_timeout_ms = ms;
        }
        if let Some(ms) = lookup(ENV_REQUEST_TIMEOUT_MS).and_then(|v| v.trim().parse().ok()) {
            config.request_timeout_ms = ms;
        }
        if let Some(id) = lookup(ENV_COMMCELL_ID).and_then(|v| v.trim().parse().ok()) {
            config.commcell_id = id;
        }
        if let Some(limit) = lookup(ENV_LEGACY_BATCH_LIMIT).and_then(|v| v.trim().parse().ok()) {
            config.legacy_batch_limit = limit;
        }
        config
    }

    /// Loads a JSON file; missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        if self.connect_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than zero".into()));
        }
        if self.legacy_batch_limit < MIN_LEGACY_BATCH_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "legacy_batch_limit must be at least {}, got {}",
                MIN_LEGACY_BATCH_LIMIT, self.legacy_batch_limit
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_string());
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, connect_ms: u64, request_ms: u64) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.request_timeout_ms = request_ms;
        self
    }

    #[must_use]
    pub fn with_commcell_id(mut self, commcell_id: u32) -> Self {
        self.commcell_id = commcell_id;
        self
    }

    #[must_use]
    pub fn with_legacy_batch_limit(mut self, limit: usize) -> Self {
        self.legacy_batch_limit = limit;
        self
    }
}
