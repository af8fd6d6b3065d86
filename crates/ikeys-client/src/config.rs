//! Client configuration
//!
//! Defaults, then an optional TOML file named by `IKEYS_CONFIG`, then
//! environment variables. The environment always wins.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use ikeys_crypto::{PrivateKey, DEFAULT_MAX_CLOCK_SKEW_SECS};
use reqwest::header::HeaderName;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use zeroize::Zeroizing;

use crate::error::ClientError;

pub const DEFAULT_KEYS_BASE_URL: &str = "https://keys.infuzu.com/";
pub const DEFAULT_KEY_PAIR_ENDPOINT: &str = "api/key/{key_pair_id}/";
pub const DEFAULT_SIGNATURE_HEADER: &str = "Infuzu-Signature";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;
pub const DEFAULT_CACHE_MAX_SIZE: usize = 100;

const KEY_PAIR_PLACEHOLDER: &str = "{key_pair_id}";
const LEGACY_KEY_PAIR_PLACEHOLDER: &str = "<str:key_id>";

pub const ENV_CONFIG_PATH: &str = "IKEYS_CONFIG";
pub const ENV_PRIVATE_KEY: &str = "INFUZU_SECRET_KEY";
pub const ENV_KEYS_BASE_URL: &str = "INFUZU_KEYS_BASE_URL";
pub const ENV_KEY_PAIR_ENDPOINT: &str = "INFUZU_KEYS_KEY_PAIR_ENDPOINT";
pub const ENV_SIGNATURE_HEADER: &str = "INFUZU_SIGNATURE_HEADER_NAME";
pub const ENV_REQUEST_TIMEOUT: &str = "DEFAULT_REQUEST_TIMEOUT";
pub const ENV_CACHE_TTL: &str = "INFUZU_KEYS_CACHE_TTL";
pub const ENV_CACHE_MAX_SIZE: &str = "INFUZU_KEYS_CACHE_MAX_SIZE";
pub const ENV_MAX_CLOCK_SKEW: &str = "INFUZU_MAX_CLOCK_SKEW";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings shared by the signed session, the resolver and the authenticator.
#[derive(Clone)]
pub struct ClientConfig {
    pub private_key: Option<Zeroizing<String>>,
    pub keys_base_url: String,
    pub key_pair_endpoint: String,
    pub signature_header: String,
    pub request_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    /// Zero means unbounded.
    pub cache_max_size: usize,
    pub max_clock_skew_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            private_key: None,
            keys_base_url: DEFAULT_KEYS_BASE_URL.to_string(),
            key_pair_endpoint: DEFAULT_KEY_PAIR_ENDPOINT.to_string(),
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_max_size: DEFAULT_CACHE_MAX_SIZE,
            max_clock_skew_secs: DEFAULT_MAX_CLOCK_SKEW_SECS,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("keys_base_url", &self.keys_base_url)
            .field("key_pair_endpoint", &self.key_pair_endpoint)
            .field("signature_header", &self.signature_header)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("cache_max_size", &self.cache_max_size)
            .field("max_clock_skew_secs", &self.max_clock_skew_secs)
            .finish()
    }
}

/// Every field optional; present values override the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    private_key: Option<String>,
    keys_base_url: Option<String>,
    key_pair_endpoint: Option<String>,
    signature_header: Option<String>,
    request_timeout_secs: Option<u64>,
    cache_ttl_secs: Option<u64>,
    cache_max_size: Option<usize>,
    max_clock_skew_secs: Option<u64>,
}

impl ClientConfig {
    /// Load from the process environment and the TOML file it points at.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|name| std::env::var(name).ok())
    }

    /// Same as [`ClientConfig::load`] with an explicit variable lookup.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_CONFIG_PATH) {
            config.load_from_toml(&path)?;
        }

        config.apply_env(lookup);
        config.validate()?;

        Ok(config)
    }

    /// Overlay values from a TOML file.
    pub fn load_from_toml(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let file: FileConfig = toml::from_str(&content)?;

        if let Some(key) = file.private_key {
            self.private_key = Some(Zeroizing::new(key));
        }
        if let Some(url) = file.keys_base_url {
            self.keys_base_url = url;
        }
        if let Some(endpoint) = file.key_pair_endpoint {
            self.key_pair_endpoint = endpoint;
        }
        if let Some(header) = file.signature_header {
            self.signature_header = header;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
        if let Some(secs) = file.cache_ttl_secs {
            self.cache_ttl_secs = secs;
        }
        if let Some(size) = file.cache_max_size {
            self.cache_max_size = size;
        }
        if let Some(secs) = file.max_clock_skew_secs {
            self.max_clock_skew_secs = secs;
        }

        Ok(())
    }

    /// Overlay values from environment variables. Unparseable numbers are
    /// skipped with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_PRIVATE_KEY).filter(|k| !k.trim().is_empty()) {
            self.private_key = Some(Zeroizing::new(key));
        }
        if let Some(url) = lookup(ENV_KEYS_BASE_URL) {
            self.keys_base_url = url;
        }
        if let Some(endpoint) = lookup(ENV_KEY_PAIR_ENDPOINT) {
            self.key_pair_endpoint = endpoint;
        }
        if let Some(header) = lookup(ENV_SIGNATURE_HEADER) {
            self.signature_header = header;
        }
        parse_env(&lookup, ENV_REQUEST_TIMEOUT, &mut self.request_timeout_secs);
        parse_env(&lookup, ENV_CACHE_TTL, &mut self.cache_ttl_secs);
        parse_env(&lookup, ENV_CACHE_MAX_SIZE, &mut self.cache_max_size);
        parse_env(&lookup, ENV_MAX_CLOCK_SKEW, &mut self.max_clock_skew_secs);
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.keys_base_url.starts_with("http://") || self.keys_base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "keys_base_url must be an http(s) URL, got '{}'",
                self.keys_base_url
            )));
        }

        if !self.key_pair_endpoint.contains(KEY_PAIR_PLACEHOLDER)
            && !self.key_pair_endpoint.contains(LEGACY_KEY_PAIR_PLACEHOLDER)
        {
            return Err(ConfigError::Invalid(format!(
                "key_pair_endpoint must contain {KEY_PAIR_PLACEHOLDER}"
            )));
        }

        if HeaderName::from_bytes(self.signature_header.as_bytes()).is_err() {
            return Err(ConfigError::Invalid(format!(
                "signature_header '{}' is not a valid header name",
                self.signature_header
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be > 0".to_string()));
        }

        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache_ttl_secs must be > 0".to_string()));
        }

        Ok(())
    }

    /// The configured signing key, decoded.
    pub fn signing_key(&self) -> Result<PrivateKey, ClientError> {
        let text = self
            .private_key
            .as_ref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ClientError::MissingKeyMaterial)?;
        Ok(PrivateKey::from_base64(text.trim())?)
    }

    /// Directory URL for one key pair.
    pub fn key_pair_url(&self, key_pair_id: &str) -> String {
        let endpoint = self
            .key_pair_endpoint
            .replace(KEY_PAIR_PLACEHOLDER, key_pair_id)
            .replace(LEGACY_KEY_PAIR_PLACEHOLDER, key_pair_id);
        format!(
            "{}/{}",
            self.keys_base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn parse_env<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, slot: &mut T) {
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => warn!(var = name, value = %raw, "ignoring unparseable configuration value"),
    }
}
