//! Directory lookups of key-pair IDs, memoized with an expiring cache.

use std::fmt;

use async_trait::async_trait;
use ikeys_cache::{CacheConfig, CacheStats, ExpiringCache, Fetch, GetOptions};
use ikeys_crypto::{hash, PublicKey};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::SignedClient;

/// The service a key pair belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        rename = "isInternal",
        alias = "is_internal",
        skip_serializing_if = "Option::is_none"
    )]
    pub internal: Option<bool>,
}

impl Application {
    pub fn is_internal(&self) -> bool {
        self.internal.unwrap_or(false)
    }

    pub fn is_in_list<S: AsRef<str>>(&self, ids: &[S]) -> bool {
        ids.iter().any(|id| id.as_ref() == self.id)
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A directory record for one key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteIdentity {
    #[serde(rename = "id")]
    pub key_pair_id: String,
    pub name: String,
    #[serde(rename = "publicKeyB64")]
    pub public_key: Option<String>,
    pub private_key_hash: Option<String>,
    pub valid: bool,
    pub application: Application,
}

impl RemoteIdentity {
    /// Decoded public key, if the directory published one.
    pub fn public_key(&self) -> Result<PublicKey, ClientError> {
        let text = self
            .public_key
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ClientError::MissingPublicKey(self.key_pair_id.clone()))?;
        Ok(PublicKey::from_base64(text)?)
    }

    /// Whether `private_key_text` hashes to the fingerprint the directory holds.
    pub fn private_key_matches(&self, private_key_text: &str) -> bool {
        match (&self.private_key_hash, hash::fingerprint(private_key_text)) {
            (Some(expected), Ok(actual)) => expected.eq_ignore_ascii_case(&actual),
            _ => false,
        }
    }
}

impl fmt::Display for RemoteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            write!(f, "{} ({})", self.name, self.application)
        } else {
            write!(f, "{} (INVALID)", self.name)
        }
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "publicKeyB64", alias = "public_key_b64")]
    public_key_b64: Option<String>,
    #[serde(default, rename = "privateKeyHash", alias = "private_key_hash")]
    private_key_hash: Option<String>,
    #[serde(default)]
    application: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DirectoryResponse {
    Valid(DirectoryRecord),
    Invalid(DirectoryRecord),
}

impl DirectoryResponse {
    fn into_identity(self, requested_id: &str) -> Result<RemoteIdentity, ClientError> {
        let (record, valid) = match self {
            Self::Valid(record) => (record, true),
            Self::Invalid(record) => (record, false),
        };
        let key_pair_id = if record.id.is_empty() {
            requested_id.to_string()
        } else {
            record.id
        };
        let application = record
            .application
            .filter(|value| !value.is_null())
            .and_then(|value| serde_json::from_value::<Application>(value).ok())
            .ok_or_else(|| ClientError::MissingApplicationInfo(key_pair_id.clone()))?;

        Ok(RemoteIdentity {
            key_pair_id,
            name: record.name,
            public_key: record.public_key_b64,
            private_key_hash: record.private_key_hash,
            valid,
            application,
        })
    }
}

/// Signed `GET` against the directory for one key-pair ID.
pub struct DirectoryFetcher {
    client: SignedClient,
    config: ClientConfig,
}

impl DirectoryFetcher {
    pub fn new(client: SignedClient, config: ClientConfig) -> Self {
        Self { client, config }
    }

    pub async fn lookup(&self, key_pair_id: &str) -> Result<RemoteIdentity, ClientError> {
        let url = self.config.key_pair_url(key_pair_id);
        info!(key_id = key_pair_id, %url, "fetching key pair from directory");

        let response = self.client.get(&url).await?;
        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            warn!(key_id = key_pair_id, status = status.as_u16(), "directory lookup failed");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DirectoryResponse = serde_json::from_str(&body)
            .map_err(|e| ClientError::MalformedResponse(e.to_string()))?;
        parsed.into_identity(key_pair_id)
    }
}

#[async_trait]
impl Fetch for DirectoryFetcher {
    type Args = String;
    type Value = RemoteIdentity;
    type Error = ClientError;

    async fn fetch(&self, key_pair_id: String) -> Result<RemoteIdentity, ClientError> {
        self.lookup(&key_pair_id).await
    }
}

/// Resolves key-pair IDs to directory records through an [`ExpiringCache`].
pub struct KeyResolver {
    cache: ExpiringCache<DirectoryFetcher>,
}

impl KeyResolver {
    pub fn new(client: SignedClient, config: &ClientConfig) -> Self {
        let cache_config = CacheConfig {
            default_ttl: config.cache_ttl(),
            max_size: config.cache_max_size,
            fetch_timeout: None,
        };
        let fetcher = DirectoryFetcher::new(client, config.clone());
        Self {
            cache: ExpiringCache::new(fetcher, cache_config),
        }
    }

    /// Resolver whose lookups are signed with the configured private key.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self::new(SignedClient::from_config(config)?, config))
    }

    pub async fn resolve(&self, key_pair_id: &str) -> Result<RemoteIdentity, ClientError> {
        if key_pair_id.is_empty() {
            return Err(ClientError::EmptyKeyPairId);
        }
        Ok(self.cache.get(key_pair_id, key_pair_id.to_string()).await?)
    }

    /// Bypass any cached record and fetch again.
    pub async fn refresh(&self, key_pair_id: &str) -> Result<RemoteIdentity, ClientError> {
        if key_pair_id.is_empty() {
            return Err(ClientError::EmptyKeyPairId);
        }
        let options = GetOptions::new().force_refresh(true);
        Ok(self
            .cache
            .get_with(key_pair_id, key_pair_id.to_string(), options)
            .await?)
    }

    pub async fn forget(&self, key_pair_id: &str) -> bool {
        self.cache.remove(key_pair_id).await
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
