//! Outbound HTTP requests carrying a signature header.

use std::sync::Arc;

use ikeys_crypto::{KeyPairId, PrivateKey, ProtocolVersion};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Response};
use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Request body. The signature always covers the exact text sent.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Text(String),
    Json(serde_json::Value),
}

impl RequestBody {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ClientError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    fn into_text(self) -> (String, bool) {
        match self {
            Self::Text(text) => (text, false),
            Self::Json(value) => (value.to_string(), true),
        }
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// HTTP client that signs every request body with one private key.
#[derive(Clone)]
pub struct SignedClient {
    http: reqwest::Client,
    key: Arc<PrivateKey>,
    signature_header: HeaderName,
}

impl SignedClient {
    pub fn new(key: PrivateKey, config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(config.request_timeout())
            .build()?;
        let signature_header = HeaderName::from_bytes(config.signature_header.as_bytes())
            .map_err(|e| ClientError::InvalidHeader(e.to_string()))?;
        Ok(Self {
            http,
            key: Arc::new(key),
            signature_header,
        })
    }

    /// Client signing with the key from `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(config.signing_key()?, config)
    }

    pub fn key_pair_id(&self) -> &KeyPairId {
        self.key.key_pair_id()
    }

    pub fn signature_header(&self) -> &HeaderName {
        &self.signature_header
    }

    /// Build a signed request without sending it.
    pub fn build(
        &self,
        method: Method,
        url: &str,
        body: Option<RequestBody>,
        headers: HeaderMap,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        if headers.contains_key(&self.signature_header) {
            return Err(ClientError::ReservedHeader(self.signature_header.to_string()));
        }

        let (text, is_json) = body.map(RequestBody::into_text).unwrap_or_default();
        let signature = self.key.sign(&text, ProtocolVersion::Compact)?;
        let signature = HeaderValue::from_str(&signature)
            .map_err(|e| ClientError::InvalidHeader(e.to_string()))?;

        let mut builder = self.http.request(method, url);
        if is_json {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        if !text.is_empty() {
            builder = builder.body(text);
        }
        Ok(builder
            .headers(headers)
            .header(self.signature_header.clone(), signature))
    }

    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<RequestBody>,
        headers: HeaderMap,
    ) -> Result<Response, ClientError> {
        debug!(%method, url, key_id = %self.key_pair_id(), "sending signed request");
        let response = self.build(method, url, body, headers)?.send().await?;
        Ok(response)
    }

    pub async fn get(&self, url: &str) -> Result<Response, ClientError> {
        self.request(Method::GET, url, None, HeaderMap::new()).await
    }

    pub async fn post(&self, url: &str, body: impl Into<RequestBody>) -> Result<Response, ClientError> {
        self.request(Method::POST, url, Some(body.into()), HeaderMap::new())
            .await
    }
}
