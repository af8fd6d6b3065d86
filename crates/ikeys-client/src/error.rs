//! Client-side error type.

use ikeys_cache::CacheError;
use ikeys_crypto::{CodecError, SignatureError};

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no private key configured (set INFUZU_SECRET_KEY or pass one explicitly)")]
    MissingKeyMaterial,
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("key encoding: {0}")]
    Codec(#[from] CodecError),
    #[error("signature: {0}")]
    Signature(#[from] SignatureError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("directory returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed directory response: {0}")]
    MalformedResponse(String),
    #[error("directory record for key pair {0} has no application information")]
    MissingApplicationInfo(String),
    #[error("directory record for key pair {0} has no public key")]
    MissingPublicKey(String),
    #[error("header '{0}' is reserved for the request signature")]
    ReservedHeader(String),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("signature does not name a key pair")]
    EmptyKeyPairId,
    #[error("empty public key")]
    EmptyPublicKey,
    #[error("signature is invalid")]
    InvalidSignature,
    #[error("key lookup timed out")]
    LookupTimedOut,
}

impl From<CacheError<ClientError>> for ClientError {
    fn from(err: CacheError<ClientError>) -> Self {
        match err {
            CacheError::Fetch(inner) => inner,
            CacheError::TimedOut(_) => ClientError::LookupTimedOut,
        }
    }
}
