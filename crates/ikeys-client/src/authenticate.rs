//! Turning a signed message into the application that sent it.

use std::borrow::Cow;
use std::sync::Arc;

use ikeys_crypto::{signature, KeyPair, PublicKey};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::resolver::{Application, KeyResolver, RemoteIdentity};

/// Anything a public key can be taken from.
#[derive(Debug, Clone)]
pub enum KeySource {
    Identity(RemoteIdentity),
    Public(PublicKey),
    KeyPair(KeyPair),
    /// Public key text as produced by [`PublicKey::to_base64`].
    Encoded(String),
}

impl KeySource {
    /// The public key text this source carries.
    pub fn public_key_text(&self) -> Result<Cow<'_, str>, ClientError> {
        let text = match self {
            Self::Identity(identity) => match identity.public_key.as_deref() {
                Some(text) => Cow::Borrowed(text),
                None => return Err(ClientError::MissingPublicKey(identity.key_pair_id.clone())),
            },
            Self::Public(key) => Cow::Owned(key.to_base64()),
            Self::KeyPair(pair) => Cow::Owned(pair.public_key().to_base64()),
            Self::Encoded(text) => Cow::Borrowed(text.as_str()),
        };
        if text.trim().is_empty() {
            return Err(ClientError::EmptyPublicKey);
        }
        Ok(text)
    }

    pub fn public_key(&self) -> Result<PublicKey, ClientError> {
        match self {
            Self::Public(key) => Ok(key.clone()),
            Self::KeyPair(pair) => Ok(pair.public_key().clone()),
            _ => Ok(PublicKey::from_base64(self.public_key_text()?.trim())?),
        }
    }
}

impl From<RemoteIdentity> for KeySource {
    fn from(identity: RemoteIdentity) -> Self {
        Self::Identity(identity)
    }
}

impl From<PublicKey> for KeySource {
    fn from(key: PublicKey) -> Self {
        Self::Public(key)
    }
}

impl From<KeyPair> for KeySource {
    fn from(pair: KeyPair) -> Self {
        Self::KeyPair(pair)
    }
}

impl From<String> for KeySource {
    fn from(text: String) -> Self {
        Self::Encoded(text)
    }
}

impl From<&str> for KeySource {
    fn from(text: &str) -> Self {
        Self::Encoded(text.to_string())
    }
}

/// Verify `signature` over `message` against whatever key `source` holds.
pub fn verify_with(
    message: &str,
    signature: &str,
    source: &KeySource,
    max_clock_skew_secs: u64,
) -> Result<bool, ClientError> {
    let key = source.public_key()?;
    Ok(signature::verify(message, signature, &key, max_clock_skew_secs)?)
}

/// Resolves the signer of a message through the directory and checks the
/// signature against the published key.
#[derive(Clone)]
pub struct Authenticator {
    resolver: Arc<KeyResolver>,
    max_clock_skew_secs: u64,
}

impl Authenticator {
    pub fn new(resolver: Arc<KeyResolver>, max_clock_skew_secs: u64) -> Self {
        Self {
            resolver,
            max_clock_skew_secs,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let resolver = KeyResolver::from_config(config)?;
        Ok(Self::new(Arc::new(resolver), config.max_clock_skew_secs))
    }

    pub fn resolver(&self) -> &KeyResolver {
        &self.resolver
    }

    /// Directory record of the key pair that produced `signature`.
    ///
    /// The record's validity flag is reported but not enforced; callers
    /// that care check [`RemoteIdentity::valid`].
    pub async fn identify(&self, signature: &str, message: &str) -> Result<RemoteIdentity, ClientError> {
        let key_pair_id = signature::extract_key_pair_id(signature)?;
        if key_pair_id.is_empty() {
            return Err(ClientError::EmptyKeyPairId);
        }

        let identity = self.resolver.resolve(key_pair_id.as_str()).await?;
        if !identity.valid {
            warn!(key_id = %key_pair_id, "directory marks key pair as invalid");
        }

        let key = identity.public_key()?;
        if !signature::verify(message, signature, &key, self.max_clock_skew_secs)? {
            debug!(key_id = %key_pair_id, "authentication failed: signature rejected");
            return Err(ClientError::InvalidSignature);
        }
        Ok(identity)
    }

    /// The application that signed `message`.
    pub async fn authenticate(&self, signature: &str, message: &str) -> Result<Application, ClientError> {
        Ok(self.identify(signature, message).await?.application)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ikeys_crypto::{PrivateKey, ProtocolVersion};

    #[test]
    fn test_every_source_verifies() {
        let pair = KeyPair::generate();
        let signature = pair.private_key().sign("hello", ProtocolVersion::Compact).unwrap();
        let encoded = pair.public_key().to_base64();

        let identity = RemoteIdentity {
            key_pair_id: pair.id().to_string(),
            name: "svc".into(),
            public_key: Some(encoded.clone()),
            private_key_hash: None,
            valid: true,
            application: Application {
                id: "app".into(),
                name: "App".into(),
                description: None,
                internal: Some(true),
            },
        };

        let sources: Vec<KeySource> = vec![
            identity.into(),
            pair.public_key().clone().into(),
            pair.clone().into(),
            encoded.into(),
        ];
        for source in &sources {
            assert!(verify_with("hello", &signature, source, 300).unwrap());
            assert!(!verify_with("hullo", &signature, source, 300).unwrap());
        }
    }

    #[test]
    fn test_empty_or_missing_key_material() {
        let signature = PrivateKey::generate().sign("m", ProtocolVersion::Compact).unwrap();
        assert!(matches!(
            verify_with("m", &signature, &KeySource::from(""), 300),
            Err(ClientError::EmptyPublicKey)
        ));

        let identity = RemoteIdentity {
            key_pair_id: "abc".into(),
            name: String::new(),
            public_key: None,
            private_key_hash: None,
            valid: true,
            application: Application {
                id: "app".into(),
                name: String::new(),
                description: None,
                internal: None,
            },
        };
        assert!(matches!(
            verify_with("m", &signature, &identity.into(), 300),
            Err(ClientError::MissingPublicKey(_))
        ));
    }

    #[test]
    fn test_garbage_key_text_is_codec_error() {
        let signature = PrivateKey::generate().sign("m", ProtocolVersion::Compact).unwrap();
        assert!(matches!(
            verify_with("m", &signature, &KeySource::from("!!!"), 300),
            Err(ClientError::Codec(_))
        ));
    }
}
