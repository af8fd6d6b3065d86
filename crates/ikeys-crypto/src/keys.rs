//! Identified P-521 key pairs.
//!
//! Every key pair carries a key-pair ID minted at generation time. The ID
//! travels with the public key and inside every signature envelope, and is
//! what a verifier uses to look the public key up.

use std::fmt;
use std::str::FromStr;

use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::{self, CodecError};
use crate::signature::{self, ProtocolVersion, SignatureError};

/// Opaque key-pair identifier: 128 random bits as 32 lowercase hex chars.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyPairId(String);

impl KeyPairId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for KeyPairId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for KeyPairId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for KeyPairId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyPairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public half of a key pair, the only part that is ever shared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    point: p521::PublicKey,
    key_pair_id: KeyPairId,
}

impl PublicKey {
    pub fn new(point: p521::PublicKey, key_pair_id: KeyPairId) -> Self {
        Self { point, key_pair_id }
    }

    pub fn point(&self) -> &p521::PublicKey {
        &self.point
    }

    pub fn key_pair_id(&self) -> &KeyPairId {
        &self.key_pair_id
    }

    /// Encode as key text (see [`crate::codec`]).
    pub fn to_base64(&self) -> String {
        codec::encode_public_key(&self.point, self.key_pair_id.as_str())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CodecError> {
        let (point, id) = codec::decode_public_key(encoded)?;
        Ok(Self::new(point, id.into()))
    }

    /// Verify a signature envelope against this key using the current time.
    pub fn verify(
        &self,
        message: &str,
        envelope: &str,
        max_clock_skew_secs: u64,
    ) -> Result<bool, SignatureError> {
        signature::verify(message, envelope, self, max_clock_skew_secs)
    }
}

impl FromStr for PublicKey {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base64(s)
    }
}

/// Private half of a key pair.
///
/// The scalar is zeroized on drop and never printed by `Debug`.
#[derive(Clone)]
pub struct PrivateKey {
    secret: p521::SecretKey,
    key_pair_id: KeyPairId,
}

impl PrivateKey {
    /// Generate a fresh scalar from the OS random source with a new ID.
    pub fn generate() -> Self {
        Self {
            secret: p521::SecretKey::random(&mut OsRng),
            key_pair_id: KeyPairId::generate(),
        }
    }

    pub fn new(secret: p521::SecretKey, key_pair_id: KeyPairId) -> Self {
        Self {
            secret,
            key_pair_id,
        }
    }

    pub fn key_pair_id(&self) -> &KeyPairId {
        &self.key_pair_id
    }

    pub(crate) fn secret(&self) -> &p521::SecretKey {
        &self.secret
    }

    /// Derive the public half. Pure: the same scalar always yields the same key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::new(self.secret.public_key(), self.key_pair_id.clone())
    }

    pub fn to_base64(&self) -> Result<String, CodecError> {
        codec::encode_private_key(&self.secret, self.key_pair_id.as_str())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CodecError> {
        let (secret, id) = codec::decode_private_key(encoded)?;
        Ok(Self::new(secret, id.into()))
    }

    /// Sign a message with the given protocol version at the current time.
    pub fn sign(&self, message: &str, version: ProtocolVersion) -> Result<String, SignatureError> {
        signature::sign(message, self, version)
    }

    /// Sign with a version given as its wire string (`"1.0"` or `"1.2"`).
    pub fn sign_message(&self, message: &str, version: &str) -> Result<String, SignatureError> {
        self.sign(message, version.parse()?)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("key_pair_id", &self.key_pair_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl FromStr for PrivateKey {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base64(s)
    }
}

/// A private key together with its derived public key.
#[derive(Clone, Debug)]
pub struct KeyPair {
    private: PrivateKey,
    public: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self::from_private(PrivateKey::generate())
    }

    pub fn from_private(private: PrivateKey) -> Self {
        let public = private.public_key();
        Self { private, public }
    }

    pub fn id(&self) -> &KeyPairId {
        self.private.key_pair_id()
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }
}

impl fmt::Display for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Key Pair ID: {}", self.id())?;
        match self.private.to_base64() {
            Ok(text) => writeln!(f, "Private Key: {text}")?,
            Err(e) => writeln!(f, "Private Key: <{e}>")?,
        }
        write!(f, "Public Key: {}", self.public.to_base64())
    }
}
