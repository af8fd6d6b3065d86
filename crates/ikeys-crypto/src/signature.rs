//! Versioned message signatures.
//!
//! A signature is an opaque base64 envelope carrying the signer's key-pair
//! ID, the signing timestamp and the DER-encoded ECDSA signature. Two wire
//! versions coexist and both stay supported:
//!
//! ```text
//! 1.0: b64( {"id": <id>, "signature": b64(DER), "timestamp": <secs>} )
//! 1.2: b64( {"i": <id>, "s": b64(DER), "t": <secs>, "v": "1.2"} )
//! ```
//!
//! The signed bytes are never transmitted. Both sides rebuild a canonical
//! JSON payload from the message, key-pair ID and timestamp and hash it
//! with SHA-256.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::canonical::canonicalize;
use crate::dsa::{self, EcdsaError};
use crate::encoding::{b64_decode, b64_encode};
use crate::hash::sha256;
use crate::keys::{KeyPairId, PrivateKey, PublicKey};

/// Default tolerance for signature age.
pub const DEFAULT_MAX_CLOCK_SKEW_SECS: u64 = 300;

const COMPACT_TAG: &str = "1.2";
const LEGACY_TAG: &str = "1.0";

/// Error type for signing and verification.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("unsupported signature version: {0}")]
    UnsupportedVersion(String),
    #[error("invalid base64 in {layer}: {source}")]
    Base64 {
        layer: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    #[error("invalid signature envelope JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing field '{0}' in signature envelope")]
    MissingField(&'static str),
    #[error("signature encoding: {0}")]
    Ecdsa(#[from] EcdsaError),
    #[error("system clock is before the unix epoch")]
    Clock,
}

/// Envelope wire version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// `1.0`: long field names, no version tag.
    Legacy,
    /// `1.2`: single-letter field names, tagged `"v": "1.2"`.
    #[default]
    Compact,
}

impl ProtocolVersion {
    pub const fn as_str(self) -> &'static str {
        match self {
            ProtocolVersion::Legacy => LEGACY_TAG,
            ProtocolVersion::Compact => COMPACT_TAG,
        }
    }

    /// Canonical payload bytes that get hashed and signed.
    pub fn signing_payload(self, key_pair_id: &str, message: &str, timestamp: i64) -> String {
        let payload = match self {
            ProtocolVersion::Legacy => json!({
                "id": key_pair_id,
                "message": message,
                "timestamp": timestamp,
            }),
            ProtocolVersion::Compact => json!({
                "i": key_pair_id,
                "m": message,
                "t": timestamp,
            }),
        };
        canonicalize(&payload)
    }
}

impl FromStr for ProtocolVersion {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            LEGACY_TAG => Ok(ProtocolVersion::Legacy),
            COMPACT_TAG => Ok(ProtocolVersion::Compact),
            other => Err(SignatureError::UnsupportedVersion(other.to_string())),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope fields of both versions. Which set is read depends on `v`.
#[derive(Deserialize)]
struct RawEnvelope {
    v: Option<Value>,
    id: Option<String>,
    signature: Option<String>,
    timestamp: Option<i64>,
    i: Option<String>,
    s: Option<String>,
    t: Option<i64>,
}

impl RawEnvelope {
    fn parse(text: &str) -> Result<Self, SignatureError> {
        let json = b64_decode(text).map_err(|source| SignatureError::Base64 {
            layer: "envelope",
            source,
        })?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// A present tag selects the compact field names; its absence means 1.0.
    fn version(&self) -> Result<ProtocolVersion, SignatureError> {
        match &self.v {
            None => Ok(ProtocolVersion::Legacy),
            Some(Value::String(tag)) if tag == COMPACT_TAG => Ok(ProtocolVersion::Compact),
            Some(Value::String(other)) => Err(SignatureError::UnsupportedVersion(other.clone())),
            Some(other) => Err(SignatureError::UnsupportedVersion(other.to_string())),
        }
    }

    fn take_key_pair_id(&mut self, version: ProtocolVersion) -> Result<KeyPairId, SignatureError> {
        let (field, name) = match version {
            ProtocolVersion::Legacy => (self.id.take(), "id"),
            ProtocolVersion::Compact => (self.i.take(), "i"),
        };
        field.map(KeyPairId::from).ok_or(SignatureError::MissingField(name))
    }
}

/// A decoded signature envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureEnvelope {
    pub version: ProtocolVersion,
    pub key_pair_id: KeyPairId,
    pub timestamp: i64,
    /// DER-encoded `(r, s)`.
    pub signature: Vec<u8>,
}

impl SignatureEnvelope {
    /// Serialize to the opaque header text.
    pub fn encode(&self) -> String {
        let signature = b64_encode(&self.signature);
        let body = match self.version {
            ProtocolVersion::Legacy => json!({
                "id": self.key_pair_id.as_str(),
                "signature": signature,
                "timestamp": self.timestamp,
            }),
            ProtocolVersion::Compact => json!({
                "i": self.key_pair_id.as_str(),
                "s": signature,
                "t": self.timestamp,
                "v": COMPACT_TAG,
            }),
        };
        b64_encode(body.to_string())
    }

    pub fn decode(text: &str) -> Result<Self, SignatureError> {
        let mut raw = RawEnvelope::parse(text)?;
        let version = raw.version()?;
        let key_pair_id = raw.take_key_pair_id(version)?;
        let (signature, timestamp) = match version {
            ProtocolVersion::Legacy => (
                raw.signature.ok_or(SignatureError::MissingField("signature"))?,
                raw.timestamp.ok_or(SignatureError::MissingField("timestamp"))?,
            ),
            ProtocolVersion::Compact => (
                raw.s.ok_or(SignatureError::MissingField("s"))?,
                raw.t.ok_or(SignatureError::MissingField("t"))?,
            ),
        };
        let signature = b64_decode(&signature).map_err(|source| SignatureError::Base64 {
            layer: "signature",
            source,
        })?;
        Ok(Self {
            version,
            key_pair_id,
            timestamp,
            signature,
        })
    }
}

pub fn unix_now() -> Result<i64, SignatureError> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| SignatureError::Clock)?;
    Ok(elapsed.as_secs() as i64)
}

/// Sign `message` at the current time.
pub fn sign(message: &str, key: &PrivateKey, version: ProtocolVersion) -> Result<String, SignatureError> {
    sign_at(message, key, version, unix_now()?)
}

/// Sign `message` with an explicit timestamp.
pub fn sign_at(
    message: &str,
    key: &PrivateKey,
    version: ProtocolVersion,
    timestamp: i64,
) -> Result<String, SignatureError> {
    let payload = version.signing_payload(key.key_pair_id().as_str(), message, timestamp);
    let signature = dsa::sign_digest(key.secret(), &sha256(payload.as_bytes()))?;
    let envelope = SignatureEnvelope {
        version,
        key_pair_id: key.key_pair_id().clone(),
        timestamp,
        signature,
    };
    Ok(envelope.encode())
}

/// Verify an envelope against `key` using the current time.
pub fn verify(
    message: &str,
    envelope: &str,
    key: &PublicKey,
    max_clock_skew_secs: u64,
) -> Result<bool, SignatureError> {
    verify_at(message, envelope, key, max_clock_skew_secs, unix_now()?)
}

/// Verify an envelope against `key` as of `now`.
///
/// Returns `Ok(false)` when the envelope names a different key pair, is
/// older than `max_clock_skew_secs`, or does not match cryptographically.
/// Timestamps ahead of `now` are not rejected. Any decoding failure is an
/// error.
pub fn verify_at(
    message: &str,
    envelope: &str,
    key: &PublicKey,
    max_clock_skew_secs: u64,
    now: i64,
) -> Result<bool, SignatureError> {
    let envelope = SignatureEnvelope::decode(envelope)?;

    if envelope.key_pair_id != *key.key_pair_id() {
        debug!(
            envelope_id = %envelope.key_pair_id,
            key_id = %key.key_pair_id(),
            "signature rejected: key pair mismatch"
        );
        return Ok(false);
    }

    let max_age = i64::try_from(max_clock_skew_secs).unwrap_or(i64::MAX);
    if now.saturating_sub(envelope.timestamp) > max_age {
        debug!(
            timestamp = envelope.timestamp,
            now,
            max_age,
            "signature rejected: timestamp outside clock skew"
        );
        return Ok(false);
    }

    let payload = envelope.version.signing_payload(
        envelope.key_pair_id.as_str(),
        message,
        envelope.timestamp,
    );
    let valid = dsa::verify_digest(key.point(), &sha256(payload.as_bytes()), &envelope.signature)?;
    if !valid {
        debug!(key_id = %key.key_pair_id(), "signature rejected: ECDSA mismatch");
    }
    Ok(valid)
}

/// Read the key-pair ID from an envelope without verifying it.
pub fn extract_key_pair_id(envelope: &str) -> Result<KeyPairId, SignatureError> {
    let mut raw = RawEnvelope::parse(envelope)?;
    let version = raw.version()?;
    raw.take_key_pair_id(version)
}

/// Report the wire version of an envelope.
pub fn signature_version(envelope: &str) -> Result<ProtocolVersion, SignatureError> {
    RawEnvelope::parse(envelope)?.version()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    fn envelope_json(text: &str) -> Value {
        serde_json::from_slice(&b64_decode(text).unwrap()).unwrap()
    }

    fn encode_json(value: &Value) -> String {
        b64_encode(value.to_string())
    }

    #[test]
    fn test_round_trip_both_versions() {
        let pair = KeyPair::generate();
        for version in [ProtocolVersion::Legacy, ProtocolVersion::Compact] {
            let sig = sign("payload body", pair.private_key(), version).unwrap();
            assert!(verify("payload body", &sig, pair.public_key(), 0).unwrap());
        }
    }

    #[test]
    fn test_concrete_scenario() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let sig = sign_at("hello", a.private_key(), ProtocolVersion::Compact, 1000).unwrap();

        assert!(verify_at("hello", &sig, a.public_key(), 300, 1100).unwrap());
        assert!(!verify_at("hello", &sig, b.public_key(), 300, 1100).unwrap());
    }

    #[test]
    fn test_clock_skew_boundary() {
        let pair = KeyPair::generate();
        let now = 1_700_000_000;

        let stale = sign_at("m", pair.private_key(), ProtocolVersion::Compact, now - 301).unwrap();
        assert!(!verify_at("m", &stale, pair.public_key(), 300, now).unwrap());

        let fresh = sign_at("m", pair.private_key(), ProtocolVersion::Compact, now - 299).unwrap();
        assert!(verify_at("m", &fresh, pair.public_key(), 300, now).unwrap());

        let edge = sign_at("m", pair.private_key(), ProtocolVersion::Compact, now - 300).unwrap();
        assert!(verify_at("m", &edge, pair.public_key(), 300, now).unwrap());
    }

    #[test]
    fn test_future_timestamp_accepted() {
        let pair = KeyPair::generate();
        let sig = sign_at("m", pair.private_key(), ProtocolVersion::Legacy, 10_000).unwrap();
        assert!(verify_at("m", &sig, pair.public_key(), 300, 1_000).unwrap());
    }

    #[test]
    fn test_tampered_message_rejected() {
        let pair = KeyPair::generate();
        let sig = sign("original", pair.private_key(), ProtocolVersion::Compact).unwrap();
        assert!(!verify("originaL", &sig, pair.public_key(), 300).unwrap());
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let pair = KeyPair::generate();
        let sig = sign("message", pair.private_key(), ProtocolVersion::Compact).unwrap();
        let mut envelope = SignatureEnvelope::decode(&sig).unwrap();
        let last = envelope.signature.len() - 1;
        envelope.signature[last] ^= 0x01;
        assert!(!verify("message", &envelope.encode(), pair.public_key(), 300).unwrap());
    }

    #[test]
    fn test_rewritten_timestamp_rejected() {
        let pair = KeyPair::generate();
        let sig = sign_at("m", pair.private_key(), ProtocolVersion::Compact, 5_000).unwrap();
        let mut envelope = SignatureEnvelope::decode(&sig).unwrap();
        envelope.timestamp += 1;
        assert!(!verify_at("m", &envelope.encode(), pair.public_key(), 300, 5_000).unwrap());
    }

    #[test]
    fn test_swapped_public_key_rejected_by_id() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        // A's point under B's ID: the math would pass, the ID binding must not.
        let mislabeled = PublicKey::new(a.public_key().point().clone(), b.id().clone());
        let sig = sign("m", a.private_key(), ProtocolVersion::Compact).unwrap();
        assert!(!verify("m", &sig, &mislabeled, 300).unwrap());
    }

    #[test]
    fn test_legacy_wire_format() {
        let pair = KeyPair::generate();
        let sig = sign_at("m", pair.private_key(), ProtocolVersion::Legacy, 42).unwrap();
        let json = envelope_json(&sig);
        let obj = json.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, ["id", "signature", "timestamp"]);
        assert_eq!(obj["id"], pair.id().as_str());
        assert_eq!(obj["timestamp"], 42);
    }

    #[test]
    fn test_compact_wire_format() {
        let pair = KeyPair::generate();
        let sig = sign_at("m", pair.private_key(), ProtocolVersion::Compact, 42).unwrap();
        let json = envelope_json(&sig);
        let obj = json.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, ["i", "s", "t", "v"]);
        assert_eq!(obj["v"], "1.2");
        assert_eq!(obj["t"], 42);
    }

    #[test]
    fn test_version_detection() {
        let pair = KeyPair::generate();
        let legacy = sign("m", pair.private_key(), ProtocolVersion::Legacy).unwrap();
        let compact = sign("m", pair.private_key(), ProtocolVersion::Compact).unwrap();
        assert_eq!(signature_version(&legacy).unwrap(), ProtocolVersion::Legacy);
        assert_eq!(signature_version(&compact).unwrap(), ProtocolVersion::Compact);
    }

    #[test]
    fn test_unknown_version_tag_is_an_error() {
        let pair = KeyPair::generate();
        let sig = sign("m", pair.private_key(), ProtocolVersion::Compact).unwrap();
        let mut json = envelope_json(&sig);
        json["v"] = Value::from("9.9");
        let tampered = encode_json(&json);

        assert!(matches!(
            verify("m", &tampered, pair.public_key(), 300),
            Err(SignatureError::UnsupportedVersion(v)) if v == "9.9"
        ));
        assert!(matches!(
            extract_key_pair_id(&tampered),
            Err(SignatureError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_non_string_version_tag_is_unsupported() {
        let pair = KeyPair::generate();
        let sig = sign("m", pair.private_key(), ProtocolVersion::Compact).unwrap();
        let mut json = envelope_json(&sig);
        json["v"] = json!(1.2);
        let tampered = encode_json(&json);

        assert!(matches!(
            extract_key_pair_id(&tampered),
            Err(SignatureError::UnsupportedVersion(v)) if v == "1.2"
        ));
        assert!(matches!(
            signature_version(&tampered),
            Err(SignatureError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_tag_with_legacy_fields_is_missing_compact_fields() {
        let json = json!({"id": "abc", "signature": "AA==", "timestamp": 1, "v": "1.2"});
        assert!(matches!(
            SignatureEnvelope::decode(&encode_json(&json)),
            Err(SignatureError::MissingField("i"))
        ));
    }

    #[test]
    fn test_extract_key_pair_id_both_versions() {
        let pair = KeyPair::generate();
        for version in [ProtocolVersion::Legacy, ProtocolVersion::Compact] {
            let sig = sign("m", pair.private_key(), version).unwrap();
            assert_eq!(extract_key_pair_id(&sig).unwrap(), *pair.id());
        }
    }

    #[test]
    fn test_extract_accepts_unpadded_envelope() {
        let pair = KeyPair::generate();
        let sig = sign("m", pair.private_key(), ProtocolVersion::Compact).unwrap();
        let unpadded = sig.trim_end_matches('=');
        assert_eq!(extract_key_pair_id(unpadded).unwrap(), *pair.id());
    }

    #[test]
    fn test_malformed_envelopes_are_errors() {
        let pair = KeyPair::generate();
        assert!(matches!(
            verify("m", "%%%", pair.public_key(), 300),
            Err(SignatureError::Base64 { layer: "envelope", .. })
        ));
        assert!(matches!(
            verify("m", &b64_encode("[1,2"), pair.public_key(), 300),
            Err(SignatureError::Json(_))
        ));

        let bad_der = json!({"i": pair.id().as_str(), "s": b64_encode(b"nope"), "t": 1, "v": "1.2"});
        assert!(matches!(
            verify_at("m", &encode_json(&bad_der), pair.public_key(), 300, 1),
            Err(SignatureError::Ecdsa(EcdsaError::MalformedDer))
        ));
    }

    #[test]
    fn test_id_mismatch_short_circuits_before_der() {
        // A foreign ID is a clean rejection even when the signature bytes are junk.
        let pair = KeyPair::generate();
        let json = json!({"i": "someone-else", "s": b64_encode(b"junk"), "t": 1, "v": "1.2"});
        assert!(!verify_at("m", &encode_json(&json), pair.public_key(), 300, 1).unwrap());
    }

    #[test]
    fn test_signing_payloads_are_canonical() {
        assert_eq!(
            ProtocolVersion::Compact.signing_payload("abc", "hello", 1000),
            r#"{"i":"abc","m":"hello","t":1000}"#
        );
        assert_eq!(
            ProtocolVersion::Legacy.signing_payload("abc", "hello", 1000),
            r#"{"id":"abc","message":"hello","timestamp":1000}"#
        );
    }

    #[test]
    fn test_protocol_version_parse() {
        assert_eq!("1.0".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::Legacy);
        assert_eq!("1.2".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::Compact);
        assert!("1.1".parse::<ProtocolVersion>().is_err());
        assert_eq!(ProtocolVersion::default(), ProtocolVersion::Compact);
    }
}
