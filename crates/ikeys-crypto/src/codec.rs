//! Text encoding of P-521 keys.
//!
//! Both key kinds use the same base64-of-JSON-of-base64 layout:
//!
//! ```text
//! public:  b64( {"i": <key pair id>, "u": b64(SEC1 compressed point)} )
//! private: b64( {"i": <key pair id>, "r": b64(SEC1 ECPrivateKey DER)} )
//! ```
//!
//! The point and scalar live under different JSON keys so a private key can
//! never be mistaken for a public one.

use p521::elliptic_curve::sec1::ToEncodedPoint;
use p521::{PublicKey, SecretKey};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::encoding::{b64_decode, b64_encode};

const PUBLIC_FIELD: &str = "u";
const PRIVATE_FIELD: &str = "r";

/// Error type for key text encoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid base64 in {layer}: {source}")]
    Base64 {
        layer: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    #[error("invalid key JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing key '{field}' in {kind} key map")]
    MissingField {
        field: &'static str,
        kind: &'static str,
    },
    #[error("point is not on the P-521 curve")]
    InvalidPoint,
    #[error("invalid private scalar")]
    InvalidScalar,
    #[error("failed to DER-encode private key")]
    Der,
}

#[derive(Deserialize)]
struct KeyText {
    i: Option<String>,
    u: Option<String>,
    r: Option<String>,
}

impl KeyText {
    fn parse(encoded: &str) -> Result<Self, CodecError> {
        let json = b64_decode(encoded).map_err(|source| CodecError::Base64 {
            layer: "key text",
            source,
        })?;
        Ok(serde_json::from_slice(&json)?)
    }

    fn key_pair_id(&mut self, kind: &'static str) -> Result<String, CodecError> {
        self.i
            .take()
            .ok_or(CodecError::MissingField { field: "i", kind })
    }
}

fn wrap(material_field: &str, material: &[u8], key_pair_id: &str) -> String {
    let mut inner = Map::new();
    inner.insert("i".to_string(), Value::from(key_pair_id));
    inner.insert(material_field.to_string(), Value::from(b64_encode(material)));
    b64_encode(Value::Object(inner).to_string())
}

/// Encode a public point together with its key-pair ID.
pub fn encode_public_key(point: &PublicKey, key_pair_id: &str) -> String {
    let compressed = point.to_encoded_point(true);
    wrap(PUBLIC_FIELD, compressed.as_bytes(), key_pair_id)
}

/// Decode a public key text, validating that the point lies on the curve.
pub fn decode_public_key(encoded: &str) -> Result<(PublicKey, String), CodecError> {
    let mut text = KeyText::parse(encoded)?;
    let point_b64 = text.u.take().ok_or(CodecError::MissingField {
        field: PUBLIC_FIELD,
        kind: "public",
    })?;
    let key_pair_id = text.key_pair_id("public")?;

    let point_bytes = b64_decode(&point_b64).map_err(|source| CodecError::Base64 {
        layer: "public point",
        source,
    })?;
    let point = PublicKey::from_sec1_bytes(&point_bytes).map_err(|_| CodecError::InvalidPoint)?;
    Ok((point, key_pair_id))
}

/// Encode a private scalar as SEC1 DER together with its key-pair ID.
pub fn encode_private_key(secret: &SecretKey, key_pair_id: &str) -> Result<String, CodecError> {
    let der = secret.to_sec1_der().map_err(|_| CodecError::Der)?;
    Ok(wrap(PRIVATE_FIELD, &der, key_pair_id))
}

/// Decode a private key text.
///
/// The scalar is expected as SEC1 DER. Key material issued before DER
/// wrapping carried the bare big-endian scalar; that form is accepted when
/// the bytes do not parse as DER.
pub fn decode_private_key(encoded: &str) -> Result<(SecretKey, String), CodecError> {
    let mut text = KeyText::parse(encoded)?;
    let scalar_b64 = text.r.take().ok_or(CodecError::MissingField {
        field: PRIVATE_FIELD,
        kind: "private",
    })?;
    let key_pair_id = text.key_pair_id("private")?;

    let scalar_bytes = zeroize::Zeroizing::new(b64_decode(&scalar_b64).map_err(|source| {
        CodecError::Base64 {
            layer: "private scalar",
            source,
        }
    })?);
    let secret = SecretKey::from_sec1_der(&scalar_bytes)
        .or_else(|_| SecretKey::from_slice(&scalar_bytes))
        .map_err(|_| CodecError::InvalidScalar)?;
    Ok((secret, key_pair_id))
}
