#![forbid(unsafe_code)]

//! Key material, key text encoding and versioned message signatures.
//!
//! All key pairs live on NIST P-521. Messages are signed with ECDSA over the
//! SHA-256 digest of a canonical JSON payload, and the signature travels as
//! a base64 envelope in one of two wire versions (`1.0` and `1.2`).

pub mod canonical;
pub mod codec;
pub mod dsa;
pub mod encoding;
pub mod hash;
pub mod keys;
pub mod signature;

#[cfg(test)]
mod proptests;

pub use codec::CodecError;
pub use keys::{KeyPair, KeyPairId, PrivateKey, PublicKey};
pub use signature::{ProtocolVersion, SignatureEnvelope, SignatureError, DEFAULT_MAX_CLOCK_SKEW_SECS};
