//! ECDSA over P-521 with a SHA-256 message digest.
//!
//! The digest is shorter than the curve order, so it is used as an integer
//! without truncation (left-padded to the field width). Every signature draws
//! a fresh random nonce from the OS.

use p521::ecdsa::Signature;
use p521::elliptic_curve::ops::Reduce;
use p521::elliptic_curve::point::AffineCoordinates;
use p521::elliptic_curve::{Curve, Field, PrimeField};
use p521::{FieldBytes, NistP521, NonZeroScalar, ProjectivePoint, PublicKey, Scalar, SecretKey};
use rand_core::OsRng;

type Uint = <NistP521 as Curve>::Uint;

/// Error type for the raw signature primitive.
#[derive(Debug, thiserror::Error)]
pub enum EcdsaError {
    #[error("malformed DER signature")]
    MalformedDer,
    #[error("signature scalars out of range")]
    InvalidScalars,
}

fn digest_scalar(digest: &[u8; 32]) -> Scalar {
    let mut bytes = FieldBytes::default();
    let offset = bytes.len() - digest.len();
    bytes[offset..].copy_from_slice(digest);
    <Scalar as Reduce<Uint>>::reduce_bytes(&bytes)
}

fn x_scalar(point: ProjectivePoint) -> Scalar {
    <Scalar as Reduce<Uint>>::reduce_bytes(&point.to_affine().x())
}

/// Sign a SHA-256 digest, returning the DER encoding of `(r, s)`.
pub fn sign_digest(secret: &SecretKey, digest: &[u8; 32]) -> Result<Vec<u8>, EcdsaError> {
    let d: Scalar = *secret.to_nonzero_scalar();
    let z = digest_scalar(digest);

    loop {
        let k: Scalar = *NonZeroScalar::random(&mut OsRng);
        let r = x_scalar(ProjectivePoint::GENERATOR * k);
        if bool::from(r.is_zero()) {
            continue;
        }
        let k_inv = Option::<Scalar>::from(<Scalar as Field>::invert(&k))
            .ok_or(EcdsaError::InvalidScalars)?;
        let s = k_inv * (z + r * d);
        if bool::from(s.is_zero()) {
            continue;
        }
        let signature = Signature::from_scalars(r.to_repr(), s.to_repr())
            .map_err(|_| EcdsaError::InvalidScalars)?;
        return Ok(signature.to_der().as_bytes().to_vec());
    }
}

/// Verify a DER signature over a SHA-256 digest.
///
/// Malformed DER is an error; a well-formed signature that does not match is
/// `Ok(false)`.
pub fn verify_digest(public: &PublicKey, digest: &[u8; 32], der: &[u8]) -> Result<bool, EcdsaError> {
    let signature = Signature::from_der(der).map_err(|_| EcdsaError::MalformedDer)?;
    let r: Scalar = *signature.r();
    let s: Scalar = *signature.s();

    let s_inv = Option::<Scalar>::from(<Scalar as Field>::invert(&s))
        .ok_or(EcdsaError::InvalidScalars)?;
    let z = digest_scalar(digest);
    let u1 = z * s_inv;
    let u2 = r * s_inv;

    let point = ProjectivePoint::GENERATOR * u1 + public.to_projective() * u2;
    Ok(x_scalar(point) == r)
}
