use sha2::{Digest, Sha256};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(data);
    h.finalize().into()
}

/// Error returned when fingerprinting empty input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("cannot fingerprint empty input")]
pub struct EmptyInput;

/// Hex SHA-256 of a text value.
///
/// Directories report `privateKeyHash` in this form, so a holder of the
/// encoded private key can check it against the published record.
pub fn fingerprint(text: &str) -> Result<String, EmptyInput> {
    if text.is_empty() {
        return Err(EmptyInput);
    }
    Ok(hex::encode(sha256(text.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_known_vector() {
        assert_eq!(
            fingerprint("abc").unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_fingerprint_rejects_empty() {
        assert_eq!(fingerprint(""), Err(EmptyInput));
    }
}
