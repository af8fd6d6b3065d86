#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::canonical::canonicalize;
    use crate::codec::{decode_public_key, encode_public_key, CodecError};
    use crate::keys::{KeyPair, KeyPairId};
    use crate::signature::{sign_at, verify_at, ProtocolVersion, SignatureEnvelope};

    fn any_version() -> impl Strategy<Value = ProtocolVersion> {
        prop_oneof![Just(ProtocolVersion::Legacy), Just(ProtocolVersion::Compact)]
    }

    proptest! {
        // P-521 key generation dominates the run time
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn test_sign_verify_round_trip(
            message in any::<String>(),
            version in any_version(),
            timestamp in 0i64..4_000_000_000,
            skew in 0u64..10_000,
        ) {
            let pair = KeyPair::generate();
            let sig = sign_at(&message, pair.private_key(), version, timestamp).unwrap();
            prop_assert!(verify_at(&message, &sig, pair.public_key(), skew, timestamp).unwrap());
        }

        #[test]
        fn test_message_tamper_detected(
            message in "[a-z]{1,64}",
            idx in any::<prop::sample::Index>(),
            version in any_version(),
        ) {
            let pair = KeyPair::generate();
            let sig = sign_at(&message, pair.private_key(), version, 1000).unwrap();

            let mut bytes = message.into_bytes();
            let i = idx.index(bytes.len());
            bytes[i] = if bytes[i] == b'z' { b'a' } else { bytes[i] + 1 };
            let tampered = String::from_utf8(bytes).unwrap();

            prop_assert!(!verify_at(&tampered, &sig, pair.public_key(), 300, 1000).unwrap());
        }

        #[test]
        fn test_stale_signatures_rejected(
            age in 301i64..1_000_000,
        ) {
            let pair = KeyPair::generate();
            let now = 2_000_000;
            let sig = sign_at("m", pair.private_key(), ProtocolVersion::Compact, now - age).unwrap();
            prop_assert!(!verify_at("m", &sig, pair.public_key(), 300, now).unwrap());
        }

        #[test]
        fn test_envelope_encoding_stable(
            id in "[0-9a-f]{32}",
            timestamp in any::<i64>(),
            signature in prop::collection::vec(any::<u8>(), 0..160),
            version in any_version(),
        ) {
            let envelope = SignatureEnvelope {
                version,
                key_pair_id: KeyPairId::from(id),
                timestamp,
                signature,
            };
            prop_assert_eq!(SignatureEnvelope::decode(&envelope.encode()).unwrap(), envelope);
        }

        #[test]
        fn test_public_key_text_round_trip(id in "[0-9a-f]{32}") {
            let pair = KeyPair::generate();
            let text = encode_public_key(pair.public_key().point(), &id);
            let (point, decoded_id) = decode_public_key(&text).unwrap();
            prop_assert_eq!(&point, pair.public_key().point());
            prop_assert_eq!(decoded_id, id);
        }

        #[test]
        fn test_garbage_key_text_never_panics(text in ".{0,200}") {
            // Any input must come back as a value or a CodecError.
            let result: Result<_, CodecError> = decode_public_key(&text);
            let _ = result;
        }

        #[test]
        fn test_canonicalize_ignores_insertion_order(
            entries in prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..8),
        ) {
            let forward: serde_json::Map<String, serde_json::Value> = entries
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::from(*v)))
                .collect();
            let reverse: serde_json::Map<String, serde_json::Value> = entries
                .iter()
                .rev()
                .map(|(k, v)| (k.clone(), serde_json::Value::from(*v)))
                .collect();
            prop_assert_eq!(
                canonicalize(&serde_json::Value::Object(forward)),
                canonicalize(&serde_json::Value::Object(reverse))
            );
        }
    }
}
