use super::*;

#[test]
fn test_sign_verify_all_variants() {
    for variant in DilithiumVariant::ALL.iter() {
        let key_pair = DilithiumKeyPair::generate(*variant).unwrap();
        assert_eq!(key_pair.public_key.len(), variant.public_key_size());

        let message = b"ship it";
        let signature = key_pair.sign(message).unwrap();
        assert!(key_pair.verify(message, &signature));
        assert!(key_pair.public_key().verify(message, &signature));
    }
}

#[test]
fn test_modified_message_fails() {
    let key_pair = DilithiumKeyPair::generate(DilithiumVariant::Dilithium3).unwrap();
    let signature = key_pair.sign(b"original").unwrap();
    assert!(!key_pair.verify(b"modified", &signature));
}

#[test]
fn test_malformed_signature_returns_false() {
    let key_pair = DilithiumKeyPair::generate(DilithiumVariant::Dilithium2).unwrap();
    assert!(!key_pair.verify(b"message", &[]));
    assert!(!key_pair.verify(b"message", &[0u8; 17]));
    assert!(!DilithiumVariant::Dilithium2.verify(b"message", &[1u8; 2420], &[0u8; 3]));
}

#[test]
fn test_tampered_signature_fails() {
    let key_pair = DilithiumKeyPair::generate(DilithiumVariant::Dilithium3).unwrap();
    let mut signature = key_pair.sign(b"message").unwrap();
    signature[10] ^= 0x01;
    assert!(!key_pair.verify(b"message", &signature));
}

#[test]
fn test_large_message_is_signed_via_digest() {
    let key_pair = DilithiumKeyPair::generate(DilithiumVariant::Dilithium2).unwrap();
    let message = vec![0xA5u8; 1 << 20];
    let signature = key_pair.sign(&message).unwrap();
    assert!(key_pair.verify(&message, &signature));
    assert_eq!(message_digest(&message).len(), MESSAGE_DIGEST_SIZE);
}

#[test]
fn test_key_pair_consistency() {
    let key_pair = DilithiumKeyPair::generate(DilithiumVariant::Dilithium5).unwrap();
    assert!(key_pair.verify_key_pair().is_ok());
}

#[test]
fn test_algorithm_names() {
    assert_eq!(DilithiumVariant::Dilithium3.algorithm_name(), "ML-DSA-65");
    assert_eq!(
        "ML-DSA-87".parse::<DilithiumVariant>().unwrap(),
        DilithiumVariant::Dilithium5
    );
    assert!("HS256".parse::<DilithiumVariant>().is_err());
}
