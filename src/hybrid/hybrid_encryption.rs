//! Hybrid Encryption
//!
//! Two-layer envelope construction:
//! 1. The payload is sealed under a fresh random 256-bit DEK
//! 2. A shared secret is encapsulated against the recipient's ML-KEM key
//! 3. The shared secret is expanded into a wrapping key (`DEK-wrap-v1`)
//! 4. The DEK is sealed under the wrapping key
//!
//! The payload AEAD also authenticates the envelope's metadata hash, tying
//! the `{algorithm, keyId, timestamp}` header to this exact payload.

use zeroize::Zeroizing;

use crate::aes::{self, AesGcm, KEY_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crate::hybrid::envelope::{compute_metadata_hash, EncryptedEnvelope};
use crate::kdf;
use crate::kyber::{KyberPublicKey, KyberVariant};
use crate::utils;

/// Encrypt `plaintext` for the holder of `recipient_public_key`
pub fn encrypt_hybrid(
    plaintext: &[u8],
    recipient_public_key: &KyberPublicKey,
    key_id: &str,
) -> CryptoResult<EncryptedEnvelope> {
    if key_id.is_empty() {
        return Err(CryptoError::invalid_parameter("key_id", "non-empty key id", "empty"));
    }

    let algorithm = recipient_public_key.algorithm.algorithm_name().to_string();
    let timestamp = utils::now_millis();
    let metadata_hash = compute_metadata_hash(&algorithm, key_id, timestamp)?;

    let dek = Zeroizing::new(utils::random_bytes(KEY_SIZE)?);
    let nonce = AesGcm::generate_nonce()?;
    let ciphertext = aes::seal(&dek, &nonce, plaintext, Some(&metadata_hash))?;

    let (kem_ciphertext, shared_secret) = recipient_public_key.encapsulate()?;
    let shared_secret = Zeroizing::new(shared_secret);
    let wrap_key = kdf::derive_wrap_key(&shared_secret)?;

    let dek_nonce = AesGcm::generate_nonce()?;
    let wrapped_dek = aes::seal(&wrap_key, &dek_nonce, &dek, None)?;

    log::debug!(
        "Sealed {} byte payload for key {} with {}",
        plaintext.len(),
        key_id,
        algorithm
    );

    Ok(EncryptedEnvelope {
        ciphertext,
        kem_ciphertext,
        wrapped_dek,
        nonce,
        dek_nonce,
        algorithm,
        key_id: key_id.to_string(),
        timestamp,
        metadata_hash,
    })
}

/// Decrypt an envelope with the recipient's raw ML-KEM secret key
///
/// Metadata integrity is checked before any key material is touched. Every
/// AEAD failure is an `AuthenticationError`; nothing partial is returned.
pub fn decrypt_hybrid(envelope: &EncryptedEnvelope, recipient_secret_key: &[u8]) -> CryptoResult<Vec<u8>> {
    envelope.validate()?;
    envelope.verify_metadata()?;

    let variant: KyberVariant = envelope.algorithm.parse()?;
    let shared_secret = Zeroizing::new(variant.decapsulate(&envelope.kem_ciphertext, recipient_secret_key)?);
    let wrap_key = kdf::derive_wrap_key(&shared_secret)?;

    let dek = Zeroizing::new(
        aes::open(&wrap_key, &envelope.dek_nonce, &envelope.wrapped_dek, None).map_err(|_| {
            log::warn!("DEK unwrap failed for key {}", envelope.key_id);
            CryptoError::authentication_error("dek-unwrap")
        })?,
    );
    if dek.len() != KEY_SIZE {
        return Err(CryptoError::authentication_error("dek-unwrap"));
    }

    aes::open(&dek, &envelope.nonce, &envelope.ciphertext, Some(&envelope.metadata_hash)).map_err(|_| {
        log::warn!("Payload authentication failed for key {}", envelope.key_id);
        CryptoError::authentication_error("payload")
    })
}
