/*!
 * PQC Envelope
 *
 * Post-quantum hybrid envelope encryption and key lifecycle management for
 * protected health information.
 *
 * The building blocks are:
 *
 * - ML-KEM (Kyber) for key encapsulation
 * - ML-DSA (Dilithium) for digital signatures
 * - HKDF-SHA256 for context-separated key derivation
 * - AES-256-GCM for authenticated payload and key wrapping
 *
 * A payload is sealed under a fresh data encryption key, which is in turn
 * wrapped under a key derived from an ML-KEM shared secret. The key manager
 * generates, indexes, rotates and retires the key pairs those envelopes are
 * addressed to.
 */

/// ML-KEM adapter for key encapsulation
pub mod kyber;

/// ML-DSA adapter for digital signatures
pub mod dilithium;

/// NIST security tiers mapping to KEM and signature parameter sets
pub mod security_level;

/// HKDF key derivation with typed contexts
pub mod kdf;

/// AES-GCM implementation for symmetric encryption
pub mod aes;

/// Envelope format, hybrid engine, field codec and multi-recipient fan-out
pub mod hybrid;

/// Key manager, key store and rotation scheduler
pub mod key_management;

/// Signed session tokens and request signatures
pub mod signing;

/// Runtime configuration
pub mod config;

/// Common error types for the cryptography module
pub mod error;

/// Utilities for cryptographic operations
pub mod utils;

pub use config::PqcConfig;
pub use dilithium::DilithiumKeyPair;
pub use dilithium::DilithiumPublicKey;
pub use dilithium::DilithiumVariant;
pub use error::{CryptoError, CryptoResult};
pub use hybrid::{
    decrypt_hybrid, deserialize_encrypted_data, encrypt_for_multiple, encrypt_hybrid,
    serialize_encrypted_data, EncryptedEnvelope, Recipient, Record,
};
pub use key_management::{KeyManager, KeyStatus, KeyType, RotationScheduler};
pub use kyber::KyberKeyPair;
pub use kyber::KyberPublicKey;
pub use kyber::KyberVariant;
pub use security_level::SecurityLevel;
pub use signing::{PqcApiSigner, PqcJwtSigner};

/// Initialize the cryptography module.
///
/// Initializes liboqs. Call once before any other function; repeated calls
/// are harmless.
///
/// # Example
///
/// ```
/// use pqc_envelope::prelude::*;
///
/// fn main() -> Result<(), CryptoError> {
///     init()?;
///     Ok(())
/// }
/// ```
pub fn init() -> Result<(), CryptoError> {
    oqs::init();
    log::debug!("liboqs initialized");
    Ok(())
}

/// The types and functions most applications need.
pub mod prelude {
    pub use crate::decrypt_phi;
    pub use crate::encrypt_phi;
    pub use crate::init;
    pub use crate::open_with_key_manager;
    pub use crate::seal_for_key_type;
    pub use crate::config::PqcConfig;
    pub use crate::hybrid::{
        decrypt_fields, decrypt_hybrid, deserialize_encrypted_data, encrypt_fields,
        encrypt_for_multiple, encrypt_hybrid, serialize_encrypted_data, EncryptedEnvelope,
        Recipient, Record,
    };
    pub use crate::key_management::{
        KeyGenerationOptions, KeyManager, KeyMetadata, KeyStatus, KeyType, RotationResult,
        RotationScheduler, StoredKey,
    };
    pub use crate::signing::{PqcApiSigner, PqcJwtSigner, SignedRequestHeaders};
    pub use crate::CryptoError;
    pub use crate::CryptoResult;
    pub use crate::DilithiumKeyPair;
    pub use crate::DilithiumPublicKey;
    pub use crate::DilithiumVariant;
    pub use crate::KyberKeyPair;
    pub use crate::KyberPublicKey;
    pub use crate::KyberVariant;
    pub use crate::SecurityLevel;
}

/// Encrypt the named PHI fields of `record` for one recipient
///
/// Each present, non-null field is replaced by a serialized envelope and
/// marked with a sibling `<field>_encrypted: true`.
///
/// # Example
///
/// ```
/// use pqc_envelope::prelude::*;
/// use serde_json::json;
///
/// # fn main() -> Result<(), CryptoError> {
/// init()?;
/// let key_pair = KyberKeyPair::generate(SecurityLevel::Level3.kem_variant())?;
/// let record = json!({"id": "pt-001", "diagnosis": "B20"}).as_object().cloned().unwrap_or_default();
///
/// let sealed = encrypt_phi(&record, &["diagnosis"], &key_pair.public_key(), "phi-key-1")?;
/// assert_eq!(sealed["diagnosis_encrypted"], json!(true));
///
/// let opened = decrypt_phi(&sealed, &["diagnosis"], &key_pair.secret_key)?;
/// assert_eq!(opened, record);
/// # Ok(())
/// # }
/// ```
pub fn encrypt_phi(
    record: &Record,
    field_names: &[&str],
    recipient_public_key: &KyberPublicKey,
    key_id: &str,
) -> CryptoResult<Record> {
    hybrid::encrypt_fields(record, field_names, recipient_public_key, key_id)
}

/// Reverse [`encrypt_phi`] for the marked fields among `field_names`
pub fn decrypt_phi(record: &Record, field_names: &[&str], recipient_secret_key: &[u8]) -> CryptoResult<Record> {
    hybrid::decrypt_fields(record, field_names, recipient_secret_key)
}

/// Encrypt for the current primary key of `key_type`
///
/// The use is reserved against the key's cap before encrypting, so a failed
/// encryption still counts. Fails with `KeyNotFound` when no active key
/// exists and with a key-management error when the primary key's usage cap
/// is spent.
pub fn seal_for_key_type(
    manager: &KeyManager,
    key_type: KeyType,
    plaintext: &[u8],
) -> CryptoResult<EncryptedEnvelope> {
    let key = manager.checkout_encryption_key(key_type)?;
    hybrid::encrypt_hybrid(plaintext, &key.kem_public_key()?, key.key_id())
}

/// Decrypt with the managed key named by the envelope's `keyId`
///
/// Deprecated and compromised keys still decrypt; destroyed keys do not.
pub fn open_with_key_manager(manager: &KeyManager, envelope: &EncryptedEnvelope) -> CryptoResult<Vec<u8>> {
    let key_pair = manager.get_key_pair(&envelope.key_id)?;
    if !key_pair.algorithm.is_kem() {
        return Err(CryptoError::invalid_parameter(
            "keyId",
            "an encryption key",
            key_pair.algorithm.algorithm_name(),
        ));
    }
    let plaintext = hybrid::decrypt_hybrid(envelope, &key_pair.secret_key)?;
    manager.record_key_usage(&envelope.key_id)?;
    Ok(plaintext)
}
