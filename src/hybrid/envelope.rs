//! Encrypted Envelope
//!
//! The self-describing output of hybrid encryption and its wire form: a
//! single base64 string wrapping a canonical JSON object whose byte fields
//! are themselves base64.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::aes::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crate::utils::{self, serde_base64};

/// Size of the metadata hash (SHA3-256)
pub const METADATA_HASH_SIZE: usize = 32;

/// Everything needed to decrypt a payload except the recipient's secret key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EncryptedEnvelope {
    /// Payload sealed under the DEK
    #[serde(with = "serde_base64")]
    pub ciphertext: Vec<u8>,
    /// KEM ciphertext carrying the shared secret
    #[serde(with = "serde_base64")]
    pub kem_ciphertext: Vec<u8>,
    /// DEK sealed under the KEM-derived wrapping key
    #[serde(rename = "wrappedDEK", with = "serde_base64")]
    pub wrapped_dek: Vec<u8>,
    /// Payload nonce
    #[serde(with = "serde_base64")]
    pub nonce: Vec<u8>,
    /// DEK wrapping nonce
    #[serde(with = "serde_base64")]
    pub dek_nonce: Vec<u8>,
    /// KEM algorithm name, e.g. `ML-KEM-768`
    pub algorithm: String,
    /// Recipient key id
    pub key_id: String,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: i64,
    /// SHA3-256 over the canonical `{algorithm, keyId, timestamp}` object
    #[serde(with = "serde_base64")]
    pub metadata_hash: Vec<u8>,
}

/// Canonical, order-fixed view of the hashed metadata
#[derive(Serialize)]
struct EnvelopeMetadata<'a> {
    algorithm: &'a str,
    #[serde(rename = "keyId")]
    key_id: &'a str,
    timestamp: i64,
}

/// Hash `{algorithm, keyId, timestamp}` in canonical JSON form
pub fn compute_metadata_hash(algorithm: &str, key_id: &str, timestamp: i64) -> CryptoResult<Vec<u8>> {
    let canonical = serde_json::to_vec(&EnvelopeMetadata {
        algorithm,
        key_id,
        timestamp,
    })?;

    let mut hasher = Sha3_256::new();
    hasher.update(&canonical);
    Ok(hasher.finalize().to_vec())
}

impl EncryptedEnvelope {
    /// Recompute the metadata hash and compare it in constant time
    pub fn verify_metadata(&self) -> CryptoResult<()> {
        let expected = compute_metadata_hash(&self.algorithm, &self.key_id, self.timestamp)?;
        if utils::constant_time_eq(&expected, &self.metadata_hash) {
            Ok(())
        } else {
            log::warn!("Envelope metadata hash mismatch for key {}", self.key_id);
            Err(CryptoError::integrity_error(
                "envelope metadata hash does not match {algorithm, keyId, timestamp}",
            ))
        }
    }

    /// Structural checks applied to every envelope read from outside
    pub fn validate(&self) -> CryptoResult<()> {
        fn malformed(field: &str, expected: &str, actual: usize) -> CryptoError {
            CryptoError::SerializationError(format!(
                "malformed envelope: {} must be {}, got {} bytes",
                field, expected, actual
            ))
        }

        if self.nonce.len() != NONCE_SIZE {
            return Err(malformed("nonce", "12 bytes", self.nonce.len()));
        }
        if self.dek_nonce.len() != NONCE_SIZE {
            return Err(malformed("dekNonce", "12 bytes", self.dek_nonce.len()));
        }
        if self.metadata_hash.len() != METADATA_HASH_SIZE {
            return Err(malformed("metadataHash", "32 bytes", self.metadata_hash.len()));
        }
        if self.wrapped_dek.len() != KEY_SIZE + TAG_SIZE {
            return Err(malformed("wrappedDEK", "48 bytes", self.wrapped_dek.len()));
        }
        if self.ciphertext.len() < TAG_SIZE {
            return Err(malformed("ciphertext", "at least 16 bytes", self.ciphertext.len()));
        }
        if self.kem_ciphertext.is_empty() {
            return Err(malformed("kemCiphertext", "non-empty", 0));
        }
        if self.algorithm.is_empty() || self.key_id.is_empty() {
            return Err(CryptoError::SerializationError(
                "malformed envelope: algorithm and keyId are required".to_string(),
            ));
        }
        Ok(())
    }

    /// Encode as base64 of the canonical JSON object
    pub fn serialize(&self) -> CryptoResult<String> {
        let json = serde_json::to_vec(self)?;
        Ok(utils::to_base64(&json))
    }

    /// Exact inverse of [`EncryptedEnvelope::serialize`]
    ///
    /// Rejects bad base64, bad JSON, missing or unknown fields and
    /// structurally impossible field sizes.
    pub fn deserialize(encoded: &str) -> CryptoResult<Self> {
        let json = utils::from_base64(encoded.trim())?;
        let envelope: EncryptedEnvelope = serde_json::from_slice(&json)?;
        envelope.validate()?;
        Ok(envelope)
    }
}

/// Serialize an envelope to its single-string wire form
pub fn serialize_encrypted_data(envelope: &EncryptedEnvelope) -> CryptoResult<String> {
    envelope.serialize()
}

/// Parse the wire form produced by [`serialize_encrypted_data`]
pub fn deserialize_encrypted_data(encoded: &str) -> CryptoResult<EncryptedEnvelope> {
    EncryptedEnvelope::deserialize(encoded)
}
