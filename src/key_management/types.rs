/*!
 * Key lifecycle data model
 *
 * Key pairs, their metadata and the stored form owned by the key manager.
 */

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::dilithium::{DilithiumKeyPair, DilithiumPublicKey, DilithiumVariant};
use crate::error::{CryptoError, CryptoResult};
use crate::kyber::{KyberKeyPair, KyberPublicKey, KyberVariant};
use crate::security_level::SecurityLevel;
use crate::utils;

/// Bytes written over the key material of a destroyed key
pub const DESTROYED_SENTINEL: &[u8] = b"DESTROYED";

/// Tag holding the public key fingerprint
pub const TAG_FINGERPRINT: &str = "fingerprint";
/// Tag naming the key this one replaced
pub const TAG_ROTATED_FROM: &str = "rotatedFrom";
/// Tag naming the key that replaced this one
pub const TAG_ROTATED_TO: &str = "rotatedTo";
/// Tag holding the reason given to `mark_compromised`
pub const TAG_COMPROMISE_REASON: &str = "compromiseReason";
/// Tag holding the RFC 3339 time a key was marked compromised
pub const TAG_COMPROMISED_AT: &str = "compromisedAt";

pub(crate) const LIFECYCLE_TAGS: [&str; 5] = [
    TAG_FINGERPRINT,
    TAG_ROTATED_FROM,
    TAG_ROTATED_TO,
    TAG_COMPROMISE_REASON,
    TAG_COMPROMISED_AT,
];

/// Logical purpose of a key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyType {
    /// General data-at-rest encryption
    DataEncryption,

    /// Protected health information fields
    PhiEncryption,

    /// Backup archives
    BackupEncryption,

    /// Session token signing
    JwtSigning,

    /// Service-to-service request signing
    ApiSigning,

    /// Document and audit record signing
    DocumentSigning,
}

impl KeyType {
    pub const ALL: [KeyType; 6] = [
        KeyType::DataEncryption,
        KeyType::PhiEncryption,
        KeyType::BackupEncryption,
        KeyType::JwtSigning,
        KeyType::ApiSigning,
        KeyType::DocumentSigning,
    ];

    /// Whether keys of this type hold KEM material
    pub fn is_encryption(&self) -> bool {
        matches!(
            self,
            KeyType::DataEncryption | KeyType::PhiEncryption | KeyType::BackupEncryption
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::DataEncryption => "DATA_ENCRYPTION",
            KeyType::PhiEncryption => "PHI_ENCRYPTION",
            KeyType::BackupEncryption => "BACKUP_ENCRYPTION",
            KeyType::JwtSigning => "JWT_SIGNING",
            KeyType::ApiSigning => "API_SIGNING",
            KeyType::DocumentSigning => "DOCUMENT_SIGNING",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyType::ALL
            .iter()
            .copied()
            .find(|key_type| key_type.as_str() == s)
            .ok_or_else(|| CryptoError::invalid_parameter("key_type", "a known key type", s))
    }
}

/// Lifecycle status of a stored key
///
/// `Active -> Rotating -> Deprecated`, `Active -> Compromised`, and any
/// non-destroyed status `-> Destroyed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyStatus {
    Active,
    Rotating,
    Deprecated,
    Compromised,
    Destroyed,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Active => "ACTIVE",
            KeyStatus::Rotating => "ROTATING",
            KeyStatus::Deprecated => "DEPRECATED",
            KeyStatus::Compromised => "COMPROMISED",
            KeyStatus::Destroyed => "DESTROYED",
        }
    }

    /// Whether key material may still be read for decryption or verification
    pub fn allows_decryption(&self) -> bool {
        !matches!(self, KeyStatus::Destroyed)
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Algorithm of a managed key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    Kem(KyberVariant),
    Signature(DilithiumVariant),
}

impl KeyAlgorithm {
    pub fn algorithm_name(&self) -> &'static str {
        match self {
            KeyAlgorithm::Kem(variant) => variant.algorithm_name(),
            KeyAlgorithm::Signature(variant) => variant.algorithm_name(),
        }
    }

    pub fn security_level(&self) -> SecurityLevel {
        match self {
            KeyAlgorithm::Kem(variant) => SecurityLevel::from(*variant),
            KeyAlgorithm::Signature(variant) => SecurityLevel::from(*variant),
        }
    }

    pub fn is_kem(&self) -> bool {
        matches!(self, KeyAlgorithm::Kem(_))
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.algorithm_name())
    }
}

/// A managed key pair
///
/// `key_id` is `<algorithm>-<creation millis>-<16 hex chars of randomness>`
/// and is never reused.
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyPair {
    pub public_key: Vec<u8>,
    pub secret_key: Vec<u8>,
    pub algorithm: KeyAlgorithm,
    pub created_at: DateTime<Utc>,
    pub key_id: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("public_key_len", &self.public_key.len())
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.secret_key.zeroize();
    }
}

impl KeyPair {
    /// Generate fresh material for `algorithm` and self-check it
    pub fn generate(
        algorithm: KeyAlgorithm,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> CryptoResult<Self> {
        let (public_key, secret_key) = match algorithm {
            KeyAlgorithm::Kem(variant) => {
                let pair = KyberKeyPair::generate(variant)?;
                pair.verify_key_pair()?;
                (pair.public_key.clone(), pair.secret_key.clone())
            }
            KeyAlgorithm::Signature(variant) => {
                let pair = DilithiumKeyPair::generate(variant)?;
                pair.verify_key_pair()?;
                (pair.public_key.clone(), pair.secret_key.clone())
            }
        };

        Ok(Self {
            public_key,
            secret_key,
            algorithm,
            key_id: Self::new_key_id(algorithm, created_at)?,
            created_at,
            expires_at,
        })
    }

    pub fn new_key_id(algorithm: KeyAlgorithm, created_at: DateTime<Utc>) -> CryptoResult<String> {
        let suffix = utils::to_hex(&utils::random_bytes(8)?);
        Ok(format!(
            "{}-{}-{}",
            algorithm.algorithm_name(),
            created_at.timestamp_millis(),
            suffix
        ))
    }

    /// Public key as a KEM recipient key
    pub fn kem_public_key(&self) -> CryptoResult<KyberPublicKey> {
        match self.algorithm {
            KeyAlgorithm::Kem(algorithm) => Ok(KyberPublicKey {
                public_key: self.public_key.clone(),
                algorithm,
            }),
            KeyAlgorithm::Signature(variant) => Err(CryptoError::invalid_parameter(
                "algorithm",
                "a KEM key",
                variant.algorithm_name(),
            )),
        }
    }

    /// Public key as a signature verification key
    pub fn signature_public_key(&self) -> CryptoResult<DilithiumPublicKey> {
        match self.algorithm {
            KeyAlgorithm::Signature(algorithm) => Ok(DilithiumPublicKey {
                public_key: self.public_key.clone(),
                algorithm,
            }),
            KeyAlgorithm::Kem(variant) => Err(CryptoError::invalid_parameter(
                "algorithm",
                "a signature key",
                variant.algorithm_name(),
            )),
        }
    }

    pub fn fingerprint(&self) -> String {
        match self.kem_public_key() {
            Ok(public_key) => public_key.fingerprint(),
            Err(_) => {
                let digest = crate::dilithium::message_digest(&self.public_key);
                utils::to_hex(&digest[..8])
            }
        }
    }

    pub fn to_bytes(&self) -> CryptoResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> CryptoResult<Self> {
        Ok(bincode::deserialize(data)?)
    }
}

/// Policy inputs accepted by the generate calls
#[derive(Debug, Clone, Default)]
pub struct KeyGenerationOptions {
    pub expiry_days: Option<u32>,
    pub max_usage_count: Option<u64>,
    pub tags: BTreeMap<String, String>,
}

impl KeyGenerationOptions {
    pub fn with_expiry_days(mut self, days: u32) -> Self {
        self.expiry_days = Some(days);
        self
    }

    pub fn with_max_usage_count(mut self, count: u64) -> Self {
        self.max_usage_count = Some(count);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Everything known about a key except its material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetadata {
    pub key_id: String,
    pub key_type: KeyType,
    pub algorithm: KeyAlgorithm,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub rotate_at: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub max_usage_count: Option<u64>,
    pub owner: String,
    pub tags: BTreeMap<String, String>,
}

impl KeyMetadata {
    /// Whether the usage cap has been reached
    pub fn usage_exhausted(&self) -> bool {
        matches!(self.max_usage_count, Some(max) if self.usage_count >= max)
    }

    /// Whether usage has crossed `threshold` of the cap
    pub fn usage_exceeds(&self, threshold: f64) -> bool {
        match self.max_usage_count {
            Some(max) => self.usage_count as f64 >= threshold * max as f64,
            None => false,
        }
    }

    /// Expiry window in whole days, used to replicate policy on rotation
    pub fn expiry_days(&self) -> Option<u32> {
        self.expires_at
            .map(|expires_at| (expires_at - self.created_at).num_days().max(0) as u32)
    }

    /// Tags set by the caller, without lifecycle bookkeeping
    pub fn policy_tags(&self) -> BTreeMap<String, String> {
        self.tags
            .iter()
            .filter(|(key, _)| !LIFECYCLE_TAGS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// A key as held by the store
///
/// `key_material` is the bincode form of a [`KeyPair`]. Both byte fields are
/// replaced by [`DESTROYED_SENTINEL`] on destruction.
#[derive(Clone)]
pub struct StoredKey {
    pub metadata: KeyMetadata,
    pub key_material: Vec<u8>,
    pub public_key: Vec<u8>,
}

impl fmt::Debug for StoredKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredKey")
            .field("metadata", &self.metadata)
            .field("key_material", &"[REDACTED]")
            .field("public_key_len", &self.public_key.len())
            .finish()
    }
}

impl Drop for StoredKey {
    fn drop(&mut self) {
        self.key_material.zeroize();
    }
}

impl StoredKey {
    pub fn new(metadata: KeyMetadata, key_pair: &KeyPair) -> CryptoResult<Self> {
        Ok(Self {
            metadata,
            key_material: key_pair.to_bytes()?,
            public_key: key_pair.public_key.clone(),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.metadata.key_id
    }

    pub fn status(&self) -> KeyStatus {
        self.metadata.status
    }

    /// Decode the key pair, refusing destroyed keys
    pub fn key_pair(&self) -> CryptoResult<KeyPair> {
        self.ensure_not_destroyed("read key material")?;
        KeyPair::from_bytes(&self.key_material)
    }

    /// Recipient key for hybrid encryption
    pub fn kem_public_key(&self) -> CryptoResult<KyberPublicKey> {
        self.ensure_not_destroyed("read public key")?;
        match self.metadata.algorithm {
            KeyAlgorithm::Kem(algorithm) => Ok(KyberPublicKey {
                public_key: self.public_key.clone(),
                algorithm,
            }),
            KeyAlgorithm::Signature(variant) => Err(CryptoError::invalid_parameter(
                "algorithm",
                "a KEM key",
                variant.algorithm_name(),
            )),
        }
    }

    /// Verification key for signatures
    pub fn signature_public_key(&self) -> CryptoResult<DilithiumPublicKey> {
        self.ensure_not_destroyed("read public key")?;
        match self.metadata.algorithm {
            KeyAlgorithm::Signature(algorithm) => Ok(DilithiumPublicKey {
                public_key: self.public_key.clone(),
                algorithm,
            }),
            KeyAlgorithm::Kem(variant) => Err(CryptoError::invalid_parameter(
                "algorithm",
                "a signature key",
                variant.algorithm_name(),
            )),
        }
    }

    /// Overwrite material with the sentinel
    pub(crate) fn shred(&mut self) {
        self.key_material.zeroize();
        self.public_key.zeroize();
        self.key_material = DESTROYED_SENTINEL.to_vec();
        self.public_key = DESTROYED_SENTINEL.to_vec();
    }

    fn ensure_not_destroyed(&self, operation: &str) -> CryptoResult<()> {
        if !self.metadata.status.allows_decryption() {
            return Err(CryptoError::invalid_key_state(
                &self.metadata.key_id,
                operation,
                self.metadata.status.as_str(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a successful rotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationResult {
    pub old_key_id: String,
    pub new_key_id: String,
    pub rotated_at: DateTime<Utc>,
    pub reencryption_required: bool,
}

/// Lifecycle operations recorded in the audit log
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyOperation {
    Generated,
    RotationStarted,
    Rotated,
    RotationFailed,
    Expired,
    Compromised,
    Destroyed,
    ChildKeyDerived,
}

/// One audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAuditEvent {
    pub key_id: String,
    pub operation: KeyOperation,
    pub timestamp: DateTime<Utc>,
    pub detail: String,
}
