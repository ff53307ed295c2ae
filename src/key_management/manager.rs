/*!
 * Key Manager
 *
 * Generates, indexes, rotates and retires managed keys. All material lives in
 * an injected [`KeyStore`]; lifecycle transitions are serialized through a
 * single lock so a rotation, compromise or destruction of the same key can
 * never interleave. Reads return snapshots and never block on that lock.
 */

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Duration, Utc};
use zeroize::Zeroizing;

use crate::config::PqcConfig;
use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::kdf;
use crate::key_management::storage::{InMemoryKeyStore, KeyStore};
use crate::key_management::types::*;
use crate::security_level::SecurityLevel;
use crate::utils;

/// Lookups retried when the primary key is retired mid-checkout
const CHECKOUT_ATTEMPTS: usize = 3;

/// Owner of all managed key material
pub struct KeyManager {
    store: Arc<dyn KeyStore>,
    default_level: SecurityLevel,
    rotation_lead: Duration,
    usage_threshold: f64,
    lifecycle: Mutex<()>,
    audit: RwLock<Vec<KeyAuditEvent>>,
}

impl Default for KeyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyManager {
    /// Manager over a fresh in-memory store with default policy
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryKeyStore::new()))
    }

    /// Manager over a caller-supplied store with default policy
    pub fn with_store(store: Arc<dyn KeyStore>) -> Self {
        Self {
            store,
            default_level: SecurityLevel::default(),
            rotation_lead: Duration::days(7),
            usage_threshold: 0.9,
            lifecycle: Mutex::new(()),
            audit: RwLock::new(Vec::new()),
        }
    }

    /// Manager over a fresh in-memory store with policy from `config`
    pub fn with_config(config: &PqcConfig) -> CryptoResult<Self> {
        Self::with_store_and_config(Arc::new(InMemoryKeyStore::new()), config)
    }

    pub fn with_store_and_config(store: Arc<dyn KeyStore>, config: &PqcConfig) -> CryptoResult<Self> {
        config.validate()?;
        let mut manager = Self::with_store(store);
        manager.default_level = config.security_level()?;
        manager.rotation_lead = Duration::days(i64::from(config.rotation.rotation_lead_days));
        manager.usage_threshold = config.rotation.usage_rotation_threshold;
        Ok(manager)
    }

    pub fn default_security_level(&self) -> SecurityLevel {
        self.default_level
    }

    /// Generate and index a KEM key pair
    pub fn generate_encryption_key(
        &self,
        key_type: KeyType,
        owner: &str,
        level: SecurityLevel,
        options: KeyGenerationOptions,
    ) -> CryptoResult<StoredKey> {
        if !key_type.is_encryption() {
            return Err(CryptoError::invalid_parameter(
                "key_type",
                "an encryption key type",
                key_type.as_str(),
            ));
        }
        self.create_key(key_type, owner, KeyAlgorithm::Kem(level.kem_variant()), &options)
    }

    /// Generate and index a signature key pair
    pub fn generate_signing_key(
        &self,
        key_type: KeyType,
        owner: &str,
        level: SecurityLevel,
        options: KeyGenerationOptions,
    ) -> CryptoResult<StoredKey> {
        if key_type.is_encryption() {
            return Err(CryptoError::invalid_parameter(
                "key_type",
                "a signing key type",
                key_type.as_str(),
            ));
        }
        self.create_key(
            key_type,
            owner,
            KeyAlgorithm::Signature(level.signature_variant()),
            &options,
        )
    }

    fn create_key(
        &self,
        key_type: KeyType,
        owner: &str,
        algorithm: KeyAlgorithm,
        options: &KeyGenerationOptions,
    ) -> CryptoResult<StoredKey> {
        let stored = self.prepare_key(key_type, owner, algorithm, options)?;
        self.commit_key(&stored)?;
        Ok(stored)
    }

    /// Generate key material and metadata without touching the store
    fn prepare_key(
        &self,
        key_type: KeyType,
        owner: &str,
        algorithm: KeyAlgorithm,
        options: &KeyGenerationOptions,
    ) -> CryptoResult<StoredKey> {
        if options.max_usage_count == Some(0) {
            return Err(CryptoError::invalid_parameter(
                "max_usage_count",
                "a positive usage cap",
                "0",
            ));
        }

        let created_at = utils::now();
        let expires_at = match options.expiry_days {
            Some(days) => Some(
                created_at
                    .checked_add_signed(Duration::days(i64::from(days)))
                    .ok_or_else(|| {
                        CryptoError::invalid_parameter("expiry_days", "a representable expiry", &days.to_string())
                    })?,
            ),
            None => None,
        };
        let rotate_at = expires_at.and_then(|expires_at| expires_at.checked_sub_signed(self.rotation_lead));

        let key_pair = KeyPair::generate(algorithm, created_at, expires_at)?;

        let mut tags = options.tags.clone();
        tags.insert(TAG_FINGERPRINT.to_string(), key_pair.fingerprint());

        let metadata = KeyMetadata {
            key_id: key_pair.key_id.clone(),
            key_type,
            algorithm,
            status: KeyStatus::Active,
            created_at,
            expires_at,
            rotate_at,
            last_used: None,
            usage_count: 0,
            max_usage_count: options.max_usage_count,
            owner: owner.to_string(),
            tags,
        };

        StoredKey::new(metadata, &key_pair)
    }

    fn commit_key(&self, stored: &StoredKey) -> CryptoResult<()> {
        self.store.insert(stored.clone())?;

        let metadata = &stored.metadata;
        log::info!(
            "Generated {} key {} ({}) for {}",
            metadata.key_type,
            stored.key_id(),
            metadata.algorithm,
            metadata.owner
        );
        self.audit(stored.key_id(), KeyOperation::Generated, metadata.algorithm.algorithm_name())
    }

    /// Snapshot of a key by id, destroyed keys included
    pub fn get_key(&self, key_id: &str) -> CryptoResult<StoredKey> {
        self.store
            .get(key_id)?
            .ok_or_else(|| CryptoError::key_not_found(key_id))
    }

    /// Decoded key pair; fails for destroyed keys
    pub fn get_key_pair(&self, key_id: &str) -> CryptoResult<KeyPair> {
        self.get_key(key_id)?.key_pair()
    }

    /// Most recently created active key of `key_type`
    pub fn get_primary_key(&self, key_type: KeyType) -> CryptoResult<Option<StoredKey>> {
        let keys = self.get_active_keys_by_type(key_type)?;
        // max_by returns the last of equal elements, so ties go to the newest insert
        Ok(keys
            .into_iter()
            .max_by(|a, b| a.metadata.created_at.cmp(&b.metadata.created_at)))
    }

    pub fn get_active_keys_by_type(&self, key_type: KeyType) -> CryptoResult<Vec<StoredKey>> {
        Ok(self
            .store
            .keys_by_type(key_type)?
            .into_iter()
            .filter(|key| key.status() == KeyStatus::Active)
            .collect())
    }

    pub fn get_keys_by_status(&self, status: KeyStatus) -> CryptoResult<Vec<StoredKey>> {
        Ok(self
            .store
            .all_keys()?
            .into_iter()
            .filter(|key| key.status() == status)
            .collect())
    }

    /// Reserve one use of the primary key of an encryption type
    ///
    /// The cap check and the usage increment happen in a single store update,
    /// so concurrent callers can never overshoot `max_usage_count`. Returns
    /// the key as it was after the reservation.
    pub fn checkout_encryption_key(&self, key_type: KeyType) -> CryptoResult<StoredKey> {
        for _ in 0..CHECKOUT_ATTEMPTS {
            let primary = self
                .get_primary_key(key_type)?
                .ok_or_else(|| CryptoError::key_not_found(&format!("primary {}", key_type)))?;

            let reserved = self.store.update(primary.key_id(), &mut |key: &mut StoredKey| {
                if key.status() != KeyStatus::Active {
                    return Err(CryptoError::invalid_key_state(
                        key.key_id(),
                        "checkout key",
                        key.status().as_str(),
                    ));
                }
                if key.metadata.usage_exhausted() {
                    return Err(CryptoError::key_management_error(
                        "checkout key",
                        &format!("key {} reached its maximum usage count", key.key_id()),
                        error_codes::KEY_USAGE_EXHAUSTED,
                    ));
                }
                key.metadata.usage_count = key.metadata.usage_count.saturating_add(1);
                key.metadata.last_used = Some(utils::now());
                Ok(())
            });

            match reserved {
                // Retired between lookup and reservation; a newer primary exists
                Err(CryptoError::InvalidKeyState { .. }) => continue,
                Err(e) => {
                    if e.error_code() == error_codes::KEY_USAGE_EXHAUSTED {
                        log::warn!("Primary {} key {} has exhausted its usage cap", key_type, primary.key_id());
                    }
                    return Err(e);
                }
                Ok(key) => return Ok(key),
            }
        }

        Err(CryptoError::key_not_found(&format!("primary {}", key_type)))
    }

    /// Replace an active key with a fresh one under the same policy
    ///
    /// The replacement is generated and stored before the old key leaves
    /// `Active`, so a key type never has a gap without a primary key. The old
    /// key is kept as `Deprecated` for decrypt-only access. If the replacement
    /// cannot be generated the old key stays `Active`.
    pub fn rotate_key(&self, key_id: &str) -> CryptoResult<RotationResult> {
        let _guard = self.lifecycle()?;

        let old = self.get_key(key_id)?;
        if old.status() != KeyStatus::Active {
            return Err(CryptoError::invalid_key_state(
                key_id,
                "rotate",
                old.status().as_str(),
            ));
        }
        self.audit(key_id, KeyOperation::RotationStarted, "")?;

        let metadata = &old.metadata;
        let mut options = KeyGenerationOptions {
            expiry_days: metadata.expiry_days(),
            max_usage_count: metadata.max_usage_count,
            tags: metadata.policy_tags(),
        };
        options
            .tags
            .insert(TAG_ROTATED_FROM.to_string(), key_id.to_string());

        let replacement = self
            .prepare_key(metadata.key_type, &metadata.owner, metadata.algorithm, &options)
            .and_then(|replacement| {
                self.commit_key(&replacement)?;
                Ok(replacement)
            });
        let replacement = match replacement {
            Ok(replacement) => replacement,
            Err(e) => {
                log::warn!("Rotation of key {} failed, key stays ACTIVE: {}", key_id, e);
                self.audit(key_id, KeyOperation::RotationFailed, &e.to_string())?;
                return Err(CryptoError::key_management_error(
                    "rotate key",
                    &e.to_string(),
                    error_codes::KEY_ROTATION_FAILED,
                ));
            }
        };

        let new_key_id = replacement.key_id().to_string();
        self.store.update(key_id, &mut |key: &mut StoredKey| {
            key.metadata.status = KeyStatus::Rotating;
            Ok(())
        })?;
        self.store.update(key_id, &mut |key: &mut StoredKey| {
            key.metadata.status = KeyStatus::Deprecated;
            key.metadata
                .tags
                .insert(TAG_ROTATED_TO.to_string(), new_key_id.clone());
            Ok(())
        })?;

        let result = RotationResult {
            old_key_id: key_id.to_string(),
            new_key_id,
            rotated_at: utils::now(),
            reencryption_required: metadata.key_type.is_encryption(),
        };

        log::info!("Rotated key {} -> {}", result.old_key_id, result.new_key_id);
        self.audit(key_id, KeyOperation::Rotated, &result.new_key_id)?;
        Ok(result)
    }

    /// Active keys past their rotation time or near their usage cap
    pub fn get_keys_needing_rotation(&self) -> CryptoResult<Vec<StoredKey>> {
        self.keys_needing_rotation_at(utils::now())
    }

    pub fn keys_needing_rotation_at(&self, now: DateTime<Utc>) -> CryptoResult<Vec<StoredKey>> {
        Ok(self
            .get_keys_by_status(KeyStatus::Active)?
            .into_iter()
            .filter(|key| {
                let due = matches!(key.metadata.rotate_at, Some(rotate_at) if now >= rotate_at);
                due || key.metadata.usage_exceeds(self.usage_threshold)
            })
            .collect())
    }

    /// Count one cryptographic operation performed with `key_id`
    pub fn record_key_usage(&self, key_id: &str) -> CryptoResult<u64> {
        let updated = self.store.update(key_id, &mut |key: &mut StoredKey| {
            if key.status() == KeyStatus::Destroyed {
                return Err(CryptoError::invalid_key_state(
                    key.key_id(),
                    "record usage",
                    key.status().as_str(),
                ));
            }
            key.metadata.usage_count = key.metadata.usage_count.saturating_add(1);
            key.metadata.last_used = Some(utils::now());
            Ok(())
        })?;
        Ok(updated.metadata.usage_count)
    }

    /// Emergency transition to `Compromised` from any non-destroyed status
    pub fn mark_compromised(&self, key_id: &str, reason: &str) -> CryptoResult<()> {
        let _guard = self.lifecycle()?;

        let now = utils::now();
        self.store.update(key_id, &mut |key: &mut StoredKey| {
            if key.status() == KeyStatus::Destroyed {
                return Err(CryptoError::invalid_key_state(
                    key.key_id(),
                    "mark compromised",
                    key.status().as_str(),
                ));
            }
            key.metadata.status = KeyStatus::Compromised;
            key.metadata
                .tags
                .insert(TAG_COMPROMISE_REASON.to_string(), reason.to_string());
            key.metadata
                .tags
                .insert(TAG_COMPROMISED_AT.to_string(), now.to_rfc3339());
            Ok(())
        })?;

        log::warn!("Key {} marked compromised: {}", key_id, reason);
        self.audit(key_id, KeyOperation::Compromised, reason)
    }

    /// Shred key material and drop the key from its type index
    ///
    /// The key id stays in the full key table for audit and is never reused.
    pub fn destroy_key(&self, key_id: &str) -> CryptoResult<()> {
        let _guard = self.lifecycle()?;

        self.store.update(key_id, &mut |key: &mut StoredKey| {
            if key.status() == KeyStatus::Destroyed {
                return Err(CryptoError::invalid_key_state(
                    key.key_id(),
                    "destroy",
                    key.status().as_str(),
                ));
            }
            key.metadata.status = KeyStatus::Destroyed;
            key.shred();
            Ok(())
        })?;

        log::warn!("Destroyed key {}", key_id);
        self.audit(key_id, KeyOperation::Destroyed, "")
    }

    /// Deprecate active keys whose expiry has passed; returns their ids
    pub fn expire_keys(&self) -> CryptoResult<Vec<String>> {
        self.expire_keys_at(utils::now())
    }

    pub fn expire_keys_at(&self, now: DateTime<Utc>) -> CryptoResult<Vec<String>> {
        let _guard = self.lifecycle()?;

        let mut expired = Vec::new();
        for key in self.get_keys_by_status(KeyStatus::Active)? {
            let past_expiry = matches!(key.metadata.expires_at, Some(expires_at) if now >= expires_at);
            if !past_expiry {
                continue;
            }
            self.store.update(key.key_id(), &mut |key: &mut StoredKey| {
                if key.status() == KeyStatus::Active {
                    key.metadata.status = KeyStatus::Deprecated;
                }
                Ok(())
            })?;
            log::info!("Key {} expired", key.key_id());
            self.audit(key.key_id(), KeyOperation::Expired, "")?;
            expired.push(key.key_id().to_string());
        }
        Ok(expired)
    }

    /// Derive a context-bound child key from a managed key's secret material
    ///
    /// Refused for compromised and destroyed keys.
    pub fn derive_child_key(
        &self,
        key_id: &str,
        subject: &str,
        length: usize,
    ) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let key = self.get_key(key_id)?;
        if matches!(key.status(), KeyStatus::Compromised | KeyStatus::Destroyed) {
            return Err(CryptoError::invalid_key_state(
                key_id,
                "derive child key",
                key.status().as_str(),
            ));
        }

        let key_pair = key.key_pair()?;
        let child = kdf::derive_child_key(&key_pair.secret_key, subject, length)?;
        self.audit(key_id, KeyOperation::ChildKeyDerived, subject)?;
        Ok(child)
    }

    /// Metadata of every key ever generated, oldest first; never key material
    pub fn export_key_inventory(&self) -> CryptoResult<Vec<KeyMetadata>> {
        let mut inventory: Vec<KeyMetadata> = self
            .store
            .all_keys()?
            .into_iter()
            .map(|key| key.metadata.clone())
            .collect();
        inventory.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(inventory)
    }

    pub fn export_key_inventory_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string_pretty(&self.export_key_inventory()?)?)
    }

    /// Snapshot of the lifecycle audit log
    pub fn audit_log(&self) -> CryptoResult<Vec<KeyAuditEvent>> {
        Ok(self.audit.read().map_err(|_| audit_poisoned())?.clone())
    }

    fn audit(&self, key_id: &str, operation: KeyOperation, detail: &str) -> CryptoResult<()> {
        self.audit.write().map_err(|_| audit_poisoned())?.push(KeyAuditEvent {
            key_id: key_id.to_string(),
            operation,
            timestamp: utils::now(),
            detail: detail.to_string(),
        });
        Ok(())
    }

    fn lifecycle(&self) -> CryptoResult<MutexGuard<'_, ()>> {
        self.lifecycle.lock().map_err(|_| {
            CryptoError::key_management_error(
                "lifecycle lock",
                "lifecycle lock poisoned",
                error_codes::KEY_STORE_POISONED,
            )
        })
    }
}

fn audit_poisoned() -> CryptoError {
    CryptoError::key_management_error(
        "audit log",
        "audit log lock poisoned",
        error_codes::KEY_STORE_POISONED,
    )
}
