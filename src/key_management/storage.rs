/*!
 * Key storage
 *
 * The key manager owns its keys through the [`KeyStore`] trait so tests and
 * deployments can supply their own backend. Reads hand out snapshots; every
 * mutation goes through [`KeyStore::update`], which applies the change
 * atomically under the store's write lock.
 */

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::key_management::types::{KeyStatus, KeyType, StoredKey};

/// Closure applied to a key inside [`KeyStore::update`]
pub type KeyUpdate<'a> = &'a mut dyn FnMut(&mut StoredKey) -> CryptoResult<()>;

/// Lock-guarded repository of stored keys
pub trait KeyStore: Send + Sync {
    /// Add a new key; fails if the key id is already present
    fn insert(&self, key: StoredKey) -> CryptoResult<()>;

    /// Snapshot of a key by id, including destroyed keys
    fn get(&self, key_id: &str) -> CryptoResult<Option<StoredKey>>;

    /// Apply `update` to a key atomically and return the resulting snapshot
    ///
    /// When `update` fails the stored key is left unchanged. A key whose
    /// status becomes `Destroyed` is dropped from the type index.
    fn update(&self, key_id: &str, update: KeyUpdate<'_>) -> CryptoResult<StoredKey>;

    /// Snapshots of indexed keys of `key_type`, in insertion order
    fn keys_by_type(&self, key_type: KeyType) -> CryptoResult<Vec<StoredKey>>;

    /// Snapshots of every key ever stored, destroyed ones included
    fn all_keys(&self) -> CryptoResult<Vec<StoredKey>>;
}

#[derive(Default)]
struct StoreInner {
    keys: HashMap<String, StoredKey>,
    type_index: BTreeMap<KeyType, Vec<String>>,
    insertion_order: Vec<String>,
}

/// In-process [`KeyStore`] backed by a `RwLock`
#[derive(Default)]
pub struct InMemoryKeyStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> CryptoResult<RwLockReadGuard<'_, StoreInner>> {
        self.inner.read().map_err(|_| poisoned())
    }

    fn write(&self) -> CryptoResult<RwLockWriteGuard<'_, StoreInner>> {
        self.inner.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> CryptoError {
    CryptoError::key_management_error(
        "key store access",
        "key store lock poisoned",
        error_codes::KEY_STORE_POISONED,
    )
}

impl KeyStore for InMemoryKeyStore {
    fn insert(&self, key: StoredKey) -> CryptoResult<()> {
        let mut inner = self.write()?;
        let key_id = key.key_id().to_string();

        if inner.keys.contains_key(&key_id) {
            return Err(CryptoError::key_management_error(
                "store key",
                &format!("key id {} already exists", key_id),
                error_codes::KEY_STORAGE_FAILED,
            ));
        }

        if key.status() != KeyStatus::Destroyed {
            inner
                .type_index
                .entry(key.metadata.key_type)
                .or_default()
                .push(key_id.clone());
        }
        inner.insertion_order.push(key_id.clone());
        inner.keys.insert(key_id, key);
        Ok(())
    }

    fn get(&self, key_id: &str) -> CryptoResult<Option<StoredKey>> {
        Ok(self.read()?.keys.get(key_id).cloned())
    }

    fn update(&self, key_id: &str, update: KeyUpdate<'_>) -> CryptoResult<StoredKey> {
        let mut inner = self.write()?;

        let current = inner
            .keys
            .get(key_id)
            .ok_or_else(|| CryptoError::key_not_found(key_id))?;

        // Work on a copy so a failed update leaves nothing half-applied
        let mut updated = current.clone();
        update(&mut updated)?;

        if updated.key_id() != key_id || updated.metadata.key_type != current.metadata.key_type {
            return Err(CryptoError::key_management_error(
                "update key",
                "key id and key type are immutable",
                error_codes::KEY_STORAGE_FAILED,
            ));
        }

        if updated.status() == KeyStatus::Destroyed {
            if let Some(ids) = inner.type_index.get_mut(&updated.metadata.key_type) {
                ids.retain(|id| id != key_id);
            }
        }

        inner.keys.insert(key_id.to_string(), updated.clone());
        Ok(updated)
    }

    fn keys_by_type(&self, key_type: KeyType) -> CryptoResult<Vec<StoredKey>> {
        let inner = self.read()?;
        Ok(inner
            .type_index
            .get(&key_type)
            .map(|ids| ids.iter().filter_map(|id| inner.keys.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    fn all_keys(&self) -> CryptoResult<Vec<StoredKey>> {
        let inner = self.read()?;
        Ok(inner
            .insertion_order
            .iter()
            .filter_map(|id| inner.keys.get(id).cloned())
            .collect())
    }
}
