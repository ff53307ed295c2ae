/*!
 * Key Management System for post-quantum keys
 *
 * This module owns the lifecycle of KEM and signature key pairs: generation,
 * indexing by key type, rotation, compromise handling, destruction and the
 * audit trail of all of those.
 */

pub mod manager;
pub mod rotation;
pub mod storage;
pub mod types;

#[cfg(test)]
mod tests;

pub use manager::KeyManager;
pub use rotation::RotationCallback;
pub use rotation::RotationFailure;
pub use rotation::RotationScheduler;
pub use rotation::RotationSweepReport;
pub use rotation::SchedulerHandle;
pub use rotation::SweepStage;
pub use rotation::REPORT_BUFFER;
pub use storage::InMemoryKeyStore;
pub use storage::KeyStore;
pub use types::KeyAlgorithm;
pub use types::KeyAuditEvent;
pub use types::KeyGenerationOptions;
pub use types::KeyMetadata;
pub use types::KeyOperation;
pub use types::KeyPair;
pub use types::KeyStatus;
pub use types::KeyType;
pub use types::RotationResult;
pub use types::StoredKey;
pub use types::DESTROYED_SENTINEL;
