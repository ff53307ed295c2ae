//! Hybrid Post-Quantum Envelope Encryption
//!
//! ML-KEM key encapsulation combined with AES-256-GCM: the engine that
//! builds and opens envelopes, the wire format, field-level encryption of
//! structured records and independent multi-recipient fan-out.

mod envelope;
mod fields;
mod hybrid_encryption;
mod multi_recipient;


pub use envelope::{
    compute_metadata_hash,
    deserialize_encrypted_data,
    serialize_encrypted_data,
    EncryptedEnvelope,
    METADATA_HASH_SIZE,
};

pub use fields::{decrypt_fields, encrypt_fields, marker_name, Record, ENCRYPTED_MARKER_SUFFIX};

pub use hybrid_encryption::{decrypt_hybrid, encrypt_hybrid};

pub use multi_recipient::{encrypt_for_multiple, envelope_for, Recipient};
