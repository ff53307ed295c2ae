//! Field-level encryption of structured records
//!
//! Each selected field is JSON-serialized, sealed into its own envelope and
//! replaced by the envelope's wire string. A sibling `<field>_encrypted: true`
//! marker records which fields the reverse pass must open.

use serde_json::{Map, Value};

use crate::error::{CryptoError, CryptoResult};
use crate::hybrid::envelope::EncryptedEnvelope;
use crate::hybrid::hybrid_encryption::{decrypt_hybrid, encrypt_hybrid};
use crate::kyber::KyberPublicKey;

/// A structured record as a JSON object
pub type Record = Map<String, Value>;

/// Suffix of the sibling marker set on encrypted fields
pub const ENCRYPTED_MARKER_SUFFIX: &str = "_encrypted";

/// Name of the marker field for `field`
pub fn marker_name(field: &str) -> String {
    format!("{}{}", field, ENCRYPTED_MARKER_SUFFIX)
}

fn is_marked(record: &Record, field: &str) -> bool {
    matches!(record.get(&marker_name(field)), Some(Value::Bool(true)))
}

/// Encrypt the named fields of `record`, returning the transformed copy
///
/// Fields that are absent, null, or already marked encrypted are left as
/// they are.
pub fn encrypt_fields(
    record: &Record,
    field_names: &[&str],
    recipient_public_key: &KyberPublicKey,
    key_id: &str,
) -> CryptoResult<Record> {
    let mut output = record.clone();

    for field in field_names {
        let value = match record.get(*field) {
            Some(Value::Null) | None => continue,
            Some(value) => value,
        };
        if is_marked(record, field) {
            continue;
        }

        let plaintext = serde_json::to_vec(value)?;
        let envelope = encrypt_hybrid(&plaintext, recipient_public_key, key_id)?;

        output.insert((*field).to_string(), Value::String(envelope.serialize()?));
        output.insert(marker_name(field), Value::Bool(true));
    }

    Ok(output)
}

/// Decrypt the named fields that carry an encryption marker
///
/// Markers are removed once the field is restored. Any failure aborts the
/// whole record; a partially decrypted record is never returned.
pub fn decrypt_fields(
    record: &Record,
    field_names: &[&str],
    recipient_secret_key: &[u8],
) -> CryptoResult<Record> {
    let mut output = record.clone();

    for field in field_names {
        if !is_marked(record, field) {
            continue;
        }

        let encoded = match record.get(*field) {
            Some(Value::String(encoded)) => encoded,
            _ => {
                return Err(CryptoError::SerializationError(format!(
                    "field '{}' is marked encrypted but does not hold an envelope string",
                    field
                )))
            }
        };

        let envelope = EncryptedEnvelope::deserialize(encoded)?;
        let plaintext = decrypt_hybrid(&envelope, recipient_secret_key)?;
        let value: Value = serde_json::from_slice(&plaintext)?;

        output.insert((*field).to_string(), value);
        output.remove(&marker_name(field));
    }

    Ok(output)
}
