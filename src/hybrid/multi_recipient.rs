//! Multi-recipient fan-out
//!
//! Every recipient gets a complete, independent envelope: its own DEK,
//! payload ciphertext, nonces and KEM ciphertext. Nothing is shared, so one
//! recipient's envelope reveals nothing about another's.

use crate::error::{CryptoError, CryptoResult};
use crate::hybrid::envelope::EncryptedEnvelope;
use crate::hybrid::hybrid_encryption::encrypt_hybrid;
use crate::kyber::KyberPublicKey;

/// A recipient's public key and the key id envelopes should name
#[derive(Debug, Clone)]
pub struct Recipient {
    pub public_key: KyberPublicKey,
    pub key_id: String,
}

impl Recipient {
    pub fn new(public_key: KyberPublicKey, key_id: impl Into<String>) -> Self {
        Self {
            public_key,
            key_id: key_id.into(),
        }
    }
}

/// Encrypt `plaintext` once per recipient, in recipient order
pub fn encrypt_for_multiple(plaintext: &[u8], recipients: &[Recipient]) -> CryptoResult<Vec<EncryptedEnvelope>> {
    if recipients.is_empty() {
        return Err(CryptoError::invalid_parameter(
            "recipients",
            "at least one recipient",
            "none",
        ));
    }

    recipients
        .iter()
        .map(|recipient| encrypt_hybrid(plaintext, &recipient.public_key, &recipient.key_id))
        .collect()
}

/// Pick the envelope addressed to `key_id`
pub fn envelope_for<'a>(envelopes: &'a [EncryptedEnvelope], key_id: &str) -> Option<&'a EncryptedEnvelope> {
    envelopes.iter().find(|envelope| envelope.key_id == key_id)
}
