/*!
 * Token and request signing
 *
 * Signature-protected session tokens and service-to-service request
 * signatures on top of the ML-DSA adapter. Verification never returns an
 * error: it reports `valid: false` with a typed reason, and callers that
 * prefer the error taxonomy use `into_result()`.
 */

pub mod jwt;
pub mod request;


use serde::{Deserialize, Serialize};

use crate::dilithium::DilithiumVariant;
use crate::error::CryptoResult;
use crate::utils;

pub use jwt::{PqcJwtSigner, TokenRejection, TokenVerification};
pub use request::{
    PqcApiSigner, RequestRejection, RequestVerification, SignedRequestHeaders, HEADER_ALGORITHM,
    HEADER_KEY_ID, HEADER_SIGNATURE, HEADER_TIMESTAMP,
};

/// A detached signature and what produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureResult {
    #[serde(with = "crate::utils::serde_base64")]
    pub signature: Vec<u8>,
    pub algorithm: DilithiumVariant,
    pub key_id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl SignatureResult {
    /// Sign `message` and record the signing context
    pub fn sign(
        algorithm: DilithiumVariant,
        message: &[u8],
        secret_key: &[u8],
        key_id: &str,
        timestamp: i64,
    ) -> CryptoResult<Self> {
        Ok(Self {
            signature: algorithm.sign(message, secret_key)?,
            algorithm,
            key_id: key_id.to_string(),
            timestamp,
        })
    }

    pub fn sign_now(
        algorithm: DilithiumVariant,
        message: &[u8],
        secret_key: &[u8],
        key_id: &str,
    ) -> CryptoResult<Self> {
        Self::sign(algorithm, message, secret_key, key_id, utils::now_millis())
    }

    pub fn verify(&self, message: &[u8], public_key: &[u8]) -> bool {
        self.algorithm.verify(message, &self.signature, public_key)
    }
}
