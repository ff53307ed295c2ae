/*!
 * Key Derivation
 *
 * HKDF-SHA256 with a typed domain-separation context. The two uses of the
 * KDF, turning a KEM shared secret into a DEK wrapping key and deriving
 * hierarchical child keys, are distinct `KdfContext` variants so one can
 * never be requested with the other's label.
 */

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{error_codes, CryptoError, CryptoResult};

/// Context label for deriving the DEK wrapping key from a KEM shared secret
pub const DEK_WRAP_CONTEXT: &str = "DEK-wrap-v1";

/// Context label prefix for hierarchical child key derivation
pub const CHILD_KEY_CONTEXT: &str = "key-derivation-v1";

/// Length of symmetric keys produced for AES-256-GCM
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Largest output HKDF-SHA256 can produce
pub const MAX_OUTPUT_SIZE: usize = 255 * 32;

/// Domain-separation context for a derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfContext<'a> {
    /// Wrapping key for a per-message DEK
    DekWrap,
    /// Child key bound to a subject string (user id, record id, ...)
    ChildKey(&'a str),
}

impl<'a> KdfContext<'a> {
    /// The HKDF `info` bytes for this context
    pub fn info(&self) -> Vec<u8> {
        match self {
            KdfContext::DekWrap => DEK_WRAP_CONTEXT.as_bytes().to_vec(),
            KdfContext::ChildKey(subject) => {
                // label || ':' || u64 BE subject length || subject
                let mut info = Vec::with_capacity(CHILD_KEY_CONTEXT.len() + 9 + subject.len());
                info.extend_from_slice(CHILD_KEY_CONTEXT.as_bytes());
                info.push(b':');
                info.extend_from_slice(&(subject.len() as u64).to_be_bytes());
                info.extend_from_slice(subject.as_bytes());
                info
            }
        }
    }
}

/// Derive `length` bytes from `secret`
///
/// Deterministic for identical inputs; outputs for different contexts are
/// unrelated even under the same secret.
pub fn derive(
    secret: &[u8],
    salt: Option<&[u8]>,
    context: KdfContext<'_>,
    length: usize,
) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if secret.is_empty() {
        return Err(CryptoError::invalid_parameter(
            "secret",
            "non-empty input keying material",
            "0 bytes",
        ));
    }
    if length == 0 || length > MAX_OUTPUT_SIZE {
        return Err(CryptoError::invalid_parameter(
            "length",
            &format!("1..={} bytes", MAX_OUTPUT_SIZE),
            &format!("{} bytes", length),
        ));
    }

    let hkdf = Hkdf::<Sha256>::new(salt, secret);
    let mut output = Zeroizing::new(vec![0u8; length]);
    hkdf.expand(&context.info(), &mut output).map_err(|e| {
        CryptoError::key_management_error(
            "derive",
            &format!("HKDF expand failed: {}", e),
            error_codes::KEY_DERIVATION_FAILED,
        )
    })?;

    Ok(output)
}

/// Derive the 256-bit key that wraps a message DEK
pub fn derive_wrap_key(shared_secret: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
    derive(shared_secret, None, KdfContext::DekWrap, SYMMETRIC_KEY_SIZE)
}

/// Derive a child key of `length` bytes from parent key material and a subject
pub fn derive_child_key(
    parent: &[u8],
    subject: &str,
    length: usize,
) -> CryptoResult<Zeroizing<Vec<u8>>> {
    derive(parent, None, KdfContext::ChildKey(subject), length)
}
