use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use std::sync::Arc;

use crate::error::{error_codes, CryptoError};
use crate::utils;

/// AES-256-GCM key size in bytes
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size in bytes
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size in bytes
pub const TAG_SIZE: usize = 16;

/// AES-256-GCM cipher for authenticated encryption
///
/// Ciphertexts carry the 16-byte tag appended. Any change to the ciphertext,
/// nonce, associated data or key makes `decrypt` fail with an
/// `AuthenticationError`; no partial plaintext is ever returned.
///
/// # Examples
///
/// ```
/// use pqc_envelope::aes::AesGcm;
///
/// let key = [0x42; 32];
/// let cipher = AesGcm::new(&key).unwrap();
/// let nonce = AesGcm::generate_nonce().unwrap();
///
/// let ciphertext = cipher.encrypt(b"Secret message", &nonce, Some(b"header")).unwrap();
/// let decrypted = cipher.decrypt(&ciphertext, &nonce, Some(b"header")).unwrap();
/// assert_eq!(decrypted, b"Secret message");
/// ```
#[derive(Clone)]
pub struct AesGcm {
    cipher: Arc<Aes256Gcm>,
}

impl std::fmt::Debug for AesGcm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcm")
            .field("cipher", &"[AES-256-GCM Cipher]")
            .finish()
    }
}

impl AesGcm {
    /// Create a new AES-GCM cipher with a 32-byte key
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::aes_error(
                "Cipher setup failed",
                &format!("key must be {} bytes, got {}", KEY_SIZE, key.len()),
                error_codes::AES_INVALID_KEY_SIZE,
            ));
        }

        let key = Key::<Aes256Gcm>::from_slice(key);
        let cipher = Arc::new(Aes256Gcm::new(key));

        Ok(Self { cipher })
    }

    /// Generate a random 12-byte nonce
    ///
    /// A nonce must never repeat under the same key. Every envelope uses a
    /// fresh random key, so random nonces are sufficient here.
    pub fn generate_nonce() -> Result<Vec<u8>, CryptoError> {
        utils::random_bytes(NONCE_SIZE)
    }

    /// Encrypt plaintext, authenticating the optional associated data
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        nonce: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError> {
        check_nonce(nonce)?;
        let nonce = Nonce::from_slice(nonce);

        let payload = Payload {
            msg: plaintext,
            aad: associated_data.unwrap_or(&[]),
        };

        self.cipher.encrypt(nonce, payload).map_err(|e| {
            CryptoError::aes_error(
                "Encryption failed",
                &format!("AES-GCM encryption failed: {}", e),
                error_codes::AES_ENCRYPTION_FAILED,
            )
        })
    }

    /// Decrypt and authenticate ciphertext
    ///
    /// Fails closed with `AuthenticationError` when the tag does not verify.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        nonce: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError> {
        check_nonce(nonce)?;
        if ciphertext.len() < TAG_SIZE {
            return Err(CryptoError::authentication_error("aead-open"));
        }
        let nonce = Nonce::from_slice(nonce);

        let payload = Payload {
            msg: ciphertext,
            aad: associated_data.unwrap_or(&[]),
        };

        self.cipher
            .decrypt(nonce, payload)
            .map_err(|_| CryptoError::authentication_error("aead-open"))
    }
}

fn check_nonce(nonce: &[u8]) -> Result<(), CryptoError> {
    if nonce.len() != NONCE_SIZE {
        return Err(CryptoError::aes_error(
            "Nonce rejected",
            &format!("nonce must be {} bytes, got {}", NONCE_SIZE, nonce.len()),
            error_codes::AES_INVALID_NONCE_SIZE,
        ));
    }
    Ok(())
}

/// Seal `plaintext` under `key` and `nonce`
pub fn seal(
    key: &[u8],
    nonce: &[u8],
    plaintext: &[u8],
    associated_data: Option<&[u8]>,
) -> Result<Vec<u8>, CryptoError> {
    AesGcm::new(key)?.encrypt(plaintext, nonce, associated_data)
}

/// Open a ciphertext produced by [`seal`]
pub fn open(
    key: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
    associated_data: Option<&[u8]>,
) -> Result<Vec<u8>, CryptoError> {
    AesGcm::new(key)?.decrypt(ciphertext, nonce, associated_data)
}
