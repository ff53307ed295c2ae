use oqs::kem::{Algorithm, Kem};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

use crate::error::{error_codes, CryptoError};
use crate::utils;

/// ML-KEM key pair for key encapsulation
///
/// ML-KEM is the NIST-standardised form of CRYSTALS-Kyber (FIPS 203), a
/// lattice-based key encapsulation mechanism believed to be secure against
/// quantum computer attacks.
///
/// # Security Properties
///
/// 1. IND-CCA2 secure; invalid ciphertexts decapsulate to an unrelated secret
/// 2. Secret keys are zeroed when the struct is dropped
///
/// # Examples
///
/// ```no_run
/// use pqc_envelope::kyber::{KyberKeyPair, KyberVariant};
///
/// let key_pair = KyberKeyPair::generate(KyberVariant::Kyber768).unwrap();
/// let (ciphertext, shared_secret) = key_pair.encapsulate().unwrap();
/// let decapsulated_secret = key_pair.decapsulate(&ciphertext).unwrap();
/// assert_eq!(shared_secret, decapsulated_secret);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KyberKeyPair {
    /// Public key for encapsulation
    pub public_key: Vec<u8>,
    /// Secret key for decapsulation
    pub secret_key: Vec<u8>,
    /// The parameter set
    pub algorithm: KyberVariant,
}

impl Drop for KyberKeyPair {
    fn drop(&mut self) {
        self.secret_key.zeroize();
    }
}

impl Zeroize for KyberKeyPair {
    fn zeroize(&mut self) {
        self.secret_key.zeroize();
    }
}

/// Public half of a [`KyberKeyPair`], safe to hand to senders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KyberPublicKey {
    /// Public key for encapsulation
    pub public_key: Vec<u8>,
    /// The parameter set
    pub algorithm: KyberVariant,
}

/// ML-KEM parameter sets
///
/// * Kyber512: ML-KEM-512, NIST Level 1 (equivalent to AES-128)
/// * Kyber768: ML-KEM-768, NIST Level 3 (equivalent to AES-192)
/// * Kyber1024: ML-KEM-1024, NIST Level 5 (equivalent to AES-256)
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum KyberVariant {
    /// ML-KEM-512 (NIST security level 1)
    Kyber512,
    /// ML-KEM-768 (NIST security level 3, recommended)
    Kyber768,
    /// ML-KEM-1024 (NIST security level 5)
    Kyber1024,
}

impl fmt::Display for KyberVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.algorithm_name())
    }
}

impl FromStr for KyberVariant {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ML-KEM-512" | "Kyber512" => Ok(KyberVariant::Kyber512),
            "ML-KEM-768" | "Kyber768" => Ok(KyberVariant::Kyber768),
            "ML-KEM-1024" | "Kyber1024" => Ok(KyberVariant::Kyber1024),
            other => Err(CryptoError::unsupported_algorithm(other)),
        }
    }
}

impl KyberVariant {
    /// All supported parameter sets, weakest first
    pub const ALL: [KyberVariant; 3] = [
        KyberVariant::Kyber512,
        KyberVariant::Kyber768,
        KyberVariant::Kyber1024,
    ];

    fn oqs_algorithm(&self) -> Algorithm {
        match self {
            KyberVariant::Kyber512 => Algorithm::MlKem512,
            KyberVariant::Kyber768 => Algorithm::MlKem768,
            KyberVariant::Kyber1024 => Algorithm::MlKem1024,
        }
    }

    fn kem(&self) -> Result<Kem, CryptoError> {
        Kem::new(self.oqs_algorithm()).map_err(|e| {
            CryptoError::kyber_error(
                "Initialization failed",
                &e.to_string(),
                error_codes::KYBER_INITIALIZATION_FAILED,
            )
        })
    }

    /// Canonical algorithm name carried in envelopes and key ids
    pub fn algorithm_name(&self) -> &'static str {
        match self {
            KyberVariant::Kyber512 => "ML-KEM-512",
            KyberVariant::Kyber768 => "ML-KEM-768",
            KyberVariant::Kyber1024 => "ML-KEM-1024",
        }
    }

    /// NIST security level (1, 3, or 5)
    pub fn security_level(&self) -> u8 {
        match self {
            KyberVariant::Kyber512 => 1,
            KyberVariant::Kyber768 => 3,
            KyberVariant::Kyber1024 => 5,
        }
    }

    pub fn public_key_size(&self) -> usize {
        match self {
            KyberVariant::Kyber512 => 800,
            KyberVariant::Kyber768 => 1184,
            KyberVariant::Kyber1024 => 1568,
        }
    }

    pub fn secret_key_size(&self) -> usize {
        match self {
            KyberVariant::Kyber512 => 1632,
            KyberVariant::Kyber768 => 2400,
            KyberVariant::Kyber1024 => 3168,
        }
    }

    pub fn ciphertext_size(&self) -> usize {
        match self {
            KyberVariant::Kyber512 => 768,
            KyberVariant::Kyber768 => 1088,
            KyberVariant::Kyber1024 => 1568,
        }
    }

    /// All parameter sets produce a 32-byte shared secret
    pub fn shared_secret_size(&self) -> usize {
        32
    }

    /// Encapsulate a fresh shared secret against raw public key bytes
    ///
    /// Returns `(ciphertext, shared_secret)`.
    pub fn encapsulate(&self, public_key: &[u8]) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        if public_key.len() != self.public_key_size() {
            return Err(CryptoError::kyber_error(
                "Encapsulation failed",
                &format!(
                    "public key is {} bytes, {} expects {}",
                    public_key.len(),
                    self,
                    self.public_key_size()
                ),
                error_codes::KYBER_INVALID_KEY_SIZE,
            ));
        }

        let kem = self.kem()?;
        let pk = kem.public_key_from_bytes(public_key).ok_or_else(|| {
            CryptoError::kyber_error(
                "Encapsulation failed",
                "Failed to create public key from bytes",
                error_codes::KYBER_INVALID_KEY_SIZE,
            )
        })?;

        let (ciphertext, shared_secret) = kem.encapsulate(&pk).map_err(|e| {
            CryptoError::kyber_error(
                "Encapsulation failed",
                &e.to_string(),
                error_codes::KYBER_ENCAPSULATION_FAILED,
            )
        })?;

        Ok((ciphertext.into_vec(), shared_secret.into_vec()))
    }

    /// Recover the shared secret from a ciphertext with raw secret key bytes
    pub fn decapsulate(&self, ciphertext: &[u8], secret_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let kem = self.kem()?;

        let sk = kem.secret_key_from_bytes(secret_key).ok_or_else(|| {
            CryptoError::kyber_error(
                "Decapsulation failed",
                "Failed to create secret key from bytes",
                error_codes::KYBER_INVALID_KEY_SIZE,
            )
        })?;

        let ct = kem.ciphertext_from_bytes(ciphertext).ok_or_else(|| {
            CryptoError::kyber_error(
                "Decapsulation failed",
                "Failed to create ciphertext from bytes",
                error_codes::KYBER_INVALID_CIPHERTEXT,
            )
        })?;

        let shared_secret = kem.decapsulate(&sk, &ct).map_err(|e| {
            CryptoError::kyber_error(
                "Decapsulation failed",
                &e.to_string(),
                error_codes::KYBER_DECAPSULATION_FAILED,
            )
        })?;

        Ok(shared_secret.into_vec())
    }
}

impl KyberKeyPair {
    /// Generate a new key pair with the specified parameter set
    ///
    /// Randomness is drawn from the operating system by liboqs.
    pub fn generate(variant: KyberVariant) -> Result<Self, CryptoError> {
        let kem = variant.kem()?;

        let (public_key, secret_key) = kem.keypair().map_err(|e| {
            CryptoError::kyber_error(
                "Key generation failed",
                &e.to_string(),
                error_codes::KYBER_KEY_GENERATION_FAILED,
            )
        })?;

        Ok(Self {
            public_key: public_key.into_vec(),
            secret_key: secret_key.into_vec(),
            algorithm: variant,
        })
    }

    /// Encapsulate a shared secret using this key pair's public key
    pub fn encapsulate(&self) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        self.algorithm.encapsulate(&self.public_key)
    }

    /// Decapsulate a shared secret using this key pair's secret key
    pub fn decapsulate(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.algorithm.decapsulate(ciphertext, &self.secret_key)
    }

    /// Extract the public key from this key pair
    pub fn public_key(&self) -> KyberPublicKey {
        KyberPublicKey {
            public_key: self.public_key.clone(),
            algorithm: self.algorithm,
        }
    }

    /// Verify that the public and secret keys match
    ///
    /// Performs a full encapsulation and decapsulation. Useful after loading
    /// key material from storage.
    pub fn verify_key_pair(&self) -> Result<(), CryptoError> {
        let (ciphertext, ss1) = self.encapsulate()?;
        let ss2 = self.decapsulate(&ciphertext)?;

        if utils::constant_time_eq(&ss1, &ss2) {
            Ok(())
        } else {
            Err(CryptoError::kyber_error(
                "Key verification failed",
                "Shared secrets do not match",
                error_codes::KYBER_KEY_MISMATCH,
            ))
        }
    }

    /// Serialize the key pair to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize a key pair from bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, CryptoError> {
        Ok(bincode::deserialize(data)?)
    }
}

impl KyberPublicKey {
    /// Encapsulate a shared secret using this public key
    ///
    /// Returns `(ciphertext, shared_secret)`.
    pub fn encapsulate(&self) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        self.algorithm.encapsulate(&self.public_key)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CryptoError> {
        Ok(bincode::deserialize(data)?)
    }

    /// Short identifier for the public key
    ///
    /// SHA-256 over the security level byte and the key, truncated to 8 bytes.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update([self.algorithm.security_level()]);
        hasher.update(&self.public_key);
        let hash = hasher.finalize();

        utils::to_hex(&hash[0..8])
    }
}
