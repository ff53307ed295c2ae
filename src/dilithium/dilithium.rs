/*!
 * ML-DSA signatures over fixed-size message digests
 */

use std::fmt;
use std::str::FromStr;

use oqs::sig::{Algorithm, Sig};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use zeroize::Zeroize;

use crate::error::{error_codes, CryptoError};

/// Size of the digest that is actually signed
pub const MESSAGE_DIGEST_SIZE: usize = 32;

/// ML-DSA key pair for digital signatures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DilithiumKeyPair {
    /// Public key for signature verification
    pub public_key: Vec<u8>,
    /// Secret key for signature generation
    pub secret_key: Vec<u8>,
    /// The parameter set
    pub algorithm: DilithiumVariant,
}

impl Drop for DilithiumKeyPair {
    fn drop(&mut self) {
        self.secret_key.zeroize();
    }
}

impl Zeroize for DilithiumKeyPair {
    fn zeroize(&mut self) {
        self.secret_key.zeroize();
    }
}

/// Public key only version of DilithiumKeyPair for sharing with others
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DilithiumPublicKey {
    /// Public key for signature verification
    pub public_key: Vec<u8>,
    /// The parameter set
    pub algorithm: DilithiumVariant,
}

/// ML-DSA parameter sets with different security levels
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DilithiumVariant {
    /// ML-DSA-44 (NIST security level 2)
    Dilithium2,
    /// ML-DSA-65 (NIST security level 3, recommended)
    Dilithium3,
    /// ML-DSA-87 (NIST security level 5)
    Dilithium5,
}

impl fmt::Display for DilithiumVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.algorithm_name())
    }
}

impl FromStr for DilithiumVariant {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ML-DSA-44" | "Dilithium2" => Ok(DilithiumVariant::Dilithium2),
            "ML-DSA-65" | "Dilithium3" => Ok(DilithiumVariant::Dilithium3),
            "ML-DSA-87" | "Dilithium5" => Ok(DilithiumVariant::Dilithium5),
            other => Err(CryptoError::unsupported_algorithm(other)),
        }
    }
}

impl DilithiumVariant {
    pub const ALL: [DilithiumVariant; 3] = [
        DilithiumVariant::Dilithium2,
        DilithiumVariant::Dilithium3,
        DilithiumVariant::Dilithium5,
    ];

    fn oqs_algorithm(&self) -> Algorithm {
        match self {
            DilithiumVariant::Dilithium2 => Algorithm::MlDsa44,
            DilithiumVariant::Dilithium3 => Algorithm::MlDsa65,
            DilithiumVariant::Dilithium5 => Algorithm::MlDsa87,
        }
    }

    fn sig(&self) -> Result<Sig, CryptoError> {
        Sig::new(self.oqs_algorithm()).map_err(|e| CryptoError::OqsError(e.to_string()))
    }

    /// Canonical algorithm name, also used as the JWT `alg` header
    pub fn algorithm_name(&self) -> &'static str {
        match self {
            DilithiumVariant::Dilithium2 => "ML-DSA-44",
            DilithiumVariant::Dilithium3 => "ML-DSA-65",
            DilithiumVariant::Dilithium5 => "ML-DSA-87",
        }
    }

    pub fn security_level(&self) -> u8 {
        match self {
            DilithiumVariant::Dilithium2 => 2,
            DilithiumVariant::Dilithium3 => 3,
            DilithiumVariant::Dilithium5 => 5,
        }
    }

    pub fn public_key_size(&self) -> usize {
        match self {
            DilithiumVariant::Dilithium2 => 1312,
            DilithiumVariant::Dilithium3 => 1952,
            DilithiumVariant::Dilithium5 => 2592,
        }
    }

    pub fn secret_key_size(&self) -> usize {
        match self {
            DilithiumVariant::Dilithium2 => 2560,
            DilithiumVariant::Dilithium3 => 4032,
            DilithiumVariant::Dilithium5 => 4896,
        }
    }

    pub fn signature_size(&self) -> usize {
        match self {
            DilithiumVariant::Dilithium2 => 2420,
            DilithiumVariant::Dilithium3 => 3309,
            DilithiumVariant::Dilithium5 => 4627,
        }
    }

    /// Sign the SHA3-256 digest of `message` with raw secret key bytes
    pub fn sign(&self, message: &[u8], secret_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let sig = self.sig()?;

        let sk = sig.secret_key_from_bytes(secret_key).ok_or_else(|| {
            CryptoError::dilithium_error(
                "Signature generation failed",
                "Failed to create secret key from bytes",
                error_codes::DILITHIUM_INVALID_KEY_SIZE,
            )
        })?;

        let digest = message_digest(message);
        let signature = sig.sign(&digest, &sk).map_err(|e| {
            CryptoError::dilithium_error(
                "Signature generation failed",
                &e.to_string(),
                error_codes::DILITHIUM_SIGNING_FAILED,
            )
        })?;

        Ok(signature.into_vec())
    }

    /// Verify a signature over the SHA3-256 digest of `message`
    ///
    /// Never fails: a malformed key or signature is simply not valid.
    pub fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        let sig = match self.sig() {
            Ok(sig) => sig,
            Err(e) => {
                log::warn!("Signature verifier unavailable for {}: {}", self, e);
                return false;
            }
        };

        let pk = match sig.public_key_from_bytes(public_key) {
            Some(pk) => pk,
            None => return false,
        };

        let signature = match sig.signature_from_bytes(signature) {
            Some(signature) => signature,
            None => return false,
        };

        let digest = message_digest(message);
        sig.verify(&digest, &signature, &pk).is_ok()
    }
}

/// SHA3-256 digest signed in place of the full message
pub fn message_digest(message: &[u8]) -> [u8; MESSAGE_DIGEST_SIZE] {
    let mut hasher = Sha3_256::new();
    hasher.update(message);
    hasher.finalize().into()
}

impl DilithiumKeyPair {
    /// Generate a new key pair with the specified parameter set
    pub fn generate(variant: DilithiumVariant) -> Result<Self, CryptoError> {
        let sig = variant.sig()?;

        let (public_key, secret_key) = sig.keypair().map_err(|e| {
            CryptoError::dilithium_error(
                "Key generation failed",
                &e.to_string(),
                error_codes::DILITHIUM_KEY_GENERATION_FAILED,
            )
        })?;

        Ok(Self {
            public_key: public_key.into_vec(),
            secret_key: secret_key.into_vec(),
            algorithm: variant,
        })
    }

    /// Sign a message with this key pair's secret key
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.algorithm.sign(message, &self.secret_key)
    }

    /// Verify a signature with this key pair's public key
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        self.algorithm.verify(message, signature, &self.public_key)
    }

    pub fn public_key(&self) -> DilithiumPublicKey {
        DilithiumPublicKey {
            public_key: self.public_key.clone(),
            algorithm: self.algorithm,
        }
    }

    /// Sign and verify a fixed message to confirm both halves belong together
    pub fn verify_key_pair(&self) -> Result<(), CryptoError> {
        let message = b"key-pair-consistency-check";
        let signature = self.sign(message)?;
        if self.verify(message, &signature) {
            Ok(())
        } else {
            Err(CryptoError::dilithium_error(
                "Key verification failed",
                "Signature produced by the secret key does not verify",
                error_codes::DILITHIUM_KEY_MISMATCH,
            ))
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CryptoError> {
        Ok(bincode::deserialize(data)?)
    }
}

impl DilithiumPublicKey {
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        self.algorithm.verify(message, signature, &self.public_key)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CryptoError> {
        Ok(bincode::deserialize(data)?)
    }
}
