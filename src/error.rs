/*!
 * Error Handling for the PQC Envelope Module
 *
 * Provides the error taxonomy for envelope encryption, signing and key
 * lifecycle operations, with error codes, user-facing messages and
 * technical details for the operational layer.
 *
 * No cryptographic failure is retryable: decrypting or verifying the same
 * inputs again cannot succeed, so every variant reports `is_retryable() == false`.
 */

use std::collections::HashMap;
use thiserror::Error;

/// Comprehensive error type for all cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("KEM operation failed: {operation} - {cause}")]
    KyberError {
        operation: String,
        cause: String,
        error_code: u32,
        context: HashMap<String, String>,
    },

    #[error("Signature operation failed: {operation} - {cause}")]
    DilithiumError {
        operation: String,
        cause: String,
        error_code: u32,
        context: HashMap<String, String>,
    },

    #[error("AES operation failed: {operation} - {cause}")]
    AesError {
        operation: String,
        cause: String,
        error_code: u32,
        context: HashMap<String, String>,
    },

    /// Envelope metadata hash mismatch: the envelope was tampered with or corrupted
    #[error("Integrity check failed: {details}")]
    IntegrityError { details: String, error_code: u32 },

    /// AEAD tag did not verify: wrong key, corrupted ciphertext or tampering
    #[error("Authentication failed during {stage}")]
    AuthenticationError { stage: String, error_code: u32 },

    #[error("Key not found: {key_id}")]
    KeyNotFound { key_id: String, error_code: u32 },

    #[error("Key management error: {operation} - {cause}")]
    KeyManagementError {
        operation: String,
        cause: String,
        error_code: u32,
        context: HashMap<String, String>,
    },

    #[error("Invalid key state for {operation}: key {key_id} is {status}")]
    InvalidKeyState {
        key_id: String,
        operation: String,
        status: String,
        error_code: u32,
    },

    #[error("Token expired at {expired_at}")]
    ExpiredToken { expired_at: i64, error_code: u32 },

    #[error("Request timestamp outside replay window: {details}")]
    ReplayWindow { details: String, error_code: u32 },

    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String, error_code: u32 },

    #[error("Invalid parameter: {parameter} - {expected} - got {actual}")]
    InvalidParameter {
        parameter: String,
        expected: String,
        actual: String,
        error_code: u32,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Random number generation failed: {cause}")]
    RandomGenerationError { cause: String, error_code: u32 },

    #[error("IO error: {0}")]
    IoError(String),

    #[error("OQS library error: {0}")]
    OqsError(String),
}

/// Error code constants for different error categories
pub mod error_codes {
    // KEM errors: 1000-1999
    pub const KYBER_INITIALIZATION_FAILED: u32 = 1000;
    pub const KYBER_KEY_GENERATION_FAILED: u32 = 1001;
    pub const KYBER_ENCAPSULATION_FAILED: u32 = 1002;
    pub const KYBER_DECAPSULATION_FAILED: u32 = 1003;
    pub const KYBER_INVALID_KEY_SIZE: u32 = 1004;
    pub const KYBER_INVALID_CIPHERTEXT: u32 = 1005;
    pub const KYBER_KEY_MISMATCH: u32 = 1006;

    // Signature errors: 2000-2999
    pub const DILITHIUM_KEY_GENERATION_FAILED: u32 = 2001;
    pub const DILITHIUM_SIGNING_FAILED: u32 = 2002;
    pub const DILITHIUM_INVALID_KEY_SIZE: u32 = 2005;
    pub const DILITHIUM_KEY_MISMATCH: u32 = 2006;

    // AEAD errors: 3000-3999
    pub const AES_ENCRYPTION_FAILED: u32 = 3001;
    pub const AES_INVALID_KEY_SIZE: u32 = 3003;
    pub const AES_INVALID_NONCE_SIZE: u32 = 3004;
    pub const AES_AUTHENTICATION_FAILED: u32 = 3005;

    // Key management errors: 4000-4999
    pub const KEY_STORAGE_FAILED: u32 = 4001;
    pub const KEY_NOT_FOUND: u32 = 4002;
    pub const KEY_ROTATION_FAILED: u32 = 4003;
    pub const KEY_INVALID_STATE: u32 = 4004;
    pub const KEY_DERIVATION_FAILED: u32 = 4005;
    pub const KEY_USAGE_EXHAUSTED: u32 = 4006;
    pub const KEY_STORE_POISONED: u32 = 4007;
    pub const ROTATION_CALLBACK_FAILED: u32 = 4008;

    // Envelope errors: 5000-5999
    pub const ENVELOPE_INTEGRITY_FAILED: u32 = 5001;

    // Token errors: 6000-6999
    pub const TOKEN_EXPIRED: u32 = 6001;
    pub const TOKEN_MALFORMED: u32 = 6002;
    pub const REQUEST_REPLAY_WINDOW: u32 = 6003;
    pub const SIGNATURE_INVALID: u32 = 6004;

    // Configuration errors: 7000-7999
    pub const UNSUPPORTED_ALGORITHM: u32 = 7001;
    pub const INVALID_CONFIGURATION: u32 = 7002;

    // Generic errors: 9000-9999
    pub const RANDOM_GENERATION_FAILED: u32 = 9004;
    pub const INVALID_PARAMETER: u32 = 9999;
}

impl CryptoError {
    /// Get the numeric error code for this error
    pub fn error_code(&self) -> u32 {
        match self {
            CryptoError::KyberError { error_code, .. } => *error_code,
            CryptoError::DilithiumError { error_code, .. } => *error_code,
            CryptoError::AesError { error_code, .. } => *error_code,
            CryptoError::IntegrityError { error_code, .. } => *error_code,
            CryptoError::AuthenticationError { error_code, .. } => *error_code,
            CryptoError::KeyNotFound { error_code, .. } => *error_code,
            CryptoError::KeyManagementError { error_code, .. } => *error_code,
            CryptoError::InvalidKeyState { error_code, .. } => *error_code,
            CryptoError::ExpiredToken { error_code, .. } => *error_code,
            CryptoError::ReplayWindow { error_code, .. } => *error_code,
            CryptoError::UnsupportedAlgorithm { error_code, .. } => *error_code,
            CryptoError::InvalidParameter { error_code, .. } => *error_code,
            CryptoError::RandomGenerationError { error_code, .. } => *error_code,
            CryptoError::SerializationError(_) => 9001,
            CryptoError::IoError(_) => 9002,
            CryptoError::OqsError(_) => 9003,
        }
    }

    /// Get the error category/type as a string
    pub fn error_type(&self) -> &'static str {
        match self {
            CryptoError::KyberError { .. } => "KyberError",
            CryptoError::DilithiumError { .. } => "DilithiumError",
            CryptoError::AesError { .. } => "AesError",
            CryptoError::IntegrityError { .. } => "IntegrityError",
            CryptoError::AuthenticationError { .. } => "AuthenticationError",
            CryptoError::KeyNotFound { .. } => "KeyNotFoundError",
            CryptoError::KeyManagementError { .. } => "KeyManagementError",
            CryptoError::InvalidKeyState { .. } => "InvalidKeyState",
            CryptoError::ExpiredToken { .. } => "ExpiredTokenError",
            CryptoError::ReplayWindow { .. } => "ReplayWindowError",
            CryptoError::UnsupportedAlgorithm { .. } => "UnsupportedAlgorithmError",
            CryptoError::InvalidParameter { .. } => "InvalidParameter",
            CryptoError::SerializationError(_) => "SerializationError",
            CryptoError::RandomGenerationError { .. } => "RandomGenerationError",
            CryptoError::IoError(_) => "IoError",
            CryptoError::OqsError(_) => "OqsError",
        }
    }

    /// Whether repeating the operation with the same inputs could succeed.
    ///
    /// Always false for cryptographic failures. Only a key lookup miss is
    /// resolvable, and only by the caller fetching a fresh key.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Whether this error should surface to the caller as "unauthenticated"
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            CryptoError::ExpiredToken { .. }
                | CryptoError::ReplayWindow { .. }
                | CryptoError::AuthenticationError { .. }
        )
    }

    /// Get a user-friendly error message
    pub fn user_friendly_message(&self) -> String {
        match self {
            CryptoError::KyberError { operation, .. } => {
                format!("Key encapsulation operation '{}' failed. The envelope cannot be built or opened.", operation)
            }
            CryptoError::DilithiumError { operation, .. } => {
                format!("Digital signature operation '{}' failed. Authenticity cannot be established.", operation)
            }
            CryptoError::AesError { operation, .. } => {
                format!(
                    "Encryption operation '{}' failed. Data security may be compromised.",
                    operation
                )
            }
            CryptoError::IntegrityError { .. } => {
                "Encrypted data failed its integrity check and may have been tampered with.".to_string()
            }
            CryptoError::AuthenticationError { .. } => {
                "Encrypted data could not be authenticated. The key is wrong or the data was modified.".to_string()
            }
            CryptoError::KeyNotFound { key_id, .. } => {
                format!("Key '{}' is not available. Fetch a current key and try again.", key_id)
            }
            CryptoError::KeyManagementError { operation, .. } => {
                format!("Key management operation '{}' failed.", operation)
            }
            CryptoError::InvalidKeyState { key_id, status, .. } => {
                format!("Key '{}' cannot be used while it is {}.", key_id, status)
            }
            CryptoError::ExpiredToken { .. } => "The session token has expired.".to_string(),
            CryptoError::ReplayWindow { .. } => {
                "The request signature is outside the accepted time window.".to_string()
            }
            CryptoError::UnsupportedAlgorithm { algorithm, .. } => {
                format!("Algorithm '{}' is not supported by this build.", algorithm)
            }
            CryptoError::InvalidParameter {
                parameter,
                expected,
                ..
            } => {
                format!(
                    "Invalid parameter '{}'. Expected '{}' format.",
                    parameter, expected
                )
            }
            CryptoError::SerializationError(_) => {
                "Data serialization failed. Data format may be corrupted.".to_string()
            }
            CryptoError::RandomGenerationError { .. } => {
                "Random number generation failed. Cryptographic operations may be insecure."
                    .to_string()
            }
            CryptoError::IoError(_) => {
                "Input/output operation failed. Check file permissions and disk space.".to_string()
            }
            CryptoError::OqsError(_) => {
                "OQS library error. Check library version and configuration.".to_string()
            }
        }
    }

    /// Get technical details for debugging
    pub fn technical_details(&self) -> HashMap<String, String> {
        let mut details = HashMap::new();

        details.insert("error_code".to_string(), self.error_code().to_string());
        details.insert("error_type".to_string(), self.error_type().to_string());
        details.insert("timestamp".to_string(), chrono::Utc::now().to_rfc3339());

        match self {
            CryptoError::KyberError {
                operation,
                cause,
                context,
                ..
            }
            | CryptoError::DilithiumError {
                operation,
                cause,
                context,
                ..
            }
            | CryptoError::AesError {
                operation,
                cause,
                context,
                ..
            }
            | CryptoError::KeyManagementError {
                operation,
                cause,
                context,
                ..
            } => {
                details.insert("operation".to_string(), operation.clone());
                details.insert("cause".to_string(), cause.clone());
                details.extend(context.clone());
            }
            CryptoError::InvalidKeyState {
                key_id,
                operation,
                status,
                ..
            } => {
                details.insert("key_id".to_string(), key_id.clone());
                details.insert("operation".to_string(), operation.clone());
                details.insert("status".to_string(), status.clone());
            }
            CryptoError::KeyNotFound { key_id, .. } => {
                details.insert("key_id".to_string(), key_id.clone());
            }
            CryptoError::InvalidParameter {
                parameter,
                expected,
                actual,
                ..
            } => {
                details.insert("parameter".to_string(), parameter.clone());
                details.insert("expected".to_string(), expected.clone());
                details.insert("actual".to_string(), actual.clone());
            }
            _ => {
                details.insert("details".to_string(), self.to_string());
            }
        }

        details
    }
}

/// Convenience constructors for common error types
impl CryptoError {
    pub fn kyber_error(operation: &str, cause: &str, error_code: u32) -> Self {
        CryptoError::KyberError {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
            context: HashMap::new(),
        }
    }

    pub fn dilithium_error(operation: &str, cause: &str, error_code: u32) -> Self {
        CryptoError::DilithiumError {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
            context: HashMap::new(),
        }
    }

    pub fn aes_error(operation: &str, cause: &str, error_code: u32) -> Self {
        CryptoError::AesError {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
            context: HashMap::new(),
        }
    }

    pub fn integrity_error(details: &str) -> Self {
        CryptoError::IntegrityError {
            details: details.to_string(),
            error_code: error_codes::ENVELOPE_INTEGRITY_FAILED,
        }
    }

    pub fn authentication_error(stage: &str) -> Self {
        CryptoError::AuthenticationError {
            stage: stage.to_string(),
            error_code: error_codes::AES_AUTHENTICATION_FAILED,
        }
    }

    pub fn key_not_found(key_id: &str) -> Self {
        CryptoError::KeyNotFound {
            key_id: key_id.to_string(),
            error_code: error_codes::KEY_NOT_FOUND,
        }
    }

    pub fn key_management_error(operation: &str, cause: &str, error_code: u32) -> Self {
        CryptoError::KeyManagementError {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
            context: HashMap::new(),
        }
    }

    pub fn invalid_key_state(key_id: &str, operation: &str, status: &str) -> Self {
        CryptoError::InvalidKeyState {
            key_id: key_id.to_string(),
            operation: operation.to_string(),
            status: status.to_string(),
            error_code: error_codes::KEY_INVALID_STATE,
        }
    }

    pub fn expired_token(expired_at: i64) -> Self {
        CryptoError::ExpiredToken {
            expired_at,
            error_code: error_codes::TOKEN_EXPIRED,
        }
    }

    pub fn replay_window(details: &str) -> Self {
        CryptoError::ReplayWindow {
            details: details.to_string(),
            error_code: error_codes::REQUEST_REPLAY_WINDOW,
        }
    }

    pub fn unsupported_algorithm(algorithm: &str) -> Self {
        CryptoError::UnsupportedAlgorithm {
            algorithm: algorithm.to_string(),
            error_code: error_codes::UNSUPPORTED_ALGORITHM,
        }
    }

    pub fn invalid_parameter(parameter: &str, expected: &str, actual: &str) -> Self {
        CryptoError::InvalidParameter {
            parameter: parameter.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            error_code: error_codes::INVALID_PARAMETER,
        }
    }

    /// Attach a context entry to errors that carry a context map
    pub fn with_context(mut self, key: &str, value: &str) -> Self {
        match &mut self {
            CryptoError::KyberError { context, .. }
            | CryptoError::DilithiumError { context, .. }
            | CryptoError::AesError { context, .. }
            | CryptoError::KeyManagementError { context, .. } => {
                context.insert(key.to_string(), value.to_string());
            }
            _ => {}
        }
        self
    }
}

// From implementations for automatic error conversion
impl From<std::io::Error> for CryptoError {
    fn from(err: std::io::Error) -> Self {
        CryptoError::IoError(format!("IO operation failed: {}", err))
    }
}

impl From<oqs::Error> for CryptoError {
    fn from(err: oqs::Error) -> Self {
        CryptoError::OqsError(err.to_string())
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for CryptoError {
    fn from(err: bincode::Error) -> Self {
        CryptoError::SerializationError(err.to_string())
    }
}

impl From<base64::DecodeError> for CryptoError {
    fn from(err: base64::DecodeError) -> Self {
        CryptoError::SerializationError(format!("base64 decode failed: {}", err))
    }
}

/// Result type alias for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_generation() {
        let error = CryptoError::kyber_error(
            "key_generation",
            "RNG failed",
            error_codes::KYBER_KEY_GENERATION_FAILED,
        );
        assert_eq!(error.error_code(), error_codes::KYBER_KEY_GENERATION_FAILED);
        assert_eq!(error.error_type(), "KyberError");
    }

    #[test]
    fn test_taxonomy_names() {
        assert_eq!(CryptoError::integrity_error("x").error_type(), "IntegrityError");
        assert_eq!(
            CryptoError::authentication_error("payload").error_type(),
            "AuthenticationError"
        );
        assert_eq!(CryptoError::key_not_found("k").error_type(), "KeyNotFoundError");
        assert_eq!(CryptoError::expired_token(0).error_type(), "ExpiredTokenError");
        assert_eq!(CryptoError::replay_window("old").error_type(), "ReplayWindowError");
        assert_eq!(
            CryptoError::unsupported_algorithm("RSA").error_type(),
            "UnsupportedAlgorithmError"
        );
    }

    #[test]
    fn test_nothing_is_retryable() {
        let errors = [
            CryptoError::integrity_error("hash mismatch"),
            CryptoError::authentication_error("dek-unwrap"),
            CryptoError::key_not_found("kem-1"),
            CryptoError::expired_token(1),
            CryptoError::replay_window("too old"),
        ];
        for error in errors.iter() {
            assert!(!error.is_retryable(), "{} must not be retryable", error);
        }
    }

    #[test]
    fn test_unauthenticated_classification() {
        assert!(CryptoError::expired_token(5).is_unauthenticated());
        assert!(CryptoError::replay_window("future").is_unauthenticated());
        assert!(!CryptoError::integrity_error("x").is_unauthenticated());
    }

    #[test]
    fn test_technical_details() {
        let error = CryptoError::key_management_error(
            "rotate_key",
            "generation failed",
            error_codes::KEY_ROTATION_FAILED,
        )
        .with_context("key_id", "ML-KEM-768-1-aa");
        let details = error.technical_details();
        assert!(details.contains_key("error_code"));
        assert_eq!(details.get("operation").map(String::as_str), Some("rotate_key"));
        assert_eq!(details.get("key_id").map(String::as_str), Some("ML-KEM-768-1-aa"));
    }

    #[test]
    fn test_user_friendly_message() {
        let error = CryptoError::invalid_key_state("k1", "rotate_key", "DESTROYED");
        assert!(error.user_friendly_message().contains("DESTROYED"));
    }
}
