use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Generate random bytes of the specified length
pub fn random_bytes(length: usize) -> Result<Vec<u8>, CryptoError> {
    let mut bytes = vec![0u8; length];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| CryptoError::RandomGenerationError {
        cause: e.to_string(),
        error_code: crate::error::error_codes::RANDOM_GENERATION_FAILED,
    })?;
    Ok(bytes)
}

/// Constant-time comparison of two byte slices to avoid timing attacks
///
/// Length is not secret here; only the contents are compared in constant time.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

/// Securely zero out sensitive data from memory
pub fn secure_zero(data: &mut [u8]) {
    data.zeroize();
}

/// Convert bytes to a hexadecimal string
pub fn to_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Convert a hexadecimal string to bytes
pub fn from_hex(input: &str) -> Result<Vec<u8>, CryptoError> {
    hex::decode(input).map_err(|e| {
        CryptoError::invalid_parameter("hex", "hexadecimal string", &e.to_string())
    })
}

/// Standard base64 with padding, used for envelope fields
pub fn to_base64(data: &[u8]) -> String {
    base64::encode(data)
}

pub fn from_base64(input: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(base64::decode(input)?)
}

/// URL-safe base64 without padding, used for token segments
pub fn to_base64url(data: &[u8]) -> String {
    base64::encode_config(data, base64::URL_SAFE_NO_PAD)
}

pub fn from_base64url(input: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(base64::decode_config(input, base64::URL_SAFE_NO_PAD)?)
}

/// Current wall-clock time
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current wall-clock time as milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Serde adapter encoding `Vec<u8>` as standard base64 strings
pub(crate) mod serde_base64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes() {
        let bytes1 = random_bytes(32).unwrap();
        let bytes2 = random_bytes(32).unwrap();

        assert_eq!(bytes1.len(), 32);
        assert_eq!(bytes2.len(), 32);
        assert_ne!(bytes1, bytes2);
    }

    #[test]
    fn test_constant_time_eq() {
        let a = [1, 2, 3, 4];
        let b = [1, 2, 3, 4];
        let c = [1, 2, 3, 5];
        let d = [1, 2, 3];

        assert!(constant_time_eq(&a, &b));
        assert!(!constant_time_eq(&a, &c));
        assert!(!constant_time_eq(&a, &d));
    }

    #[test]
    fn test_secure_zero() {
        let mut data = [1, 2, 3, 4];
        secure_zero(&mut data);
        assert_eq!(data, [0, 0, 0, 0]);
    }

    #[test]
    fn test_hex_conversion() {
        let data = [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef];
        let hex = to_hex(&data);
        assert_eq!(hex, "0123456789abcdef");
        assert_eq!(from_hex(&hex).unwrap(), data);
        assert!(from_hex("abc").is_err());
    }

    #[test]
    fn test_base64url_has_no_padding() {
        let encoded = to_base64url(b"ab");
        assert!(!encoded.contains('='));
        assert_eq!(from_base64url(&encoded).unwrap(), b"ab");
        assert!(from_base64("not base64!!").is_err());
    }
}
