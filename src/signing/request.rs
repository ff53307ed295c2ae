//! Service-to-service request signatures
//!
//! The signed string is `METHOD\nPATH\nTIMESTAMP\nBODY`, with the method
//! upper-cased and the timestamp in milliseconds since the epoch. Signatures
//! travel in four `X-PQC-*` headers.

use std::time::Duration;

use crate::config::PqcConfig;
use crate::dilithium::DilithiumVariant;
use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::security_level::SecurityLevel;
use crate::signing::SignatureResult;
use crate::utils;

pub const HEADER_ALGORITHM: &str = "X-PQC-Algorithm";
pub const HEADER_KEY_ID: &str = "X-PQC-KeyId";
pub const HEADER_TIMESTAMP: &str = "X-PQC-Timestamp";
pub const HEADER_SIGNATURE: &str = "X-PQC-Signature";

/// Default replay acceptance window
pub const DEFAULT_REPLAY_WINDOW: Duration = Duration::from_secs(300);

/// The four signature headers of a signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequestHeaders {
    pub algorithm: String,
    pub key_id: String,
    pub timestamp: i64,
    /// Standard base64 of the signature bytes
    pub signature: String,
}

impl From<SignatureResult> for SignedRequestHeaders {
    fn from(result: SignatureResult) -> Self {
        Self {
            algorithm: result.algorithm.algorithm_name().to_string(),
            key_id: result.key_id,
            timestamp: result.timestamp,
            signature: utils::to_base64(&result.signature),
        }
    }
}

impl SignedRequestHeaders {
    /// Header name/value pairs ready to attach to an outbound request
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            (HEADER_ALGORITHM, self.algorithm.clone()),
            (HEADER_KEY_ID, self.key_id.clone()),
            (HEADER_TIMESTAMP, self.timestamp.to_string()),
            (HEADER_SIGNATURE, self.signature.clone()),
        ]
    }

    /// Collect the signature headers from a request, matching names
    /// case-insensitively
    pub fn from_pairs<K: AsRef<str>, V: AsRef<str>>(headers: &[(K, V)]) -> Result<Self, RequestRejection> {
        let find = |name: &'static str| {
            headers
                .iter()
                .find(|(key, _)| key.as_ref().eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_ref().trim().to_string())
                .ok_or(RequestRejection::MissingHeader(name))
        };

        let timestamp = find(HEADER_TIMESTAMP)?
            .parse::<i64>()
            .map_err(|_| RequestRejection::MalformedHeader(HEADER_TIMESTAMP))?;

        Ok(Self {
            algorithm: find(HEADER_ALGORITHM)?,
            key_id: find(HEADER_KEY_ID)?,
            timestamp,
            signature: find(HEADER_SIGNATURE)?,
        })
    }
}

/// Why a request signature was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestRejection {
    MissingHeader(&'static str),
    MalformedHeader(&'static str),
    AlgorithmMismatch { expected: String, found: String },
    /// Timestamp lies in the verifier's future
    FutureTimestamp { skew_millis: i64 },
    /// Timestamp is older than the replay window
    OutsideWindow { age_millis: i64 },
    InvalidSignature,
}

/// Outcome of [`PqcApiSigner::verify_request`]
#[derive(Debug, Clone)]
pub struct RequestVerification {
    pub valid: bool,
    pub reason: Option<RequestRejection>,
    pub key_id: Option<String>,
}

impl RequestVerification {
    fn rejected(reason: RequestRejection) -> Self {
        log::warn!("Request signature rejected: {:?}", reason);
        Self {
            valid: false,
            reason: Some(reason),
            key_id: None,
        }
    }

    /// Signing key id of a valid request, or the matching error
    pub fn into_result(self) -> CryptoResult<String> {
        match (self.valid, self.reason, self.key_id) {
            (true, _, Some(key_id)) => Ok(key_id),
            (_, Some(RequestRejection::FutureTimestamp { skew_millis }), _) => Err(CryptoError::replay_window(
                &format!("timestamp is {} ms in the future", skew_millis),
            )),
            (_, Some(RequestRejection::OutsideWindow { age_millis }), _) => Err(CryptoError::replay_window(
                &format!("request is {} ms old", age_millis),
            )),
            (_, Some(RequestRejection::AlgorithmMismatch { found, .. }), _) => {
                Err(CryptoError::unsupported_algorithm(&found))
            }
            (_, Some(RequestRejection::MissingHeader(_)), _) | (_, Some(RequestRejection::MalformedHeader(_)), _) => {
                Err(CryptoError::AuthenticationError {
                    stage: "request-headers".to_string(),
                    error_code: error_codes::TOKEN_MALFORMED,
                })
            }
            _ => Err(CryptoError::AuthenticationError {
                stage: "request-signature".to_string(),
                error_code: error_codes::SIGNATURE_INVALID,
            }),
        }
    }
}

/// Signs outbound requests and verifies inbound ones
#[derive(Debug, Clone)]
pub struct PqcApiSigner {
    algorithm: DilithiumVariant,
    replay_window: Duration,
}

impl PqcApiSigner {
    pub fn new(algorithm: DilithiumVariant) -> Self {
        Self {
            algorithm,
            replay_window: DEFAULT_REPLAY_WINDOW,
        }
    }

    pub fn for_level(level: SecurityLevel) -> Self {
        Self::new(level.signature_variant())
    }

    pub fn from_config(config: &PqcConfig) -> CryptoResult<Self> {
        config.validate()?;
        Ok(Self::for_level(config.security_level()?)
            .with_replay_window(Duration::from_secs(config.signing.replay_window_secs)))
    }

    pub fn with_replay_window(mut self, replay_window: Duration) -> Self {
        self.replay_window = replay_window;
        self
    }

    pub fn algorithm(&self) -> DilithiumVariant {
        self.algorithm
    }

    pub fn replay_window(&self) -> Duration {
        self.replay_window
    }

    /// Bytes covered by the signature
    pub fn canonical_request(method: &str, path: &str, timestamp: i64, body: &[u8]) -> Vec<u8> {
        let mut canonical = format!("{}\n{}\n{}\n", method.to_ascii_uppercase(), path, timestamp).into_bytes();
        canonical.extend_from_slice(body);
        canonical
    }

    pub fn sign_request(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        secret_key: &[u8],
        key_id: &str,
    ) -> CryptoResult<SignedRequestHeaders> {
        self.sign_request_at(method, path, body, secret_key, key_id, utils::now_millis())
    }

    /// Sign with an explicit timestamp in milliseconds since the epoch
    pub fn sign_request_at(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        secret_key: &[u8],
        key_id: &str,
        timestamp: i64,
    ) -> CryptoResult<SignedRequestHeaders> {
        let canonical = Self::canonical_request(method, path, timestamp, body);
        let result = SignatureResult::sign(self.algorithm, &canonical, secret_key, key_id, timestamp)?;
        Ok(result.into())
    }

    pub fn verify_request<K: AsRef<str>, V: AsRef<str>>(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        headers: &[(K, V)],
        public_key: &[u8],
    ) -> RequestVerification {
        self.verify_request_at(method, path, body, headers, public_key, utils::now_millis())
    }

    /// Verify against an explicit clock, `now` in milliseconds since the epoch
    pub fn verify_request_at<K: AsRef<str>, V: AsRef<str>>(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        headers: &[(K, V)],
        public_key: &[u8],
        now: i64,
    ) -> RequestVerification {
        match SignedRequestHeaders::from_pairs(headers) {
            Ok(signed) => self.verify_signed_headers(method, path, body, &signed, public_key, now),
            Err(reason) => RequestVerification::rejected(reason),
        }
    }

    pub fn verify_signed_headers(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        headers: &SignedRequestHeaders,
        public_key: &[u8],
        now: i64,
    ) -> RequestVerification {
        if headers.algorithm != self.algorithm.algorithm_name() {
            return RequestVerification::rejected(RequestRejection::AlgorithmMismatch {
                expected: self.algorithm.algorithm_name().to_string(),
                found: headers.algorithm.clone(),
            });
        }

        let age_millis = now.saturating_sub(headers.timestamp);
        if age_millis < 0 {
            return RequestVerification::rejected(RequestRejection::FutureTimestamp {
                skew_millis: -age_millis,
            });
        }
        let window_millis = i64::try_from(self.replay_window.as_millis()).unwrap_or(i64::MAX);
        if age_millis > window_millis {
            return RequestVerification::rejected(RequestRejection::OutsideWindow { age_millis });
        }

        let signature = match utils::from_base64(&headers.signature) {
            Ok(signature) => signature,
            Err(_) => return RequestVerification::rejected(RequestRejection::MalformedHeader(HEADER_SIGNATURE)),
        };

        let canonical = Self::canonical_request(method, path, headers.timestamp, body);
        if !self.algorithm.verify(&canonical, &signature, public_key) {
            return RequestVerification::rejected(RequestRejection::InvalidSignature);
        }

        RequestVerification {
            valid: true,
            reason: None,
            key_id: Some(headers.key_id.clone()),
        }
    }
}
