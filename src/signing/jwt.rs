//! Post-quantum signed session tokens
//!
//! Compact JWS layout: `base64url(header).base64url(payload).base64url(sig)`
//! with an ML-DSA signature over the first two segments.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::PqcConfig;
use crate::dilithium::DilithiumVariant;
use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::security_level::SecurityLevel;
use crate::utils;

/// Token claims as a JSON object
pub type Claims = Map<String, Value>;

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
    kid: String,
}

/// Why a token was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRejection {
    /// Not three segments, bad base64url, bad JSON or a non-numeric `exp`
    Malformed(String),
    /// Header `alg` differs from the verifier's algorithm
    AlgorithmMismatch { expected: String, found: String },
    InvalidSignature,
    /// `exp` (seconds since the epoch) has passed
    Expired { expired_at: i64 },
}

/// Outcome of [`PqcJwtSigner::verify_jwt`]
#[derive(Debug, Clone)]
pub struct TokenVerification {
    pub valid: bool,
    pub reason: Option<TokenRejection>,
    pub key_id: Option<String>,
    pub claims: Option<Claims>,
}

impl TokenVerification {
    fn accepted(key_id: String, claims: Claims) -> Self {
        Self {
            valid: true,
            reason: None,
            key_id: Some(key_id),
            claims: Some(claims),
        }
    }

    fn rejected(reason: TokenRejection) -> Self {
        log::warn!("Token rejected: {:?}", reason);
        Self {
            valid: false,
            reason: Some(reason),
            key_id: None,
            claims: None,
        }
    }

    /// Claims of a valid token, or the matching error
    pub fn into_result(self) -> CryptoResult<Claims> {
        match (self.valid, self.reason, self.claims) {
            (true, _, Some(claims)) => Ok(claims),
            (_, Some(TokenRejection::Expired { expired_at }), _) => Err(CryptoError::expired_token(expired_at)),
            (_, Some(TokenRejection::Malformed(_)), _) => Err(CryptoError::AuthenticationError {
                stage: "token-format".to_string(),
                error_code: error_codes::TOKEN_MALFORMED,
            }),
            (_, Some(TokenRejection::AlgorithmMismatch { found, .. }), _) => {
                Err(CryptoError::unsupported_algorithm(&found))
            }
            _ => Err(CryptoError::AuthenticationError {
                stage: "token-signature".to_string(),
                error_code: error_codes::SIGNATURE_INVALID,
            }),
        }
    }
}

/// Issues and verifies ML-DSA signed tokens
#[derive(Debug, Clone)]
pub struct PqcJwtSigner {
    algorithm: DilithiumVariant,
    token_type: String,
}

impl PqcJwtSigner {
    pub fn new(algorithm: DilithiumVariant) -> Self {
        Self {
            algorithm,
            token_type: "JWT".to_string(),
        }
    }

    pub fn for_level(level: SecurityLevel) -> Self {
        Self::new(level.signature_variant())
    }

    pub fn from_config(config: &PqcConfig) -> CryptoResult<Self> {
        config.validate()?;
        Ok(Self::for_level(config.security_level()?).with_token_type(&config.signing.jwt_type))
    }

    pub fn with_token_type(mut self, token_type: &str) -> Self {
        self.token_type = token_type.to_string();
        self
    }

    /// Signature algorithm written to the `alg` header
    pub fn algorithm(&self) -> DilithiumVariant {
        self.algorithm
    }

    /// Sign `payload`, adding `iat` when absent
    pub fn sign_jwt(&self, payload: &Claims, secret_key: &[u8], key_id: &str) -> CryptoResult<String> {
        let header = TokenHeader {
            alg: self.algorithm.algorithm_name().to_string(),
            typ: self.token_type.clone(),
            kid: key_id.to_string(),
        };

        let mut claims = payload.clone();
        claims
            .entry("iat")
            .or_insert_with(|| Value::from(utils::now().timestamp()));

        let signing_input = format!(
            "{}.{}",
            utils::to_base64url(&serde_json::to_vec(&header)?),
            utils::to_base64url(&serde_json::to_vec(&claims)?)
        );
        let signature = self.algorithm.sign(signing_input.as_bytes(), secret_key)?;

        Ok(format!("{}.{}", signing_input, utils::to_base64url(&signature)))
    }

    pub fn verify_jwt(&self, token: &str, public_key: &[u8]) -> TokenVerification {
        self.verify_jwt_at(token, public_key, utils::now().timestamp())
    }

    /// Verify against an explicit clock, `now` in seconds since the epoch
    pub fn verify_jwt_at(&self, token: &str, public_key: &[u8], now: i64) -> TokenVerification {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return TokenVerification::rejected(TokenRejection::Malformed(format!(
                "expected 3 segments, got {}",
                segments.len()
            )));
        }

        let header: TokenHeader = match decode_segment(segments[0]) {
            Ok(header) => header,
            Err(reason) => return TokenVerification::rejected(reason),
        };
        let claims: Claims = match decode_segment(segments[1]) {
            Ok(claims) => claims,
            Err(reason) => return TokenVerification::rejected(reason),
        };
        let signature = match utils::from_base64url(segments[2]) {
            Ok(signature) => signature,
            Err(_) => {
                return TokenVerification::rejected(TokenRejection::Malformed(
                    "signature is not base64url".to_string(),
                ))
            }
        };

        if header.alg != self.algorithm.algorithm_name() {
            return TokenVerification::rejected(TokenRejection::AlgorithmMismatch {
                expected: self.algorithm.algorithm_name().to_string(),
                found: header.alg,
            });
        }

        let signing_input = format!("{}.{}", segments[0], segments[1]);
        if !self.algorithm.verify(signing_input.as_bytes(), &signature, public_key) {
            return TokenVerification::rejected(TokenRejection::InvalidSignature);
        }

        match claims.get("exp") {
            None => {}
            Some(exp) => match exp.as_i64().or_else(|| exp.as_f64().map(|exp| exp as i64)) {
                Some(expired_at) if now >= expired_at => {
                    return TokenVerification::rejected(TokenRejection::Expired { expired_at })
                }
                Some(_) => {}
                None => {
                    return TokenVerification::rejected(TokenRejection::Malformed(
                        "exp claim is not numeric".to_string(),
                    ))
                }
            },
        }

        TokenVerification::accepted(header.kid, claims)
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, TokenRejection> {
    let bytes = utils::from_base64url(segment)
        .map_err(|_| TokenRejection::Malformed("segment is not base64url".to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenRejection::Malformed(e.to_string()))
}
