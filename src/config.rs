//! Runtime configuration
//!
//! Tunables for the key manager, the rotation scheduler and the signers.
//! Loaded from JSON; every field has a default so partial files are accepted.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::security_level::SecurityLevel;

/// Rotation policy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Seconds between scheduler sweeps
    pub check_interval_secs: u64,
    /// Days before expiry at which a key becomes due for rotation
    pub rotation_lead_days: u32,
    /// Fraction of `max_usage_count` at which a key becomes due for rotation
    pub usage_rotation_threshold: f64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 3600,
            rotation_lead_days: 7,
            usage_rotation_threshold: 0.9,
        }
    }
}

impl RotationConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

/// Token and request signer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Maximum accepted age of a signed request
    pub replay_window_secs: u64,
    /// `typ` header of issued tokens
    pub jwt_type: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            replay_window_secs: 300,
            jwt_type: "JWT".to_string(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PqcConfig {
    /// Security level name: `Level1`/`Level3`/`Level5` or an algorithm name
    /// such as `ML-KEM-768`
    pub default_security_level: String,
    pub rotation: RotationConfig,
    pub signing: SigningConfig,
}

impl Default for PqcConfig {
    fn default() -> Self {
        Self {
            default_security_level: SecurityLevel::default().to_string(),
            rotation: RotationConfig::default(),
            signing: SigningConfig::default(),
        }
    }
}

impl PqcConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> CryptoResult<Self> {
        let config: PqcConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> CryptoResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        log::info!("Loading configuration from {}", path.as_ref().display());
        Self::from_json_str(&contents)
    }

    /// The configured security level
    ///
    /// Unknown names are an `UnsupportedAlgorithm` error; there is no
    /// fallback to a weaker level.
    pub fn security_level(&self) -> CryptoResult<SecurityLevel> {
        self.default_security_level.parse()
    }

    pub fn validate(&self) -> CryptoResult<()> {
        self.security_level()?;

        if self.rotation.check_interval_secs == 0 {
            return Err(invalid_config("rotation.check_interval_secs", "> 0", "0"));
        }
        let threshold = self.rotation.usage_rotation_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(invalid_config(
                "rotation.usage_rotation_threshold",
                "in (0, 1]",
                &threshold.to_string(),
            ));
        }
        if self.signing.replay_window_secs == 0 {
            return Err(invalid_config("signing.replay_window_secs", "> 0", "0"));
        }
        if self.signing.jwt_type.is_empty() {
            return Err(invalid_config("signing.jwt_type", "non-empty", "empty"));
        }
        Ok(())
    }
}

fn invalid_config(parameter: &str, expected: &str, actual: &str) -> CryptoError {
    CryptoError::InvalidParameter {
        parameter: parameter.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
        error_code: error_codes::INVALID_CONFIGURATION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PqcConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.security_level().unwrap(), SecurityLevel::Level3);
        assert_eq!(config.rotation.check_interval(), Duration::from_secs(3600));
        assert_eq!(config.rotation.rotation_lead_days, 7);
        assert_eq!(config.signing.replay_window_secs, 300);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PqcConfig::from_json_str(
            r#"{"default_security_level": "ML-KEM-1024", "rotation": {"check_interval_secs": 60}}"#,
        )
        .unwrap();
        assert_eq!(config.security_level().unwrap(), SecurityLevel::Level5);
        assert_eq!(config.rotation.check_interval_secs, 60);
        assert_eq!(config.rotation.usage_rotation_threshold, 0.9);
        assert_eq!(config.signing.jwt_type, "JWT");
    }

    #[test]
    fn test_unknown_algorithm_is_fatal() {
        let err = PqcConfig::from_json_str(r#"{"default_security_level": "RSA-4096"}"#).unwrap_err();
        assert_eq!(err.error_type(), "UnsupportedAlgorithmError");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(PqcConfig::from_json_str(r#"{"rotation": {"check_interval_secs": 0}}"#).is_err());
        assert!(PqcConfig::from_json_str(r#"{"rotation": {"usage_rotation_threshold": 1.5}}"#).is_err());
        assert!(PqcConfig::from_json_str(r#"{"signing": {"replay_window_secs": 0}}"#).is_err());
        assert!(PqcConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"signing": {{"replay_window_secs": 120, "jwt_type": "PQC-JWT"}}}}"#).unwrap();

        let config = PqcConfig::from_file(file.path()).unwrap();
        assert_eq!(config.signing.replay_window_secs, 120);
        assert_eq!(config.signing.jwt_type, "PQC-JWT");

        assert!(PqcConfig::from_file("/nonexistent/pqc-config.json").is_err());
    }
}
