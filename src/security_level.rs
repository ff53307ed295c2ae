/*!
 * Security tiers shared by the KEM and signature adapters
 */

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dilithium::DilithiumVariant;
use crate::error::CryptoError;
use crate::kyber::KyberVariant;

/// NIST security tier selecting matching KEM and signature parameter sets
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityLevel {
    /// ML-KEM-512 / ML-DSA-44
    Level1,
    /// ML-KEM-768 / ML-DSA-65
    #[default]
    Level3,
    /// ML-KEM-1024 / ML-DSA-87
    Level5,
}

impl SecurityLevel {
    pub const ALL: [SecurityLevel; 3] = [
        SecurityLevel::Level1,
        SecurityLevel::Level3,
        SecurityLevel::Level5,
    ];

    pub fn kem_variant(&self) -> KyberVariant {
        match self {
            SecurityLevel::Level1 => KyberVariant::Kyber512,
            SecurityLevel::Level3 => KyberVariant::Kyber768,
            SecurityLevel::Level5 => KyberVariant::Kyber1024,
        }
    }

    pub fn signature_variant(&self) -> DilithiumVariant {
        match self {
            SecurityLevel::Level1 => DilithiumVariant::Dilithium2,
            SecurityLevel::Level3 => DilithiumVariant::Dilithium3,
            SecurityLevel::Level5 => DilithiumVariant::Dilithium5,
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityLevel::Level1 => write!(f, "Level1"),
            SecurityLevel::Level3 => write!(f, "Level3"),
            SecurityLevel::Level5 => write!(f, "Level5"),
        }
    }
}

impl FromStr for SecurityLevel {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Level1" | "1" => Ok(SecurityLevel::Level1),
            "Level3" | "3" => Ok(SecurityLevel::Level3),
            "Level5" | "5" => Ok(SecurityLevel::Level5),
            other => other
                .parse::<KyberVariant>()
                .map(SecurityLevel::from)
                .or_else(|_| other.parse::<DilithiumVariant>().map(SecurityLevel::from))
                .map_err(|_| {
                    CryptoError::unsupported_algorithm(&format!("security level {}", other))
                }),
        }
    }
}

impl From<KyberVariant> for SecurityLevel {
    fn from(variant: KyberVariant) -> Self {
        match variant {
            KyberVariant::Kyber512 => SecurityLevel::Level1,
            KyberVariant::Kyber768 => SecurityLevel::Level3,
            KyberVariant::Kyber1024 => SecurityLevel::Level5,
        }
    }
}

impl From<DilithiumVariant> for SecurityLevel {
    fn from(variant: DilithiumVariant) -> Self {
        match variant {
            DilithiumVariant::Dilithium2 => SecurityLevel::Level1,
            DilithiumVariant::Dilithium3 => SecurityLevel::Level3,
            DilithiumVariant::Dilithium5 => SecurityLevel::Level5,
        }
    }
}
