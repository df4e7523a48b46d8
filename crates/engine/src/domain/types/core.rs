use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported signature algorithms. Mapped to c2pa internally.
///
/// The wire form is the lowercase C2PA identifier (`ps384`, `es256`, ...),
/// which is what a [`SignerConfig`](crate::crypto::signer::SignerConfig) carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigAlg {
    Es256,
    Es384,
    Es512,
    Ps256,
    Ps384,
    Ps512,
    Ed25519,
}

impl SigAlg {
    pub fn as_str(self) -> &'static str {
        match self {
            SigAlg::Es256 => "es256",
            SigAlg::Es384 => "es384",
            SigAlg::Es512 => "es512",
            SigAlg::Ps256 => "ps256",
            SigAlg::Ps384 => "ps384",
            SigAlg::Ps512 => "ps512",
            SigAlg::Ed25519 => "ed25519",
        }
    }

    /// Size in bytes of the digest the algorithm signs over. `None` for Ed25519,
    /// which signs the full message.
    pub fn digest_len(self) -> Option<usize> {
        match self {
            SigAlg::Es256 | SigAlg::Ps256 => Some(32),
            SigAlg::Es384 | SigAlg::Ps384 => Some(48),
            SigAlg::Es512 | SigAlg::Ps512 => Some(64),
            SigAlg::Ed25519 => None,
        }
    }

    #[cfg(feature = "c2pa")]
    pub fn to_c2pa(self) -> c2pa::SigningAlg {
        match self {
            SigAlg::Es256 => c2pa::SigningAlg::Es256,
            SigAlg::Es384 => c2pa::SigningAlg::Es384,
            SigAlg::Es512 => c2pa::SigningAlg::Es512,
            SigAlg::Ps256 => c2pa::SigningAlg::Ps256,
            SigAlg::Ps384 => c2pa::SigningAlg::Ps384,
            SigAlg::Ps512 => c2pa::SigningAlg::Ps512,
            SigAlg::Ed25519 => c2pa::SigningAlg::Ed25519,
        }
    }
}

impl fmt::Display for SigAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported signing algorithm: {0}")]
pub struct UnknownSigAlg(pub String);

impl FromStr for SigAlg {
    type Err = UnknownSigAlg;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "es256" => Ok(SigAlg::Es256),
            "es384" => Ok(SigAlg::Es384),
            "es512" => Ok(SigAlg::Es512),
            "ps256" => Ok(SigAlg::Ps256),
            "ps384" => Ok(SigAlg::Ps384),
            "ps512" => Ok(SigAlg::Ps512),
            "ed25519" => Ok(SigAlg::Ed25519),
            _ => Err(UnknownSigAlg(s.to_string())),
        }
    }
}
