//! Signer capability: the contract the engine signs through, plus the
//! `local:`/`env:` key sources used to build a local signer.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::domain::types::{EngineDefaults, SigAlg, UnknownSigAlg};

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Invalid signer URI scheme: expected 'local:' or 'env:'")]
    InvalidScheme,
    #[error("Missing path for 'local:' signer")]
    MissingLocalPath,
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("signer callback failed: {0}")]
    Callback(String),
    #[error("invalid signer configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    UnknownAlg(#[from] UnknownSigAlg),
    #[error("remote signing failed: {0}")]
    Remote(String),
    #[error("remote signing did not complete after {attempts} polls")]
    Timeout { attempts: u32 },
    #[error("timestamp request failed: {0}")]
    Timestamp(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "openssl")]
    #[error(transparent)]
    OpenSsl(#[from] openssl::error::ErrorStack),
}

/// What the engine needs to know about a signer before calling it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerConfig {
    /// One of `ps256`, `ps384`, `ps512`, `es256`, `es384`, `es512`, `ed25519`.
    pub alg: String,
    /// PEM certificate chain, leaf first.
    pub certs: String,
    pub time_authority_url: Option<String>,
    pub use_ocsp: bool,
}

impl SignerConfig {
    pub fn new(alg: SigAlg, certs: impl Into<String>) -> Self {
        Self {
            alg: alg.as_str().to_string(),
            certs: certs.into(),
            time_authority_url: None,
            use_ocsp: false,
        }
    }

    pub fn with_time_authority_url(mut self, url: impl Into<String>) -> Self {
        self.time_authority_url = Some(url.into());
        self
    }

    pub fn sig_alg(&self) -> Result<SigAlg, SignerError> {
        Ok(self.alg.parse()?)
    }

    /// DER certificates in chain order. An empty or unparseable chain is an error.
    pub fn cert_chain_der(&self) -> Result<Vec<Vec<u8>>, SignerError> {
        let blocks = pem::parse_many(self.certs.as_bytes())
            .map_err(|e| SignerError::InvalidConfig(format!("certificate chain is not valid PEM: {e}")))?;
        let certs: Vec<Vec<u8>> = blocks
            .into_iter()
            .filter(|p| p.tag() == "CERTIFICATE")
            .map(|p| p.into_contents())
            .collect();
        if certs.is_empty() {
            return Err(SignerError::InvalidConfig("certificate chain is empty".into()));
        }
        Ok(certs)
    }

    /// Bytes the engine reserves for the signature box.
    pub fn reserve_size(&self, declared: Option<usize>) -> usize {
        declared.unwrap_or(self.certs.len() + EngineDefaults::SIGNATURE_RESERVE_PADDING)
    }

    /// Check that each certificate is issued by the one after it.
    #[cfg(feature = "openssl")]
    pub fn validate_chain_order(&self) -> Result<(), SignerError> {
        super::chain::validate_chain_order(&self.certs)
    }
}

/// Produces an RFC 3161 timestamp token for a message.
pub trait TimestampProvider: Send + Sync {
    fn timestamp(&self, message: &[u8]) -> Result<Vec<u8>, SignerError>;
}

/// A caller-supplied signing capability.
///
/// The engine calls `config` once and then `sign` exactly once per signed
/// asset, synchronously on the calling thread. Any error aborts the sign and
/// its message is reported to the caller, as does a panic.
///
/// `sign` runs while the engine holds its process-wide settings lock, so signs
/// in one process are serialized. A signer must not call back into the engine
/// from `sign`; such a call fails with a config error.
pub trait SignerCapability: Send + Sync {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignerError>;

    fn config(&self) -> Result<SignerConfig, SignerError>;

    fn max_signature_length(&self) -> Option<usize> {
        None
    }

    /// Custom timestamping. When `None`, the engine uses `time_authority_url`.
    fn timestamper(&self) -> Option<&dyn TimestampProvider> {
        None
    }
}

impl<T: SignerCapability + ?Sized> SignerCapability for Arc<T> {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignerError> {
        (**self).sign(data)
    }

    fn config(&self) -> Result<SignerConfig, SignerError> {
        (**self).config()
    }

    fn max_signature_length(&self) -> Option<usize> {
        (**self).max_signature_length()
    }

    fn timestamper(&self) -> Option<&dyn TimestampProvider> {
        (**self).timestamper()
    }
}

/// Computes a signer's config on first use and hands out copies afterwards.
#[derive(Debug, Default)]
pub struct CachedConfig {
    cell: OnceCell<SignerConfig>,
}

impl CachedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_try_init<F>(&self, f: F) -> Result<SignerConfig, SignerError>
    where
        F: FnOnce() -> Result<SignerConfig, SignerError>,
    {
        self.cell.get_or_try_init(f).cloned()
    }
}

/// Source for a local keypair.
/// Format examples:
/// - local:/path/to/cert.pem,/path/to/private.pem
/// - env:CERT_VAR,KEY_VAR
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerSource {
    Local { cert_path: PathBuf, key_path: PathBuf },
    Env { cert_var: String, key_var: String },
}

impl FromStr for SignerSource {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, value) = s.split_once(':').ok_or(SignerError::InvalidScheme)?;
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        if parts.len() != 2 {
            return Err(SignerError::InvalidScheme);
        }

        match scheme {
            "local" => {
                if parts.iter().any(|p| p.is_empty()) {
                    return Err(SignerError::MissingLocalPath);
                }
                Ok(SignerSource::Local {
                    cert_path: PathBuf::from(parts[0]),
                    key_path: PathBuf::from(parts[1]),
                })
            }
            "env" => Ok(SignerSource::Env {
                cert_var: parts[0].to_string(),
                key_var: parts[1].to_string(),
            }),
            _ => Err(SignerError::InvalidScheme),
        }
    }
}

impl SignerSource {
    /// Load the PEM certificate chain and private key this source points at.
    pub fn load_pem(&self) -> Result<(Vec<u8>, Vec<u8>), SignerError> {
        match self {
            SignerSource::Local { cert_path, key_path } => {
                Ok((std::fs::read(cert_path)?, std::fs::read(key_path)?))
            }
            SignerSource::Env { cert_var, key_var } => {
                let cert_pem = std::env::var(cert_var)
                    .map_err(|_| SignerError::EnvVarNotFound(cert_var.clone()))?;
                let key_pem = std::env::var(key_var)
                    .map_err(|_| SignerError::EnvVarNotFound(key_var.clone()))?;
                Ok((cert_pem.into_bytes(), key_pem.into_bytes()))
            }
        }
    }

    /// Build a local signer from this source.
    #[cfg(feature = "openssl")]
    pub fn resolve(
        &self,
        alg: SigAlg,
        timestamper: Option<&super::timestamper::Timestamper>,
    ) -> Result<super::local::LocalSigner, SignerError> {
        let (cert_pem, key_pem) = self.load_pem()?;
        let signer = super::local::LocalSigner::from_pem(&cert_pem, key_pem, alg)?;
        Ok(match timestamper {
            Some(tsa) => signer.with_time_authority_url(tsa.url()),
            None => signer,
        })
    }
}
