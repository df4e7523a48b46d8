//! Remote signing: async signers driven synchronously, digest-signing
//! services (KMS/HSM style) and poll-until-done signing operations.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::signer::{CachedConfig, SignerCapability, SignerConfig, SignerError};
use crate::domain::types::{EngineDefaults, SigAlg};

/// A signer whose operations are async, e.g. network calls.
#[async_trait]
pub trait AsyncSignerCapability: Send + Sync {
    async fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignerError>;

    async fn config(&self) -> Result<SignerConfig, SignerError>;

    fn max_signature_length(&self) -> Option<usize> {
        None
    }
}

/// Block on `fut` from synchronous code, whether or not a Tokio runtime is
/// already running on this thread.
pub fn run_on_current_thread<F, T, E>(fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>> + Send,
    T: Send,
    E: From<std::io::Error> + Send,
{
    let build = || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.block_on(fut))
        }
        // A current-thread runtime cannot be blocked from inside; drive the
        // future on a helper thread with its own runtime.
        Ok(_) => std::thread::scope(|s| {
            s.spawn(|| build()?.block_on(fut))
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("signer thread panicked").into()))
        }),
        Err(_) => build()?.block_on(fut),
    }
}

/// Adapts an [`AsyncSignerCapability`] to the synchronous engine contract.
pub struct BlockingSigner<S> {
    inner: S,
    cached: CachedConfig,
}

impl<S: AsyncSignerCapability> BlockingSigner<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, cached: CachedConfig::new() }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: AsyncSignerCapability> SignerCapability for BlockingSigner<S> {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignerError> {
        run_on_current_thread(self.inner.sign(data))
    }

    fn config(&self) -> Result<SignerConfig, SignerError> {
        self.cached.get_or_try_init(|| run_on_current_thread(self.inner.config()))
    }

    fn max_signature_length(&self) -> Option<usize> {
        self.inner.max_signature_length()
    }
}

/// Digest the signing algorithm signs over. Ed25519 signs the full message
/// and has no separate digest step.
#[cfg(feature = "openssl")]
pub fn digest_for_alg(alg: SigAlg, data: &[u8]) -> Result<Vec<u8>, SignerError> {
    use openssl::hash::{hash, MessageDigest};

    let md = match alg {
        SigAlg::Es256 | SigAlg::Ps256 => MessageDigest::sha256(),
        SigAlg::Es384 | SigAlg::Ps384 => MessageDigest::sha384(),
        SigAlg::Es512 | SigAlg::Ps512 => MessageDigest::sha512(),
        SigAlg::Ed25519 => {
            return Err(SignerError::InvalidConfig(
                "ed25519 cannot sign a precomputed digest".into(),
            ))
        }
    };
    Ok(hash(md, data)?.to_vec())
}

/// A service that signs precomputed digests and publishes its certificate chain.
#[async_trait]
pub trait DigestSigningService: Send + Sync {
    async fn sign_digest(&self, alg: SigAlg, digest: &[u8]) -> Result<Vec<u8>, SignerError>;

    /// PEM chain, leaf first.
    async fn certificate_chain(&self) -> Result<String, SignerError>;
}

/// Hashes locally and sends only the digest to a [`DigestSigningService`].
#[cfg(feature = "openssl")]
pub struct RemoteSigner<S> {
    service: S,
    alg: SigAlg,
    time_authority_url: Option<String>,
    max_signature_length: Option<usize>,
}

#[cfg(feature = "openssl")]
impl<S: DigestSigningService> RemoteSigner<S> {
    pub fn new(service: S, alg: SigAlg) -> Self {
        Self { service, alg, time_authority_url: None, max_signature_length: None }
    }

    pub fn with_time_authority_url(mut self, url: impl Into<String>) -> Self {
        self.time_authority_url = Some(url.into());
        self
    }

    pub fn with_max_signature_length(mut self, len: usize) -> Self {
        self.max_signature_length = Some(len);
        self
    }

    /// Wrap for use wherever a synchronous [`SignerCapability`] is expected.
    pub fn into_blocking(self) -> BlockingSigner<Self> {
        BlockingSigner::new(self)
    }
}

#[cfg(feature = "openssl")]
#[async_trait]
impl<S: DigestSigningService> AsyncSignerCapability for RemoteSigner<S> {
    async fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignerError> {
        let digest = digest_for_alg(self.alg, data)?;
        debug!(alg = %self.alg, digest_len = digest.len(), "requesting remote digest signature");
        self.service.sign_digest(self.alg, &digest).await
    }

    async fn config(&self) -> Result<SignerConfig, SignerError> {
        let certs = self.service.certificate_chain().await?;
        let mut config = SignerConfig::new(self.alg, certs);
        config.time_authority_url = self.time_authority_url.clone();
        Ok(config)
    }

    fn max_signature_length(&self) -> Option<usize> {
        self.max_signature_length
    }
}

/// State of a long-running remote signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded(Vec<u8>),
    Failed(String),
}

/// A submitted signing request that is polled until it settles.
#[async_trait]
pub trait SigningOperation: Send + Sync {
    async fn poll(&self) -> Result<OperationStatus, SignerError>;
}

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: EngineDefaults::POLL_INTERVAL,
            max_attempts: EngineDefaults::MAX_POLL_ATTEMPTS,
        }
    }
}

/// Poll `op` until it succeeds or fails, sleeping `policy.interval` between polls.
pub async fn wait_for_completion<O>(op: &O, policy: PollPolicy) -> Result<Vec<u8>, SignerError>
where
    O: SigningOperation + ?Sized,
{
    for attempt in 1..=policy.max_attempts {
        match op.poll().await? {
            OperationStatus::Succeeded(signature) => return Ok(signature),
            OperationStatus::Failed(reason) => return Err(SignerError::Remote(reason)),
            OperationStatus::InProgress => {
                debug!(attempt, "remote signing still in progress");
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.interval).await;
                }
            }
        }
    }
    Err(SignerError::Timeout { attempts: policy.max_attempts })
}
