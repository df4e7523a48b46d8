//! Closure-backed signer, the shape foreign callers plug in.

use super::signer::{CachedConfig, SignerCapability, SignerConfig, SignerError, TimestampProvider};

type SignFn = dyn Fn(&[u8]) -> Result<Vec<u8>, SignerError> + Send + Sync;
type ConfigFn = dyn Fn() -> Result<SignerConfig, SignerError> + Send + Sync;

/// Signs by calling back into caller code. The config is produced on first
/// use and reused for the signer's lifetime.
pub struct CallbackSigner {
    sign: Box<SignFn>,
    config_fn: Box<ConfigFn>,
    cached: CachedConfig,
    max_signature_length: Option<usize>,
    timestamper: Option<Box<dyn TimestampProvider>>,
}

impl CallbackSigner {
    pub fn new<F>(config: SignerConfig, sign: F) -> Self
    where
        F: Fn(&[u8]) -> Result<Vec<u8>, SignerError> + Send + Sync + 'static,
    {
        Self::lazy(move || Ok(config.clone()), sign)
    }

    /// Config is computed by `config_fn` the first time the engine asks for it.
    pub fn lazy<C, F>(config_fn: C, sign: F) -> Self
    where
        C: Fn() -> Result<SignerConfig, SignerError> + Send + Sync + 'static,
        F: Fn(&[u8]) -> Result<Vec<u8>, SignerError> + Send + Sync + 'static,
    {
        Self {
            sign: Box::new(sign),
            config_fn: Box::new(config_fn),
            cached: CachedConfig::new(),
            max_signature_length: None,
            timestamper: None,
        }
    }

    pub fn with_max_signature_length(mut self, len: usize) -> Self {
        self.max_signature_length = Some(len);
        self
    }

    pub fn with_timestamper(mut self, timestamper: impl TimestampProvider + 'static) -> Self {
        self.timestamper = Some(Box::new(timestamper));
        self
    }
}

impl std::fmt::Debug for CallbackSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSigner")
            .field("max_signature_length", &self.max_signature_length)
            .field("timestamper", &self.timestamper.is_some())
            .finish_non_exhaustive()
    }
}

impl SignerCapability for CallbackSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignerError> {
        (self.sign)(data)
    }

    fn config(&self) -> Result<SignerConfig, SignerError> {
        self.cached.get_or_try_init(|| (self.config_fn)())
    }

    fn max_signature_length(&self) -> Option<usize> {
        self.max_signature_length
    }

    fn timestamper(&self) -> Option<&dyn TimestampProvider> {
        self.timestamper.as_deref()
    }
}
