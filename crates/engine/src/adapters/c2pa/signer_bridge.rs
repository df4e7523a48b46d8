//! Presents a [`SignerCapability`] to c2pa as a `c2pa::Signer`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

use c2pa::{Error as C2paError, SigningAlg};

use super::settings::panic_message;
use super::url_validation::validate_external_http_url;
use crate::crypto::signer::{SignerCapability, SignerError, TimestampProvider};
use crate::domain::error::{EngineError, EngineResult};

/// Signer state resolved once per sign call from the capability's config.
pub struct SignerBridge<'a> {
  capability: &'a dyn SignerCapability,
  alg: SigningAlg,
  certs: Vec<Vec<u8>>,
  reserve_size: usize,
  time_authority_url: Option<String>,
  use_ocsp: bool,
  // c2pa wraps signer errors; the original text is kept here for the caller
  failure: Mutex<Option<String>>,
}

impl<'a> SignerBridge<'a> {
  pub fn prepare(capability: &'a dyn SignerCapability, allow_insecure_http: bool) -> EngineResult<Self> {
    let config = capability.config()?;
    let alg = config.sig_alg()?.to_c2pa();
    let certs = config.cert_chain_der()?;
    let reserve_size = config.reserve_size(capability.max_signature_length());

    // A custom timestamper replaces the URL; only a URL we would contact is checked
    if let (Some(url), None) = (&config.time_authority_url, capability.timestamper()) {
      validate_external_http_url(url, allow_insecure_http)
        .map_err(|e| EngineError::signing(format!("time authority rejected: {e}")))?;
    }

    tracing::debug!(
      alg = %config.alg,
      certs = certs.len(),
      reserve_size,
      tsa = config.time_authority_url.as_deref().unwrap_or("none"),
      "signer prepared"
    );

    Ok(Self {
      capability,
      alg,
      certs,
      reserve_size,
      time_authority_url: config.time_authority_url,
      use_ocsp: config.use_ocsp,
      failure: Mutex::new(None),
    })
  }

  /// Message of the last signer failure, if the capability failed.
  pub fn take_failure(&self) -> Option<String> {
    self.failure.lock().ok().and_then(|mut f| f.take())
  }

  fn record(&self, message: String) {
    if let Ok(mut slot) = self.failure.lock() {
      *slot = Some(message);
    }
  }

  pub fn timestamper(&self) -> Option<&'a dyn TimestampProvider> {
    self.capability.timestamper()
  }

  /// Whether the signer asked for OCSP responses during the sign.
  pub fn use_ocsp(&self) -> bool {
    self.use_ocsp
  }
}

impl c2pa::Signer for SignerBridge<'_> {
  fn sign(&self, data: &[u8]) -> c2pa::Result<Vec<u8>> {
    let signature = match catch_unwind(AssertUnwindSafe(|| self.capability.sign(data))) {
      Ok(Ok(signature)) => signature,
      Ok(Err(e)) => {
        self.record(e.to_string());
        return Err(C2paError::OtherError(Box::new(e)));
      }
      Err(payload) => {
        let message = format!("signer panicked: {}", panic_message(payload.as_ref()));
        self.record(message.clone());
        return Err(C2paError::BadParam(message));
      }
    };

    if signature.len() > self.reserve_size {
      let message = format!(
        "signature is {} bytes, larger than the {} bytes reserved",
        signature.len(),
        self.reserve_size
      );
      self.record(message.clone());
      return Err(C2paError::BadParam(message));
    }
    Ok(signature)
  }

  fn alg(&self) -> SigningAlg {
    self.alg
  }

  fn certs(&self) -> c2pa::Result<Vec<Vec<u8>>> {
    Ok(self.certs.clone())
  }

  fn reserve_size(&self) -> usize {
    self.reserve_size
  }

  fn time_authority_url(&self) -> Option<String> {
    self.time_authority_url.clone()
  }
}

/// Same as [`SignerBridge`], but timestamp tokens come from the capability's
/// own [`TimestampProvider`] instead of an HTTP request to the TSA URL.
pub struct TimestampingBridge<'a> {
  inner: SignerBridge<'a>,
  provider: &'a dyn TimestampProvider,
}

impl<'a> TimestampingBridge<'a> {
  pub fn new(inner: SignerBridge<'a>, provider: &'a dyn TimestampProvider) -> Self {
    Self { inner, provider }
  }

  pub fn take_failure(&self) -> Option<String> {
    self.inner.take_failure()
  }
}

impl c2pa::Signer for TimestampingBridge<'_> {
  fn sign(&self, data: &[u8]) -> c2pa::Result<Vec<u8>> {
    self.inner.sign(data)
  }

  fn alg(&self) -> SigningAlg {
    self.inner.alg
  }

  fn certs(&self) -> c2pa::Result<Vec<Vec<u8>>> {
    self.inner.certs()
  }

  fn reserve_size(&self) -> usize {
    self.inner.reserve_size
  }

  fn time_authority_url(&self) -> Option<String> {
    self.inner.time_authority_url.clone()
  }

  fn send_timestamp_request(&self, message: &[u8]) -> Option<c2pa::Result<Vec<u8>>> {
    Some(self.provider.timestamp(message).map_err(|e: SignerError| {
      self.inner.record(e.to_string());
      C2paError::OtherError(Box::new(e))
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::crypto::callback::CallbackSigner;
  use crate::crypto::signer::SignerConfig;
  use crate::domain::types::SigAlg;
  use c2pa::Signer;

  const CERT: &str = "-----BEGIN CERTIFICATE-----\nAQID\n-----END CERTIFICATE-----\n";

  struct Token;

  impl TimestampProvider for Token {
    fn timestamp(&self, _message: &[u8]) -> Result<Vec<u8>, SignerError> {
      Ok(vec![0x30, 0x00])
    }
  }

  #[test]
  fn reports_config_through_c2pa_signer() {
    let cap = CallbackSigner::new(SignerConfig::new(SigAlg::Es384, CERT), |_| Ok(vec![9; 96]));
    let bridge = SignerBridge::prepare(&cap, false).unwrap();
    assert_eq!(bridge.alg(), SigningAlg::Es384);
    assert_eq!(bridge.certs().unwrap(), vec![vec![1, 2, 3]]);
    assert_eq!(bridge.reserve_size(), CERT.len() + 20_000);
    assert_eq!(bridge.sign(b"claim").unwrap().len(), 96);
    assert!(bridge.take_failure().is_none());
  }

  #[test]
  fn signer_failure_text_is_kept() {
    let cap = CallbackSigner::new(SignerConfig::new(SigAlg::Es256, CERT), |_| {
      Err(SignerError::Callback("hsm offline".into()))
    });
    let bridge = SignerBridge::prepare(&cap, false).unwrap();
    assert!(bridge.sign(b"claim").is_err());
    assert_eq!(bridge.take_failure().unwrap(), "signer callback failed: hsm offline");
  }

  #[test]
  fn panicking_signer_is_reported_as_failure() {
    let cap = CallbackSigner::new(SignerConfig::new(SigAlg::Es256, CERT), |_| panic!("token unplugged"));
    let bridge = SignerBridge::prepare(&cap, false).unwrap();
    assert!(bridge.sign(b"claim").is_err());
    assert_eq!(bridge.take_failure().unwrap(), "signer panicked: token unplugged");
  }

  #[test]
  fn ocsp_request_is_carried_from_config() {
    let mut config = SignerConfig::new(SigAlg::Es256, CERT);
    assert!(!SignerBridge::prepare(&CallbackSigner::new(config.clone(), |_| Ok(vec![])), false).unwrap().use_ocsp());
    config.use_ocsp = true;
    let cap = CallbackSigner::new(config, |_| Ok(vec![]));
    assert!(SignerBridge::prepare(&cap, false).unwrap().use_ocsp());
  }

  #[test]
  fn oversize_signature_is_rejected() {
    let cap = CallbackSigner::new(SignerConfig::new(SigAlg::Es256, CERT), |_| Ok(vec![0; 65]))
      .with_max_signature_length(64);
    let bridge = SignerBridge::prepare(&cap, false).unwrap();
    assert!(bridge.sign(b"claim").is_err());
    assert!(bridge.take_failure().unwrap().contains("65 bytes"));
  }

  #[test]
  fn bad_config_fails_before_signing() {
    let mut config = SignerConfig::new(SigAlg::Es256, CERT);
    config.alg = "md5".into();
    let cap = CallbackSigner::new(config, |_| Ok(vec![]));
    assert!(matches!(SignerBridge::prepare(&cap, false), Err(EngineError::Signing { .. })));

    let empty = CallbackSigner::new(SignerConfig::new(SigAlg::Es256, ""), |_| Ok(vec![]));
    assert!(matches!(SignerBridge::prepare(&empty, false), Err(EngineError::Signing { .. })));
  }

  #[test]
  fn insecure_tsa_needs_opt_in() {
    let config = SignerConfig::new(SigAlg::Es256, CERT).with_time_authority_url("http://127.0.0.1/tsa");
    let cap = CallbackSigner::new(config, |_| Ok(vec![]));
    assert!(SignerBridge::prepare(&cap, false).is_err());
  }

  #[test]
  fn custom_timestamper_bypasses_url_and_answers_requests() {
    let config = SignerConfig::new(SigAlg::Es256, CERT).with_time_authority_url("http://127.0.0.1/tsa");
    let cap = CallbackSigner::new(config, |_| Ok(vec![])).with_timestamper(Token);
    let inner = SignerBridge::prepare(&cap, false).unwrap();
    let provider = inner.timestamper().unwrap();
    let bridge = TimestampingBridge::new(inner, provider);
    assert_eq!(bridge.send_timestamp_request(b"m").unwrap().unwrap(), vec![0x30, 0x00]);
  }
}
