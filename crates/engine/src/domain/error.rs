// crates/engine/src/domain/error.rs
use thiserror::Error;

use crate::crypto::signer::SignerError;

/// Stable message used for every path rejected before touching the engine.
pub const INVALID_PATH_MESSAGE: &str = "Invalid file path provided.";

#[derive(Debug, Error)]
pub enum EngineError {
  /// Input/output path missing, empty, or unreadable. Checked before any engine call.
  #[error("{message} ({path})")]
  InvalidPath { path: String, message: String },

  #[error("malformed manifest: {0}")]
  MalformedManifest(String),

  #[error("resource not found: {0}")]
  ResourceNotFound(String),

  /// The engine reported a failure while signing, or the signer callback failed.
  #[error("signing failed: {message}")]
  Signing { message: String },

  /// The engine failed to verify an asset for a reason other than "no manifest".
  #[error("verification failed: {message}")]
  Verification { message: String },

  #[error("unsupported assertion payload for label '{label}': {reason}")]
  UnsupportedAssertionLabel { label: String, reason: String },

  #[error("builder already signed; call rebuild() before signing again")]
  AlreadySigned,

  #[error("configuration: {0}")]
  Config(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),

  #[cfg(feature = "c2pa")]
  #[error(transparent)]
  C2pa(#[from] c2pa::Error),

  #[error("feature not enabled: {0}")]
  Feature(&'static str),

  // Useful when we catch_unwind to avoid crossing FFI boundaries with panics.
  #[error("internal panic: {0}")]
  Panic(String),
}

impl EngineError {
  pub fn invalid_path(path: impl AsRef<std::path::Path>) -> Self {
    EngineError::InvalidPath {
      path: path.as_ref().display().to_string(),
      message: INVALID_PATH_MESSAGE.to_string(),
    }
  }

  pub fn signing(message: impl Into<String>) -> Self {
    EngineError::Signing { message: message.into() }
  }

  pub fn verification(message: impl Into<String>) -> Self {
    EngineError::Verification { message: message.into() }
  }
}

impl From<SignerError> for EngineError {
  fn from(e: SignerError) -> Self {
    EngineError::Signing { message: e.to_string() }
  }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn invalid_path_message_is_stable() {
    let a = EngineError::invalid_path("");
    let b = EngineError::invalid_path("/definitely/not/here.jpg");
    match (a, b) {
      (
        EngineError::InvalidPath { message: m1, .. },
        EngineError::InvalidPath { message: m2, .. },
      ) => {
        assert_eq!(m1, INVALID_PATH_MESSAGE);
        assert_eq!(m1, m2);
      }
      _ => panic!("expected InvalidPath"),
    }
  }

  #[test]
  fn signer_errors_become_signing_errors() {
    let e: EngineError = SignerError::Callback("hsm offline".into()).into();
    assert!(matches!(e, EngineError::Signing { ref message } if message.contains("hsm offline")));
  }
}
