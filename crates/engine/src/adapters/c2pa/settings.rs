use std::any::Any;
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::domain::error::{EngineError, EngineResult};
use crate::domain::types::{BuilderSettings, ReaderSettings, TrustPolicyConfig};

#[cfg(feature = "c2pa")]
use c2pa::settings::Settings;

/// c2pa settings are process-global; every apply + engine call runs under this lock.
static C2PA_SETTINGS_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

thread_local! {
  static HOLDS_SETTINGS_LOCK: Cell<bool> = const { Cell::new(false) };
}

/// Restored after each call so knobs from one call never leak into the next.
const BASE_SETTINGS: &str = r#"{"verify":{"verify_after_sign":false,"verify_trust":false}}"#;

pub fn apply_settings(fragments: &[Value]) -> EngineResult<()> {
  #[cfg(not(feature = "c2pa"))]
  {
    let _ = fragments;
    Err(EngineError::Feature("c2pa"))
  }
  #[cfg(feature = "c2pa")]
  {
    let _ = Settings::from_string(BASE_SETTINGS, "json")?;
    for s in fragments {
      tracing::debug!(fragment = %s, "applying c2pa settings");
      let _ = Settings::from_string(&s.to_string(), "json")?;
    }
    Ok(())
  }
}

/// Text carried by a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic payload".to_string()
  }
}

/// Apply `fragments`, run `f`, then restore the baseline. Panics inside `f`
/// are caught and reported as [`EngineError::Panic`] with their message.
///
/// The lock is not reentrant: a call made from inside `f` on the same
/// thread (e.g. a signer callback driving another sign) fails with
/// [`EngineError::Config`] instead of deadlocking.
pub fn with_c2pa_settings<F, T>(fragments: &[Value], f: F) -> EngineResult<T>
where
  F: FnOnce() -> EngineResult<T>,
{
  if HOLDS_SETTINGS_LOCK.with(Cell::get) {
    return Err(EngineError::Config(
      "engine re-entered from inside an engine call (e.g. from a signer callback)".into(),
    ));
  }

  let _guard = C2PA_SETTINGS_LOCK
    .lock()
    .map_err(|_| EngineError::Panic("settings mutex poisoned".into()))?;
  HOLDS_SETTINGS_LOCK.with(|h| h.set(true));

  let result = apply_settings(fragments).and_then(|()| {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| Err(EngineError::Panic(panic_message(payload.as_ref()))))
  });

  #[cfg(feature = "c2pa")]
  let _ = Settings::from_string(BASE_SETTINGS, "json");
  HOLDS_SETTINGS_LOCK.with(|h| h.set(false));

  result
}

/// Extra fragment for a sign whose signer asked for OCSP checking.
pub fn ocsp_fragment(use_ocsp: bool) -> Option<Value> {
  use_ocsp.then(|| json!({ "verify": { "ocsp_fetch": true } }))
}

/// Translate a trust policy into settings fragments. The flag tells whether
/// trust verification should be switched on.
pub fn build_trust_settings(policy: &TrustPolicyConfig) -> EngineResult<(Vec<Value>, bool)> {
  let mut settings = Vec::new();
  let mut enable_trust = false;

  if let Some(anchors) = &policy.anchors {
    let pem = std::str::from_utf8(anchors)
      .map_err(|_| EngineError::Config("trust anchors must be valid UTF-8".into()))?;
    settings.push(json!({ "trust": { "trust_anchors": pem } }));
    enable_trust = true;
  }

  if let Some(allowed) = &policy.allowed_list {
    let pem = std::str::from_utf8(allowed)
      .map_err(|_| EngineError::Config("allowed list must be valid UTF-8".into()))?;
    settings.push(json!({ "trust": { "allowed_list": pem } }));
    enable_trust = true;
  }

  // Extra EKUs go through the trust config, one OID per line
  if let Some(ekus) = &policy.allowed_ekus {
    settings.push(json!({ "trust": { "trust_config": ekus.join("\n") } }));
  }

  Ok((settings, enable_trust))
}

fn raw_fragment(raw: &Option<String>) -> EngineResult<Option<Value>> {
  raw
    .as_deref()
    .map(|s| {
      serde_json::from_str::<Value>(s)
        .map_err(|e| EngineError::Config(format!("trust settings are not valid JSON: {e}")))
    })
    .transpose()
}

pub fn builder_fragments(settings: &BuilderSettings) -> EngineResult<Vec<Value>> {
  let mut fragments = vec![json!({
    "verify": { "verify_after_sign": settings.verify_after_sign }
  })];

  if let Some(policy) = &settings.trust_policy {
    let (trust, enable_trust) = build_trust_settings(policy)?;
    fragments.extend(trust);
    fragments.push(json!({ "verify": { "verify_trust": enable_trust } }));
  }

  fragments.extend(raw_fragment(&settings.trust_settings)?);
  Ok(fragments)
}

pub fn reader_fragments(settings: &ReaderSettings) -> EngineResult<Vec<Value>> {
  let mut fragments = vec![json!({
    "verify": { "remote_manifest_fetch": settings.allow_remote_manifests }
  })];

  if let Some(policy) = &settings.trust_policy {
    let (trust, enable_trust) = build_trust_settings(policy)?;
    fragments.extend(trust);
    fragments.push(json!({ "verify": { "verify_trust": enable_trust } }));
  }

  fragments.extend(raw_fragment(&settings.trust_settings)?);
  Ok(fragments)
}
