use std::time::Duration;

use super::trust::TrustPolicyConfig;

/// Centralized defaults for the engine.
/// All opinionated defaults should be defined here for consistency.
pub struct EngineDefaults;

impl EngineDefaults {
    // Manifest defaults
    pub const FORMAT: &'static str = "application/octet-stream";
    pub const INSTANCE_ID_PREFIX: &'static str = "xmp:iid:";
    pub const CLAIM_GENERATOR: &'static str = concat!("credsign/", env!("CARGO_PKG_VERSION"));

    // Security defaults
    pub const ALLOW_INSECURE_HTTP: bool = false; // Secure default: HTTPS only
    pub const ALLOW_REMOTE_MANIFESTS: bool = false; // Secure default: no network fetches
    pub const VERIFY_AFTER_SIGN: bool = false; // Matches the c2pa default

    // Signer defaults
    /// Padding added to the certificate chain size when a signer does not
    /// declare its maximum signature length.
    pub const SIGNATURE_RESERVE_PADDING: usize = 20_000;
    pub const DIGICERT_TSA_URL: &'static str = "http://timestamp.digicert.com";

    // Remote signing defaults
    pub const POLL_INTERVAL: Duration = Duration::from_millis(300);
    pub const MAX_POLL_ATTEMPTS: u32 = 200;
}

/// Settings bound to a builder. Applied to the engine each time a native
/// context is created, i.e. once per `sign`.
#[derive(Debug, Clone)]
pub struct BuilderSettings {
    /// Used as the claim generator when the definition names none.
    pub claim_generator: String,
    /// Raw c2pa settings JSON, applied after the generated fragments.
    pub trust_settings: Option<String>,
    pub trust_policy: Option<TrustPolicyConfig>,
    pub verify_after_sign: bool,
    /// Opt-in: allow a plain-HTTP timestamp authority URL
    pub allow_insecure_http: bool,
}

impl BuilderSettings {
    pub fn new(claim_generator: impl Into<String>) -> Self {
        Self {
            claim_generator: claim_generator.into(),
            ..Self::default()
        }
    }

    pub fn with_trust_settings(mut self, json: impl Into<String>) -> Self {
        self.trust_settings = Some(json.into());
        self
    }
}

impl Default for BuilderSettings {
    fn default() -> Self {
        Self {
            claim_generator: EngineDefaults::CLAIM_GENERATOR.to_string(),
            trust_settings: None,
            trust_policy: None,
            verify_after_sign: EngineDefaults::VERIFY_AFTER_SIGN,
            allow_insecure_http: EngineDefaults::ALLOW_INSECURE_HTTP,
        }
    }
}

/// Settings used when reading a manifest store.
#[derive(Debug, Clone)]
pub struct ReaderSettings {
    pub trust_policy: Option<TrustPolicyConfig>,
    pub allow_remote_manifests: bool,
    /// Raw c2pa settings JSON, applied after the generated fragments.
    pub trust_settings: Option<String>,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            trust_policy: None,
            allow_remote_manifests: EngineDefaults::ALLOW_REMOTE_MANIFESTS,
            trust_settings: None,
        }
    }
}
