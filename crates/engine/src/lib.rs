// crates/engine/src/lib.rs

//! Public facade for the credsign engine.
//! Typed C2PA manifest definitions, a builder that signs them into assets
//! through a caller-supplied signer, and a reader for embedded manifest stores.

pub mod adapters;
pub mod builder;
pub mod crypto;
pub mod domain;
pub mod reader;

// Re-exports for convenience
pub use builder::{BuilderState, ManifestBuilder};
pub use crypto::callback::CallbackSigner;
pub use crypto::signer::{SignerCapability, SignerConfig, SignerError, SignerSource, TimestampProvider};
pub use crypto::timestamper::Timestamper;
pub use domain::assertion::{
  Action, ActionsData, Assertion, AssertionData, AssertionKind, AuthorInfo, CreativeWorkData, CustomData,
  DecodeMode, ThumbnailData,
};
pub use domain::error::{EngineError, EngineResult};
pub use domain::manifest::{
  generate_instance_id, ClaimGeneratorInfo, HashedUri, Ingredient, Manifest, ManifestDefinition, ManifestStore,
  Relationship, ResourceRef, Thumbnail, ValidationStatus,
};
pub use domain::manifest_engine::ManifestEngine;
pub use domain::registry::{resolve as resolve_assertion_type, AssertionType};
pub use domain::types::{BuilderSettings, EngineDefaults, ReaderSettings, ResourceSource, SigAlg, TrustPolicyConfig};
pub use reader::ManifestStoreReader;

#[cfg(feature = "c2pa")]
pub use adapters::c2pa::C2paEngine;
#[cfg(feature = "openssl")]
pub use crypto::local::LocalSigner;

/// Engine version string, including the c2pa SDK version when linked.
pub fn version() -> String {
  #[cfg(feature = "c2pa")]
  {
    format!("credsign/{} c2pa-rs/{}", env!("CARGO_PKG_VERSION"), c2pa::VERSION)
  }
  #[cfg(not(feature = "c2pa"))]
  {
    format!("credsign/{}", env!("CARGO_PKG_VERSION"))
  }
}

/// File extensions the engine can sign and read.
pub fn supported_extensions() -> Vec<String> {
  adapters::content_detection::supported_extensions()
}
