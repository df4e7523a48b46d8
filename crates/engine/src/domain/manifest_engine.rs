// crates/engine/src/domain/manifest_engine.rs

use std::io::Write;

use super::error::EngineResult;
use super::types::{AssetSink, AssetStream, BuilderSettings, ReaderSettings};
use crate::crypto::signer::SignerCapability;

/// Boundary to the native provenance engine (c2pa today).
///
/// The engine owns container parsing, hashing, claim construction and
/// embedding. Builder and reader drive it through these calls only; every
/// call reports failure through its result.
pub trait ManifestEngine {
    /// Per-sign native builder state.
    type Context;
    /// A verified manifest store as held by the engine.
    type Store;

    fn create_context(&self, settings: &BuilderSettings, manifest_json: &str) -> EngineResult<Self::Context>;

    fn add_resource(
        &self,
        ctx: &mut Self::Context,
        identifier: &str,
        stream: &mut dyn AssetStream,
    ) -> EngineResult<()>;

    fn add_ingredient(
        &self,
        ctx: &mut Self::Context,
        ingredient_json: &str,
        format: &str,
        stream: &mut dyn AssetStream,
    ) -> EngineResult<()>;

    /// Embed the manifest into `output`. Calls `signer` exactly once.
    fn sign(
        &self,
        ctx: &mut Self::Context,
        signer: &dyn SignerCapability,
        format: &str,
        input: &mut dyn AssetStream,
        output: &mut dyn AssetSink,
    ) -> EngineResult<()>;

    /// `Ok(None)` when the asset carries no manifest.
    fn verify(
        &self,
        settings: &ReaderSettings,
        format: &str,
        input: &mut dyn AssetStream,
    ) -> EngineResult<Option<Self::Store>>;

    /// Whether `input` already carries an embedded manifest store.
    fn has_manifest(&self, format: &str, input: &mut dyn AssetStream) -> EngineResult<bool> {
        let settings = ReaderSettings {
            allow_remote_manifests: false,
            ..ReaderSettings::default()
        };
        Ok(self.verify(&settings, format, input)?.is_some())
    }

    fn store_json(&self, store: &Self::Store) -> EngineResult<String>;

    /// Copy the resource addressed by `uri` into `sink`, returning the byte count.
    fn write_resource(&self, store: &Self::Store, uri: &str, sink: &mut dyn AssetSink) -> EngineResult<u64>;
}

/// Convenience for writing a resource to any plain writer via an in-memory buffer.
pub fn write_resource_to<E: ManifestEngine>(
    engine: &E,
    store: &E::Store,
    uri: &str,
    out: &mut dyn Write,
) -> EngineResult<u64> {
    let mut buf = std::io::Cursor::new(Vec::new());
    let n = engine.write_resource(store, uri, &mut buf)?;
    out.write_all(buf.get_ref())?;
    Ok(n)
}
