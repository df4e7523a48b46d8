// crates/engine/src/reader.rs

//! Reads and verifies the manifest store embedded in an asset.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::adapters::content_detection::{format_for_path, sniff_format};
use crate::adapters::stream::{PendingOutput, StreamAdapter};
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::manifest::ManifestStore;
use crate::domain::manifest_engine::{write_resource_to, ManifestEngine};
use crate::domain::types::{AssetStream, EngineDefaults, ReaderSettings};

#[cfg(feature = "c2pa")]
use crate::adapters::c2pa::C2paEngine;

/// Engine failures other than path and lookup errors surface as verification failures.
fn as_verification_error(e: EngineError) -> EngineError {
  match e {
    EngineError::InvalidPath { .. }
    | EngineError::ResourceNotFound(_)
    | EngineError::Verification { .. }
    | EngineError::Config(_)
    | EngineError::Feature(_)
    | EngineError::Panic(_) => e,
    other => EngineError::verification(other.to_string()),
  }
}

/// The engine's store alongside its parsed form, kept for resource lookups.
struct LastRead<S> {
  native: S,
  json: String,
  store: ManifestStore,
}

pub struct ManifestStoreReader<E: ManifestEngine> {
  engine: E,
  settings: ReaderSettings,
  last: Option<LastRead<E::Store>>,
}

#[cfg(feature = "c2pa")]
impl ManifestStoreReader<C2paEngine> {
  pub fn new(settings: ReaderSettings) -> Self {
    Self::with_engine(C2paEngine, settings)
  }
}

impl<E: ManifestEngine> ManifestStoreReader<E> {
  pub fn with_engine(engine: E, settings: ReaderSettings) -> Self {
    Self { engine, settings, last: None }
  }

  pub fn settings(&self) -> &ReaderSettings {
    &self.settings
  }

  /// Store from the most recent read; cleared by any read that fails or
  /// finds no manifest.
  pub fn last_store(&self) -> Option<&ManifestStore> {
    self.last.as_ref().map(|l| &l.store)
  }

  /// Read the manifest store of the file at `path`. `Ok(None)` when the
  /// asset carries no manifest.
  pub fn read_from_file(&mut self, path: impl AsRef<Path>) -> EngineResult<Option<ManifestStore>> {
    self.read_file(path.as_ref())?;
    Ok(self.last_store().cloned())
  }

  /// Same as [`read_from_file`](Self::read_from_file), returning the engine's JSON verbatim.
  pub fn read_json_from_file(&mut self, path: impl AsRef<Path>) -> EngineResult<Option<String>> {
    self.read_file(path.as_ref())?;
    Ok(self.last.as_ref().map(|l| l.json.clone()))
  }

  pub fn read_from_stream(&mut self, format: &str, stream: &mut dyn AssetStream) -> EngineResult<Option<ManifestStore>> {
    self.read(format, stream)?;
    Ok(self.last_store().cloned())
  }

  /// Stream counterpart of [`read_json_from_file`](Self::read_json_from_file).
  pub fn read_json_from_stream(&mut self, format: &str, stream: &mut dyn AssetStream) -> EngineResult<Option<String>> {
    self.read(format, stream)?;
    Ok(self.last.as_ref().map(|l| l.json.clone()))
  }

  fn read_file(&mut self, path: &Path) -> EngineResult<()> {
    self.last = None;
    let mut stream = StreamAdapter::open_input(path)?;
    let format = match format_for_path(path) {
      Some(f) => f,
      None => sniff_format(&mut stream)?.unwrap_or(EngineDefaults::FORMAT),
    };
    self.read(format, &mut stream)?;
    if let Some(last) = &self.last {
      tracing::info!(
        path = %path.display(),
        manifests = last.store.manifests().len(),
        active = last.store.active_manifest().unwrap_or(""),
        "manifest store read"
      );
    }
    Ok(())
  }

  fn read(&mut self, format: &str, stream: &mut dyn AssetStream) -> EngineResult<()> {
    self.last = None;
    let Some(native) = self
      .engine
      .verify(&self.settings, format, stream)
      .map_err(as_verification_error)?
    else {
      tracing::debug!(format, "no manifest present");
      return Ok(());
    };
    let json = self.engine.store_json(&native).map_err(as_verification_error)?;
    let store = ManifestStore::from_json(&json)?;
    self.last = Some(LastRead { native, json, store });
    Ok(())
  }

  /// Bytes of resource `identifier` in manifest `manifest_label` of the last read store.
  pub fn resource(&self, manifest_label: &str, identifier: &str) -> EngineResult<Vec<u8>> {
    let mut out = Vec::new();
    self.copy_resource(manifest_label, identifier, &mut out)?;
    Ok(out)
  }

  /// Write a resource to `path`, all or nothing. Returns the byte count.
  pub fn resource_to_file(&self, manifest_label: &str, identifier: &str, path: impl AsRef<Path>) -> EngineResult<u64> {
    let bytes = self.resource(manifest_label, identifier)?;
    let mut pending = PendingOutput::create(path.as_ref())?;
    pending.write_all(&bytes)?;
    let written: PathBuf = pending.commit()?;
    tracing::debug!(identifier, path = %written.display(), bytes = bytes.len(), "resource extracted");
    Ok(bytes.len() as u64)
  }

  fn copy_resource(&self, manifest_label: &str, identifier: &str, out: &mut dyn Write) -> EngineResult<u64> {
    let last = self
      .last
      .as_ref()
      .ok_or_else(|| EngineError::ResourceNotFound(identifier.to_string()))?;
    if last.store.get(manifest_label).is_none() {
      return Err(EngineError::ResourceNotFound(format!("{manifest_label}: no such manifest")));
    }
    let uri = resource_uri(manifest_label, identifier);
    write_resource_to(&self.engine, &last.native, &uri, out)
  }
}

/// Identifiers in a manifest are either full JUMBF URIs or assertion-relative names.
fn resource_uri(manifest_label: &str, identifier: &str) -> String {
  if identifier.contains("jumbf=") {
    identifier.to_string()
  } else {
    format!("self#jumbf=/c2pa/{manifest_label}/c2pa.assertions/{identifier}")
  }
}
