// crates/engine/src/builder.rs

//! Manifest builder: holds a definition and its resource sources, and
//! embeds a signed manifest into an asset through a [`ManifestEngine`].

use std::io::Seek;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapters::content_detection::{extension_to_mime_type, format_for_path, sniff_format};
use crate::adapters::stream::{PendingOutput, StreamAdapter};
use crate::crypto::signer::SignerCapability;
use crate::domain::assertion::Assertion;
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::manifest::{ClaimGeneratorInfo, Ingredient, ManifestDefinition, Relationship, Thumbnail};
use crate::domain::manifest_engine::ManifestEngine;
use crate::domain::types::{AssetSink, AssetStream, BuilderSettings, EngineDefaults, ResourceSource};

#[cfg(feature = "c2pa")]
use crate::adapters::c2pa::C2paEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
  /// Freshly constructed from a definition.
  Created,
  /// Modified since construction or since the last `rebuild`.
  Configured,
  /// Signed; mutators and `sign` fail until `rebuild`.
  Signed,
}

/// An ingredient whose asset bytes are handed to the engine at sign time.
#[derive(Debug, Clone)]
struct SourcedIngredient {
  ingredient: Ingredient,
  source: ResourceSource,
}

/// Engine failures that already carry a precise meaning pass through;
/// everything else is reported as a signing failure with its original text.
fn as_signing_error(e: EngineError) -> EngineError {
  match e {
    EngineError::InvalidPath { .. }
    | EngineError::MalformedManifest(_)
    | EngineError::ResourceNotFound(_)
    | EngineError::Signing { .. }
    | EngineError::UnsupportedAssertionLabel { .. }
    | EngineError::AlreadySigned
    | EngineError::Config(_)
    | EngineError::Feature(_)
    | EngineError::Panic(_) => e,
    other => EngineError::signing(other.to_string()),
  }
}

fn same_file(a: &Path, b: &Path) -> bool {
  match (a.canonicalize(), b.canonicalize()) {
    (Ok(a), Ok(b)) => a == b,
    _ => false,
  }
}

/// Builds and signs one manifest at a time.
///
/// Mutators only record state; the engine sees the definition, resources and
/// sourced ingredients when `sign` runs, in that order.
pub struct ManifestBuilder<E: ManifestEngine> {
  engine: E,
  settings: BuilderSettings,
  definition: ManifestDefinition,
  signer: Arc<dyn SignerCapability>,
  resources: Vec<(String, ResourceSource)>,
  sourced_ingredients: Vec<SourcedIngredient>,
  state: BuilderState,
}

#[cfg(feature = "c2pa")]
impl ManifestBuilder<C2paEngine> {
  pub fn new(settings: BuilderSettings, definition: ManifestDefinition, signer: Arc<dyn SignerCapability>) -> Self {
    Self::with_engine(C2paEngine, settings, definition, signer)
  }

  /// Parse a manifest definition and bind it to `signer`.
  pub fn from_json(settings: BuilderSettings, json: &str, signer: Arc<dyn SignerCapability>) -> EngineResult<Self> {
    Ok(Self::new(settings, ManifestDefinition::from_json(json)?, signer))
  }
}

impl<E: ManifestEngine> ManifestBuilder<E> {
  pub fn with_engine(
    engine: E,
    settings: BuilderSettings,
    definition: ManifestDefinition,
    signer: Arc<dyn SignerCapability>,
  ) -> Self {
    Self {
      engine,
      settings,
      definition,
      signer,
      resources: Vec::new(),
      sourced_ingredients: Vec::new(),
      state: BuilderState::Created,
    }
  }

  pub fn state(&self) -> BuilderState {
    self.state
  }

  pub fn definition(&self) -> &ManifestDefinition {
    &self.definition
  }

  /// The definition as it would be handed to the engine.
  pub fn definition_json(&self) -> EngineResult<String> {
    self.materialize().and_then(|d| d.to_json())
  }

  pub fn settings(&self) -> &BuilderSettings {
    &self.settings
  }

  pub fn signer(&self) -> &Arc<dyn SignerCapability> {
    &self.signer
  }

  fn mutate(&mut self, f: impl FnOnce(&mut Self) -> EngineResult<()>) -> EngineResult<&mut Self> {
    if self.state == BuilderState::Signed {
      return Err(EngineError::AlreadySigned);
    }
    f(self)?;
    self.state = BuilderState::Configured;
    Ok(self)
  }

  pub fn set_title(&mut self, title: impl Into<String>) -> EngineResult<&mut Self> {
    let title = title.into();
    self.mutate(|b| {
      b.definition.title = Some(title);
      Ok(())
    })
  }

  pub fn set_format(&mut self, format: impl Into<String>) -> EngineResult<&mut Self> {
    let format = format.into();
    self.mutate(|b| {
      b.definition.format = format;
      Ok(())
    })
  }

  /// Set the format from a file name's extension.
  pub fn set_format_from_filename(&mut self, filename: impl AsRef<Path>) -> EngineResult<&mut Self> {
    let path = filename.as_ref();
    let format = format_for_path(path)
      .ok_or_else(|| EngineError::Config(format!("unsupported file extension: {}", path.display())))?;
    self.set_format(format)
  }

  pub fn set_vendor(&mut self, vendor: impl Into<String>) -> EngineResult<&mut Self> {
    let vendor = vendor.into();
    self.mutate(|b| {
      b.definition.vendor = Some(vendor);
      Ok(())
    })
  }

  pub fn set_label(&mut self, label: impl Into<String>) -> EngineResult<&mut Self> {
    let label = label.into();
    self.mutate(|b| {
      b.definition.label = Some(label);
      Ok(())
    })
  }

  /// Set the manifest thumbnail. Its identifier must name a registered
  /// resource or an existing file, which is then registered under that name.
  pub fn set_thumbnail(&mut self, thumbnail: Thumbnail) -> EngineResult<&mut Self> {
    self.mutate(|b| {
      if !b.has_resource(&thumbnail.identifier) {
        let path = PathBuf::from(&thumbnail.identifier);
        if !path.is_file() {
          return Err(EngineError::ResourceNotFound(thumbnail.identifier.clone()));
        }
        b.record_resource(thumbnail.identifier.clone(), ResourceSource::Path(path));
      }
      b.definition.thumbnail = Some(thumbnail);
      Ok(())
    })
  }

  pub fn add_assertion(&mut self, assertion: Assertion) -> EngineResult<&mut Self> {
    self.mutate(|b| {
      b.definition.assertions.push(assertion);
      Ok(())
    })
  }

  pub fn add_ingredient(&mut self, ingredient: Ingredient) -> EngineResult<&mut Self> {
    self.mutate(|b| {
      b.definition.ingredients.push(ingredient);
      Ok(())
    })
  }

  /// Add an ingredient whose asset is read from `path` when signing, so the
  /// engine can pick up its manifest and hash it.
  pub fn add_ingredient_from_file(&mut self, mut ingredient: Ingredient, path: impl AsRef<Path>) -> EngineResult<&mut Self> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() || !path.is_file() {
      return Err(EngineError::invalid_path(path));
    }
    if ingredient.format.is_none() {
      ingredient.format = format_for_path(path).map(str::to_string);
    }
    if ingredient.title.is_none() {
      ingredient.title = path.file_name().map(|n| n.to_string_lossy().into_owned());
    }
    self.add_ingredient_from_source(ingredient, ResourceSource::Path(path.to_path_buf()))
  }

  pub fn add_ingredient_from_source(&mut self, ingredient: Ingredient, source: ResourceSource) -> EngineResult<&mut Self> {
    self.mutate(|b| {
      if !source.is_available() {
        let name = ingredient.title.clone().unwrap_or_else(|| "ingredient".into());
        return Err(EngineError::ResourceNotFound(name));
      }
      b.sourced_ingredients.push(SourcedIngredient { ingredient, source });
      Ok(())
    })
  }

  pub fn add_claim_generator_info(&mut self, info: ClaimGeneratorInfo) -> EngineResult<&mut Self> {
    self.mutate(|b| {
      b.definition.claim_generator_info.push(info);
      Ok(())
    })
  }

  /// Register the bytes behind a resource identifier. Nothing is read until `sign`.
  pub fn add_resource(&mut self, identifier: impl Into<String>, source: impl Into<ResourceSource>) -> EngineResult<&mut Self> {
    let identifier = identifier.into();
    let source = source.into();
    self.mutate(|b| {
      if !source.is_available() {
        return Err(EngineError::ResourceNotFound(identifier));
      }
      b.record_resource(identifier, source);
      Ok(())
    })
  }

  /// Replace the whole definition. Registered resources are kept.
  pub fn set_definition(&mut self, definition: ManifestDefinition) -> EngineResult<&mut Self> {
    self.mutate(|b| {
      b.definition = definition;
      Ok(())
    })
  }

  fn has_resource(&self, identifier: &str) -> bool {
    self.resources.iter().any(|(id, _)| id == identifier)
  }

  fn record_resource(&mut self, identifier: String, source: ResourceSource) {
    match self.resources.iter_mut().find(|(id, _)| *id == identifier) {
      Some(slot) => slot.1 = source,
      None => self.resources.push((identifier, source)),
    }
  }

  /// The definition handed to the engine: default claim generator filled in,
  /// read-only validation results dropped.
  fn materialize(&self) -> EngineResult<ManifestDefinition> {
    let mut definition = self.definition.clone();
    if definition.claim_generator_info.is_empty() {
      definition
        .claim_generator_info
        .push(ClaimGeneratorInfo::new(self.settings.claim_generator.clone(), None));
    }
    for ingredient in &mut definition.ingredients {
      ingredient.validation_status = None;
    }
    definition.validate()?;

    let referenced = definition
      .referenced_resources()
      .into_iter()
      .chain(self.sourced_ingredients.iter().flat_map(|s| s.ingredient.resource_identifiers()));
    for identifier in referenced {
      if !self.has_resource(identifier) {
        return Err(EngineError::ResourceNotFound(identifier.to_string()));
      }
    }
    Ok(definition)
  }

  /// Sign `input` and write the result to `output`. The output appears only
  /// when signing succeeds; on failure nothing is left at `output`.
  pub fn sign(&mut self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> EngineResult<()> {
    if self.state == BuilderState::Signed {
      return Err(EngineError::AlreadySigned);
    }
    let (input, output) = (input.as_ref(), output.as_ref());
    let mut source = StreamAdapter::open_input(input)?;
    if same_file(input, output) {
      return Err(EngineError::invalid_path(output));
    }
    let mut pending = PendingOutput::create(output)?;

    let format = self.definition.format.clone();
    let parent_title = input
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "parent".into());
    self.run_sign(&format, &parent_title, &mut source, &mut pending)?;

    let written = pending.commit()?;
    self.state = BuilderState::Signed;
    tracing::info!(input = %input.display(), output = %written.display(), "asset signed");
    Ok(())
  }

  /// Sign from one stream into another. `format` defaults to the definition's.
  pub fn sign_stream(
    &mut self,
    format: Option<&str>,
    input: &mut dyn AssetStream,
    output: &mut dyn AssetSink,
  ) -> EngineResult<()> {
    if self.state == BuilderState::Signed {
      return Err(EngineError::AlreadySigned);
    }
    let format = format.unwrap_or(&self.definition.format).to_string();
    let parent_title = self.definition.title.clone().unwrap_or_else(|| "parent".into());
    self.run_sign(&format, &parent_title, input, output)?;
    self.state = BuilderState::Signed;
    tracing::info!(format, "stream signed");
    Ok(())
  }

  fn has_parent(&self, definition: &ManifestDefinition) -> bool {
    definition
      .ingredients
      .iter()
      .chain(self.sourced_ingredients.iter().map(|s| &s.ingredient))
      .any(|i| i.relationship == Relationship::ParentOf)
  }

  /// When the input is already signed and no parent was declared, the input
  /// becomes the parent ingredient so its manifests stay in the store.
  fn attach_signed_input(
    &self,
    ctx: &mut E::Context,
    format: &str,
    title: &str,
    input: &mut dyn AssetStream,
  ) -> EngineResult<()> {
    let signed = match self.engine.has_manifest(format, input) {
      Ok(signed) => signed,
      Err(e) => {
        tracing::warn!(error = %e, "could not inspect input for an existing manifest");
        false
      }
    };
    input.rewind()?;
    if !signed {
      return Ok(());
    }

    let parent = serde_json::to_string(&Ingredient::parent(title, format))?;
    self
      .engine
      .add_ingredient(ctx, &parent, format, input)
      .map_err(as_signing_error)?;
    input.rewind()?;
    tracing::debug!(title, "signed input attached as parent ingredient");
    Ok(())
  }

  fn run_sign(
    &self,
    format: &str,
    parent_title: &str,
    input: &mut dyn AssetStream,
    output: &mut dyn AssetSink,
  ) -> EngineResult<()> {
    let definition = self.materialize()?;
    let json = definition.to_json()?;

    let mut ctx = self
      .engine
      .create_context(&self.settings, &json)
      .map_err(as_signing_error)?;

    for (identifier, source) in &self.resources {
      let mut stream = source
        .open()
        .map_err(|_| EngineError::ResourceNotFound(identifier.clone()))?;
      self
        .engine
        .add_resource(&mut ctx, identifier, stream.as_mut())
        .map_err(as_signing_error)?;
    }

    for sourced in &self.sourced_ingredients {
      let name = sourced.ingredient.title.clone().unwrap_or_else(|| "ingredient".into());
      let mut stream = sourced.source.open().map_err(|_| EngineError::ResourceNotFound(name))?;
      let ingredient_format = match &sourced.ingredient.format {
        Some(f) => extension_to_mime_type(f).unwrap_or(f.as_str()).to_string(),
        None => sniff_format(stream.as_mut())?.unwrap_or(EngineDefaults::FORMAT).to_string(),
      };
      let ingredient_json = serde_json::to_string(&sourced.ingredient)?;
      self
        .engine
        .add_ingredient(&mut ctx, &ingredient_json, &ingredient_format, stream.as_mut())
        .map_err(as_signing_error)?;
    }

    if !self.has_parent(&definition) {
      self.attach_signed_input(&mut ctx, format, parent_title, input)?;
    }

    self
      .engine
      .sign(&mut ctx, self.signer.as_ref(), format, input, output)
      .map_err(as_signing_error)
  }

  /// Return a signed builder to the configured state with a fresh instance
  /// id, ready to produce the next manifest version.
  pub fn rebuild(&mut self) -> &mut Self {
    self.definition.refresh_instance_id();
    self.state = BuilderState::Configured;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::crypto::callback::CallbackSigner;
  use crate::crypto::signer::{SignerConfig, SignerError};
  use crate::domain::assertion::{AuthorInfo, CreativeWorkData};
  use crate::domain::manifest::{Relationship, ResourceRef, ValidationStatus};
  use crate::domain::types::{ReaderSettings, SigAlg};
  use std::io::{Read, Write};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  /// Records every engine call; "signing" appends a marker to the input bytes.
  #[derive(Default)]
  struct RecordingEngine {
    calls: Mutex<Vec<String>>,
  }

  impl RecordingEngine {
    fn calls(&self) -> Vec<String> {
      self.calls.lock().unwrap().clone()
    }
  }

  impl ManifestEngine for RecordingEngine {
    type Context = String;
    type Store = ();

    fn create_context(&self, _settings: &BuilderSettings, manifest_json: &str) -> EngineResult<String> {
      self.calls.lock().unwrap().push("context".into());
      Ok(manifest_json.to_string())
    }

    fn add_resource(&self, _ctx: &mut String, identifier: &str, stream: &mut dyn AssetStream) -> EngineResult<()> {
      let mut buf = Vec::new();
      stream.read_to_end(&mut buf)?;
      self.calls.lock().unwrap().push(format!("resource:{identifier}:{}", buf.len()));
      Ok(())
    }

    fn add_ingredient(
      &self,
      _ctx: &mut String,
      ingredient_json: &str,
      format: &str,
      _stream: &mut dyn AssetStream,
    ) -> EngineResult<()> {
      let v: serde_json::Value = serde_json::from_str(ingredient_json)?;
      self.calls.lock().unwrap().push(format!("ingredient:{}:{format}", v["title"].as_str().unwrap_or("")));
      Ok(())
    }

    fn sign(
      &self,
      ctx: &mut String,
      signer: &dyn SignerCapability,
      _format: &str,
      input: &mut dyn AssetStream,
      output: &mut dyn AssetSink,
    ) -> EngineResult<()> {
      let signature = signer.sign(ctx.as_bytes())?;
      let mut bytes = Vec::new();
      input.read_to_end(&mut bytes)?;
      output.write_all(&bytes)?;
      output.write_all(&signature)?;
      self.calls.lock().unwrap().push("sign".into());
      Ok(())
    }

    // anything this engine signed carries a store
    fn verify(&self, _: &ReaderSettings, _: &str, input: &mut dyn AssetStream) -> EngineResult<Option<()>> {
      let mut bytes = Vec::new();
      input.read_to_end(&mut bytes)?;
      Ok(bytes.ends_with(b"|SIG").then_some(()))
    }

    fn store_json(&self, _: &()) -> EngineResult<String> {
      Ok("{}".into())
    }

    fn write_resource(&self, _: &(), uri: &str, _: &mut dyn AssetSink) -> EngineResult<u64> {
      Err(EngineError::ResourceNotFound(uri.into()))
    }
  }

  fn counting_signer(count: Arc<AtomicUsize>) -> Arc<dyn SignerCapability> {
    Arc::new(CallbackSigner::new(SignerConfig::new(SigAlg::Es256, "pem"), move |_| {
      count.fetch_add(1, Ordering::SeqCst);
      Ok(b"|SIG".to_vec())
    }))
  }

  fn builder(count: Arc<AtomicUsize>) -> ManifestBuilder<RecordingEngine> {
    let mut def = ManifestDefinition::new("image/jpeg");
    def.title = Some("T".into());
    ManifestBuilder::with_engine(RecordingEngine::default(), BuilderSettings::new("tester"), def, counting_signer(count))
  }

  fn asset(dir: &Path) -> PathBuf {
    let p = dir.join("in.jpg");
    std::fs::write(&p, b"JPEGDATA").unwrap();
    p
  }

  #[test]
  fn state_machine_and_single_signer_call() {
    let dir = tempfile::tempdir().unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let mut b = builder(count.clone());
    assert_eq!(b.state(), BuilderState::Created);

    b.set_title("Photo").unwrap();
    assert_eq!(b.state(), BuilderState::Configured);

    let out = dir.path().join("out.jpg");
    b.sign(asset(dir.path()), &out).unwrap();
    assert_eq!(b.state(), BuilderState::Signed);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read(&out).unwrap(), b"JPEGDATA|SIG");

    assert!(matches!(b.set_title("again"), Err(EngineError::AlreadySigned)));
    assert!(matches!(b.sign(asset(dir.path()), dir.path().join("o2.jpg")), Err(EngineError::AlreadySigned)));

    let before = b.definition().instance_id.clone();
    b.rebuild();
    assert_eq!(b.state(), BuilderState::Configured);
    assert_ne!(b.definition().instance_id, before);
    b.sign(asset(dir.path()), dir.path().join("o2.jpg")).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn failing_signer_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let signer: Arc<dyn SignerCapability> = Arc::new(CallbackSigner::new(
      SignerConfig::new(SigAlg::Es256, "pem"),
      |_| Err(SignerError::Callback("user cancelled".into())),
    ));
    let mut b = ManifestBuilder::with_engine(
      RecordingEngine::default(),
      BuilderSettings::default(),
      ManifestDefinition::new("image/jpeg"),
      signer,
    );
    let out = dir.path().join("out.jpg");
    let input = asset(dir.path());

    match b.sign(&input, &out) {
      Err(EngineError::Signing { message }) => assert!(message.contains("user cancelled")),
      other => panic!("unexpected {other:?}"),
    }
    assert!(!out.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    assert_ne!(b.state(), BuilderState::Signed);
  }

  #[test]
  fn invalid_paths_are_rejected_before_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let mut b = builder(Arc::new(AtomicUsize::new(0)));
    let input = asset(dir.path());

    for (i, o) in [
      (PathBuf::new(), dir.path().join("o.jpg")),
      (dir.path().join("missing.jpg"), dir.path().join("o.jpg")),
      (input.clone(), PathBuf::new()),
      (input.clone(), dir.path().join("nodir/o.jpg")),
      (input.clone(), input.clone()),
    ] {
      match b.sign(&i, &o) {
        Err(EngineError::InvalidPath { message, .. }) => assert_eq!(message, "Invalid file path provided."),
        other => panic!("unexpected {other:?} for {i:?} -> {o:?}"),
      }
    }
    assert!(b.engine.calls().is_empty());
    assert_eq!(std::fs::read(&input).unwrap(), b"JPEGDATA");
  }

  #[test]
  fn resources_are_flushed_at_sign_and_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let mut b = builder(Arc::new(AtomicUsize::new(0)));

    assert!(matches!(
      b.set_thumbnail(ResourceRef::new("image/jpeg", "thumb.jpg")),
      Err(EngineError::ResourceNotFound(id)) if id == "thumb.jpg"
    ));
    assert!(matches!(
      b.add_resource("x", dir.path().join("missing.png")),
      Err(EngineError::ResourceNotFound(_))
    ));

    b.add_resource("thumb.jpg", vec![1u8, 2, 3]).unwrap();
    b.set_thumbnail(ResourceRef::new("image/jpeg", "thumb.jpg")).unwrap();
    assert!(b.engine.calls().is_empty());

    b.sign(asset(dir.path()), dir.path().join("o.jpg")).unwrap();
    assert_eq!(b.engine.calls(), vec!["context", "resource:thumb.jpg:3", "sign"]);
  }

  #[test]
  fn unresolved_ingredient_resource_fails_sign() {
    let dir = tempfile::tempdir().unwrap();
    let mut b = builder(Arc::new(AtomicUsize::new(0)));
    let mut ingredient = Ingredient::parent("parent", "image/jpeg");
    ingredient.thumbnail = Some(ResourceRef::new("image/jpeg", "parent-thumb"));
    b.add_ingredient(ingredient).unwrap();

    let out = dir.path().join("o.jpg");
    assert!(matches!(b.sign(asset(dir.path()), &out), Err(EngineError::ResourceNotFound(id)) if id == "parent-thumb"));
    assert!(!out.exists());
  }

  #[test]
  fn sourced_ingredients_follow_resources() {
    let dir = tempfile::tempdir().unwrap();
    let mut b = builder(Arc::new(AtomicUsize::new(0)));
    let parent = dir.path().join("parent.png");
    std::fs::write(&parent, b"\x89PNG\r\n\x1a\n").unwrap();

    b.add_ingredient_from_file(Ingredient::default(), &parent).unwrap();
    b.add_ingredient_from_source(
      Ingredient::new("clip", "mp4", Relationship::ComponentOf),
      ResourceSource::Bytes(vec![0; 4]),
    )
    .unwrap();
    assert!(matches!(
      b.add_ingredient_from_file(Ingredient::default(), dir.path().join("gone.png")),
      Err(EngineError::InvalidPath { .. })
    ));

    b.sign(asset(dir.path()), dir.path().join("o.jpg")).unwrap();
    assert_eq!(
      b.engine.calls(),
      vec!["context", "ingredient:parent.png:image/png", "ingredient:clip:video/mp4", "sign"]
    );
  }

  #[test]
  fn materialized_definition_fills_generator_and_drops_statuses() {
    let mut b = builder(Arc::new(AtomicUsize::new(0)));
    let mut ingredient = Ingredient::parent("p", "image/jpeg");
    ingredient.validation_status = Some(vec![ValidationStatus {
      code: "claimSignature.validated".into(),
      url: None,
      explanation: None,
    }]);
    b.add_ingredient(ingredient).unwrap();
    b.add_assertion(Assertion::creative_work(CreativeWorkData::new(vec![AuthorInfo::person("Ada")])))
      .unwrap();

    let json: serde_json::Value = serde_json::from_str(&b.definition_json().unwrap()).unwrap();
    assert_eq!(json["claim_generator_info"][0]["name"], "tester");
    assert!(json["ingredients"][0].get("validation_status").is_none());
    assert_eq!(json["assertions"][0]["label"], "stds.schema-org.CreativeWork");
    assert!(b.definition().claim_generator_info.is_empty());
  }

  #[test]
  fn format_from_filename_and_validation() {
    let dir = tempfile::tempdir().unwrap();
    let mut b = builder(Arc::new(AtomicUsize::new(0)));
    b.set_format_from_filename("photo.PNG").unwrap();
    assert_eq!(b.definition().format, "image/png");
    assert!(matches!(b.set_format_from_filename("notes.txt"), Err(EngineError::Config(_))));

    b.set_format("").unwrap();
    assert!(matches!(
      b.sign(asset(dir.path()), dir.path().join("o.jpg")),
      Err(EngineError::MalformedManifest(_))
    ));
  }

  #[test]
  fn sign_stream_uses_definition_format() {
    let mut b = builder(Arc::new(AtomicUsize::new(0)));
    let mut input = std::io::Cursor::new(b"RAW".to_vec());
    let mut output = std::io::Cursor::new(Vec::new());
    b.sign_stream(None, &mut input, &mut output).unwrap();
    assert_eq!(output.into_inner(), b"RAW|SIG");
    assert_eq!(b.state(), BuilderState::Signed);
  }

  #[test]
  fn signed_input_becomes_the_parent() {
    let dir = tempfile::tempdir().unwrap();
    let mut b = builder(Arc::new(AtomicUsize::new(0)));
    let first = dir.path().join("first.jpg");
    b.sign(asset(dir.path()), &first).unwrap();
    assert_eq!(b.engine.calls(), vec!["context", "sign"]);

    let mut next = builder(Arc::new(AtomicUsize::new(0)));
    let second = dir.path().join("second.jpg");
    next.sign(&first, &second).unwrap();
    assert_eq!(next.engine.calls(), vec!["context", "ingredient:first.jpg:image/jpeg", "sign"]);
    // the input was rewound before signing
    assert_eq!(std::fs::read(&second).unwrap(), b"JPEGDATA|SIG|SIG");
  }

  #[test]
  fn declared_parent_is_not_doubled() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.jpg");
    builder(Arc::new(AtomicUsize::new(0))).sign(asset(dir.path()), &first).unwrap();

    let mut b = builder(Arc::new(AtomicUsize::new(0)));
    b.add_ingredient_from_file(Ingredient::parent("declared", "image/jpeg"), &first).unwrap();
    b.sign(&first, dir.path().join("second.jpg")).unwrap();
    assert_eq!(b.engine.calls(), vec!["context", "ingredient:declared:image/jpeg", "sign"]);

    let mut streamed = builder(Arc::new(AtomicUsize::new(0)));
    let mut input = std::io::Cursor::new(std::fs::read(&first).unwrap());
    streamed.sign_stream(None, &mut input, &mut std::io::Cursor::new(Vec::new())).unwrap();
    assert_eq!(streamed.engine.calls(), vec!["context", "ingredient:T:image/jpeg", "sign"]);
  }
}
