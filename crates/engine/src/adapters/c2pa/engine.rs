use c2pa::{Builder, Reader};
use serde_json::Value;

use crate::crypto::signer::SignerCapability;
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::manifest_engine::ManifestEngine;
use crate::domain::types::{AssetSink, AssetStream, BuilderSettings, ReaderSettings};

use super::settings::{builder_fragments, ocsp_fragment, reader_fragments, with_c2pa_settings};
use super::signer_bridge::{SignerBridge, TimestampingBridge};

/// [`ManifestEngine`] backed by the c2pa SDK.
#[derive(Debug, Default, Clone, Copy)]
pub struct C2paEngine;

/// One native builder plus the settings it must be driven under.
pub struct C2paContext {
  builder: Builder,
  fragments: Vec<Value>,
  allow_insecure_http: bool,
}

impl std::fmt::Debug for C2paContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("C2paContext")
      .field("fragments", &self.fragments.len())
      .field("allow_insecure_http", &self.allow_insecure_http)
      .finish_non_exhaustive()
  }
}

/// Errors c2pa raises when an asset simply carries no manifest.
fn is_missing_manifest(e: &c2pa::Error) -> bool {
  matches!(e, c2pa::Error::JumbfNotFound | c2pa::Error::ProvenanceMissing)
}

/// Split engine JSON into the definition c2pa parses directly and the
/// assertions that must be added one by one with their serialization kind.
fn split_assertions(manifest_json: &str) -> EngineResult<(String, Vec<(String, Value, bool)>)> {
  let mut manifest: Value = serde_json::from_str(manifest_json)
    .map_err(|e| EngineError::MalformedManifest(e.to_string()))?;

  let assertions = match manifest.as_object_mut().and_then(|m| m.remove("assertions")) {
    Some(Value::Array(items)) => items,
    Some(_) => return Err(EngineError::MalformedManifest("assertions must be an array".into())),
    None => Vec::new(),
  };

  let mut out = Vec::with_capacity(assertions.len());
  for mut item in assertions {
    let label = item
      .get("label")
      .and_then(Value::as_str)
      .ok_or_else(|| EngineError::MalformedManifest("assertion without label".into()))?
      .to_string();
    let data = item.get_mut("data").map(Value::take).unwrap_or(Value::Null);
    let is_json = match item.get("kind") {
      None | Some(Value::Null) => true,
      Some(Value::String(k)) if k == "Json" => true,
      Some(Value::String(k)) if k == "Cbor" => false,
      Some(other) => {
        return Err(EngineError::MalformedManifest(format!(
          "assertion '{label}' has unsupported kind {other}, expected \"Json\" or \"Cbor\""
        )))
      }
    };
    out.push((label, data, is_json));
  }

  Ok((manifest.to_string(), out))
}

impl ManifestEngine for C2paEngine {
  type Context = C2paContext;
  type Store = Reader;

  fn create_context(&self, settings: &BuilderSettings, manifest_json: &str) -> EngineResult<C2paContext> {
    let fragments = builder_fragments(settings)?;
    let (definition, assertions) = split_assertions(manifest_json)?;

    let builder = with_c2pa_settings(&fragments, || {
      let mut builder = Builder::from_json(&definition)
        .map_err(|e| EngineError::MalformedManifest(e.to_string()))?;
      for (label, data, is_json) in &assertions {
        if *is_json {
          builder.add_assertion_json(label.as_str(), data)?;
        } else {
          builder.add_assertion(label.as_str(), data)?;
        }
      }
      Ok(builder)
    })?;

    tracing::debug!(assertions = assertions.len(), "c2pa builder context created");
    Ok(C2paContext {
      builder,
      fragments,
      allow_insecure_http: settings.allow_insecure_http,
    })
  }

  fn add_resource(&self, ctx: &mut C2paContext, identifier: &str, stream: &mut dyn AssetStream) -> EngineResult<()> {
    tracing::debug!(identifier, "attaching resource");
    ctx.builder.add_resource(identifier, stream)?;
    Ok(())
  }

  fn add_ingredient(
    &self,
    ctx: &mut C2paContext,
    ingredient_json: &str,
    format: &str,
    mut stream: &mut dyn AssetStream,
  ) -> EngineResult<()> {
    let fragments = ctx.fragments.clone();
    let builder = &mut ctx.builder;
    with_c2pa_settings(&fragments, || {
      builder.add_ingredient_from_stream(ingredient_json, format, &mut stream)?;
      Ok(())
    })?;
    tracing::debug!(format, "ingredient attached");
    Ok(())
  }

  fn sign(
    &self,
    ctx: &mut C2paContext,
    signer: &dyn SignerCapability,
    format: &str,
    mut input: &mut dyn AssetStream,
    mut output: &mut dyn AssetSink,
  ) -> EngineResult<()> {
    let bridge = SignerBridge::prepare(signer, ctx.allow_insecure_http)?;
    let mut fragments = ctx.fragments.clone();
    fragments.extend(ocsp_fragment(bridge.use_ocsp()));
    let builder = &mut ctx.builder;

    let (result, failure) = match bridge.timestamper() {
      Some(provider) => {
        let bridge = TimestampingBridge::new(bridge, provider);
        let r = with_c2pa_settings(&fragments, || Ok(builder.sign(&bridge, format, &mut input, &mut output)));
        (r, bridge.take_failure())
      }
      None => {
        let r = with_c2pa_settings(&fragments, || Ok(builder.sign(&bridge, format, &mut input, &mut output)));
        (r, bridge.take_failure())
      }
    };

    match result {
      Ok(Ok(manifest_bytes)) => {
        tracing::debug!(format, manifest_bytes = manifest_bytes.len(), "c2pa sign complete");
        Ok(())
      }
      Ok(Err(e)) => Err(EngineError::signing(failure.unwrap_or_else(|| e.to_string()))),
      // a panic inside c2pa still fails the sign
      Err(EngineError::Panic(message)) => Err(EngineError::signing(failure.unwrap_or(message))),
      Err(e) => Err(e),
    }
  }

  fn verify(&self, settings: &ReaderSettings, format: &str, input: &mut dyn AssetStream) -> EngineResult<Option<Reader>> {
    let fragments = reader_fragments(settings)?;
    with_c2pa_settings(&fragments, || match Reader::from_stream(format, input) {
      Ok(reader) => Ok(Some(reader)),
      Err(e) if is_missing_manifest(&e) => Ok(None),
      Err(e) => Err(EngineError::verification(e.to_string())),
    })
  }

  fn store_json(&self, store: &Reader) -> EngineResult<String> {
    Ok(store.json())
  }

  fn write_resource(&self, store: &Reader, uri: &str, sink: &mut dyn AssetSink) -> EngineResult<u64> {
    match store.resource_to_stream(uri, sink) {
      Ok(n) => Ok(n as u64),
      Err(c2pa::Error::ResourceNotFound(_)) => Err(EngineError::ResourceNotFound(uri.to_string())),
      Err(e) => Err(e.into()),
    }
  }
}
