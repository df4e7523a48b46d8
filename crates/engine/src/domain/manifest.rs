// crates/engine/src/domain/manifest.rs

//! Manifest definition (write side) and manifest store (read side).
//!
//! The JSON shape follows the C2PA manifest-definition format: snake_case
//! member names, absent optionals omitted, unknown members ignored on read.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::assertion::{self, Assertion};
use super::error::{EngineError, EngineResult};
use super::registry::AssertionType;
use super::types::EngineDefaults;

/// Identifies the software that produced a claim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClaimGeneratorInfo {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl ClaimGeneratorInfo {
  pub fn new(name: impl Into<String>, version: Option<&str>) -> Self {
    Self { name: name.into(), version: version.map(str::to_string), extra: Map::new() }
  }
}

/// Role of an ingredient relative to the asset being signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relationship {
  ParentOf,
  #[default]
  ComponentOf,
  InputTo,
}

/// Reference to content addressed by hash.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HashedUri {
  pub url: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub alg: Option<String>,
  #[serde(default)]
  pub hash: Vec<u8>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub salt: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssetType {
  #[serde(rename = "type")]
  pub asset_type: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
}

/// Reference to a binary resource (thumbnail, ingredient data) by identifier.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceRef {
  pub format: String,
  pub identifier: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data_types: Option<Vec<AssetType>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub alg: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub hash: Option<String>,
}

impl ResourceRef {
  pub fn new(format: impl Into<String>, identifier: impl Into<String>) -> Self {
    Self { format: format.into(), identifier: identifier.into(), ..Default::default() }
  }
}

pub type Thumbnail = ResourceRef;

const FAILURE_MARKERS: &[&str] = &[
  ".mismatch",
  ".invalid",
  ".untrusted",
  ".missing",
  ".revoked",
  ".expired",
  ".malformed",
];

/// One validation outcome reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationStatus {
  pub code: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

impl ValidationStatus {
  pub fn passed(&self) -> bool {
    !FAILURE_MARKERS.iter().any(|m| self.code.contains(m))
  }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ingredient {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub format: Option<String>,
  #[serde(default)]
  pub relationship: Relationship,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub document_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub instance_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub c2pa_manifest: Option<HashedUri>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub hashed_manifest_uri: Option<HashedUri>,
  /// Populated by the engine on read only.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub validation_status: Option<Vec<ValidationStatus>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub thumbnail: Option<ResourceRef>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data: Option<ResourceRef>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(alias = "informational_URI", skip_serializing_if = "Option::is_none")]
  pub informational_uri: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  /// Label of the ingredient's own active manifest, when it carried one.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub active_manifest: Option<String>,
}

impl Ingredient {
  pub fn new(title: impl Into<String>, format: impl Into<String>, relationship: Relationship) -> Self {
    Self {
      title: Some(title.into()),
      format: Some(format.into()),
      relationship,
      ..Default::default()
    }
  }

  pub fn parent(title: impl Into<String>, format: impl Into<String>) -> Self {
    Self::new(title, format, Relationship::ParentOf)
  }

  /// Identifiers of the binary resources this ingredient refers to.
  pub fn resource_identifiers(&self) -> impl Iterator<Item = &str> {
    self.thumbnail.iter().chain(self.data.iter()).map(|r| r.identifier.as_str())
  }
}

fn default_format() -> String {
  EngineDefaults::FORMAT.to_string()
}

/// A fresh `xmp:iid:<uuid>` instance identifier.
pub fn generate_instance_id() -> String {
  format!("{}{}", EngineDefaults::INSTANCE_ID_PREFIX, Uuid::new_v4())
}

/// Everything the builder needs to describe one signed manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestDefinition {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub vendor: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub claim_generator_info: Vec<ClaimGeneratorInfo>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default = "default_format")]
  pub format: String,
  #[serde(default = "generate_instance_id")]
  pub instance_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub thumbnail: Option<Thumbnail>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub ingredients: Vec<Ingredient>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub assertions: Vec<Assertion>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub redactions: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
}

impl Default for ManifestDefinition {
  fn default() -> Self {
    Self::new(EngineDefaults::FORMAT)
  }
}

impl ManifestDefinition {
  pub fn new(format: impl Into<String>) -> Self {
    Self {
      vendor: None,
      claim_generator_info: Vec::new(),
      title: None,
      format: format.into(),
      instance_id: generate_instance_id(),
      thumbnail: None,
      ingredients: Vec::new(),
      assertions: Vec::new(),
      redactions: None,
      label: None,
    }
  }

  /// Parse a definition. Assertion payloads are decoded strictly.
  pub fn from_json(json: &str) -> EngineResult<Self> {
    serde_json::from_str(json).map_err(|e| EngineError::MalformedManifest(e.to_string()))
  }

  pub fn to_json(&self) -> EngineResult<String> {
    Ok(serde_json::to_string(self)?)
  }

  pub fn validate(&self) -> EngineResult<()> {
    if self.format.trim().is_empty() {
      return Err(EngineError::MalformedManifest("format must not be empty".into()));
    }
    let tail = self.instance_id.rsplit(':').next().unwrap_or_default();
    if Uuid::parse_str(tail).is_err() {
      return Err(EngineError::MalformedManifest(format!(
        "instance_id '{}' is not a UUID-bearing URN",
        self.instance_id
      )));
    }
    Ok(())
  }

  pub fn refresh_instance_id(&mut self) {
    self.instance_id = generate_instance_id();
  }

  /// Identifiers of every binary resource the definition refers to.
  pub fn referenced_resources(&self) -> Vec<&str> {
    self.thumbnail
      .iter()
      .map(|t| t.identifier.as_str())
      .chain(self.ingredients.iter().flat_map(Ingredient::resource_identifiers))
      .collect()
  }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignatureInfo {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub alg: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub issuer: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cert_serial_number: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub time: Option<String>,
}

/// A manifest as read back from a signed asset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Manifest {
  #[serde(default)]
  pub label: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub claim_generator: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub claim_generator_info: Vec<ClaimGeneratorInfo>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub vendor: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default)]
  pub format: String,
  #[serde(default)]
  pub instance_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub thumbnail: Option<Thumbnail>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub ingredients: Vec<Ingredient>,
  #[serde(
    default,
    deserialize_with = "assertion::deserialize_lenient",
    skip_serializing_if = "Vec::is_empty"
  )]
  pub assertions: Vec<Assertion>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub redactions: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub signature_info: Option<SignatureInfo>,
}

impl Manifest {
  /// First assertion carrying exactly this label.
  pub fn assertion(&self, label: &str) -> Option<&Assertion> {
    self.assertions.iter().find(|a| a.label() == label)
  }

  pub fn assertions_of(&self, ty: AssertionType) -> impl Iterator<Item = &Assertion> {
    self.assertions.iter().filter(move |a| a.assertion_type() == ty)
  }
}

/// Every manifest found in an asset. Produced by the reader only.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ManifestStore {
  #[serde(default)]
  active_manifest: Option<String>,
  #[serde(default)]
  manifests: HashMap<String, Manifest>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  validation_status: Option<Vec<ValidationStatus>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  validation_state: Option<String>,
}

impl ManifestStore {
  pub(crate) fn from_json(json: &str) -> EngineResult<Self> {
    serde_json::from_str(json).map_err(|e| EngineError::verification(format!("unreadable manifest store: {e}")))
  }

  pub fn active_manifest(&self) -> Option<&str> {
    self.active_manifest.as_deref()
  }

  pub fn manifests(&self) -> &HashMap<String, Manifest> {
    &self.manifests
  }

  pub fn validation_status(&self) -> Option<&[ValidationStatus]> {
    self.validation_status.as_deref()
  }

  /// Overall state reported by the engine (`Valid`, `Trusted`, `Invalid`), when present.
  pub fn validation_state(&self) -> Option<&str> {
    self.validation_state.as_deref()
  }

  pub fn active(&self) -> Option<&Manifest> {
    self.active_manifest.as_deref().and_then(|l| self.manifests.get(l))
  }

  pub fn get(&self, label: &str) -> Option<&Manifest> {
    self.manifests.get(label)
  }

  /// True when no reported status carries a failure marker.
  pub fn passed(&self) -> bool {
    self.validation_status
      .as_deref()
      .map_or(true, |s| s.iter().all(ValidationStatus::passed))
  }
}
