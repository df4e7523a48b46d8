// crates/engine/src/domain/assertion.rs

//! Typed assertion payloads keyed by label.

use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::error::{EngineError, EngineResult};
use super::manifest::ClaimGeneratorInfo;
use super::registry::{self, labels, AssertionType};

/// How the assertion is stored in the claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssertionKind {
  Cbor,
  #[default]
  Json,
  Binary,
  Uri,
}

/// Whether a payload that does not fit the shape its label resolves to is an
/// error or is kept verbatim as `Custom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
  Strict,
  Lenient,
}

/// A single action entry of a `c2pa.action(s)` assertion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Action {
  pub action: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub when: Option<String>,
  #[serde(rename = "softwareAgent", skip_serializing_if = "Option::is_none")]
  pub software_agent: Option<SoftwareAgent>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub changed: Option<String>,
  #[serde(rename = "instanceId", skip_serializing_if = "Option::is_none")]
  pub instance_id: Option<String>,
  #[serde(rename = "digitalSourceType", skip_serializing_if = "Option::is_none")]
  pub digital_source_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parameters: Option<Value>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub actors: Vec<CustomData>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Action {
  pub fn new(action: impl Into<String>) -> Self {
    Self { action: action.into(), ..Default::default() }
  }
}

/// `softwareAgent` is a plain string in v1 claims and a generator-info object in v2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SoftwareAgent {
  Name(String),
  Info(ClaimGeneratorInfo),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionsData {
  pub actions: Vec<Action>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThumbnailData {
  pub thumbnail: String,
  pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuthorInfo {
  #[serde(rename = "@type")]
  pub author_type: String,
  pub name: String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl AuthorInfo {
  pub fn new(author_type: impl Into<String>, name: impl Into<String>) -> Self {
    Self { author_type: author_type.into(), name: name.into(), extra: Map::new() }
  }

  pub fn person(name: impl Into<String>) -> Self {
    Self::new("Person", name)
  }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreativeWorkData {
  #[serde(rename = "@context", skip_serializing_if = "Option::is_none")]
  pub context: Option<String>,
  #[serde(rename = "@type", skip_serializing_if = "Option::is_none")]
  pub work_type: Option<String>,
  #[serde(default, alias = "authors")]
  pub author: Vec<AuthorInfo>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl CreativeWorkData {
  pub fn new(authors: Vec<AuthorInfo>) -> Self {
    Self {
      context: Some("http://schema.org/".to_string()),
      work_type: Some("CreativeWork".to_string()),
      author: authors,
      extra: Map::new(),
    }
  }
}

/// Open payload for labels outside the registry: a JSON-like tree with
/// explicit accessors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomData(Value);

impl CustomData {
  pub fn new(value: Value) -> Self {
    CustomData(value)
  }

  /// Carry any serializable payload (including registry shapes) under a custom label.
  pub fn from_serializable<T: Serialize>(payload: &T) -> EngineResult<Self> {
    Ok(CustomData(serde_json::to_value(payload)?))
  }

  pub fn value(&self) -> &Value {
    &self.0
  }

  pub fn into_value(self) -> Value {
    self.0
  }

  /// Top-level member of an object payload.
  pub fn get(&self, key: &str) -> Option<&Value> {
    self.0.get(key)
  }

  /// JSON pointer lookup, e.g. `/key4/key5`.
  pub fn pointer(&self, pointer: &str) -> Option<&Value> {
    self.0.pointer(pointer)
  }

  pub fn str_at(&self, pointer: &str) -> Option<&str> {
    self.pointer(pointer).and_then(Value::as_str)
  }

  pub fn bool_at(&self, pointer: &str) -> Option<bool> {
    self.pointer(pointer).and_then(Value::as_bool)
  }

  pub fn f64_at(&self, pointer: &str) -> Option<f64> {
    self.pointer(pointer).and_then(Value::as_f64)
  }

  pub fn array_at(&self, pointer: &str) -> Option<&Vec<Value>> {
    self.pointer(pointer).and_then(Value::as_array)
  }

  /// Member names of an object payload; empty for anything else.
  pub fn keys(&self) -> Vec<&str> {
    self.0
      .as_object()
      .map(|o| o.keys().map(String::as_str).collect())
      .unwrap_or_default()
  }

  /// Interpret the payload as a concrete type.
  pub fn to_typed<T: for<'de> Deserialize<'de>>(&self) -> EngineResult<T> {
    Ok(T::deserialize(&self.0)?)
  }
}

impl From<Value> for CustomData {
  fn from(v: Value) -> Self {
    CustomData(v)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssertionData {
  Actions(ActionsData),
  Thumbnail(ThumbnailData),
  ClaimThumbnail(ThumbnailData),
  IngredientThumbnail(ThumbnailData),
  CreativeWork(CreativeWorkData),
  Custom(CustomData),
}

impl AssertionData {
  pub fn assertion_type(&self) -> AssertionType {
    match self {
      AssertionData::Actions(_) => AssertionType::Actions,
      AssertionData::Thumbnail(_) => AssertionType::Thumbnail,
      AssertionData::ClaimThumbnail(_) => AssertionType::ClaimThumbnail,
      AssertionData::IngredientThumbnail(_) => AssertionType::IngredientThumbnail,
      AssertionData::CreativeWork(_) => AssertionType::CreativeWork,
      AssertionData::Custom(_) => AssertionType::Custom,
    }
  }

  fn to_value(&self) -> Result<Value, serde_json::Error> {
    match self {
      AssertionData::Actions(d) => serde_json::to_value(d),
      AssertionData::Thumbnail(d)
      | AssertionData::ClaimThumbnail(d)
      | AssertionData::IngredientThumbnail(d) => serde_json::to_value(d),
      AssertionData::CreativeWork(d) => serde_json::to_value(d),
      AssertionData::Custom(d) => Ok(d.value().clone()),
    }
  }

  fn decode(ty: AssertionType, data: &Value) -> Result<Self, serde_json::Error> {
    Ok(match ty {
      AssertionType::Actions => AssertionData::Actions(ActionsData::deserialize(data)?),
      AssertionType::Thumbnail => AssertionData::Thumbnail(ThumbnailData::deserialize(data)?),
      AssertionType::ClaimThumbnail => {
        AssertionData::ClaimThumbnail(ThumbnailData::deserialize(data)?)
      }
      AssertionType::IngredientThumbnail => {
        AssertionData::IngredientThumbnail(ThumbnailData::deserialize(data)?)
      }
      AssertionType::CreativeWork => {
        AssertionData::CreativeWork(CreativeWorkData::deserialize(data)?)
      }
      AssertionType::Custom => AssertionData::Custom(CustomData(data.clone())),
    })
  }
}

/// One typed statement within a manifest.
///
/// The label is kept verbatim next to the payload, and the payload shape is
/// always the one [`registry::resolve`] picks for that label.
#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
  label: String,
  data: AssertionData,
  kind: AssertionKind,
  instance: Option<usize>,
}

impl Assertion {
  fn typed(label: &str, data: AssertionData) -> Self {
    Self { label: label.to_string(), data, kind: AssertionKind::Json, instance: None }
  }

  pub fn actions(data: ActionsData) -> Self {
    Self::typed(labels::ACTION, AssertionData::Actions(data))
  }

  pub fn thumbnail(data: ThumbnailData) -> Self {
    Self::typed(labels::THUMBNAIL, AssertionData::Thumbnail(data))
  }

  pub fn claim_thumbnail(data: ThumbnailData) -> Self {
    Self::typed(labels::CLAIM_THUMBNAIL, AssertionData::ClaimThumbnail(data))
  }

  pub fn ingredient_thumbnail(data: ThumbnailData) -> Self {
    Self::typed(labels::INGREDIENT_THUMBNAIL, AssertionData::IngredientThumbnail(data))
  }

  pub fn creative_work(data: CreativeWorkData) -> Self {
    Self::typed(labels::CREATIVE_WORK, AssertionData::CreativeWork(data))
  }

  /// An assertion under an arbitrary label. The payload is re-resolved through
  /// the registry, so a registered label yields its typed shape.
  pub fn custom(label: impl Into<String>, data: impl Into<CustomData>) -> EngineResult<Self> {
    let data: CustomData = data.into();
    Self::decode(label.into(), data.into_value(), AssertionKind::Json, DecodeMode::Strict)
  }

  /// Build an assertion from its wire parts, dispatching on the label.
  pub fn decode(
    label: String,
    data: Value,
    kind: AssertionKind,
    mode: DecodeMode,
  ) -> EngineResult<Self> {
    let ty = registry::resolve(&label);
    let data = match AssertionData::decode(ty, &data) {
      Ok(d) => d,
      Err(e) => match mode {
        DecodeMode::Strict => {
          return Err(EngineError::UnsupportedAssertionLabel { label, reason: e.to_string() })
        }
        DecodeMode::Lenient => {
          tracing::warn!(%label, error = %e, "assertion payload does not match its label; keeping it as custom data");
          AssertionData::Custom(CustomData(data))
        }
      },
    };
    Ok(Self { label, data, kind, instance: None })
  }

  pub fn with_kind(mut self, kind: AssertionKind) -> Self {
    self.kind = kind;
    self
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn kind(&self) -> AssertionKind {
    self.kind
  }

  pub fn instance(&self) -> Option<usize> {
    self.instance
  }

  pub fn data(&self) -> &AssertionData {
    &self.data
  }

  pub fn assertion_type(&self) -> AssertionType {
    self.data.assertion_type()
  }

  /// Payload as JSON, as written to the manifest definition.
  pub fn data_json(&self) -> EngineResult<Value> {
    Ok(self.data.to_value()?)
  }

  pub fn as_actions(&self) -> Option<&ActionsData> {
    match &self.data {
      AssertionData::Actions(d) => Some(d),
      _ => None,
    }
  }

  pub fn as_thumbnail(&self) -> Option<&ThumbnailData> {
    match &self.data {
      AssertionData::Thumbnail(d)
      | AssertionData::ClaimThumbnail(d)
      | AssertionData::IngredientThumbnail(d) => Some(d),
      _ => None,
    }
  }

  pub fn as_creative_work(&self) -> Option<&CreativeWorkData> {
    match &self.data {
      AssertionData::CreativeWork(d) => Some(d),
      _ => None,
    }
  }

  pub fn as_custom(&self) -> Option<&CustomData> {
    match &self.data {
      AssertionData::Custom(d) => Some(d),
      _ => None,
    }
  }

  pub fn to_json(&self) -> EngineResult<String> {
    Ok(serde_json::to_string(self)?)
  }

  /// Strict parse of a single `{label, data, kind}` object.
  pub fn from_json(json: &str) -> EngineResult<Self> {
    let raw: RawAssertion = serde_json::from_str(json)?;
    raw.into_assertion(DecodeMode::Strict)
  }
}

impl Serialize for Assertion {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let data = self.data.to_value().map_err(serde::ser::Error::custom)?;
    let len = if self.instance.is_some() { 4 } else { 3 };
    let mut s = serializer.serialize_struct("Assertion", len)?;
    s.serialize_field("label", &self.label)?;
    s.serialize_field("data", &data)?;
    s.serialize_field("kind", &self.kind)?;
    if let Some(instance) = self.instance {
      s.serialize_field("instance", &instance)?;
    }
    s.end()
  }
}

/// Wire form before label dispatch.
#[derive(Debug, Deserialize)]
pub(crate) struct RawAssertion {
  label: String,
  #[serde(default)]
  data: Value,
  #[serde(default)]
  kind: Option<AssertionKind>,
  #[serde(default)]
  instance: Option<usize>,
}

impl RawAssertion {
  pub(crate) fn into_assertion(self, mode: DecodeMode) -> EngineResult<Assertion> {
    let mut assertion =
      Assertion::decode(self.label, self.data, self.kind.unwrap_or_default(), mode)?;
    assertion.instance = self.instance;
    Ok(assertion)
  }
}

impl<'de> Deserialize<'de> for Assertion {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    RawAssertion::deserialize(deserializer)?
      .into_assertion(DecodeMode::Strict)
      .map_err(D::Error::custom)
  }
}

/// Lenient decoding for assertion lists read back from signed assets.
pub(crate) fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Vec<Assertion>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw: Vec<RawAssertion> = Vec::deserialize(deserializer)?;
  raw
    .into_iter()
    .map(|r| r.into_assertion(DecodeMode::Lenient).map_err(D::Error::custom))
    .collect()
}
