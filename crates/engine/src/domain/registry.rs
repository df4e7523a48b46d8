// crates/engine/src/domain/registry.rs

//! Label → payload-shape dispatch for assertions.
//!
//! Resolution walks an ordered rule list and the first match wins, so the
//! order of [`RULES`] is part of the contract: exact labels first, then the
//! thumbnail sub-variant prefixes, then the open `Custom` shape.

/// Well-known assertion labels.
pub mod labels {
  pub const ACTION: &str = "c2pa.action";
  pub const ACTIONS: &str = "c2pa.actions";
  pub const ACTIONS_V2: &str = "c2pa.actions.v2";
  pub const THUMBNAIL: &str = "c2pa.thumbnail";
  pub const CLAIM_THUMBNAIL: &str = "c2pa.thumbnail.claim";
  pub const INGREDIENT_THUMBNAIL: &str = "c2pa.thumbnail.ingredient";
  pub const CREATIVE_WORK: &str = "stds.schema-org.CreativeWork";
}

/// The payload shape a label resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssertionType {
  Actions,
  Thumbnail,
  ClaimThumbnail,
  IngredientThumbnail,
  CreativeWork,
  Custom,
}

#[derive(Debug, Clone, Copy)]
enum Rule {
  Exact(&'static str, AssertionType),
  Prefix(&'static str, AssertionType),
}

impl Rule {
  fn matches(self, label: &str) -> Option<AssertionType> {
    match self {
      Rule::Exact(l, t) if label == l => Some(t),
      Rule::Prefix(p, t) if label.starts_with(p) => Some(t),
      _ => None,
    }
  }
}

const RULES: &[Rule] = &[
  Rule::Exact(labels::ACTION, AssertionType::Actions),
  Rule::Exact(labels::ACTIONS, AssertionType::Actions),
  Rule::Exact(labels::ACTIONS_V2, AssertionType::Actions),
  Rule::Exact(labels::THUMBNAIL, AssertionType::Thumbnail),
  Rule::Exact(labels::CREATIVE_WORK, AssertionType::CreativeWork),
  Rule::Prefix(labels::CLAIM_THUMBNAIL, AssertionType::ClaimThumbnail),
  Rule::Prefix(labels::INGREDIENT_THUMBNAIL, AssertionType::IngredientThumbnail),
];

/// Resolve a label to its payload shape. Total: unmatched labels are `Custom`.
pub fn resolve(label: &str) -> AssertionType {
  RULES
    .iter()
    .find_map(|rule| rule.matches(label))
    .unwrap_or(AssertionType::Custom)
}

impl AssertionType {
  /// Label used when an assertion of this shape is constructed without one.
  pub fn default_label(self) -> Option<&'static str> {
    match self {
      AssertionType::Actions => Some(labels::ACTION),
      AssertionType::Thumbnail => Some(labels::THUMBNAIL),
      AssertionType::ClaimThumbnail => Some(labels::CLAIM_THUMBNAIL),
      AssertionType::IngredientThumbnail => Some(labels::INGREDIENT_THUMBNAIL),
      AssertionType::CreativeWork => Some(labels::CREATIVE_WORK),
      AssertionType::Custom => None,
    }
  }
}
