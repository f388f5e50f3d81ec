use serde::Deserialize;
use serde::Serialize;

pub const RATING_MIN: u8 = 1;
pub const RATING_MAX: u8 = 10;

/// A review as the store returns it. `owner` is the Telegram user id of the
/// author; reviews created outside the bot may not have one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Review {
  pub id: i64,
  pub kind: String,
  pub title: String,
  pub body: String,
  pub rating: u8,
  #[serde(default)]
  pub image_ref: Option<String>,
  #[serde(default)]
  pub owner: Option<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewReview {
  pub owner: i64,
  pub kind: String,
  pub title: String,
  pub body: String,
  pub rating: u8,
}

/// Partial update payload. Unset fields are left untouched by the store.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ReviewPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub kind: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub body: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rating: Option<u8>,
}

impl ReviewPatch {
  pub fn is_empty(&self) -> bool {
    self.kind.is_none() && self.title.is_none() && self.body.is_none() && self.rating.is_none()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewFilter {
  pub kind: Option<String>,
  pub min_rating: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
  pub data: Vec<u8>,
  pub filename: String,
}

#[cfg(test)]
mod tests {
  use super::ReviewPatch;

  #[test]
  fn empty_patch_serializes_to_empty_object() {
    let patch = ReviewPatch::default();
    assert!(patch.is_empty());
    assert_eq!(serde_json::to_string(&patch).unwrap(), "{}");
  }

  #[test]
  fn patch_serializes_only_set_fields() {
    let patch = ReviewPatch {
      rating: Some(7),
      ..ReviewPatch::default()
    };
    assert!(!patch.is_empty());
    assert_eq!(serde_json::to_string(&patch).unwrap(), r#"{"rating":7}"#);
  }
}
