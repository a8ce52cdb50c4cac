//! The persisted mapping from canonical URL to archive-relative path.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CaptureError;

/// Mapping from canonical URL to local path, in insertion order.
///
/// Inserts are first-write-wins: once a canonical URL is recorded its local path never
/// changes, which keeps repeated lookups stable and makes duplicate responses harmless.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct ResolutionIndex {
  entries: Map<String, Value>,
}

impl ResolutionIndex {
  /// Create an empty index.
  pub fn new() -> Self {
    Self::default()
  }

  /// Record `canonical_url → local_path` unless the URL is already present.
  ///
  /// Returns `true` when the entry was inserted.
  pub fn insert(&mut self, canonical_url: impl Into<String>, local_path: impl Into<String>) -> bool {
    let canonical_url = canonical_url.into();
    if self.entries.contains_key(&canonical_url) {
      return false;
    }
    self
      .entries
      .insert(canonical_url, Value::String(local_path.into()));
    true
  }

  /// Exact lookup by canonical URL.
  pub fn get(&self, canonical_url: &str) -> Option<&str> {
    self.entries.get(canonical_url).and_then(Value::as_str)
  }

  /// Whether the canonical URL is recorded.
  pub fn contains(&self, canonical_url: &str) -> bool {
    self.entries.contains_key(canonical_url)
  }

  /// Entries in insertion order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .entries
      .iter()
      .filter_map(|(key, value)| value.as_str().map(|value| (key.as_str(), value)))
  }

  /// Number of recorded resources.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Whether nothing has been recorded yet.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Serialize as the pretty-printed flat JSON object stored in the archive.
  pub fn to_json_pretty(&self) -> serde_json::Result<String> {
    serde_json::to_string_pretty(self)
  }

  /// Compact JSON used when inlining the index into a page.
  pub fn to_json(&self) -> serde_json::Result<String> {
    serde_json::to_string(self)
  }

  /// Persist the index to `path`.
  pub fn save(&self, path: &Path) -> Result<(), CaptureError> {
    let json = self
      .to_json_pretty()
      .map_err(|err| CaptureError::json(path, err))?;
    fs::write(path, json).map_err(|err| CaptureError::io(path, err))
  }

  /// Load a persisted index.
  pub fn load(path: &Path) -> Result<Self, CaptureError> {
    let content = fs::read_to_string(path).map_err(|err| CaptureError::io(path, err))?;
    serde_json::from_str(&content).map_err(|err| CaptureError::json(path, err))
  }
}

impl TryFrom<Map<String, Value>> for ResolutionIndex {
  type Error = String;

  fn try_from(entries: Map<String, Value>) -> Result<Self, Self::Error> {
    match entries.iter().find(|(_, value)| !value.is_string()) {
      Some((key, _)) => Err(format!("local path of {key} is not a string")),
      None => Ok(Self { entries }),
    }
  }
}

impl From<ResolutionIndex> for Map<String, Value> {
  fn from(index: ResolutionIndex) -> Self {
    index.entries
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResolutionIndex {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut index = Self::new();
    for (key, value) in iter {
      index.insert(key, value);
    }
    index
  }
}
