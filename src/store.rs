//! Content-addressed persistence of captured resources.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::asset_paths::{asset_file_name, make_archive_asset_path};
use crate::error::CaptureError;
use crate::resolver::ResolutionIndex;

/// Resource category derived from transport metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
  /// Stylesheets.
  Stylesheet,
  /// Scripts.
  Script,
  /// Images, audio, video and fonts.
  Media,
  /// XHR/fetch payloads and JSON documents.
  Api,
  /// Anything else; never persisted.
  Other,
}

impl AssetKind {
  /// Every kind that owns a subdirectory in the archive.
  pub const STORED: [AssetKind; 4] = [
    AssetKind::Stylesheet,
    AssetKind::Script,
    AssetKind::Media,
    AssetKind::Api,
  ];

  /// Classify a response from the browser's resource type and its content type.
  pub fn classify(resource_type: &str, content_type: &str) -> Self {
    let resource_type = resource_type.to_ascii_lowercase();
    let content_type = content_type.to_ascii_lowercase();

    if resource_type == "stylesheet" || content_type.contains("text/css") {
      AssetKind::Stylesheet
    } else if resource_type == "script" || content_type.contains("javascript") {
      AssetKind::Script
    } else if matches!(resource_type.as_str(), "image" | "media" | "font")
      || content_type.contains("image/")
      || content_type.contains("font/")
    {
      AssetKind::Media
    } else if matches!(resource_type.as_str(), "xhr" | "fetch")
      || content_type.contains("application/json")
    {
      AssetKind::Api
    } else {
      AssetKind::Other
    }
  }

  /// Subdirectory below `assets/`.
  pub fn subdir(self) -> &'static str {
    match self {
      AssetKind::Stylesheet => "css",
      AssetKind::Script => "js",
      AssetKind::Media => "media",
      AssetKind::Api => "api",
      AssetKind::Other => "other",
    }
  }
}

/// Result of offering a resource to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
  /// Bytes were written and indexed under this path.
  Stored(String),
  /// The URL was already captured; the first payload is kept at this path.
  Duplicate(String),
  /// The resource kind is not archived.
  Skipped,
}

/// Writes captured resources below the archive root and records them in the index.
#[derive(Debug)]
pub struct ContentStore {
  root: PathBuf,
  index: ResolutionIndex,
}

impl ContentStore {
  /// Create a store rooted at the archive directory, creating the asset subdirectories.
  pub fn create(root: impl Into<PathBuf>) -> Result<Self, CaptureError> {
    let root = root.into();
    for kind in AssetKind::STORED {
      let dir = root.join("assets").join(kind.subdir());
      fs::create_dir_all(&dir).map_err(|err| CaptureError::io(&dir, err))?;
    }
    Ok(Self {
      root,
      index: ResolutionIndex::new(),
    })
  }

  /// Persist `bytes` for `canonical_url` unless it was already captured.
  pub fn store(
    &mut self,
    canonical_url: &str,
    bytes: &[u8],
    kind: AssetKind,
  ) -> Result<StoreOutcome, CaptureError> {
    if kind == AssetKind::Other {
      trace!(url = canonical_url, "skipping unclassified resource");
      return Ok(StoreOutcome::Skipped);
    }
    if let Some(existing) = self.index.get(canonical_url) {
      trace!(url = canonical_url, path = existing, "duplicate response discarded");
      return Ok(StoreOutcome::Duplicate(existing.to_string()));
    }

    let file_name = asset_file_name(canonical_url, kind);
    let local_path = make_archive_asset_path(kind, &file_name);
    let destination = self.root.join(&local_path);
    fs::write(&destination, bytes).map_err(|err| CaptureError::io(&destination, err))?;
    self.index.insert(canonical_url, local_path.clone());

    debug!(url = canonical_url, path = %local_path, bytes = bytes.len(), "stored asset");
    Ok(StoreOutcome::Stored(local_path))
  }

  /// Archive root the store writes into.
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Index built so far.
  pub fn index(&self) -> &ResolutionIndex {
    &self.index
  }

  /// Release the index once capture is over.
  pub fn into_index(self) -> ResolutionIndex {
    self.index
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn classifies_by_resource_type_then_content_type() {
    assert_eq!(AssetKind::classify("stylesheet", ""), AssetKind::Stylesheet);
    assert_eq!(AssetKind::classify("other", "text/css; charset=utf-8"), AssetKind::Stylesheet);
    assert_eq!(AssetKind::classify("", "application/javascript"), AssetKind::Script);
    assert_eq!(AssetKind::classify("font", ""), AssetKind::Media);
    assert_eq!(AssetKind::classify("", "image/webp"), AssetKind::Media);
    assert_eq!(AssetKind::classify("fetch", "text/plain"), AssetKind::Api);
    assert_eq!(AssetKind::classify("", "application/json"), AssetKind::Api);
    assert_eq!(AssetKind::classify("document", "text/html"), AssetKind::Other);
  }

  #[test]
  fn script_hint_wins_over_json_content_type() {
    assert_eq!(AssetKind::classify("script", "application/json"), AssetKind::Script);
  }

  #[test]
  fn first_payload_wins() {
    let dir = tempdir().unwrap();
    let mut store = ContentStore::create(dir.path()).unwrap();

    let url = "https://ex.com/img/logo.png";
    let first = store.store(url, b"first", AssetKind::Media).unwrap();
    let StoreOutcome::Stored(path) = first else {
      panic!("expected stored outcome, got {first:?}");
    };
    let second = store.store(url, b"second", AssetKind::Media).unwrap();
    assert_eq!(second, StoreOutcome::Duplicate(path.clone()));

    let media_dir = dir.path().join("assets/media");
    let files: Vec<_> = fs::read_dir(&media_dir).unwrap().flatten().collect();
    assert_eq!(files.len(), 1);
    assert_eq!(fs::read(dir.path().join(&path)).unwrap(), b"first");
    assert_eq!(store.index().get(url), Some(path.as_str()));
  }

  #[test]
  fn query_variants_are_stored_separately() {
    let dir = tempdir().unwrap();
    let mut store = ContentStore::create(dir.path()).unwrap();

    let a = store
      .store("https://ex.com/api/list?page=1", b"[1]", AssetKind::Api)
      .unwrap();
    let b = store
      .store("https://ex.com/api/list?page=2", b"[2]", AssetKind::Api)
      .unwrap();
    assert_ne!(a, b);
    assert_eq!(store.index().len(), 2);
  }

  #[test]
  fn unclassified_resources_are_not_written() {
    let dir = tempdir().unwrap();
    let mut store = ContentStore::create(dir.path()).unwrap();
    let outcome = store
      .store("https://ex.com/page", b"<html>", AssetKind::Other)
      .unwrap();
    assert_eq!(outcome, StoreOutcome::Skipped);
    assert!(store.index().is_empty());
  }

  #[test]
  fn creates_kind_subdirectories() {
    let dir = tempdir().unwrap();
    ContentStore::create(dir.path()).unwrap();
    for sub in ["css", "js", "media", "api"] {
      assert!(dir.path().join("assets").join(sub).is_dir());
    }
  }
}
