//! Last-resort resolution of requests issued by replayed pages.
//!
//! Client code often builds absolute paths at runtime (`/api/...`, `/_next/...`) that
//! miss the `/view/{id}/` prefix. The `Referer` tells which archive the page came from;
//! the request is then matched against that archive's index.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, trace};

use crate::archive::{ArchiveMetadata, is_valid_archive_id};
use crate::asset_paths::strip_query;
use crate::config::ArchiveLayout;
use crate::resolver::{ResolutionIndex, TierProfile, resolve_with_tier};

const VIEW_PREFIX: &str = "/view/";
/// Base used for tier 1 when an archive has no readable metadata.
const FALLBACK_BASE_URL: &str = "http://localhost/";

/// Archive id named by a `Referer` such as `http://host/view/{id}/index.html`.
pub fn archive_id_from_referer(referer: &str) -> Option<&str> {
  let start = referer.find(VIEW_PREFIX)? + VIEW_PREFIX.len();
  let rest = &referer[start..];
  let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
  let id = &rest[..end];
  is_valid_archive_id(id).then_some(id)
}

/// Referer-driven lookup against the immutable archives on disk.
#[derive(Debug, Clone, Copy)]
pub struct ReplayFallback<'a> {
  archives_dir: &'a Path,
  layout: ArchiveLayout<'a>,
}

impl<'a> ReplayFallback<'a> {
  /// Fallback reading archives below `archives_dir`.
  pub fn new(archives_dir: &'a Path, layout: ArchiveLayout<'a>) -> Self {
    Self {
      archives_dir,
      layout,
    }
  }

  /// File answering `request` for a page of archive `archive_id`.
  ///
  /// Only the request path takes part in matching; any query is ignored. Returns
  /// `None` when the archive is unknown, no tier matches, or the mapped file is missing.
  pub fn resolve(&self, archive_id: &str, request: &str) -> Option<PathBuf> {
    if !is_valid_archive_id(archive_id) {
      return None;
    }
    let request = strip_query(request);
    let root = self.archives_dir.join(archive_id);
    let index = match ResolutionIndex::load(&root.join(self.layout.index_file)) {
      Ok(index) => index,
      Err(err) => {
        debug!(archive = archive_id, error = %err, "no index for fallback");
        return None;
      }
    };
    let base_url = ArchiveMetadata::load(&root.join(self.layout.metadata_file))
      .map(|metadata| metadata.original_url)
      .unwrap_or_else(|_| FALLBACK_BASE_URL.to_string());

    let resolution = resolve_with_tier(request, &index, &base_url, TierProfile::REPLAY_FALLBACK)?;
    let local = Path::new(resolution.local_path);
    if !is_contained(local) {
      return None;
    }
    let path = root.join(local);
    trace!(archive = archive_id, request, tier = ?resolution.tier, "fallback matched");
    path.is_file().then_some(path)
  }
}

/// Relative path without parent, root or prefix components.
pub(crate) fn is_contained(path: &Path) -> bool {
  path
    .components()
    .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::*;
  use tempfile::tempdir;

  #[test]
  fn extracts_archive_id_from_referer() {
    assert_eq!(
      archive_id_from_referer("http://localhost:3000/view/ex_com_1/index.html"),
      Some("ex_com_1")
    );
    assert_eq!(
      archive_id_from_referer("http://localhost:3000/view/ex_com_1?x=1"),
      Some("ex_com_1")
    );
    assert_eq!(archive_id_from_referer("http://localhost:3000/"), None);
    assert_eq!(archive_id_from_referer("http://localhost:3000/view/../x"), None);
  }

  fn archive(dir: &Path) -> PathBuf {
    let root = dir.join("ex_com_1");
    fs::create_dir_all(root.join("assets/api")).unwrap();
    fs::write(root.join("assets/api/data_1.json"), "[1]").unwrap();
    let index: ResolutionIndex = [
      ("https://ex.com/api/items?page=1", "assets/api/data_1.json"),
      ("https://ex.com/api/status", "assets/api/data_1.json"),
      ("https://ex.com/api/gone", "assets/api/data_2.json"),
      ("https://ex.com/evil", "../outside.txt"),
    ]
    .into_iter()
    .collect();
    index.save(&root.join("urlMap.json")).unwrap();
    ArchiveMetadata::new("ex_com_1", "https://ex.com/", "Ex", "ex.com", 1, 3, 1)
      .save(&root.join("metadata.json"))
      .unwrap();
    fs::write(dir.join("outside.txt"), "secret").unwrap();
    root
  }

  #[test]
  fn exact_request_against_original_origin() {
    let dir = tempdir().unwrap();
    let root = archive(dir.path());
    let fallback = ReplayFallback::new(dir.path(), ArchiveLayout::default());
    assert_eq!(
      fallback.resolve("ex_com_1", "/api/status"),
      Some(root.join("assets/api/data_1.json"))
    );
    assert_eq!(
      fallback.resolve("ex_com_1", "/api/status?cache=0"),
      Some(root.join("assets/api/data_1.json"))
    );
  }

  #[test]
  fn suffix_match_for_other_query() {
    let dir = tempdir().unwrap();
    let root = archive(dir.path());
    let fallback = ReplayFallback::new(dir.path(), ArchiveLayout::default());
    assert_eq!(
      fallback.resolve("ex_com_1", "/api/items?page=7"),
      Some(root.join("assets/api/data_1.json"))
    );
  }

  #[test]
  fn misses_missing_files_and_escapes() {
    let dir = tempdir().unwrap();
    archive(dir.path());
    let fallback = ReplayFallback::new(dir.path(), ArchiveLayout::default());
    assert_eq!(fallback.resolve("ex_com_1", "/api/gone"), None);
    assert_eq!(fallback.resolve("ex_com_1", "/evil"), None);
    assert_eq!(fallback.resolve("ex_com_1", "/"), None);
    assert_eq!(fallback.resolve("unknown_2", "/api/items?page=1"), None);
  }
}
