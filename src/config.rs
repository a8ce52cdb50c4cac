//! Archiver configuration loaded from `wayback.config.json`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "wayback.config.json";

/// Discoverable configuration shared by the capture, replay and export commands.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArchiverConfig {
  /// Directory holding one subdirectory per archive.
  pub archives_dir: String,
  /// Link depth followed from the start page; `0` captures only the start page.
  pub max_depth: usize,
  /// Per-page navigation budget in seconds.
  pub navigation_timeout_secs: u64,
  /// Port the replay server listens on.
  pub port: u16,
  /// Worker threads answering replay requests.
  pub server_workers: usize,
  /// Deflate level used for archive downloads (0-9).
  pub zip_compression_level: i32,
  /// Extensions of anchors that are never crawled as pages.
  pub skip_link_extensions: Vec<String>,
  /// File name of the persisted resolution index inside an archive.
  pub index_file: String,
  /// File name of the archive metadata document.
  pub metadata_file: String,
}

impl Default for ArchiverConfig {
  fn default() -> Self {
    Self {
      archives_dir: "archives".into(),
      max_depth: 1,
      navigation_timeout_secs: 60,
      port: 3000,
      server_workers: 4,
      zip_compression_level: 5,
      skip_link_extensions: ["png", "jpg", "jpeg", "gif", "css", "js", "pdf", "zip", "mp4"]
        .into_iter()
        .map(String::from)
        .collect(),
      index_file: "urlMap.json".into(),
      metadata_file: "metadata.json".into(),
    }
  }
}

/// File names every archive directory is laid out with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLayout<'a> {
  /// Resolution index file.
  pub index_file: &'a str,
  /// Metadata file.
  pub metadata_file: &'a str,
}

impl Default for ArchiveLayout<'static> {
  fn default() -> Self {
    Self {
      index_file: "urlMap.json",
      metadata_file: "metadata.json",
    }
  }
}

impl ArchiverConfig {
  /// Attempt to load configuration from the provided directory.
  ///
  /// A missing or unparsable file yields the defaults.
  pub fn discover(dir: &Path) -> Self {
    let candidate = dir.join(DEFAULT_CONFIG_FILE);
    Self::from_path(&candidate).unwrap_or_default()
  }

  /// Read configuration from a specific JSON file.
  pub fn from_path(path: &Path) -> Option<Self> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
  }

  /// Borrowing view of the archive file names.
  pub fn layout(&self) -> ArchiveLayout<'_> {
    ArchiveLayout {
      index_file: &self.index_file,
      metadata_file: &self.metadata_file,
    }
  }

  /// Archives directory resolved against `base`.
  pub fn archives_path(&self, base: &Path) -> PathBuf {
    base.join(&self.archives_dir)
  }

  /// Navigation budget per page.
  pub fn navigation_timeout(&self) -> Duration {
    Duration::from_secs(self.navigation_timeout_secs)
  }

  /// Compression level clamped to what deflate accepts.
  pub fn compression_level(&self) -> i32 {
    self.zip_compression_level.clamp(0, 9)
  }
}
