//! On-disk archive directory for a single capture.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};
use url::Url;

use super::metadata::ArchiveMetadata;
use crate::config::ArchiveLayout;
use crate::error::CaptureError;
use crate::interceptor::{inject_interceptor, render_interceptor};
use crate::resolver::ResolutionIndex;

/// A saved page and the URL it was captured from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPage {
  /// File name at the archive root.
  pub file_name: String,
  /// Original page URL, used as the runtime resolution base.
  pub source_url: String,
}

/// Directory `{domainClean}_{timestampMillis}` below the archives directory.
#[derive(Debug, Clone)]
pub struct ArchiveBundle {
  id: String,
  root: PathBuf,
  original_url: String,
  base_domain: String,
  timestamp: i64,
}

impl ArchiveBundle {
  /// Create the archive directory for a capture starting now.
  pub fn create(archives_dir: &Path, start_url: &str) -> Result<Self, CaptureError> {
    Self::create_at(archives_dir, start_url, Utc::now().timestamp_millis())
  }

  /// Create the archive directory for a capture that started at `timestamp` (Unix ms).
  pub fn create_at(
    archives_dir: &Path,
    start_url: &str,
    timestamp: i64,
  ) -> Result<Self, CaptureError> {
    let mut parsed =
      Url::parse(start_url).map_err(|_| CaptureError::InvalidStartUrl(start_url.to_string()))?;
    parsed.set_fragment(None);
    let base_domain = match (parsed.scheme(), parsed.host_str()) {
      ("http" | "https", Some(host)) if !host.is_empty() => host.to_string(),
      _ => return Err(CaptureError::InvalidStartUrl(start_url.to_string())),
    };

    let id = format!("{}_{timestamp}", clean_domain(&base_domain));
    let root = archives_dir.join(&id);
    fs::create_dir_all(&root).map_err(|err| CaptureError::io(&root, err))?;
    info!(archive = %root.display(), "created archive directory");

    Ok(Self {
      id,
      root,
      original_url: parsed.into(),
      base_domain,
      timestamp,
    })
  }

  /// Directory name, also used as the archive id in replay URLs.
  pub fn id(&self) -> &str {
    &self.id
  }

  /// Archive root directory.
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Start URL of the capture, normalized the same way discovered links are.
  pub fn original_url(&self) -> &str {
    &self.original_url
  }

  /// Host of the start URL; hyperlinks to other hosts are left alone.
  pub fn base_domain(&self) -> &str {
    &self.base_domain
  }

  /// Capture start in Unix milliseconds.
  pub fn timestamp(&self) -> i64 {
    self.timestamp
  }

  /// Write a rewritten page at the archive root.
  pub fn write_page(&self, file_name: &str, markup: &str) -> Result<(), CaptureError> {
    let path = self.root.join(file_name);
    fs::write(&path, markup).map_err(|err| CaptureError::io(&path, err))?;
    debug!(page = file_name, "saved page");
    Ok(())
  }

  /// Persist the index, burn the runtime interceptor into every saved page and write
  /// the metadata document.
  pub fn finalize(
    &self,
    layout: ArchiveLayout<'_>,
    index: &ResolutionIndex,
    pages: &[SavedPage],
    title: &str,
  ) -> Result<ArchiveMetadata, CaptureError> {
    index.save(&self.root.join(layout.index_file))?;

    for page in pages {
      let path = self.root.join(&page.file_name);
      let markup = fs::read_to_string(&path).map_err(|err| CaptureError::io(&path, err))?;
      let script = render_interceptor(&self.id, &page.source_url, index)
        .map_err(|err| CaptureError::json(&path, err))?;
      fs::write(&path, inject_interceptor(&markup, &script))
        .map_err(|err| CaptureError::io(&path, err))?;
      debug!(page = %page.file_name, "injected runtime interceptor");
    }

    let metadata = ArchiveMetadata::new(
      self.id.clone(),
      self.original_url.clone(),
      title,
      &self.base_domain,
      self.timestamp,
      index.len(),
      pages.len(),
    );
    metadata.save(&self.root.join(layout.metadata_file))?;
    info!(
      archive = %self.id,
      pages = pages.len(),
      assets = index.len(),
      "archive finalized"
    );
    Ok(metadata)
  }
}

/// Replace every character outside `[A-Za-z0-9]` with `_`.
pub fn clean_domain(domain: &str) -> String {
  domain
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
    .collect()
}
