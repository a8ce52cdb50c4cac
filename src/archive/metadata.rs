//! `metadata.json` describing a finished archive.

use std::fs;
use std::path::Path;

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

const DATE_FORMAT: &str = "%b %-d, %Y, %I:%M %p";

/// Summary written next to the index once a capture is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveMetadata {
  /// Archive directory name.
  pub id: String,
  /// URL the capture started from.
  pub original_url: String,
  /// Title of the first archived page, or the domain.
  pub title: String,
  /// Capture start in Unix milliseconds.
  pub timestamp: i64,
  /// Human readable local time of the capture.
  #[serde(default)]
  pub formatted_date: String,
  /// Entries in the resolution index.
  #[serde(default)]
  pub total_assets: usize,
  /// Pages saved.
  #[serde(default)]
  pub total_pages: usize,
}

impl ArchiveMetadata {
  /// Build the metadata, falling back to `domain` when the page had no title.
  pub fn new(
    id: impl Into<String>,
    original_url: impl Into<String>,
    title: &str,
    domain: &str,
    timestamp: i64,
    total_assets: usize,
    total_pages: usize,
  ) -> Self {
    let title = title.trim();
    Self {
      id: id.into(),
      original_url: original_url.into(),
      title: if title.is_empty() { domain } else { title }.to_string(),
      timestamp,
      formatted_date: format_timestamp(timestamp),
      total_assets,
      total_pages,
    }
  }

  /// Write pretty JSON to `path`.
  pub fn save(&self, path: &Path) -> Result<(), CaptureError> {
    let json = serde_json::to_string_pretty(self).map_err(|err| CaptureError::json(path, err))?;
    fs::write(path, json).map_err(|err| CaptureError::io(path, err))
  }

  /// Read metadata from `path`.
  pub fn load(path: &Path) -> Result<Self, CaptureError> {
    let text = fs::read_to_string(path).map_err(|err| CaptureError::io(path, err))?;
    serde_json::from_str(&text).map_err(|err| CaptureError::json(path, err))
  }
}

/// Local time rendering such as `Mar 4, 2025, 09:15 AM`.
pub fn format_timestamp(timestamp_millis: i64) -> String {
  Local
    .timestamp_millis_opt(timestamp_millis)
    .single()
    .map(|date| date.format(DATE_FORMAT).to_string())
    .unwrap_or_default()
}
