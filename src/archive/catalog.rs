//! Listing of the archives stored below the archives directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::metadata::ArchiveMetadata;
use crate::config::ArchiveLayout;
use crate::error::ArchiveError;

const UNKNOWN_DATE: &str = "Unknown Date";

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSummary {
  /// Directory name.
  pub id: String,
  /// Metadata title, or the id when metadata is missing.
  pub title: String,
  /// Start URL, empty when unknown.
  pub original_url: String,
  /// Formatted capture date.
  pub formatted_date: String,
  /// Capture start in Unix milliseconds, parsed from the directory name.
  pub timestamp: i64,
  /// Pages saved.
  pub total_pages: usize,
  /// Assets indexed.
  pub total_assets: usize,
}

impl ArchiveSummary {
  fn read(archive_dir: &Path, id: String, layout: ArchiveLayout<'_>) -> Self {
    let timestamp = timestamp_of(&id);
    match ArchiveMetadata::load(&archive_dir.join(layout.metadata_file)) {
      Ok(metadata) => Self {
        title: if metadata.title.is_empty() {
          id.clone()
        } else {
          metadata.title
        },
        original_url: metadata.original_url,
        formatted_date: if metadata.formatted_date.is_empty() {
          UNKNOWN_DATE.to_string()
        } else {
          metadata.formatted_date
        },
        timestamp,
        total_pages: metadata.total_pages,
        total_assets: metadata.total_assets,
        id,
      },
      Err(err) => {
        debug!(archive = %id, error = %err, "archive without readable metadata");
        Self {
          title: id.clone(),
          original_url: String::new(),
          formatted_date: UNKNOWN_DATE.to_string(),
          timestamp,
          total_pages: 0,
          total_assets: 0,
          id,
        }
      }
    }
  }
}

/// Every archive directory, newest first.
pub fn list_archives(
  archives_dir: &Path,
  layout: ArchiveLayout<'_>,
) -> Result<Vec<ArchiveSummary>, ArchiveError> {
  let entries = match fs::read_dir(archives_dir) {
    Ok(entries) => entries,
    Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
    Err(err) => return Err(ArchiveError::io(archives_dir, err)),
  };

  let mut archives = Vec::new();
  for entry in entries {
    let entry = entry.map_err(|err| ArchiveError::io(archives_dir, err))?;
    if !entry.path().is_dir() {
      continue;
    }
    let Ok(id) = entry.file_name().into_string() else {
      continue;
    };
    archives.push(ArchiveSummary::read(&entry.path(), id, layout));
  }

  archives.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
  Ok(archives)
}

/// Directory of archive `id`, refusing ids that would leave `archives_dir`.
pub fn archive_dir(archives_dir: &Path, id: &str) -> Result<PathBuf, ArchiveError> {
  if !is_valid_archive_id(id) {
    return Err(ArchiveError::InvalidId(id.to_string()));
  }
  let dir = archives_dir.join(id);
  if dir.is_dir() {
    Ok(dir)
  } else {
    Err(ArchiveError::NotFound(id.to_string()))
  }
}

/// A single path component that is neither `.` nor `..`.
pub fn is_valid_archive_id(id: &str) -> bool {
  !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\', '\0'])
}

fn timestamp_of(id: &str) -> i64 {
  id.rsplit('_')
    .next()
    .and_then(|tail| tail.parse().ok())
    .unwrap_or(0)
}
