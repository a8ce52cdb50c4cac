//! Error taxonomy shared by the capture, rewrite and replay stages.
//!
//! Only provider failures are fatal to a capture session. Everything that touches a
//! single reference degrades to "leave the reference unchanged".

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A reference that cannot be turned into a canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
  /// Unsupported scheme, empty input or a malformed URL.
  #[error("unresolvable reference `{reference}`")]
  Unresolvable {
    /// The raw reference as found in markup or requested at runtime.
    reference: String,
  },
}

impl ResolveError {
  pub(crate) fn unresolvable(reference: &str) -> Self {
    Self::Unresolvable {
      reference: reference.to_string(),
    }
  }
}

/// Failures raised by a [`crate::capture::PageProvider`].
#[derive(Debug, Error)]
pub enum ProviderError {
  /// Navigation exceeded its time budget.
  #[error("navigation to {url} exceeded {timeout:?}")]
  Timeout {
    /// Page being navigated.
    url: String,
    /// Budget that was exceeded.
    timeout: Duration,
  },
  /// The page could not be loaded; the session moves on to the next page.
  #[error("failed to navigate to {url}: {reason}")]
  Navigation {
    /// Page being navigated.
    url: String,
    /// Provider supplied description.
    reason: String,
  },
  /// The provider itself is gone; the session is aborted.
  #[error("page provider failed: {0}")]
  Fatal(String),
}

/// Errors raised while capturing or finalizing an archive.
#[derive(Debug, Error)]
pub enum CaptureError {
  /// The page navigation exceeded its budget and the page was abandoned.
  #[error("capture of {url} timed out after {timeout:?}")]
  Timeout {
    /// Abandoned page.
    url: String,
    /// Budget that was exceeded.
    timeout: Duration,
  },
  /// Total provider failure.
  #[error(transparent)]
  Provider(#[from] ProviderError),
  /// Filesystem access failed.
  #[error("i/o error at {}: {source}", .path.display())]
  Io {
    /// Path that caused the error.
    path: PathBuf,
    /// Source I/O error.
    #[source]
    source: std::io::Error,
  },
  /// A persisted JSON document could not be encoded or decoded.
  #[error("invalid JSON document at {}: {source}", .path.display())]
  Json {
    /// Path that caused the error.
    path: PathBuf,
    /// Source parse error.
    #[source]
    source: serde_json::Error,
  },
  /// The start URL of a capture is not an absolute http(s) URL.
  #[error("invalid start URL `{0}`")]
  InvalidStartUrl(String),
}

impl CaptureError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }

  pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
    Self::Json {
      path: path.into(),
      source,
    }
  }
}

/// Errors raised while listing, exporting or serving stored archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
  /// No archive directory with this id exists.
  #[error("archive `{0}` not found")]
  NotFound(String),
  /// The id would escape the archives directory.
  #[error("invalid archive id `{0}`")]
  InvalidId(String),
  /// Filesystem access failed.
  #[error("i/o error at {}: {source}", .path.display())]
  Io {
    /// Path that caused the error.
    path: PathBuf,
    /// Source I/O error.
    #[source]
    source: std::io::Error,
  },
  /// Writing the zip container failed.
  #[error("failed to write zip archive: {0}")]
  Zip(#[from] zip::result::ZipError),
}

impl ArchiveError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }
}
