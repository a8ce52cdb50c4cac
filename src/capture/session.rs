//! Breadth-first capture of a site into a fresh archive.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, error, info, warn};
use url::Url;

use super::links::LinkFilter;
use super::provider::{PageProvider, ResourceEvent};
use crate::archive::{ArchiveBundle, ArchiveMetadata, SavedPage};
use crate::asset_paths::{local_page_name, strip_fragment};
use crate::config::{ArchiveLayout, ArchiverConfig};
use crate::error::{CaptureError, ProviderError};
use crate::rewrite::StaticRewriter;
use crate::store::{AssetKind, ContentStore, StoreOutcome};

/// Knobs of a single capture run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
  /// Link depth followed from the start page.
  pub max_depth: usize,
  /// Navigation budget per page.
  pub timeout: Duration,
  /// Anchor extensions never crawled as pages.
  pub skip_link_extensions: Vec<String>,
  /// Index file name inside the archive.
  pub index_file: String,
  /// Metadata file name inside the archive.
  pub metadata_file: String,
}

impl From<&ArchiverConfig> for CaptureOptions {
  fn from(config: &ArchiverConfig) -> Self {
    Self {
      max_depth: config.max_depth,
      timeout: config.navigation_timeout(),
      skip_link_extensions: config.skip_link_extensions.clone(),
      index_file: config.index_file.clone(),
      metadata_file: config.metadata_file.clone(),
    }
  }
}

impl CaptureOptions {
  fn layout(&self) -> ArchiveLayout<'_> {
    ArchiveLayout {
      index_file: &self.index_file,
      metadata_file: &self.metadata_file,
    }
  }
}

/// Outcome of a completed capture.
#[derive(Debug, Clone)]
pub struct CaptureSummary {
  /// Archive directory.
  pub archive_dir: PathBuf,
  /// Metadata written to the archive.
  pub metadata: ArchiveMetadata,
  /// Pages abandoned after a timeout or navigation failure.
  pub skipped_pages: Vec<String>,
}

#[derive(Debug)]
struct QueueItem {
  url: String,
  depth: usize,
}

/// Capture context: page queue, visited set, content store and archive bundle.
#[derive(Debug)]
pub struct CaptureSession {
  bundle: ArchiveBundle,
  store: ContentStore,
  links: LinkFilter,
  options: CaptureOptions,
  queue: VecDeque<QueueItem>,
  visited: HashSet<String>,
  pages: Vec<SavedPage>,
  skipped: Vec<String>,
  title: String,
}

impl CaptureSession {
  /// Create the archive directory for `start_url` and seed the queue with it.
  pub fn start(
    archives_dir: &Path,
    start_url: &str,
    options: CaptureOptions,
  ) -> Result<Self, CaptureError> {
    Self::from_bundle(ArchiveBundle::create(archives_dir, start_url)?, options)
  }

  /// Resume from an already created bundle.
  pub fn from_bundle(bundle: ArchiveBundle, options: CaptureOptions) -> Result<Self, CaptureError> {
    let store = ContentStore::create(bundle.root())?;
    let links = LinkFilter::new(bundle.base_domain(), &options.skip_link_extensions)
      .map_err(|err| CaptureError::InvalidStartUrl(format!("{}: {err}", bundle.original_url())))?;
    let mut queue = VecDeque::new();
    queue.push_back(QueueItem {
      url: bundle.original_url().to_string(),
      depth: 0,
    });

    Ok(Self {
      bundle,
      store,
      links,
      options,
      queue,
      visited: HashSet::new(),
      pages: Vec::new(),
      skipped: Vec::new(),
      title: String::new(),
    })
  }

  /// Archive being written.
  pub fn bundle(&self) -> &ArchiveBundle {
    &self.bundle
  }

  /// Crawl until the queue is empty, then finalize the archive.
  ///
  /// A fatal provider error stops the crawl; the archive is still finalized with what
  /// was captured so far before the error is returned.
  pub fn run(mut self, provider: &mut dyn PageProvider) -> Result<CaptureSummary, CaptureError> {
    info!(
      start = %self.bundle.original_url(),
      max_depth = self.options.max_depth,
      "starting capture"
    );

    let mut fatal = None;
    while let Some(item) = self.queue.pop_front() {
      if let Err(err) = self.capture_page(provider, item) {
        match err {
          CaptureError::Timeout { url, timeout } => {
            warn!(%url, ?timeout, "navigation timed out, page skipped");
            self.skipped.push(url);
          }
          CaptureError::Provider(ProviderError::Navigation { url, reason }) => {
            warn!(%url, %reason, "navigation failed, page skipped");
            self.skipped.push(url);
          }
          other => {
            error!(error = %other, "capture aborted");
            fatal = Some(other);
            break;
          }
        }
      }
    }

    let metadata = self.bundle.finalize(
      self.options.layout(),
      self.store.index(),
      &self.pages,
      &self.title,
    )?;
    if let Some(err) = fatal {
      return Err(err);
    }

    Ok(CaptureSummary {
      archive_dir: self.bundle.root().to_path_buf(),
      metadata,
      skipped_pages: self.skipped,
    })
  }

  fn capture_page(
    &mut self,
    provider: &mut dyn PageProvider,
    item: QueueItem,
  ) -> Result<(), CaptureError> {
    let url = page_key(&item.url);
    if !self.visited.insert(url.clone()) {
      return Ok(());
    }
    let Some(file_name) = local_page_name(&url, self.bundle.base_domain()) else {
      debug!(%url, "cross-domain page not captured");
      return Ok(());
    };
    info!(depth = item.depth, %url, page = %file_name, "archiving page");

    let store = &mut self.store;
    let mut store_failure = None;
    let navigation = provider.navigate(&url, self.options.timeout, &mut |event| {
      if let Err(err) = store_event(store, event) {
        warn!(error = %err, "failed to store captured resource");
        if store_failure.is_none() {
          store_failure = Some(err);
        }
      }
    });
    let page = match navigation {
      Ok(page) => page,
      Err(ProviderError::Timeout { url, timeout }) => {
        return Err(CaptureError::Timeout { url, timeout });
      }
      Err(other) => return Err(other.into()),
    };
    if let Some(err) = store_failure {
      return Err(err);
    }

    if self.pages.is_empty() {
      self.title = page.title.clone();
    }

    if item.depth < self.options.max_depth {
      let mut queued = 0;
      for link in &page.links {
        let Some(next) = self.links.accept(link, &url) else {
          continue;
        };
        if self.visited.contains(&next) {
          continue;
        }
        self.queue.push_back(QueueItem {
          url: next,
          depth: item.depth + 1,
        });
        queued += 1;
      }
      debug!(queued, remaining = self.queue.len(), "queued discovered links");
    }

    let rewriter = StaticRewriter::new(self.store.index(), &url, self.bundle.base_domain());
    let (markup, report) = rewriter.rewrite_markup(&page.markup);
    debug!(assets = report.assets, links = report.links, "rewrote page");
    self.bundle.write_page(&file_name, &markup)?;
    self.pages.push(SavedPage {
      file_name,
      source_url: url,
    });
    Ok(())
  }
}

/// Visited-set key of a queued page: the parsed URL without its fragment.
fn page_key(url: &str) -> String {
  match Url::parse(url) {
    Ok(mut parsed) => {
      parsed.set_fragment(None);
      parsed.into()
    }
    Err(_) => strip_fragment(url).to_string(),
  }
}

/// Admit, classify and persist one observed response.
///
/// Response URLs come from the network, not from markup, so they are only parsed and
/// stripped of their fragment; entity escapes are kept as requested.
fn store_event(store: &mut ContentStore, event: ResourceEvent) -> Result<(), CaptureError> {
  if !event.is_archivable() {
    return Ok(());
  }
  let kind = AssetKind::classify(&event.resource_type, &event.content_type);
  if kind == AssetKind::Other {
    return Ok(());
  }
  let Ok(mut parsed) = Url::parse(&event.url) else {
    return Ok(());
  };
  parsed.set_fragment(None);
  let canonical = String::from(parsed);
  if let StoreOutcome::Duplicate(existing) = store.store(&canonical, &event.body, kind)? {
    debug!(url = %canonical, path = %existing, "kept first captured payload");
  }
  Ok(())
}
