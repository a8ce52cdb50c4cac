//! [`PageProvider`] replaying a HAR 1.2 recording.
//!
//! Every entry sharing the document's `pageref` is reported as a resource of that page,
//! so a capture can run against a recording made by any browser's devtools.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::provider::{CapturedPage, PageProvider, ResourceEvent};
use crate::asset_paths::strip_fragment;
use crate::error::{CaptureError, ProviderError};

#[derive(Debug, Deserialize)]
struct HarFile {
  log: HarLog,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HarLog {
  pages: Vec<HarPage>,
  entries: Vec<HarEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HarPage {
  id: String,
  title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HarEntry {
  pageref: Option<String>,
  time: f64,
  #[serde(rename = "_resourceType")]
  resource_type: String,
  request: HarRequest,
  response: HarResponse,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HarRequest {
  method: String,
  url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HarResponse {
  status: u16,
  headers: Vec<HarHeader>,
  content: HarContent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HarHeader {
  name: String,
  value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HarContent {
  mime_type: String,
  text: Option<String>,
  encoding: Option<String>,
}

impl HarEntry {
  fn content_type(&self) -> &str {
    self
      .response
      .headers
      .iter()
      .find(|header| header.name.eq_ignore_ascii_case("content-type"))
      .map(|header| header.value.as_str())
      .unwrap_or(&self.response.content.mime_type)
  }

  fn is_document(&self) -> bool {
    self.resource_type.eq_ignore_ascii_case("document")
      || (self.resource_type.is_empty() && self.content_type().contains("text/html"))
  }

  fn body(&self) -> Result<Vec<u8>, base64::DecodeError> {
    let Some(text) = self.response.content.text.as_deref() else {
      return Ok(Vec::new());
    };
    match self.response.content.encoding.as_deref() {
      Some(encoding) if encoding.eq_ignore_ascii_case("base64") => {
        general_purpose::STANDARD.decode(text.trim())
      }
      _ => Ok(text.as_bytes().to_vec()),
    }
  }

  fn to_event(&self) -> Option<ResourceEvent> {
    let body = match self.body() {
      Ok(body) => body,
      Err(err) => {
        warn!(url = %self.request.url, error = %err, "undecodable HAR body skipped");
        return None;
      }
    };
    Some(ResourceEvent {
      url: self.request.url.clone(),
      method: self.request.method.clone(),
      status: self.response.status,
      content_type: self.content_type().to_string(),
      resource_type: self.resource_type.clone(),
      body,
    })
  }
}

/// Serves pages and their resources out of a HAR recording.
#[derive(Debug)]
pub struct HarProvider {
  log: HarLog,
}

impl HarProvider {
  /// Read and parse a `.har` file.
  pub fn from_path(path: &Path) -> Result<Self, CaptureError> {
    let text = fs::read_to_string(path).map_err(|err| CaptureError::io(path, err))?;
    Self::from_json(&text).map_err(|err| CaptureError::json(path, err))
  }

  /// Parse HAR JSON text.
  pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
    let file: HarFile = serde_json::from_str(text)?;
    debug!(
      pages = file.log.pages.len(),
      entries = file.log.entries.len(),
      "loaded HAR recording"
    );
    Ok(Self { log: file.log })
  }

  fn find_document(&self, url: &str) -> Option<&HarEntry> {
    let wanted = strip_fragment(url);
    self
      .log
      .entries
      .iter()
      .filter(|entry| entry.is_document())
      .find(|entry| same_document(strip_fragment(&entry.request.url), wanted))
  }
}

impl PageProvider for HarProvider {
  fn navigate(
    &mut self,
    url: &str,
    timeout: Duration,
    sink: &mut dyn FnMut(ResourceEvent),
  ) -> Result<CapturedPage, ProviderError> {
    let document = self
      .find_document(url)
      .ok_or_else(|| ProviderError::Navigation {
        url: url.to_string(),
        reason: "no document entry in recording".to_string(),
      })?;

    if document.time.is_finite() && Duration::from_secs_f64(document.time.max(0.0) / 1000.0) > timeout {
      return Err(ProviderError::Timeout {
        url: url.to_string(),
        timeout,
      });
    }
    if document.response.status >= 400 {
      return Err(ProviderError::Navigation {
        url: url.to_string(),
        reason: format!("HTTP status {}", document.response.status),
      });
    }

    let markup = document
      .body()
      .ok()
      .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
      .unwrap_or_default();

    if let Some(pageref) = document.pageref.as_deref() {
      for entry in &self.log.entries {
        if std::ptr::eq(entry, document) || entry.pageref.as_deref() != Some(pageref) {
          continue;
        }
        if let Some(event) = entry.to_event() {
          sink(event);
        }
      }
    }

    let title = document
      .pageref
      .as_deref()
      .and_then(|pageref| self.log.pages.iter().find(|page| page.id == pageref))
      .map(|page| page.title.trim().to_string())
      .filter(|title| !title.is_empty() && !title.starts_with("http"))
      .or_else(|| extract_title(&markup))
      .unwrap_or_default();
    let links = extract_links(&markup, &document.request.url);

    Ok(CapturedPage {
      markup,
      title,
      links,
    })
  }
}

fn same_document(recorded: &str, wanted: &str) -> bool {
  match (Url::parse(recorded), Url::parse(wanted)) {
    (Ok(recorded), Ok(wanted)) => recorded == wanted,
    _ => recorded == wanted,
  }
}

fn title_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("invalid title regex"))
}

fn anchor_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"(?i)<a\s[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
      .expect("invalid anchor regex")
  })
}

fn extract_title(markup: &str) -> Option<String> {
  title_pattern()
    .captures(markup)
    .and_then(|caps| caps.get(1))
    .map(|title| title.as_str().trim().to_string())
    .filter(|title| !title.is_empty())
}

/// Resolve every anchor of `markup` against `page_url`, the way a browser reports
/// `a.href`.
fn extract_links(markup: &str, page_url: &str) -> Vec<String> {
  let Ok(base) = Url::parse(page_url) else {
    return Vec::new();
  };
  anchor_pattern()
    .captures_iter(markup)
    .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
    .filter_map(|href| base.join(&href.as_str().replace("&amp;", "&")).ok())
    .map(String::from)
    .collect()
}
