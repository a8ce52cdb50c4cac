//! Boundary between the capture engine and whatever renders pages.

use std::time::Duration;

use crate::error::ProviderError;

/// A network response observed while a page was loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEvent {
  /// Absolute URL of the response.
  pub url: String,
  /// Request method.
  pub method: String,
  /// HTTP status code.
  pub status: u16,
  /// `Content-Type` header, empty when absent.
  pub content_type: String,
  /// Browser resource type hint (`stylesheet`, `script`, `image`, `fetch`, ...).
  pub resource_type: String,
  /// Response body.
  pub body: Vec<u8>,
}

impl ResourceEvent {
  /// Whether the response is eligible for storage at all.
  ///
  /// Redirects and errors, inline `data:` URLs and CORS preflights are never archived.
  pub fn is_archivable(&self) -> bool {
    self.status < 300
      && !self
        .url
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
      && !self.method.eq_ignore_ascii_case("OPTIONS")
  }
}

/// Final state of a rendered page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedPage {
  /// Serialized DOM after the page settled.
  pub markup: String,
  /// Document title.
  pub title: String,
  /// `href` values of every anchor, as resolved by the renderer.
  pub links: Vec<String>,
}

/// Something that can load a page and report the resources it fetched.
pub trait PageProvider {
  /// Load `url`, pushing every observed response into `sink` before returning the page.
  fn navigate(
    &mut self,
    url: &str,
    timeout: Duration,
    sink: &mut dyn FnMut(ResourceEvent),
  ) -> Result<CapturedPage, ProviderError>;
}
