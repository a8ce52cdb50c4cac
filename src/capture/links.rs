//! Selection of same-site anchors worth crawling.

use regex::Regex;
use url::Url;

/// Filters discovered anchors down to crawlable pages of one host.
#[derive(Debug, Clone)]
pub struct LinkFilter {
  base_domain: String,
  skip_extensions: Option<Regex>,
}

impl LinkFilter {
  /// Filter for `base_domain` that skips URLs ending in any of `skip_extensions`.
  pub fn new(base_domain: impl Into<String>, skip_extensions: &[String]) -> Result<Self, regex::Error> {
    let skip_extensions = if skip_extensions.is_empty() {
      None
    } else {
      let alternatives: Vec<String> = skip_extensions
        .iter()
        .map(|extension| regex::escape(extension.trim_start_matches('.')))
        .collect();
      Some(Regex::new(&format!(r"(?i)\.({})$", alternatives.join("|")))?)
    };
    Ok(Self {
      base_domain: base_domain.into(),
      skip_extensions,
    })
  }

  /// Absolute, fragment-free URL of `link` when it should be crawled.
  pub fn accept(&self, link: &str, page_url: &str) -> Option<String> {
    let base = Url::parse(page_url).ok()?;
    let mut absolute = base.join(link.trim()).ok()?;
    if !matches!(absolute.scheme(), "http" | "https") {
      return None;
    }
    if absolute.host_str() != Some(self.base_domain.as_str()) {
      return None;
    }
    absolute.set_fragment(None);
    let absolute: String = absolute.into();
    if self
      .skip_extensions
      .as_ref()
      .is_some_and(|pattern| pattern.is_match(&absolute))
    {
      return None;
    }
    Some(absolute)
  }
}
