//! Capture-time rewriting of markup so a saved page works without network access.
//!
//! Resource attributes go through the tiered matcher with the static profile;
//! hyperlinks are renamed with the page-naming function instead.

mod css;
mod html;
mod srcset;

pub use html::RewriteReport;

use crate::asset_paths::{
  canonicalize, is_rewritable_hyperlink, local_page_name, should_ignore_asset_reference,
};
use crate::resolver::{ResolutionIndex, TierProfile, resolve};

/// Rewrites one captured page against the index built during capture.
#[derive(Debug, Clone, Copy)]
pub struct StaticRewriter<'a> {
  index: &'a ResolutionIndex,
  page_url: &'a str,
  base_domain: &'a str,
}

impl<'a> StaticRewriter<'a> {
  /// Create a rewriter for the page captured from `page_url`.
  pub fn new(index: &'a ResolutionIndex, page_url: &'a str, base_domain: &'a str) -> Self {
    Self {
      index,
      page_url,
      base_domain,
    }
  }

  /// Local path for a resource reference, or `None` to leave it as authored.
  pub fn rewrite_asset(&self, value: &str) -> Option<String> {
    if should_ignore_asset_reference(value) {
      return None;
    }
    resolve(value.trim(), self.index, self.page_url, TierProfile::STATIC_REWRITE)
      .map(str::to_string)
  }

  /// Local page name for a same-domain hyperlink, or `None` to leave it as authored.
  pub fn rewrite_hyperlink(&self, href: &str) -> Option<String> {
    if !is_rewritable_hyperlink(href) {
      return None;
    }
    let absolute = canonicalize(href, self.page_url).ok()?;
    local_page_name(&absolute, self.base_domain)
  }
}
