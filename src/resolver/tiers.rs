//! The ordered fallback algorithm resolving a requested reference against the index.
//!
//! The injected runtime script carries a line-for-line port of [`resolve`]; both must
//! give the same answer for the same inputs.

use super::index::ResolutionIndex;
use crate::asset_paths::{canonicalize, percent_decode, strip_fragment, strip_query};

/// Gateway path segment of dynamically resized framework images.
const DYNAMIC_IMAGE_PATH: &str = "/_next/image";
/// Query parameter carrying the source of a proxied image.
const DYNAMIC_IMAGE_PARAM: &str = "?url=";

/// A single matching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
  /// Canonicalize the reference and look it up directly.
  Exact,
  /// Compare percent-decoded forms of the reference and every key.
  Decoded,
  /// Compare both sides with the query string removed.
  QueryStripped,
  /// Find a key whose query-stripped form ends with the query-stripped reference.
  PathSuffix,
}

/// Ordered set of tiers used by one execution environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierProfile(&'static [Tier]);

impl TierProfile {
  /// Capture-time rewriting, where the full canonical form is always available.
  pub const STATIC_REWRITE: Self = Self(&[Tier::Exact, Tier::Decoded, Tier::QueryStripped]);
  /// Fetch/XHR and DOM repair inside a replayed page.
  pub const RUNTIME: Self = Self(&[Tier::Exact, Tier::Decoded, Tier::PathSuffix]);
  /// Last-resort lookup performed by the replay server.
  pub const REPLAY_FALLBACK: Self = Self(&[Tier::Exact, Tier::PathSuffix]);

  /// Tiers in evaluation order.
  pub fn tiers(&self) -> &'static [Tier] {
    self.0
  }
}

/// A successful resolution and the tier that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution<'a> {
  /// Archive-relative path of the matched resource.
  pub local_path: &'a str,
  /// Tier that matched first.
  pub tier: Tier,
}

/// Resolve `reference` against the index, returning the local path of the first tier
/// that matches.
///
/// `None` means no tier matched; callers leave the reference untouched.
pub fn resolve<'a>(
  reference: &str,
  index: &'a ResolutionIndex,
  page_url: &str,
  profile: TierProfile,
) -> Option<&'a str> {
  resolve_with_tier(reference, index, page_url, profile).map(|resolution| resolution.local_path)
}

/// Same as [`resolve`], also reporting which tier matched.
pub fn resolve_with_tier<'a>(
  reference: &str,
  index: &'a ResolutionIndex,
  page_url: &str,
  profile: TierProfile,
) -> Option<Resolution<'a>> {
  let canonical = canonicalize(reference, page_url).ok();

  profile.tiers().iter().find_map(|&tier| {
    let local_path = match tier {
      Tier::Exact => canonical.as_deref().and_then(|key| index.get(key)),
      Tier::Decoded => canonical
        .as_deref()
        .and_then(|key| match_decoded(key, index)),
      Tier::QueryStripped => canonical
        .as_deref()
        .filter(|key| !is_dynamic_image(key))
        .and_then(|key| match_query_stripped(key, index)),
      Tier::PathSuffix => match_path_suffix(reference, index),
    }?;
    Some(Resolution { local_path, tier })
  })
}

/// Whether the query-stripped tier is disabled for this reference.
///
/// Dynamic image gateways are parameterized per asset; dropping their query would
/// collapse distinct images onto one entry.
pub fn is_dynamic_image(reference: &str) -> bool {
  reference.contains(DYNAMIC_IMAGE_PATH) || reference.contains(DYNAMIC_IMAGE_PARAM)
}

fn match_decoded<'a>(canonical: &str, index: &'a ResolutionIndex) -> Option<&'a str> {
  let decoded = percent_decode(canonical);
  index
    .iter()
    .find(|(key, _)| percent_decode(key) == decoded)
    .map(|(_, value)| value)
}

fn match_query_stripped<'a>(canonical: &str, index: &'a ResolutionIndex) -> Option<&'a str> {
  let stripped = strip_query(canonical);
  index
    .iter()
    .find(|(key, _)| strip_query(key) == stripped)
    .map(|(_, value)| value)
}

fn match_path_suffix<'a>(reference: &str, index: &'a ResolutionIndex) -> Option<&'a str> {
  let needle = strip_query(strip_fragment(reference.trim()));
  if needle.is_empty() || needle == "/" {
    return None;
  }
  index
    .iter()
    .find(|(key, _)| strip_query(key).ends_with(needle))
    .map(|(_, value)| value)
}
