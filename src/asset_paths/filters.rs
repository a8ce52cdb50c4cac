use regex::Regex;

use super::canonical::has_unresolvable_scheme;

/// Archive-relative prefix shared by every stored asset path.
pub const LOCAL_ASSET_PREFIX: &str = "assets/";

fn asset_reference_ignores() -> &'static [Regex] {
  use std::sync::OnceLock;

  static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
  PATTERNS
    .get_or_init(|| {
      vec![
        Regex::new(r"(?i)^data:").expect("invalid data URI regex"),
        Regex::new(r"^#").expect("invalid fragment regex"),
      ]
    })
    .as_slice()
}

/// Determine whether a resource attribute value must be left exactly as authored.
///
/// Inline data URIs and fragment-only references never correspond to a captured
/// resource, so the rewriter skips them without consulting the index.
pub fn should_ignore_asset_reference(value: &str) -> bool {
  value.trim().is_empty()
    || asset_reference_ignores()
      .iter()
      .any(|pattern| pattern.is_match(value))
}

/// Determine whether an `a[href]` value is a navigable hyperlink worth renaming.
pub fn is_rewritable_hyperlink(value: &str) -> bool {
  let trimmed = value.trim();
  !trimmed.is_empty() && !trimmed.starts_with('#') && !has_unresolvable_scheme(trimmed)
}

/// Returns `true` once a value already points into the archive.
pub fn is_local_asset_path(value: &str) -> bool {
  value.starts_with(LOCAL_ASSET_PREFIX)
}
