use std::borrow::Cow;

use url::Url;

use crate::error::ResolveError;

const UNRESOLVABLE_SCHEMES: [&str; 3] = ["javascript:", "mailto:", "data:"];

/// Turn a raw resource reference into its canonical absolute form.
///
/// Entity-escaped ampersands (`&amp;`) are unescaped before the reference is resolved
/// against `base_url`, because markup attributes may carry escaped query strings. The
/// fragment is dropped; percent-escapes are kept as they are so that keys stay stable.
pub fn canonicalize(reference: &str, base_url: &str) -> Result<String, ResolveError> {
  let trimmed = reference.trim();
  if trimmed.is_empty() || has_unresolvable_scheme(trimmed) {
    return Err(ResolveError::unresolvable(reference));
  }

  let unescaped = trimmed.replace("&amp;", "&");
  let base = Url::parse(base_url).map_err(|_| ResolveError::unresolvable(reference))?;
  let mut resolved = base
    .join(&unescaped)
    .map_err(|_| ResolveError::unresolvable(reference))?;
  resolved.set_fragment(None);

  Ok(resolved.into())
}

/// Returns `true` for schemes that never name a capturable resource.
pub fn has_unresolvable_scheme(reference: &str) -> bool {
  let head = reference.trim_start();
  UNRESOLVABLE_SCHEMES.iter().any(|scheme| {
    head
      .get(..scheme.len())
      .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
  })
}

/// Everything before the first `?`.
pub fn strip_query(value: &str) -> &str {
  value.split_once('?').map_or(value, |(head, _)| head)
}

/// Everything before the first `#`.
pub fn strip_fragment(value: &str) -> &str {
  value.split_once('#').map_or(value, |(head, _)| head)
}

/// Percent-decode a full URL string the way `decodeURIComponent` does.
///
/// Input holding a malformed escape, or decoding to invalid UTF-8, is returned
/// unchanged; the injected runtime mirrors this by catching `URIError`.
pub fn percent_decode(value: &str) -> Cow<'_, str> {
  if !value.contains('%') || has_malformed_escape(value) {
    return Cow::Borrowed(value);
  }
  urlencoding::decode(value).unwrap_or(Cow::Borrowed(value))
}

fn has_malformed_escape(value: &str) -> bool {
  let bytes = value.as_bytes();
  let mut index = 0;
  while index < bytes.len() {
    if bytes[index] == b'%' {
      let valid = bytes.len() > index + 2
        && bytes[index + 1].is_ascii_hexdigit()
        && bytes[index + 2].is_ascii_hexdigit();
      if !valid {
        return true;
      }
      index += 3;
    } else {
      index += 1;
    }
  }
  false
}
