//! `url(...)` rewriting inside stylesheet text.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use super::StaticRewriter;

fn css_url_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]*))\s*\)"#)
      .expect("invalid css url regex")
  })
}

impl StaticRewriter<'_> {
  /// Rewrite every `url(...)` occurrence whose target is in the index.
  ///
  /// Quotes and surrounding whitespace are kept; unmatched occurrences are left intact.
  pub fn rewrite_css<'t>(&self, text: &'t str) -> Cow<'t, str> {
    if !text.to_ascii_lowercase().contains("url(") {
      return Cow::Borrowed(text);
    }

    css_url_pattern().replace_all(text, |caps: &Captures| {
      let whole = caps.get(0).map_or("", |m| m.as_str());
      let Some(value) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
        return whole.to_string();
      };
      match self.rewrite_asset(value.as_str()) {
        Some(local) => {
          let start = value.start() - caps.get(0).map_or(0, |m| m.start());
          let end = start + value.as_str().len();
          format!("{}{}{}", &whole[..start], local, &whole[end..])
        }
        None => whole.to_string(),
      }
    })
  }
}
