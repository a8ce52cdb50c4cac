//! Placement of the runtime script inside a saved page.

use std::sync::OnceLock;

use regex::Regex;

/// Attribute marking an already injected runtime script.
pub const INTERCEPTOR_MARKER: &str = "data-offline-interceptor";

fn head_open_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").expect("invalid head regex"))
}

/// Insert `script` right after the opening `<head>` tag, or in front of the document
/// when it has no head. Pages that already carry the runtime are returned unchanged.
pub fn inject_interceptor(markup: &str, script: &str) -> String {
  if markup.contains(INTERCEPTOR_MARKER) {
    return markup.to_string();
  }
  match head_open_pattern().find(markup) {
    Some(head) => {
      let mut output = String::with_capacity(markup.len() + script.len());
      output.push_str(&markup[..head.end()]);
      output.push_str(script);
      output.push_str(&markup[head.end()..]);
      output
    }
    None => format!("{script}{markup}"),
  }
}
