use url::Url;

use super::bundle::short_digest;

/// File name of the captured start page.
pub const INDEX_PAGE: &str = "index.html";

/// Map an absolute same-domain page URL onto its local HTML file name.
///
/// Pages are identified by pathname only. Query variants of the same pathname are
/// told apart by a four character digest of the query string. Returns `None` for
/// URLs on another host or URLs that do not parse.
pub fn local_page_name(page_url: &str, base_domain: &str) -> Option<String> {
  let parsed = Url::parse(page_url).ok()?;
  if parsed.host_str() != Some(base_domain) {
    return None;
  }

  let trimmed = parsed.path().trim_matches('/');
  if trimmed.is_empty() {
    return Some(INDEX_PAGE.to_string());
  }

  let mut name: String = trimmed
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || c == '-' {
        c
      } else {
        '_'
      }
    })
    .collect();
  if !name.ends_with(".html") {
    name.push_str(".html");
  }

  if let Some(query) = parsed.query().filter(|query| !query.is_empty()) {
    let search = format!("?{query}");
    let stem = &name[..name.len() - ".html".len()];
    name = format!("{stem}_{}.html", short_digest(&search, 4));
  }

  Some(name)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn root_path_maps_to_index() {
    assert_eq!(local_page_name("https://ex.com/", "ex.com").as_deref(), Some("index.html"));
    assert_eq!(local_page_name("https://ex.com", "ex.com").as_deref(), Some("index.html"));
  }

  #[test]
  fn flattens_nested_paths() {
    assert_eq!(
      local_page_name("https://ex.com/docs/getting-started/", "ex.com").as_deref(),
      Some("docs_getting-started.html")
    );
  }

  #[test]
  fn html_extension_is_not_doubled() {
    // `.` is replaced before the suffix check, so only a literal `html` tail survives.
    assert_eq!(
      local_page_name("https://ex.com/about.html", "ex.com").as_deref(),
      Some("about_html.html")
    );
  }

  #[test]
  fn query_variants_get_a_digest() {
    let name = local_page_name("https://ex.com/blog/post-1?ref=home", "ex.com").unwrap();
    assert!(name.starts_with("blog_post-1_"));
    assert!(name.ends_with(".html"));
    let digest = &name["blog_post-1_".len()..name.len() - ".html".len()];
    assert_eq!(digest.len(), 4);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));

    let other = local_page_name("https://ex.com/blog/post-1?ref=feed", "ex.com").unwrap();
    assert_ne!(name, other);
  }

  #[test]
  fn fragments_do_not_change_the_name() {
    assert_eq!(
      local_page_name("https://ex.com/pricing#plans", "ex.com"),
      local_page_name("https://ex.com/pricing", "ex.com")
    );
  }

  #[test]
  fn other_hosts_are_not_renamed() {
    assert_eq!(local_page_name("https://other.com/about", "ex.com"), None);
    assert_eq!(local_page_name("not a url", "ex.com"), None);
  }
}
