//! In-place markup rewriting driven by a small start-tag tokenizer.
//!
//! Only attribute values that resolve are replaced; every other byte of the captured
//! markup, including inline framework JSON, is copied through untouched.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use super::StaticRewriter;

const SRC_ELEMENTS: [&str; 6] = ["img", "script", "audio", "video", "iframe", "source"];

/// Counters describing what a rewrite pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteReport {
  /// Resource references replaced with local paths.
  pub assets: usize,
  /// Hyperlinks replaced with local page names.
  pub links: usize,
}

fn start_tag_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(
      r#"\A<([a-zA-Z][a-zA-Z0-9:-]*)((?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?|\s*/)*)\s*>"#,
    )
    .expect("invalid start tag regex")
  })
}

fn attribute_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
      .expect("invalid attribute regex")
  })
}

fn raw_text_end(name: &str) -> &'static Regex {
  static SCRIPT: OnceLock<Regex> = OnceLock::new();
  static STYLE: OnceLock<Regex> = OnceLock::new();
  let (cell, pattern) = if name == "style" {
    (&STYLE, r"(?i)</style[\s>/]")
  } else {
    (&SCRIPT, r"(?i)</script[\s>/]")
  };
  cell.get_or_init(|| Regex::new(pattern).expect("invalid raw text regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
  Double,
  Single,
  Bare,
}

struct Splicer<'h> {
  source: &'h str,
  output: String,
  cursor: usize,
}

impl<'h> Splicer<'h> {
  fn new(source: &'h str) -> Self {
    Self {
      source,
      output: String::with_capacity(source.len()),
      cursor: 0,
    }
  }

  fn replace(&mut self, range: Range<usize>, replacement: &str) {
    self.output.push_str(&self.source[self.cursor..range.start]);
    self.output.push_str(replacement);
    self.cursor = range.end;
  }

  fn finish(mut self) -> String {
    self.output.push_str(&self.source[self.cursor..]);
    self.output
  }
}

impl StaticRewriter<'_> {
  /// Rewrite resource attributes, inline styles and hyperlinks of a captured page.
  pub fn rewrite_markup(&self, markup: &str) -> (String, RewriteReport) {
    let mut splicer = Splicer::new(markup);
    let mut report = RewriteReport::default();
    let mut position = 0;

    while let Some(offset) = markup[position..].find('<') {
      let start = position + offset;
      let rest = &markup[start..];

      if rest.starts_with("<!--") {
        position = rest
          .find("-->")
          .map_or(markup.len(), |end| start + end + "-->".len());
        continue;
      }

      let Some(tag) = start_tag_pattern().captures(rest) else {
        position = start + 1;
        continue;
      };
      let tag_end = start + tag.get(0).map_or(1, |m| m.end());
      let name = tag.get(1).map_or(String::new(), |m| m.as_str().to_ascii_lowercase());

      if let Some(attributes) = tag.get(2) {
        self.rewrite_attributes(
          &name,
          attributes.as_str(),
          start + attributes.start(),
          &mut splicer,
          &mut report,
        );
      }
      position = tag_end;

      if name == "script" || name == "style" {
        let body_end = raw_text_end(&name)
          .find(&markup[tag_end..])
          .map_or(markup.len(), |m| tag_end + m.start());
        if name == "style" {
          let body = &markup[tag_end..body_end];
          let rewritten = self.rewrite_css(body);
          if rewritten != body {
            report.assets += 1;
            splicer.replace(tag_end..body_end, &rewritten);
          }
        }
        position = body_end;
      }
    }

    (splicer.finish(), report)
  }

  fn rewrite_attributes(
    &self,
    element: &str,
    attributes: &str,
    offset: usize,
    splicer: &mut Splicer<'_>,
    report: &mut RewriteReport,
  ) {
    for attribute in attribute_pattern().captures_iter(attributes) {
      let Some(name) = attribute.get(1) else {
        continue;
      };
      let (value, quote) = match (attribute.get(2), attribute.get(3), attribute.get(4)) {
        (Some(value), _, _) => (value, Quote::Double),
        (_, Some(value), _) => (value, Quote::Single),
        (_, _, Some(value)) => (value, Quote::Bare),
        _ => continue,
      };

      let name = name.as_str().to_ascii_lowercase();
      let raw = value.as_str();
      let is_src_element = SRC_ELEMENTS.contains(&element);

      let (replacement, is_link) = match name.as_str() {
        "src" if is_src_element => (self.rewrite_asset(raw), false),
        "srcset" if is_src_element => (self.rewrite_srcset(raw), false),
        "href" if element == "link" => (self.rewrite_asset(raw), false),
        "href" if element == "a" => (self.rewrite_hyperlink(raw), true),
        "style" => {
          let rewritten = self.rewrite_css(raw);
          ((rewritten != raw).then(|| rewritten.into_owned()), false)
        }
        _ => (None, false),
      };

      let Some(replacement) = replacement else {
        continue;
      };
      if is_link {
        report.links += 1;
      } else {
        report.assets += 1;
      }

      let range = offset + value.start()..offset + value.end();
      splicer.replace(range, &quote_value(&replacement, quote));
    }
  }
}

fn quote_value(value: &str, quote: Quote) -> String {
  match quote {
    Quote::Double => value.replace('"', "&quot;"),
    Quote::Single => value.replace('\'', "&#39;"),
    Quote::Bare if value.is_empty() || value.contains(|c: char| c.is_whitespace() || "\"'=<>`".contains(c)) => {
      format!("\"{}\"", value.replace('"', "&quot;"))
    }
    Quote::Bare => value.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use crate::resolver::ResolutionIndex;
  use crate::rewrite::StaticRewriter;

  const PAGE: &str = "https://ex.com/shop/";

  fn index() -> ResolutionIndex {
    [
      ("https://ex.com/img/hero.jpg", "assets/media/hero_1.jpg"),
      ("https://ex.com/img/hero@2x.jpg", "assets/media/hero_2x_2.jpg"),
      ("https://ex.com/css/site.css", "assets/css/site_3.css"),
      ("https://ex.com/js/app.js?v=4", "assets/js/app_4.js"),
      ("https://ex.com/img/bg.png", "assets/media/bg_5.png"),
      ("https://ex.com/api/search?q=a&page=2", "assets/api/data_6.json"),
    ]
    .into_iter()
    .collect()
  }

  fn rewrite(markup: &str) -> String {
    let index = index();
    StaticRewriter::new(&index, PAGE, "ex.com")
      .rewrite_markup(markup)
      .0
  }

  #[test]
  fn rewrites_resource_attributes() {
    let markup = r#"<link rel="stylesheet" href="/css/site.css"><script src='/js/app.js?v=4'></script><img src=/img/hero.jpg alt="Hero">"#;
    assert_eq!(
      rewrite(markup),
      r#"<link rel="stylesheet" href="assets/css/site_3.css"><script src='assets/js/app_4.js'></script><img src=assets/media/hero_1.jpg alt="Hero">"#
    );
  }

  #[test]
  fn rewrites_srcset_and_inline_styles() {
    let markup = r#"<picture><source srcset="/img/hero.jpg 1x, /img/hero@2x.jpg 2x"></picture><div style="background:url('/img/bg.png')"></div><style>.a{background:url(/img/bg.png)}</style>"#;
    assert_eq!(
      rewrite(markup),
      r#"<picture><source srcset="assets/media/hero_1.jpg 1x, assets/media/hero_2x_2.jpg 2x"></picture><div style="background:url('assets/media/bg_5.png')"></div><style>.a{background:url(assets/media/bg_5.png)}</style>"#
    );
  }

  #[test]
  fn entity_escaped_queries_resolve() {
    let markup = r#"<iframe src="/api/search?q=a&amp;page=2"></iframe>"#;
    assert_eq!(rewrite(markup), r#"<iframe src="assets/api/data_6.json"></iframe>"#);
  }

  #[test]
  fn hyperlinks_are_renamed_and_foreign_links_kept() {
    let markup = r#"<a href="/">Home</a><a href="item?id=3">Item</a><a href="https://other.org/x">Out</a><a href="mailto:a@ex.com">Mail</a><a href="javascript:void(0)">JS</a>"#;
    let output = rewrite(markup);
    assert!(output.starts_with(r#"<a href="index.html">Home</a><a href="shop_item_"#));
    assert!(output.contains(r#"<a href="https://other.org/x">Out</a>"#));
    assert!(output.contains(r#"<a href="mailto:a@ex.com">Mail</a>"#));
    assert!(output.contains(r#"<a href="javascript:void(0)">JS</a>"#));
  }

  #[test]
  fn unmatched_values_and_data_uris_stay_byte_exact() {
    let markup = "<img src=\"/img/missing.png\"><img src=\"data:image/gif;base64,R0lGOD\">\n<video src='#t=5'></video>";
    assert_eq!(rewrite(markup), markup);
  }

  #[test]
  fn script_bodies_and_comments_are_not_tokenized() {
    let markup = r#"<script>const tpl = '<img src="/img/hero.jpg">';</script><!-- <img src="/img/hero.jpg"> --><script type="application/json">{"a":"&amp;"}</script>"#;
    assert_eq!(rewrite(markup), markup);
  }

  #[test]
  fn attributes_on_other_elements_are_ignored() {
    let markup = r#"<div src="/img/hero.jpg" href="/css/site.css"></div><a href="/css/site.css">css</a>"#;
    let output = rewrite(markup);
    assert!(output.starts_with(r#"<div src="/img/hero.jpg" href="/css/site.css"></div>"#));
    assert!(output.ends_with(r#"<a href="css_site_css.html">css</a>"#));
  }

  #[test]
  fn reports_counts() {
    let index = index();
    let (_, report) = StaticRewriter::new(&index, PAGE, "ex.com")
      .rewrite_markup(r#"<img src="/img/hero.jpg"><a href="/about">About</a><img src="/nope.png">"#);
    assert_eq!(report.assets, 1);
    assert_eq!(report.links, 1);
  }

  #[test]
  fn uppercase_markup_and_self_closing_tags() {
    let markup = r#"<IMG SRC="/img/hero.jpg" /><LINK HREF="/css/site.css"/>"#;
    assert_eq!(
      rewrite(markup),
      r#"<IMG SRC="assets/media/hero_1.jpg" /><LINK HREF="assets/css/site_3.css"/>"#
    );
  }
}
