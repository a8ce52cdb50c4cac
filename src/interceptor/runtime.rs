//! Host-side model of the decisions made by the injected runtime script.
//!
//! The same request resolution and mutation handling is implemented here against an
//! abstract [`DomSink`]; the script's resolver is checked against this model.

use crate::asset_paths::{is_local_asset_path, should_ignore_asset_reference};
use crate::resolver::{ResolutionIndex, TierProfile, resolve};

/// Attributes watched by the mutation subscription.
pub const OBSERVED_ATTRIBUTES: [&str; 3] = ["src", "srcset", "href"];

/// Opaque handle of a DOM node.
pub type NodeId = usize;

/// Request and attribute resolution inside a replayed page.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeInterceptor<'a> {
  index: &'a ResolutionIndex,
  page_url: &'a str,
}

impl<'a> RuntimeInterceptor<'a> {
  /// Interceptor for a page originally captured from `page_url`.
  pub fn new(index: &'a ResolutionIndex, page_url: &'a str) -> Self {
    Self { index, page_url }
  }

  /// Local path answering a `fetch`/`XMLHttpRequest` URL, or `None` to let the request
  /// through unchanged.
  pub fn resolve_request(&self, request_url: &str) -> Option<&'a str> {
    if is_local_asset_path(request_url) || should_ignore_asset_reference(request_url) {
      return None;
    }
    resolve(request_url, self.index, self.page_url, TierProfile::RUNTIME)
  }

  /// Replacement for an observed attribute value, or `None` when it stays as is.
  pub fn rewrite_attribute(&self, name: &str, value: &str) -> Option<String> {
    if name.eq_ignore_ascii_case("srcset") {
      return self.rewrite_srcset(value);
    }
    self.resolve_request(value.trim()).map(str::to_string)
  }

  fn rewrite_srcset(&self, value: &str) -> Option<String> {
    let mut changed = false;
    let candidates: Vec<String> = value
      .split(',')
      .map(str::trim)
      .filter(|candidate| !candidate.is_empty())
      .map(|candidate| {
        let (url, descriptor) = candidate
          .split_once(char::is_whitespace)
          .map_or((candidate, ""), |(url, rest)| (url, rest.trim()));
        let url = match self.resolve_request(url) {
          Some(local) => {
            changed = true;
            local
          }
          None => url,
        };
        if descriptor.is_empty() {
          url.to_string()
        } else {
          format!("{url} {descriptor}")
        }
      })
      .collect();
    changed.then(|| candidates.join(", "))
  }
}

/// Attributes of one element inside an inserted subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSnapshot {
  /// Node handle used when writing back.
  pub node: NodeId,
  /// Attribute name/value pairs in document order.
  pub attributes: Vec<(String, String)>,
  /// Child elements.
  pub children: Vec<ElementSnapshot>,
}

/// One observed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
  /// An observed attribute was set on an existing element.
  Attribute {
    /// Element whose attribute changed.
    node: NodeId,
    /// Attribute name.
    name: String,
    /// New value.
    value: String,
  },
  /// Elements were inserted into the document.
  ChildList {
    /// Roots of the inserted subtrees.
    added: Vec<ElementSnapshot>,
  },
}

/// Write access to the document the subscription repairs.
pub trait DomSink {
  /// Set an attribute, returning the record the document would emit for the write.
  fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Option<MutationRecord>;
}

/// Mutation observer model that disconnects around its own writes.
#[derive(Debug, Default)]
pub struct MutationSubscription {
  observing: bool,
  pending: Vec<MutationRecord>,
}

impl MutationSubscription {
  /// Subscription that is already observing.
  pub fn observe() -> Self {
    Self {
      observing: true,
      pending: Vec::new(),
    }
  }

  /// Stop receiving records.
  pub fn pause(&mut self) {
    self.observing = false;
  }

  /// Start receiving records again.
  pub fn resume(&mut self) {
    self.observing = true;
  }

  /// Whether records are currently delivered.
  pub fn is_observing(&self) -> bool {
    self.observing
  }

  /// Records waiting for the next [`MutationSubscription::flush`].
  pub fn pending(&self) -> &[MutationRecord] {
    &self.pending
  }

  /// Deliver a record; dropped while paused.
  pub fn notify(&mut self, record: MutationRecord) {
    if self.observing {
      self.pending.push(record);
    }
  }

  /// Process the queued batch and return the number of attributes rewritten.
  ///
  /// The subscription is paused while writing so its own writes never come back as
  /// new records.
  pub fn flush(&mut self, interceptor: &RuntimeInterceptor<'_>, sink: &mut dyn DomSink) -> usize {
    let batch = std::mem::take(&mut self.pending);
    let mut writes = Vec::new();
    for record in &batch {
      match record {
        MutationRecord::Attribute { node, name, value } => {
          collect_write(interceptor, *node, name, value, &mut writes);
        }
        MutationRecord::ChildList { added } => {
          for element in added {
            collect_subtree(interceptor, element, &mut writes);
          }
        }
      }
    }

    if writes.is_empty() {
      return 0;
    }

    self.pause();
    for (node, name, value) in &writes {
      if let Some(echo) = sink.set_attribute(*node, name, value) {
        self.notify(echo);
      }
    }
    self.resume();
    writes.len()
  }
}

fn collect_write(
  interceptor: &RuntimeInterceptor<'_>,
  node: NodeId,
  name: &str,
  value: &str,
  writes: &mut Vec<(NodeId, String, String)>,
) {
  let observed = OBSERVED_ATTRIBUTES
    .iter()
    .any(|attribute| attribute.eq_ignore_ascii_case(name));
  if !observed {
    return;
  }
  if let Some(local) = interceptor.rewrite_attribute(name, value) {
    writes.push((node, name.to_string(), local));
  }
}

fn collect_subtree(
  interceptor: &RuntimeInterceptor<'_>,
  element: &ElementSnapshot,
  writes: &mut Vec<(NodeId, String, String)>,
) {
  for (name, value) in &element.attributes {
    collect_write(interceptor, element.node, name, value, writes);
  }
  for child in &element.children {
    collect_subtree(interceptor, child, writes);
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::*;
  use crate::resolver::fixtures::{PAGE, captured_index};

  #[derive(Default)]
  struct RecordingDom {
    attributes: HashMap<(NodeId, String), String>,
    writes: usize,
  }

  impl DomSink for RecordingDom {
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Option<MutationRecord> {
      self.writes += 1;
      self
        .attributes
        .insert((node, name.to_string()), value.to_string());
      Some(MutationRecord::Attribute {
        node,
        name: name.to_string(),
        value: value.to_string(),
      })
    }
  }

  fn attribute(node: NodeId, name: &str, value: &str) -> MutationRecord {
    MutationRecord::Attribute {
      node,
      name: name.to_string(),
      value: value.to_string(),
    }
  }

  #[test]
  fn api_requests_resolve_with_runtime_tiers() {
    let index = captured_index();
    let interceptor = RuntimeInterceptor::new(&index, PAGE);
    assert_eq!(
      interceptor.resolve_request("/api/items?page=1"),
      Some("assets/api/data_55555555.json")
    );
    assert_eq!(
      interceptor.resolve_request("/api/items?page=2"),
      Some("assets/api/data_55555555.json")
    );
    assert_eq!(interceptor.resolve_request("/api/unknown"), None);
  }

  #[test]
  fn local_and_inline_values_pass_through() {
    let index = captured_index();
    let interceptor = RuntimeInterceptor::new(&index, PAGE);
    assert_eq!(interceptor.resolve_request("assets/media/logo_11111111.png"), None);
    assert_eq!(interceptor.resolve_request("data:image/png;base64,AA"), None);
  }

  #[test]
  fn inserted_subtrees_are_repaired_without_feedback() {
    let index = captured_index();
    let interceptor = RuntimeInterceptor::new(&index, PAGE);
    let mut subscription = MutationSubscription::observe();
    let mut dom = RecordingDom::default();

    subscription.notify(MutationRecord::ChildList {
      added: vec![ElementSnapshot {
        node: 1,
        attributes: vec![("class".into(), "card".into())],
        children: vec![ElementSnapshot {
          node: 2,
          attributes: vec![
            ("src".into(), "/logo.png".into()),
            ("srcset".into(), "/logo.png 1x, /missing.png 2x".into()),
          ],
          children: Vec::new(),
        }],
      }],
    });

    assert_eq!(subscription.flush(&interceptor, &mut dom), 2);
    assert_eq!(
      dom.attributes.get(&(2, "src".to_string())).map(String::as_str),
      Some("assets/media/logo_11111111.png")
    );
    assert_eq!(
      dom.attributes.get(&(2, "srcset".to_string())).map(String::as_str),
      Some("assets/media/logo_11111111.png 1x, /missing.png 2x")
    );
    assert!(subscription.is_observing());
    assert!(subscription.pending().is_empty());
  }

  #[test]
  fn already_local_attribute_changes_are_ignored() {
    let index = captured_index();
    let interceptor = RuntimeInterceptor::new(&index, PAGE);
    let mut subscription = MutationSubscription::observe();
    let mut dom = RecordingDom::default();

    subscription.notify(attribute(3, "src", "assets/media/logo_11111111.png"));
    subscription.notify(attribute(3, "alt", "/logo.png"));
    subscription.notify(attribute(4, "href", "data:text/css,body{}"));
    assert_eq!(subscription.flush(&interceptor, &mut dom), 0);
    assert_eq!(dom.writes, 0);
  }

  #[test]
  fn records_are_dropped_while_paused() {
    let mut subscription = MutationSubscription::observe();
    subscription.pause();
    subscription.notify(attribute(1, "src", "/logo.png"));
    assert!(subscription.pending().is_empty());
    subscription.resume();
    subscription.notify(attribute(1, "src", "/logo.png"));
    assert_eq!(subscription.pending().len(), 1);
  }
}
