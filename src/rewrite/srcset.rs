//! Candidate-by-candidate rewriting of `srcset` lists.

use super::StaticRewriter;

impl StaticRewriter<'_> {
  /// Rewrite each URL token of a `srcset` value, keeping width/density descriptors.
  ///
  /// Returns `None` when no candidate resolved so the attribute stays byte-exact.
  pub fn rewrite_srcset(&self, srcset: &str) -> Option<String> {
    let mut changed = false;
    let candidates: Vec<String> = srcset
      .split(',')
      .map(str::trim)
      .filter(|candidate| !candidate.is_empty())
      .map(|candidate| {
        let (url, descriptor) = match candidate.split_once(char::is_whitespace) {
          Some((url, descriptor)) => (url, Some(descriptor.trim())),
          None => (candidate, None),
        };
        let url = match self.rewrite_asset(url) {
          Some(local) => {
            changed = true;
            local
          }
          None => url.to_string(),
        };
        match descriptor {
          Some(descriptor) if !descriptor.is_empty() => format!("{url} {descriptor}"),
          _ => url,
        }
      })
      .collect();

    changed.then(|| candidates.join(", "))
  }
}
