use sha2::{Digest, Sha256};
use url::Url;

use super::filters::LOCAL_ASSET_PREFIX;
use crate::store::AssetKind;

const FALLBACK_BASE_NAME: &str = "data";
const FALLBACK_EXTENSION: &str = ".bin";
const API_EXTENSION: &str = ".json";

/// Lowercase hex digest of `value`, truncated to `len` characters.
pub fn short_digest(value: &str, len: usize) -> String {
  let digest = hex::encode(Sha256::digest(value.as_bytes()));
  digest[..len.min(digest.len())].to_string()
}

/// Derive the collision-free file name for a captured resource.
///
/// The base name comes from the last path segment, the digest is taken over the full
/// canonical URL (query included) so two variants of one endpoint never collide.
pub fn asset_file_name(canonical_url: &str, kind: AssetKind) -> String {
  let segment = last_path_segment(canonical_url);
  let file_name = match (kind, segment) {
    (AssetKind::Api, _) | (_, None) => FALLBACK_BASE_NAME.to_string(),
    (_, Some(segment)) => segment,
  };

  let extension = if kind == AssetKind::Api {
    API_EXTENSION.to_string()
  } else {
    extension_of(&file_name).to_string()
  };
  let base_name = file_name
    .strip_suffix(extension.as_str())
    .unwrap_or(&file_name);
  let extension = if extension.is_empty() {
    FALLBACK_EXTENSION
  } else {
    extension.as_str()
  };

  format!(
    "{}_{}{}",
    sanitize_file_component(base_name),
    short_digest(canonical_url, 8),
    sanitize_file_component(extension)
  )
}

/// Produce the archive-relative path for an asset file.
///
/// The generated path always uses forward slashes so that the persisted index works on
/// every platform, regardless of the native directory separator.
pub fn make_archive_asset_path(kind: AssetKind, file_name: &str) -> String {
  format!("{}{}/{}", LOCAL_ASSET_PREFIX, kind.subdir(), file_name).replace('\\', "/")
}

fn last_path_segment(canonical_url: &str) -> Option<String> {
  let parsed = Url::parse(canonical_url).ok()?;
  let segment = parsed.path().rsplit('/').next()?;
  if segment.is_empty() {
    None
  } else {
    Some(segment.to_string())
  }
}

/// Extension including the dot, following `path.extname` rules: the last `.` counts
/// only when it is not the first character.
fn extension_of(file_name: &str) -> &str {
  match file_name.rfind('.') {
    Some(0) | None => "",
    Some(index) => &file_name[index..],
  }
}

fn sanitize_file_component(value: &str) -> String {
  value
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
        c
      } else {
        '_'
      }
    })
    .collect()
}
