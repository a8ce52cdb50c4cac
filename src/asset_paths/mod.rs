//! Helpers for canonicalizing references and naming local archive files.
//!
//! The responsibilities are split into focused submodules so that canonicalization,
//! reference filtering, asset naming and page naming can be tested independently. The
//! same rules are shared by the capture-time rewriter, the injected runtime and the
//! replay server.

mod bundle;
mod canonical;
mod filters;
mod pages;

pub use bundle::{asset_file_name, make_archive_asset_path, short_digest};
pub use canonical::{
  canonicalize, has_unresolvable_scheme, percent_decode, strip_fragment, strip_query,
};
pub use filters::{
  LOCAL_ASSET_PREFIX, is_local_asset_path, is_rewritable_hyperlink, should_ignore_asset_reference,
};
pub use pages::{INDEX_PAGE, local_page_name};
