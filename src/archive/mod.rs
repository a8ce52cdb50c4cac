//! Archive directories: creation and finalization during capture, then listing and
//! export once they are immutable.

mod bundle;
mod catalog;
mod export;
mod metadata;

pub use bundle::{ArchiveBundle, SavedPage, clean_domain};
pub use catalog::{ArchiveSummary, archive_dir, is_valid_archive_id, list_archives};
pub use export::{archive_zip_tempfile, export_archive, write_archive_zip};
pub use metadata::{ArchiveMetadata, format_timestamp};
