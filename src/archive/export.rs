//! Zip export of a finished archive.

use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::info;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;

/// Write every file below `archive_dir` into a zip stream, paths relative to the
/// archive root.
pub fn write_archive_zip<W: Write + Seek>(
  archive_dir: &Path,
  writer: W,
  compression_level: i32,
) -> Result<W, ArchiveError> {
  let options = FileOptions::default()
    .compression_method(CompressionMethod::Deflated)
    .compression_level(Some(compression_level.clamp(0, 9)));
  let mut zip = ZipWriter::new(writer);

  let mut entries: Vec<_> = WalkDir::new(archive_dir)
    .min_depth(1)
    .into_iter()
    .collect::<Result<_, _>>()
    .map_err(|err| {
      let path = err.path().unwrap_or(archive_dir).to_path_buf();
      ArchiveError::io(path, io::Error::other(err))
    })?;
  entries.sort_by(|a, b| a.path().cmp(b.path()));

  for entry in entries {
    let Ok(relative) = entry.path().strip_prefix(archive_dir) else {
      continue;
    };
    let name = relative.to_string_lossy().replace('\\', "/");
    if entry.file_type().is_dir() {
      zip.add_directory(format!("{name}/"), options)?;
    } else if entry.file_type().is_file() {
      zip.start_file(name, options)?;
      let mut file = File::open(entry.path()).map_err(|err| ArchiveError::io(entry.path(), err))?;
      io::copy(&mut file, &mut zip).map_err(|err| ArchiveError::io(entry.path(), err))?;
    }
  }

  Ok(zip.finish()?)
}

/// Export `archive_dir` to `destination`, replacing it atomically.
pub fn export_archive(
  archive_dir: &Path,
  destination: &Path,
  compression_level: i32,
) -> Result<u64, ArchiveError> {
  let parent = destination
    .parent()
    .filter(|parent| !parent.as_os_str().is_empty())
    .unwrap_or(Path::new("."));
  fs::create_dir_all(parent).map_err(|err| ArchiveError::io(parent, err))?;

  let staging = NamedTempFile::new_in(parent).map_err(|err| ArchiveError::io(parent, err))?;
  let staging = write_archive_zip(archive_dir, staging, compression_level)?;
  let file = staging
    .persist(destination)
    .map_err(|err| ArchiveError::io(destination, err.error))?;
  let size = file
    .metadata()
    .map_err(|err| ArchiveError::io(destination, err))?
    .len();

  info!(
    archive = %archive_dir.display(),
    destination = %destination.display(),
    bytes = size,
    "exported archive"
  );
  Ok(size)
}

/// Zip `archive_dir` into an anonymous temporary file rewound to its start.
pub fn archive_zip_tempfile(archive_dir: &Path, compression_level: i32) -> Result<File, ArchiveError> {
  let scratch = tempfile::tempfile().map_err(|err| ArchiveError::io(archive_dir, err))?;
  let mut file = write_archive_zip(archive_dir, scratch, compression_level)?;
  file
    .rewind()
    .map_err(|err| ArchiveError::io(archive_dir, err))?;
  Ok(file)
}
