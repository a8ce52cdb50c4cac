//! HTTP surface serving archives, downloads and the fallback matcher.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use tiny_http::{Header, Request, Response, ResponseBox, Server};
use tracing::{debug, info, warn};

use super::fallback::{ReplayFallback, archive_id_from_referer, is_contained};
use crate::archive::{archive_dir, archive_zip_tempfile, list_archives};
use crate::asset_paths::{INDEX_PAGE, percent_decode, strip_query};
use crate::config::{ArchiveLayout, ArchiverConfig};
use crate::error::ArchiveError;

const NOT_FOUND_IN_ARCHIVE: &str = "Not Found in Archive";
const ARCHIVE_NOT_FOUND: &str = "Archive not found";
const ARCHIVE_ID_MISSING: &str = "Archive ID missing";

/// What a request should be answered with.
#[derive(Debug)]
pub enum Reply {
  /// JSON document.
  Json(String),
  /// File from an archive.
  File(PathBuf),
  /// Zip of a whole archive, offered as an attachment.
  Zip {
    /// Rewound zip data.
    file: File,
    /// Attachment name.
    file_name: String,
  },
  /// 404 with a short plain-text body.
  NotFound(&'static str),
  /// 500 with a plain-text body.
  Error(String),
}

/// Stateless request router over the archives directory.
#[derive(Debug, Clone)]
pub struct ReplayRouter {
  archives_dir: PathBuf,
  index_file: String,
  metadata_file: String,
  compression_level: i32,
}

impl ReplayRouter {
  /// Router for the archives described by `config`, relative to `base`.
  pub fn new(base: &Path, config: &ArchiverConfig) -> Self {
    Self {
      archives_dir: config.archives_path(base),
      index_file: config.index_file.clone(),
      metadata_file: config.metadata_file.clone(),
      compression_level: config.compression_level(),
    }
  }

  /// Archives directory served.
  pub fn archives_dir(&self) -> &Path {
    &self.archives_dir
  }

  fn layout(&self) -> ArchiveLayout<'_> {
    ArchiveLayout {
      index_file: &self.index_file,
      metadata_file: &self.metadata_file,
    }
  }

  /// Decide the reply for a request line and its `Referer` header.
  pub fn route(&self, url: &str, referer: Option<&str>) -> Reply {
    let path = strip_query(url);

    if path == "/" {
      return self.catalog();
    }
    if let Some(id) = path.strip_prefix("/download/") {
      return self.download(&percent_decode(id.trim_end_matches('/')));
    }
    let mut fallback = referer.and_then(archive_id_from_referer).map(|id| (id, path));
    if path == "/view" || path.starts_with("/view/") {
      if let Some(reply) = self.view(path) {
        return reply;
      }
      if let Some((id, inner)) = split_view_request(path) {
        fallback = Some((fallback.map_or(id, |(referer_id, _)| referer_id), inner));
      }
    }

    let resolver = ReplayFallback::new(&self.archives_dir, self.layout());
    match fallback.and_then(|(id, request)| resolver.resolve(id, request)) {
      Some(file) => Reply::File(file),
      None => Reply::NotFound(NOT_FOUND_IN_ARCHIVE),
    }
  }

  fn catalog(&self) -> Reply {
    match list_archives(&self.archives_dir, self.layout()) {
      Ok(archives) => match serde_json::to_string_pretty(&archives) {
        Ok(json) => Reply::Json(json),
        Err(err) => Reply::Error(err.to_string()),
      },
      Err(err) => Reply::Error(err.to_string()),
    }
  }

  fn download(&self, id: &str) -> Reply {
    let dir = match archive_dir(&self.archives_dir, id) {
      Ok(dir) => dir,
      Err(ArchiveError::NotFound(_) | ArchiveError::InvalidId(_)) => {
        return Reply::NotFound(ARCHIVE_NOT_FOUND);
      }
      Err(err) => return Reply::Error(err.to_string()),
    };
    match archive_zip_tempfile(&dir, self.compression_level) {
      Ok(file) => Reply::Zip {
        file,
        file_name: format!("{id}.zip"),
      },
      Err(err) => Reply::Error(err.to_string()),
    }
  }

  /// Static file below `/view/{id}/`; `None` passes the request on to the fallback.
  fn view(&self, path: &str) -> Option<Reply> {
    let segments: Vec<String> = path
      .split('/')
      .filter(|segment| !segment.is_empty())
      .skip(1)
      .map(|segment| percent_decode(segment).into_owned())
      .collect();
    let Some((id, rest)) = segments.split_first() else {
      return Some(Reply::NotFound(ARCHIVE_ID_MISSING));
    };

    let relative = if rest.is_empty() {
      PathBuf::from(INDEX_PAGE)
    } else {
      rest.iter().collect()
    };
    if !is_contained(Path::new(id)) || !is_contained(&relative) {
      return Some(Reply::NotFound(NOT_FOUND_IN_ARCHIVE));
    }

    let file = self.archives_dir.join(id).join(relative);
    file.is_file().then_some(Reply::File(file))
  }
}

/// Split `/view/{id}/rest?query` into the id and `/rest?query`.
fn split_view_request(url: &str) -> Option<(&str, &str)> {
  let rest = url.strip_prefix("/view/")?;
  let slash = rest.find('/')?;
  let id = &rest[..slash];
  let inner = &rest[slash..];
  (!id.is_empty() && inner != "/").then_some((id, inner))
}

/// Listen on `port` and answer requests with `workers` threads until the process exits.
pub fn serve(router: ReplayRouter, port: u16, workers: usize) -> Result<()> {
  std::fs::create_dir_all(router.archives_dir())
    .with_context(|| format!("failed to create {}", router.archives_dir().display()))?;
  let server = Server::http(("0.0.0.0", port))
    .map_err(|err| anyhow!("failed to bind port {port}: {err}"))?;
  let server = Arc::new(server);
  let router = Arc::new(router);
  info!("replay server running at http://localhost:{port}");

  let handles: Vec<_> = (0..workers.max(1))
    .map(|worker| {
      let server = Arc::clone(&server);
      let router = Arc::clone(&router);
      thread::Builder::new()
        .name(format!("replay-{worker}"))
        .spawn(move || {
          for request in server.incoming_requests() {
            handle(&router, request);
          }
        })
        .context("failed to spawn replay worker")
    })
    .collect::<Result<_>>()?;

  for worker in handles {
    worker
      .join()
      .map_err(|_| anyhow!("replay worker panicked"))?;
  }
  Ok(())
}

fn handle(router: &ReplayRouter, request: Request) {
  let referer = request
    .headers()
    .iter()
    .find(|header| header.field.equiv("Referer"))
    .map(|header| header.value.as_str().to_string());
  let url = request.url().to_string();
  let reply = router.route(&url, referer.as_deref());
  debug!(method = %request.method(), %url, reply = reply_kind(&reply), "replay request");

  if let Err(err) = request.respond(into_response(reply)) {
    warn!(%url, error = %err, "failed to send response");
  }
}

fn reply_kind(reply: &Reply) -> &'static str {
  match reply {
    Reply::Json(_) => "json",
    Reply::File(_) => "file",
    Reply::Zip { .. } => "zip",
    Reply::NotFound(_) => "not-found",
    Reply::Error(_) => "error",
  }
}

fn into_response(reply: Reply) -> ResponseBox {
  match reply {
    Reply::Json(json) => with_header(
      Response::from_string(json),
      "Content-Type",
      "application/json; charset=utf-8",
    )
    .boxed(),
    Reply::File(path) => match File::open(&path) {
      Ok(file) => {
        let mime = mime_guess::from_path(&path).first_or_octet_stream();
        with_header(Response::from_file(file), "Content-Type", mime.as_ref()).boxed()
      }
      Err(err) => {
        warn!(path = %path.display(), error = %err, "failed to open archived file");
        text(NOT_FOUND_IN_ARCHIVE, 404)
      }
    },
    Reply::Zip { file, file_name } => {
      let response = with_header(Response::from_file(file), "Content-Type", "application/zip");
      with_header(
        response,
        "Content-Disposition",
        &format!("attachment; filename=\"{file_name}\""),
      )
      .boxed()
    }
    Reply::NotFound(message) => text(message, 404),
    Reply::Error(message) => text(&message, 500),
  }
}

fn text(message: &str, status: u16) -> ResponseBox {
  with_header(
    Response::from_string(message).with_status_code(status),
    "Content-Type",
    "text/plain; charset=utf-8",
  )
  .boxed()
}

fn with_header<R: std::io::Read>(response: Response<R>, name: &str, value: &str) -> Response<R> {
  match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
    Ok(header) => response.with_header(header),
    Err(()) => response,
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::*;
  use crate::archive::ArchiveMetadata;
  use crate::resolver::ResolutionIndex;
  use tempfile::{TempDir, tempdir};

  fn fixture() -> (TempDir, ReplayRouter) {
    let dir = tempdir().unwrap();
    let config = ArchiverConfig::default();
    let root = config.archives_path(dir.path()).join("ex_com_1700");
    fs::create_dir_all(root.join("assets/api")).unwrap();
    fs::create_dir_all(root.join("assets/media")).unwrap();
    fs::write(root.join("index.html"), "<html></html>").unwrap();
    fs::write(root.join("about.html"), "<p>about</p>").unwrap();
    fs::write(root.join("assets/api/data_1.json"), "[1]").unwrap();
    fs::write(root.join("assets/media/image_1.bin"), "img").unwrap();
    let index: ResolutionIndex = [
      ("https://ex.com/api/items?page=1", "assets/api/data_1.json"),
      (
        "https://ex.com/_next/image?url=https://ex.com/a.png&w=320",
        "assets/media/image_1.bin",
      ),
    ]
    .into_iter()
    .collect();
    index.save(&root.join("urlMap.json")).unwrap();
    ArchiveMetadata::new("ex_com_1700", "https://ex.com/", "Ex", "ex.com", 1700, 1, 2)
      .save(&root.join("metadata.json"))
      .unwrap();
    fs::write(dir.path().join("secret.txt"), "secret").unwrap();
    let router = ReplayRouter::new(dir.path(), &config);
    (dir, router)
  }

  fn served_file(reply: Reply) -> PathBuf {
    match reply {
      Reply::File(path) => path,
      other => panic!("expected file, got {other:?}"),
    }
  }

  #[test]
  fn catalog_lists_archives() {
    let (_dir, router) = fixture();
    let Reply::Json(json) = router.route("/", None) else {
      panic!("expected json");
    };
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value[0]["id"], "ex_com_1700");
    assert_eq!(value[0]["totalPages"], 2);
  }

  #[test]
  fn view_serves_pages_with_index_default() {
    let (_dir, router) = fixture();
    assert!(served_file(router.route("/view/ex_com_1700/", None)).ends_with("index.html"));
    assert!(served_file(router.route("/view/ex_com_1700", None)).ends_with("index.html"));
    assert!(served_file(router.route("/view/ex_com_1700/about.html?x=1", None)).ends_with("about.html"));
  }

  #[test]
  fn traversal_is_rejected() {
    let (_dir, router) = fixture();
    assert!(matches!(
      router.route("/view/ex_com_1700/../../secret.txt", None),
      Reply::NotFound(_)
    ));
    assert!(matches!(
      router.route("/view/ex_com_1700/%2e%2e/%2e%2e/secret.txt", None),
      Reply::NotFound(_)
    ));
    assert!(matches!(router.route("/view", None), Reply::NotFound(ARCHIVE_ID_MISSING)));
  }

  #[test]
  fn referer_drives_the_fallback() {
    let (_dir, router) = fixture();
    let referer = "http://localhost:3000/view/ex_com_1700/index.html";
    let file = served_file(router.route("/api/items?page=3", Some(referer)));
    assert!(file.ends_with("assets/api/data_1.json"));

    assert!(matches!(
      router.route("/api/items?page=3", None),
      Reply::NotFound(NOT_FOUND_IN_ARCHIVE)
    ));
    assert!(matches!(
      router.route("/nothing/here", Some(referer)),
      Reply::NotFound(NOT_FOUND_IN_ARCHIVE)
    ));
  }

  #[test]
  fn dynamic_image_requests_are_served_from_the_archive() {
    let (_dir, router) = fixture();
    let referer = "http://localhost:3000/view/ex_com_1700/index.html";
    let file = served_file(router.route(
      "/_next/image?url=https%3A%2F%2Fex.com%2Fa.png&w=320&q=75",
      Some(referer),
    ));
    assert!(file.ends_with("assets/media/image_1.bin"));
  }

  #[test]
  fn missing_view_files_fall_through_to_the_fallback() {
    let (_dir, router) = fixture();
    let referer = "http://localhost:3000/view/ex_com_1700/index.html";
    let file = served_file(router.route("/view/ex_com_1700/api/items", Some(referer)));
    assert!(file.ends_with("assets/api/data_1.json"));
  }

  #[test]
  fn view_requests_are_split_into_archive_and_inner_path() {
    assert_eq!(
      split_view_request("/view/ex_com_1/api/items"),
      Some(("ex_com_1", "/api/items"))
    );
    assert_eq!(split_view_request("/view/ex_com_1"), None);
    assert_eq!(split_view_request("/view/ex_com_1/"), None);
  }

  #[test]
  fn downloads_zip_or_404() {
    let (_dir, router) = fixture();
    match router.route("/download/ex_com_1700", None) {
      Reply::Zip { file_name, .. } => assert_eq!(file_name, "ex_com_1700.zip"),
      other => panic!("expected zip, got {other:?}"),
    }
    assert!(matches!(
      router.route("/download/nope_1", None),
      Reply::NotFound(ARCHIVE_NOT_FOUND)
    ));
  }
}
