use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use offline_wayback::archive::{archive_dir, export_archive, list_archives};
use offline_wayback::replay::{ReplayRouter, serve};
use offline_wayback::{ArchiverConfig, CaptureOptions, CaptureSession, HarProvider, logging};

/// Capture websites into offline archives and replay them.
#[derive(Parser)]
#[command(name = "wayback", version)]
#[command(about = "Capture websites into self-contained archives and replay them offline")]
struct Cli {
  /// Log debug output for this crate.
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Archives directory, overriding the configuration file.
  #[arg(long, global = true)]
  archives: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Capture a site from a HAR recording into a new archive
  Capture {
    /// Start URL of the crawl.
    url: String,
    /// HAR 1.2 recording the pages are served from.
    #[arg(long)]
    har: PathBuf,
    /// Link depth to follow from the start page.
    #[arg(long)]
    depth: Option<usize>,
    /// Navigation timeout per page, in seconds.
    #[arg(long)]
    timeout: Option<u64>,
  },
  /// Serve the archives directory over HTTP
  Serve {
    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,
  },
  /// Write an archive as a zip file
  Export {
    /// Archive id (directory name).
    id: String,
    /// Destination file, `{id}.zip` by default.
    #[arg(long)]
    out: Option<PathBuf>,
  },
  /// List archives, newest first
  List,
}

fn main() {
  let cli = Cli::parse();
  if let Err(err) = logging::init_logging(cli.verbose) {
    eprintln!("wayback: {err:#}");
  }

  if let Err(err) = run(cli) {
    eprintln!("wayback error: {err:#}");
    std::process::exit(1);
  }
}

fn run(cli: Cli) -> Result<()> {
  let cwd = env::current_dir().context("failed to determine working directory")?;
  let mut config = ArchiverConfig::discover(&cwd);
  if let Some(archives) = &cli.archives {
    config.archives_dir = archives.to_string_lossy().into_owned();
  }
  let archives_dir = config.archives_path(&cwd);

  match cli.command {
    Commands::Capture {
      url,
      har,
      depth,
      timeout,
    } => {
      let mut options = CaptureOptions::from(&config);
      if let Some(depth) = depth {
        options.max_depth = depth;
      }
      if let Some(timeout) = timeout {
        options.timeout = Duration::from_secs(timeout);
      }
      let mut provider = HarProvider::from_path(&har)
        .with_context(|| format!("failed to load recording {}", har.display()))?;
      let session = CaptureSession::start(&archives_dir, &url, options)
        .with_context(|| format!("failed to start capture of {url}"))?;
      let summary = session
        .run(&mut provider)
        .with_context(|| format!("capture of {url} failed"))?;

      println!(
        "Archived {} pages and {} assets into {}",
        summary.metadata.total_pages,
        summary.metadata.total_assets,
        summary.archive_dir.display()
      );
      for page in &summary.skipped_pages {
        println!("  skipped {page}");
      }
      Ok(())
    }
    Commands::Serve { port } => {
      let port = port.unwrap_or(config.port);
      serve(ReplayRouter::new(&cwd, &config), port, config.server_workers)
    }
    Commands::Export { id, out } => {
      let dir = archive_dir(&archives_dir, &id)?;
      let destination = out.unwrap_or_else(|| cwd.join(format!("{id}.zip")));
      let size = export_archive(&dir, &destination, config.compression_level())
        .with_context(|| format!("failed to export {id}"))?;
      println!("Wrote {} ({size} bytes)", destination.display());
      Ok(())
    }
    Commands::List => {
      let archives = list_archives(&archives_dir, config.layout())?;
      if archives.is_empty() {
        println!("No archives found.");
      }
      for archive in archives {
        println!(
          "{}  {}  {} pages, {} assets  {}",
          archive.id,
          archive.formatted_date,
          archive.total_pages,
          archive.total_assets,
          archive.title
        );
      }
      Ok(())
    }
  }
}
