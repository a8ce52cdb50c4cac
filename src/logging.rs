//! Structured logging setup for the command-line binary.

use std::io;

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";
const VERBOSE_FILTER: &str = "info,offline_wayback=debug";

/// Install a stderr `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects between the quiet and the
/// debug filter for this crate.
pub fn init_logging(verbose: bool) -> Result<()> {
  let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
  let env_filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_writer(io::stderr)
    .with_ansi(false)
    .with_target(false)
    .try_init()
    .map_err(|err| anyhow!("failed to initialize logging: {err}"))?;

  tracing::debug!(filter = fallback, "logging initialized");
  Ok(())
}
