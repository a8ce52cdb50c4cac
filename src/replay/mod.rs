//! Serving archives after capture.

mod fallback;
mod server;

pub use fallback::{ReplayFallback, archive_id_from_referer};
pub use server::{Reply, ReplayRouter, serve};
