//! Crawling a live (or recorded) site into an archive.
//!
//! Rendering is delegated to a [`PageProvider`]; the session owns everything else:
//! the FIFO page queue, storage of observed responses, static rewriting and the
//! final burn-in of the runtime interceptor.

mod har;
mod links;
mod provider;
mod session;

pub use har::HarProvider;
pub use links::LinkFilter;
pub use provider::{CapturedPage, PageProvider, ResourceEvent};
pub use session::{CaptureOptions, CaptureSession, CaptureSummary};
