#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod archive;
pub mod asset_paths;
pub mod capture;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod logging;
pub mod replay;
pub mod resolver;
pub mod rewrite;
pub mod store;

pub use archive::{ArchiveBundle, ArchiveMetadata, ArchiveSummary};
pub use capture::{CaptureOptions, CaptureSession, CaptureSummary, HarProvider, PageProvider};
pub use config::ArchiverConfig;
pub use error::{ArchiveError, CaptureError, ProviderError, ResolveError};
pub use replay::ReplayRouter;
pub use resolver::{ResolutionIndex, TierProfile, resolve};
pub use rewrite::StaticRewriter;
pub use store::{AssetKind, ContentStore, StoreOutcome};
