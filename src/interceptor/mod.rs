//! Runtime interception for replayed pages.
//!
//! [`render_interceptor`] produces the script that is burned into saved pages, and
//! [`RuntimeInterceptor`] models its request and DOM decisions on the host.

mod inject;
mod runtime;
mod script;

pub use inject::{INTERCEPTOR_MARKER, inject_interceptor};
pub use runtime::{
  DomSink, ElementSnapshot, MutationRecord, MutationSubscription, NodeId, OBSERVED_ATTRIBUTES,
  RuntimeInterceptor,
};
pub use script::render_interceptor;
