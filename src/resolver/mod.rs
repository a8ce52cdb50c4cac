//! Resolution index and the tiered matcher that consults it.

mod index;
mod tiers;

pub use index::ResolutionIndex;
pub use tiers::{Resolution, Tier, TierProfile, is_dynamic_image, resolve, resolve_with_tier};

#[cfg(test)]
pub(crate) use tiers::fixtures;
