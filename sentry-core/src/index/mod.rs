//! The two lookup tiers built from the reference images.
//!
//! - **Exact**: a set of content hashes for byte-identical lookups.
//! - **Perceptual**: ordered `(filename, descriptors)` entries scanned by a
//!   [`VisualMatcher`](crate::matcher::VisualMatcher).
//!
//! Both are immutable once built; a rebuild produces a fresh pair.

pub mod exact;
pub mod perceptual;

pub use exact::ExactIndex;
pub use perceptual::{PerceptualEntry, PerceptualIndex};
