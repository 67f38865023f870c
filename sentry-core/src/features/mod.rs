//! Local feature extraction for visual matching.
//!
//! Turns raw image bytes into a [`DescriptorSet`]: one 256-bit binary
//! descriptor per detected keypoint. Descriptors compare by Hamming
//! distance, so matching reduces to XOR and popcount.
//!
//! # Components
//!
//! - **Descriptors**: fixed-length bit strings and the sets that own them.
//! - **Extractor**: oriented FAST keypoints on an image pyramid, described
//!   with steered BRIEF tests.

pub mod descriptor;
pub mod orb;
mod pattern;

pub use descriptor::{hamming_distance, Descriptor, DescriptorSet, Keypoint, DESCRIPTOR_BYTES};
pub use orb::{ExtractorConfig, FeatureExtractor};
