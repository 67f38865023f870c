//! Sentry Core - blacklisted image matching engine
//!
//! This crate decides whether an incoming image is a known blacklisted
//! image, either byte-for-byte or visually.
//!
//! # Features
//!
//! - Exact tier: 128-bit content hash lookup that skips all image work
//! - Perceptual tier: oriented FAST keypoints with 256-bit binary descriptors
//! - Mutual nearest-neighbour matching with a strict count threshold
//! - Atomically swapped reference snapshots, safe under concurrent scans
//! - Bounded worker pool for all CPU-bound steps
//!
//! # Example
//!
//! ```no_run
//! use sentry_core::{MatchVerdict, Sentry, SentryConfig};
//!
//! # async fn example() -> sentry_core::Result<()> {
//! let config = SentryConfig::default()
//!     .with_reference_dir("blacklist_photos")
//!     .with_match_threshold(25);
//!
//! // Index the reference directory before serving any scan
//! let sentry = Sentry::start(config).await?;
//!
//! let attachment = std::fs::read("upload.jpg").unwrap();
//! match sentry.scan(attachment).await? {
//!     MatchVerdict::NoMatch => println!("clean"),
//!     verdict => println!("{}", verdict.sanction_reason().unwrap_or_default()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod features;
pub mod hash;
pub mod index;
pub mod matcher;
pub mod pipeline;
pub mod pool;
pub mod verdict;

// Re-export main types for convenience
pub use config::{
    SentryConfig, DEFAULT_MATCH_THRESHOLD, DEFAULT_MAX_KEYPOINTS, DEFAULT_REFERENCE_DIR,
    DEFAULT_WORKER_THREADS,
};
pub use database::{
    AddedReference, DatabaseStats, RebuildStats, ReferenceDatabase, ReferenceImage, Snapshot,
};
pub use engine::Sentry;
pub use error::{Result, SentryError};
pub use features::{hamming_distance, Descriptor, DescriptorSet, ExtractorConfig, FeatureExtractor};
pub use hash::ContentHash;
pub use index::{ExactIndex, PerceptualIndex};
pub use matcher::{BruteForceMatcher, VisualMatcher};
pub use pipeline::{is_supported_attachment, ScanPipeline, SUPPORTED_EXTENSIONS};
pub use pool::WorkerPool;
pub use verdict::MatchVerdict;
