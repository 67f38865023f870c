//! Engine configuration.
//!
//! Loaded once at startup from environment variables with sensible defaults.

use std::path::PathBuf;

/// Default directory holding reference images.
pub const DEFAULT_REFERENCE_DIR: &str = "blacklist_photos";

/// Default mutual-match count a reference must exceed to be a visual match.
pub const DEFAULT_MATCH_THRESHOLD: usize = 25;

/// Default number of CPU worker threads.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Default cap on keypoints detected per image.
pub const DEFAULT_MAX_KEYPOINTS: usize = 1000;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    /// Flat directory of reference images (default: `blacklist_photos`)
    pub reference_dir: PathBuf,
    /// Mutual-match threshold, strictly exceeded for a visual match (default: 25)
    pub match_threshold: usize,
    /// Worker pool size (default: 4)
    pub worker_threads: usize,
    /// Keypoint cap per image (default: 1000)
    pub max_keypoints: usize,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            reference_dir: PathBuf::from(DEFAULT_REFERENCE_DIR),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            worker_threads: DEFAULT_WORKER_THREADS,
            max_keypoints: DEFAULT_MAX_KEYPOINTS,
        }
    }
}

impl SentryConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `BLACKLIST_DIR` | `blacklist_photos` | Reference image directory |
    /// | `MATCH_THRESHOLD` | `25` | Mutual-match threshold |
    /// | `WORKER_THREADS` | `4` | CPU worker pool size |
    /// | `MAX_KEYPOINTS` | `1000` | Keypoint cap per image |
    pub fn from_env() -> Self {
        let reference_dir = std::env::var("BLACKLIST_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REFERENCE_DIR));

        let match_threshold = std::env::var("MATCH_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MATCH_THRESHOLD);

        let worker_threads = std::env::var("WORKER_THREADS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_WORKER_THREADS)
            .max(1);

        let max_keypoints = std::env::var("MAX_KEYPOINTS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_KEYPOINTS)
            .max(1);

        Self {
            reference_dir,
            match_threshold,
            worker_threads,
            max_keypoints,
        }
    }

    /// Set the reference directory.
    pub fn with_reference_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reference_dir = dir.into();
        self
    }

    /// Set the mutual-match threshold.
    pub fn with_match_threshold(mut self, threshold: usize) -> Self {
        self.match_threshold = threshold;
        self
    }

    /// Set the worker pool size (at least one thread).
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    /// Set the keypoint cap (at least one keypoint).
    pub fn with_max_keypoints(mut self, max: usize) -> Self {
        self.max_keypoints = max.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SentryConfig::default();
        assert_eq!(config.reference_dir, PathBuf::from("blacklist_photos"));
        assert_eq!(config.match_threshold, 25);
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.max_keypoints, 1000);
    }

    #[test]
    fn test_builder_clamps_to_one() {
        let config = SentryConfig::default()
            .with_worker_threads(0)
            .with_max_keypoints(0)
            .with_match_threshold(0);
        assert_eq!(config.worker_threads, 1);
        assert_eq!(config.max_keypoints, 1);
        assert_eq!(config.match_threshold, 0);
    }
}
