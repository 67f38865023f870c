//! Common utility functions shared across CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sentry_core::SentryConfig;
use tracing::debug;

/// Command-line values that take precedence over the environment.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub dir: Option<PathBuf>,
    pub threshold: Option<usize>,
    pub workers: Option<usize>,
    pub max_keypoints: Option<usize>,
}

/// Environment configuration with command-line overrides applied.
pub fn build_config(overrides: ConfigOverrides) -> SentryConfig {
    apply_overrides(SentryConfig::from_env(), overrides)
}

fn apply_overrides(mut config: SentryConfig, overrides: ConfigOverrides) -> SentryConfig {
    if let Some(dir) = overrides.dir {
        config = config.with_reference_dir(dir);
    }
    if let Some(threshold) = overrides.threshold {
        config = config.with_match_threshold(threshold);
    }
    if let Some(workers) = overrides.workers {
        config = config.with_worker_threads(workers);
    }
    if let Some(max_keypoints) = overrides.max_keypoints {
        config = config.with_max_keypoints(max_keypoints);
    }
    config
}

/// Read an input file with a uniform error message.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read file");
    Ok(bytes)
}

/// Final path component, used as the original attachment filename.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
