use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentryError {
    /// Bytes are not a recognizable raster image.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A new reference file could not be written to the reference directory.
    #[error("Failed to persist reference {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The reference directory (or a file in it) could not be read.
    #[error("Failed to read reference {}: {source}", path.display())]
    IndexRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SentryError {
    /// Whether this is a failure to persist a new reference.
    pub fn is_persist_failure(&self) -> bool {
        matches!(self, Self::Persist { .. })
    }
}

pub type Result<T> = std::result::Result<T, SentryError>;
