//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use sentry_core::Sentry;

use crate::validation::DEFAULT_MAX_FILE_SIZE;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Matching engine shared by every request
    pub sentry: Arc<Sentry>,
    /// Bearer token for reference-management endpoints (`None` = open)
    pub admin_token: Option<Arc<str>>,
    /// Maximum accepted upload size in bytes
    pub max_file_size: usize,
}

impl AppState {
    pub fn new(sentry: Arc<Sentry>) -> Self {
        Self {
            sentry,
            admin_token: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.map(Arc::from);
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: usize) -> Self {
        self.max_file_size = max_file_size;
        self
    }
}
