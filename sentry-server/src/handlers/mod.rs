//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod health;
pub mod references;
pub mod scan;

pub use crate::state::AppState;
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use references::{
    add_reference_handler, list_references_handler, rebuild_handler, AddReferenceResponse,
};
pub use scan::{scan_handler, ScanResponse};
