//! Scan handler

use axum::{
    extract::{Multipart, State},
    Json,
};
use sentry_core::{is_supported_attachment, MatchVerdict};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::multipart::MultipartFields;
use crate::state::AppState;

/// Response for a scanned attachment
#[derive(Serialize)]
pub struct ScanResponse {
    /// Whether the attachment matched a blacklisted image
    pub is_match: bool,
    /// Human-readable reason for a match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Reason to attach to a moderation action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanction_reason: Option<String>,
    /// Full verdict
    pub verdict: MatchVerdict,
    /// True when the attachment was not scanned because of its extension
    pub skipped: bool,
}

impl ScanResponse {
    fn from_verdict(verdict: MatchVerdict) -> Self {
        Self {
            is_match: verdict.is_match(),
            reason: verdict.reason(),
            sanction_reason: verdict.sanction_reason(),
            verdict,
            skipped: false,
        }
    }

    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::from_verdict(MatchVerdict::NoMatch)
        }
    }
}

/// POST /scan - Scan an uploaded attachment
///
/// Accepts multipart/form-data with:
/// - file: The attachment bytes (filename decides whether it is scanned)
///
/// Attachments whose filename does not carry an image extension are
/// reported as `NoMatch` with `skipped: true` without being scanned.
pub async fn scan_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ScanResponse>, ApiError> {
    let mut fields = MultipartFields::parse(&mut multipart, true, state.max_file_size).await?;
    let file = fields.take_file()?;

    if let Some(name) = file.file_name.as_deref() {
        if !is_supported_attachment(name) {
            debug!(file = %name, "Skipping non-image attachment");
            return Ok(Json(ScanResponse::skipped()));
        }
    }

    let bytes = file.data.len();
    let verdict = state.sentry.scan(file.data).await?;

    if verdict.is_match() {
        info!(
            file = file.file_name.as_deref().unwrap_or("<unnamed>"),
            bytes,
            verdict = %verdict,
            "Blacklisted attachment detected"
        );
    }

    Ok(Json(ScanResponse::from_verdict(verdict)))
}
