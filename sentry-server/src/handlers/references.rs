//! Reference management handlers
//!
//! Adding a reference persists the upload into the reference directory and
//! re-indexes before responding, so the next scan already sees it.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use sentry_core::{DatabaseStats, RebuildStats};
use serde::Serialize;
use tracing::info;

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::multipart::MultipartFields;
use crate::state::AppState;

/// Fallback filename for uploads that carry none
const DEFAULT_UPLOAD_NAME: &str = "upload.bin";

/// Response for a newly added reference image
#[derive(Serialize)]
pub struct AddReferenceResponse {
    /// Filename the reference was stored under
    pub stored_as: String,
    /// Stats of the rebuild that followed
    pub stats: RebuildStats,
}

/// POST /references - Add a reference image (admin)
///
/// Accepts multipart/form-data with:
/// - file: The image to blacklist
/// - attachment_id (optional): id used as the stored filename prefix
pub async fn add_reference_handler(
    _admin: AdminAuth,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AddReferenceResponse>), ApiError> {
    let mut fields = MultipartFields::parse(&mut multipart, true, state.max_file_size).await?;
    let file = fields.take_file()?;
    let filename = file
        .file_name
        .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());

    let added = match fields.get_text("attachment_id") {
        Some(id) => {
            state
                .sentry
                .add_reference_with_id(id, filename, file.data)
                .await?
        }
        None => state.sentry.add_reference(filename, file.data).await?,
    };

    info!(
        stored_as = %added.stored_as,
        generation = added.stats.generation,
        "Reference added via API"
    );

    Ok((
        StatusCode::CREATED,
        Json(AddReferenceResponse {
            stored_as: added.stored_as,
            stats: added.stats,
        }),
    ))
}

/// POST /references/rebuild - Re-index the reference directory (admin)
pub async fn rebuild_handler(
    _admin: AdminAuth,
    State(state): State<AppState>,
) -> Result<Json<RebuildStats>, ApiError> {
    let stats = state.sentry.rebuild().await?;
    Ok(Json(stats))
}

/// GET /references - Statistics of the published reference snapshot
pub async fn list_references_handler(State(state): State<AppState>) -> Json<DatabaseStats> {
    Json(state.sentry.stats())
}
