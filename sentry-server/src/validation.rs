//! Checks applied to attachments and reference images before they reach
//! the matching engine.

use crate::error::ApiError;

/// Content types an attachment may declare
const ALLOWED_MIME_PREFIXES: &[&str] = &["image/", "application/octet-stream"];

/// Default attachment size cap (25 MB)
pub const DEFAULT_MAX_FILE_SIZE: usize = 25 * 1024 * 1024;

/// Rejects attachments that declare a non-image type.
///
/// Chat clients often send images as `application/octet-stream` or without
/// a type, so both are scanned.
pub fn validate_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    match content_type {
        Some(ct) => {
            let ct_lower = ct.to_lowercase();
            if ALLOWED_MIME_PREFIXES
                .iter()
                .any(|prefix| ct_lower.starts_with(prefix))
            {
                Ok(())
            } else {
                Err(ApiError::bad_request(format!(
                    "Unsupported Content-Type: '{}'. Allowed types: image/*, application/octet-stream",
                    ct
                )))
            }
        }
        None => Ok(()),
    }
}

pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ApiError> {
    if size > max_size {
        let max_mb = max_size / (1024 * 1024);
        let actual_mb = size / (1024 * 1024);
        Err(ApiError::bad_request(format!(
            "File too large: {} MB exceeds maximum of {} MB",
            actual_mb, max_mb
        )))
    } else {
        Ok(())
    }
}

/// An empty attachment has nothing to hash or match.
pub fn validate_not_empty(size: usize) -> Result<(), ApiError> {
    if size == 0 {
        Err(ApiError::bad_request("Uploaded file is empty"))
    } else {
        Ok(())
    }
}
