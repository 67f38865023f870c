//! Exit codes following sysexits.h conventions.
//!
//! These codes let moderation scripts tell a blacklisted image apart from
//! an operational failure.

use sentry_core::SentryError;

/// Successful execution, nothing matched.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// A scanned file matched a reference image.
/// Maps to EX_DATAERR from sysexits.h.
pub const MATCH_FOUND: i32 = 65;

/// Cannot open input file or reference directory.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Cannot write a new reference file.
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    /// Non-error exit signalling that at least one file matched.
    pub const fn match_found() -> Self {
        Self {
            code: MATCH_FOUND,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify by the first library error in the chain, then by context
        let code = match err.chain().find_map(|e| e.downcast_ref::<SentryError>()) {
            Some(SentryError::Persist { .. }) => IO_ERROR,
            Some(SentryError::IndexRead { .. }) => INPUT_ERROR,
            Some(_) => GENERAL_ERROR,
            None if message.contains("Failed to read file") => INPUT_ERROR,
            None => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }
}
