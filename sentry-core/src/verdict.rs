//! Match verdicts handed to the sanction side.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix applied to the reason recorded with a sanction.
pub const SANCTION_REASON_PREFIX: &str = "[Auto-Mod] Blacklisted Image";

/// Outcome of scanning one image against the reference database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchVerdict {
    /// Neither tier matched (or the bytes could not be decoded).
    NoMatch,
    /// The bytes are identical to a reference image.
    ExactMatch,
    /// The image is visually similar to the named reference.
    VisualMatch {
        /// Reference file that qualified first
        filename: String,
        /// Mutual nearest-neighbour pairs found against it
        matches: usize,
    },
}

impl MatchVerdict {
    pub fn is_match(&self) -> bool {
        !matches!(self, Self::NoMatch)
    }

    /// Reason string for a match, `None` for [`MatchVerdict::NoMatch`].
    pub fn reason(&self) -> Option<String> {
        self.is_match().then(|| self.to_string())
    }

    /// Reason to attach to the moderation action, e.g.
    /// `[Auto-Mod] Blacklisted Image: MD5 Exact Match`.
    pub fn sanction_reason(&self) -> Option<String> {
        self.reason()
            .map(|reason| format!("{}: {}", SANCTION_REASON_PREFIX, reason))
    }

    /// Reference filename behind a visual match.
    pub fn matched_filename(&self) -> Option<&str> {
        match self {
            Self::VisualMatch { filename, .. } => Some(filename),
            Self::NoMatch | Self::ExactMatch => None,
        }
    }
}

impl fmt::Display for MatchVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatch => write!(f, "No Match"),
            Self::ExactMatch => write!(f, "MD5 Exact Match"),
            Self::VisualMatch { filename, .. } => write!(f, "Visual Match ({filename})"),
        }
    }
}
