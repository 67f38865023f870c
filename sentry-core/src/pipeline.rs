//! Synchronous scan order: exact check, then extraction, then visual match.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::DEFAULT_MATCH_THRESHOLD;
use crate::database::{ReferenceDatabase, Snapshot};
use crate::hash::ContentHash;
use crate::verdict::MatchVerdict;

/// Attachment extensions worth scanning (lowercase, without the dot).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Whether an attachment with this filename should be scanned at all.
pub fn is_supported_attachment(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Runs one scan against the database.
///
/// Owns no index state; every call reads whichever snapshot is current
/// when it starts and uses that snapshot for both tiers.
#[derive(Debug, Clone)]
pub struct ScanPipeline {
    database: Arc<ReferenceDatabase>,
    threshold: usize,
}

impl ScanPipeline {
    pub fn new(database: Arc<ReferenceDatabase>) -> Self {
        Self {
            database,
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn database(&self) -> &Arc<ReferenceDatabase> {
        &self.database
    }

    /// Scan raw attachment bytes.
    ///
    /// Bytes that are not a decodable image can still be an exact match;
    /// otherwise they yield `NoMatch`.
    pub fn scan(&self, bytes: &[u8]) -> MatchVerdict {
        let snapshot = self.database.snapshot();
        self.scan_snapshot(&snapshot, bytes)
    }

    /// Scan against an explicit snapshot.
    pub fn scan_snapshot(&self, snapshot: &Snapshot, bytes: &[u8]) -> MatchVerdict {
        let hash = ContentHash::from_bytes(bytes);
        if snapshot.check_exact(&hash) {
            debug!(hash = %hash, generation = snapshot.generation(), "Exact match");
            return MatchVerdict::ExactMatch;
        }

        let descriptors = match self.database.extractor().extract(bytes) {
            Ok(descriptors) => descriptors,
            Err(e) => {
                warn!(hash = %hash, error = %e, "Scanned attachment is not a decodable image");
                return MatchVerdict::NoMatch;
            }
        };

        let verdict = snapshot.check_visual(self.database.matcher(), &descriptors, self.threshold);
        debug!(
            hash = %hash,
            generation = snapshot.generation(),
            descriptors = descriptors.len(),
            verdict = %verdict,
            "Scan complete"
        );
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureExtractor;
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn encode_png(image: GrayImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(image)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn textured(offset: u8) -> Vec<u8> {
        encode_png(ImageBuffer::from_fn(200, 200, |x, y| {
            let block = (x / 8).wrapping_mul(73_856_093) ^ (y / 8).wrapping_mul(19_349_663);
            let value = 20 + ((block.wrapping_mul(2_654_435_761) >> 24) % 180) as u8;
            Luma([value.saturating_add(offset)])
        }))
    }

    fn gradient() -> Vec<u8> {
        encode_png(ImageBuffer::from_fn(200, 200, |x, _| Luma([x as u8])))
    }

    fn pipeline_with(files: &[(&str, Vec<u8>)]) -> (TempDir, ScanPipeline) {
        let tmp = TempDir::new().unwrap();
        for (name, bytes) in files {
            fs::write(tmp.path().join(name), bytes).unwrap();
        }
        let db = ReferenceDatabase::open(tmp.path(), Arc::new(FeatureExtractor::default())).unwrap();
        db.rebuild().unwrap();
        (tmp, ScanPipeline::new(Arc::new(db)))
    }

    #[test]
    fn test_supported_attachment() {
        assert!(is_supported_attachment("cat.png"));
        assert!(is_supported_attachment("CAT.JPG"));
        assert!(is_supported_attachment("photo.jpeg"));
        assert!(is_supported_attachment("sticker.webp"));
        assert!(!is_supported_attachment("clip.gif"));
        assert!(!is_supported_attachment("notes.txt"));
        assert!(!is_supported_attachment("png"));
        assert!(!is_supported_attachment(""));
    }

    #[test]
    fn test_identical_bytes_are_exact_match() {
        let (_tmp, pipeline) = pipeline_with(&[("cat.png", textured(0))]);
        assert_eq!(pipeline.scan(&textured(0)), MatchVerdict::ExactMatch);
    }

    #[test]
    fn test_exact_match_without_decodable_image() {
        let (_tmp, pipeline) = pipeline_with(&[("blob.bin", b"opaque bytes".to_vec())]);
        assert_eq!(pipeline.scan(b"opaque bytes"), MatchVerdict::ExactMatch);
    }

    #[test]
    fn test_visually_similar_image_matches() {
        let (_tmp, pipeline) = pipeline_with(&[("cat.png", textured(0))]);
        let verdict = pipeline.scan(&textured(8));
        assert_eq!(verdict.matched_filename(), Some("cat.png"));
        assert!(matches!(verdict, MatchVerdict::VisualMatch { matches, .. } if matches > 25));
    }

    #[test]
    fn test_undecodable_query_is_no_match() {
        let (_tmp, pipeline) = pipeline_with(&[("cat.png", textured(0))]);
        assert_eq!(pipeline.scan(b"definitely not an image"), MatchVerdict::NoMatch);
    }

    #[test]
    fn test_featureless_query_is_no_match() {
        let (_tmp, pipeline) = pipeline_with(&[("cat.png", textured(0))]);
        assert_eq!(pipeline.scan(&gradient()), MatchVerdict::NoMatch);
    }

    #[test]
    fn test_threshold_above_match_count_rejects() {
        let (_tmp, pipeline) = pipeline_with(&[("cat.png", textured(0))]);
        let pipeline = pipeline.with_threshold(usize::MAX);
        assert_eq!(pipeline.scan(&textured(8)), MatchVerdict::NoMatch);
    }
}
