//! Oriented FAST keypoints with steered BRIEF descriptors.
//!
//! Detection and description use `imageproc`'s ORB building blocks:
//! [`oriented_fast`] (FAST-9 corners oriented by intensity centroid, after
//! Rublee et al.) and [`brief`] (integral-image BRIEF tests). This module
//! adds the scale pyramid and steers the BRIEF pattern by each keypoint's
//! quantized orientation.
//!
//! # Algorithm
//!
//! 1. Decode to 8-bit grayscale.
//! 2. Build an image pyramid (default 8 levels, scale factor 1.2).
//! 3. On each level take the strongest oriented FAST corners, away from the
//!    border, up to the level's share of the keypoint cap.
//! 4. Group corners by orientation bin and run 256 BRIEF tests per corner
//!    with the pattern rotated for that bin.
//!
//! # Usage
//!
//! ```no_run
//! use sentry_core::features::FeatureExtractor;
//!
//! let image_data = std::fs::read("image.png").unwrap();
//! let extractor = FeatureExtractor::default();
//! let descriptors = extractor.extract(&image_data).unwrap();
//! println!("{} keypoints", descriptors.len());
//! ```

use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use imageproc::binary_descriptors::brief::{brief, BriefDescriptor};
use imageproc::corners::{oriented_fast, OrientedFastCorner};
use imageproc::point::Point;
use tracing::{debug, warn};

use super::descriptor::{Descriptor, DescriptorSet, Keypoint, DESCRIPTOR_BYTES};
use super::pattern::{orientation_bin, SamplingPattern, ORIENTATION_BINS, PATTERN_PAIRS};
use crate::config::DEFAULT_MAX_KEYPOINTS;
use crate::error::{Result, SentryError};

/// BRIEF needs its 31x31 patch plus one pixel inside the level.
const MIN_BORDER: u32 = 17;

/// Extractor tuning.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Maximum number of keypoints over all pyramid levels
    pub max_keypoints: usize,
    /// Number of pyramid levels
    pub levels: usize,
    /// Downscale factor between consecutive levels
    pub scale_factor: f32,
    /// FAST intensity threshold
    pub fast_threshold: u8,
    /// Pixels at the edge of each level where no keypoint is kept
    pub edge_threshold: u32,
    /// Patch diameter at level 0, reported as keypoint size
    pub patch_size: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_keypoints: DEFAULT_MAX_KEYPOINTS,
            levels: 8,
            scale_factor: 1.2,
            fast_threshold: 20,
            edge_threshold: 31,
            patch_size: 31.0,
        }
    }
}

/// Stateless descriptor extractor, safe to share between threads.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: ExtractorConfig,
    pattern: SamplingPattern,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

impl FeatureExtractor {
    /// Create an extractor with the given configuration.
    pub fn new(mut config: ExtractorConfig) -> Self {
        config.levels = config.levels.max(1);
        config.scale_factor = config.scale_factor.max(1.01);
        Self {
            config,
            pattern: SamplingPattern::new(),
        }
    }

    /// Create an extractor with default tuning and a custom keypoint cap.
    pub fn with_max_keypoints(max_keypoints: usize) -> Self {
        Self::new(ExtractorConfig {
            max_keypoints,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Decode raw bytes and extract their descriptors.
    ///
    /// Supports JPEG, PNG, GIF, and WebP formats. Returns
    /// [`SentryError::Decode`] when the bytes are not a recognizable image;
    /// an image without keypoints yields an empty set.
    pub fn extract(&self, image_data: &[u8]) -> Result<DescriptorSet> {
        let image = image::load_from_memory(image_data)
            .map_err(|e| SentryError::Decode(format!("Failed to decode image: {}", e)))?;

        Ok(self.extract_image(&image))
    }

    /// Extract descriptors from an already decoded image.
    pub fn extract_image(&self, image: &DynamicImage) -> DescriptorSet {
        self.extract_gray(&image.to_luma8())
    }

    /// Extract descriptors from a grayscale image.
    pub fn extract_gray(&self, gray: &GrayImage) -> DescriptorSet {
        let border = self.border();
        let min_side = 2 * border + 1;
        let quotas = level_quotas(
            self.config.max_keypoints,
            self.config.levels,
            self.config.scale_factor,
        );

        let mut set = DescriptorSet::new();
        let mut scale = 1.0f32;

        for (level, quota) in quotas.into_iter().enumerate() {
            let width = (gray.width() as f32 / scale).round() as u32;
            let height = (gray.height() as f32 / scale).round() as u32;
            if width < min_side || height < min_side {
                break;
            }

            let resized: Cow<'_, GrayImage> = if level == 0 {
                Cow::Borrowed(gray)
            } else {
                Cow::Owned(imageops::resize(gray, width, height, FilterType::Triangle))
            };
            let level_image: &GrayImage = &resized;

            if quota > 0 {
                let corners = oriented_fast(
                    level_image,
                    Some(self.config.fast_threshold),
                    quota,
                    border,
                    None,
                );
                let descriptors = self.describe(level_image, &corners);

                for (corner, descriptor) in corners.iter().zip(descriptors) {
                    let Some(descriptor) = descriptor else {
                        continue;
                    };
                    set.push(
                        Keypoint {
                            x: corner.corner.x as f32 * scale,
                            y: corner.corner.y as f32 * scale,
                            size: self.config.patch_size * scale,
                            angle: corner.orientation,
                            response: corner.corner.score,
                            octave: level as u8,
                        },
                        descriptor,
                    );
                }
            }

            scale *= self.config.scale_factor;
        }

        debug!(
            width = gray.width(),
            height = gray.height(),
            keypoints = set.len(),
            "Extracted descriptors"
        );
        set
    }

    fn border(&self) -> u32 {
        self.config.edge_threshold.max(MIN_BORDER)
    }

    /// Steered BRIEF descriptors, aligned with `corners`.
    fn describe(
        &self,
        image: &GrayImage,
        corners: &[OrientedFastCorner],
    ) -> Vec<Option<Descriptor>> {
        let mut by_bin: Vec<Vec<usize>> = vec![Vec::new(); ORIENTATION_BINS];
        for (idx, corner) in corners.iter().enumerate() {
            by_bin[orientation_bin(corner.orientation)].push(idx);
        }

        let mut out = vec![None; corners.len()];
        for (bin, members) in by_bin.iter().enumerate() {
            if members.is_empty() {
                continue;
            }
            let points: Vec<Point<u32>> = members
                .iter()
                .map(|&idx| Point::new(corners[idx].corner.x, corners[idx].corner.y))
                .collect();

            match brief(image, &points, PATTERN_PAIRS, Some(self.pattern.steered(bin))) {
                Ok((descriptors, _)) => {
                    for (&idx, descriptor) in members.iter().zip(&descriptors) {
                        out[idx] = Some(to_descriptor(descriptor));
                    }
                }
                Err(e) => warn!(bin, keypoints = points.len(), error = %e, "BRIEF failed"),
            }
        }
        out
    }
}

fn to_descriptor(brief: &BriefDescriptor) -> Descriptor {
    let mut descriptor = [0u8; DESCRIPTOR_BYTES];
    for (chunk, bits) in descriptor.chunks_exact_mut(16).zip(&brief.bits) {
        chunk.copy_from_slice(&bits.to_le_bytes());
    }
    descriptor
}

/// Split `total` keypoints over `levels` as a geometric series, so each
/// level gets a share proportional to its area.
fn level_quotas(total: usize, levels: usize, scale_factor: f32) -> Vec<usize> {
    if levels <= 1 {
        return vec![total];
    }

    let factor = 1.0 / scale_factor;
    let mut desired = total as f32 * (1.0 - factor) / (1.0 - factor.powi(levels as i32));
    let mut quotas = Vec::with_capacity(levels);
    let mut assigned = 0usize;

    for _ in 0..levels - 1 {
        let quota = (desired.round() as usize).min(total - assigned);
        quotas.push(quota);
        assigned += quota;
        desired *= factor;
    }
    quotas.push(total - assigned);
    quotas
}
