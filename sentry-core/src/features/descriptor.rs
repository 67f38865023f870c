//! Binary descriptors and descriptor sets.

use serde::{Deserialize, Serialize};

/// Descriptor length in bytes (256 bits).
pub const DESCRIPTOR_BYTES: usize = 32;

/// A 256-bit binary feature descriptor.
pub type Descriptor = [u8; DESCRIPTOR_BYTES];

/// Location and shape of a detected keypoint, in full-resolution pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Diameter of the described patch at full resolution
    pub size: f32,
    /// Dominant orientation in radians
    pub angle: f32,
    /// Detector response (higher is stronger)
    pub response: f32,
    /// Pyramid level the keypoint was detected on
    pub octave: u8,
}

/// Ordered descriptors of one image, one per keypoint.
///
/// An empty set is valid: the image had no detectable keypoints and can
/// only ever match through its content hash.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorSet {
    keypoints: Vec<Keypoint>,
    descriptors: Vec<Descriptor>,
}

impl DescriptorSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from descriptors alone (keypoint geometry unknown).
    pub fn from_descriptors(descriptors: Vec<Descriptor>) -> Self {
        let keypoints = descriptors
            .iter()
            .map(|_| Keypoint {
                x: 0.0,
                y: 0.0,
                size: 0.0,
                angle: 0.0,
                response: 0.0,
                octave: 0,
            })
            .collect();
        Self {
            keypoints,
            descriptors,
        }
    }

    pub(crate) fn push(&mut self, keypoint: Keypoint, descriptor: Descriptor) {
        self.keypoints.push(keypoint);
        self.descriptors.push(descriptor);
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }
}

/// Number of differing bits between two descriptors.
#[inline]
pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamming_distance_identical() {
        let a = [0xAA; DESCRIPTOR_BYTES];
        assert_eq!(hamming_distance(&a, &a), 0);
    }

    #[test]
    fn test_hamming_distance_opposite() {
        let a = [0x00; DESCRIPTOR_BYTES];
        let b = [0xFF; DESCRIPTOR_BYTES];
        assert_eq!(hamming_distance(&a, &b), 256);
    }

    #[test]
    fn test_hamming_distance_partial() {
        let a = [0x00; DESCRIPTOR_BYTES];
        let mut b = [0x00; DESCRIPTOR_BYTES];
        b[0] = 0x01;
        b[31] = 0x80;
        assert_eq!(hamming_distance(&a, &b), 2);
    }

    #[test]
    fn test_empty_set() {
        let set = DescriptorSet::new();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_from_descriptors_keeps_order() {
        let set = DescriptorSet::from_descriptors(vec![[1; 32], [2; 32], [3; 32]]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.keypoints().len(), 3);
        assert_eq!(set.descriptors()[1], [2; 32]);
    }
}
