//! Test-pair pattern for the steered BRIEF descriptor.
//!
//! The base pattern is derived from a fixed SHA3-256 seed so that every
//! extractor built in a process produces comparable descriptors. It is
//! pre-rotated into [`ORIENTATION_BINS`] copies, one per quantized
//! keypoint orientation, in the patch coordinates `imageproc`'s BRIEF
//! expects.

use std::f32::consts::TAU;

use imageproc::binary_descriptors::brief::TestPair;
use imageproc::point::Point;
use rand::{rngs::StdRng, Rng, SeedableRng};
use sha3::{Digest, Sha3_256};

use super::descriptor::DESCRIPTOR_BYTES;

/// One intensity test per descriptor bit.
pub(crate) const PATTERN_PAIRS: usize = DESCRIPTOR_BYTES * 8;

/// Sample offsets lie within this distance of the patch centre, so a
/// rotated offset still fits the 31x31 BRIEF patch.
pub(crate) const PATTERN_RADIUS: i32 = 14;

/// Orientations are quantized to 12 degree steps.
pub(crate) const ORIENTATION_BINS: usize = 30;

/// Centre of the 31x31 patch in patch coordinates.
const PATCH_CENTRE: i32 = 15;

const PATTERN_DOMAIN: &[u8] = b"sentry-steered-brief-pattern-v2";

/// Two sample offsets compared by one test, relative to the keypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SamplePair {
    pub a: (i32, i32),
    pub b: (i32, i32),
}

#[derive(Debug, Clone)]
pub(crate) struct SamplingPattern {
    pairs: Vec<SamplePair>,
    steered: Vec<Vec<TestPair>>,
}

impl SamplingPattern {
    pub(crate) fn new() -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(PATTERN_DOMAIN);
        let result = hasher.finalize();

        let mut seed = [0u8; 32];
        seed.copy_from_slice(&result);
        let mut rng = StdRng::from_seed(seed);

        let pairs: Vec<SamplePair> = (0..PATTERN_PAIRS)
            .map(|_| loop {
                let a = sample_offset(&mut rng);
                let b = sample_offset(&mut rng);
                if a != b {
                    break SamplePair { a, b };
                }
            })
            .collect();

        let steered = (0..ORIENTATION_BINS)
            .map(|bin| steer(&pairs, bin_angle(bin)))
            .collect();

        Self { pairs, steered }
    }

    pub(crate) fn pairs(&self) -> &[SamplePair] {
        &self.pairs
    }

    /// Test pairs rotated for one orientation bin.
    pub(crate) fn steered(&self, bin: usize) -> &Vec<TestPair> {
        &self.steered[bin % ORIENTATION_BINS]
    }
}

/// Orientation bin of an angle in radians.
pub(crate) fn orientation_bin(angle: f32) -> usize {
    let turns = angle.rem_euclid(TAU) / TAU;
    ((turns * ORIENTATION_BINS as f32) as usize).min(ORIENTATION_BINS - 1)
}

fn bin_angle(bin: usize) -> f32 {
    bin as f32 * TAU / ORIENTATION_BINS as f32
}

fn steer(pairs: &[SamplePair], angle: f32) -> Vec<TestPair> {
    let (sin, cos) = angle.sin_cos();
    let rotate = |(x, y): (i32, i32)| {
        let (x, y) = (x as f32, y as f32);
        let rx = (x * cos - y * sin).round() as i32;
        let ry = (x * sin + y * cos).round() as i32;
        Point::new((rx + PATCH_CENTRE) as u32, (ry + PATCH_CENTRE) as u32)
    };

    pairs
        .iter()
        .map(|pair| TestPair {
            p0: rotate(pair.a),
            p1: rotate(pair.b),
        })
        .collect()
}

fn sample_offset(rng: &mut StdRng) -> (i32, i32) {
    loop {
        let x = rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS);
        let y = rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS);
        if x * x + y * y <= PATTERN_RADIUS * PATTERN_RADIUS {
            return (x, y);
        }
    }
}
