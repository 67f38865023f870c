#![no_main]

//! Fuzz target for descriptor extraction
//!
//! Arbitrary bytes must either fail to decode or yield a well-formed set;
//! the extractor must never panic.
//!
//! Run with: cargo +nightly fuzz run fuzz_extract

use libfuzzer_sys::fuzz_target;
use sentry_core::FeatureExtractor;

fuzz_target!(|data: &[u8]| {
    let extractor = FeatureExtractor::with_max_keypoints(200);
    if let Ok(set) = extractor.extract(data) {
        assert_eq!(set.keypoints().len(), set.descriptors().len());
        assert!(set.len() <= 200);
    }
});
