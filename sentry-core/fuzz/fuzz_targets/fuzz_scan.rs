#![no_main]

//! Fuzz target for the scan pipeline
//!
//! Scans arbitrary bytes against an empty database; any input must resolve
//! to a verdict without panicking.
//!
//! Run with: cargo +nightly fuzz run fuzz_scan

use std::sync::{Arc, OnceLock};

use libfuzzer_sys::fuzz_target;
use sentry_core::{FeatureExtractor, MatchVerdict, ReferenceDatabase, ScanPipeline};

fn pipeline() -> &'static ScanPipeline {
    static PIPELINE: OnceLock<ScanPipeline> = OnceLock::new();
    PIPELINE.get_or_init(|| {
        let dir = std::env::temp_dir().join("sentry-fuzz-refs");
        let db = ReferenceDatabase::open(dir, Arc::new(FeatureExtractor::with_max_keypoints(200)))
            .expect("open fuzz database");
        ScanPipeline::new(Arc::new(db))
    })
}

fuzz_target!(|data: &[u8]| {
    // Nothing is indexed, so only the empty snapshot is ever consulted.
    assert_eq!(pipeline().scan(data), MatchVerdict::NoMatch);
});
