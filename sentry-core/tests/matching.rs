//! End-to-end matching tests against a real reference directory.
//!
//! Reference and query images are generated with the `image` crate: a
//! blocky high-contrast texture gives plenty of corners, and a brightness
//! shift of the same texture changes every byte while leaving the local
//! structure intact.

use std::fs;
use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma};
use sentry_core::{MatchVerdict, RebuildStats, Sentry, SentryConfig};
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("sentry_core=debug")
        .with_test_writer()
        .try_init();
}

/// Blocky texture with values kept in 20..200 so shifted copies never clip.
fn texture(seed: u32, brightness: u8) -> GrayImage {
    ImageBuffer::from_fn(240, 240, |x, y| {
        let block = (x / 8).wrapping_mul(73_856_093) ^ (y / 8).wrapping_mul(19_349_663) ^ seed;
        let value = 20 + ((block.wrapping_mul(2_654_435_761) >> 24) % 180) as u8;
        Luma([value.saturating_add(brightness)])
    })
}

/// Smooth ramp with no corners at all.
fn gradient() -> GrayImage {
    ImageBuffer::from_fn(240, 240, |x, y| Luma([((x + y) / 2) as u8]))
}

fn encode(image: GrayImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(image)
        .write_to(&mut buffer, format)
        .expect("encoding failed");
    buffer.into_inner()
}

fn png(image: GrayImage) -> Vec<u8> {
    encode(image, ImageFormat::Png)
}

fn config(dir: &TempDir) -> SentryConfig {
    SentryConfig::default()
        .with_reference_dir(dir.path())
        .with_worker_threads(4)
}

async fn start_with(files: &[(&str, Vec<u8>)]) -> (TempDir, Sentry) {
    init_tracing();
    let tmp = TempDir::new().expect("tempdir");
    for (name, bytes) in files {
        fs::write(tmp.path().join(name), bytes).expect("write reference");
    }
    let sentry = Sentry::start(config(&tmp)).await.expect("engine start");
    (tmp, sentry)
}

#[tokio::test]
async fn test_reference_scenario() {
    let cat = png(texture(7, 0));
    let (_tmp, sentry) = start_with(&[("cat.png", cat.clone())]).await;

    // Identical bytes short-circuit on the hash.
    assert_eq!(sentry.scan(cat).await.unwrap(), MatchVerdict::ExactMatch);

    // Same picture, different bytes.
    let verdict = sentry.scan(png(texture(7, 10))).await.unwrap();
    match &verdict {
        MatchVerdict::VisualMatch { filename, matches } => {
            assert_eq!(filename, "cat.png");
            assert!(*matches > 25, "only {matches} mutual matches");
        }
        other => panic!("expected visual match, got {other:?}"),
    }
    assert_eq!(
        verdict.sanction_reason().as_deref(),
        Some("[Auto-Mod] Blacklisted Image: Visual Match (cat.png)")
    );

    // Unrelated image without structure.
    assert_eq!(sentry.scan(png(gradient())).await.unwrap(), MatchVerdict::NoMatch);
}

#[tokio::test]
async fn test_exact_match_regardless_of_extraction() {
    let (_tmp, sentry) = start_with(&[
        ("flat.png", png(gradient())),
        ("corrupt.jpg", b"\xFF\xD8\xFF garbage".to_vec()),
    ])
    .await;

    let stats = sentry.stats();
    assert_eq!(stats.hashes_indexed, 2);
    assert_eq!(stats.descriptor_sets_indexed, 0);

    assert_eq!(
        sentry.scan(png(gradient())).await.unwrap(),
        MatchVerdict::ExactMatch
    );
    assert_eq!(
        sentry.scan(b"\xFF\xD8\xFF garbage".to_vec()).await.unwrap(),
        MatchVerdict::ExactMatch
    );
}

#[tokio::test]
async fn test_unknown_bytes_are_no_match() {
    let (_tmp, sentry) = start_with(&[("cat.png", png(texture(7, 0)))]).await;

    assert_eq!(
        sentry.scan(b"GIF89a but not really".to_vec()).await.unwrap(),
        MatchVerdict::NoMatch
    );
    assert_eq!(sentry.scan(Vec::new()).await.unwrap(), MatchVerdict::NoMatch);
}

#[tokio::test]
async fn test_first_reference_in_filename_order_wins() {
    let (_tmp, sentry) = start_with(&[
        ("b_copy.png", png(texture(7, 5))),
        ("a_original.png", png(texture(7, 0))),
    ])
    .await;

    let verdict = sentry.scan(png(texture(7, 12))).await.unwrap();
    assert_eq!(verdict.matched_filename(), Some("a_original.png"));
}

#[tokio::test]
async fn test_threshold_is_configurable() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("cat.png"), png(texture(7, 0))).unwrap();

    let strict = Sentry::start(config(&tmp).with_match_threshold(100_000))
        .await
        .unwrap();
    assert_eq!(
        strict.scan(png(texture(7, 10))).await.unwrap(),
        MatchVerdict::NoMatch
    );
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let (_tmp, sentry) = start_with(&[
        ("cat.png", png(texture(7, 0))),
        ("dog.png", png(texture(99, 0))),
        ("readme.txt", b"not an image".to_vec()),
    ])
    .await;

    let first = sentry.rebuild().await.unwrap();
    let first_snapshot = sentry.database().snapshot();
    let second = sentry.rebuild().await.unwrap();
    let second_snapshot = sentry.database().snapshot();

    let counts = |s: &RebuildStats| {
        (
            s.files_seen,
            s.hashes_indexed,
            s.descriptor_sets_indexed,
            s.decode_failures,
            s.failures,
        )
    };
    assert_eq!(counts(&first), (3, 3, 2, 1, 0));
    assert_eq!(counts(&first), counts(&second));
    assert_eq!(second.generation, first.generation + 1);
    assert_eq!(first_snapshot.exact(), second_snapshot.exact());
}

#[tokio::test]
async fn test_add_reference_then_scan() {
    let (tmp, sentry) = start_with(&[]).await;
    let meme = png(texture(3, 0));

    assert_eq!(sentry.scan(meme.clone()).await.unwrap(), MatchVerdict::NoMatch);

    let added = sentry
        .add_reference_with_id("1189", "meme.png", meme.clone())
        .await
        .unwrap();
    assert_eq!(added.stored_as, "1189_meme.png");
    assert!(tmp.path().join("1189_meme.png").is_file());
    assert_eq!(added.stats.hashes_indexed, 1);
    assert_eq!(added.stats.descriptor_sets_indexed, 1);

    assert_eq!(sentry.scan(meme).await.unwrap(), MatchVerdict::ExactMatch);
    assert_eq!(
        sentry
            .scan(png(texture(3, 9)))
            .await
            .unwrap()
            .matched_filename(),
        Some("1189_meme.png")
    );
}

#[tokio::test]
async fn test_persist_failure_leaves_database_unchanged() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let refs = tmp.path().join("refs");
    fs::create_dir(&refs).unwrap();
    fs::write(refs.join("cat.png"), png(texture(7, 0))).unwrap();

    let sentry = Sentry::start(
        SentryConfig::default()
            .with_reference_dir(&refs)
            .with_worker_threads(2),
    )
    .await
    .unwrap();
    let before = sentry.stats();

    // The target directory disappears underneath the engine.
    fs::remove_dir_all(&refs).unwrap();
    let err = sentry
        .add_reference("new.png", png(texture(8, 0)))
        .await
        .unwrap_err();

    assert!(err.is_persist_failure(), "unexpected error: {err}");
    let after = sentry.stats();
    assert_eq!(after.references, before.references);
    assert_eq!(after.generation, before.generation);
    assert_eq!(
        sentry.scan(png(texture(7, 0))).await.unwrap(),
        MatchVerdict::ExactMatch
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scans_during_rebuilds_see_one_generation() {
    let cat = png(texture(7, 0));
    let (tmp, sentry) = start_with(&[("cat.png", cat.clone())]).await;
    let sentry = Arc::new(sentry);

    let writer = {
        let sentry = Arc::clone(&sentry);
        tokio::spawn(async move {
            for i in 0..5u32 {
                sentry
                    .add_reference_with_id(format!("{i}"), "extra.png", png(texture(1000 + i, 0)))
                    .await
                    .unwrap();
            }
        })
    };

    let mut readers = Vec::new();
    for i in 0..20u8 {
        let sentry = Arc::clone(&sentry);
        let exact = cat.clone();
        readers.push(tokio::spawn(async move {
            if i % 2 == 0 {
                sentry.scan(exact).await.unwrap()
            } else {
                sentry.scan(png(texture(7, 10))).await.unwrap()
            }
        }));
    }

    for (i, reader) in readers.into_iter().enumerate() {
        let verdict = reader.await.unwrap();
        if i % 2 == 0 {
            assert_eq!(verdict, MatchVerdict::ExactMatch);
        } else {
            // Added references sort before cat.png, so the winner may be
            // any of them, but it must exist in some generation.
            let filename = verdict.matched_filename().expect("visual match").to_string();
            assert!(
                filename == "cat.png" || tmp.path().join(&filename).is_file(),
                "verdict names unknown reference {filename}"
            );
        }
    }

    writer.await.unwrap();
    let stats = sentry.stats();
    assert_eq!(stats.references, 6);
    assert_eq!(stats.generation, 6);
}
