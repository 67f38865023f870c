//! The process-wide engine: one database, one pipeline, one worker pool.
//!
//! Every CPU-bound step (hashing, extraction, matching, indexing) is
//! submitted to the [`WorkerPool`]; async callers only wait on the result.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::config::SentryConfig;
use crate::database::{AddedReference, DatabaseStats, RebuildStats, ReferenceDatabase};
use crate::error::Result;
use crate::features::FeatureExtractor;
use crate::pipeline::ScanPipeline;
use crate::pool::WorkerPool;
use crate::verdict::MatchVerdict;

/// Content-matching engine with an explicit `start`/`rebuild`/`shutdown`
/// lifecycle.
///
/// # Example
///
/// ```no_run
/// use sentry_core::{Sentry, SentryConfig};
///
/// # async fn example() -> sentry_core::Result<()> {
/// let sentry = Sentry::start(SentryConfig::from_env()).await?;
///
/// let bytes = std::fs::read("attachment.png").unwrap();
/// let verdict = sentry.scan(bytes).await?;
/// if let Some(reason) = verdict.sanction_reason() {
///     println!("{reason}");
/// }
///
/// sentry.shutdown();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Sentry {
    config: SentryConfig,
    database: Arc<ReferenceDatabase>,
    pipeline: ScanPipeline,
    pool: WorkerPool,
    // Owned by the running writer job so that two rebuild jobs never share
    // a worker thread through work stealing.
    rebuild_gate: Arc<Mutex<()>>,
}

impl Sentry {
    /// Build the engine with an empty snapshot. No files are read.
    pub fn open(config: SentryConfig) -> Result<Self> {
        let extractor = FeatureExtractor::with_max_keypoints(config.max_keypoints);
        let database = Arc::new(ReferenceDatabase::open(
            config.reference_dir.clone(),
            Arc::new(extractor),
        )?);
        let pipeline = ScanPipeline::new(Arc::clone(&database)).with_threshold(config.match_threshold);
        let pool = WorkerPool::new(config.worker_threads)?;

        info!(
            dir = %config.reference_dir.display(),
            threshold = config.match_threshold,
            workers = pool.threads(),
            max_keypoints = config.max_keypoints,
            "Sentry engine initialized"
        );

        Ok(Self {
            config,
            database,
            pipeline,
            pool,
            rebuild_gate: Arc::new(Mutex::new(())),
        })
    }

    /// Open the engine and run the initial rebuild before returning.
    pub async fn start(config: SentryConfig) -> Result<Self> {
        let sentry = Self::open(config)?;
        sentry.rebuild().await?;
        Ok(sentry)
    }

    pub fn config(&self) -> &SentryConfig {
        &self.config
    }

    pub fn database(&self) -> &Arc<ReferenceDatabase> {
        &self.database
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Scan one attachment on the worker pool.
    pub async fn scan(&self, bytes: Vec<u8>) -> Result<MatchVerdict> {
        let pipeline = self.pipeline.clone();
        self.pool.submit(move || pipeline.scan(&bytes)).await
    }

    /// Re-index the reference directory on the worker pool.
    #[instrument(level = "debug", skip(self))]
    pub async fn rebuild(&self) -> Result<RebuildStats> {
        self.submit_writer(|database| database.rebuild()).await
    }

    /// Persist a new reference under a generated id, then re-index.
    pub async fn add_reference(
        &self,
        filename: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<AddedReference> {
        let filename = filename.into();
        self.submit_writer(move |database| database.add_reference(&filename, &bytes))
            .await
    }

    /// Persist a new reference as `<attachment_id>_<filename>`, then re-index.
    pub async fn add_reference_with_id(
        &self,
        attachment_id: impl Into<String>,
        filename: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<AddedReference> {
        let attachment_id = attachment_id.into();
        let filename = filename.into();
        self.submit_writer(move |database| {
            database.add_reference_with_id(&attachment_id, &filename, &bytes)
        })
        .await
    }

    /// Run a database writer on the pool while holding the rebuild gate.
    ///
    /// The guard moves into the job, so it is released when the job ends
    /// even if the caller stops waiting first.
    async fn submit_writer<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&ReferenceDatabase) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let gate = Arc::clone(&self.rebuild_gate).lock_owned().await;
        let database = Arc::clone(&self.database);
        self.pool
            .submit(move || {
                let _gate = gate;
                job(&database)
            })
            .await?
    }

    pub fn stats(&self) -> DatabaseStats {
        self.database.stats()
    }

    /// Stop the engine. Jobs already queued on the pool still run to
    /// completion before the worker threads exit.
    pub fn shutdown(self) {
        let stats = self.database.stats();
        info!(
            generation = stats.generation,
            references = stats.references,
            "Sentry engine shutting down"
        );
        drop(self.pool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> SentryConfig {
        SentryConfig::default()
            .with_reference_dir(dir.path())
            .with_worker_threads(2)
    }

    #[tokio::test]
    async fn test_open_serves_empty_snapshot() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("blob.bin"), b"payload").unwrap();

        let sentry = Sentry::open(config(&tmp)).unwrap();
        assert_eq!(sentry.stats().generation, 0);
        assert_eq!(sentry.scan(b"payload".to_vec()).await.unwrap(), MatchVerdict::NoMatch);
    }

    #[tokio::test]
    async fn test_start_runs_initial_rebuild() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("blob.bin"), b"payload").unwrap();

        let sentry = Sentry::start(config(&tmp)).await.unwrap();
        assert_eq!(sentry.stats().generation, 1);
        assert_eq!(sentry.pool().threads(), 2);
        assert_eq!(
            sentry.scan(b"payload".to_vec()).await.unwrap(),
            MatchVerdict::ExactMatch
        );
        sentry.shutdown();
    }

    #[tokio::test]
    async fn test_add_reference_is_visible_to_next_scan() {
        let tmp = TempDir::new().unwrap();
        let sentry = Sentry::start(config(&tmp)).await.unwrap();

        let added = sentry
            .add_reference_with_id("42", "meme.png", b"meme bytes".to_vec())
            .await
            .unwrap();
        assert_eq!(added.stored_as, "42_meme.png");
        assert_eq!(added.stats.generation, 2);
        assert_eq!(
            sentry.scan(b"meme bytes".to_vec()).await.unwrap(),
            MatchVerdict::ExactMatch
        );
    }

    #[tokio::test]
    async fn test_concurrent_rebuilds_publish_in_order() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("blob.bin"), b"payload").unwrap();
        let sentry = Arc::new(Sentry::start(config(&tmp)).await.unwrap());

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let sentry = Arc::clone(&sentry);
                tokio::spawn(async move { sentry.rebuild().await.unwrap().generation })
            })
            .collect();

        let mut generations = Vec::new();
        for handle in handles {
            generations.push(handle.await.unwrap());
        }
        generations.sort_unstable();
        assert_eq!(generations, (2..=7).collect::<Vec<u64>>());
        assert_eq!(sentry.stats().generation, 7);
    }

    fn textured_png(seed: u32) -> Vec<u8> {
        let image: image::GrayImage = image::ImageBuffer::from_fn(160, 160, |x, y| {
            let block = (x / 8).wrapping_mul(73_856_093) ^ (y / 8).wrapping_mul(19_349_663) ^ seed;
            image::Luma([(block.wrapping_mul(2_654_435_761) >> 24) as u8])
        });
        let mut buffer = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(image)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[tokio::test]
    async fn test_abandoned_rebuild_does_not_stall_later_rebuilds() {
        use std::time::Duration;

        let tmp = TempDir::new().unwrap();
        for seed in 0..12 {
            std::fs::write(tmp.path().join(format!("ref_{seed:02}.png")), textured_png(seed))
                .unwrap();
        }
        let sentry = Arc::new(
            Sentry::start(config(&tmp).with_worker_threads(4))
                .await
                .unwrap(),
        );

        for _ in 0..3 {
            // Give up on the first rebuild almost immediately; its job keeps running.
            let _ = tokio::time::timeout(Duration::from_millis(1), sentry.rebuild()).await;

            let handles: Vec<_> = (0..3)
                .map(|_| {
                    let sentry = Arc::clone(&sentry);
                    tokio::spawn(async move { sentry.rebuild().await })
                })
                .collect();

            let finished = tokio::time::timeout(Duration::from_secs(120), async {
                for handle in handles {
                    let stats = handle.await.unwrap().unwrap();
                    assert_eq!(stats.files_seen, 12);
                }
            })
            .await;
            assert!(finished.is_ok(), "rebuilds stalled after an abandoned rebuild");
        }

        assert_eq!(sentry.stats().generation, 1 + 3 * 4);
        assert_eq!(sentry.stats().references, 12);
    }
}
