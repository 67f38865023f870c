//! Reference database: the exact and perceptual indices behind one
//! atomically replaceable snapshot.
//!
//! The reference directory is the only source of truth. A rebuild lists it,
//! hashes and describes every regular file, builds a brand new [`Snapshot`]
//! and swaps it in. Readers clone the current `Arc<Snapshot>` and keep using
//! it for the whole query, so a rebuild finishing mid-query is never
//! observed as a mix of two generations.
//!
//! # Usage pattern
//!
//! ```no_run
//! use std::sync::Arc;
//! use sentry_core::{ContentHash, FeatureExtractor, ReferenceDatabase};
//!
//! # fn example() -> sentry_core::Result<()> {
//! let db = ReferenceDatabase::open("blacklist_photos", Arc::new(FeatureExtractor::default()))?;
//! let stats = db.rebuild()?;
//! println!("{} hashes indexed", stats.hashes_indexed);
//!
//! let bytes = std::fs::read("incoming.png").unwrap();
//! let snapshot = db.snapshot();
//! let is_known = snapshot.check_exact(&ContentHash::from_bytes(&bytes));
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, SentryError};
use crate::features::{DescriptorSet, FeatureExtractor};
use crate::hash::ContentHash;
use crate::index::{ExactIndex, PerceptualIndex};
use crate::matcher::{BruteForceMatcher, VisualMatcher};
use crate::verdict::MatchVerdict;

/// Prefix of files still being written by [`ReferenceDatabase::add_reference`].
///
/// Stored names always start with a sanitised attachment id, which never
/// begins with a dot, so no stored reference can carry this prefix.
const UPLOAD_TEMP_PREFIX: &str = ".sentry-upload-";

/// Longest filename component kept when storing a new reference.
const MAX_STORED_NAME_LEN: usize = 128;

/// One indexed reference file.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    /// Stable identifier (file stem)
    pub id: String,
    /// Filename inside the reference directory
    pub filename: String,
    /// Size of the raw file in bytes
    pub byte_len: u64,
    /// Digest of the raw bytes
    pub hash: ContentHash,
    /// `None` when the file could not be decoded as an image
    pub descriptors: Option<Arc<DescriptorSet>>,
}

/// Counts reported by a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildStats {
    /// Generation published by this rebuild
    pub generation: u64,
    /// Regular files found in the reference directory
    pub files_seen: usize,
    /// Distinct content hashes in the exact index
    pub hashes_indexed: usize,
    /// References with at least one descriptor
    pub descriptor_sets_indexed: usize,
    /// Files read and hashed but not decodable as images
    pub decode_failures: usize,
    /// Files that could not be read at all
    pub failures: usize,
    /// Wall-clock time of the rebuild
    pub duration_ms: u64,
}

/// Summary of the currently published snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    pub references: usize,
    pub hashes_indexed: usize,
    pub descriptor_sets_indexed: usize,
}

/// Result of persisting a new reference image.
#[derive(Debug, Clone)]
pub struct AddedReference {
    /// Filename the bytes were stored under
    pub stored_as: String,
    /// Full path of the stored file
    pub path: PathBuf,
    /// Stats of the rebuild triggered by the add
    pub stats: RebuildStats,
}

/// Paired indices of one generation. Immutable once published.
#[derive(Debug)]
pub struct Snapshot {
    generation: u64,
    built_at: DateTime<Utc>,
    references: Vec<ReferenceImage>,
    exact: ExactIndex,
    perceptual: PerceptualIndex,
}

impl Snapshot {
    /// The generation-zero snapshot served before the first rebuild.
    pub fn empty() -> Self {
        Self::build(0, Vec::new())
    }

    fn build(generation: u64, references: Vec<ReferenceImage>) -> Self {
        let exact = ExactIndex::from_hashes(references.iter().map(|r| r.hash));
        let perceptual = PerceptualIndex::build_from(references.iter().filter_map(|r| {
            r.descriptors
                .as_ref()
                .map(|descriptors| (r.filename.clone(), Arc::clone(descriptors)))
        }));

        Self {
            generation,
            built_at: Utc::now(),
            references,
            exact,
            perceptual,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn references(&self) -> &[ReferenceImage] {
        &self.references
    }

    pub fn exact(&self) -> &ExactIndex {
        &self.exact
    }

    pub fn perceptual(&self) -> &PerceptualIndex {
        &self.perceptual
    }

    pub fn check_exact(&self, hash: &ContentHash) -> bool {
        self.exact.contains(hash)
    }

    pub fn check_visual(
        &self,
        matcher: &dyn VisualMatcher,
        descriptors: &DescriptorSet,
        threshold: usize,
    ) -> MatchVerdict {
        matcher.find_match(descriptors, &self.perceptual, threshold)
    }

    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            generation: self.generation,
            built_at: self.built_at,
            references: self.references.len(),
            hashes_indexed: self.exact.len(),
            descriptor_sets_indexed: self.perceptual.len(),
        }
    }
}

/// Owner of the published snapshot and of the reference directory.
///
/// Reads never wait on a rebuild beyond cloning the snapshot pointer.
/// Rebuilds are serialized so generations are published in order.
pub struct ReferenceDatabase {
    dir: PathBuf,
    extractor: Arc<FeatureExtractor>,
    matcher: Arc<dyn VisualMatcher>,
    current: RwLock<Arc<Snapshot>>,
    rebuild_lock: Mutex<()>,
}

impl std::fmt::Debug for ReferenceDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceDatabase")
            .field("dir", &self.dir)
            .field("generation", &self.snapshot().generation())
            .finish()
    }
}

impl ReferenceDatabase {
    /// Open a database over `dir`, creating the directory if needed.
    ///
    /// The database starts with an empty snapshot; call
    /// [`rebuild`](Self::rebuild) before serving queries.
    pub fn open(dir: impl Into<PathBuf>, extractor: Arc<FeatureExtractor>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| SentryError::IndexRead {
            path: dir.clone(),
            source,
        })?;

        debug!(dir = %dir.display(), "Reference database opened");
        Ok(Self {
            dir,
            extractor,
            matcher: Arc::new(BruteForceMatcher),
            current: RwLock::new(Arc::new(Snapshot::empty())),
            rebuild_lock: Mutex::new(()),
        })
    }

    /// Replace the visual matching strategy.
    pub fn with_matcher(mut self, matcher: Arc<dyn VisualMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn reference_dir(&self) -> &Path {
        &self.dir
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn matcher(&self) -> &dyn VisualMatcher {
        self.matcher.as_ref()
    }

    /// Get the current snapshot.
    ///
    /// The returned `Arc` stays valid across concurrent rebuilds; the old
    /// snapshot is dropped when its last reader lets go.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn check_exact(&self, hash: &ContentHash) -> bool {
        self.snapshot().check_exact(hash)
    }

    pub fn check_visual(&self, descriptors: &DescriptorSet, threshold: usize) -> MatchVerdict {
        self.snapshot()
            .check_visual(self.matcher(), descriptors, threshold)
    }

    pub fn stats(&self) -> DatabaseStats {
        self.snapshot().stats()
    }

    /// Re-scan the reference directory and publish a new snapshot.
    ///
    /// Unreadable files are skipped and counted in `failures`; files that
    /// are readable but not images are still hashed. Only a failure to list
    /// the directory itself is an error, and it leaves the current snapshot
    /// in place.
    ///
    /// File processing runs on the current rayon pool.
    #[instrument(level = "info", skip_all, fields(dir = %self.dir.display()))]
    pub fn rebuild(&self) -> Result<RebuildStats> {
        let _writer = self
            .rebuild_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();

        let listing = list_reference_files(&self.dir)?;
        Ok(self.index_and_publish(listing, started))
    }

    fn index_and_publish(&self, listing: Listing, started: Instant) -> RebuildStats {
        let Listing { files, unreadable } = listing;
        info!(files = files.len(), unreadable, "Indexing reference images");

        let outcomes: Vec<Option<ReferenceImage>> = files
            .par_iter()
            .map(|(filename, path)| self.index_file(filename, path))
            .collect();

        let failures = unreadable + outcomes.iter().filter(|o| o.is_none()).count();
        let references: Vec<ReferenceImage> = outcomes.into_iter().flatten().collect();
        let decode_failures = references
            .iter()
            .filter(|r| r.descriptors.is_none())
            .count();

        let generation = self.snapshot().generation() + 1;
        let snapshot = Snapshot::build(generation, references);

        let stats = RebuildStats {
            generation,
            files_seen: files.len(),
            hashes_indexed: snapshot.exact().len(),
            descriptor_sets_indexed: snapshot.perceptual().len(),
            decode_failures,
            failures,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        self.publish(snapshot);

        info!(
            generation,
            hashes = stats.hashes_indexed,
            descriptor_sets = stats.descriptor_sets_indexed,
            decode_failures,
            failures,
            duration_ms = stats.duration_ms,
            "Database synced"
        );
        stats
    }

    /// Store a new reference under a generated attachment id, then rebuild.
    pub fn add_reference(&self, filename: &str, bytes: &[u8]) -> Result<AddedReference> {
        self.add_reference_with_id(&Uuid::new_v4().to_string(), filename, bytes)
    }

    /// Store a new reference as `<attachment_id>_<filename>`, then rebuild.
    ///
    /// An existing file is never overwritten. On a persist failure nothing
    /// is left behind in the directory and no rebuild happens.
    #[instrument(level = "info", skip(self, bytes), fields(bytes = bytes.len()))]
    pub fn add_reference_with_id(
        &self,
        attachment_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<AddedReference> {
        let stored_as = format!(
            "{}_{}",
            sanitize_component(attachment_id, "attachment"),
            sanitize_component(filename, "image")
        );
        let path = self.dir.join(&stored_as);

        persist_new_file(&path, bytes).map_err(|source| {
            error!(path = %path.display(), error = %source, "Failed to persist reference");
            SentryError::Persist {
                path: path.clone(),
                source,
            }
        })?;
        info!(stored_as = %stored_as, "Reference persisted");

        let stats = self.rebuild()?;
        Ok(AddedReference {
            stored_as,
            path,
            stats,
        })
    }

    fn publish(&self, snapshot: Snapshot) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        debug!(
            old_generation = guard.generation(),
            new_generation = snapshot.generation(),
            "Publishing snapshot"
        );
        *guard = Arc::new(snapshot);
    }

    fn index_file(&self, filename: &str, path: &Path) -> Option<ReferenceImage> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                error!(file = %filename, error = %e, "Failed to index reference");
                return None;
            }
        };

        let hash = ContentHash::from_bytes(&data);
        let descriptors = match self.extractor.extract(&data) {
            Ok(set) => Some(Arc::new(set)),
            Err(e) => {
                warn!(file = %filename, error = %e, "Reference is not a decodable image, hash only");
                None
            }
        };

        Some(ReferenceImage {
            id: file_stem(filename),
            filename: filename.to_string(),
            byte_len: data.len() as u64,
            hash,
            descriptors,
        })
    }
}

/// Files found in the reference directory.
#[derive(Debug, Default)]
struct Listing {
    /// `(filename, path)` pairs sorted by filename
    files: Vec<(String, PathBuf)>,
    /// Directory entries that could not be read at all
    unreadable: usize,
}

/// Every non-directory entry in `dir` except in-flight uploads.
///
/// Entries whose metadata cannot be read (broken links) stay listed so
/// that the read failure is reported when the file is indexed.
fn list_reference_files(dir: &Path) -> Result<Listing> {
    let entries = fs::read_dir(dir).map_err(|source| SentryError::IndexRead {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut listing = Listing::default();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Unreadable directory entry");
                listing.unreadable += 1;
                continue;
            }
        };

        let filename = entry.file_name().to_string_lossy().into_owned();
        if filename.starts_with(UPLOAD_TEMP_PREFIX) {
            continue;
        }

        let path = entry.path();
        match fs::metadata(&path) {
            Ok(meta) if !meta.is_file() => continue,
            Ok(_) => {}
            Err(e) => debug!(file = %filename, error = %e, "Cannot stat reference"),
        }
        listing.files.push((filename, path));
    }

    listing.files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(listing)
}

/// Stage `bytes` in a temporary file next to `target`, then link it into
/// place. Fails with `AlreadyExists` if `target` exists by then.
fn persist_new_file(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::Builder::new()
        .prefix(UPLOAD_TEMP_PREFIX)
        .tempfile_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;

    staged
        .persist_noclobber(target)
        .map(|_| ())
        .map_err(|e| e.error)
}

/// Keep only the final path component, restricted to `[A-Za-z0-9._-]`.
fn sanitize_component(raw: &str, fallback: &str) -> String {
    let last = Path::new(raw)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STORED_NAME_LEN)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}
