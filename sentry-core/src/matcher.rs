//! Visual matching against the perceptual index.
//!
//! A reference qualifies when the number of mutual nearest-neighbour pairs
//! between the query and the reference strictly exceeds the threshold. A
//! pair `(i, j)` counts only if reference descriptor `j` is the closest to
//! query descriptor `i` and query descriptor `i` is the closest to
//! reference descriptor `j`.
//!
//! References are visited in index order and the first one that qualifies
//! wins; results are not ranked by similarity.

use tracing::trace;

use crate::features::{hamming_distance, Descriptor, DescriptorSet};
use crate::index::PerceptualIndex;
use crate::verdict::MatchVerdict;

/// Strategy for counting correspondences between two descriptor sets.
///
/// Implementations must be thread-safe (`Send + Sync`). Swapping in an
/// indexed nearest-neighbour structure only requires a new implementor.
pub trait VisualMatcher: Send + Sync {
    /// Count mutual nearest-neighbour pairs between `query` and `reference`.
    fn mutual_matches(&self, query: &DescriptorSet, reference: &DescriptorSet) -> usize;

    /// Scan `index` in order and return the first reference whose mutual
    /// match count is greater than `threshold`.
    fn find_match(
        &self,
        query: &DescriptorSet,
        index: &PerceptualIndex,
        threshold: usize,
    ) -> MatchVerdict {
        if query.is_empty() {
            return MatchVerdict::NoMatch;
        }

        for entry in index.iter() {
            let matches = self.mutual_matches(query, &entry.descriptors);
            trace!(reference = %entry.filename, matches, threshold, "Compared reference");
            if matches > threshold {
                return MatchVerdict::VisualMatch {
                    filename: entry.filename.clone(),
                    matches,
                };
            }
        }

        MatchVerdict::NoMatch
    }
}

/// Exhaustive Hamming-distance matcher with cross-checking.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceMatcher;

impl VisualMatcher for BruteForceMatcher {
    fn mutual_matches(&self, query: &DescriptorSet, reference: &DescriptorSet) -> usize {
        let query = query.descriptors();
        let reference = reference.descriptors();
        if query.is_empty() || reference.is_empty() {
            return 0;
        }

        let backward: Vec<usize> = reference
            .iter()
            .filter_map(|r| nearest(r, query))
            .collect();

        query
            .iter()
            .enumerate()
            .filter(|(i, q)| nearest(q, reference).is_some_and(|j| backward[j] == *i))
            .count()
    }
}

/// Index of the closest descriptor in `haystack`; ties go to the lowest index.
fn nearest(needle: &Descriptor, haystack: &[Descriptor]) -> Option<usize> {
    haystack
        .iter()
        .enumerate()
        .min_by_key(|(idx, candidate)| (hamming_distance(needle, candidate), *idx))
        .map(|(idx, _)| idx)
}
