use std::collections::HashSet;

use crate::hash::ContentHash;

/// Set of content hashes of every loaded reference image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExactIndex {
    hashes: HashSet<ContentHash>,
}

impl ExactIndex {
    /// Hash every image and index the digests.
    pub fn build_from<I>(images: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        Self::from_hashes(
            images
                .into_iter()
                .map(|bytes| ContentHash::from_bytes(bytes.as_ref())),
        )
    }

    /// Index already computed digests.
    pub fn from_hashes(hashes: impl IntoIterator<Item = ContentHash>) -> Self {
        Self {
            hashes: hashes.into_iter().collect(),
        }
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.hashes.contains(hash)
    }

    /// Number of distinct hashes.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentHash> {
        self.hashes.iter()
    }
}
