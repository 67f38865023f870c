use std::sync::Arc;

use crate::features::DescriptorSet;

/// One reference image in scan order.
#[derive(Debug, Clone)]
pub struct PerceptualEntry {
    pub filename: String,
    pub descriptors: Arc<DescriptorSet>,
}

/// Reference descriptor sets in build order.
///
/// Only references with at least one descriptor are kept: an empty set can
/// never produce a mutual match.
#[derive(Debug, Clone, Default)]
pub struct PerceptualIndex {
    entries: Vec<PerceptualEntry>,
}

impl PerceptualIndex {
    pub fn build_from<I, D>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, D)>,
        D: Into<Arc<DescriptorSet>>,
    {
        let entries = entries
            .into_iter()
            .map(|(filename, descriptors)| PerceptualEntry {
                filename,
                descriptors: descriptors.into(),
            })
            .filter(|entry| !entry.descriptors.is_empty())
            .collect();
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PerceptualEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_filename(&self, filename: &str) -> bool {
        self.entries.iter().any(|entry| entry.filename == filename)
    }
}
