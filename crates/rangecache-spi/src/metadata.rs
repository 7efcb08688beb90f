//! Cache metadata store capability.
//!
//! The coordinator only needs to ask whether a byte range of a file is cached
//! and to record that it now is. Persistence of the block bitmap and eviction
//! belong to the store implementation.

use std::collections::BTreeMap;
use std::ops::Range;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Half-open byte range `[start, end)` of a remote file.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

impl BlockRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Indices of the `block_size` blocks this range touches.
    pub fn blocks(&self, block_size: u64) -> Range<u64> {
        if self.is_empty() || block_size == 0 {
            return 0..0;
        }
        let first = self.start / block_size;
        let last = self.end.div_ceil(block_size);
        first..last
    }

    /// Indices of the `block_size` blocks this range covers entirely.
    pub fn covered_blocks(&self, block_size: u64) -> Range<u64> {
        if self.is_empty() || block_size == 0 {
            return 0..0;
        }
        let first = self.start.div_ceil(block_size);
        let last = self.end / block_size;
        if first >= last {
            return 0..0;
        }
        first..last
    }
}

/// Tracks which ranges of which files are present in the local cache.
pub trait MetadataStore: Send + Sync {
    /// Returns true if every block `range` touches in `file` is cached.
    fn is_cached(&self, file: &str, range: BlockRange) -> bool;

    /// Records the blocks `range` fully covers in `file` as cached.
    fn mark_cached(&self, file: &str, range: BlockRange);
}

/// Disjoint, non-adjacent runs of cached block indices, `start -> end` (half-open).
#[derive(Debug, Default)]
struct BlockRuns {
    runs: BTreeMap<u64, u64>,
}

impl BlockRuns {
    fn insert(&mut self, blocks: Range<u64>) {
        let (mut start, mut end) = (blocks.start, blocks.end);

        if let Some((&s, &e)) = self.runs.range(..=start).next_back() {
            if e >= start {
                start = s;
                end = end.max(e);
            }
        }
        let absorbed: Vec<u64> = self.runs.range(start..=end).map(|(&s, _)| s).collect();
        for s in absorbed {
            if let Some(e) = self.runs.remove(&s) {
                end = end.max(e);
            }
        }
        self.runs.insert(start, end);
    }

    fn contains(&self, blocks: &Range<u64>) -> bool {
        self.runs
            .range(..=blocks.start)
            .next_back()
            .is_some_and(|(_, &e)| e >= blocks.end)
    }

    fn len(&self) -> u64 {
        self.runs.iter().map(|(s, e)| e - s).sum()
    }
}

/// Process-local metadata store keyed by remote path.
///
/// Cached blocks are kept as merged runs, so marking a range costs the same
/// whatever its length.
pub struct InMemoryMetadataStore {
    block_size: u64,
    files: DashMap<String, BlockRuns>,
}

impl InMemoryMetadataStore {
    pub fn new(block_size: u64) -> Self {
        Self {
            block_size: block_size.max(1),
            files: DashMap::new(),
        }
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Number of files with at least one cached block.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Number of cached blocks recorded for `file`.
    pub fn cached_blocks(&self, file: &str) -> u64 {
        self.files.get(file).map(|runs| runs.len()).unwrap_or(0)
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn is_cached(&self, file: &str, range: BlockRange) -> bool {
        let blocks = range.blocks(self.block_size);
        if blocks.is_empty() {
            return true;
        }
        match self.files.get(file) {
            Some(runs) => runs.contains(&blocks),
            None => false,
        }
    }

    fn mark_cached(&self, file: &str, range: BlockRange) {
        let blocks = range.covered_blocks(self.block_size);
        if blocks.is_empty() {
            return;
        }
        self.files.entry(file.to_string()).or_default().insert(blocks);
    }
}
