//! Record-range partitioning

use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open range `[start, end)` of 0-based record indices
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChunkRange {
    pub start: usize,
    pub end: usize,
}

impl ChunkRange {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.start, self.end)
    }
}

/// Split `range` into `n` contiguous, near-equal chunks.
///
/// Every chunk but the last holds `len / n` records; the last one absorbs the
/// remainder. `n` is clamped to `1..=len` so no chunk is empty; an empty range
/// yields no chunks.
#[must_use]
pub fn partition(range: ChunkRange, n: usize) -> Vec<ChunkRange> {
    let count = range.len();
    if count == 0 {
        return Vec::new();
    }
    let n = n.clamp(1, count);
    let per_chunk = count / n;

    (0..n)
        .map(|i| {
            let start = range.start + i * per_chunk;
            let end = if i + 1 == n {
                range.end
            } else {
                start + per_chunk
            };
            ChunkRange::new(start, end)
        })
        .collect()
}
