//! Partition module: split an index space into contiguous worker ranges.

#![forbid(unsafe_code)]

use crate::error::{PoolError, Result};
use crate::invariant_ppt::{assert_invariant, PARTITION_COVERAGE, PARTITION_ORDER};
use std::ops::Range;

/// A contiguous, non-empty index range assigned to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Partition {
    /// Position of this partition in the output.
    pub index: usize,
    /// First index covered (inclusive).
    pub start: usize,
    /// One past the last index covered.
    pub end: usize,
}

impl Partition {
    /// Number of elements covered.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Always false for partitions produced by [`partition`].
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The covered indices as a range, for slicing.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Segment size used for `len` elements over `workers` workers.
pub fn segment_size(len: usize, workers: usize) -> usize {
    len.div_ceil(workers)
}

/// Split `[0, len)` into at most `workers` contiguous partitions.
///
/// Each partition spans `ceil(len / workers)` elements except possibly the
/// last. Generation stops once a start index reaches `len`, so no empty
/// partition is ever returned and `len == 0` yields an empty plan.
pub fn partition(len: usize, workers: usize) -> Result<Vec<Partition>> {
    if workers == 0 {
        return Err(PoolError::ZeroWorkers);
    }
    let segment = segment_size(len, workers);
    let mut partitions = Vec::with_capacity(workers);
    for index in 0..workers {
        let start = index * segment;
        if start >= len {
            break;
        }
        let end = (start + segment).min(len);
        partitions.push(Partition { index, start, end });
    }

    let covered: usize = partitions.iter().map(Partition::len).sum();
    assert_invariant(
        PARTITION_COVERAGE,
        covered == len,
        "partitions must cover [0, len) exactly once",
        None,
    );
    assert_invariant(
        PARTITION_ORDER,
        partitions
            .windows(2)
            .all(|w| w[0].end == w[1].start && w[0].index + 1 == w[1].index),
        "partitions must be adjacent and ordered by index",
        None,
    );
    Ok(partitions)
}
