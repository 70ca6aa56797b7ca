//! Row partitioning shared by the distributed kernel and the node-split
//! storage policy.
//!
//! The split is a pure function of `(total, rank, parts)` so it can be
//! validated without any communication, and so every participant derives
//! the same ranges independently.

/// A half-open range of rows owned by one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Intersection with `[0, limit)`. Diagonals get shorter as the fill
    /// proceeds, so a share may shrink to nothing.
    pub fn below(self, limit: usize) -> RowRange {
        RowRange {
            start: self.start.min(limit),
            end: self.end.min(limit),
        }
    }
}

/// Equal split with remainder: the first `total % parts` participants
/// receive one extra row, so share lengths differ by at most one.
pub fn split_rows(total: usize, rank: usize, parts: usize) -> RowRange {
    debug_assert!(parts > 0, "partitioning requires at least one participant");
    debug_assert!(rank < parts, "rank {rank} out of range for {parts} participants");
    let base = total / parts;
    let extra = total % parts;
    let start = rank * base + rank.min(extra);
    let end = start + base + usize::from(rank < extra);
    RowRange { start, end }
}

/// Share length per rank, in rank order. These are the variable counts of
/// the per-diagonal gather.
pub fn share_counts(total: usize, parts: usize) -> Vec<usize> {
    (0..parts)
        .map(|rank| split_rows(total, rank, parts).len())
        .collect()
}
