//! Block distribution of `len` items over the ranks of a group.

use std::ops::Range;

use crate::group::{Rank, RankGroup};

/// Contiguous slice of `0..len` owned by `rank` out of `size` ranks.
///
/// Every rank gets `len / size` items; the first `len % size` ranks get one
/// more.
pub fn block_range_of(len: usize, rank: Rank, size: usize) -> Range<usize> {
    let base = len / size;
    let extra = len % size;
    let start = rank * base + rank.min(extra);
    let count = base + usize::from(rank < extra);
    start..start + count
}

/// This rank's block of `0..len`.
pub fn block_range(len: usize, group: &RankGroup) -> Range<usize> {
    block_range_of(len, group.rank(), group.size())
}

/// Split `items` into one block per rank, in rank order.
pub fn split_blocks<V: Clone>(items: &[V], size: usize) -> Vec<Vec<V>> {
    (0..size)
        .map(|rank| items[block_range_of(items.len(), rank, size)].to_vec())
        .collect()
}
