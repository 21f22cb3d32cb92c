use crate::error::{CollectiveError, Result};

/// Identity of a rank within a group, `0 <= rank < size`.
pub type Rank = usize;

/// The fixed group of cooperating ranks, as seen from one of them.
///
/// Every participant holds the same `size` and a distinct `rank`. The value is
/// created once when the rank starts and never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RankGroup {
    size: usize,
    rank: Rank,
}

impl RankGroup {
    /// Create the group view for `rank` in a group of `size` ranks.
    ///
    /// Rejects an empty group and a rank outside `[0, size)`.
    pub fn new(size: usize, rank: Rank) -> Result<Self> {
        if size == 0 {
            return Err(CollectiveError::InvalidGroup("Size must be positive".into()));
        }
        if rank >= size {
            return Err(CollectiveError::InvalidGroup(format!(
                "rank {} is outside a group of {}",
                rank, size
            )));
        }
        Ok(Self { size, rank })
    }

    /// Total number of ranks in the group.
    pub fn size(&self) -> usize {
        self.size
    }

    /// This rank's identity.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn is_root(&self, root: Rank) -> bool {
        self.rank == root
    }

    pub fn contains(&self, rank: Rank) -> bool {
        rank < self.size
    }

    /// Fails with [`CollectiveError::InvalidRank`] unless `rank` is a member.
    pub fn check(&self, rank: Rank) -> Result<()> {
        if self.contains(rank) {
            Ok(())
        } else {
            Err(CollectiveError::InvalidRank {
                rank,
                size: self.size,
            })
        }
    }

    /// Every rank except this one, in ascending order.
    pub fn peers(&self) -> impl Iterator<Item = Rank> {
        let me = self.rank;
        (0..self.size).filter(move |&r| r != me)
    }
}
