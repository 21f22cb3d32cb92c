//! Stage calculus of the hypercube-doubling broadcast tree.
//!
//! In stage `s` every rank below `2^s` already holds the payload and forwards
//! it to the rank `2^s` above it. After [`stage_count`] stages every rank in
//! the group has it. The tree is rooted at rank 0; collectives with another
//! root work on ranks relative to the root (see [`relative_rank`]).
//!
//! ```text
//!             0                stage 0
//!          /     \
//!         0       1            stage 1
//!        / \     / \
//!       0   2   1   3          stage 2
//! ```

use crate::group::Rank;

/// What a rank does during one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Receive { from: Rank },
    Send { to: Rank },
    Idle,
}

/// Ceiling of `log2(size)`: the number of right shifts of `size - 1` that
/// reach zero. `stage_count(1) == 0`.
pub fn stage_count(size: usize) -> u32 {
    let mut remaining = size.saturating_sub(1);
    let mut stages = 0;
    while remaining != 0 {
        remaining >>= 1;
        stages += 1;
    }
    stages
}

/// Sender for `rank` in `stage`, if `rank` receives in that stage.
///
/// With `k = 2^stage`, rank `r` receives iff `k <= r < 2k`, from `r - k`.
pub fn receives_at(stage: u32, rank: Rank) -> Option<Rank> {
    let k = 1usize.checked_shl(stage)?;
    if k <= rank && rank - k < k {
        Some(rank - k)
    } else {
        None
    }
}

/// Receiver for `rank` in `stage`, if `rank` sends in that stage.
///
/// With `k = 2^stage`, rank `r` sends iff `r < k` and `r + k < size`, to `r + k`.
pub fn sends_at(stage: u32, rank: Rank, size: usize) -> Option<Rank> {
    let k = 1usize.checked_shl(stage)?;
    if rank >= k {
        return None;
    }
    rank.checked_add(k).filter(|&dest| dest < size)
}

pub fn role_at(stage: u32, rank: Rank, size: usize) -> Role {
    if let Some(from) = receives_at(stage, rank) {
        Role::Receive { from }
    } else if let Some(to) = sends_at(stage, rank, size) {
        Role::Send { to }
    } else {
        Role::Idle
    }
}

/// Position of `rank` in a tree rooted at `root`.
pub fn relative_rank(rank: Rank, root: Rank, size: usize) -> Rank {
    (rank + size - root) % size
}

/// Inverse of [`relative_rank`].
pub fn absolute_rank(relative: Rank, root: Rank, size: usize) -> Rank {
    (relative + root) % size
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reference_ceil_log2(size: usize) -> u32 {
        let mut stages = 0;
        while (1usize << stages) < size {
            stages += 1;
        }
        stages
    }

    #[test]
    fn stage_count_small_groups() {
        assert_eq!(stage_count(1), 0);
        assert_eq!(stage_count(2), 1);
        assert_eq!(stage_count(3), 2);
        assert_eq!(stage_count(4), 2);
        assert_eq!(stage_count(5), 3);
        assert_eq!(stage_count(16), 4);
        assert_eq!(stage_count(17), 5);
    }

    #[test]
    fn stage_count_matches_ceil_log2_up_to_a_million() {
        for size in 1..=1_000_000 {
            assert_eq!(stage_count(size), reference_ceil_log2(size), "size {}", size);
        }
    }

    #[test]
    fn four_rank_schedule() {
        assert_eq!(role_at(0, 0, 4), Role::Send { to: 1 });
        assert_eq!(role_at(0, 1, 4), Role::Receive { from: 0 });
        assert_eq!(role_at(0, 2, 4), Role::Idle);
        assert_eq!(role_at(1, 0, 4), Role::Send { to: 2 });
        assert_eq!(role_at(1, 1, 4), Role::Send { to: 3 });
        assert_eq!(role_at(1, 2, 4), Role::Receive { from: 0 });
        assert_eq!(role_at(1, 3, 4), Role::Receive { from: 1 });
    }

    #[test]
    fn last_stage_is_partial_for_odd_groups() {
        // 5 ranks: only rank 0 has a partner in stage 2
        assert_eq!(sends_at(2, 0, 5), Some(4));
        assert_eq!(sends_at(2, 1, 5), None);
        assert_eq!(role_at(2, 3, 5), Role::Idle);
    }

    #[test]
    fn huge_stage_has_no_role() {
        assert_eq!(receives_at(64, 5), None);
        assert_eq!(sends_at(64, 0, usize::MAX), None);
        assert_eq!(sends_at(63, 1usize << 62, 1usize << 63), None);
    }

    #[test]
    fn relabelling_round_trips() {
        for root in 0..5 {
            for rank in 0..5 {
                let rel = relative_rank(rank, root, 5);
                assert_eq!(absolute_rank(rel, root, 5), rank);
            }
            assert_eq!(relative_rank(root, root, 5), 0);
        }
    }

    proptest! {
        #[test]
        fn never_sends_and_receives_in_one_stage(size in 1usize..2048, rank_seed in any::<usize>()) {
            let rank = rank_seed % size;
            for stage in 0..stage_count(size) {
                let recv = receives_at(stage, rank);
                let send = sends_at(stage, rank, size);
                prop_assert!(!(recv.is_some() && send.is_some()));
            }
        }

        #[test]
        fn every_non_root_receives_exactly_once(size in 1usize..2048, rank_seed in any::<usize>()) {
            let rank = rank_seed % size;
            let receives = (0..stage_count(size))
                .filter(|&stage| receives_at(stage, rank).is_some())
                .count();
            prop_assert_eq!(receives, if rank == 0 { 0 } else { 1 });
        }

        #[test]
        fn sends_and_receives_pair_up(size in 1usize..2048, rank_seed in any::<usize>()) {
            let rank = rank_seed % size;
            for stage in 0..stage_count(size) {
                if let Some(dest) = sends_at(stage, rank, size) {
                    prop_assert_eq!(receives_at(stage, dest), Some(rank));
                }
                if let Some(source) = receives_at(stage, rank) {
                    prop_assert!(source < rank);
                    prop_assert_eq!(sends_at(stage, source, size), Some(rank));
                }
            }
        }
    }
}
