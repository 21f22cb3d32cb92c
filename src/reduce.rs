//! Combining one value per rank into a single aggregate.
//!
//! The combinator must be commutative and associative; the linear and tree
//! schedules fold partial results in different orders, so anything else gives
//! schedule-dependent answers. Floating-point sums may differ in the last bits
//! between schedules.

use log::{debug, trace};
use serde::{de::DeserializeOwned, Serialize};

use crate::broadcast::{broadcast_fields, BroadcastAlgorithm};
use crate::error::{CollectiveError, Result};
use crate::group::Rank;
use crate::stage::{absolute_rank, receives_at, relative_rank, sends_at, stage_count};
use crate::transport::{decode, encode, tags, Transport};

/// Values that can be added together by the built-in sum reduction.
pub trait Summable {
    fn sum(self, other: Self) -> Self;
}

macro_rules! summable_primitive {
    ($($t:ty),*) => {
        $(
            impl Summable for $t {
                fn sum(self, other: Self) -> Self {
                    self + other
                }
            }
        )*
    };
}

summable_primitive!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

/// Element-wise.
///
/// # Panics
///
/// Panics if the two vectors differ in length.
impl<T: Summable> Summable for Vec<T> {
    fn sum(self, other: Self) -> Self {
        assert_eq!(self.len(), other.len(), "summed vectors differ in length");
        self.into_iter().zip(other).map(|(a, b)| Summable::sum(a, b)).collect()
    }
}

impl<T: Summable + Copy, const N: usize> Summable for [T; N] {
    fn sum(mut self, other: Self) -> Self {
        for (acc, value) in self.iter_mut().zip(other) {
            *acc = Summable::sum(*acc, value);
        }
        self
    }
}

/// Which schedule a reduction follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReduceAlgorithm {
    /// Every rank sends straight to the root: `P - 1` receives on the root.
    #[default]
    Linear,
    /// Broadcast tree run backwards: `ceil(log2(P))` rounds.
    Tree,
}

/// Root folds the other ranks' values, in rank order, into its own.
pub(crate) fn linear_reduce<T, V, F>(transport: &T, value: V, root: Rank, op: F) -> Result<Option<V>>
where
    T: Transport,
    V: Serialize + DeserializeOwned,
    F: Fn(V, V) -> V,
{
    let group = transport.group();
    group.check(root)?;

    if group.is_root(root) {
        let mut total = value;
        for rank in group.peers() {
            trace!("Root receiving partial from rank {}", rank);
            let partial = decode(&transport.recv_bytes(rank, tags::REDUCE)?)?;
            total = op(total, partial);
        }
        Ok(Some(total))
    } else {
        transport.send_bytes(root, tags::REDUCE, encode(&value)?)?;
        Ok(None)
    }
}

/// Combine along the broadcast tree, leaves first.
///
/// A rank that would receive in stage `s` of a broadcast sends its partial to
/// that parent instead; a rank that would send receives its child's partial.
pub(crate) fn tree_reduce<T, V, F>(transport: &T, value: V, root: Rank, op: F) -> Result<Option<V>>
where
    T: Transport,
    V: Serialize + DeserializeOwned,
    F: Fn(V, V) -> V,
{
    let group = transport.group();
    group.check(root)?;
    let size = group.size();
    let me = relative_rank(group.rank(), root, size);

    let mut partial = value;
    for stage in (0..stage_count(size)).rev() {
        if let Some(parent) = receives_at(stage, me) {
            let dest = absolute_rank(parent, root, size);
            trace!("Rank {} hands its partial to rank {} in stage {}", group.rank(), dest, stage);
            transport.send_bytes(dest, tags::REDUCE, encode(&partial)?)?;
            return Ok(None);
        }
        if let Some(child) = sends_at(stage, me, size) {
            let source = absolute_rank(child, root, size);
            trace!("Rank {} folds in rank {} in stage {}", group.rank(), source, stage);
            let incoming = decode(&transport.recv_bytes(source, tags::REDUCE)?)?;
            partial = op(partial, incoming);
        }
    }

    if me == 0 {
        Ok(Some(partial))
    } else {
        Err(CollectiveError::CommunicationError(format!(
            "rank {} never handed its partial to a parent",
            group.rank()
        )))
    }
}

/// Reduce to `root`; returns `Some(aggregate)` there and `None` elsewhere.
pub fn reduce<T, V, F>(
    transport: &T,
    algorithm: ReduceAlgorithm,
    value: V,
    root: Rank,
    op: F,
) -> Result<Option<V>>
where
    T: Transport,
    V: Serialize + DeserializeOwned,
    F: Fn(V, V) -> V,
{
    debug!("Rank {} entering reduce", transport.group().rank());
    let result = match algorithm {
        ReduceAlgorithm::Linear => linear_reduce(transport, value, root, op),
        ReduceAlgorithm::Tree => tree_reduce(transport, value, root, op),
    };
    debug!("Rank {} completed reduce", transport.group().rank());
    result
}

/// Reduce to rank 0, then broadcast the aggregate back to every rank.
pub fn allreduce<T, V, F>(
    transport: &T,
    reduce_with: ReduceAlgorithm,
    broadcast_with: BroadcastAlgorithm,
    value: V,
    op: F,
) -> Result<V>
where
    T: Transport,
    V: Serialize + DeserializeOwned,
    F: Fn(V, V) -> V,
{
    const ROOT: Rank = 0;

    debug!("Rank {} entering allreduce", transport.group().rank());
    let aggregate = reduce(transport, reduce_with, value, ROOT, op)?;
    let fields = aggregate.map(|total| encode(&total).map(|bytes| vec![bytes])).transpose()?;
    let mut fields = broadcast_fields(transport, broadcast_with, fields, 1, ROOT)?;
    let total = decode(&fields.swap_remove(0))?;
    debug!("Rank {} completed allreduce", transport.group().rank());
    Ok(total)
}
