use serde::{de::DeserializeOwned, Serialize};

use crate::broadcast::{broadcast_record, broadcast_value, Record};
use crate::collective;
use crate::config::Config;
use crate::error::Result;
use crate::group::{Rank, RankGroup};
use crate::reduce::{self, Summable};
use crate::transport::{Tag, Transport};

/// Collective operations for one rank of a group.
///
/// A `Communicator` wraps this rank's [`Transport`] endpoint and picks the
/// broadcast and reduce schedules from its [`Config`]. Every collective must be
/// called by all ranks of the group, in the same order and with the same
/// root, or the run deadlocks.
///
/// # Examples
///
/// Point-to-point communication:
/// ```rust
/// use simple_collectives::{transport::local, Communicator, Config};
///
/// local::run(2, |transport| {
///     let comm = Communicator::new(transport, Config::default());
///     if comm.rank() == 0 {
///         comm.send(&42, 1, 0).unwrap();
///     } else {
///         let data: i32 = comm.recv(0, 0).unwrap();
///         assert_eq!(data, 42);
///     }
/// })
/// .unwrap();
/// ```
///
/// Broadcast followed by a sum:
/// ```rust
/// use simple_collectives::{transport::local, Communicator, Config};
///
/// let totals = local::run(4, |transport| {
///     let comm = Communicator::new(transport, Config::default());
///     let data = if comm.rank() == 0 { vec![1, 2, 3] } else { vec![] };
///     let data = comm.broadcast(&data, 0).unwrap();
///     assert_eq!(data, vec![1, 2, 3]);
///     comm.allreduce_sum(comm.rank() as u64).unwrap()
/// })
/// .unwrap();
/// assert_eq!(totals, vec![6; 4]);
/// ```
pub struct Communicator<T: Transport> {
    transport: T,
    config: Config,
}

impl<T: Transport> Communicator<T> {
    pub fn new(transport: T, config: Config) -> Self {
        Self { transport, config }
    }

    pub fn group(&self) -> RankGroup {
        self.transport.group()
    }

    /// This rank's identity, between 0 and `size() - 1`.
    pub fn rank(&self) -> Rank {
        self.group().rank()
    }

    /// Number of ranks in the group.
    pub fn size(&self) -> usize {
        self.group().size()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Give the transport back, e.g. to finalize a shared-memory group.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send `data` to `dest`, blocking until it has been taken.
    pub fn send<V: Serialize>(&self, data: &V, dest: Rank, tag: Tag) -> Result<()> {
        self.transport.send(data, dest, tag)
    }

    /// Block until a message from `source` under `tag` arrives.
    pub fn recv<V: DeserializeOwned>(&self, source: Rank, tag: Tag) -> Result<V> {
        self.transport.recv(source, tag)
    }

    /// Distribute `data` from `root` to every rank. `data` is only read on
    /// `root`; other ranks may pass any placeholder.
    pub fn broadcast<V: Serialize + DeserializeOwned>(&self, data: &V, root: Rank) -> Result<V> {
        broadcast_value(&self.transport, self.config.broadcast, Some(data), root)
    }

    /// Distribute a [`Record`] from `root`, one tagged transfer per field.
    pub fn broadcast_record<R: Record>(&self, record: &R, root: Rank) -> Result<R> {
        broadcast_record(&self.transport, self.config.broadcast, Some(record), root)
    }

    /// Combine every rank's `value` with `op` on `root`.
    ///
    /// Returns `Some(aggregate)` on `root` and `None` elsewhere. `op` must be
    /// commutative and associative.
    pub fn reduce<V, F>(&self, value: V, root: Rank, op: F) -> Result<Option<V>>
    where
        V: Serialize + DeserializeOwned,
        F: Fn(V, V) -> V,
    {
        reduce::reduce(&self.transport, self.config.reduce, value, root, op)
    }

    pub fn reduce_sum<V>(&self, value: V, root: Rank) -> Result<Option<V>>
    where
        V: Serialize + DeserializeOwned + Summable,
    {
        self.reduce(value, root, Summable::sum)
    }

    /// Combine every rank's `value` with `op` and hand the result to all ranks.
    pub fn allreduce<V, F>(&self, value: V, op: F) -> Result<V>
    where
        V: Serialize + DeserializeOwned,
        F: Fn(V, V) -> V,
    {
        reduce::allreduce(
            &self.transport,
            self.config.reduce,
            self.config.broadcast,
            value,
            op,
        )
    }

    pub fn allreduce_sum<V>(&self, value: V) -> Result<V>
    where
        V: Serialize + DeserializeOwned + Summable,
    {
        self.allreduce(value, Summable::sum)
    }

    pub fn barrier(&self) -> Result<()> {
        collective::barrier(&self.transport)
    }

    /// Collect one value per rank on `root`, in rank order.
    pub fn gather<V>(&self, data: &V, root: Rank) -> Result<Option<Vec<V>>>
    where
        V: Serialize + DeserializeOwned + Clone,
    {
        collective::gather(&self.transport, data, root)
    }

    /// Hand element `i` of `data` (read on `root` only) to rank `i`.
    pub fn scatter<V>(&self, data: Option<&[V]>, root: Rank) -> Result<V>
    where
        V: Serialize + DeserializeOwned + Clone,
    {
        collective::scatter(&self.transport, data, root)
    }
}
