//! Root-centred collectives: barrier, gather and scatter.

use log::debug;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CollectiveError, Result};
use crate::group::Rank;
use crate::transport::{decode, encode, tags, Transport};

/// Block until every rank has reached the barrier.
///
/// Everyone reports to rank 0, then rank 0 releases everyone.
pub fn barrier<T: Transport>(transport: &T) -> Result<()> {
    let group = transport.group();
    debug!("Rank {} entering barrier", group.rank());

    if group.is_root(0) {
        for rank in group.peers() {
            debug!("Root waiting for rank {}", rank);
            transport.recv_bytes(rank, tags::BARRIER_ARRIVE)?;
        }
        for rank in group.peers() {
            transport.send_bytes(rank, tags::BARRIER_RELEASE, Vec::new())?;
        }
    } else {
        debug!("Rank {} signaling root", group.rank());
        transport.send_bytes(0, tags::BARRIER_ARRIVE, Vec::new())?;
        transport.recv_bytes(0, tags::BARRIER_RELEASE)?;
    }

    debug!("Rank {} exiting barrier", group.rank());
    Ok(())
}

/// Collect one value from every rank on `root`, in rank order.
///
/// Returns `Some` on `root` and `None` elsewhere.
pub fn gather<T, V>(transport: &T, data: &V, root: Rank) -> Result<Option<Vec<V>>>
where
    T: Transport,
    V: Serialize + DeserializeOwned + Clone,
{
    let group = transport.group();
    group.check(root)?;
    debug!("Rank {} entering gather", group.rank());

    let result = if group.is_root(root) {
        let mut gathered = Vec::with_capacity(group.size());
        for rank in 0..group.size() {
            if rank == root {
                gathered.push(data.clone());
            } else {
                debug!("Root receiving from rank {}", rank);
                gathered.push(decode(&transport.recv_bytes(rank, tags::GATHER)?)?);
            }
        }
        Some(gathered)
    } else {
        debug!("Rank {} sending to root", group.rank());
        transport.send_bytes(root, tags::GATHER, encode(data)?)?;
        None
    };

    debug!("Rank {} completed gather", group.rank());
    Ok(result)
}

/// Hand element `i` of `data` to rank `i`; `data` is only read on `root` and
/// must hold exactly one element per rank.
pub fn scatter<T, V>(transport: &T, data: Option<&[V]>, root: Rank) -> Result<V>
where
    T: Transport,
    V: Serialize + DeserializeOwned + Clone,
{
    let group = transport.group();
    group.check(root)?;
    debug!("Rank {} entering scatter", group.rank());

    let result = if group.is_root(root) {
        let data = data.ok_or_else(|| {
            CollectiveError::CommunicationError("Root must provide data for scatter".into())
        })?;
        if data.len() != group.size() {
            return Err(CollectiveError::PayloadMismatch {
                expected: group.size(),
                actual: data.len(),
            });
        }

        for (rank, item) in data.iter().enumerate() {
            if rank != root {
                debug!("Root sending piece to rank {}", rank);
                transport.send_bytes(rank, tags::SCATTER, encode(item)?)?;
            }
        }
        data[root].clone()
    } else {
        debug!("Rank {} waiting for its piece", group.rank());
        decode(&transport.recv_bytes(root, tags::SCATTER)?)?
    };

    debug!("Rank {} completed scatter", group.rank());
    Ok(result)
}
