//! In-process transport: every rank is a thread, every `(source, dest, tag)`
//! key is a zero-capacity channel, so a send is a true rendezvous with the
//! matching receive.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;

use log::debug;
use parking_lot::Mutex;

use super::{Tag, Transport};
use crate::error::{CollectiveError, Result};
use crate::group::{Rank, RankGroup};

type LaneKey = (Rank, Rank, Tag); // (src, dst, tag)

// Both ends stay in the fabric until the whole group is gone, so a lane never
// disconnects. A rank that dies leaves any peer waiting on it blocked.
struct Lane {
    tx: SyncSender<Vec<u8>>,
    rx: Mutex<Receiver<Vec<u8>>>,
}

impl Lane {
    fn new() -> Self {
        let (tx, rx) = mpsc::sync_channel(0);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }
}

/// The channels shared by all ranks of one in-process group.
pub struct LocalFabric {
    lanes: Mutex<HashMap<LaneKey, Arc<Lane>>>,
}

impl LocalFabric {
    /// Build a fabric for `size` ranks and hand out one endpoint per rank,
    /// in rank order.
    pub fn endpoints(size: usize) -> Result<Vec<LocalTransport>> {
        // Validates the size before anything is allocated.
        RankGroup::new(size, 0)?;
        let fabric = Arc::new(LocalFabric {
            lanes: Mutex::new(HashMap::new()),
        });
        (0..size)
            .map(|rank| {
                Ok(LocalTransport {
                    group: RankGroup::new(size, rank)?,
                    fabric: Arc::clone(&fabric),
                })
            })
            .collect()
    }

    fn lane(&self, key: LaneKey) -> Arc<Lane> {
        let mut lanes = self.lanes.lock();
        Arc::clone(lanes.entry(key).or_insert_with(|| Arc::new(Lane::new())))
    }
}

/// One rank's endpoint on a [`LocalFabric`].
pub struct LocalTransport {
    group: RankGroup,
    fabric: Arc<LocalFabric>,
}

impl Transport for LocalTransport {
    fn group(&self) -> RankGroup {
        self.group
    }

    fn send_bytes(&self, dest: Rank, tag: Tag, payload: Vec<u8>) -> Result<()> {
        self.group.check(dest)?;
        let lane = self.fabric.lane((self.group.rank(), dest, tag));
        lane.tx.send(payload).map_err(|e| {
            CollectiveError::CommunicationError(format!("send to rank {}: {}", dest, e))
        })?;
        debug!(
            "Rank {} completed send to rank {}",
            self.group.rank(),
            dest
        );
        Ok(())
    }

    fn recv_bytes(&self, source: Rank, tag: Tag) -> Result<Vec<u8>> {
        self.group.check(source)?;
        let lane = self.fabric.lane((source, self.group.rank(), tag));
        let payload = lane.rx.lock().recv().map_err(|e| {
            CollectiveError::CommunicationError(format!("receive from rank {}: {}", source, e))
        })?;
        debug!(
            "Rank {} completed receive from rank {}",
            self.group.rank(),
            source
        );
        Ok(payload)
    }
}

/// Run `body` once per rank of a `size`-rank group, each on its own thread,
/// and collect the results in rank order.
///
/// A rank that panics is reported as [`CollectiveError::ProcessError`] once
/// every other rank has returned. Peers blocked on a message from the
/// panicked rank never return, so neither does `run`.
///
/// # Examples
///
/// ```rust
/// use simple_collectives::transport::{local, Transport};
///
/// let ranks = local::run(3, |t| t.group().rank() * 10).unwrap();
/// assert_eq!(ranks, vec![0, 10, 20]);
/// ```
pub fn run<R, F>(size: usize, body: F) -> Result<Vec<R>>
where
    F: Fn(LocalTransport) -> R + Sync,
    R: Send,
{
    let endpoints = LocalFabric::endpoints(size)?;
    debug!("Starting {} local ranks", endpoints.len());
    let body = &body;

    thread::scope(|scope| {
        let handles = endpoints
            .into_iter()
            .map(|endpoint| {
                thread::Builder::new()
                    .name(format!("rank-{}", endpoint.group.rank()))
                    .spawn_scoped(scope, move || body(endpoint))
                    .map_err(|e| CollectiveError::ProcessError(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        // Join every rank before reporting, so no panicked thread is left for
        // the scope to re-raise.
        let joined: Vec<_> = handles.into_iter().map(|handle| handle.join()).collect();
        joined
            .into_iter()
            .enumerate()
            .map(|(rank, result)| {
                result.map_err(|_| CollectiveError::ProcessError(format!("rank {} panicked", rank)))
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fabric_size_zero_is_rejected() {
        assert!(LocalFabric::endpoints(0).is_err());
    }

    #[test]
    fn ping_pong() {
        let replies = run(2, |t| {
            if t.group().rank() == 0 {
                t.send(&"ping".to_string(), 1, 0).unwrap();
                t.recv::<String>(1, 0).unwrap()
            } else {
                let msg: String = t.recv(0, 0).unwrap();
                t.send(&format!("{} pong", msg), 0, 0).unwrap();
                msg
            }
        })
        .unwrap();
        assert_eq!(replies, vec!["ping pong".to_string(), "ping".to_string()]);
    }

    #[test]
    fn tags_do_not_interfere() {
        // The receiver asks for tag 2 first although tag 1 was sent first;
        // each send only waits for its own lane.
        let got = run(2, |t| {
            if t.group().rank() == 0 {
                let sender = thread::scope(|s| {
                    s.spawn(|| t.send(&1u8, 1, 1).unwrap());
                    t.send(&2u8, 1, 2).unwrap();
                    0u8
                });
                vec![sender]
            } else {
                let second: u8 = t.recv(0, 2).unwrap();
                let first: u8 = t.recv(0, 1).unwrap();
                vec![second, first]
            }
        })
        .unwrap();
        assert_eq!(got[1], vec![2, 1]);
    }

    #[test]
    fn same_tag_is_fifo() {
        let got = run(2, |t| {
            if t.group().rank() == 0 {
                for i in 0..5u32 {
                    t.send(&i, 1, 9).unwrap();
                }
                Vec::new()
            } else {
                (0..5).map(|_| t.recv::<u32>(0, 9).unwrap()).collect::<Vec<_>>()
            }
        })
        .unwrap();
        assert_eq!(got[1], vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn panicking_rank_is_reported() {
        let result = run(3, |t| {
            if t.group().rank() == 2 {
                panic!("rank 2 gives up");
            }
            t.group().rank()
        });
        assert!(matches!(
            result,
            Err(CollectiveError::ProcessError(msg)) if msg == "rank 2 panicked"
        ));
    }

    #[test]
    fn send_to_unknown_rank_fails() {
        let results = run(2, |t| t.send(&0u8, 5, 0)).unwrap();
        for result in results {
            assert!(matches!(
                result,
                Err(CollectiveError::InvalidRank { rank: 5, size: 2 })
            ));
        }
    }
}
