#![allow(dead_code)]

use std::cell::Cell;

use simple_collectives::transport::local::{self, LocalTransport};
use simple_collectives::{Communicator, Config, Rank, RankGroup, Result, Tag, Transport};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Wraps a transport and counts the messages this rank moves.
pub struct Counting<T> {
    inner: T,
    sends: Cell<usize>,
    recvs: Cell<usize>,
}

impl<T> Counting<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            sends: Cell::new(0),
            recvs: Cell::new(0),
        }
    }

    pub fn sends(&self) -> usize {
        self.sends.get()
    }

    pub fn recvs(&self) -> usize {
        self.recvs.get()
    }
}

impl<T: Transport> Transport for Counting<T> {
    fn group(&self) -> RankGroup {
        self.inner.group()
    }

    fn send_bytes(&self, dest: Rank, tag: Tag, payload: Vec<u8>) -> Result<()> {
        self.sends.set(self.sends.get() + 1);
        self.inner.send_bytes(dest, tag, payload)
    }

    fn recv_bytes(&self, source: Rank, tag: Tag) -> Result<Vec<u8>> {
        self.recvs.set(self.recvs.get() + 1);
        self.inner.recv_bytes(source, tag)
    }
}

pub type TestComm = Communicator<Counting<LocalTransport>>;

/// Run `body` on `size` threaded ranks, each with a counting communicator,
/// and return the per-rank results in rank order.
pub fn run_collective<R, F>(size: usize, config: Config, body: F) -> Vec<R>
where
    F: Fn(TestComm) -> R + Sync,
    R: Send,
{
    init_logging();
    local::run(size, |transport| {
        body(Communicator::new(Counting::new(transport), config))
    })
    .unwrap()
}
