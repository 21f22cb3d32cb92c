//! Multi-process transport over POSIX shared memory.
//!
//! The process that calls [`ShmTransport::init`] first becomes rank 0. It
//! creates a shared segment, re-executes the current binary once for every
//! other rank, and waits until all of them have attached. Each ordered
//! `(source, dest)` pair owns one message slot in the segment:
//!
//! ```text
//! +-------------+-----------------+-----------------+-----+
//! | SharedState | slot (0 -> 0)   | slot (0 -> 1)   | ... |
//! +-------------+-----------------+-----------------+-----+
//!                 header | payload
//! ```
//!
//! A sender waits for the slot to be free, writes the payload, and spins until
//! the receiver acknowledges it. A receiver that finds a message under a tag it
//! is not waiting for keeps it in a local stash, so tags between the same pair
//! of ranks stay independent.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

use log::debug;
use shared_memory::{Shmem, ShmemConf};

use super::{Tag, Transport};
use crate::error::{CollectiveError, Result};
use crate::group::{Rank, RankGroup};

/// Largest group the segment layout supports.
pub const MAX_RANKS: usize = 32;
/// Largest encoded payload of a single message.
pub const MAX_MSG_SIZE: usize = 64 * 1024;
/// Set in spawned ranks; holds the link path of the segment to attach to.
pub const SEGMENT_ENV: &str = "SIMPLE_COLLECTIVES_SEGMENT";

const HEADER_SIZE: usize = std::mem::size_of::<SlotHeader>();
const SLOT_SIZE: usize = HEADER_SIZE + MAX_MSG_SIZE;
const STATE_SIZE: usize = std::mem::size_of::<SharedState>();

#[repr(C)]
struct SlotHeader {
    valid: AtomicBool,
    received: AtomicBool,
    tag: AtomicI32,
    len: AtomicUsize,
}

#[repr(C)]
struct SharedState {
    size: AtomicUsize,
    process_ids: [AtomicUsize; MAX_RANKS],
    init_flags: [AtomicBool; MAX_RANKS],
    done_flags: [AtomicBool; MAX_RANKS],
}

fn segment_size(size: usize) -> usize {
    STATE_SIZE + size * size * SLOT_SIZE
}

fn spin_until(mut ready: impl FnMut() -> bool) {
    let mut spins = 0u32;
    while !ready() {
        if spins < 1024 {
            spins += 1;
            std::hint::spin_loop();
        } else {
            std::thread::yield_now();
        }
    }
}

/// One process's endpoint on a shared-memory group.
///
/// ```rust,no_run
/// use simple_collectives::transport::{shm::ShmTransport, Transport};
///
/// let transport = ShmTransport::init(4).unwrap();
/// if transport.group().rank() == 0 {
///     transport.send(&42u32, 1, 0).unwrap();
/// } else if transport.group().rank() == 1 {
///     let value: u32 = transport.recv(0, 0).unwrap();
///     assert_eq!(value, 42);
/// }
/// transport.finalize().unwrap();
/// ```
pub struct ShmTransport {
    group: RankGroup,
    shmem: Shmem,
    children: Vec<Child>,
    stash: RefCell<HashMap<(Rank, Tag), VecDeque<Vec<u8>>>>,
}

impl ShmTransport {
    /// Start (or, in a spawned rank, join) a group of `size` processes.
    ///
    /// Blocks until every rank has attached to the segment.
    pub fn init(size: usize) -> Result<Self> {
        if size == 0 || size > MAX_RANKS {
            return Err(CollectiveError::InvalidGroup(format!(
                "shared memory groups hold 1 to {} ranks, got {}",
                MAX_RANKS, size
            )));
        }

        if let Some(path) = std::env::var_os(SEGMENT_ENV) {
            return Self::init_spawned(size, PathBuf::from(path));
        }

        let path = std::env::temp_dir().join(format!("simple_collectives_{}", std::process::id()));
        debug!(
            "Creating shared memory of size {} at {:?}",
            segment_size(size),
            path
        );

        let shmem = ShmemConf::new()
            .size(segment_size(size))
            .flink(&path)
            .create()
            .map_err(|e| CollectiveError::SharedMemoryError(e.to_string()))?;

        let mut transport = ShmTransport {
            group: RankGroup::new(size, 0)?,
            shmem,
            children: Vec::with_capacity(size - 1),
            stash: RefCell::new(HashMap::new()),
        };

        let state = transport.state();
        state.size.store(size, Ordering::SeqCst);
        for rank in 0..MAX_RANKS {
            state.process_ids[rank].store(0, Ordering::SeqCst);
            state.init_flags[rank].store(false, Ordering::SeqCst);
            state.done_flags[rank].store(false, Ordering::SeqCst);
        }
        for src in 0..size {
            for dst in 0..size {
                let header = transport.header(src, dst);
                header.valid.store(false, Ordering::SeqCst);
                header.received.store(false, Ordering::SeqCst);
                header.tag.store(0, Ordering::SeqCst);
                header.len.store(0, Ordering::SeqCst);
            }
        }
        state.process_ids[0].store(std::process::id() as usize, Ordering::SeqCst);
        state.init_flags[0].store(true, Ordering::SeqCst);

        let exe = std::env::current_exe().map_err(|e| CollectiveError::ProcessError(e.to_string()))?;
        for _ in 1..size {
            let child = Command::new(&exe)
                .args(std::env::args_os().skip(1))
                .env(SEGMENT_ENV, &path)
                .stdin(Stdio::null())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(|e| CollectiveError::ProcessError(e.to_string()))?;
            transport.children.push(child);
        }

        debug!("Parent process initialized as rank 0");
        while !transport.all_flagged(|state, rank| state.init_flags[rank].load(Ordering::SeqCst)) {
            transport.check_children()?;
            std::thread::yield_now();
        }
        Ok(transport)
    }

    fn init_spawned(size: usize, path: PathBuf) -> Result<Self> {
        debug!("Spawned process attaching to {:?}", path);

        let shmem = ShmemConf::new()
            .flink(&path)
            .open()
            .map_err(|e| CollectiveError::SharedMemoryError(e.to_string()))?;

        let state = unsafe { &*(shmem.as_ptr() as *const SharedState) };
        let shared_size = state.size.load(Ordering::SeqCst);
        if shared_size != size {
            return Err(CollectiveError::InvalidGroup(format!(
                "segment was created for {} ranks, this process asked for {}",
                shared_size, size
            )));
        }

        let pid = std::process::id() as usize;
        let rank = (1..size)
            .find(|&rank| {
                state.process_ids[rank]
                    .compare_exchange(0, pid, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            })
            .ok_or_else(|| {
                CollectiveError::InvalidGroup(format!("No available ranks for process {}", pid))
            })?;
        debug!("Process {} initialized as rank {}", pid, rank);
        state.init_flags[rank].store(true, Ordering::SeqCst);

        let transport = ShmTransport {
            group: RankGroup::new(size, rank)?,
            shmem,
            children: Vec::new(),
            stash: RefCell::new(HashMap::new()),
        };
        transport.wait_for_all(|state, rank| state.init_flags[rank].load(Ordering::SeqCst));
        Ok(transport)
    }

    /// Synchronise shutdown: every rank marks itself done, rank 0 waits for
    /// all of them and reaps the spawned processes. The segment is unlinked
    /// when rank 0's endpoint is dropped.
    ///
    /// Rank 0 returns an error as soon as a spawned rank exits unsuccessfully
    /// without reaching `finalize`; the remaining ranks are then killed on
    /// drop.
    pub fn finalize(mut self) -> Result<()> {
        let rank = self.group.rank();
        self.state().done_flags[rank].store(true, Ordering::SeqCst);

        if rank == 0 {
            debug!("Parent process waiting for children to finish");
            while !self.all_flagged(|state, rank| state.done_flags[rank].load(Ordering::SeqCst)) {
                self.check_children()?;
                std::thread::yield_now();
            }
            for mut child in self.children.drain(..) {
                let status = child
                    .wait()
                    .map_err(|e| CollectiveError::ProcessError(e.to_string()))?;
                if !status.success() {
                    return Err(CollectiveError::ProcessError(format!(
                        "rank process {} exited with {}",
                        child.id(),
                        status
                    )));
                }
            }
        }

        debug!("Process {} finished", rank);
        Ok(())
    }

    fn all_flagged(&self, flag: impl Fn(&SharedState, Rank) -> bool) -> bool {
        let state = self.state();
        (0..self.group.size()).all(|rank| flag(state, rank))
    }

    fn check_children(&mut self) -> Result<()> {
        for child in &mut self.children {
            let exited = child
                .try_wait()
                .map_err(|e| CollectiveError::ProcessError(e.to_string()))?;
            if let Some(status) = exited.filter(|status| !status.success()) {
                return Err(CollectiveError::ProcessError(format!(
                    "rank process {} exited with {}",
                    child.id(),
                    status
                )));
            }
        }
        Ok(())
    }

    fn state(&self) -> &SharedState {
        unsafe { &*(self.shmem.as_ptr() as *const SharedState) }
    }

    fn slot_ptr(&self, src: Rank, dst: Rank) -> *mut u8 {
        let index = src * self.group.size() + dst;
        unsafe { self.shmem.as_ptr().add(STATE_SIZE + index * SLOT_SIZE) }
    }

    fn header(&self, src: Rank, dst: Rank) -> &SlotHeader {
        unsafe { &*(self.slot_ptr(src, dst) as *const SlotHeader) }
    }

    fn wait_for_all(&self, flag: impl Fn(&SharedState, Rank) -> bool) {
        spin_until(|| self.all_flagged(&flag));
    }

    fn take_stashed(&self, source: Rank, tag: Tag) -> Option<Vec<u8>> {
        self.stash
            .borrow_mut()
            .get_mut(&(source, tag))
            .and_then(VecDeque::pop_front)
    }
}

// Spawned ranks still owned here were never reaped by `finalize`: rank 0
// failed or is unwinding, and nothing will ever answer them.
impl Drop for ShmTransport {
    fn drop(&mut self) {
        for mut child in self.children.drain(..) {
            debug!("Stopping rank process {}", child.id());
            if let Err(e) = child.kill() {
                debug!("Could not kill rank process {}: {}", child.id(), e);
            }
            if let Err(e) = child.wait() {
                debug!("Could not reap rank process {}: {}", child.id(), e);
            }
        }
    }
}

impl Transport for ShmTransport {
    fn group(&self) -> RankGroup {
        self.group
    }

    fn send_bytes(&self, dest: Rank, tag: Tag, payload: Vec<u8>) -> Result<()> {
        self.group.check(dest)?;
        if payload.len() > MAX_MSG_SIZE {
            return Err(CollectiveError::CommunicationError(format!(
                "Message too large: {} bytes",
                payload.len()
            )));
        }

        let me = self.group.rank();
        let header = self.header(me, dest);

        // Wait for slot to be free
        spin_until(|| !header.valid.load(Ordering::SeqCst));

        unsafe {
            let data_ptr = self.slot_ptr(me, dest).add(HEADER_SIZE);
            std::ptr::copy_nonoverlapping(payload.as_ptr(), data_ptr, payload.len());
        }
        header.tag.store(tag, Ordering::SeqCst);
        header.len.store(payload.len(), Ordering::SeqCst);
        header.received.store(false, Ordering::SeqCst);
        header.valid.store(true, Ordering::SeqCst);

        debug!("Rank {} waiting for acknowledgment from rank {}", me, dest);
        spin_until(|| header.received.load(Ordering::SeqCst));

        debug!("Rank {} completed send to rank {}", me, dest);
        Ok(())
    }

    fn recv_bytes(&self, source: Rank, tag: Tag) -> Result<Vec<u8>> {
        self.group.check(source)?;
        if let Some(payload) = self.take_stashed(source, tag) {
            return Ok(payload);
        }

        let me = self.group.rank();
        let header = self.header(source, me);
        loop {
            spin_until(|| header.valid.load(Ordering::SeqCst));

            let len = header.len.load(Ordering::SeqCst);
            let arrived = header.tag.load(Ordering::SeqCst);
            let payload = unsafe {
                let data_ptr = self.slot_ptr(source, me).add(HEADER_SIZE);
                std::slice::from_raw_parts(data_ptr, len).to_vec()
            };

            // Acknowledge receipt and mark slot as free
            header.received.store(true, Ordering::SeqCst);
            header.valid.store(false, Ordering::SeqCst);

            if arrived == tag {
                debug!("Rank {} completed receive from rank {}", me, source);
                return Ok(payload);
            }
            debug!(
                "Rank {} stashing tag {} from rank {} while waiting for tag {}",
                me, arrived, source, tag
            );
            self.stash
                .borrow_mut()
                .entry((source, arrived))
                .or_default()
                .push_back(payload);
        }
    }
}
