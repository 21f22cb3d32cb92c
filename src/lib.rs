//! Collective communication for a fixed group of ranks, built from blocking point-to-point messages.
//!
//! This library provides MPI-like broadcast and reduction primitives for a statically numbered group of
//! cooperating ranks. Ranks share nothing but a [`Transport`](transport::Transport): every collective is
//! expressed as a schedule of synchronous sends and receives between pairs of ranks.
//!
//! # Features
//!
//! - **Point-to-Point Communication**: Tagged, blocking send and receive between any two ranks
//! - **Tree Broadcast**: Distribute a payload from the root in `ceil(log2(P))` rounds
//! - **Reductions**: Linear or tree-structured combine to the root, and allreduce to every rank
//! - **Root Collectives**: Barrier, gather and scatter
//! - **Two Backends**: Threads in one process, or processes sharing a memory segment
//!
//! # Quick Start
//!
//! ```rust
//! use simple_collectives::{transport::local, Communicator, Config};
//!
//! // Run 4 ranks as threads of this process
//! let sums = local::run(4, |transport| {
//!     let comm = Communicator::new(transport, Config::default());
//!
//!     // Root broadcasts data to all others
//!     let data = if comm.rank() == 0 { 42 } else { 0 };
//!     let data = comm.broadcast(&data, 0).unwrap();
//!     assert_eq!(data, 42);
//!
//!     // Every rank contributes its rank; everyone learns the total
//!     comm.allreduce_sum(comm.rank() as f64).unwrap()
//! })
//! .unwrap();
//!
//! assert_eq!(sums, vec![6.0; 4]);
//! ```
//!
//! # Architecture
//!
//! The broadcast follows a hypercube-doubling tree rooted at rank 0: in stage `s` each rank below `2^s`
//! forwards the payload to the rank `2^s` above it. The pure stage functions live in [`stage`]; the
//! broadcast and reduce schedules in [`broadcast`] and [`reduce`] drive them over any transport.
//! [`transport::local`] maps each `(source, dest, tag)` to a rendezvous channel between threads;
//! [`transport::shm`] gives each pair of processes a slot in a POSIX shared memory segment.
//!
//! Collectives are synchronisation points: all ranks must call the same collectives in the same order.
//! A rank that stops participating leaves its peers blocked; nothing here times out.
//!
//! # Error Handling
//!
//! All operations return a `Result` type with detailed error variants through [`CollectiveError`].
//! Common errors include invalid ranks, malformed payloads, and shared memory issues.

pub mod blocks;
pub mod broadcast;
pub mod collective;
pub mod comm;
pub mod config;
pub mod error;
pub mod group;
pub mod launch;
pub mod quadrature;
pub mod reduce;
pub mod stage;
pub mod transport;

pub use broadcast::{BroadcastAlgorithm, Record};
pub use comm::Communicator;
pub use config::{Backend, Config};
pub use error::{CollectiveError, Result};
pub use group::{Rank, RankGroup};
pub use launch::{launch, RankMain};
pub use reduce::{ReduceAlgorithm, Summable};
pub use transport::{Tag, Transport};
