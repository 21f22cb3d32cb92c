//! Point-to-point and collectives over the shared-memory backend.
//!
//! `ShmTransport::init` re-executes this test binary, with the same
//! arguments, once for every extra rank, so the file holds a single test that
//! every process runs.

mod common;

use simple_collectives::transport::shm::ShmTransport;
use simple_collectives::{Backend, Communicator, Config};

#[test]
fn collectives_across_processes() {
    common::init_logging();
    let config = Config {
        ranks: 4,
        backend: Backend::SharedMemory,
        ..Config::default()
    };
    let comm = Communicator::new(ShmTransport::init(config.ranks).unwrap(), config);
    let rank = comm.rank();
    assert_eq!(comm.size(), 4);

    // Rank 1 asks for tag 2 first; tag 1 is stashed until it is wanted.
    if rank == 0 {
        comm.send(&"first".to_string(), 1, 1).unwrap();
        comm.send(&"second".to_string(), 1, 2).unwrap();
    } else if rank == 1 {
        let second: String = comm.recv(0, 2).unwrap();
        let first: String = comm.recv(0, 1).unwrap();
        assert_eq!(first, "first");
        assert_eq!(second, "second");
    }

    let sent = (0.25f64, 1.0f64 / 3.0, 1024u64);
    let record = if rank == 0 { sent } else { (0.0, 0.0, 0) };
    let (a, b, n) = comm.broadcast_record(&record, 0).unwrap();
    assert_eq!(a.to_bits(), sent.0.to_bits());
    assert_eq!(b.to_bits(), sent.1.to_bits());
    assert_eq!(n, sent.2);

    let total = comm.allreduce_sum(rank as u64 + 1).unwrap();
    assert_eq!(total, 10);

    comm.into_transport().finalize().unwrap();
}
