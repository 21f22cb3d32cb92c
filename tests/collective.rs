mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use common::run_collective;
use simple_collectives::blocks::split_blocks;
use simple_collectives::{CollectiveError, Config};

#[test]
fn greetings_gather_in_rank_order() {
    for root in [0, 2] {
        let results = run_collective(4, Config::default(), |comm| {
            let greeting = format!("Greetings from process {}", comm.rank());
            comm.gather(&greeting, root).unwrap()
        });
        let expected: Vec<String> = (0..4).map(|r| format!("Greetings from process {}", r)).collect();
        for (rank, result) in results.into_iter().enumerate() {
            if rank == root {
                assert_eq!(result, Some(expected.clone()));
            } else {
                assert_eq!(result, None);
            }
        }
    }
}

#[test]
fn scatter_hands_out_blocks() {
    let items: Vec<f64> = (0..10).map(f64::from).collect();
    let results = run_collective(3, Config::default(), |comm| {
        let blocks = split_blocks(&items, comm.size());
        let data = if comm.rank() == 0 { Some(blocks.as_slice()) } else { None };
        comm.scatter(data, 0).unwrap()
    });
    assert_eq!(
        results,
        vec![vec![0.0, 1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 8.0, 9.0]]
    );
}

#[test]
fn scatter_rejects_wrong_length() {
    // Only the root notices; nobody else is waiting on a message that never comes.
    let results = run_collective(1, Config::default(), |comm| {
        let data = [1u8, 2];
        comm.scatter(Some(&data[..]), 0)
    });
    assert!(matches!(
        results[0],
        Err(CollectiveError::PayloadMismatch {
            expected: 1,
            actual: 2
        })
    ));
}

#[test]
fn barrier_waits_for_everyone() {
    let arrived = AtomicUsize::new(0);
    let seen = run_collective(6, Config::default(), |comm| {
        arrived.fetch_add(1, Ordering::SeqCst);
        comm.barrier().unwrap();
        arrived.load(Ordering::SeqCst)
    });
    assert_eq!(seen, vec![6; 6]);
}

#[test]
fn point_to_point_ring() {
    let received = run_collective(5, Config::default(), |comm| {
        let next = (comm.rank() + 1) % comm.size();
        let prev = (comm.rank() + comm.size() - 1) % comm.size();
        // even ranks send first so the rendezvous sends cannot all block at once
        if comm.rank() % 2 == 0 {
            comm.send(&comm.rank(), next, 0).unwrap();
            comm.recv::<usize>(prev, 0).unwrap()
        } else {
            let got = comm.recv::<usize>(prev, 0).unwrap();
            comm.send(&comm.rank(), next, 0).unwrap();
            got
        }
    });
    assert_eq!(received, vec![4, 0, 1, 2, 3]);
}
