mod common;

use common::run_collective;
use simple_collectives::blocks::split_blocks;
use simple_collectives::quadrature::{trapezoid, IntegrationBounds};
use simple_collectives::{BroadcastAlgorithm, Config, ReduceAlgorithm};

fn parallel_integral(size: usize, config: Config, input: IntegrationBounds) -> Vec<Option<f64>> {
    run_collective(size, config, |comm| {
        // only the root knows the bounds before the broadcast
        let mine = if comm.rank() == 0 {
            input
        } else {
            IntegrationBounds::new(0.0, 0.0, 0)
        };
        let bounds = comm.broadcast_record(&mine, 0).unwrap();
        let local = bounds.local_interval(&comm.group());
        let partial = trapezoid(|x| x * x, &local);
        comm.reduce_sum(partial, 0).unwrap()
    })
}

#[test]
fn four_ranks_integrate_x_squared() {
    let results = parallel_integral(4, Config::default(), IntegrationBounds::new(0.0, 1.0, 1024));
    let total = results[0].expect("root holds the total");
    assert!((total - 1.0 / 3.0).abs() < 1e-4, "got {}", total);
    assert!(results[1..].iter().all(Option::is_none));
}

#[test]
fn every_schedule_agrees_with_the_sequential_rule() {
    let input = IntegrationBounds::new(-1.0, 2.0, 300);
    let sequential = trapezoid(|x| x * x, &input);
    for broadcast in [BroadcastAlgorithm::Tree, BroadcastAlgorithm::Linear] {
        for reduce in [ReduceAlgorithm::Linear, ReduceAlgorithm::Tree] {
            let config = Config {
                broadcast,
                reduce,
                ..Config::default()
            };
            for size in [1, 3, 7] {
                let total = parallel_integral(size, config, input)[0].unwrap();
                assert!(
                    (total - sequential).abs() < 1e-9,
                    "{:?}/{:?} size {}: {} vs {}",
                    broadcast,
                    reduce,
                    size,
                    total,
                    sequential
                );
            }
        }
    }
}

#[test]
fn dot_product_with_allreduce() {
    let x: Vec<f64> = (1..=12).map(f64::from).collect();
    let y: Vec<f64> = (1..=12).map(|i| f64::from(i) * 0.5).collect();
    let expected: f64 = x.iter().zip(&y).map(|(a, b)| a * b).sum();

    let results = run_collective(4, Config::default(), |comm| {
        let (x_blocks, y_blocks) = if comm.rank() == 0 {
            (
                Some(split_blocks(&x, comm.size())),
                Some(split_blocks(&y, comm.size())),
            )
        } else {
            (None, None)
        };
        let local_x: Vec<f64> = comm.scatter(x_blocks.as_deref(), 0).unwrap();
        let local_y: Vec<f64> = comm.scatter(y_blocks.as_deref(), 0).unwrap();
        let local_dot: f64 = local_x.iter().zip(&local_y).map(|(a, b)| a * b).sum();
        comm.allreduce_sum(local_dot).unwrap()
    });

    for dot in results {
        assert!((dot - expected).abs() < 1e-9);
    }
}
