use std::io::Read;

use log::warn;
use simple_collectives::blocks::split_blocks;
use simple_collectives::{launch, Communicator, Config, RankMain, Result, Transport};

/// Reads the order `n` followed by the `2n` entries of `x` and `y`.
fn read_vectors() -> (Vec<f64>, Vec<f64>) {
    println!("Enter the order of the vectors, then both vectors");

    let mut input = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut input) {
        warn!("Could not read input: {}", e);
    }
    let mut numbers = input.split_whitespace();
    let order: usize = numbers.next().and_then(|n| n.parse().ok()).unwrap_or(0);
    let values: Vec<f64> = numbers.filter_map(|v| v.parse().ok()).collect();

    if order == 0 || values.len() < 2 * order {
        let x: Vec<f64> = (1..=8).map(f64::from).collect();
        warn!("Incomplete input, using x = y = {:?}", x);
        return (x.clone(), x);
    }
    (values[..order].to_vec(), values[order..2 * order].to_vec())
}

struct DotProduct;

impl RankMain for DotProduct {
    fn run<T: Transport>(&self, comm: &Communicator<T>) -> Result<()> {
        let (x_blocks, y_blocks) = if comm.rank() == 0 {
            let (x, y) = read_vectors();
            (
                Some(split_blocks(&x, comm.size())),
                Some(split_blocks(&y, comm.size())),
            )
        } else {
            (None, None)
        };

        let local_x: Vec<f64> = comm.scatter(x_blocks.as_deref(), 0)?;
        let local_y: Vec<f64> = comm.scatter(y_blocks.as_deref(), 0)?;
        let local_dot: f64 = local_x.iter().zip(&local_y).map(|(a, b)| a * b).sum();

        let dot = comm.allreduce_sum(local_dot)?;
        println!("Rank {}: the dot product is {}", comm.rank(), dot);
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();
    launch(Config::from_env()?, &DotProduct)
}
