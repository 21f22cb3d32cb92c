use std::io::BufRead;

use log::warn;
use simple_collectives::quadrature::{trapezoid, IntegrationBounds};
use simple_collectives::{launch, Communicator, Config, RankMain, Result, Transport};

// f(x) = x^2
fn f(x: f64) -> f64 {
    x * x
}

/// Reads `a b n` from standard input; falls back to `0 1 1024`.
fn read_bounds() -> IntegrationBounds {
    let fallback = IntegrationBounds::new(0.0, 1.0, 1024);
    println!("Enter a, b and n");

    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line).is_err() {
        warn!("Could not read input, using {:?}", fallback);
        return fallback;
    }
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        [a, b, n] => match (a.parse(), b.parse(), n.parse()) {
            (Ok(a), Ok(b), Ok(n)) => IntegrationBounds::new(a, b, n),
            _ => {
                warn!("Could not parse {:?}, using {:?}", line.trim(), fallback);
                fallback
            }
        },
        _ => {
            warn!("Expected three values, using {:?}", fallback);
            fallback
        }
    }
}

struct Integral;

impl RankMain for Integral {
    fn run<T: Transport>(&self, comm: &Communicator<T>) -> Result<()> {
        let bounds = if comm.rank() == 0 {
            read_bounds()
        } else {
            IntegrationBounds::new(0.0, 0.0, 0)
        };

        // a, b and n reach every rank through the broadcast tree
        let bounds = comm.broadcast_record(&bounds, 0)?;

        let local = bounds.local_interval(&comm.group());
        let integral = trapezoid(f, &local);

        if let Some(total) = comm.reduce_sum(integral, 0)? {
            println!(
                "With n = {} trapezoids, our estimate of the integral from {} to {} = {}",
                bounds.n, bounds.a, bounds.b, total
            );
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();
    launch(Config::from_env()?, &Integral)
}
