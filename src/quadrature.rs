//! Trapezoid-rule integration split across the ranks of a group.

use serde::{Deserialize, Serialize};

use crate::blocks::block_range_of;
use crate::broadcast::Record;
use crate::error::Result;
use crate::group::RankGroup;

/// Integrate over `[a, b]` with `n` trapezoids.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrationBounds {
    pub a: f64,
    pub b: f64,
    pub n: u64,
}

impl IntegrationBounds {
    pub fn new(a: f64, b: f64, n: u64) -> Self {
        Self { a, b, n }
    }

    /// Width of one trapezoid; the same on every rank.
    pub fn step(&self) -> f64 {
        (self.b - self.a) / self.n as f64
    }

    /// The contiguous run of trapezoids this rank integrates.
    pub fn local_interval(&self, group: &RankGroup) -> IntegrationBounds {
        let h = self.step();
        let range = block_range_of(self.n as usize, group.rank(), group.size());
        let local_a = self.a + range.start as f64 * h;
        IntegrationBounds {
            a: local_a,
            b: local_a + range.len() as f64 * h,
            n: range.len() as u64,
        }
    }
}

/// `a`, `b` and `n` travel as three separately tagged fields.
impl Record for IntegrationBounds {
    const FIELDS: usize = 3;

    fn encode_fields(&self) -> Result<Vec<Vec<u8>>> {
        (self.a, self.b, self.n).encode_fields()
    }

    fn decode_fields(fields: Vec<Vec<u8>>) -> Result<Self> {
        let (a, b, n) = <(f64, f64, u64)>::decode_fields(fields)?;
        Ok(IntegrationBounds { a, b, n })
    }
}

/// Trapezoid rule for `f` over `[a, b]` with `n` trapezoids of width `h`.
pub fn trapezoid(f: impl Fn(f64) -> f64, bounds: &IntegrationBounds) -> f64 {
    if bounds.n == 0 {
        return 0.0;
    }
    let h = (bounds.b - bounds.a) / bounds.n as f64;
    let interior: f64 = (1..bounds.n).map(|i| f(bounds.a + i as f64 * h)).sum();
    h * ((f(bounds.a) + f(bounds.b)) / 2.0 + interior)
}
