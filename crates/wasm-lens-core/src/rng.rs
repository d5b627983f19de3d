//! Deterministic pseudo-random source
//!
//! Mulberry32: a 32-bit state advanced by a fixed increment and mixed with
//! wrapping multiplies and xor-shifts. Only integer arithmetic touches the
//! state, so a given seed yields the same stream on every platform.

use rand::rand_core::{impls, RngCore};

const GOLDEN_GAMMA: u32 = 0x6D2B_79F5;
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Seeded random stream owned and threaded explicitly by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomSource {
    state: u32,
}

impl RandomSource {
    pub fn seed(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Raw 32-bit output
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(GOLDEN_GAMMA);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Uniform float in [0, 1)
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> f64 {
        self.next_u32() as f64 / TWO_POW_32
    }

    /// Standard normal sample via Box-Muller.
    ///
    /// Consumes two uniform draws; a draw of exactly 0 is redrawn so the
    /// logarithm stays finite.
    pub fn next_gaussian(&mut self) -> f64 {
        let mut u = 0.0;
        while u == 0.0 {
            u = self.next();
        }
        let mut v = 0.0;
        while v == 0.0 {
            v = self.next();
        }
        (-2.0 * u.ln()).sqrt() * (2.0 * std::f64::consts::PI * v).cos()
    }
}

impl RngCore for RandomSource {
    fn next_u32(&mut self) -> u32 {
        RandomSource::next_u32(self)
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        impls::fill_bytes_via_next(self, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_stream() {
        let mut rng = RandomSource::seed(0);
        assert_eq!(rng.next_u32(), 1_144_304_738);
        assert_eq!(rng.next_u32(), 1_416_247);
        assert_eq!(rng.next_u32(), 958_946_056);

        let mut rng = RandomSource::seed(1337);
        assert_eq!(rng.next_u32(), 792_042_790);
        assert_eq!(rng.next_u32(), 815_997_621);
        assert_eq!(rng.next_u32(), 3_480_950_701);
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = RandomSource::seed(42);
        let mut b = RandomSource::seed(42);
        for _ in 0..1000 {
            assert_eq!(a.next().to_bits(), b.next().to_bits());
        }
    }

    #[test]
    fn test_independent_streams() {
        let mut a = RandomSource::seed(1);
        let mut b = a.clone();
        let first = a.next_u32();
        // advancing one clone never touches the other
        assert_eq!(b.next_u32(), first);
        assert_ne!(RandomSource::seed(1).next_u32(), RandomSource::seed(2).next_u32());
    }

    #[test]
    fn test_uniform_range() {
        let mut rng = RandomSource::seed(7);
        for _ in 0..10_000 {
            let x = rng.next();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn test_gaussian_moments() {
        let mut rng = RandomSource::seed(2024);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| rng.next_gaussian()).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {}", mean);
        assert!((var - 1.0).abs() < 0.05, "variance {}", var);
    }

    #[test]
    fn test_gaussian_consumes_two_draws() {
        let mut a = RandomSource::seed(99);
        let mut b = RandomSource::seed(99);
        a.next_gaussian();
        b.next();
        b.next();
        assert_eq!(a, b);
    }
}
