//! Random number generator abstraction for determinism.
//!
//! In production this wraps `StdRng` seeded from the operating system. In
//! tests a seeded or scripted implementation is injected so generated
//! tracking numbers are predictable.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Abstraction over random number generation.
pub trait DeterministicRng: Send + Sync {
    /// Generate a random `u32` in the range `[min, max]` inclusive.
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32;
}

/// `StdRng`-backed generator used outside of tests.
#[derive(Debug)]
pub struct StdRngSource(StdRng);

impl StdRngSource {
    /// Creates a generator seeded from the operating system.
    #[must_use]
    pub fn from_os() -> Self {
        Self(StdRng::from_os_rng())
    }

    /// Creates a generator with a fixed seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl DeterministicRng for StdRngSource {
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32 {
        self.0.random_range(min..=max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_source_stays_within_bounds() {
        let mut rng = StdRngSource::seeded(7);
        for _ in 0..1_000 {
            let value = rng.next_u32_range(10, 20);
            assert!((10..=20).contains(&value));
        }
    }

    #[test]
    fn test_same_seed_produces_same_sequence() {
        let mut a = StdRngSource::seeded(42);
        let mut b = StdRngSource::seeded(42);
        let left: Vec<u32> = (0..5).map(|_| a.next_u32_range(0, 9_999_999)).collect();
        let right: Vec<u32> = (0..5).map(|_| b.next_u32_range(0, 9_999_999)).collect();
        assert_eq!(left, right);
    }
}
