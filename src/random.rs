//! Injectable randomness
//!
//! Prompt variants and daily spins draw from a `RandomSource` so tests can
//! pin the outcome.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

pub trait RandomSource: Send + Sync {
    /// Uniform integer in `0..upper`. An `upper` of zero yields zero.
    fn next_below(&self, upper: u32) -> u32;
}

/// Thread-local OS-seeded generator
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_below(&self, upper: u32) -> u32 {
        if upper == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..upper)
    }
}

/// Reproducible generator for demos and tests
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_below(&self, upper: u32) -> u32 {
        if upper == 0 {
            return 0;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(0..upper)
    }
}

/// Always returns the same roll (wrapped into range)
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub u32);

impl RandomSource for FixedRandom {
    fn next_below(&self, upper: u32) -> u32 {
        if upper == 0 {
            0
        } else {
            self.0 % upper
        }
    }
}
