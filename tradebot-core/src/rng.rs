//! Reproducible randomness for the exploratory signal.
//!
//! A master seed is expanded into one sub-seed per `(date, stream)` pair with
//! BLAKE3, so a backtest replayed with the same master seed makes the same
//! random picks on the same days regardless of how many cycles ran before.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedHierarchy {
    master_seed: u64,
}

impl SeedHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Sub-seed for one named stream on one trading date.
    pub fn sub_seed(&self, date: NaiveDate, stream: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(date.format("%Y-%m-%d").to_string().as_bytes());
        hasher.update(stream.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, date: NaiveDate, stream: &str) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(date, stream))
    }
}
