//! Seeded xorshift64* stream
//!
//! Every stochastic choice in a tick draws from here: train starts, delay
//! accrual, platform assignment and release, exploration and the initial
//! Q-table. Two networks built from the same config replay the same ticks.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MULTIPLIER: u64 = 0x2545_F491_4F6C_DD1D;

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use railway_control_core_rs::RngManager;
///
/// let mut rng = RngManager::new(12345);
/// let minutes = rng.range_inclusive(1, 4);
/// assert!((1..=4).contains(&minutes));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngManager {
    state: u64,
}

impl RngManager {
    /// Seed 0 is replaced by 1; xorshift never leaves the zero state.
    pub fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(MULTIPLIER)
    }

    /// Integer in `[lo, hi)`.
    ///
    /// # Panics
    /// If the interval is empty.
    pub fn range(&mut self, lo: i64, hi: i64) -> i64 {
        assert!(lo < hi, "empty range [{}, {})", lo, hi);
        let span = hi.abs_diff(lo);
        lo.wrapping_add((self.next() % span) as i64)
    }

    /// Integer in `[lo, hi]`.
    pub fn range_inclusive(&mut self, lo: i64, hi: i64) -> i64 {
        self.range(lo, hi + 1)
    }

    /// Raw generator state, for replay checks.
    pub fn get_state(&self) -> u64 {
        self.state
    }

    /// Float in `[0, 1)` from the top 53 bits of one draw.
    pub fn next_f64(&mut self) -> f64 {
        const SCALE: f64 = 1.0 / (1u64 << 53) as f64;
        (self.next() >> 11) as f64 * SCALE
    }

    /// Float in `[lo, hi)`.
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_f64() * (hi - lo)
    }

    /// True with probability `p`. One draw per call whatever the outcome,
    /// so a skipped branch never shifts later draws.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Index in `[0, len)`; panics on an empty slice length.
    pub fn index(&mut self, len: usize) -> usize {
        self.range(0, len as i64) as usize
    }

    /// Version-4 UUID built from two draws, reproducible under a fixed seed.
    pub fn uuid(&mut self) -> Uuid {
        let hi = self.next().to_le_bytes();
        let lo = self.next().to_le_bytes();
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&hi);
        bytes[8..].copy_from_slice(&lo);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}
