//! Time management for the network model
//!
//! The model advances in discrete ticks of a fixed period. This module
//! provides the tick counter and the mapping between ticks and simulated
//! milliseconds.

use serde::{Deserialize, Serialize};

/// Milliseconds since simulation start.
pub type SimTime = u64;

pub const MILLIS_PER_SECOND: SimTime = 1_000;
pub const MILLIS_PER_MINUTE: SimTime = 60 * MILLIS_PER_SECOND;

/// Counts ticks of a fixed period
///
/// # Example
/// ```
/// use railway_control_core_rs::TimeManager;
///
/// let mut time = TimeManager::new(3_000); // one tick every 3 s
/// assert_eq!(time.current_tick(), 0);
///
/// time.advance_tick();
/// assert_eq!(time.current_tick(), 1);
/// assert_eq!(time.elapsed_ms(), 3_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeManager {
    /// Total ticks elapsed since simulation start
    current_tick: usize,
    /// Length of one tick in simulated milliseconds
    tick_period_ms: SimTime,
}

impl TimeManager {
    /// Create a new TimeManager
    ///
    /// # Panics
    /// Panics if `tick_period_ms` is zero
    pub fn new(tick_period_ms: SimTime) -> Self {
        assert!(tick_period_ms > 0, "tick_period_ms must be positive");
        Self {
            current_tick: 0,
            tick_period_ms,
        }
    }

    /// Advance time by one tick
    pub fn advance_tick(&mut self) {
        self.current_tick += 1;
    }

    /// Get the current tick (total ticks since start)
    pub fn current_tick(&self) -> usize {
        self.current_tick
    }

    /// Simulated time covered by the ticks executed so far
    pub fn elapsed_ms(&self) -> SimTime {
        self.current_tick as SimTime * self.tick_period_ms
    }

    /// Tick period in milliseconds
    pub fn tick_period_ms(&self) -> SimTime {
        self.tick_period_ms
    }

    /// Tick period in seconds, for kinematics
    pub fn tick_period_secs(&self) -> f64 {
        self.tick_period_ms as f64 / MILLIS_PER_SECOND as f64
    }
}

/// Render minutes-of-day as `HH:MM`, wrapping past midnight.
///
/// ```
/// use railway_control_core_rs::core::time::format_hhmm;
///
/// assert_eq!(format_hhmm(14 * 60 + 5), "14:05");
/// assert_eq!(format_hhmm(24 * 60 + 30), "00:30");
/// assert_eq!(format_hhmm(-10), "23:50");
/// ```
pub fn format_hhmm(minutes_of_day: i32) -> String {
    let m = minutes_of_day.rem_euclid(24 * 60);
    format!("{:02}:{:02}", m / 60, m % 60)
}
