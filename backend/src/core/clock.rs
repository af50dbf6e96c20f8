//! Clock abstraction
//!
//! Everything time-driven (ticks, metrics sampling, auto-acknowledgement)
//! reads the current time through [`Clock`]. Tests use [`VirtualClock`] and
//! advance it explicitly; the live service uses [`SystemClock`].

use super::time::SimTime;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Source of "now" in simulated milliseconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> SimTime;
}

/// Manually advanced clock.
///
/// Clones share the same underlying time, so a test can hold one handle and
/// give another to the component under test.
///
/// ```
/// use railway_control_core_rs::core::clock::{Clock, VirtualClock};
///
/// let clock = VirtualClock::new();
/// let handle = clock.clone();
/// clock.advance(1_500);
/// assert_eq!(handle.now(), 1_500);
/// ```
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    now: Arc<AtomicU64>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `delta` milliseconds.
    pub fn advance(&self, delta: SimTime) -> SimTime {
        self.now.fetch_add(delta, Ordering::SeqCst) + delta
    }

    /// Jump to an absolute time. Time never moves backwards.
    pub fn set(&self, to: SimTime) {
        self.now.fetch_max(to, Ordering::SeqCst);
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> SimTime {
        self.now.load(Ordering::SeqCst)
    }
}

/// Wall-clock time elapsed since the clock was created.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> SimTime {
        self.origin.elapsed().as_millis() as SimTime
    }
}
