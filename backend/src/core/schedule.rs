//! Fixed-period cadences
//!
//! A [`Cadence`] remembers when it is next due. The orchestrator keeps one per
//! periodic activity (entity ticks, metrics sampling) and fires them
//! independently, so a slow metrics period never stretches the tick period.

use super::time::SimTime;
use serde::{Deserialize, Serialize};

/// One periodic activity.
///
/// # Example
/// ```
/// use railway_control_core_rs::core::schedule::Cadence;
///
/// let mut cadence = Cadence::new(3_000);
/// assert_eq!(cadence.next_due(), 3_000);
/// assert!(!cadence.is_due(2_999));
/// assert!(cadence.is_due(3_000));
///
/// let fired_at = cadence.fire();
/// assert_eq!(fired_at, 3_000);
/// assert_eq!(cadence.next_due(), 6_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadence {
    period_ms: SimTime,
    next_due_ms: SimTime,
}

impl Cadence {
    /// First firing is one full period after time zero.
    ///
    /// # Panics
    /// Panics if `period_ms` is zero
    pub fn new(period_ms: SimTime) -> Self {
        Self::starting_at(period_ms, period_ms)
    }

    pub fn starting_at(period_ms: SimTime, first_due_ms: SimTime) -> Self {
        assert!(period_ms > 0, "cadence period must be positive");
        Self {
            period_ms,
            next_due_ms: first_due_ms,
        }
    }

    pub fn period_ms(&self) -> SimTime {
        self.period_ms
    }

    pub fn next_due(&self) -> SimTime {
        self.next_due_ms
    }

    pub fn is_due(&self, now: SimTime) -> bool {
        now >= self.next_due_ms
    }

    /// Consume the pending firing and return its scheduled time.
    pub fn fire(&mut self) -> SimTime {
        let at = self.next_due_ms;
        self.next_due_ms += self.period_ms;
        at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_up_fires_each_missed_period() {
        let mut cadence = Cadence::new(1_000);
        let mut fired = Vec::new();
        while cadence.is_due(3_500) {
            fired.push(cadence.fire());
        }
        assert_eq!(fired, vec![1_000, 2_000, 3_000]);
        assert_eq!(cadence.next_due(), 4_000);
    }

    #[test]
    #[should_panic(expected = "cadence period must be positive")]
    fn test_zero_period_panics() {
        Cadence::new(0);
    }
}
