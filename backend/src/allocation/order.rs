//! Which eligible train an Available platform takes.

use crate::models::{Platform, Train};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Pluggable tie-break for platform assignment
///
/// Receives the eligible trains in store order and returns the index of
/// the one to assign, or `None` to leave the platform empty this tick.
pub trait AssignmentPolicy: Send + Sync {
    fn select(&self, platform: &Platform, candidates: &[&Train]) -> Option<usize>;
}

/// Built-in assignment orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssignmentOrder {
    /// Discovery (insertion) order, ignoring priority
    #[default]
    FirstEligible,
    /// Highest priority first, insertion order among equals
    PriorityThenInsertion,
    /// Earliest scheduled arrival first, insertion order among equals
    EarliestScheduledArrival,
}

impl AssignmentPolicy for AssignmentOrder {
    fn select(&self, _platform: &Platform, candidates: &[&Train]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let key: fn(&Train, &Train) -> Ordering = match self {
            AssignmentOrder::FirstEligible => return Some(0),
            AssignmentOrder::PriorityThenInsertion => |a, b| a.priority().cmp(&b.priority()),
            AssignmentOrder::EarliestScheduledArrival => {
                |a, b| a.scheduled_arrival().cmp(&b.scheduled_arrival())
            }
        };
        // min_by keeps the first of equal elements
        candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| key(a, b))
            .map(|(i, _)| i)
    }
}
