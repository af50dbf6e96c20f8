//! Platform Allocation
//!
//! Walks the platforms in store order once per tick:
//!
//! - an Occupied platform is released with a small probability; its train
//!   departs and leaves the station area
//! - an Available platform takes an eligible train (Approaching or Running,
//!   no platform held) with a small probability
//! - Maintenance platforms are skipped without drawing
//!
//! Exactly one platform references a train at any time; a release always
//! happens before the freed train could be considered again, and a train
//! that has just been assigned is no longer eligible.

pub mod order;

pub use order::{AssignmentOrder, AssignmentPolicy};

use crate::core::time::{SimTime, MILLIS_PER_MINUTE};
use crate::models::{Event, InvariantViolation, NetworkState, PlatformStatus, TrainStatus};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub release_probability: f64,
    pub assign_probability: f64,
    /// Minutes after assignment until the scheduled departure
    pub dwell_minutes_range: (f64, f64),
    /// Speed a departing train leaves with
    pub departure_speed_range: (f64, f64),
    pub order: AssignmentOrder,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            release_probability: 0.08,
            assign_probability: 0.06,
            dwell_minutes_range: (10.0, 30.0),
            departure_speed_range: (60.0, 100.0),
            order: AssignmentOrder::FirstEligible,
        }
    }
}

/// Matches Available platforms to waiting trains and releases Occupied ones.
pub struct PlatformAllocator {
    config: AllocationConfig,
    policy: Box<dyn AssignmentPolicy>,
}

impl fmt::Debug for PlatformAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformAllocator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PlatformAllocator {
    pub fn new(config: AllocationConfig) -> Self {
        let policy = Box::new(config.order);
        Self { config, policy }
    }

    /// Replace the configured order with a custom policy.
    pub fn with_policy(mut self, policy: Box<dyn AssignmentPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }

    /// One allocation pass.
    ///
    /// Fails if an Occupied platform points at a train that does not exist;
    /// the caller discards the pass.
    pub fn allocate(
        &self,
        state: &mut NetworkState,
        rng: &mut RngManager,
        tick: usize,
        now: SimTime,
    ) -> Result<Vec<Event>, InvariantViolation> {
        let mut events = Vec::new();

        for i in 0..state.num_platforms() {
            let platform = &state.platforms()[i];
            match platform.status() {
                PlatformStatus::Occupied if rng.chance(self.config.release_probability) => {
                    events.push(self.release(state, i, rng, tick)?);
                }
                PlatformStatus::Available if rng.chance(self.config.assign_probability) => {
                    if let Some(event) = self.assign(state, i, rng, tick, now) {
                        events.push(event);
                    }
                }
                _ => {}
            }
        }

        Ok(events)
    }

    fn release(
        &self,
        state: &mut NetworkState,
        index: usize,
        rng: &mut RngManager,
        tick: usize,
    ) -> Result<Event, InvariantViolation> {
        let platform = &state.platforms()[index];
        let platform_id = platform.id().to_string();
        let train_id = match platform.train_id() {
            Some(id) if state.get_train(id).is_some() => id.to_string(),
            Some(id) => {
                return Err(InvariantViolation::DanglingTrainReference {
                    platform_id,
                    train_id: id.to_string(),
                })
            }
            None => return Err(InvariantViolation::OccupiedWithoutTrain { platform_id }),
        };

        let (lo, hi) = self.config.departure_speed_range;
        let speed = rng.uniform(lo, hi);

        if state.platforms_mut()[index].release().is_err() {
            return Err(InvariantViolation::OccupiedWithoutTrain { platform_id });
        }
        let train = state
            .get_train_mut(&train_id)
            .ok_or_else(|| InvariantViolation::DanglingTrainReference {
                platform_id: platform_id.clone(),
                train_id: train_id.clone(),
            })?;
        train.depart(speed);

        Ok(Event::PlatformReleased {
            tick,
            train_id,
            train_name: train.name().to_string(),
            platform_id,
        })
    }

    fn assign(
        &self,
        state: &mut NetworkState,
        index: usize,
        rng: &mut RngManager,
        tick: usize,
        now: SimTime,
    ) -> Option<Event> {
        let platform = &state.platforms()[index];
        let candidates: Vec<_> = state
            .trains()
            .iter()
            .filter(|t| {
                matches!(t.status(), TrainStatus::Approaching | TrainStatus::Running)
                    && t.platform_id().is_none()
            })
            .collect();
        let chosen = self.policy.select(platform, &candidates)?;
        let train = candidates.get(chosen)?;
        let train_id = train.id().to_string();
        let passengers = train.passengers();

        let (lo, hi) = self.config.dwell_minutes_range;
        let dwell_ms = (rng.uniform(lo, hi) * MILLIS_PER_MINUTE as f64) as SimTime;
        let departure = now + dwell_ms;

        let platform = &mut state.platforms_mut()[index];
        platform.occupy(&train_id, passengers, departure).ok()?;
        let platform_id = platform.id().to_string();

        let train = state.get_train_mut(&train_id)?;
        train.arrive_at(&platform_id);

        Some(Event::PlatformAssigned {
            tick,
            train_id,
            train_name: train.name().to_string(),
            platform_id,
            scheduled_departure: departure,
        })
    }
}
