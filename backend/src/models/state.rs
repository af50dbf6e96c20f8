//! Network State (entity store)
//!
//! Canonical records for every signal, platform and train. Records keep
//! their insertion order, which is the discovery order used by platform
//! assignment.
//!
//! # Critical Invariants
//!
//! 1. **Capacity**: every platform's passenger count ≤ capacity
//! 2. **Occupancy**: a platform is Occupied iff it references a train
//! 3. **Bidirectional references**: an Occupied platform's train points back
//!    at that platform, and at most one platform references any train
//! 4. **Detachment**: a Departed train holds no platform
//! 5. **Delay/status**: delay > 0 implies Delayed unless Departed
//! 6. **Block protection**: with a [`BlockGuard`] installed, no signal shows
//!    Proceed while a train stands within the guard distance past it
//!
//! [`NetworkState::validate`] reports violations; [`NetworkState::repair`]
//! clamps or drops the offending data.

use crate::models::platform::{Platform, PlatformStatus};
use crate::models::signal::Signal;
use crate::models::train::{Train, TrainStatus};
use crate::models::Aspect;
use crate::policy::discretize::track_offset;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// A broken cross-entity invariant.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvariantViolation {
    #[error("platform {platform_id} holds {passengers} passengers, capacity {capacity}")]
    PlatformOverCapacity {
        platform_id: String,
        passengers: u32,
        capacity: u32,
    },

    #[error("platform {platform_id} is Occupied without a train reference")]
    OccupiedWithoutTrain { platform_id: String },

    #[error("platform {platform_id} references train {train_id} but is not Occupied")]
    TrainOnFreePlatform { platform_id: String, train_id: String },

    #[error("platform {platform_id} references unknown train {train_id}")]
    DanglingTrainReference { platform_id: String, train_id: String },

    #[error("train {train_id} references unknown platform {platform_id}")]
    DanglingPlatformReference { train_id: String, platform_id: String },

    #[error("platform {platform_id} holds train {train_id}, which points elsewhere")]
    BrokenBackReference { platform_id: String, train_id: String },

    #[error("train {train_id} is referenced by platforms {first} and {second}")]
    DuplicatePlatformReference {
        train_id: String,
        first: String,
        second: String,
    },

    #[error("departed train {train_id} still holds platform {platform_id}")]
    DepartedHoldsPlatform { train_id: String, platform_id: String },

    #[error("train {train_id} has non-finite speed or position")]
    NonFiniteKinematics { train_id: String },

    #[error("train {train_id} has delay {delay} but status {status:?}")]
    DelayedStatusMismatch {
        train_id: String,
        delay: i32,
        status: TrainStatus,
    },

    #[error("signal {signal_id} shows Proceed with train {train_id} in the block ahead")]
    ProceedIntoOccupiedBlock { signal_id: String, train_id: String },
}

/// Protected stretch past every signal.
///
/// A train whose offset from a signal lies in `[0, distance_m)` occupies
/// that signal's block; offsets wrap on a circular line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockGuard {
    pub distance_m: f64,
    /// Zero or negative means an open line
    pub line_length_m: f64,
}

/// Complete network state
///
/// # Example
///
/// ```rust
/// use railway_control_core_rs::models::{NetworkState, Platform, Signal, Train, TrainStatus};
///
/// let state = NetworkState::new(
///     vec![Signal::new("SIG-1", "Main Line", 0.0)],
///     vec![Platform::new("P1", 200).occupied_by("T1", 150, None)],
///     vec![Train::new("T1", "Express").with_status(TrainStatus::OnTime).at_platform("P1")],
/// );
/// assert_eq!(state.num_trains(), 1);
/// assert!(state.validate().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    signals: Vec<Signal>,
    platforms: Vec<Platform>,
    trains: Vec<Train>,
    #[serde(default)]
    block_guard: Option<BlockGuard>,
}

impl NetworkState {
    pub fn new(signals: Vec<Signal>, platforms: Vec<Platform>, trains: Vec<Train>) -> Self {
        Self {
            signals,
            platforms,
            trains,
            block_guard: None,
        }
    }

    /// Enforce block protection from now on.
    pub fn with_block_guard(mut self, guard: BlockGuard) -> Self {
        self.block_guard = Some(guard);
        self
    }

    pub fn block_guard(&self) -> Option<&BlockGuard> {
        self.block_guard.as_ref()
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn get_signal(&self, id: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.id() == id)
    }

    pub fn get_platform(&self, id: &str) -> Option<&Platform> {
        self.platforms.iter().find(|p| p.id() == id)
    }

    pub fn get_train(&self, id: &str) -> Option<&Train> {
        self.trains.iter().find(|t| t.id() == id)
    }

    /// Mutable access bypasses component rules; used by the owning
    /// components and by tests that need malformed records.
    pub fn get_signal_mut(&mut self, id: &str) -> Option<&mut Signal> {
        self.signals.iter_mut().find(|s| s.id() == id)
    }

    pub fn get_platform_mut(&mut self, id: &str) -> Option<&mut Platform> {
        self.platforms.iter_mut().find(|p| p.id() == id)
    }

    pub fn get_train_mut(&mut self, id: &str) -> Option<&mut Train> {
        self.trains.iter_mut().find(|t| t.id() == id)
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn trains(&self) -> &[Train] {
        &self.trains
    }

    pub(crate) fn signals_mut(&mut self) -> &mut [Signal] {
        &mut self.signals
    }

    pub(crate) fn platforms_mut(&mut self) -> &mut [Platform] {
        &mut self.platforms
    }

    pub(crate) fn trains_mut(&mut self) -> &mut [Train] {
        &mut self.trains
    }

    /// Platform currently referencing `train_id`, if any.
    pub fn platform_of(&self, train_id: &str) -> Option<&Platform> {
        self.platforms
            .iter()
            .find(|p| p.train_id() == Some(train_id))
    }

    pub fn num_signals(&self) -> usize {
        self.signals.len()
    }

    pub fn num_platforms(&self) -> usize {
        self.platforms.len()
    }

    pub fn num_trains(&self) -> usize {
        self.trains.len()
    }

    /// Trains that have not departed.
    pub fn active_trains(&self) -> impl Iterator<Item = &Train> {
        self.trains.iter().filter(|t| !t.is_departed())
    }

    /// First train, in store order, inside the guarded block past `signal`.
    ///
    /// Always `None` without a [`BlockGuard`].
    pub fn train_ahead_of(&self, signal: &Signal) -> Option<&Train> {
        let guard = self.block_guard?;
        self.trains.iter().find(|train| {
            let offset = track_offset(signal.position_m(), train.position_m(), guard.line_length_m);
            (0.0..guard.distance_m).contains(&offset)
        })
    }

    // ========================================================================
    // Invariants
    // ========================================================================

    /// Report every broken invariant, in a stable order.
    pub fn validate(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        let mut holders: HashMap<&str, &str> = HashMap::new();

        for platform in &self.platforms {
            if platform.passenger_count() > platform.capacity() {
                violations.push(InvariantViolation::PlatformOverCapacity {
                    platform_id: platform.id().to_string(),
                    passengers: platform.passenger_count(),
                    capacity: platform.capacity(),
                });
            }

            match (platform.status(), platform.train_id()) {
                (PlatformStatus::Occupied, None) => {
                    violations.push(InvariantViolation::OccupiedWithoutTrain {
                        platform_id: platform.id().to_string(),
                    });
                }
                (PlatformStatus::Occupied, Some(train_id)) => {
                    match self.get_train(train_id) {
                        None => violations.push(InvariantViolation::DanglingTrainReference {
                            platform_id: platform.id().to_string(),
                            train_id: train_id.to_string(),
                        }),
                        Some(train) if train.platform_id() != Some(platform.id()) => {
                            violations.push(InvariantViolation::BrokenBackReference {
                                platform_id: platform.id().to_string(),
                                train_id: train_id.to_string(),
                            })
                        }
                        Some(_) => {}
                    }
                    if let Some(first) = holders.insert(train_id, platform.id()) {
                        violations.push(InvariantViolation::DuplicatePlatformReference {
                            train_id: train_id.to_string(),
                            first: first.to_string(),
                            second: platform.id().to_string(),
                        });
                    }
                }
                (_, Some(train_id)) => {
                    violations.push(InvariantViolation::TrainOnFreePlatform {
                        platform_id: platform.id().to_string(),
                        train_id: train_id.to_string(),
                    });
                }
                (_, None) => {}
            }
        }

        for train in &self.trains {
            if let Some(platform_id) = train.platform_id() {
                if train.is_departed() {
                    violations.push(InvariantViolation::DepartedHoldsPlatform {
                        train_id: train.id().to_string(),
                        platform_id: platform_id.to_string(),
                    });
                }
                match self.get_platform(platform_id) {
                    None => violations.push(InvariantViolation::DanglingPlatformReference {
                        train_id: train.id().to_string(),
                        platform_id: platform_id.to_string(),
                    }),
                    // A platform pointing at a different train is reported
                    // from the platform side when that train exists; this
                    // catches the one-sided case.
                    Some(platform) if platform.train_id() != Some(train.id()) => {
                        violations.push(InvariantViolation::BrokenBackReference {
                            platform_id: platform_id.to_string(),
                            train_id: train.id().to_string(),
                        })
                    }
                    Some(_) => {}
                }
            }

            if !train.speed().is_finite() || !train.position_m().is_finite() {
                violations.push(InvariantViolation::NonFiniteKinematics {
                    train_id: train.id().to_string(),
                });
            }

            if train.delay() > 0
                && !matches!(train.status(), TrainStatus::Delayed | TrainStatus::Departed)
            {
                violations.push(InvariantViolation::DelayedStatusMismatch {
                    train_id: train.id().to_string(),
                    delay: train.delay(),
                    status: train.status(),
                });
            }
        }

        for signal in &self.signals {
            if signal.aspect() != Aspect::Proceed {
                continue;
            }
            if let Some(train) = self.train_ahead_of(signal) {
                violations.push(InvariantViolation::ProceedIntoOccupiedBlock {
                    signal_id: signal.id().to_string(),
                    train_id: train.id().to_string(),
                });
            }
        }

        violations
    }

    /// Clamp or drop whatever breaks an invariant.
    ///
    /// Returns the violations found before repair; empty means the state was
    /// already consistent and nothing changed.
    pub fn repair(&mut self) -> Vec<InvariantViolation> {
        let found = self.validate();
        if found.is_empty() {
            return found;
        }

        for platform in &mut self.platforms {
            platform.clamp_passengers();
        }

        // Departed trains release whatever they still hold.
        for train in &mut self.trains {
            if train.is_departed() {
                train.drop_platform();
            }
        }

        // Platform side: keep only references that point at a live train
        // whose back-reference agrees, first platform wins on duplicates.
        let mut claimed: Vec<String> = Vec::new();
        for i in 0..self.platforms.len() {
            let platform = &self.platforms[i];
            let keep = match (platform.status(), platform.train_id()) {
                (PlatformStatus::Occupied, Some(train_id)) => {
                    let agrees = self
                        .trains
                        .iter()
                        .any(|t| t.id() == train_id && t.platform_id() == Some(platform.id()));
                    agrees && !claimed.iter().any(|c| c == train_id)
                }
                (_, None) => true,
                _ => false,
            };
            if keep {
                if let Some(train_id) = platform.train_id() {
                    claimed.push(train_id.to_string());
                }
            } else if self.platforms[i].status() == PlatformStatus::Maintenance {
                self.platforms[i].corrupt_train_reference(None);
            } else {
                self.platforms[i].force_available();
            }
        }

        // Train side: drop references no platform confirms.
        for i in 0..self.trains.len() {
            let confirmed = match self.trains[i].platform_id() {
                Some(platform_id) => self.platforms.iter().any(|p| {
                    p.id() == platform_id && p.train_id() == Some(self.trains[i].id())
                }),
                None => true,
            };
            if !confirmed {
                self.trains[i].drop_platform();
            }
        }

        for train in &mut self.trains {
            if !train.speed().is_finite() || !train.position_m().is_finite() {
                train.reset_kinematics();
            }
            if train.delay() > 0
                && !matches!(train.status(), TrainStatus::Delayed | TrainStatus::Departed)
            {
                train.force_status(TrainStatus::Delayed);
            }
        }

        // Last, so trains reset to position 0 above are seen.
        let held: Vec<usize> = self
            .signals
            .iter()
            .enumerate()
            .filter(|(_, s)| s.aspect() == Aspect::Proceed && self.train_ahead_of(s).is_some())
            .map(|(i, _)| i)
            .collect();
        for i in held {
            self.signals[i].hold_at_stop();
        }

        found
    }
}
