//! Platform model
//!
//! A station platform that can hold at most one train at a time.
//!
//! # Critical Invariants
//!
//! 1. `passenger_count <= capacity`
//! 2. `status == Occupied` ⇔ `train_id.is_some()`

use crate::core::time::SimTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformStatus {
    Available,
    Occupied,
    Maintenance,
}

/// Errors that can occur during platform operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlatformError {
    #[error("Platform {platform_id} is not available (status {status:?})")]
    NotAvailable {
        platform_id: String,
        status: PlatformStatus,
    },

    #[error("Platform {platform_id} is not occupied")]
    NotOccupied { platform_id: String },
}

/// Represents a platform at the station
///
/// # Example
/// ```
/// use railway_control_core_rs::models::{Platform, PlatformStatus};
///
/// let mut platform = Platform::new("P1", 200);
/// assert_eq!(platform.status(), PlatformStatus::Available);
///
/// platform.occupy("12002", 250, 600_000).unwrap();
/// assert_eq!(platform.status(), PlatformStatus::Occupied);
/// assert_eq!(platform.passenger_count(), 200); // clamped to capacity
///
/// let departed = platform.release().unwrap();
/// assert_eq!(departed, "12002");
/// assert_eq!(platform.passenger_count(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    id: String,
    status: PlatformStatus,
    train_id: Option<String>,
    passenger_count: u32,
    capacity: u32,
    scheduled_departure: Option<SimTime>,
}

impl Platform {
    pub fn new(id: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: id.into(),
            status: PlatformStatus::Available,
            train_id: None,
            passenger_count: 0,
            capacity,
            scheduled_departure: None,
        }
    }

    /// Seed an occupied platform (fixtures and tests).
    pub fn occupied_by(
        mut self,
        train_id: impl Into<String>,
        passenger_count: u32,
        scheduled_departure: Option<SimTime>,
    ) -> Self {
        self.status = PlatformStatus::Occupied;
        self.train_id = Some(train_id.into());
        self.passenger_count = passenger_count;
        self.scheduled_departure = scheduled_departure;
        self
    }

    pub fn under_maintenance(mut self) -> Self {
        self.status = PlatformStatus::Maintenance;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> PlatformStatus {
        self.status
    }

    pub fn train_id(&self) -> Option<&str> {
        self.train_id.as_deref()
    }

    pub fn passenger_count(&self) -> u32 {
        self.passenger_count
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn scheduled_departure(&self) -> Option<SimTime> {
        self.scheduled_departure
    }

    pub fn is_available(&self) -> bool {
        self.status == PlatformStatus::Available
    }

    pub fn is_occupied(&self) -> bool {
        self.status == PlatformStatus::Occupied
    }

    /// Accept a train. Passenger count is clamped to capacity.
    pub fn occupy(
        &mut self,
        train_id: &str,
        passengers: u32,
        scheduled_departure: SimTime,
    ) -> Result<(), PlatformError> {
        if self.status != PlatformStatus::Available {
            return Err(PlatformError::NotAvailable {
                platform_id: self.id.clone(),
                status: self.status,
            });
        }
        self.status = PlatformStatus::Occupied;
        self.train_id = Some(train_id.to_string());
        self.passenger_count = passengers.min(self.capacity);
        self.scheduled_departure = Some(scheduled_departure);
        Ok(())
    }

    /// Free the platform and return the train that held it.
    pub fn release(&mut self) -> Result<String, PlatformError> {
        match (self.status, self.train_id.take()) {
            (PlatformStatus::Occupied, Some(train_id)) => {
                self.status = PlatformStatus::Available;
                self.passenger_count = 0;
                self.scheduled_departure = None;
                Ok(train_id)
            }
            (_, previous) => {
                self.train_id = previous;
                Err(PlatformError::NotOccupied {
                    platform_id: self.id.clone(),
                })
            }
        }
    }

    /// Toggle maintenance on a platform that holds no train.
    pub fn set_maintenance(&mut self, on: bool) -> Result<(), PlatformError> {
        match (self.status, on) {
            (PlatformStatus::Occupied, _) => Err(PlatformError::NotAvailable {
                platform_id: self.id.clone(),
                status: self.status,
            }),
            (_, true) => {
                self.status = PlatformStatus::Maintenance;
                Ok(())
            }
            (_, false) => {
                self.status = PlatformStatus::Available;
                Ok(())
            }
        }
    }

    // Repair hooks used by NetworkState::repair

    pub(crate) fn clamp_passengers(&mut self) {
        self.passenger_count = self.passenger_count.min(self.capacity);
    }

    pub(crate) fn force_available(&mut self) {
        self.status = PlatformStatus::Available;
        self.train_id = None;
        self.passenger_count = 0;
        self.scheduled_departure = None;
    }

    /// Test hook for building malformed records.
    #[doc(hidden)]
    pub fn corrupt_train_reference(&mut self, train_id: Option<String>) {
        self.train_id = train_id;
    }

    /// Test hook for building malformed records.
    #[doc(hidden)]
    pub fn corrupt_passenger_count(&mut self, passengers: u32) {
        self.passenger_count = passengers;
    }
}
