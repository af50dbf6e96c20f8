//! Train model
//!
//! Represents one train service on the line. Each train has:
//! - A lifecycle status (Approaching → Running → OnTime/Delayed → Departed)
//! - Delay in minutes, speed in km/h and a linear track position
//! - An optional platform reference while it stands at the station
//!
//! # Critical Invariants
//!
//! 1. A Departed train holds no platform reference
//! 2. `delay > 0` implies status Delayed unless the train has Departed
//! 3. Delay only decreases through [`Train::correct_schedule`]

use crate::core::time::format_hhmm;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrainStatus {
    Approaching,
    Running,
    OnTime,
    Delayed,
    Departed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrainPriority {
    High,
    Medium,
    Low,
}

/// Result of a delay increase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayChange {
    pub previous_delay: i32,
    pub new_delay: i32,
    pub previous_status: TrainStatus,
    /// True when this change moved the train into Delayed status.
    pub became_delayed: bool,
}

/// Represents a train service
///
/// # Example
/// ```
/// use railway_control_core_rs::models::{Train, TrainPriority, TrainStatus};
///
/// let train = Train::new("12006", "Allahabad Shatabdi Express")
///     .with_status(TrainStatus::Approaching)
///     .with_speed(75.0)
///     .with_passengers(142)
///     .with_priority(TrainPriority::High)
///     .with_schedule(14 * 60 + 35, 0);
///
/// assert_eq!(train.actual_arrival_hhmm(), "14:35");
/// assert!(train.platform_id().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Train {
    id: String,
    name: String,
    current_location: String,
    next_station: String,
    /// Minutes since midnight
    scheduled_arrival: i32,
    /// Minutes; negative means running early
    delay: i32,
    /// km/h, never negative
    speed: f64,
    status: TrainStatus,
    platform_id: Option<String>,
    passengers: u32,
    priority: TrainPriority,
    /// Metres along the line
    #[serde(default)]
    position_m: f64,
}

impl Train {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            current_location: "En Route".to_string(),
            next_station: String::new(),
            scheduled_arrival: 0,
            delay: 0,
            speed: 0.0,
            status: TrainStatus::Running,
            platform_id: None,
            passengers: 0,
            priority: TrainPriority::Medium,
            position_m: 0.0,
        }
    }

    pub fn with_status(mut self, status: TrainStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed.max(0.0);
        self
    }

    pub fn with_passengers(mut self, passengers: u32) -> Self {
        self.passengers = passengers;
        self
    }

    pub fn with_priority(mut self, priority: TrainPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Scheduled arrival (minutes of day) and initial delay (minutes).
    pub fn with_schedule(mut self, scheduled_arrival: i32, delay: i32) -> Self {
        self.scheduled_arrival = scheduled_arrival;
        self.delay = delay;
        self
    }

    pub fn with_location(mut self, current: impl Into<String>, next_station: impl Into<String>) -> Self {
        self.current_location = current.into();
        self.next_station = next_station.into();
        self
    }

    pub fn with_position(mut self, position_m: f64) -> Self {
        self.position_m = position_m;
        self
    }

    pub fn at_platform(mut self, platform_id: impl Into<String>) -> Self {
        self.platform_id = Some(platform_id.into());
        self.speed = 0.0;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_location(&self) -> &str {
        &self.current_location
    }

    pub fn next_station(&self) -> &str {
        &self.next_station
    }

    pub fn scheduled_arrival(&self) -> i32 {
        self.scheduled_arrival
    }

    /// Scheduled arrival plus current delay, in minutes of day.
    pub fn actual_arrival(&self) -> i32 {
        self.scheduled_arrival + self.delay
    }

    pub fn scheduled_arrival_hhmm(&self) -> String {
        format_hhmm(self.scheduled_arrival)
    }

    pub fn actual_arrival_hhmm(&self) -> String {
        format_hhmm(self.actual_arrival())
    }

    pub fn delay(&self) -> i32 {
        self.delay
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn status(&self) -> TrainStatus {
        self.status
    }

    pub fn platform_id(&self) -> Option<&str> {
        self.platform_id.as_deref()
    }

    pub fn passengers(&self) -> u32 {
        self.passengers
    }

    pub fn priority(&self) -> TrainPriority {
        self.priority
    }

    pub fn position_m(&self) -> f64 {
        self.position_m
    }

    pub fn is_departed(&self) -> bool {
        self.status == TrainStatus::Departed
    }

    /// Punctual means not behind schedule (early counts as punctual).
    pub fn is_punctual(&self) -> bool {
        self.delay <= 0
    }

    /// Add `minutes` of delay, clamping the result at zero.
    ///
    /// Moves the train into Delayed unless it has departed.
    pub fn add_delay(&mut self, minutes: i32) -> DelayChange {
        let previous_delay = self.delay;
        let previous_status = self.status;
        self.delay = (self.delay + minutes.max(0)).max(0);

        let became_delayed = self.delay > 0
            && previous_status != TrainStatus::Delayed
            && previous_status != TrainStatus::Departed;
        if became_delayed {
            self.status = TrainStatus::Delayed;
        }

        DelayChange {
            previous_delay,
            new_delay: self.delay,
            previous_status,
            became_delayed,
        }
    }

    /// Explicit schedule correction: the only way delay goes down.
    ///
    /// Status is re-derived: a Delayed train that is back on schedule becomes
    /// OnTime at a platform and Running elsewhere.
    pub fn correct_schedule(&mut self, delay: i32) {
        self.delay = delay;
        match self.status {
            TrainStatus::Departed => {}
            _ if delay > 0 => self.status = TrainStatus::Delayed,
            TrainStatus::Delayed if self.platform_id.is_some() => self.status = TrainStatus::OnTime,
            TrainStatus::Delayed => self.status = TrainStatus::Running,
            _ => {}
        }
    }

    pub(crate) fn set_running(&mut self, speed: f64, location: &str) {
        self.status = TrainStatus::Running;
        self.speed = speed.max(0.0);
        self.current_location = location.to_string();
    }

    pub(crate) fn set_speed(&mut self, speed: f64) {
        self.speed = speed.max(0.0);
    }

    pub(crate) fn set_location(&mut self, location: &str) {
        self.current_location = location.to_string();
    }

    pub(crate) fn set_position(&mut self, position_m: f64) {
        self.position_m = position_m;
    }

    /// Stand the train at a platform.
    pub(crate) fn arrive_at(&mut self, platform_id: &str) {
        self.platform_id = Some(platform_id.to_string());
        self.status = if self.delay > 0 {
            TrainStatus::Delayed
        } else {
            TrainStatus::OnTime
        };
        self.current_location = format!("Platform {}", platform_id);
        self.speed = 0.0;
    }

    /// Leave the platform. The record stays in the store, detached.
    pub(crate) fn depart(&mut self, speed: f64) {
        self.platform_id = None;
        self.status = TrainStatus::Departed;
        self.current_location = "En Route".to_string();
        self.speed = speed.max(0.0);
    }

    // Repair hooks used by NetworkState::repair

    pub(crate) fn drop_platform(&mut self) {
        self.platform_id = None;
    }

    pub(crate) fn reset_kinematics(&mut self) {
        self.speed = 0.0;
        self.position_m = 0.0;
    }

    pub(crate) fn force_status(&mut self, status: TrainStatus) {
        self.status = status;
    }

    /// Test hook for building malformed records.
    #[doc(hidden)]
    pub fn corrupt_position(&mut self, position_m: f64) {
        self.position_m = position_m;
    }

    /// Test hook for building malformed records.
    #[doc(hidden)]
    pub fn corrupt_platform_reference(&mut self, platform_id: Option<String>) {
        self.platform_id = platform_id;
    }
}
