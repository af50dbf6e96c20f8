//! Alert generation and notification delivery
//!
//! - [`detector`]: pure rules turning committed events into drafts
//! - [`center`]: the notification store, visibility window, timers and
//!   subscribers
//! - [`popup`]: a spaced, one-at-a-time delivery channel for operators

pub mod center;
pub mod detector;
pub mod popup;

pub use center::{NotificationCenter, NotificationError, SubscriptionId};
pub use detector::{detect, NotificationDraft};
pub use popup::PopupDelivery;

use crate::core::time::SimTime;
use crate::models::Severity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Unacknowledged notifications shown at once
    pub visible_limit: usize,
    /// Grace period before automatic acknowledgement
    pub auto_ack_after_ms: SimTime,
    /// Severities at or below this acknowledge themselves
    pub auto_ack_max_severity: Severity,
    /// Minimum gap between two popups
    pub popup_spacing_ms: SimTime,
    /// A Stop signal with a train closer than this (seconds) is an emergency
    pub collision_clearance_secs: f64,
    /// Stored notifications; the oldest acknowledged ones are dropped first
    pub history_limit: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            visible_limit: 5,
            auto_ack_after_ms: 30_000,
            auto_ack_max_severity: Severity::Low,
            popup_spacing_ms: 120_000,
            collision_clearance_secs: 30.0,
            history_limit: 1_000,
        }
    }
}
