//! Event logging for replay, auditing and alert detection.
//!
//! Every state transition a tick commits is recorded as an [`Event`]. The
//! alert generator derives notifications from these events alone, so the
//! log is also the input contract of `alerts::detector`.
//!
//! # Example
//!
//! ```rust
//! use railway_control_core_rs::models::{Event, EventLog};
//!
//! let mut log = EventLog::new();
//! log.log(Event::DelayIncreased {
//!     tick: 10,
//!     train_id: "12008".to_string(),
//!     train_name: "Chandigarh Shatabdi".to_string(),
//!     previous_delay: 0,
//!     new_delay: 3,
//!     became_delayed: true,
//! });
//!
//! assert_eq!(log.events_for_train("12008").len(), 1);
//! assert_eq!(log.events_of_type("DelayIncreased")[0].tick(), 10);
//! ```

use crate::core::time::SimTime;
use crate::models::signal::Aspect;
use crate::policy::TrackState;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A committed state transition.
///
/// Events are logged in the order they occur within a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Approaching train started running into the station area
    TrainStarted {
        tick: usize,
        train_id: String,
        speed: f64,
    },

    /// Train delay grew
    DelayIncreased {
        tick: usize,
        train_id: String,
        train_name: String,
        previous_delay: i32,
        new_delay: i32,
        /// Status changed into Delayed with this increase
        became_delayed: bool,
    },

    /// Train observed crawling below the low-speed threshold
    LowSpeed {
        tick: usize,
        train_id: String,
        train_name: String,
        speed: f64,
    },

    /// Train stood at a platform
    PlatformAssigned {
        tick: usize,
        train_id: String,
        train_name: String,
        platform_id: String,
        scheduled_departure: SimTime,
    },

    /// Train left its platform
    PlatformReleased {
        tick: usize,
        train_id: String,
        train_name: String,
        platform_id: String,
    },

    /// Signal policy committed an aspect
    SignalChanged {
        tick: usize,
        signal_id: String,
        location: String,
        from: Aspect,
        to: Aspect,
        state: TrackState,
        train_id: Option<String>,
        /// Seconds until the associated train reaches the signal
        clearance_secs: Option<f64>,
        reward: f64,
        interlocked: bool,
    },

    /// An invariant violation was clamped after commit
    InvariantRepaired { tick: usize, violation: String },

    /// A component failed during a tick and its writes were discarded
    TickFault {
        tick: usize,
        component: String,
        message: String,
    },
}

impl Event {
    /// Get the tick number when this event occurred
    pub fn tick(&self) -> usize {
        match self {
            Event::TrainStarted { tick, .. } => *tick,
            Event::DelayIncreased { tick, .. } => *tick,
            Event::LowSpeed { tick, .. } => *tick,
            Event::PlatformAssigned { tick, .. } => *tick,
            Event::PlatformReleased { tick, .. } => *tick,
            Event::SignalChanged { tick, .. } => *tick,
            Event::InvariantRepaired { tick, .. } => *tick,
            Event::TickFault { tick, .. } => *tick,
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::TrainStarted { .. } => "TrainStarted",
            Event::DelayIncreased { .. } => "DelayIncreased",
            Event::LowSpeed { .. } => "LowSpeed",
            Event::PlatformAssigned { .. } => "PlatformAssigned",
            Event::PlatformReleased { .. } => "PlatformReleased",
            Event::SignalChanged { .. } => "SignalChanged",
            Event::InvariantRepaired { .. } => "InvariantRepaired",
            Event::TickFault { .. } => "TickFault",
        }
    }

    /// Get train ID if event relates to a specific train
    pub fn train_id(&self) -> Option<&str> {
        match self {
            Event::TrainStarted { train_id, .. } => Some(train_id),
            Event::DelayIncreased { train_id, .. } => Some(train_id),
            Event::LowSpeed { train_id, .. } => Some(train_id),
            Event::PlatformAssigned { train_id, .. } => Some(train_id),
            Event::PlatformReleased { train_id, .. } => Some(train_id),
            Event::SignalChanged { train_id, .. } => train_id.as_deref(),
            _ => None,
        }
    }
}

/// Bounded event log; the oldest events fall off once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<Event>,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Add an event to the log
    pub fn log(&mut self, event: Event) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Get events for a specific tick
    pub fn events_at_tick(&self, tick: usize) -> Vec<&Event> {
        self.events.iter().filter(|e| e.tick() == tick).collect()
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get events for a specific train
    pub fn events_for_train(&self, train_id: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.train_id() == Some(train_id))
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
