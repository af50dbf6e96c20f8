//! Railway Control Core - Rust Engine
//!
//! Station-area network model with a learning signal controller and
//! deterministic execution.
//!
//! # Architecture
//!
//! - **core**: Simulation time, clocks and cadences
//! - **models**: Domain types (Signal, Platform, Train, Notification, State)
//! - **motion**: Train status, speed, position and delay per tick
//! - **allocation**: Platform assignment and release
//! - **policy**: Signal aspect selection (Q-learning, fixed baseline)
//! - **alerts**: Event → notification rules, notification center, popups
//! - **metrics**: Throughput sampling, bottlenecks, suggestions
//! - **orchestrator**: Tick transaction, scheduling, external operations
//! - **live**: Background scheduler with copy-on-read snapshots
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. An Occupied platform and its train always point at each other
//! 2. Delay never goes down except through an explicit schedule correction
//! 3. All randomness is deterministic (seeded RNG); all time is injectable

// Module declarations
pub mod alerts;
pub mod allocation;
pub mod core;
pub mod live;
pub mod metrics;
pub mod models;
pub mod motion;
pub mod orchestrator;
pub mod policy;
pub mod rng;

// Re-exports for convenience
pub use alerts::{AlertConfig, NotificationCenter, NotificationError, PopupDelivery, SubscriptionId};
pub use allocation::{AllocationConfig, AssignmentOrder, PlatformAllocator};
pub use core::clock::{Clock, SystemClock, VirtualClock};
pub use core::time::{SimTime, TimeManager};
pub use live::LiveSystem;
pub use metrics::{MetricsConfig, ThroughputMetrics};
pub use models::{
    Aspect, Event, EventLog, InvariantViolation, NetworkState, Notification, NotificationKind,
    Platform, PlatformStatus, Severity, Signal, Train, TrainPriority, TrainStatus,
};
pub use motion::{MotionConfig, TrainMotionModel};
pub use orchestrator::{
    NetworkConfig, NetworkLayout, NetworkSnapshot, Orchestrator, SignalPolicyConfig,
    SimulationError, TickResult,
};
pub use policy::{LearningConfig, LearningMetrics, QLearningPolicy, SignalPolicy, TrackState};
pub use rng::RngManager;
