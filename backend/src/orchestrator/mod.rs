//! Orchestrator - tick loop, scheduling and the external operations
//!
//! See `engine.rs` for the tick transaction.

pub mod checkpoint;
pub mod config;
pub mod engine;

pub use checkpoint::{compute_config_hash, NetworkSnapshot};
pub use config::{NetworkConfig, NetworkLayout, SchedulerConfig, SignalPolicyConfig};
pub use engine::{EntityClass, EntityKind, Orchestrator, SimulationError, TickFault, TickResult};
