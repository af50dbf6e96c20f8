//! Network configuration
//!
//! One serde-friendly root ([`NetworkConfig`]) composed of the per-component
//! configs. Every field has a default, so a JSON file only needs the values
//! it changes:
//!
//! ```json
//! { "rng_seed": 7, "scheduler": { "tick_period_ms": 5000 } }
//! ```
//!
//! [`NetworkConfig::validate`] runs before an orchestrator is built; an
//! invalid tunable is fatal at construction.

use crate::alerts::AlertConfig;
use crate::allocation::AllocationConfig;
use crate::core::time::{SimTime, MILLIS_PER_MINUTE};
use crate::metrics::MetricsConfig;
use crate::models::{
    Aspect, NetworkState, Platform, Signal, Train, TrainPriority, TrainStatus,
};
use crate::motion::MotionConfig;
use crate::orchestrator::checkpoint::compute_config_hash;
use crate::orchestrator::SimulationError;
use crate::policy::LearningConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// Scheduler
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Entity tick period
    pub tick_period_ms: SimTime,
    /// Metrics sampling period; must not be shorter than the tick period
    pub metrics_period_ms: SimTime,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 3_000,
            metrics_period_ms: 30_000,
        }
    }
}

/// Which signal policy drives the aspects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SignalPolicyConfig {
    /// Tabular Q-learning over the discretized track state
    #[default]
    QLearning,

    /// Every signal always shows `aspect` (comparison baseline)
    FixedAspect { aspect: Aspect },
}

// ============================================================================
// Layout
// ============================================================================

/// Initial entities and track geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkLayout {
    /// Length of the circular test line; positions wrap here
    pub line_length_m: f64,
    pub signals: Vec<Signal>,
    pub platforms: Vec<Platform>,
    pub trains: Vec<Train>,
}

impl NetworkLayout {
    pub fn into_state(self) -> NetworkState {
        NetworkState::new(self.signals, self.platforms, self.trains)
    }
}

impl Default for NetworkLayout {
    /// Reference station: ten signals every 500 m on a 5 km loop, five
    /// platforms and four Shatabdi services.
    fn default() -> Self {
        const LOCATIONS: [&str; 10] = [
            "Platform 1 Entry",
            "Platform 2 Entry",
            "Junction A",
            "Platform 3 Exit",
            "Main Line",
            "Main Line Km 2.5",
            "Junction B",
            "Outer Home",
            "Distant Approach",
            "Home Approach",
        ];
        let signals = LOCATIONS
            .iter()
            .enumerate()
            .map(|(i, location)| Signal::new(format!("SIG-{}", i + 1), *location, i as f64 * 500.0))
            .collect();

        let platforms = vec![
            Platform::new("1", 200).occupied_by("12002", 180, Some(10 * MILLIS_PER_MINUTE)),
            Platform::new("2", 200),
            Platform::new("3", 180).occupied_by("12004", 165, Some(15 * MILLIS_PER_MINUTE)),
            Platform::new("4", 220).under_maintenance(),
            Platform::new("5", 200),
        ];

        let trains = vec![
            Train::new("12002", "New Delhi Shatabdi Express")
                .with_location("Platform 1", "New Delhi")
                .with_schedule(14 * 60 + 20, 2)
                .with_status(TrainStatus::Delayed)
                .with_passengers(180)
                .with_priority(TrainPriority::High)
                .with_position(150.0)
                .at_platform("1"),
            Train::new("12004", "Lucknow Swarn Shatabdi")
                .with_location("Platform 3", "Lucknow Junction")
                .with_schedule(14 * 60 + 25, 0)
                .with_status(TrainStatus::OnTime)
                .with_passengers(165)
                .with_priority(TrainPriority::High)
                .with_position(1_450.0)
                .at_platform("3"),
            Train::new("12006", "Allahabad Shatabdi Express")
                .with_location("Approaching", "Allahabad Junction")
                .with_schedule(14 * 60 + 35, -2)
                .with_status(TrainStatus::Approaching)
                .with_speed(75.0)
                .with_passengers(142)
                .with_priority(TrainPriority::High)
                .with_position(4_700.0),
            Train::new("12008", "Chandigarh Shatabdi")
                .with_location("En Route", "Chandigarh")
                .with_schedule(15 * 60 + 10, 5)
                .with_status(TrainStatus::Delayed)
                .with_speed(85.0)
                .with_passengers(195)
                .with_priority(TrainPriority::Medium)
                .with_position(2_300.0),
        ];

        Self {
            line_length_m: 5_000.0,
            signals,
            platforms,
            trains,
        }
    }
}

// ============================================================================
// Root
// ============================================================================

/// Complete configuration for one network instance.
///
/// # Example
/// ```
/// use railway_control_core_rs::orchestrator::NetworkConfig;
///
/// let config: NetworkConfig =
///     serde_json::from_str(r#"{ "rng_seed": 7, "strict_invariants": true }"#).unwrap();
/// assert_eq!(config.rng_seed, 7);
/// assert_eq!(config.scheduler.tick_period_ms, 3_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Seed for every stochastic decision
    pub rng_seed: u64,

    /// Fail the tick on a post-commit invariant violation instead of
    /// repairing it
    pub strict_invariants: bool,

    pub scheduler: SchedulerConfig,
    pub motion: MotionConfig,
    pub allocation: AllocationConfig,
    pub learning: LearningConfig,
    pub signal_policy: SignalPolicyConfig,
    pub alerts: AlertConfig,
    pub metrics: MetricsConfig,
    pub layout: NetworkLayout,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rng_seed: 42,
            strict_invariants: false,
            scheduler: SchedulerConfig::default(),
            motion: MotionConfig::default(),
            allocation: AllocationConfig::default(),
            learning: LearningConfig::default(),
            signal_policy: SignalPolicyConfig::default(),
            alerts: AlertConfig::default(),
            metrics: MetricsConfig::default(),
            layout: NetworkLayout::default(),
        }
    }
}

impl NetworkConfig {
    /// Reject tunables the model cannot run with.
    pub fn validate(&self) -> Result<(), SimulationError> {
        self.validate_scheduler()?;
        self.validate_motion()?;
        self.validate_allocation()?;
        self.validate_learning()?;
        self.validate_outputs()?;
        self.validate_layout()
    }

    /// SHA-256 over the canonical JSON form.
    pub fn config_hash(&self) -> Result<String, SimulationError> {
        compute_config_hash(self)
    }

    fn validate_scheduler(&self) -> Result<(), SimulationError> {
        let s = &self.scheduler;
        if s.tick_period_ms == 0 {
            return Err(invalid("scheduler.tick_period_ms must be positive"));
        }
        if s.metrics_period_ms < s.tick_period_ms {
            return Err(invalid(format!(
                "scheduler.metrics_period_ms ({}) is shorter than tick_period_ms ({})",
                s.metrics_period_ms, s.tick_period_ms
            )));
        }
        Ok(())
    }

    fn validate_motion(&self) -> Result<(), SimulationError> {
        let m = &self.motion;
        probability("motion.start_probability", m.start_probability)?;
        probability("motion.delay_probability", m.delay_probability)?;
        probability("motion.low_speed_alert_probability", m.low_speed_alert_probability)?;
        speed_range("motion.start_speed_range", m.start_speed_range)?;
        speed_range("motion.cruise_speed_range", m.cruise_speed_range)?;
        speed_range("motion.speed_limits", m.speed_limits)?;
        non_negative("motion.acceleration_kmh_per_tick", m.acceleration_kmh_per_tick)?;
        non_negative("motion.speed_jitter_kmh", m.speed_jitter_kmh)?;
        non_negative("motion.low_speed_threshold_kmh", m.low_speed_threshold_kmh)?;

        let (lo, hi) = m.delay_increment_range;
        if lo < 0 || lo > hi {
            return Err(invalid(format!(
                "motion.delay_increment_range ({}, {}) must satisfy 0 <= lo <= hi",
                lo, hi
            )));
        }
        Ok(())
    }

    fn validate_allocation(&self) -> Result<(), SimulationError> {
        let a = &self.allocation;
        probability("allocation.release_probability", a.release_probability)?;
        probability("allocation.assign_probability", a.assign_probability)?;
        speed_range("allocation.departure_speed_range", a.departure_speed_range)?;

        let (lo, hi) = a.dwell_minutes_range;
        if !lo.is_finite() || !hi.is_finite() || lo < 0.0 || lo > hi {
            return Err(invalid(format!(
                "allocation.dwell_minutes_range ({}, {}) must satisfy 0 <= lo <= hi",
                lo, hi
            )));
        }
        Ok(())
    }

    fn validate_learning(&self) -> Result<(), SimulationError> {
        let l = &self.learning;
        probability("learning.learning_rate", l.learning_rate)?;
        probability("learning.discount_factor", l.discount_factor)?;
        probability("learning.initial_epsilon", l.initial_epsilon)?;
        probability("learning.min_epsilon", l.min_epsilon)?;
        if !(l.epsilon_decay > 0.0 && l.epsilon_decay <= 1.0) {
            return Err(invalid(format!(
                "learning.epsilon_decay ({}) must be in (0, 1]",
                l.epsilon_decay
            )));
        }
        non_negative("learning.initial_q_max", l.initial_q_max)?;
        positive("learning.sensing_window_m", l.sensing_window_m)?;
        positive("learning.stopping_distance_m", l.stopping_distance_m)?;
        positive("learning.caution_distance_m", l.caution_distance_m)?;
        non_negative("learning.interlock_distance_m", l.interlock_distance_m)?;
        Ok(())
    }

    fn validate_outputs(&self) -> Result<(), SimulationError> {
        if self.alerts.visible_limit == 0 {
            return Err(invalid("alerts.visible_limit must be positive"));
        }
        if self.alerts.history_limit == 0 {
            return Err(invalid("alerts.history_limit must be positive"));
        }
        non_negative("alerts.collision_clearance_secs", self.alerts.collision_clearance_secs)?;
        if self.metrics.history_limit == 0 {
            return Err(invalid("metrics.history_limit must be positive"));
        }
        if self.metrics.window_samples == 0 {
            return Err(invalid("metrics.window_samples must be positive"));
        }
        if self.metrics.section_capacity == 0 {
            return Err(invalid("metrics.section_capacity must be positive"));
        }
        Ok(())
    }

    fn validate_layout(&self) -> Result<(), SimulationError> {
        let layout = &self.layout;
        positive("layout.line_length_m", layout.line_length_m)?;

        unique("signal", layout.signals.iter().map(|s| s.id()))?;
        unique("platform", layout.platforms.iter().map(|p| p.id()))?;
        unique("train", layout.trains.iter().map(|t| t.id()))?;

        for signal in &layout.signals {
            if !signal.position_m().is_finite() {
                return Err(invalid(format!("signal {} has a non-finite position", signal.id())));
            }
        }

        let state = layout.clone().into_state();
        match state.validate().into_iter().next() {
            Some(violation) => Err(invalid(format!("layout: {}", violation))),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Validation helpers
// ============================================================================

fn invalid(msg: impl Into<String>) -> SimulationError {
    SimulationError::Configuration(msg.into())
}

fn probability(name: &str, value: f64) -> Result<(), SimulationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{} ({}) must be in [0, 1]", name, value)))
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), SimulationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{} ({}) must be finite and >= 0", name, value)))
    }
}

fn positive(name: &str, value: f64) -> Result<(), SimulationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{} ({}) must be finite and > 0", name, value)))
    }
}

fn speed_range(name: &str, (lo, hi): (f64, f64)) -> Result<(), SimulationError> {
    if lo.is_finite() && hi.is_finite() && lo >= 0.0 && lo <= hi {
        Ok(())
    } else {
        Err(invalid(format!(
            "{} ({}, {}) must satisfy 0 <= lo <= hi",
            name, lo, hi
        )))
    }
}

fn unique<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<(), SimulationError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(invalid(format!("duplicate {} id {}", kind, id)));
        }
    }
    Ok(())
}
