//! Orchestrator - the network's explicit context object
//!
//! Owns the entity store, the seeded RNG, the signal policy (and its
//! Q-table), the notification center and the metrics aggregator. Nothing is
//! process-global, so any number of independent networks can run side by
//! side.
//!
//! # Tick Loop
//!
//! ```text
//! 1. Signals:   evaluate the frozen pre-tick state, stage new aspects
//! 2. Platforms: release/assign on the working copy
//! 3. Trains:    status, speed, position and delay on the working copy
//! 4. Commit:    return passed signals to Stop, validate, repair (or
//!               fail when strict), swap in
//! 5. Alerts:    turn committed events into notifications
//! ```
//!
//! A failing phase has its writes discarded and the tick carries on with
//! the other phases; the failure is logged and recorded as a `TickFault`
//! event. Readers only ever see the state before or after a whole tick.
//! A tick refused in strict mode also leaves the policy, the RNG and the
//! tick schedule as they were.
//!
//! # Time
//!
//! Three things are scheduled on the simulation clock: entity ticks,
//! metrics samples and notification auto-acknowledgements.
//! [`Orchestrator::advance_to`] fires everything due in chronological
//! order; at equal timestamps timers fire first, then the tick, then the
//! metrics sample (which therefore sees that tick's result).

use crate::alerts::{detect, NotificationCenter, NotificationError, SubscriptionId};
use crate::allocation::PlatformAllocator;
use crate::core::schedule::Cadence;
use crate::core::time::{SimTime, TimeManager};
use crate::metrics::{MetricsAggregator, ThroughputMetrics};
use crate::models::{
    BlockGuard, Event, EventLog, InvariantViolation, NetworkState, Notification, Platform,
    PlatformError, Signal, Train,
};
use crate::motion::TrainMotionModel;
use crate::orchestrator::checkpoint::NetworkSnapshot;
use crate::orchestrator::config::{NetworkConfig, SignalPolicyConfig};
use crate::policy::{
    apply_decisions, hold_occupied_blocks, FixedAspectPolicy, LearningMetrics, QLearningPolicy, SignalDecision,
    SignalPolicy, TrackState,
};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Mixed into the seed of the notification id stream so ids never share a
/// sequence with the simulation draws.
const NOTIFICATION_ID_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

// ============================================================================
// Errors
// ============================================================================

/// Entity classes addressable by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Signal,
    Platform,
    Train,
    Notification,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Signal => "signal",
            EntityKind::Platform => "platform",
            EntityKind::Train => "train",
            EntityKind::Notification => "notification",
        };
        f.write_str(name)
    }
}

/// Simulation error types
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimulationError {
    /// Invalid tunable; fatal at construction
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("unknown {kind} {id}")]
    UnknownEntity { kind: EntityKind, id: String },

    /// Post-commit violation in strict mode
    #[error("invariant violated: {0}")]
    InvariantViolation(#[from] InvariantViolation),

    #[error("platform operation rejected: {0}")]
    Platform(#[from] PlatformError),

    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The live scheduler could not be started
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

impl From<NotificationError> for SimulationError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound(id) => SimulationError::UnknownEntity {
                kind: EntityKind::Notification,
                id,
            },
        }
    }
}

// ============================================================================
// Tick results
// ============================================================================

/// The three mutating phases of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityClass {
    Signals,
    Platforms,
    Trains,
}

impl EntityClass {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityClass::Signals => "signals",
            EntityClass::Platforms => "platforms",
            EntityClass::Trains => "trains",
        }
    }
}

/// A phase whose writes were discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct TickFault {
    pub class: EntityClass,
    pub violation: InvariantViolation,
}

/// Result of a single tick execution
#[derive(Debug, Clone, PartialEq)]
pub struct TickResult {
    /// Tick number that was executed
    pub tick: usize,

    /// Scheduled time of the tick
    pub time: SimTime,

    /// Signals whose aspect changed
    pub num_signal_changes: usize,

    /// Trains that stood at a platform
    pub num_assignments: usize,

    /// Trains that left a platform
    pub num_releases: usize,

    /// Delay increases
    pub num_delays: usize,

    /// Ids of notifications created by this tick, in creation order
    pub notifications: Vec<String>,

    pub faults: Vec<TickFault>,

    /// Violations found after commit and clamped away
    pub repaired: Vec<InvariantViolation>,
}

/// Orchestrator fields a refused strict-mode tick restores.
struct Rollback {
    policy: Box<dyn SignalPolicy>,
    rng_manager: RngManager,
    tick_cadence: Cadence,
    now: SimTime,
    last_decisions: Vec<SignalDecision>,
}

/// Scheduled activities, in tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Due {
    Timers,
    Tick,
    Metrics,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Main network orchestrator
///
/// # Example
///
/// ```
/// use railway_control_core_rs::{NetworkConfig, Orchestrator};
///
/// let mut network = Orchestrator::new(NetworkConfig::default()).unwrap();
/// let results = network.advance_to(30_000).unwrap();
///
/// assert_eq!(results.len(), 10); // one tick every 3 s
/// assert_eq!(network.current_tick(), 10);
/// assert_eq!(network.current_metrics().sampled_at, 30_000);
/// ```
pub struct Orchestrator {
    config: NetworkConfig,

    /// Hash of `config`, stamped onto snapshots
    config_hash: String,

    /// Committed entity state
    state: NetworkState,

    time_manager: TimeManager,

    /// Drives every stochastic decision in the tick
    rng_manager: RngManager,

    motion: TrainMotionModel,
    allocator: PlatformAllocator,
    policy: Box<dyn SignalPolicy>,

    notifications: NotificationCenter,
    metrics: MetricsAggregator,
    event_log: EventLog,

    tick_cadence: Cadence,
    metrics_cadence: Cadence,

    /// Latest instant processed
    now: SimTime,

    /// Decisions of the most recent successful signal pass
    last_decisions: Vec<SignalDecision>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("tick", &self.time_manager.current_tick())
            .field("now", &self.now)
            .field("policy", &self.policy.name())
            .field("signals", &self.state.num_signals())
            .field("platforms", &self.state.num_platforms())
            .field("trains", &self.state.num_trains())
            .field("notifications", &self.notifications.len())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Build a network from configuration.
    ///
    /// # Errors
    ///
    /// [`SimulationError::Configuration`] if any tunable or the initial
    /// layout is invalid.
    pub fn new(config: NetworkConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let config_hash = config.config_hash()?;

        let mut rng_manager = RngManager::new(config.rng_seed);
        let line_length_m = config.layout.line_length_m;

        let policy: Box<dyn SignalPolicy> = match &config.signal_policy {
            SignalPolicyConfig::QLearning => Box::new(QLearningPolicy::seeded(
                config.learning.clone(),
                line_length_m,
                &mut rng_manager,
            )),
            SignalPolicyConfig::FixedAspect { aspect } => Box::new(FixedAspectPolicy::new(
                *aspect,
                config.learning.clone(),
                line_length_m,
            )),
        };

        let mut state = config.layout.clone().into_state();
        if config.learning.interlock {
            state = state.with_block_guard(BlockGuard {
                distance_m: config.learning.interlock_distance_m,
                line_length_m,
            });
        }

        info!(
            seed = config.rng_seed,
            policy = policy.name(),
            signals = state.num_signals(),
            platforms = state.num_platforms(),
            trains = state.num_trains(),
            tick_period_ms = config.scheduler.tick_period_ms,
            config_hash = %config_hash,
            "Network initialised"
        );

        Ok(Self {
            time_manager: TimeManager::new(config.scheduler.tick_period_ms),
            tick_cadence: Cadence::new(config.scheduler.tick_period_ms),
            metrics_cadence: Cadence::new(config.scheduler.metrics_period_ms),
            motion: TrainMotionModel::new(config.motion.clone(), line_length_m),
            allocator: PlatformAllocator::new(config.allocation.clone()),
            notifications: NotificationCenter::new(
                config.alerts.clone(),
                config.rng_seed ^ NOTIFICATION_ID_SALT,
            ),
            metrics: MetricsAggregator::new(config.metrics.clone()),
            event_log: EventLog::new(),
            rng_manager,
            policy,
            state,
            config_hash,
            config,
            now: 0,
            last_decisions: Vec::new(),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    /// Ticks committed so far
    pub fn current_tick(&self) -> usize {
        self.time_manager.current_tick()
    }

    /// Latest simulation time processed
    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn state(&self) -> &NetworkState {
        &self.state
    }

    /// Direct state access for tests that need malformed records.
    #[doc(hidden)]
    pub fn state_mut(&mut self) -> &mut NetworkState {
        &mut self.state
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// The learner, when the network runs Q-learning.
    pub fn q_learning(&self) -> Option<&QLearningPolicy> {
        self.policy.as_any().downcast_ref::<QLearningPolicy>()
    }

    pub fn q_learning_mut(&mut self) -> Option<&mut QLearningPolicy> {
        self.policy.as_any_mut().downcast_mut::<QLearningPolicy>()
    }

    /// Copy of one Q-table row, in aspect enumeration order.
    pub fn q_values(&self, state: TrackState) -> Option<[f64; 4]> {
        self.q_learning().map(|p| p.q_values(state))
    }

    pub fn last_decisions(&self) -> &[SignalDecision] {
        &self.last_decisions
    }

    pub fn notification_center(&self) -> &NotificationCenter {
        &self.notifications
    }

    // ========================================================================
    // Snapshot reads
    // ========================================================================

    pub fn list_signals(&self) -> Vec<Signal> {
        self.state.signals().to_vec()
    }

    pub fn list_platforms(&self) -> Vec<Platform> {
        self.state.platforms().to_vec()
    }

    pub fn list_trains(&self) -> Vec<Train> {
        self.state.trains().to_vec()
    }

    pub fn get_signal(&self, id: &str) -> Result<Signal, SimulationError> {
        self.state
            .get_signal(id)
            .cloned()
            .ok_or_else(|| unknown(EntityKind::Signal, id))
    }

    pub fn get_platform(&self, id: &str) -> Result<Platform, SimulationError> {
        self.state
            .get_platform(id)
            .cloned()
            .ok_or_else(|| unknown(EntityKind::Platform, id))
    }

    pub fn get_train(&self, id: &str) -> Result<Train, SimulationError> {
        self.state
            .get_train(id)
            .cloned()
            .ok_or_else(|| unknown(EntityKind::Train, id))
    }

    /// Every stored notification, in creation order.
    pub fn list_notifications(&self) -> Vec<Notification> {
        self.notifications.all().to_vec()
    }

    pub fn visible_notifications(&self) -> Vec<Notification> {
        self.notifications.visible()
    }

    pub fn active_notifications(&self) -> Vec<Notification> {
        self.notifications.active()
    }

    pub fn current_metrics(&self) -> ThroughputMetrics {
        self.metrics.current().clone()
    }

    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    pub fn learning_metrics(&self) -> LearningMetrics {
        self.policy.learning_metrics(self.state.signals())
    }

    /// Self-contained copy of the committed state.
    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            tick: self.current_tick(),
            time: self.now,
            signals: self.list_signals(),
            platforms: self.list_platforms(),
            trains: self.list_trains(),
            notifications: self.list_notifications(),
            visible_notifications: self.visible_notifications(),
            metrics: self.current_metrics(),
            learning: self.learning_metrics(),
            config_hash: self.config_hash.clone(),
        }
    }

    // ========================================================================
    // Operator actions
    // ========================================================================

    /// Manual acknowledgement at the current time.
    ///
    /// `Ok(false)` if it was already acknowledged.
    pub fn acknowledge_notification(&mut self, id: &str) -> Result<bool, NotificationError> {
        self.notifications.acknowledge(id, self.now)
    }

    /// Register a callback invoked once per new notification, in creation
    /// order.
    pub fn on_notification<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Notification) + Send + 'static,
    {
        self.notifications.on_notification(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifications.unsubscribe(id)
    }

    /// Set a train's delay outright. The only way a delay goes down.
    pub fn correct_schedule(&mut self, train_id: &str, delay: i32) -> Result<(), SimulationError> {
        let train = self
            .state
            .get_train_mut(train_id)
            .ok_or_else(|| unknown(EntityKind::Train, train_id))?;
        let previous = train.delay();
        train.correct_schedule(delay);
        info!(
            train_id,
            previous_delay = previous,
            delay,
            status = ?train.status(),
            "Schedule corrected"
        );
        Ok(())
    }

    /// Add `minutes` of delay to a train outside the random accrual rule.
    ///
    /// The delay event goes through the normal alert rules; returns the ids
    /// of the notifications it raised.
    pub fn report_delay(&mut self, train_id: &str, minutes: i32) -> Result<Vec<String>, SimulationError> {
        let tick = self.current_tick();
        let event = self
            .motion
            .apply_delay(&mut self.state, train_id, minutes, tick)
            .ok_or_else(|| unknown(EntityKind::Train, train_id))?;
        info!(train_id, minutes, "Delay reported");
        Ok(self.publish_events(vec![event]))
    }

    /// Take an empty platform out of (or back into) service.
    pub fn set_platform_maintenance(&mut self, platform_id: &str, on: bool) -> Result<(), SimulationError> {
        let platform = self
            .state
            .get_platform_mut(platform_id)
            .ok_or_else(|| unknown(EntityKind::Platform, platform_id))?;
        platform.set_maintenance(on)?;
        info!(platform_id, maintenance = on, "Platform maintenance toggled");
        Ok(())
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Run the next scheduled tick, after anything due before it.
    pub fn tick(&mut self) -> Result<TickResult, SimulationError> {
        let tick_at = (self.tick_cadence.next_due(), Due::Tick);
        while let Some(next) = self.next_due().filter(|next| *next < tick_at) {
            self.dispatch(next)?;
        }
        self.dispatch_tick()
    }

    /// Process every tick, metrics sample and timer due at or before
    /// `target`, in chronological order.
    ///
    /// Time never moves backwards; a target in the past is a no-op.
    pub fn advance_to(&mut self, target: SimTime) -> Result<Vec<TickResult>, SimulationError> {
        let mut results = Vec::new();
        while let Some(next) = self.next_due().filter(|(at, _)| *at <= target) {
            if let Some(result) = self.dispatch(next)? {
                results.push(result);
            }
        }
        self.now = self.now.max(target);
        Ok(results)
    }

    pub fn advance_by(&mut self, duration: SimTime) -> Result<Vec<TickResult>, SimulationError> {
        self.advance_to(self.now + duration)
    }

    /// Time of the earliest pending tick, metrics sample or notification
    /// timer.
    pub fn next_activity(&self) -> Option<SimTime> {
        self.next_due().map(|(at, _)| at)
    }

    /// Earliest pending activity.
    fn next_due(&self) -> Option<(SimTime, Due)> {
        let timer = self.notifications.next_deadline().map(|at| (at, Due::Timers));
        [
            timer,
            Some((self.tick_cadence.next_due(), Due::Tick)),
            Some((self.metrics_cadence.next_due(), Due::Metrics)),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn dispatch(&mut self, (at, due): (SimTime, Due)) -> Result<Option<TickResult>, SimulationError> {
        match due {
            Due::Timers => {
                self.now = self.now.max(at);
                self.notifications.fire_due(at);
                Ok(None)
            }
            Due::Tick => self.dispatch_tick().map(Some),
            Due::Metrics => {
                let at = self.metrics_cadence.fire();
                self.now = self.now.max(at);
                let m = self
                    .metrics
                    .sample(&self.state, self.config.layout.line_length_m, at);
                debug!(
                    time = at,
                    trains_per_hour = m.trains_per_hour,
                    average_speed = m.average_speed,
                    platform_utilization = m.platform_utilization,
                    punctuality = m.punctuality,
                    efficiency = m.efficiency,
                    bottlenecks = m.bottlenecks.len(),
                    "Metrics sampled"
                );
                Ok(None)
            }
        }
    }

    fn dispatch_tick(&mut self) -> Result<TickResult, SimulationError> {
        // Only strict mode can refuse a tick; keep everything it would touch.
        let rollback = self.config.strict_invariants.then(|| Rollback {
            policy: self.policy.box_clone(),
            rng_manager: self.rng_manager.clone(),
            tick_cadence: self.tick_cadence.clone(),
            now: self.now,
            last_decisions: self.last_decisions.clone(),
        });

        let at = self.tick_cadence.fire();
        self.now = self.now.max(at);
        let result = self.run_tick(at);

        if let (Err(_), Some(saved)) = (&result, rollback) {
            self.policy = saved.policy;
            self.rng_manager = saved.rng_manager;
            self.tick_cadence = saved.tick_cadence;
            self.now = saved.now;
            self.last_decisions = saved.last_decisions;
        }
        result
    }

    // ========================================================================
    // Tick
    // ========================================================================

    fn run_tick(&mut self, now: SimTime) -> Result<TickResult, SimulationError> {
        let tick = self.time_manager.current_tick();
        let tick_secs = self.time_manager.tick_period_secs();
        let mut events = Vec::new();
        let mut faults = Vec::new();

        let mut working = self.state.clone();

        // STEP 1: SIGNALS
        // The policy reads the committed state, never the working copy.
        match self.policy.evaluate(&self.state, &mut self.rng_manager) {
            Ok(decisions) => {
                events.extend(apply_decisions(&mut working, &decisions, tick, now));
                self.last_decisions = decisions;
            }
            Err(violation) => {
                events.push(fault_event(tick, EntityClass::Signals, &violation));
                faults.push(TickFault {
                    class: EntityClass::Signals,
                    violation,
                });
            }
        }

        // STEP 2: PLATFORMS
        let before = working.clone();
        match self
            .allocator
            .allocate(&mut working, &mut self.rng_manager, tick, now)
        {
            Ok(phase_events) => events.extend(phase_events),
            Err(violation) => {
                working = before;
                events.push(fault_event(tick, EntityClass::Platforms, &violation));
                faults.push(TickFault {
                    class: EntityClass::Platforms,
                    violation,
                });
            }
        }

        // STEP 3: TRAINS
        let before = working.clone();
        match self
            .motion
            .advance(&mut working, &mut self.rng_manager, tick, tick_secs)
        {
            Ok(phase_events) => events.extend(phase_events),
            Err(violation) => {
                working = before;
                events.push(fault_event(tick, EntityClass::Trains, &violation));
                faults.push(TickFault {
                    class: EntityClass::Trains,
                    violation,
                });
            }
        }

        // STEP 4: COMMIT
        // Signals a train has just passed go back to Stop.
        events.extend(hold_occupied_blocks(&mut working, tick));
        if self.config.strict_invariants {
            if let Some(violation) = working.validate().into_iter().next() {
                error!(tick, violation = %violation, "Invariant violated; tick rejected");
                return Err(SimulationError::InvariantViolation(violation));
            }
        }
        let repaired = working.repair();
        for violation in &repaired {
            warn!(tick, violation = %violation, "Invariant repaired after commit");
            events.push(Event::InvariantRepaired {
                tick,
                violation: violation.to_string(),
            });
        }
        self.state = working;
        self.time_manager.advance_tick();

        // STEP 5: ALERTS
        let mut result = TickResult {
            tick,
            time: now,
            num_signal_changes: count(&events, "SignalChanged"),
            num_assignments: count(&events, "PlatformAssigned"),
            num_releases: count(&events, "PlatformReleased"),
            num_delays: count(&events, "DelayIncreased"),
            notifications: Vec::new(),
            faults,
            repaired,
        };
        result.notifications = self.publish_events(events);

        debug!(
            tick,
            time = now,
            signal_changes = result.num_signal_changes,
            assignments = result.num_assignments,
            releases = result.num_releases,
            delays = result.num_delays,
            notifications = result.notifications.len(),
            faults = result.faults.len(),
            "Tick committed"
        );
        Ok(result)
    }

    /// Log committed events and publish the notifications they raise.
    fn publish_events(&mut self, events: Vec<Event>) -> Vec<String> {
        let mut created = Vec::new();
        for event in events {
            for draft in detect(&event, &self.config.alerts) {
                let notification = self.notifications.publish(draft, self.now);
                created.push(notification.id().to_string());
            }
            self.event_log.log(event);
        }
        created
    }
}

fn unknown(kind: EntityKind, id: &str) -> SimulationError {
    SimulationError::UnknownEntity {
        kind,
        id: id.to_string(),
    }
}

fn count(events: &[Event], event_type: &str) -> usize {
    events.iter().filter(|e| e.event_type() == event_type).count()
}

fn fault_event(tick: usize, class: EntityClass, violation: &InvariantViolation) -> Event {
    error!(
        tick,
        class = class.as_str(),
        error = %violation,
        "Tick phase failed; its writes were discarded"
    );
    Event::TickFault {
        tick,
        component: class.as_str().to_string(),
        message: violation.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Aspect, PlatformStatus};

    fn quiet_config() -> NetworkConfig {
        let mut config = NetworkConfig::default();
        config.motion.start_probability = 0.0;
        config.motion.delay_probability = 0.0;
        config.motion.low_speed_alert_probability = 0.0;
        config.allocation.assign_probability = 0.0;
        config.allocation.release_probability = 0.0;
        config
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let mut config = NetworkConfig::default();
        config.learning.learning_rate = 2.0;
        assert!(matches!(
            Orchestrator::new(config),
            Err(SimulationError::Configuration(_))
        ));
    }

    #[test]
    fn test_tick_runs_at_cadence() {
        let mut network = Orchestrator::new(quiet_config()).unwrap();
        let first = network.tick().unwrap();
        assert_eq!(first.tick, 0);
        assert_eq!(first.time, 3_000);
        let second = network.tick().unwrap();
        assert_eq!(second.time, 6_000);
        assert_eq!(network.current_tick(), 2);
        assert_eq!(network.now(), 6_000);
    }

    #[test]
    fn test_advance_to_past_is_noop() {
        let mut network = Orchestrator::new(quiet_config()).unwrap();
        network.advance_to(9_000).unwrap();
        assert!(network.advance_to(4_000).unwrap().is_empty());
        assert_eq!(network.now(), 9_000);
        assert_eq!(network.current_tick(), 3);
    }

    #[test]
    fn test_unknown_entities() {
        let mut network = Orchestrator::new(quiet_config()).unwrap();
        assert_eq!(
            network.get_train("99999"),
            Err(SimulationError::UnknownEntity {
                kind: EntityKind::Train,
                id: "99999".to_string()
            })
        );
        assert!(network.correct_schedule("99999", 0).is_err());
        assert!(network.set_platform_maintenance("9", true).is_err());
        assert_eq!(
            network.acknowledge_notification("notif-missing"),
            Err(NotificationError::NotFound("notif-missing".to_string()))
        );
        let err: SimulationError = NotificationError::NotFound("n".to_string()).into();
        assert_eq!(err.to_string(), "unknown notification n");
    }

    #[test]
    fn test_maintenance_rejected_on_occupied_platform() {
        let mut network = Orchestrator::new(quiet_config()).unwrap();
        assert!(matches!(
            network.set_platform_maintenance("1", true),
            Err(SimulationError::Platform(_))
        ));
        network.set_platform_maintenance("2", true).unwrap();
        assert_eq!(
            network.get_platform("2").unwrap().status(),
            PlatformStatus::Maintenance
        );
    }

    #[test]
    fn test_fixed_aspect_policy_has_no_q_table() {
        let mut config = quiet_config();
        config.signal_policy = SignalPolicyConfig::FixedAspect {
            aspect: Aspect::Caution,
        };
        let mut network = Orchestrator::new(config).unwrap();
        network.tick().unwrap();
        assert_eq!(network.policy_name(), "FixedAspect");
        assert!(network.q_values(TrackState::Clear).is_none());
        assert!(network
            .list_signals()
            .iter()
            .all(|s| s.aspect() == Aspect::Caution));
    }

    #[test]
    fn test_corrupt_state_is_repaired_and_logged() {
        let mut network = Orchestrator::new(quiet_config()).unwrap();
        network
            .state_mut()
            .get_platform_mut("1")
            .unwrap()
            .corrupt_passenger_count(900);

        let result = network.tick().unwrap();
        assert_eq!(result.repaired.len(), 1);
        assert_eq!(network.get_platform("1").unwrap().passenger_count(), 200);
        assert_eq!(network.event_log().events_of_type("InvariantRepaired").len(), 1);
    }

    #[test]
    fn test_strict_mode_rejects_corrupt_state() {
        let mut config = quiet_config();
        config.strict_invariants = true;
        let mut network = Orchestrator::new(config).unwrap();
        network
            .state_mut()
            .get_platform_mut("1")
            .unwrap()
            .corrupt_passenger_count(900);

        assert!(matches!(
            network.tick(),
            Err(SimulationError::InvariantViolation(
                InvariantViolation::PlatformOverCapacity { .. }
            ))
        ));
        assert_eq!(network.current_tick(), 0);
        assert_eq!(network.now(), 0);
        assert_eq!(network.q_learning().unwrap().passes(), 0);
        assert_eq!(network.tick_cadence.next_due(), 3_000);
    }
}
