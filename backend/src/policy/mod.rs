//! Signal Policy Module
//!
//! Chooses an aspect for every signal once per tick.
//!
//! # Overview
//!
//! Each signal observes the trains inside its sensing window and reduces them
//! to a [`TrackState`]. A policy maps that state to an [`Aspect`]. The
//! reference policy is tabular Q-learning ([`QLearningPolicy`]): it explores
//! epsilon-greedily, scores every choice for safety and throughput, and
//! learns from the shaped reward.
//!
//! # Policy Interface
//!
//! All policies implement the [`SignalPolicy`] trait and see the frozen
//! pre-tick snapshot only; the orchestrator commits their decisions with
//! [`apply_decisions`].
//!
//! ```rust
//! use railway_control_core_rs::policy::{
//!     FixedAspectPolicy, LearningConfig, SignalPolicy,
//! };
//! use railway_control_core_rs::models::{Aspect, NetworkState, Signal};
//! use railway_control_core_rs::RngManager;
//!
//! let snapshot = NetworkState::new(vec![Signal::new("SIG-1", "Yard", 0.0)], vec![], vec![]);
//! let mut policy = FixedAspectPolicy::new(Aspect::Caution, LearningConfig::default(), 5_000.0);
//! let decisions = policy.evaluate(&snapshot, &mut RngManager::new(1)).unwrap();
//! assert_eq!(decisions[0].aspect, Aspect::Caution);
//! ```
//!
//! Available policies:
//! 1. **QLearning**: epsilon-greedy tabular learner (reference)
//! 2. **FixedAspect**: always shows the same aspect (baseline)

pub mod discretize;
pub mod q_learning;
pub mod q_table;
pub mod reward;

pub use discretize::{SensingRange, Sighting};
pub use q_learning::QLearningPolicy;
pub use q_table::QTable;
pub use reward::{RewardWeights, SafetyWeights, ThroughputWeights};

use crate::core::time::SimTime;
use crate::models::{Aspect, Event, InvariantViolation, NetworkState, Signal};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use std::any::Any;
use tracing::{debug, warn};

/// Discretized occupancy around one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackState {
    Clear,
    Approaching,
    Occupied,
    Conflict,
}

impl TrackState {
    pub const ALL: [TrackState; 4] = [
        TrackState::Clear,
        TrackState::Approaching,
        TrackState::Occupied,
        TrackState::Conflict,
    ];

    pub fn index(self) -> usize {
        match self {
            TrackState::Clear => 0,
            TrackState::Approaching => 1,
            TrackState::Occupied => 2,
            TrackState::Conflict => 3,
        }
    }
}

/// Learning and sensing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// α, in [0, 1]
    pub learning_rate: f64,
    /// γ, in [0, 1]
    pub discount_factor: f64,
    /// Initial ε, in [0, 1]
    pub initial_epsilon: f64,
    pub epsilon_decay: f64,
    pub min_epsilon: f64,
    /// Q-values start uniform in [0, this); zero gives an all-zero table
    pub initial_q_max: f64,

    pub sensing_window_m: f64,
    pub stopping_distance_m: f64,
    pub caution_distance_m: f64,

    /// Downgrade Proceed to Stop when the block just past the signal is occupied
    pub interlock: bool,
    pub interlock_distance_m: f64,

    pub reward: RewardWeights,
    pub safety: SafetyWeights,
    pub throughput: ThroughputWeights,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.9,
            initial_epsilon: 0.1,
            epsilon_decay: 0.995,
            min_epsilon: 0.01,
            initial_q_max: 0.1,
            sensing_window_m: 1_000.0,
            stopping_distance_m: 100.0,
            caution_distance_m: 500.0,
            interlock: true,
            interlock_distance_m: 100.0,
            reward: RewardWeights::default(),
            safety: SafetyWeights::default(),
            throughput: ThroughputWeights::default(),
        }
    }
}

impl LearningConfig {
    pub fn sensing_range(&self, line_length_m: f64) -> SensingRange {
        SensingRange {
            window_m: self.sensing_window_m,
            stopping_distance_m: self.stopping_distance_m,
            caution_distance_m: self.caution_distance_m,
            line_length_m,
        }
    }
}

/// One signal's outcome for one policy pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDecision {
    pub signal_id: String,
    pub state: TrackState,
    /// Action the policy picked (and learned from)
    pub chosen: Aspect,
    /// Aspect committed to the signal
    pub aspect: Aspect,
    /// True when the interlock replaced `chosen`
    pub interlocked: bool,
    pub confidence: f64,
    pub reward: f64,
    pub safety_score: f64,
    pub throughput_impact: i32,
    /// Nearest train inside the sensing window
    pub train_id: Option<String>,
    pub clearance_secs: Option<f64>,
    pub reasoning: Vec<String>,
}

impl SignalDecision {
    pub fn reasoning_text(&self) -> String {
        self.reasoning.join(", ")
    }
}

/// Summary of the policy's learning progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningMetrics {
    pub total_reward: f64,
    /// Proxy: `max(0, 5 − mean_reward_per_pass × 0.1)`
    pub average_delay: f64,
    /// Signals whose safety score is below 70
    pub safety_violations: usize,
    /// Sum of current throughput impacts
    pub throughput_optimization: i64,
    /// Percentage of the first 1000 passes completed
    pub learning_progress: f64,
    pub exploration_rate: f64,
    pub passes: u64,
}

impl LearningMetrics {
    pub fn from_parts(total_reward: f64, passes: u64, exploration_rate: f64, signals: &[Signal]) -> Self {
        let mean_reward = total_reward / passes.max(1) as f64;
        Self {
            total_reward,
            average_delay: (5.0 - mean_reward * 0.1).max(0.0),
            safety_violations: signals.iter().filter(|s| s.safety_score() < 70.0).count(),
            throughput_optimization: signals.iter().map(|s| s.throughput_impact() as i64).sum(),
            learning_progress: (passes as f64 / 1000.0 * 100.0).min(100.0),
            exploration_rate,
            passes,
        }
    }
}

/// Aspect selection for all signals
///
/// Implementations may keep learned state between passes, but must leave it
/// untouched when they return an error.
pub trait SignalPolicy: Send {
    fn name(&self) -> &'static str;

    /// Decide every signal's aspect from the pre-tick snapshot.
    fn evaluate(
        &mut self,
        snapshot: &NetworkState,
        rng: &mut RngManager,
    ) -> Result<Vec<SignalDecision>, InvariantViolation>;

    fn learning_metrics(&self, signals: &[Signal]) -> LearningMetrics;

    /// Copy of the policy and everything it has learned, so a rejected tick
    /// can put it back.
    fn box_clone(&self) -> Box<dyn SignalPolicy>;

    /// Downcast support (e.g. to inspect a Q-table)
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Baseline policy that always shows one aspect.
///
/// Still scores safety, throughput and reward so runs can be compared
/// against the learner.
#[derive(Debug, Clone)]
pub struct FixedAspectPolicy {
    aspect: Aspect,
    config: LearningConfig,
    line_length_m: f64,
    total_reward: f64,
    passes: u64,
}

impl FixedAspectPolicy {
    pub fn new(aspect: Aspect, config: LearningConfig, line_length_m: f64) -> Self {
        Self {
            aspect,
            config,
            line_length_m,
            total_reward: 0.0,
            passes: 0,
        }
    }
}

impl SignalPolicy for FixedAspectPolicy {
    fn name(&self) -> &'static str {
        "FixedAspect"
    }

    fn evaluate(
        &mut self,
        snapshot: &NetworkState,
        _rng: &mut RngManager,
    ) -> Result<Vec<SignalDecision>, InvariantViolation> {
        q_learning::check_kinematics(snapshot)?;
        let range = self.config.sensing_range(self.line_length_m);

        let decisions: Vec<SignalDecision> = snapshot
            .signals()
            .iter()
            .map(|signal| {
                let seen = discretize::sightings(signal, snapshot.trains(), &range);
                let state = discretize::discretize(&seen, &range);
                let safety = reward::safety_score(self.aspect, &seen, &self.config.safety);
                let impact = reward::throughput_impact(self.aspect, &self.config.throughput);
                let reward = reward::reward(self.aspect, state, safety, impact, &self.config.reward);
                let held = interlock(self.aspect, safety, impact, &seen, &self.config);
                let nearest = discretize::nearest(&seen);
                SignalDecision {
                    signal_id: signal.id().to_string(),
                    state,
                    chosen: self.aspect,
                    aspect: held.aspect,
                    interlocked: held.interlocked,
                    confidence: 0.5,
                    reward,
                    safety_score: held.safety_score,
                    throughput_impact: held.throughput_impact,
                    train_id: nearest.map(|s| s.train_id.clone()),
                    clearance_secs: nearest.and_then(Sighting::clearance_secs),
                    reasoning: held.reasoning(),
                }
            })
            .collect();

        self.total_reward += decisions.iter().map(|d| d.reward).sum::<f64>();
        self.passes += 1;
        Ok(decisions)
    }

    fn learning_metrics(&self, signals: &[Signal]) -> LearningMetrics {
        LearningMetrics::from_parts(self.total_reward, self.passes, 0.0, signals)
    }

    fn box_clone(&self) -> Box<dyn SignalPolicy> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Aspect a policy commits once the interlock has had its say.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Interlocked {
    pub aspect: Aspect,
    pub safety_score: f64,
    pub throughput_impact: i32,
    pub interlocked: bool,
}

impl Interlocked {
    pub fn reasoning(&self) -> Vec<String> {
        let mut reasoning = reward::reasoning(self.aspect, self.safety_score, self.throughput_impact);
        if self.interlocked {
            reasoning.push("Interlock held Proceed at Stop".to_string());
        }
        reasoning
    }
}

/// Hold a chosen Proceed at Stop when a sighted train is past the signal
/// inside the interlock distance. Shared by every built-in policy.
pub(crate) fn interlock(
    chosen: Aspect,
    safety_score: f64,
    throughput_impact: i32,
    seen: &[Sighting],
    config: &LearningConfig,
) -> Interlocked {
    let block_occupied = seen
        .iter()
        .any(|s| !s.is_behind() && s.distance_m() < config.interlock_distance_m);
    if config.interlock && chosen == Aspect::Proceed && block_occupied {
        Interlocked {
            aspect: Aspect::Stop,
            safety_score: reward::safety_score(Aspect::Stop, seen, &config.safety),
            throughput_impact: reward::throughput_impact(Aspect::Stop, &config.throughput),
            interlocked: true,
        }
    } else {
        Interlocked {
            aspect: chosen,
            safety_score,
            throughput_impact,
            interlocked: false,
        }
    }
}

/// Commit decisions onto the working state.
///
/// A Proceed over a block the state's [`BlockGuard`](crate::models::BlockGuard)
/// reports occupied is committed as Stop, whatever policy produced it.
/// Returns a `SignalChanged` event for every signal whose aspect changed.
pub fn apply_decisions(
    state: &mut NetworkState,
    decisions: &[SignalDecision],
    tick: usize,
    now: SimTime,
) -> Vec<Event> {
    let mut events = Vec::new();
    for decision in decisions {
        let blocked = decision.aspect == Aspect::Proceed
            && state
                .get_signal(&decision.signal_id)
                .and_then(|signal| state.train_ahead_of(signal))
                .is_some();
        let (aspect, interlocked) = if blocked {
            warn!(
                tick,
                signal_id = %decision.signal_id,
                "Proceed over an occupied block committed as Stop"
            );
            (Aspect::Stop, true)
        } else {
            (decision.aspect, decision.interlocked)
        };

        let Some(signal) = state.get_signal_mut(&decision.signal_id) else {
            continue;
        };
        let from = signal.aspect();
        signal.apply_decision(
            aspect,
            decision.safety_score,
            decision.throughput_impact,
            decision.confidence,
            decision.reward,
            decision.train_id.clone(),
            now,
        );
        if from != aspect {
            events.push(Event::SignalChanged {
                tick,
                signal_id: decision.signal_id.clone(),
                location: signal.location().to_string(),
                from,
                to: aspect,
                state: decision.state,
                train_id: decision.train_id.clone(),
                clearance_secs: decision.clearance_secs,
                reward: decision.reward,
                interlocked,
            });
        }
    }
    events
}

/// Return every Proceed signal a train has moved past to Stop.
///
/// Runs after motion so the committed state never shows Proceed into an
/// occupied block. No-op without a block guard.
pub fn hold_occupied_blocks(state: &mut NetworkState, tick: usize) -> Vec<Event> {
    let held: Vec<(usize, String)> = state
        .signals()
        .iter()
        .enumerate()
        .filter(|(_, signal)| signal.aspect() == Aspect::Proceed)
        .filter_map(|(i, signal)| state.train_ahead_of(signal).map(|t| (i, t.id().to_string())))
        .collect();

    let mut events = Vec::with_capacity(held.len());
    for (i, train_id) in held {
        let signal = &mut state.signals_mut()[i];
        signal.hold_at_stop();
        debug!(tick, signal_id = signal.id(), train_id = %train_id, "Signal returned to Stop behind train");
        events.push(Event::SignalChanged {
            tick,
            signal_id: signal.id().to_string(),
            location: signal.location().to_string(),
            from: Aspect::Proceed,
            to: Aspect::Stop,
            state: TrackState::Occupied,
            train_id: Some(train_id),
            clearance_secs: None,
            reward: 0.0,
            interlocked: true,
        });
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockGuard, Train};

    fn guarded_junction() -> NetworkState {
        NetworkState::new(
            vec![Signal::new("SIG-3", "Junction A", 1_000.0).with_aspect(Aspect::Caution)],
            vec![],
            vec![Train::new("T1", "One").with_speed(50.0).with_position(1_040.0)],
        )
        .with_block_guard(BlockGuard {
            distance_m: 100.0,
            line_length_m: 5_000.0,
        })
    }

    #[test]
    fn test_apply_decisions_only_reports_changes() {
        let mut state = NetworkState::new(
            vec![
                Signal::new("SIG-1", "West", 0.0),
                Signal::new("SIG-2", "East", 500.0),
            ],
            vec![],
            vec![Train::new("T1", "One").with_speed(50.0).with_position(450.0)],
        );
        let mut policy = FixedAspectPolicy::new(Aspect::Stop, LearningConfig::default(), 5_000.0);
        let decisions = policy
            .evaluate(&state.clone(), &mut RngManager::new(1))
            .unwrap();

        let events = apply_decisions(&mut state, &decisions, 1, 3_000);
        assert_eq!(events.len(), 2);
        assert_eq!(state.get_signal("SIG-2").unwrap().train_id(), Some("T1"));

        let again = apply_decisions(&mut state, &decisions, 2, 6_000);
        assert!(again.is_empty());
        assert_eq!(state.get_signal("SIG-2").unwrap().last_update(), 6_000);
    }

    #[test]
    fn test_fixed_proceed_is_held_over_occupied_block() {
        let mut state = guarded_junction();
        let mut policy = FixedAspectPolicy::new(Aspect::Proceed, LearningConfig::default(), 5_000.0);
        let decisions = policy
            .evaluate(&state.clone(), &mut RngManager::new(1))
            .unwrap();

        assert_eq!(decisions[0].chosen, Aspect::Proceed);
        assert_eq!(decisions[0].aspect, Aspect::Stop);
        assert!(decisions[0].interlocked);
        assert!(decisions[0]
            .reasoning
            .iter()
            .any(|r| r == "Interlock held Proceed at Stop"));

        apply_decisions(&mut state, &decisions, 0, 3_000);
        assert_ne!(state.get_signal("SIG-3").unwrap().aspect(), Aspect::Proceed);
        assert!(state.validate().is_empty());
    }

    #[test]
    fn test_commit_holds_proceed_from_any_policy() {
        let mut state = guarded_junction();
        let decision = SignalDecision {
            signal_id: "SIG-3".to_string(),
            state: TrackState::Occupied,
            chosen: Aspect::Proceed,
            aspect: Aspect::Proceed,
            interlocked: false,
            confidence: 0.5,
            reward: 0.0,
            safety_score: 0.0,
            throughput_impact: 3,
            train_id: Some("T1".to_string()),
            clearance_secs: None,
            reasoning: Vec::new(),
        };

        let events = apply_decisions(&mut state, &[decision], 4, 12_000);
        assert_eq!(state.get_signal("SIG-3").unwrap().aspect(), Aspect::Stop);
        assert!(matches!(
            &events[..],
            [Event::SignalChanged {
                from: Aspect::Caution,
                to: Aspect::Stop,
                interlocked: true,
                ..
            }]
        ));
    }

    #[test]
    fn test_passed_signal_returns_to_stop() {
        let mut state = guarded_junction();
        state.get_signal_mut("SIG-3").unwrap().corrupt_aspect(Aspect::Proceed);

        let events = hold_occupied_blocks(&mut state, 7);
        assert_eq!(events.len(), 1);
        assert_eq!(state.get_signal("SIG-3").unwrap().aspect(), Aspect::Stop);
        assert!(hold_occupied_blocks(&mut state, 8).is_empty());

        let mut open = NetworkState::new(
            vec![Signal::new("SIG-3", "Junction A", 1_000.0)],
            vec![],
            vec![Train::new("T1", "One").with_position(1_040.0)],
        );
        assert!(hold_occupied_blocks(&mut open, 7).is_empty());
        assert_eq!(open.get_signal("SIG-3").unwrap().aspect(), Aspect::Proceed);
    }

    #[test]
    fn test_learning_metrics_from_parts() {
        let mut low = Signal::new("SIG-1", "A", 0.0);
        low.apply_decision(Aspect::Proceed, 40.0, 3, 0.5, -20.0, None, 0);
        let ok = Signal::new("SIG-2", "B", 500.0);

        let metrics = LearningMetrics::from_parts(100.0, 10, 0.05, &[low, ok]);
        assert_eq!(metrics.average_delay, 4.0);
        assert_eq!(metrics.safety_violations, 1);
        assert_eq!(metrics.throughput_optimization, 3);
        assert_eq!(metrics.learning_progress, 1.0);
    }
}
