//! Tabular Q-learning signal policy
//!
//! One pass visits every signal in store order:
//!
//! 1. Observe the sensing window and discretize it to a state `s`
//! 2. Pick `a` epsilon-greedily (ties go to the earliest aspect)
//! 3. Score safety and throughput for `a`, compute the shaped reward `R`
//! 4. Re-observe `s'` and apply
//!    `Q(s,a) ← Q(s,a) + α · (R + γ · max Q(s',·) − Q(s,a))`
//! 5. Derive confidence from the updated row and apply the interlock
//!
//! After the pass ε decays geometrically toward its floor and never grows.
//!
//! # Determinism
//!
//! Exploration draws exactly one value per signal from the caller's RNG,
//! plus one index draw when exploring.

use crate::models::{Aspect, InvariantViolation, NetworkState, Signal};
use crate::policy::discretize::{self, SensingRange, Sighting};
use crate::policy::q_table::QTable;
use crate::policy::reward;
use crate::policy::{self, LearningConfig, LearningMetrics, SignalDecision, SignalPolicy, TrackState};
use crate::rng::RngManager;
use std::any::Any;
use tracing::debug;

/// Epsilon-greedy tabular learner.
///
/// # Example
///
/// ```
/// use railway_control_core_rs::policy::{LearningConfig, QLearningPolicy, SignalPolicy, TrackState};
/// use railway_control_core_rs::models::{Aspect, NetworkState, Signal};
/// use railway_control_core_rs::RngManager;
///
/// let config = LearningConfig { initial_epsilon: 0.0, initial_q_max: 0.0, ..LearningConfig::default() };
/// let mut policy = QLearningPolicy::new(config, 5_000.0);
/// let snapshot = NetworkState::new(vec![Signal::new("SIG-1", "Yard", 0.0)], vec![], vec![]);
///
/// let decisions = policy.evaluate(&snapshot, &mut RngManager::new(7)).unwrap();
/// assert_eq!(decisions[0].state, TrackState::Clear);
/// assert_eq!(decisions[0].aspect, Aspect::Proceed);
/// assert!(policy.q_values(TrackState::Clear)[Aspect::Proceed.index()] > 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct QLearningPolicy {
    config: LearningConfig,
    range: SensingRange,
    q_table: QTable,
    epsilon: f64,
    total_reward: f64,
    passes: u64,
}

impl QLearningPolicy {
    /// Learner with an all-zero Q-table.
    pub fn new(config: LearningConfig, line_length_m: f64) -> Self {
        let range = config.sensing_range(line_length_m);
        let epsilon = config.initial_epsilon;
        Self {
            config,
            range,
            q_table: QTable::zeroed(),
            epsilon,
            total_reward: 0.0,
            passes: 0,
        }
    }

    /// Learner whose Q-table starts with small random values.
    pub fn seeded(config: LearningConfig, line_length_m: f64, rng: &mut RngManager) -> Self {
        let mut policy = Self::new(config, line_length_m);
        policy.q_table = QTable::randomized(rng, policy.config.initial_q_max);
        policy
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }

    pub fn q_table(&self) -> &QTable {
        &self.q_table
    }

    /// Copy of the action values for `state`, in aspect enumeration order.
    pub fn q_values(&self, state: TrackState) -> [f64; 4] {
        self.q_table.row(state)
    }

    /// Overwrite one action value (warm starts, experiments).
    pub fn set_q_value(&mut self, state: TrackState, action: Aspect, value: f64) {
        self.q_table.set(state, action, value);
    }

    pub fn select_action(&self, state: TrackState, rng: &mut RngManager) -> Aspect {
        if rng.chance(self.epsilon) {
            Aspect::ALL[rng.index(Aspect::ALL.len())]
        } else {
            self.q_table.best_action(state)
        }
    }

    /// Position of `action` between the row's min and max, clamped to
    /// [0.1, 0.95]; 0.5 when the row is flat.
    pub fn confidence(&self, state: TrackState, action: Aspect) -> f64 {
        let max = self.q_table.max_value(state);
        let min = self.q_table.min_value(state);
        if max == min {
            return 0.5;
        }
        ((self.q_table.get(state, action) - min) / (max - min)).clamp(0.1, 0.95)
    }

    fn update(&mut self, state: TrackState, action: Aspect, reward: f64, next_state: TrackState) {
        let current = self.q_table.get(state, action);
        let target = reward + self.config.discount_factor * self.q_table.max_value(next_state);
        let updated = current + self.config.learning_rate * (target - current);
        self.q_table.set(state, action, updated);
    }

    fn observe(&self, signal: &Signal, snapshot: &NetworkState) -> (Vec<Sighting>, TrackState) {
        let seen = discretize::sightings(signal, snapshot.trains(), &self.range);
        let state = discretize::discretize(&seen, &self.range);
        (seen, state)
    }

    fn decay_epsilon(&mut self) {
        let decayed = (self.epsilon * self.config.epsilon_decay).max(self.config.min_epsilon);
        self.epsilon = decayed.min(self.epsilon);
    }

    fn decide(&mut self, signal: &Signal, snapshot: &NetworkState, rng: &mut RngManager) -> SignalDecision {
        let (seen, state) = self.observe(signal, snapshot);
        let chosen = self.select_action(state, rng);

        let safety = reward::safety_score(chosen, &seen, &self.config.safety);
        let impact = reward::throughput_impact(chosen, &self.config.throughput);
        let r = reward::reward(chosen, state, safety, impact, &self.config.reward);

        let (_, next_state) = self.observe(signal, snapshot);
        self.update(state, chosen, r, next_state);
        self.total_reward += r;
        let confidence = self.confidence(state, chosen);

        let held = policy::interlock(chosen, safety, impact, &seen, &self.config);

        let nearest = discretize::nearest(&seen);
        SignalDecision {
            signal_id: signal.id().to_string(),
            state,
            chosen,
            aspect: held.aspect,
            interlocked: held.interlocked,
            confidence,
            reward: r,
            safety_score: held.safety_score,
            throughput_impact: held.throughput_impact,
            train_id: nearest.map(|s| s.train_id.clone()),
            clearance_secs: nearest.and_then(Sighting::clearance_secs),
            reasoning: held.reasoning(),
        }
    }
}

/// Reject snapshots whose train kinematics cannot be measured.
pub(crate) fn check_kinematics(snapshot: &NetworkState) -> Result<(), InvariantViolation> {
    match snapshot
        .trains()
        .iter()
        .find(|t| !t.speed().is_finite() || !t.position_m().is_finite())
    {
        Some(train) => Err(InvariantViolation::NonFiniteKinematics {
            train_id: train.id().to_string(),
        }),
        None => Ok(()),
    }
}

impl SignalPolicy for QLearningPolicy {
    fn name(&self) -> &'static str {
        "QLearning"
    }

    fn evaluate(
        &mut self,
        snapshot: &NetworkState,
        rng: &mut RngManager,
    ) -> Result<Vec<SignalDecision>, InvariantViolation> {
        check_kinematics(snapshot)?;

        let decisions = snapshot
            .signals()
            .iter()
            .map(|signal| self.decide(signal, snapshot, rng))
            .collect();

        self.passes += 1;
        let before = self.epsilon;
        self.decay_epsilon();
        debug!(
            passes = self.passes,
            epsilon_before = before,
            epsilon = self.epsilon,
            "Signal policy pass complete"
        );

        Ok(decisions)
    }

    fn learning_metrics(&self, signals: &[Signal]) -> LearningMetrics {
        LearningMetrics::from_parts(self.total_reward, self.passes, self.epsilon, signals)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Train;

    fn greedy() -> LearningConfig {
        LearningConfig {
            initial_epsilon: 0.0,
            initial_q_max: 0.0,
            ..LearningConfig::default()
        }
    }

    fn one_signal(trains: Vec<Train>) -> NetworkState {
        NetworkState::new(vec![Signal::new("SIG-1", "Junction", 1_000.0)], vec![], trains)
    }

    #[test]
    fn test_bellman_update_single_step() {
        let mut policy = QLearningPolicy::new(greedy(), 5_000.0);
        let snapshot = one_signal(vec![]);

        policy.evaluate(&snapshot, &mut RngManager::new(1)).unwrap();
        // R = 10 + 6 + 5 = 21; Q = 0 + 0.1 * (21 + 0.9 * 0 - 0)
        let q = policy.q_values(TrackState::Clear)[Aspect::Proceed.index()];
        assert!((q - 2.1).abs() < 1e-12, "q = {}", q);

        policy.evaluate(&snapshot, &mut RngManager::new(1)).unwrap();
        // 2.1 + 0.1 * (21 + 0.9 * 2.1 - 2.1)
        let q = policy.q_values(TrackState::Clear)[Aspect::Proceed.index()];
        assert!((q - 4.179).abs() < 1e-9, "q = {}", q);
    }

    #[test]
    fn test_confidence_flat_row_is_half() {
        let policy = QLearningPolicy::new(greedy(), 5_000.0);
        assert_eq!(policy.confidence(TrackState::Conflict, Aspect::Stop), 0.5);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let mut policy = QLearningPolicy::new(greedy(), 5_000.0);
        policy.set_q_value(TrackState::Clear, Aspect::Proceed, 10.0);
        policy.set_q_value(TrackState::Clear, Aspect::Caution, 5.0);
        assert_eq!(policy.confidence(TrackState::Clear, Aspect::Proceed), 0.95);
        assert_eq!(policy.confidence(TrackState::Clear, Aspect::Stop), 0.1);
        assert_eq!(policy.confidence(TrackState::Clear, Aspect::Caution), 0.5);
    }

    #[test]
    fn test_epsilon_decays_to_floor_and_never_rises() {
        let mut policy = QLearningPolicy::new(
            LearningConfig {
                initial_epsilon: 0.02,
                ..greedy()
            },
            5_000.0,
        );
        let snapshot = one_signal(vec![]);
        let mut rng = RngManager::new(5);
        let mut last = policy.epsilon();
        for _ in 0..300 {
            policy.evaluate(&snapshot, &mut rng).unwrap();
            assert!(policy.epsilon() <= last);
            last = policy.epsilon();
        }
        assert_eq!(policy.epsilon(), 0.01);

        let mut zero = QLearningPolicy::new(greedy(), 5_000.0);
        zero.evaluate(&snapshot, &mut rng).unwrap();
        assert_eq!(zero.epsilon(), 0.0);
    }

    #[test]
    fn test_interlock_holds_proceed_when_block_occupied() {
        let mut policy = QLearningPolicy::new(greedy(), 5_000.0);
        // Train 40 m past the signal
        let snapshot = one_signal(vec![Train::new("T1", "One").with_speed(50.0).with_position(1_040.0)]);

        let decisions = policy.evaluate(&snapshot, &mut RngManager::new(1)).unwrap();
        let decision = &decisions[0];
        assert_eq!(decision.state, TrackState::Occupied);
        assert_eq!(decision.chosen, Aspect::Proceed);
        assert_eq!(decision.aspect, Aspect::Stop);
        assert!(decision.interlocked);
        assert_eq!(decision.train_id.as_deref(), Some("T1"));
        // Learning used the chosen action
        assert!(policy.q_values(TrackState::Occupied)[Aspect::Proceed.index()] < 0.0);
    }

    #[test]
    fn test_interlock_can_be_disabled() {
        let mut policy = QLearningPolicy::new(
            LearningConfig {
                interlock: false,
                ..greedy()
            },
            5_000.0,
        );
        let snapshot = one_signal(vec![Train::new("T1", "One").with_speed(50.0).with_position(1_040.0)]);
        let decisions = policy.evaluate(&snapshot, &mut RngManager::new(1)).unwrap();
        assert_eq!(decisions[0].aspect, Aspect::Proceed);
        assert!(!decisions[0].interlocked);
    }

    #[test]
    fn test_non_finite_snapshot_leaves_policy_untouched() {
        let mut policy = QLearningPolicy::new(greedy(), 5_000.0);
        let mut train = Train::new("T1", "One");
        train.corrupt_position(f64::INFINITY);
        let snapshot = one_signal(vec![train]);

        assert!(policy.evaluate(&snapshot, &mut RngManager::new(1)).is_err());
        assert_eq!(policy.passes(), 0);
        assert_eq!(policy.q_table(), &QTable::zeroed());
    }
}
