//! Signal policy: discretization, reward shaping, Q-learning and the
//! interlock.

use railway_control_core_rs::models::{
    Aspect, NetworkState, NotificationKind, Severity, Signal, Train, TrainStatus,
};
use railway_control_core_rs::policy::discretize::{discretize, sightings, track_offset};
use railway_control_core_rs::policy::reward::{reward, safety_score, throughput_impact};
use railway_control_core_rs::policy::{
    FixedAspectPolicy, LearningConfig, QLearningPolicy, RewardWeights, SafetyWeights, SensingRange,
    SignalPolicy, ThroughputWeights, TrackState,
};
use railway_control_core_rs::{NetworkConfig, NetworkLayout, Orchestrator, RngManager};

const LINE_M: f64 = 5_000.0;

fn range() -> SensingRange {
    LearningConfig::default().sensing_range(LINE_M)
}

fn train_at(id: &str, position: f64) -> Train {
    Train::new(id, id).with_speed(60.0).with_position(position)
}

fn classify(signal_at: f64, trains: &[Train]) -> TrackState {
    let signal = Signal::new("SIG", "Test", signal_at);
    let r = range();
    discretize(&sightings(&signal, trains, &r), &r)
}

/// Greedy learner, no exploration, all-zero table.
fn greedy() -> LearningConfig {
    LearningConfig {
        initial_epsilon: 0.0,
        min_epsilon: 0.0,
        initial_q_max: 0.0,
        ..LearningConfig::default()
    }
}

fn empty_line() -> NetworkState {
    NetworkState::new(vec![Signal::new("SIG-1", "Main Line", 2_000.0)], vec![], vec![])
}

// ============================================================================
// Discretization
// ============================================================================

#[test]
fn test_discretization_states() {
    assert_eq!(classify(1_000.0, &[]), TrackState::Clear);
    assert_eq!(classify(1_000.0, &[train_at("T1", 1_099.0)]), TrackState::Occupied);
    assert_eq!(classify(1_000.0, &[train_at("T1", 901.0)]), TrackState::Occupied);
    assert_eq!(classify(1_000.0, &[train_at("T1", 600.0)]), TrackState::Approaching);
    // Past the signal and beyond stopping distance
    assert_eq!(classify(1_000.0, &[train_at("T1", 1_400.0)]), TrackState::Clear);
    // Behind but beyond caution distance
    assert_eq!(classify(1_000.0, &[train_at("T1", 300.0)]), TrackState::Clear);
    assert_eq!(
        classify(1_000.0, &[train_at("T1", 800.0), train_at("T2", 1_500.0)]),
        TrackState::Conflict
    );
}

#[test]
fn test_sensing_window_is_exclusive() {
    assert_eq!(classify(1_000.0, &[train_at("T1", 2_000.0)]), TrackState::Clear);
    // One in range, one exactly at the edge: no conflict
    assert_eq!(
        classify(1_000.0, &[train_at("T1", 1_050.0), train_at("T2", 2_000.0)]),
        TrackState::Occupied
    );
}

#[test]
fn test_discretization_wraps_around_line() {
    assert_eq!(track_offset(0.0, 4_950.0, LINE_M), -50.0);
    assert_eq!(classify(0.0, &[train_at("T1", 4_950.0)]), TrackState::Occupied);
    assert_eq!(classify(0.0, &[train_at("T1", 4_700.0)]), TrackState::Approaching);
    assert_eq!(classify(4_500.0, &[train_at("T1", 100.0)]), TrackState::Clear);
    assert_eq!(
        classify(4_800.0, &[train_at("T1", 50.0), train_at("T2", 4_400.0)]),
        TrackState::Conflict
    );
}

// ============================================================================
// Scoring
// ============================================================================

#[test]
fn test_proceed_on_clear_track_is_positive() {
    let w = RewardWeights::default();
    let safety = safety_score(Aspect::Proceed, &[], &SafetyWeights::default());
    let impact = throughput_impact(Aspect::Proceed, &ThroughputWeights::default());

    assert_eq!(safety, 100.0);
    assert_eq!(impact, 3);
    assert!(reward(Aspect::Proceed, TrackState::Clear, safety, impact, &w) > 0.0);
}

#[test]
fn test_stop_beats_proceed_when_block_occupied() {
    let signal = Signal::new("SIG", "Test", 1_000.0);
    let trains = [Train::new("T1", "One").with_speed(50.0).with_position(1_040.0)];
    let seen = sightings(&signal, &trains, &range());
    let sw = SafetyWeights::default();
    let tw = ThroughputWeights::default();
    let rw = RewardWeights::default();

    let score = |aspect| {
        let safety = safety_score(aspect, &seen, &sw);
        reward(aspect, TrackState::Occupied, safety, throughput_impact(aspect, &tw), &rw)
    };

    assert!(score(Aspect::Proceed) < 0.0);
    assert!(score(Aspect::Stop) > score(Aspect::Proceed));
}

#[test]
fn test_safety_score_is_bounded() {
    let sw = SafetyWeights::default();
    let signal = Signal::new("SIG", "Test", 1_000.0);
    let crowd: Vec<_> = (0..8)
        .map(|i| {
            Train::new(format!("T{}", i), "Fast")
                .with_speed(110.0)
                .with_position(960.0 + i as f64 * 10.0)
        })
        .collect();
    let seen = sightings(&signal, &crowd, &range());

    for aspect in Aspect::ALL {
        let safety = safety_score(aspect, &seen, &sw);
        assert!((0.0..=100.0).contains(&safety), "{:?} scored {}", aspect, safety);
    }
    assert_eq!(safety_score(Aspect::Proceed, &seen, &sw), 0.0);
}

// ============================================================================
// Learning
// ============================================================================

// Default weights pay Stop on a clear line +3 (10 safety, -4 throughput,
// -3 shaping), so the penalty has to be raised before Stop turns bad.
#[test]
fn test_bad_action_value_falls_until_abandoned() {
    let mut config = greedy();
    config.reward.stop_when_clear = -25.0;
    let mut policy = QLearningPolicy::new(config, LINE_M);
    policy.set_q_value(TrackState::Clear, Aspect::Stop, 1.0);
    let snapshot = empty_line();
    let mut rng = RngManager::new(1);

    let first = policy.evaluate(&snapshot, &mut rng).unwrap();
    assert_eq!(first[0].chosen, Aspect::Stop);
    assert!(first[0].reward < 0.0);

    let mut last = policy.q_values(TrackState::Clear)[Aspect::Stop.index()];
    assert!(last < 1.0);
    for _ in 0..25 {
        let decisions = policy.evaluate(&snapshot, &mut rng).unwrap();
        assert_ne!(decisions[0].chosen, Aspect::Stop);
        let q = policy.q_values(TrackState::Clear)[Aspect::Stop.index()];
        assert!(q <= last);
        last = q;
    }

    assert_eq!(policy.q_table().best_action(TrackState::Clear), Aspect::Proceed);
}

#[test]
fn test_default_weights_still_reward_stop_on_a_clear_line() {
    let mut policy = QLearningPolicy::new(greedy(), LINE_M);
    policy.set_q_value(TrackState::Clear, Aspect::Stop, 1.0);
    let snapshot = empty_line();
    let mut rng = RngManager::new(1);

    let mut last = 1.0;
    for _ in 0..5 {
        let decisions = policy.evaluate(&snapshot, &mut rng).unwrap();
        assert_eq!(decisions[0].chosen, Aspect::Stop);
        assert_eq!(decisions[0].reward, 3.0);
        let q = policy.q_values(TrackState::Clear)[Aspect::Stop.index()];
        assert!(q > last, "{} did not rise above {}", q, last);
        last = q;
    }
    assert_eq!(policy.q_table().best_action(TrackState::Clear), Aspect::Stop);
}

#[test]
fn test_learning_on_the_orchestrator() {
    let mut config = NetworkConfig::default();
    config.learning.initial_epsilon = 0.0;
    config.learning.min_epsilon = 0.0;
    config.learning.reward.stop_when_clear = -25.0;
    config.motion.start_probability = 0.0;
    config.motion.delay_probability = 0.0;
    config.layout = NetworkLayout {
        line_length_m: LINE_M,
        signals: vec![Signal::new("SIG-1", "Main Line", 2_000.0)],
        platforms: vec![],
        trains: vec![],
    };
    let mut network = Orchestrator::new(config).unwrap();
    network
        .q_learning_mut()
        .unwrap()
        .set_q_value(TrackState::Clear, Aspect::Stop, 1.0);

    network.tick().unwrap();
    assert_eq!(network.get_signal("SIG-1").unwrap().aspect(), Aspect::Stop);

    network.advance_to(60_000).unwrap();

    let stop_value = network.q_values(TrackState::Clear).unwrap()[Aspect::Stop.index()];
    assert!(stop_value < 0.0);
    assert_ne!(network.get_signal("SIG-1").unwrap().aspect(), Aspect::Stop);
    assert_eq!(network.learning_metrics().passes, 20);
}

#[test]
fn test_epsilon_decays_to_floor() {
    let mut policy = QLearningPolicy::new(
        LearningConfig {
            initial_epsilon: 0.5,
            epsilon_decay: 0.9,
            min_epsilon: 0.05,
            ..LearningConfig::default()
        },
        LINE_M,
    );
    let snapshot = empty_line();
    let mut rng = RngManager::new(3);

    let mut last = policy.epsilon();
    for _ in 0..100 {
        policy.evaluate(&snapshot, &mut rng).unwrap();
        assert!(policy.epsilon() <= last);
        assert!(policy.epsilon() >= 0.05);
        last = policy.epsilon();
    }
    assert_eq!(policy.epsilon(), 0.05);
    assert_eq!(policy.passes(), 100);
}

#[test]
fn test_zero_epsilon_is_deterministic() {
    let snapshot = NetworkState::new(
        vec![
            Signal::new("SIG-1", "A", 0.0),
            Signal::new("SIG-2", "B", 1_000.0),
            Signal::new("SIG-3", "C", 2_000.0),
        ],
        vec![],
        vec![train_at("T1", 950.0), train_at("T2", 1_900.0)],
    );
    let mut a = QLearningPolicy::new(greedy(), LINE_M);
    let mut b = QLearningPolicy::new(greedy(), LINE_M);

    for _ in 0..10 {
        let da = a.evaluate(&snapshot, &mut RngManager::new(1)).unwrap();
        let db = b.evaluate(&snapshot, &mut RngManager::new(999)).unwrap();
        assert_eq!(da, db);
    }
    assert_eq!(a.q_table(), b.q_table());
}

#[test]
fn test_q_values_stay_finite() {
    let mut policy = QLearningPolicy::new(LearningConfig::default(), LINE_M);
    let snapshot = NetworkState::new(
        vec![Signal::new("SIG-1", "A", 0.0), Signal::new("SIG-2", "B", 500.0)],
        vec![],
        vec![train_at("T1", 4_980.0), train_at("T2", 450.0), train_at("T3", 520.0)],
    );
    let mut rng = RngManager::new(17);

    for _ in 0..2_000 {
        policy.evaluate(&snapshot, &mut rng).unwrap();
    }
    assert!(policy.q_table().is_finite());
}

// ============================================================================
// Interlock
// ============================================================================

#[test]
fn test_interlock_raises_stop_alerts() {
    let mut config = NetworkConfig::default();
    config.learning.initial_epsilon = 0.0;
    config.learning.min_epsilon = 0.0;
    config.motion.delay_probability = 0.0;
    config.motion.low_speed_alert_probability = 0.0;
    config.layout = NetworkLayout {
        line_length_m: LINE_M,
        signals: vec![Signal::new("SIG-4", "Junction A", 1_000.0)],
        platforms: vec![],
        trains: vec![Train::new("T1", "Express")
            .with_status(TrainStatus::Delayed)
            .with_schedule(14 * 60, 3)
            .with_speed(50.0)
            .with_position(1_040.0)],
    };
    let mut network = Orchestrator::new(config).unwrap();
    network
        .q_learning_mut()
        .unwrap()
        .set_q_value(TrackState::Occupied, Aspect::Proceed, 5.0);

    let result = network.tick().unwrap();

    let decision = &network.last_decisions()[0];
    assert_eq!(decision.chosen, Aspect::Proceed);
    assert_eq!(decision.aspect, Aspect::Stop);
    assert!(decision.interlocked);
    assert!(decision
        .reasoning
        .iter()
        .any(|r| r == "Interlock held Proceed at Stop"));
    assert_eq!(network.get_signal("SIG-4").unwrap().aspect(), Aspect::Stop);
    assert_eq!(network.get_signal("SIG-4").unwrap().train_id(), Some("T1"));
    assert_eq!(result.num_signal_changes, 1);

    let notifications = network.list_notifications();
    assert_eq!(notifications.len(), 2);
    assert_eq!(notifications[0].title(), "Signal at Stop");
    assert_eq!(notifications[0].severity(), Severity::High);
    assert_eq!(notifications[1].kind(), NotificationKind::Emergency);
    assert_eq!(notifications[1].severity(), Severity::Critical);
    assert_eq!(notifications[1].signal_id(), Some("SIG-4"));
}

#[test]
fn test_fixed_aspect_baseline_scores_without_learning() {
    let mut policy = FixedAspectPolicy::new(Aspect::Stop, LearningConfig::default(), LINE_M);
    let snapshot = empty_line();

    let decisions = policy.evaluate(&snapshot, &mut RngManager::new(1)).unwrap();
    assert_eq!(decisions[0].aspect, Aspect::Stop);
    assert_eq!(decisions[0].state, TrackState::Clear);
    assert_eq!(decisions[0].confidence, 0.5);

    let metrics = policy.learning_metrics(snapshot.signals());
    assert_eq!(metrics.passes, 1);
    assert_eq!(metrics.exploration_rate, 0.0);
    assert_eq!(metrics.total_reward, decisions[0].reward);
}
