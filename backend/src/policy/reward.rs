//! Reward shaping, safety scoring and throughput impact.
//!
//! All weights are tunable; the defaults reproduce the reference station's
//! behaviour.

use crate::models::Aspect;
use crate::policy::discretize::Sighting;
use crate::policy::TrackState;
use serde::{Deserialize, Serialize};

/// Terms of `R(action, state, safety, throughput_impact)`.
///
/// The shaping terms are additive; several may apply to one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardWeights {
    pub high_safety_threshold: f64,
    pub high_safety_reward: f64,
    pub fair_safety_threshold: f64,
    pub fair_safety_reward: f64,
    /// Applied when safety is at or below the fair threshold
    pub unsafe_penalty: f64,
    pub throughput_multiplier: f64,
    pub proceed_when_clear: f64,
    pub proceed_when_occupied: f64,
    /// Stop while Occupied or Conflict
    pub stop_when_blocked: f64,
    pub stop_when_clear: f64,
    pub caution_when_approaching: f64,
    /// RestrictedCaution while Approaching with positive throughput impact
    pub restricted_when_approaching: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            high_safety_threshold: 90.0,
            high_safety_reward: 10.0,
            fair_safety_threshold: 70.0,
            fair_safety_reward: 5.0,
            unsafe_penalty: -20.0,
            throughput_multiplier: 2.0,
            proceed_when_clear: 5.0,
            proceed_when_occupied: -15.0,
            stop_when_blocked: 8.0,
            stop_when_clear: -3.0,
            caution_when_approaching: 6.0,
            restricted_when_approaching: 4.0,
        }
    }
}

/// Per-train adjustments to the safety score (starts at `base`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyWeights {
    pub base: f64,
    pub proceed_close_distance_m: f64,
    pub proceed_close_penalty: f64,
    pub stop_distance_m: f64,
    pub stop_bonus: f64,
    pub caution_distance_m: f64,
    pub caution_bonus: f64,
    pub fast_speed_kmh: f64,
    pub fast_distance_m: f64,
    /// Fast train near the signal and the aspect is not Stop
    pub fast_penalty: f64,
    pub slow_speed_kmh: f64,
    pub slow_proceed_bonus: f64,
}

impl Default for SafetyWeights {
    fn default() -> Self {
        Self {
            base: 100.0,
            proceed_close_distance_m: 100.0,
            proceed_close_penalty: 30.0,
            stop_distance_m: 300.0,
            stop_bonus: 10.0,
            caution_distance_m: 500.0,
            caution_bonus: 5.0,
            fast_speed_kmh: 80.0,
            fast_distance_m: 500.0,
            fast_penalty: 15.0,
            slow_speed_kmh: 40.0,
            slow_proceed_bonus: 5.0,
        }
    }
}

/// Flat per-aspect throughput contribution, independent of train count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThroughputWeights {
    pub proceed: i32,
    pub caution: i32,
    pub stop: i32,
    pub restricted_caution: i32,
}

impl Default for ThroughputWeights {
    fn default() -> Self {
        Self {
            proceed: 3,
            caution: 1,
            stop: -2,
            restricted_caution: 2,
        }
    }
}

pub fn reward(
    action: Aspect,
    state: TrackState,
    safety_score: f64,
    throughput_impact: i32,
    w: &RewardWeights,
) -> f64 {
    let mut reward = if safety_score > w.high_safety_threshold {
        w.high_safety_reward
    } else if safety_score > w.fair_safety_threshold {
        w.fair_safety_reward
    } else {
        w.unsafe_penalty
    };

    reward += w.throughput_multiplier * throughput_impact as f64;

    match (action, state) {
        (Aspect::Proceed, TrackState::Clear) => reward += w.proceed_when_clear,
        (Aspect::Proceed, TrackState::Occupied) => reward += w.proceed_when_occupied,
        (Aspect::Stop, TrackState::Occupied | TrackState::Conflict) => {
            reward += w.stop_when_blocked
        }
        (Aspect::Stop, TrackState::Clear) => reward += w.stop_when_clear,
        (Aspect::Caution, TrackState::Approaching) => reward += w.caution_when_approaching,
        (Aspect::RestrictedCaution, TrackState::Approaching) if throughput_impact > 0 => {
            reward += w.restricted_when_approaching
        }
        _ => {}
    }

    reward
}

/// Safety score in [0, 100] for showing `action` to the trains in range.
pub fn safety_score(action: Aspect, seen: &[Sighting], w: &SafetyWeights) -> f64 {
    let mut score = w.base;
    for sighting in seen {
        let distance = sighting.distance_m();
        if distance < w.proceed_close_distance_m && action == Aspect::Proceed {
            score -= w.proceed_close_penalty;
        }
        if distance < w.stop_distance_m && action == Aspect::Stop {
            score += w.stop_bonus;
        }
        if distance < w.caution_distance_m && action == Aspect::Caution {
            score += w.caution_bonus;
        }
        if sighting.speed > w.fast_speed_kmh
            && distance < w.fast_distance_m
            && action != Aspect::Stop
        {
            score -= w.fast_penalty;
        }
        if sighting.speed < w.slow_speed_kmh && action == Aspect::Proceed {
            score += w.slow_proceed_bonus;
        }
    }
    score.clamp(0.0, 100.0)
}

pub fn throughput_impact(action: Aspect, w: &ThroughputWeights) -> i32 {
    match action {
        Aspect::Proceed => w.proceed,
        Aspect::Caution => w.caution,
        Aspect::Stop => w.stop,
        Aspect::RestrictedCaution => w.restricted_caution,
    }
}

/// Ordered, human-readable reasons behind a decision.
pub fn reasoning(action: Aspect, safety_score: f64, throughput_impact: i32) -> Vec<String> {
    let mut reasons = Vec::with_capacity(3);

    if safety_score > 90.0 {
        reasons.push("High safety conditions");
    } else if safety_score < 70.0 {
        reasons.push("Safety concerns detected");
    }

    if throughput_impact > 2 {
        reasons.push("Optimizing traffic flow");
    } else if throughput_impact < 0 {
        reasons.push("Prioritizing safety over speed");
    }

    reasons.push(match action {
        Aspect::Proceed => "Clear path ahead",
        Aspect::Caution => "Train approaching, prepare to stop",
        Aspect::Stop => "Stop required for safety",
        Aspect::RestrictedCaution => "Caution, reduced speed ahead",
    });

    reasons.into_iter().map(String::from).collect()
}
