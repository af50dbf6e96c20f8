//! Signal model
//!
//! A lineside signal at a fixed track position. Its aspect is chosen each
//! tick by the signal policy engine; the remaining fields record the outcome
//! of that decision (safety score, throughput impact, confidence, reward).

use crate::core::time::SimTime;
use serde::{Deserialize, Serialize};

/// Displayed state of a signal.
///
/// The declaration order is the action enumeration order used for
/// deterministic tie-breaking in the policy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Aspect {
    Proceed,
    Caution,
    Stop,
    RestrictedCaution,
}

impl Aspect {
    /// All aspects in enumeration order.
    pub const ALL: [Aspect; 4] = [
        Aspect::Proceed,
        Aspect::Caution,
        Aspect::Stop,
        Aspect::RestrictedCaution,
    ];

    pub fn index(self) -> usize {
        match self {
            Aspect::Proceed => 0,
            Aspect::Caution => 1,
            Aspect::Stop => 2,
            Aspect::RestrictedCaution => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Aspect::Proceed => "Proceed",
            Aspect::Caution => "Caution",
            Aspect::Stop => "Stop",
            Aspect::RestrictedCaution => "RestrictedCaution",
        }
    }
}

/// A signal guarding the block that starts at `position_m`.
///
/// # Example
/// ```
/// use railway_control_core_rs::models::{Aspect, Signal};
///
/// let signal = Signal::new("SIG-1", "Platform 1 Entry", 500.0);
/// assert_eq!(signal.aspect(), Aspect::Proceed);
/// assert_eq!(signal.safety_score(), 100.0);
/// assert!(signal.train_id().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    id: String,
    location: String,
    aspect: Aspect,
    position_m: f64,
    /// Nearest train inside the sensing window. Not an ownership link.
    train_id: Option<String>,
    /// [0, 100]
    safety_score: f64,
    throughput_impact: i32,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    last_reward: f64,
    #[serde(default)]
    last_update: SimTime,
}

impl Signal {
    pub fn new(id: impl Into<String>, location: impl Into<String>, position_m: f64) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
            aspect: Aspect::Proceed,
            position_m,
            train_id: None,
            safety_score: 100.0,
            throughput_impact: 0,
            confidence: 0.5,
            last_reward: 0.0,
            last_update: 0,
        }
    }

    pub fn with_aspect(mut self, aspect: Aspect) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn aspect(&self) -> Aspect {
        self.aspect
    }

    pub fn position_m(&self) -> f64 {
        self.position_m
    }

    pub fn train_id(&self) -> Option<&str> {
        self.train_id.as_deref()
    }

    pub fn safety_score(&self) -> f64 {
        self.safety_score
    }

    pub fn throughput_impact(&self) -> i32 {
        self.throughput_impact
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn last_reward(&self) -> f64 {
        self.last_reward
    }

    pub fn last_update(&self) -> SimTime {
        self.last_update
    }

    /// Commit a policy decision onto the record.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn apply_decision(
        &mut self,
        aspect: Aspect,
        safety_score: f64,
        throughput_impact: i32,
        confidence: f64,
        reward: f64,
        train_id: Option<String>,
        now: SimTime,
    ) {
        self.aspect = aspect;
        self.safety_score = safety_score.clamp(0.0, 100.0);
        self.throughput_impact = throughput_impact;
        self.confidence = confidence;
        self.last_reward = reward;
        self.train_id = train_id;
        self.last_update = now;
    }

    /// Force Stop without touching the decision record.
    pub(crate) fn hold_at_stop(&mut self) {
        self.aspect = Aspect::Stop;
    }

    /// Test hook for building malformed records.
    #[doc(hidden)]
    pub fn corrupt_aspect(&mut self, aspect: Aspect) {
        self.aspect = aspect;
    }

    pub(crate) fn clear_train(&mut self) {
        self.train_id = None;
    }
}
