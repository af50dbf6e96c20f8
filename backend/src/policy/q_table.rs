//! Tabular action values indexed by (TrackState, Aspect).

use crate::models::Aspect;
use crate::policy::TrackState;
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    values: [[f64; 4]; 4],
}

impl Default for QTable {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl QTable {
    pub fn zeroed() -> Self {
        Self {
            values: [[0.0; 4]; 4],
        }
    }

    /// Small random values in `[0, max_initial)`, drawn state-major in
    /// enumeration order.
    pub fn randomized(rng: &mut RngManager, max_initial: f64) -> Self {
        let mut table = Self::zeroed();
        if max_initial <= 0.0 {
            return table;
        }
        for row in table.values.iter_mut() {
            for value in row.iter_mut() {
                *value = rng.uniform(0.0, max_initial);
            }
        }
        table
    }

    pub fn get(&self, state: TrackState, action: Aspect) -> f64 {
        self.values[state.index()][action.index()]
    }

    pub fn set(&mut self, state: TrackState, action: Aspect, value: f64) {
        self.values[state.index()][action.index()] = value;
    }

    /// Copy of one row, in action enumeration order.
    pub fn row(&self, state: TrackState) -> [f64; 4] {
        self.values[state.index()]
    }

    /// Highest-valued action; the earliest action wins ties.
    pub fn best_action(&self, state: TrackState) -> Aspect {
        let row = &self.values[state.index()];
        let mut best = Aspect::ALL[0];
        for action in Aspect::ALL.iter().skip(1) {
            if row[action.index()] > row[best.index()] {
                best = *action;
            }
        }
        best
    }

    pub fn max_value(&self, state: TrackState) -> f64 {
        self.values[state.index()]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min_value(&self, state: TrackState) -> f64 {
        self.values[state.index()]
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().flatten().all(|v| v.is_finite())
    }
}
