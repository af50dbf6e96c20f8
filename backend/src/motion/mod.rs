//! Train motion and status model
//!
//! Advances every train once per tick. Rules are evaluated per train in this
//! order:
//!
//! 1. Approaching trains without a platform start Running with a small
//!    per-tick probability.
//! 2. Running trains without a platform accelerate toward the cruising band
//!    with bounded jitter; other moving trains only jitter.
//! 3. Delay accrual: with a small probability the delay grows by a random
//!    whole number of minutes; the first increase moves the train to Delayed.
//! 4. Low-speed observation: a train crawling below the threshold is
//!    reported with a small probability.
//!
//! Departed is never entered here; platform release owns that transition.
//!
//! # Determinism
//!
//! Every draw goes through the caller's [`RngManager`], one train at a time in
//! store order.

use crate::models::{Event, InvariantViolation, NetworkState, TrainStatus};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

/// Tunables for train motion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Per-tick probability that an Approaching train starts Running
    pub start_probability: f64,
    /// Speed band (km/h) assigned when a train starts Running
    pub start_speed_range: (f64, f64),
    /// Cruising band (km/h) that Running trains accelerate toward
    pub cruise_speed_range: (f64, f64),
    /// Speed gained per tick while below the cruising band
    pub acceleration_kmh_per_tick: f64,
    /// Total width of the per-tick speed jitter, centred on zero
    pub speed_jitter_kmh: f64,
    /// Hard clamp for moving trains
    pub speed_limits: (f64, f64),
    /// Per-tick probability of a delay increase
    pub delay_probability: f64,
    /// Inclusive range of minutes added per delay increase
    pub delay_increment_range: (i32, i32),
    /// Trains moving below this speed (and above zero) may raise an alert
    pub low_speed_threshold_kmh: f64,
    pub low_speed_alert_probability: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            start_probability: 0.15,
            start_speed_range: (25.0, 40.0),
            cruise_speed_range: (85.0, 100.0),
            acceleration_kmh_per_tick: 10.0,
            speed_jitter_kmh: 5.0,
            speed_limits: (20.0, 120.0),
            delay_probability: 0.04,
            delay_increment_range: (1, 4),
            low_speed_threshold_kmh: 30.0,
            low_speed_alert_probability: 0.02,
        }
    }
}

/// Advances train status, speed, position and delay.
///
/// # Example
///
/// ```
/// use railway_control_core_rs::motion::{MotionConfig, TrainMotionModel};
/// use railway_control_core_rs::models::{NetworkState, Train, TrainStatus};
/// use railway_control_core_rs::RngManager;
///
/// let model = TrainMotionModel::new(
///     MotionConfig {
///         start_probability: 1.0,
///         delay_probability: 0.0,
///         ..MotionConfig::default()
///     },
///     5_000.0,
/// );
/// let mut state = NetworkState::new(
///     vec![],
///     vec![],
///     vec![Train::new("T1", "Express").with_status(TrainStatus::Approaching)],
/// );
/// let mut rng = RngManager::new(1);
///
/// let events = model.advance(&mut state, &mut rng, 0, 3.0).unwrap();
/// assert_eq!(state.get_train("T1").unwrap().status(), TrainStatus::Running);
/// assert_eq!(events[0].event_type(), "TrainStarted");
/// ```
#[derive(Debug, Clone)]
pub struct TrainMotionModel {
    config: MotionConfig,
    /// Circular line; positions wrap at this length
    line_length_m: f64,
}

impl TrainMotionModel {
    pub fn new(config: MotionConfig, line_length_m: f64) -> Self {
        Self {
            config,
            line_length_m,
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Run one tick of motion over every train.
    ///
    /// Fails without touching anything if a train has non-finite kinematics.
    pub fn advance(
        &self,
        state: &mut NetworkState,
        rng: &mut RngManager,
        tick: usize,
        tick_secs: f64,
    ) -> Result<Vec<Event>, InvariantViolation> {
        if let Some(bad) = state
            .trains()
            .iter()
            .find(|t| !t.speed().is_finite() || !t.position_m().is_finite())
        {
            return Err(InvariantViolation::NonFiniteKinematics {
                train_id: bad.id().to_string(),
            });
        }

        let cfg = &self.config;
        let (min_speed, max_speed) = cfg.speed_limits;
        let mut events = Vec::new();

        for train in state.trains_mut() {
            let at_platform = train.platform_id().is_some();

            // Rules 1 and 2: status and speed
            match train.status() {
                TrainStatus::Approaching if !at_platform && rng.chance(cfg.start_probability) => {
                    let speed = rng
                        .uniform(cfg.start_speed_range.0, cfg.start_speed_range.1)
                        .clamp(min_speed, max_speed);
                    train.set_running(speed, "Station Area");
                    events.push(Event::TrainStarted {
                        tick,
                        train_id: train.id().to_string(),
                        speed,
                    });
                }
                TrainStatus::Running if !at_platform => {
                    let (band_lo, band_hi) = cfg.cruise_speed_range;
                    let step = if train.speed() < band_lo {
                        cfg.acceleration_kmh_per_tick.min(band_hi - train.speed())
                    } else if train.speed() > band_hi {
                        -cfg.acceleration_kmh_per_tick.min(train.speed() - band_hi)
                    } else {
                        0.0
                    };
                    let speed = (train.speed() + step + self.jitter(rng)).clamp(min_speed, max_speed);
                    train.set_speed(speed);
                    if (band_lo..=band_hi).contains(&speed) {
                        train.set_location("En Route");
                    }
                }
                TrainStatus::Delayed | TrainStatus::Departed | TrainStatus::Approaching
                    if !at_platform && train.speed() > 0.0 =>
                {
                    let speed = (train.speed() + self.jitter(rng)).clamp(min_speed, max_speed);
                    train.set_speed(speed);
                }
                _ => {}
            }

            if !at_platform && train.speed() > 0.0 {
                let advanced = train.position_m() + train.speed() / 3.6 * tick_secs;
                train.set_position(advanced.rem_euclid(self.line_length_m));
            }

            // Rule 3: delay accrual
            if !train.is_departed() && rng.chance(cfg.delay_probability) {
                let minutes = rng.range_inclusive(
                    cfg.delay_increment_range.0 as i64,
                    cfg.delay_increment_range.1 as i64,
                ) as i32;
                let change = train.add_delay(minutes);
                events.push(Event::DelayIncreased {
                    tick,
                    train_id: train.id().to_string(),
                    train_name: train.name().to_string(),
                    previous_delay: change.previous_delay,
                    new_delay: change.new_delay,
                    became_delayed: change.became_delayed,
                });
            }

            // Rule 4: low-speed observation
            if train.speed() > 0.0
                && train.speed() < cfg.low_speed_threshold_kmh
                && rng.chance(cfg.low_speed_alert_probability)
            {
                events.push(Event::LowSpeed {
                    tick,
                    train_id: train.id().to_string(),
                    train_name: train.name().to_string(),
                    speed: train.speed(),
                });
            }
        }

        Ok(events)
    }

    /// Explicit delay increase outside the random accrual rule (operator
    /// input, tests). Returns the committed event.
    pub fn apply_delay(
        &self,
        state: &mut NetworkState,
        train_id: &str,
        minutes: i32,
        tick: usize,
    ) -> Option<Event> {
        let train = state.get_train_mut(train_id)?;
        let change = train.add_delay(minutes);
        Some(Event::DelayIncreased {
            tick,
            train_id: train.id().to_string(),
            train_name: train.name().to_string(),
            previous_delay: change.previous_delay,
            new_delay: change.new_delay,
            became_delayed: change.became_delayed,
        })
    }

    fn jitter(&self, rng: &mut RngManager) -> f64 {
        let half = self.config.speed_jitter_kmh / 2.0;
        if half <= 0.0 {
            return 0.0;
        }
        rng.uniform(-half, half)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Train;

    fn quiet_config() -> MotionConfig {
        MotionConfig {
            start_probability: 0.0,
            delay_probability: 0.0,
            low_speed_alert_probability: 0.0,
            ..MotionConfig::default()
        }
    }

    #[test]
    fn test_running_train_accelerates_toward_band() {
        let model = TrainMotionModel::new(
            MotionConfig {
                speed_jitter_kmh: 0.0,
                ..quiet_config()
            },
            5_000.0,
        );
        let mut state = NetworkState::new(
            vec![],
            vec![],
            vec![Train::new("T1", "One").with_speed(40.0)],
        );
        let mut rng = RngManager::new(3);

        model.advance(&mut state, &mut rng, 0, 3.0).unwrap();
        assert_eq!(state.get_train("T1").unwrap().speed(), 50.0);

        for tick in 1..10 {
            model.advance(&mut state, &mut rng, tick, 3.0).unwrap();
        }
        let speed = state.get_train("T1").unwrap().speed();
        assert!((85.0..=100.0).contains(&speed), "speed {}", speed);
    }

    #[test]
    fn test_position_wraps_on_circular_line() {
        let model = TrainMotionModel::new(
            MotionConfig {
                speed_jitter_kmh: 0.0,
                ..quiet_config()
            },
            1_000.0,
        );
        let mut state = NetworkState::new(
            vec![],
            vec![],
            vec![Train::new("T1", "One").with_speed(90.0).with_position(950.0)],
        );
        let mut rng = RngManager::new(3);

        // 90 km/h = 25 m/s, 4 s tick = 100 m
        model.advance(&mut state, &mut rng, 0, 4.0).unwrap();
        let position = state.get_train("T1").unwrap().position_m();
        assert!((position - 50.0).abs() < 1e-9, "position {}", position);
    }

    #[test]
    fn test_train_at_platform_does_not_move() {
        let model = TrainMotionModel::new(quiet_config(), 5_000.0);
        let mut state = NetworkState::new(
            vec![],
            vec![],
            vec![Train::new("T1", "One")
                .with_status(TrainStatus::OnTime)
                .with_position(300.0)
                .at_platform("P1")],
        );
        let mut rng = RngManager::new(3);

        model.advance(&mut state, &mut rng, 0, 4.0).unwrap();
        let train = state.get_train("T1").unwrap();
        assert_eq!(train.speed(), 0.0);
        assert_eq!(train.position_m(), 300.0);
    }

    #[test]
    fn test_non_finite_position_rejected_without_writes() {
        let model = TrainMotionModel::new(
            MotionConfig {
                start_probability: 1.0,
                ..quiet_config()
            },
            5_000.0,
        );
        let mut train = Train::new("T2", "Two").with_status(TrainStatus::Approaching);
        train.corrupt_position(f64::NAN);
        let mut state = NetworkState::new(
            vec![],
            vec![],
            vec![
                Train::new("T1", "One").with_status(TrainStatus::Approaching),
                train,
            ],
        );
        let mut rng = RngManager::new(3);

        let err = model.advance(&mut state, &mut rng, 0, 3.0).unwrap_err();
        assert_eq!(
            err,
            InvariantViolation::NonFiniteKinematics {
                train_id: "T2".to_string()
            }
        );
        assert_eq!(
            state.get_train("T1").unwrap().status(),
            TrainStatus::Approaching
        );
    }
}
