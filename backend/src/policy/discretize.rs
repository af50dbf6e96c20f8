//! Track-state discretization
//!
//! Reduces the trains around a signal to one of four states the learner can
//! index. Distances are measured along the circular line, so a train just
//! past the wrap point is still near a signal at position 0.

use crate::models::{Signal, Train};
use crate::policy::TrackState;

/// Distances (metres) used to classify a signal's surroundings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensingRange {
    /// Trains strictly closer than this are "in the window"
    pub window_m: f64,
    /// Any train strictly closer than this occupies the signal
    pub stopping_distance_m: f64,
    /// A train behind the signal strictly closer than this is approaching
    pub caution_distance_m: f64,
    /// Circular line length; zero or negative means an open line
    pub line_length_m: f64,
}

/// A train seen from a signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub train_id: String,
    /// Negative while the train is behind the signal, positive once past it
    pub offset_m: f64,
    pub speed: f64,
}

impl Sighting {
    pub fn distance_m(&self) -> f64 {
        self.offset_m.abs()
    }

    pub fn is_behind(&self) -> bool {
        self.offset_m < 0.0
    }

    /// Seconds until the train covers its distance to the signal, if moving.
    pub fn clearance_secs(&self) -> Option<f64> {
        if self.speed > 0.0 {
            Some(self.distance_m() / (self.speed / 3.6))
        } else {
            None
        }
    }
}

/// Signed distance from `signal_pos` to `train_pos`.
///
/// On a circular line the result is folded into `(-L/2, L/2]`.
pub fn track_offset(signal_pos: f64, train_pos: f64, line_length_m: f64) -> f64 {
    let raw = train_pos - signal_pos;
    if line_length_m <= 0.0 {
        return raw;
    }
    let wrapped = raw.rem_euclid(line_length_m);
    if wrapped > line_length_m / 2.0 {
        wrapped - line_length_m
    } else {
        wrapped
    }
}

/// Every train inside the sensing window, in store order.
pub fn sightings(signal: &Signal, trains: &[Train], range: &SensingRange) -> Vec<Sighting> {
    trains
        .iter()
        .filter_map(|train| {
            let offset_m = track_offset(signal.position_m(), train.position_m(), range.line_length_m);
            (offset_m.abs() < range.window_m).then(|| Sighting {
                train_id: train.id().to_string(),
                offset_m,
                speed: train.speed(),
            })
        })
        .collect()
}

/// Classify the window contents.
///
/// Precedence: empty → Clear, several trains → Conflict, a train within
/// stopping distance → Occupied, a train behind within caution distance →
/// Approaching, otherwise Clear.
pub fn discretize(seen: &[Sighting], range: &SensingRange) -> TrackState {
    if seen.is_empty() {
        return TrackState::Clear;
    }
    if seen.len() > 1 {
        return TrackState::Conflict;
    }
    if seen.iter().any(|s| s.distance_m() < range.stopping_distance_m) {
        return TrackState::Occupied;
    }
    if seen
        .iter()
        .any(|s| s.is_behind() && s.distance_m() < range.caution_distance_m)
    {
        return TrackState::Approaching;
    }
    TrackState::Clear
}

/// Nearest sighting; the first in store order wins a tie.
pub fn nearest(seen: &[Sighting]) -> Option<&Sighting> {
    seen.iter().fold(None, |best: Option<&Sighting>, s| match best {
        Some(b) if b.distance_m() <= s.distance_m() => Some(b),
        _ => Some(s),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> SensingRange {
        SensingRange {
            window_m: 1_000.0,
            stopping_distance_m: 100.0,
            caution_distance_m: 500.0,
            line_length_m: 5_000.0,
        }
    }

    fn train_at(id: &str, position: f64) -> Train {
        Train::new(id, id).with_speed(60.0).with_position(position)
    }

    #[test]
    fn test_offset_wraps_around_line() {
        assert_eq!(track_offset(0.0, 4_900.0, 5_000.0), -100.0);
        assert_eq!(track_offset(4_500.0, 100.0, 5_000.0), 600.0);
        assert_eq!(track_offset(1_000.0, 700.0, 0.0), -300.0);
    }

    #[test]
    fn test_empty_window_is_clear() {
        let signal = Signal::new("SIG-1", "A", 0.0);
        let trains = vec![train_at("T1", 2_500.0)];
        let seen = sightings(&signal, &trains, &range());
        assert!(seen.is_empty());
        assert_eq!(discretize(&seen, &range()), TrackState::Clear);
    }

    #[test]
    fn test_single_train_states() {
        let signal = Signal::new("SIG-2", "B", 1_000.0);
        let r = range();

        let close = sightings(&signal, &[train_at("T1", 1_050.0)], &r);
        assert_eq!(discretize(&close, &r), TrackState::Occupied);

        let behind = sightings(&signal, &[train_at("T1", 700.0)], &r);
        assert_eq!(discretize(&behind, &r), TrackState::Approaching);

        let ahead = sightings(&signal, &[train_at("T1", 1_300.0)], &r);
        assert_eq!(discretize(&ahead, &r), TrackState::Clear);
    }

    #[test]
    fn test_multiple_trains_conflict_overrides_occupied() {
        let signal = Signal::new("SIG-2", "B", 1_000.0);
        let trains = vec![train_at("T1", 1_020.0), train_at("T2", 1_800.0)];
        let seen = sightings(&signal, &trains, &range());
        assert_eq!(discretize(&seen, &range()), TrackState::Conflict);
        assert_eq!(nearest(&seen).map(|s| s.train_id.as_str()), Some("T1"));
    }

    #[test]
    fn test_clearance_needs_motion() {
        let moving = Sighting {
            train_id: "T1".into(),
            offset_m: -250.0,
            speed: 90.0,
        };
        assert!((moving.clearance_secs().unwrap() - 10.0).abs() < 1e-9);

        let stopped = Sighting {
            speed: 0.0,
            ..moving
        };
        assert_eq!(stopped.clearance_secs(), None);
    }
}
