//! Train motion: status progression, speed bounds, delay accrual.

use railway_control_core_rs::models::{Event, NetworkState, Platform, Train, TrainStatus};
use railway_control_core_rs::motion::{MotionConfig, TrainMotionModel};
use railway_control_core_rs::RngManager;

const LINE_M: f64 = 5_000.0;

fn quiet() -> MotionConfig {
    MotionConfig {
        start_probability: 0.0,
        delay_probability: 0.0,
        low_speed_alert_probability: 0.0,
        ..MotionConfig::default()
    }
}

fn single(train: Train) -> NetworkState {
    NetworkState::new(vec![], vec![], vec![train])
}

#[test]
fn test_approaching_train_starts_running() {
    let model = TrainMotionModel::new(
        MotionConfig {
            start_probability: 1.0,
            ..quiet()
        },
        LINE_M,
    );
    let mut state = single(Train::new("T1", "One").with_status(TrainStatus::Approaching));
    let mut rng = RngManager::new(1);

    let events = model.advance(&mut state, &mut rng, 0, 3.0).unwrap();

    let train = state.get_train("T1").unwrap();
    assert_eq!(train.status(), TrainStatus::Running);
    assert!((25.0..40.0).contains(&train.speed()), "speed {}", train.speed());
    assert_eq!(train.current_location(), "Station Area");
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], Event::TrainStarted { train_id, .. } if train_id == "T1"));
}

#[test]
fn test_approaching_train_waits_without_start_draw() {
    let model = TrainMotionModel::new(quiet(), LINE_M);
    let mut state = single(Train::new("T1", "One").with_status(TrainStatus::Approaching));
    let mut rng = RngManager::new(1);

    for tick in 0..20 {
        model.advance(&mut state, &mut rng, tick, 3.0).unwrap();
    }
    let train = state.get_train("T1").unwrap();
    assert_eq!(train.status(), TrainStatus::Approaching);
    assert_eq!(train.speed(), 0.0);
    assert_eq!(train.position_m(), 0.0);
}

#[test]
fn test_speed_stays_within_limits() {
    let model = TrainMotionModel::new(
        MotionConfig {
            speed_jitter_kmh: 30.0,
            ..quiet()
        },
        LINE_M,
    );
    let mut state = NetworkState::new(
        vec![],
        vec![],
        vec![
            Train::new("FAST", "Fast").with_speed(200.0),
            Train::new("SLOW", "Slow").with_speed(5.0),
            Train::new("LATE", "Late")
                .with_status(TrainStatus::Delayed)
                .with_schedule(600, 3)
                .with_speed(119.0),
        ],
    );
    let mut rng = RngManager::new(8);

    for tick in 0..200 {
        model.advance(&mut state, &mut rng, tick, 3.0).unwrap();
        for train in state.trains() {
            assert!(
                (20.0..=120.0).contains(&train.speed()),
                "{} at {} km/h",
                train.id(),
                train.speed()
            );
            assert!((0.0..LINE_M).contains(&train.position_m()));
        }
    }
}

#[test]
fn test_delay_never_decreases_and_onset_reported_once() {
    let model = TrainMotionModel::new(
        MotionConfig {
            delay_probability: 1.0,
            ..quiet()
        },
        LINE_M,
    );
    let mut state = single(Train::new("T1", "One").with_speed(90.0));
    let mut rng = RngManager::new(21);

    let mut last_delay = 0;
    let mut onsets = 0;
    for tick in 0..25 {
        let events = model.advance(&mut state, &mut rng, tick, 3.0).unwrap();
        for event in &events {
            if let Event::DelayIncreased {
                previous_delay,
                new_delay,
                became_delayed,
                ..
            } = event
            {
                assert_eq!(*previous_delay, last_delay);
                assert!((1..=4).contains(&(new_delay - previous_delay)));
                if *became_delayed {
                    onsets += 1;
                }
            }
        }
        let delay = state.get_train("T1").unwrap().delay();
        assert!(delay > last_delay);
        last_delay = delay;
    }

    assert_eq!(onsets, 1);
    assert_eq!(state.get_train("T1").unwrap().status(), TrainStatus::Delayed);
}

#[test]
fn test_departed_train_accrues_no_delay() {
    let model = TrainMotionModel::new(
        MotionConfig {
            delay_probability: 1.0,
            ..quiet()
        },
        LINE_M,
    );
    let mut state = single(
        Train::new("T1", "One")
            .with_status(TrainStatus::Departed)
            .with_speed(80.0),
    );
    let mut rng = RngManager::new(4);

    for tick in 0..10 {
        let events = model.advance(&mut state, &mut rng, tick, 3.0).unwrap();
        assert!(events.iter().all(|e| e.event_type() != "DelayIncreased"));
    }
    let train = state.get_train("T1").unwrap();
    assert_eq!(train.delay(), 0);
    assert_eq!(train.status(), TrainStatus::Departed);
}

#[test]
fn test_low_speed_observation() {
    let model = TrainMotionModel::new(
        MotionConfig {
            low_speed_alert_probability: 1.0,
            speed_jitter_kmh: 0.0,
            ..quiet()
        },
        LINE_M,
    );
    // Delayed trains keep their speed (no acceleration toward the band).
    let mut state = NetworkState::new(
        vec![],
        vec![],
        vec![
            Train::new("CRAWL", "Crawler")
                .with_status(TrainStatus::Delayed)
                .with_schedule(600, 4)
                .with_speed(25.0),
            Train::new("CRUISE", "Cruiser")
                .with_status(TrainStatus::Delayed)
                .with_schedule(600, 4)
                .with_speed(90.0),
        ],
    );
    let mut rng = RngManager::new(2);

    let events = model.advance(&mut state, &mut rng, 0, 3.0).unwrap();

    let low: Vec<_> = events.iter().filter(|e| e.event_type() == "LowSpeed").collect();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].train_id(), Some("CRAWL"));
}

#[test]
fn test_train_at_platform_holds_position() {
    let model = TrainMotionModel::new(quiet(), LINE_M);
    let mut state = NetworkState::new(
        vec![],
        vec![Platform::new("P1", 200).occupied_by("T1", 100, None)],
        vec![Train::new("T1", "One")
            .with_status(TrainStatus::OnTime)
            .with_position(250.0)
            .at_platform("P1")],
    );
    let mut rng = RngManager::new(6);

    for tick in 0..10 {
        model.advance(&mut state, &mut rng, tick, 3.0).unwrap();
    }
    let train = state.get_train("T1").unwrap();
    assert_eq!(train.position_m(), 250.0);
    assert_eq!(train.speed(), 0.0);
    assert_eq!(train.status(), TrainStatus::OnTime);
}

#[test]
fn test_non_finite_speed_fails_the_phase() {
    let model = TrainMotionModel::new(quiet(), LINE_M);
    let mut train = Train::new("T1", "One").with_speed(50.0);
    train.corrupt_position(f64::NAN);
    let mut state = single(train);
    let mut rng = RngManager::new(6);

    assert!(model.advance(&mut state, &mut rng, 0, 3.0).is_err());
}

#[test]
fn test_apply_delay_reports_onset() {
    let model = TrainMotionModel::new(quiet(), LINE_M);
    let mut state = single(Train::new("T1", "One").with_status(TrainStatus::Running));

    let event = model.apply_delay(&mut state, "T1", 7, 3).unwrap();
    assert_eq!(
        event,
        Event::DelayIncreased {
            tick: 3,
            train_id: "T1".to_string(),
            train_name: "One".to_string(),
            previous_delay: 0,
            new_delay: 7,
            became_delayed: true,
        }
    );

    let again = model.apply_delay(&mut state, "T1", 2, 4).unwrap();
    assert!(matches!(
        again,
        Event::DelayIncreased {
            new_delay: 9,
            became_delayed: false,
            ..
        }
    ));

    assert!(model.apply_delay(&mut state, "NOPE", 1, 4).is_none());
}

#[test]
fn test_negative_increment_is_ignored() {
    let mut train = Train::new("T1", "One").with_schedule(600, 3);
    let change = train.add_delay(-10);
    assert_eq!(change.new_delay, 3);
    assert_eq!(train.delay(), 3);
}

#[test]
fn test_correct_schedule_is_the_only_way_down() {
    let mut train = Train::new("T1", "One").with_status(TrainStatus::Running);
    train.add_delay(6);
    assert_eq!(train.status(), TrainStatus::Delayed);

    train.correct_schedule(0);
    assert_eq!(train.delay(), 0);
    assert_eq!(train.status(), TrainStatus::Running);

    let mut parked = Train::new("T2", "Two")
        .with_status(TrainStatus::Delayed)
        .with_schedule(600, 4)
        .at_platform("P1");
    parked.correct_schedule(-1);
    assert_eq!(parked.status(), TrainStatus::OnTime);
    assert!(parked.is_punctual());
}
