//! Event → notification rules.
//!
//! Pure: the same event always yields the same drafts, in the same order.

use crate::alerts::AlertConfig;
use crate::models::{Aspect, Event, NotificationKind, Severity};
use serde::{Deserialize, Serialize};

/// A notification before it gets an identity and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDraft {
    pub kind: NotificationKind,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub train_id: Option<String>,
    pub platform_id: Option<String>,
    pub signal_id: Option<String>,
}

impl NotificationDraft {
    fn new(kind: NotificationKind, severity: Severity, title: &str, message: String) -> Self {
        Self {
            kind,
            severity,
            title: title.to_string(),
            message,
            train_id: None,
            platform_id: None,
            signal_id: None,
        }
    }

    fn train(mut self, train_id: &str) -> Self {
        self.train_id = Some(train_id.to_string());
        self
    }

    fn platform(mut self, platform_id: &str) -> Self {
        self.platform_id = Some(platform_id.to_string());
        self
    }

    fn signal(mut self, signal_id: &str) -> Self {
        self.signal_id = Some(signal_id.to_string());
        self
    }
}

/// Severity of a delay-onset alert: >10 min Critical, >5 High, else Medium.
pub fn delay_severity(delay_minutes: i32) -> Severity {
    if delay_minutes > 10 {
        Severity::Critical
    } else if delay_minutes > 5 {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// Notifications raised by one committed event.
pub fn detect(event: &Event, config: &AlertConfig) -> Vec<NotificationDraft> {
    match event {
        Event::DelayIncreased {
            train_id,
            train_name,
            new_delay,
            became_delayed: true,
            ..
        } => vec![NotificationDraft::new(
            NotificationKind::Alert,
            delay_severity(*new_delay),
            "Train Delayed",
            format!("{} is delayed by {} minutes", train_name, new_delay),
        )
        .train(train_id)],

        Event::LowSpeed {
            train_id,
            train_name,
            speed,
            ..
        } => vec![NotificationDraft::new(
            NotificationKind::Alert,
            Severity::Medium,
            "Speed Alert",
            format!(
                "{} is running at reduced speed: {} km/h",
                train_name,
                speed.round()
            ),
        )
        .train(train_id)],

        Event::PlatformAssigned {
            train_id,
            train_name,
            platform_id,
            ..
        } => vec![
            NotificationDraft::new(
                NotificationKind::Arrival,
                Severity::Medium,
                "Train Arrived",
                format!("{} has arrived at Platform {}", train_name, platform_id),
            )
            .train(train_id)
            .platform(platform_id),
            NotificationDraft::new(
                NotificationKind::PlatformChange,
                Severity::High,
                "Platform Occupied",
                format!("Platform {} is now occupied by {}", platform_id, train_name),
            )
            .train(train_id)
            .platform(platform_id),
        ],

        Event::PlatformReleased {
            train_id,
            train_name,
            platform_id,
            ..
        } => vec![
            NotificationDraft::new(
                NotificationKind::Departure,
                Severity::Medium,
                "Train Departed",
                format!("{} has departed from Platform {}", train_name, platform_id),
            )
            .train(train_id)
            .platform(platform_id),
            NotificationDraft::new(
                NotificationKind::PlatformChange,
                Severity::Low,
                "Platform Available",
                format!("Platform {} is now available for next train", platform_id),
            )
            .platform(platform_id),
        ],

        Event::SignalChanged {
            signal_id,
            location,
            to: Aspect::Stop,
            train_id: Some(train_id),
            clearance_secs,
            ..
        } => {
            let mut drafts = vec![NotificationDraft::new(
                NotificationKind::Alert,
                Severity::High,
                "Signal at Stop",
                format!("Stop signal at {} - Train {} must stop", location, train_id),
            )
            .train(train_id)
            .signal(signal_id)];

            if let Some(secs) = clearance_secs.filter(|s| *s < config.collision_clearance_secs) {
                drafts.push(
                    NotificationDraft::new(
                        NotificationKind::Emergency,
                        Severity::Critical,
                        "Collision Risk",
                        format!(
                            "Collision risk: Signal {} clearance time {:.0}s",
                            signal_id, secs
                        ),
                    )
                    .train(train_id)
                    .signal(signal_id),
                );
            }
            drafts
        }

        _ => Vec::new(),
    }
}
