//! Notification store and delivery policy.
//!
//! Owns every notification the generator creates and decides which ones an
//! operator sees:
//!
//! - at most `visible_limit` unacknowledged notifications are visible, oldest
//!   first
//! - low-severity notifications acknowledge themselves after a grace period
//!   unless an operator gets there first
//! - subscribers hear about each new notification exactly once, in creation
//!   order
//!
//! Timers are plain deadlines on the simulation clock; the orchestrator fires
//! them through [`NotificationCenter::fire_due`] in chronological order with
//! ticks.

use crate::alerts::{AlertConfig, NotificationDraft};
use crate::core::time::SimTime;
use crate::models::{Acknowledgement, Notification};
use crate::rng::RngManager;
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("notification {0} not found")]
    NotFound(String),
}

/// Handle returned by [`NotificationCenter::on_notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&Notification) + Send>;

pub struct NotificationCenter {
    config: AlertConfig,
    notifications: Vec<Notification>,
    next_sequence: u64,
    /// Auto-acknowledge deadlines, sorted by time then creation
    timers: VecDeque<(SimTime, String)>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    id_rng: RngManager,
}

impl fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("notifications", &self.notifications.len())
            .field("pending_timers", &self.timers.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl NotificationCenter {
    /// `seed` drives notification ids only.
    pub fn new(config: AlertConfig, seed: u64) -> Self {
        Self {
            config,
            notifications: Vec::new(),
            next_sequence: 0,
            timers: VecDeque::new(),
            subscribers: Vec::new(),
            next_subscription: 0,
            id_rng: RngManager::new(seed),
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Store a new notification, arm its timer and notify subscribers.
    pub fn publish(&mut self, draft: NotificationDraft, now: SimTime) -> Notification {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let id = format!("notif-{}", self.id_rng.uuid());

        let notification = Notification::new(
            id.clone(),
            sequence,
            draft.kind,
            draft.severity,
            draft.title,
            draft.message,
            now,
            draft.train_id,
            draft.platform_id,
            draft.signal_id,
        );

        if notification.severity() <= self.config.auto_ack_max_severity {
            let deadline = now + self.config.auto_ack_after_ms;
            let at = self.timers.partition_point(|(due, _)| *due <= deadline);
            self.timers.insert(at, (deadline, id.clone()));
        }

        debug!(
            id = %id,
            kind = ?notification.kind(),
            severity = ?notification.severity(),
            title = notification.title(),
            "Notification created"
        );

        self.notifications.push(notification.clone());
        self.trim_history();

        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(&notification);
        }
        notification
    }

    /// Operator acknowledgement.
    ///
    /// Returns `Ok(false)` when the notification was already acknowledged.
    pub fn acknowledge(&mut self, id: &str, now: SimTime) -> Result<bool, NotificationError> {
        let notification = self
            .notifications
            .iter_mut()
            .find(|n| n.id() == id)
            .ok_or_else(|| NotificationError::NotFound(id.to_string()))?;

        let newly = notification.acknowledge(Acknowledgement::Manual { at: now });
        if newly {
            self.timers.retain(|(_, timer_id)| timer_id != id);
            info!(id, title = notification.title(), "Notification acknowledged");
        }
        Ok(newly)
    }

    /// Earliest pending auto-acknowledge deadline.
    pub fn next_deadline(&self) -> Option<SimTime> {
        self.timers.front().map(|(due, _)| *due)
    }

    /// Auto-acknowledge everything whose deadline is at or before `now`.
    ///
    /// Returns the ids acknowledged by this call.
    pub fn fire_due(&mut self, now: SimTime) -> Vec<String> {
        let mut fired = Vec::new();
        while let Some((due, _)) = self.timers.front() {
            if *due > now {
                break;
            }
            let Some((due, id)) = self.timers.pop_front() else {
                break;
            };
            if let Some(notification) = self.notifications.iter_mut().find(|n| n.id() == id) {
                if notification.acknowledge(Acknowledgement::Automatic { at: due }) {
                    debug!(id = %id, at = due, "Notification auto-acknowledged");
                    fired.push(id);
                }
            }
        }
        fired
    }

    pub fn on_notification<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Notification) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns false if the subscription was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.notifications.iter().find(|n| n.id() == id)
    }

    /// Every stored notification, in creation order.
    pub fn all(&self) -> &[Notification] {
        &self.notifications
    }

    /// Unacknowledged notifications in creation order.
    pub fn active(&self) -> Vec<Notification> {
        self.notifications
            .iter()
            .filter(|n| !n.is_acknowledged())
            .cloned()
            .collect()
    }

    /// The oldest `visible_limit` unacknowledged notifications.
    pub fn visible(&self) -> Vec<Notification> {
        self.notifications
            .iter()
            .filter(|n| !n.is_acknowledged())
            .take(self.config.visible_limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    /// Evict down to `history_limit`: acknowledged notifications first, then
    /// the oldest outright. An evicted notification's timer goes with it.
    fn trim_history(&mut self) {
        while self.notifications.len() > self.config.history_limit {
            let oldest = self
                .notifications
                .iter()
                .position(Notification::is_acknowledged)
                .unwrap_or(0);
            let evicted = self.notifications.remove(oldest);
            if !evicted.is_acknowledged() {
                self.timers.retain(|(_, id)| id != evicted.id());
                debug!(id = evicted.id(), "Unacknowledged notification evicted from history");
            }
        }
    }
}
