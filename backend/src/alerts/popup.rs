//! Popup delivery: one alert on screen at a time, spaced out.
//!
//! Alerts queue in creation order. A queued alert surfaces only once the
//! minimum spacing has elapsed since the previous one surfaced, however deep
//! the queue is. Alerts acknowledged elsewhere while queued are skipped.

use crate::alerts::{NotificationCenter, NotificationError};
use crate::core::time::SimTime;
use crate::models::Notification;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct PopupDelivery {
    spacing_ms: SimTime,
    queue: VecDeque<String>,
    current: Option<String>,
    last_surfaced_at: Option<SimTime>,
}

impl PopupDelivery {
    pub fn new(spacing_ms: SimTime) -> Self {
        Self {
            spacing_ms,
            queue: VecDeque::new(),
            current: None,
            last_surfaced_at: None,
        }
    }

    pub fn enqueue(&mut self, notification: &Notification) {
        self.queue.push_back(notification.id().to_string());
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Id of the alert currently on screen.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Surface the next queued alert if the spacing allows it.
    ///
    /// Returns the newly surfaced notification id.
    pub fn poll(&mut self, now: SimTime, center: &NotificationCenter) -> Option<String> {
        if let Some(last) = self.last_surfaced_at {
            if now < last + self.spacing_ms {
                return None;
            }
        }
        while let Some(id) = self.queue.pop_front() {
            let still_open = center.get(&id).is_some_and(|n| !n.is_acknowledged());
            if still_open {
                self.current = Some(id.clone());
                self.last_surfaced_at = Some(now);
                return Some(id);
            }
        }
        None
    }

    /// Operator closed a popup: acknowledges it in the center.
    pub fn dismiss(
        &mut self,
        id: &str,
        now: SimTime,
        center: &mut NotificationCenter,
    ) -> Result<bool, NotificationError> {
        let acknowledged = center.acknowledge(id, now)?;
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
        self.queue.retain(|queued| queued != id);
        Ok(acknowledged)
    }
}
