//! Notification model
//!
//! Immutable event records raised by the alert generator. The only mutable
//! part is the acknowledgement, which moves from unacknowledged to
//! acknowledged exactly once.

use crate::core::time::SimTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    Alert,
    PlatformChange,
    Arrival,
    Departure,
    Emergency,
}

/// Severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// How a notification got acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Acknowledgement {
    Manual { at: SimTime },
    Automatic { at: SimTime },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    id: String,
    /// Creation order, strictly increasing per generator.
    sequence: u64,
    kind: NotificationKind,
    severity: Severity,
    title: String,
    message: String,
    created_at: SimTime,
    acknowledgement: Option<Acknowledgement>,
    train_id: Option<String>,
    platform_id: Option<String>,
    signal_id: Option<String>,
}

impl Notification {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: String,
        sequence: u64,
        kind: NotificationKind,
        severity: Severity,
        title: String,
        message: String,
        created_at: SimTime,
        train_id: Option<String>,
        platform_id: Option<String>,
        signal_id: Option<String>,
    ) -> Self {
        Self {
            id,
            sequence,
            kind,
            severity,
            title,
            message,
            created_at,
            acknowledgement: None,
            train_id,
            platform_id,
            signal_id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn created_at(&self) -> SimTime {
        self.created_at
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledgement.is_some()
    }

    pub fn acknowledgement(&self) -> Option<Acknowledgement> {
        self.acknowledgement
    }

    pub fn train_id(&self) -> Option<&str> {
        self.train_id.as_deref()
    }

    pub fn platform_id(&self) -> Option<&str> {
        self.platform_id.as_deref()
    }

    pub fn signal_id(&self) -> Option<&str> {
        self.signal_id.as_deref()
    }

    /// Returns false if it was already acknowledged.
    pub(crate) fn acknowledge(&mut self, ack: Acknowledgement) -> bool {
        if self.acknowledgement.is_some() {
            return false;
        }
        self.acknowledgement = Some(ack);
        true
    }
}
