//! Domain models for the railway network

pub mod event;
pub mod notification;
pub mod platform;
pub mod signal;
pub mod state;
pub mod train;

// Re-exports
pub use event::{Event, EventLog};
pub use notification::{Acknowledgement, Notification, NotificationKind, Severity};
pub use platform::{Platform, PlatformError, PlatformStatus};
pub use signal::{Aspect, Signal};
pub use state::{BlockGuard, InvariantViolation, NetworkState};
pub use train::{DelayChange, Train, TrainPriority, TrainStatus};
