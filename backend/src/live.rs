//! Live service
//!
//! Runs an [`Orchestrator`] on a background scheduler thread and serves
//! reads from the last committed snapshot.
//!
//! - Single writer: the orchestrator sits behind a `Mutex`; the scheduler
//!   thread and operator actions take turns on it.
//! - Copy-on-read: after every advance the service publishes a fresh
//!   `Arc<NetworkSnapshot>`; readers clone the `Arc` and never see a
//!   half-applied tick.
//! - `start()`/`stop()` are idempotent. `stop()` lets the in-flight advance
//!   finish, then joins the thread.
//!
//! Notification callbacks run on the scheduler thread while the orchestrator
//! is locked, so they must not call back into the service.

use crate::alerts::{NotificationError, SubscriptionId};
use crate::core::clock::{Clock, SystemClock};
use crate::metrics::ThroughputMetrics;
use crate::models::{Notification, Platform, Signal, Train};
use crate::orchestrator::{NetworkSnapshot, Orchestrator, SimulationError};
use crate::policy::LearningMetrics;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

/// Longest the scheduler sleeps between clock reads.
const MAX_POLL_MS: u64 = 100;

struct Shared {
    network: Mutex<Orchestrator>,
    snapshot: RwLock<Arc<NetworkSnapshot>>,
    clock: Arc<dyn Clock>,
}

impl Shared {
    /// Advance to the clock's current time. Publishes only when a tick,
    /// sample or timer was due; idle polls keep the current snapshot.
    fn catch_up(&self) -> Result<usize, SimulationError> {
        let mut network = lock(&self.network);
        let target = self.clock.now();
        let due = network.next_activity().is_some_and(|at| at <= target);
        let outcome = network.advance_to(target);
        // Even a failed advance may have committed earlier ticks.
        if due {
            self.publish(&network);
        }
        outcome.map(|results| results.len())
    }

    fn publish(&self, network: &Orchestrator) {
        let snapshot = Arc::new(network.snapshot());
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    fn current(&self) -> Arc<NetworkSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Network running in real (or injected) time.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use railway_control_core_rs::core::clock::VirtualClock;
/// use railway_control_core_rs::{LiveSystem, NetworkConfig, Orchestrator};
///
/// let clock = VirtualClock::new();
/// let network = Orchestrator::new(NetworkConfig::default()).unwrap();
/// let live = LiveSystem::with_clock(network, Arc::new(clock.clone()));
///
/// clock.advance(9_000);
/// assert_eq!(live.catch_up().unwrap(), 3);
/// assert_eq!(live.snapshot().tick, 3);
/// ```
pub struct LiveSystem {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
    poll: Duration,
}

impl LiveSystem {
    /// Wall-clock service; time starts when this is called.
    pub fn new(network: Orchestrator) -> Self {
        Self::with_clock(network, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(network: Orchestrator, clock: Arc<dyn Clock>) -> Self {
        let poll = Duration::from_millis(network.config().scheduler.tick_period_ms.min(MAX_POLL_MS));
        let snapshot = Arc::new(network.snapshot());
        Self {
            shared: Arc::new(Shared {
                network: Mutex::new(network),
                snapshot: RwLock::new(snapshot),
                clock,
            }),
            worker: Mutex::new(None),
            poll,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start the scheduler thread. Returns `Ok(false)` if already running.
    pub fn start(&self) -> Result<bool, SimulationError> {
        let mut worker = lock(&self.worker);
        if worker.is_some() {
            return Ok(false);
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let poll = self.poll;
        let handle = thread::Builder::new()
            .name("railway-scheduler".to_string())
            .spawn(move || {
                info!(poll_ms = poll.as_millis() as u64, "Scheduler started");
                loop {
                    match stop_rx.recv_timeout(poll) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    if let Err(e) = shared.catch_up() {
                        error!(error = %e, "Scheduled advance failed");
                    }
                }
                info!("Scheduler stopped");
            })
            .map_err(|e| SimulationError::Scheduler(format!("failed to spawn scheduler: {}", e)))?;

        *worker = Some(Worker { stop_tx, handle });
        Ok(true)
    }

    /// Stop scheduling and wait for the thread. Returns `false` if it was
    /// not running.
    pub fn stop(&self) -> bool {
        let Some(worker) = lock(&self.worker).take() else {
            return false;
        };
        // A send error only means the thread already exited.
        let _ = worker.stop_tx.send(());
        if let Err(e) = worker.handle.join() {
            error!("Scheduler thread panicked: {:?}", e);
        } else {
            debug!("Scheduler thread joined");
        }
        true
    }

    pub fn is_running(&self) -> bool {
        lock(&self.worker).is_some()
    }

    /// Advance to the clock's current time on the caller's thread.
    ///
    /// Returns the number of ticks run.
    pub fn catch_up(&self) -> Result<usize, SimulationError> {
        self.shared.catch_up()
    }

    // ========================================================================
    // Reads (last committed snapshot)
    // ========================================================================

    pub fn snapshot(&self) -> Arc<NetworkSnapshot> {
        self.shared.current()
    }

    pub fn list_signals(&self) -> Vec<Signal> {
        self.snapshot().signals.clone()
    }

    pub fn list_platforms(&self) -> Vec<Platform> {
        self.snapshot().platforms.clone()
    }

    pub fn list_trains(&self) -> Vec<Train> {
        self.snapshot().trains.clone()
    }

    pub fn list_notifications(&self) -> Vec<Notification> {
        self.snapshot().notifications.clone()
    }

    pub fn visible_notifications(&self) -> Vec<Notification> {
        self.snapshot().visible_notifications.clone()
    }

    pub fn current_metrics(&self) -> ThroughputMetrics {
        self.snapshot().metrics.clone()
    }

    pub fn learning_metrics(&self) -> LearningMetrics {
        self.snapshot().learning.clone()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub fn acknowledge_notification(&self, id: &str) -> Result<bool, NotificationError> {
        self.with_network(|network| network.acknowledge_notification(id))
    }

    pub fn on_notification<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Notification) + Send + 'static,
    {
        self.with_network(|network| network.on_notification(callback))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.with_network(|network| network.unsubscribe(id))
    }

    /// Run an operator action against the orchestrator, then republish.
    pub fn with_network<R>(&self, action: impl FnOnce(&mut Orchestrator) -> R) -> R {
        let mut network = lock(&self.shared.network);
        let out = action(&mut network);
        self.shared.publish(&network);
        out
    }
}

impl Drop for LiveSystem {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
