//! railway-sim
//!
//! Runs the station network either in real time (background scheduler) or
//! as fast as possible on the virtual clock.
//!
//! Usage: `railway-sim [--config FILE] [--seed N] [--tick-ms MS] [--duration-secs S] [--virtual] [--json]`

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use railway_control_core_rs::{
    LiveSystem, NetworkConfig, NetworkSnapshot, Notification, Orchestrator, PopupDelivery,
    SimTime, ThroughputMetrics,
};

#[derive(Parser, Debug)]
#[command(name = "railway-sim")]
#[command(about = "Run the railway station network with a learning signal controller")]
struct Args {
    /// JSON network configuration; omitted fields take their defaults
    #[arg(long, env = "RAILWAY_SIM_CONFIG")]
    config: Option<PathBuf>,

    /// Override the RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the tick period (milliseconds)
    #[arg(long = "tick-ms")]
    tick_ms: Option<u64>,

    /// Simulated duration
    #[arg(long = "duration-secs", default_value = "300")]
    duration_secs: u64,

    /// Run on the virtual clock instead of wall-clock time
    #[arg(long = "virtual")]
    virtual_time: bool,

    /// Print the final snapshot as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,railway_control_core_rs=debug"));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn load_config(args: &Args) -> Result<NetworkConfig, String> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
            serde_json::from_str(&text)
                .map_err(|e| format!("cannot parse {}: {}", path.display(), e))?
        }
        None => NetworkConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.rng_seed = seed;
    }
    if let Some(tick_ms) = args.tick_ms {
        config.scheduler.tick_period_ms = tick_ms;
    }
    Ok(config)
}

/// Log new notifications and surface popups that are due.
struct Operator {
    inbox: Receiver<Notification>,
    popups: PopupDelivery,
    last_sample: SimTime,
}

impl Operator {
    fn drain(&mut self) {
        while let Ok(n) = self.inbox.try_recv() {
            info!(
                id = n.id(),
                severity = ?n.severity(),
                kind = ?n.kind(),
                "{}: {}",
                n.title(),
                n.message()
            );
            self.popups.enqueue(&n);
        }
    }

    fn observe(&mut self, network: &Orchestrator) {
        self.drain();
        if let Some(id) = self.popups.poll(network.now(), network.notification_center()) {
            if let Some(n) = network.notification_center().get(&id) {
                info!(pending = self.popups.pending(), "POPUP [{:?}] {}", n.severity(), n.title());
            }
        }
        let metrics = network.current_metrics();
        if metrics.sampled_at > self.last_sample {
            self.last_sample = metrics.sampled_at;
            log_metrics(&metrics);
        }
    }
}

fn log_metrics(m: &ThroughputMetrics) {
    info!(
        "t={}s tph={} speed={:.1}km/h platforms={:.0}% punctual={:.0}% efficiency={:.1} predicted={} bottlenecks={}",
        m.sampled_at / 1_000,
        m.trains_per_hour,
        m.average_speed,
        m.platform_utilization,
        m.punctuality,
        m.efficiency,
        m.predicted_throughput,
        m.bottlenecks.len()
    );
    for suggestion in &m.optimization_suggestions {
        info!("  suggestion: {}", suggestion);
    }
}

fn run_virtual(mut network: Orchestrator, mut operator: Operator, duration_ms: SimTime) -> NetworkSnapshot {
    let step = network.config().scheduler.tick_period_ms;
    while network.now() < duration_ms {
        let target = (network.now() + step).min(duration_ms);
        if let Err(e) = network.advance_to(target) {
            error!(error = %e, "Advance failed");
            break;
        }
        operator.observe(&network);
    }
    network.snapshot()
}

fn run_live(network: Orchestrator, mut operator: Operator, duration: Duration) -> NetworkSnapshot {
    let live = LiveSystem::new(network);
    if let Err(e) = live.start() {
        error!(error = %e, "Could not start scheduler");
        process::exit(1);
    }

    let started = Instant::now();
    while started.elapsed() < duration {
        thread::sleep(Duration::from_millis(250));
        live.with_network(|network| operator.observe(network));
    }

    live.stop();
    live.snapshot().as_ref().clone()
}

fn main() {
    init_logging();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let mut network = match Orchestrator::new(config) {
        Ok(network) => network,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            process::exit(1);
        }
    };

    let (tx, rx) = mpsc::channel();
    network.on_notification(move |n| {
        // The receiver lives until the run ends.
        let _ = tx.send(n.clone());
    });

    let operator = Operator {
        inbox: rx,
        popups: PopupDelivery::new(network.config().alerts.popup_spacing_ms),
        last_sample: 0,
    };

    info!(
        duration_secs = args.duration_secs,
        virtual_time = args.virtual_time,
        "Starting network"
    );

    let snapshot = if args.virtual_time {
        run_virtual(network, operator, args.duration_secs * 1_000)
    } else {
        run_live(network, operator, Duration::from_secs(args.duration_secs))
    };

    info!(
        tick = snapshot.tick,
        notifications = snapshot.notifications.len(),
        passes = snapshot.learning.passes,
        exploration_rate = snapshot.learning.exploration_rate,
        total_reward = snapshot.learning.total_reward,
        "Run finished"
    );

    if args.json {
        match snapshot.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!(error = %e, "Could not serialize snapshot");
                process::exit(1);
            }
        }
    }
}
