//! Throughput metrics
//!
//! Read-only view over the network, sampled on its own (longer) cadence.
//! Each sample records one [`SectionSample`] per block between consecutive
//! signals into a bounded history and recomputes the headline
//! [`ThroughputMetrics`], bottleneck flags and suggestions.
//!
//! Headline figures describe the network at the sampling instant. Bottlenecks
//! and the rolling throughput look back over the last `window_samples`
//! samples: a block is flagged while its worst utilization or slowest
//! occupied speed inside the window crosses a threshold.

use crate::core::time::SimTime;
use crate::models::{NetworkState, PlatformStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Section samples kept across all sections
    pub history_limit: usize,
    /// Sampling instants the rolling window spans
    pub window_samples: usize,
    /// Trains a section holds at 100% utilization
    pub section_capacity: u32,
    /// Active trains × this = trains per hour
    pub trains_per_hour_factor: u32,
    pub bottleneck_utilization: f64,
    pub bottleneck_speed_kmh: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            history_limit: 500,
            window_samples: 5,
            section_capacity: 2,
            trains_per_hour_factor: 12,
            bottleneck_utilization: 85.0,
            bottleneck_speed_kmh: 70.0,
        }
    }
}

/// One section at one sampling instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSample {
    pub sampled_at: SimTime,
    pub section_id: String,
    pub train_count: u32,
    /// Mean speed of trains in the section; 0 when empty
    pub average_speed: f64,
    pub capacity: u32,
    pub utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThroughputMetrics {
    pub sampled_at: SimTime,
    pub trains_per_hour: u32,
    /// km/h over trains that have not departed
    pub average_speed: f64,
    /// Percentage of platforms Occupied
    pub platform_utilization: f64,
    /// Percentage of active trains with delay ≤ 0
    pub punctuality: f64,
    pub total_passengers: u64,
    /// [0, 100]
    pub efficiency: f64,
    pub predicted_throughput: u32,
    /// Mean trains per block over the window, scaled to an hour
    #[serde(default)]
    pub rolling_trains_per_hour: u32,
    pub bottlenecks: Vec<String>,
    pub optimization_suggestions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    config: MetricsConfig,
    history: VecDeque<SectionSample>,
    current: ThroughputMetrics,
    samples_taken: u64,
}

impl MetricsAggregator {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
            current: ThroughputMetrics::default(),
            samples_taken: 0,
        }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Latest metrics; all zero until the first sample.
    pub fn current(&self) -> &ThroughputMetrics {
        &self.current
    }

    pub fn history(&self) -> impl Iterator<Item = &SectionSample> {
        self.history.iter()
    }

    pub fn samples_taken(&self) -> u64 {
        self.samples_taken
    }

    /// Take a sample of `state` at `now`.
    pub fn sample(&mut self, state: &NetworkState, line_length_m: f64, now: SimTime) -> ThroughputMetrics {
        let sections = self.sample_sections(state, line_length_m, now);
        for section in sections {
            if self.history.len() == self.config.history_limit.max(1) {
                self.history.pop_front();
            }
            self.history.push_back(section);
        }

        let active: Vec<_> = state.active_trains().collect();
        let trains_per_hour = active.len() as u32 * self.config.trains_per_hour_factor;
        let average_speed = if active.is_empty() {
            0.0
        } else {
            active.iter().map(|t| t.speed()).sum::<f64>() / active.len() as f64
        };
        let platform_utilization = if state.num_platforms() == 0 {
            0.0
        } else {
            let occupied = state
                .platforms()
                .iter()
                .filter(|p| p.status() == PlatformStatus::Occupied)
                .count();
            occupied as f64 / state.num_platforms() as f64 * 100.0
        };
        let punctuality = if active.is_empty() {
            100.0
        } else {
            active.iter().filter(|t| t.is_punctual()).count() as f64 / active.len() as f64 * 100.0
        };
        let total_passengers = active.iter().map(|t| t.passengers() as u64).sum();

        let speed_pct = average_speed.min(100.0);
        let efficiency = (0.6 * speed_pct + 0.4 * (100.0 - platform_utilization)).clamp(0.0, 100.0);
        let predicted_throughput = (trains_per_hour as f64 * efficiency / 100.0 * 1.1).floor() as u32;

        let window = self.window();
        let rolling_trains_per_hour = if window.is_empty() {
            0
        } else {
            let trains: u32 = window.iter().map(|s| s.train_count).sum();
            (trains as f64 / window.len() as f64 * self.config.trains_per_hour_factor as f64).floor() as u32
        };
        let bottlenecks = self.bottlenecks(&window);

        let mut metrics = ThroughputMetrics {
            sampled_at: now,
            trains_per_hour,
            average_speed,
            platform_utilization,
            punctuality,
            total_passengers,
            efficiency,
            predicted_throughput,
            rolling_trains_per_hour,
            bottlenecks,
            optimization_suggestions: Vec::new(),
        };
        metrics.optimization_suggestions = suggestions(&metrics);

        self.samples_taken += 1;
        self.current = metrics.clone();
        metrics
    }

    /// Trains per block. Blocks run from each signal to the next one along
    /// the line; the last block wraps back to the first signal.
    fn sample_sections(&self, state: &NetworkState, line_length_m: f64, now: SimTime) -> Vec<SectionSample> {
        let mut bounds: Vec<f64> = state.signals().iter().map(|s| s.position_m()).collect();
        bounds.sort_by(|a, b| a.total_cmp(b));
        if bounds.is_empty() {
            bounds.push(0.0);
        }

        let capacity = self.config.section_capacity.max(1);
        let mut counts = vec![(0u32, 0.0f64); bounds.len()];
        for train in state.active_trains() {
            let index = section_index(&bounds, train.position_m(), line_length_m);
            counts[index].0 += 1;
            counts[index].1 += train.speed();
        }

        counts
            .into_iter()
            .enumerate()
            .map(|(i, (count, speed_sum))| SectionSample {
                sampled_at: now,
                section_id: format!("SEC-{:03}", i + 1),
                train_count: count,
                average_speed: if count == 0 { 0.0 } else { speed_sum / count as f64 },
                capacity,
                utilization: count as f64 / capacity as f64 * 100.0,
            })
            .collect()
    }

    /// Section records from the last `window_samples` sampling instants,
    /// oldest first.
    fn window(&self) -> Vec<&SectionSample> {
        let mut instants = 0;
        let mut last_at = None;
        let mut window: Vec<&SectionSample> = self
            .history
            .iter()
            .rev()
            .take_while(|s| {
                if last_at != Some(s.sampled_at) {
                    last_at = Some(s.sampled_at);
                    instants += 1;
                }
                instants <= self.config.window_samples.max(1)
            })
            .collect();
        window.reverse();
        window
    }

    /// Per block, the peak utilization and the lowest occupied speed seen in
    /// the window. Blocks are reported in id order.
    fn bottlenecks(&self, window: &[&SectionSample]) -> Vec<String> {
        let mut worst: BTreeMap<&str, (f64, Option<f64>)> = BTreeMap::new();
        for sample in window {
            let entry = worst.entry(sample.section_id.as_str()).or_insert((0.0, None));
            entry.0 = entry.0.max(sample.utilization);
            if sample.train_count > 0 {
                entry.1 = Some(entry.1.map_or(sample.average_speed, |s| s.min(sample.average_speed)));
            }
        }

        let mut flagged = Vec::new();
        for (section_id, (utilization, slowest)) in worst {
            if utilization > self.config.bottleneck_utilization {
                flagged.push(format!(
                    "{}: High capacity utilization ({}%)",
                    section_id,
                    utilization.floor()
                ));
            }
            if let Some(speed) = slowest.filter(|s| *s < self.config.bottleneck_speed_kmh) {
                flagged.push(format!(
                    "{}: Low average speed ({} km/h)",
                    section_id,
                    speed.floor()
                ));
            }
        }
        flagged
    }
}

/// Index of the block containing `position`. `bounds` is sorted and non-empty.
fn section_index(bounds: &[f64], position: f64, line_length_m: f64) -> usize {
    let position = if line_length_m > 0.0 {
        position.rem_euclid(line_length_m)
    } else {
        position
    };
    // Before the first signal means the wrapped tail of the last block.
    match bounds.iter().rposition(|b| *b <= position) {
        Some(i) => i,
        None if line_length_m > 0.0 => bounds.len() - 1,
        None => 0,
    }
}

fn suggestions(metrics: &ThroughputMetrics) -> Vec<String> {
    let mut out = Vec::new();
    if metrics.platform_utilization > 80.0 {
        out.push("Consider dynamic platform reallocation to reduce congestion");
    }
    if metrics.average_speed < 75.0 {
        out.push("Optimize signal timing to improve train flow speed");
    }
    if metrics.efficiency < 70.0 {
        out.push("Improve scheduling to raise overall efficiency");
    }
    if metrics.bottlenecks.len() > 2 {
        out.push("Deploy additional resources to high-congestion sections");
    }
    if metrics.trains_per_hour < 80 {
        out.push("Increase train frequency during peak hours");
    }
    out.into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Platform, Signal, Train, TrainStatus};

    fn station() -> NetworkState {
        NetworkState::new(
            vec![
                Signal::new("SIG-1", "A", 0.0),
                Signal::new("SIG-2", "B", 1_000.0),
            ],
            vec![
                Platform::new("P1", 200).occupied_by("T1", 150, None),
                Platform::new("P2", 200),
            ],
            vec![
                Train::new("T1", "One")
                    .with_status(TrainStatus::OnTime)
                    .with_passengers(150)
                    .with_position(200.0)
                    .at_platform("P1"),
                Train::new("T2", "Two")
                    .with_speed(90.0)
                    .with_passengers(100)
                    .with_position(1_200.0),
                Train::new("T3", "Three")
                    .with_status(TrainStatus::Departed)
                    .with_speed(100.0)
                    .with_position(1_500.0),
            ],
        )
    }

    #[test]
    fn test_headline_figures() {
        let mut aggregator = MetricsAggregator::new(MetricsConfig::default());
        let metrics = aggregator.sample(&station(), 5_000.0, 30_000);

        assert_eq!(metrics.trains_per_hour, 24);
        assert_eq!(metrics.average_speed, 45.0);
        assert_eq!(metrics.platform_utilization, 50.0);
        assert_eq!(metrics.punctuality, 100.0);
        assert_eq!(metrics.total_passengers, 250);
        // 0.6 * 45 + 0.4 * 50
        assert!((metrics.efficiency - 47.0).abs() < 1e-9);
        // floor(24 * 0.47 * 1.1) = floor(12.408)
        assert_eq!(metrics.predicted_throughput, 12);
        assert_eq!(aggregator.current(), &metrics);
    }

    #[test]
    fn test_sections_and_bottlenecks() {
        let mut aggregator = MetricsAggregator::new(MetricsConfig::default());
        let metrics = aggregator.sample(&station(), 5_000.0, 30_000);

        let sections: Vec<_> = aggregator.history().cloned().collect();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].train_count, 1);
        assert_eq!(sections[1].train_count, 1);
        assert_eq!(sections[1].utilization, 50.0);
        // T1 stands still in SEC-001
        assert_eq!(metrics.bottlenecks, vec!["SEC-001: Low average speed (0 km/h)"]);
    }

    #[test]
    fn test_suggestion_rules() {
        let mut aggregator = MetricsAggregator::new(MetricsConfig::default());
        let metrics = aggregator.sample(&station(), 5_000.0, 0);
        assert_eq!(
            metrics.optimization_suggestions,
            vec![
                "Optimize signal timing to improve train flow speed",
                "Improve scheduling to raise overall efficiency",
                "Increase train frequency during peak hours",
            ]
        );
    }

    #[test]
    fn test_history_is_bounded() {
        let mut aggregator = MetricsAggregator::new(MetricsConfig {
            history_limit: 5,
            ..MetricsConfig::default()
        });
        for i in 0..4 {
            aggregator.sample(&station(), 5_000.0, i * 30_000);
        }
        assert_eq!(aggregator.history().count(), 5);
        assert_eq!(aggregator.samples_taken(), 4);
        assert_eq!(aggregator.history().next().unwrap().sampled_at, 30_000);
    }

    #[test]
    fn test_window_spans_recent_instants_only() {
        let mut aggregator = MetricsAggregator::new(MetricsConfig {
            window_samples: 2,
            ..MetricsConfig::default()
        });
        for i in 0..4 {
            aggregator.sample(&station(), 5_000.0, i * 30_000);
        }
        let window = aggregator.window();
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].sampled_at, 60_000);
        assert_eq!(window[3].sampled_at, 90_000);
        // One train per block on every sample
        assert_eq!(aggregator.current().rolling_trains_per_hour, 12);
    }

    #[test]
    fn test_wrapped_position_lands_in_last_block() {
        assert_eq!(section_index(&[500.0, 2_000.0], 100.0, 5_000.0), 1);
        assert_eq!(section_index(&[500.0, 2_000.0], 600.0, 5_000.0), 0);
        assert_eq!(section_index(&[500.0, 2_000.0], 100.0, 0.0), 0);
    }
}
