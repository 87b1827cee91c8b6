//! Poll-tick metrics
//!
//! Keeps a rolling window of tick latencies plus lifetime counters of how
//! each tick ended (applied, discarded as superseded, failed).

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of latency samples kept
const MAX_SAMPLES: usize = 100;

/// How a poll tick ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Snapshot replaced the previous one
    Applied,
    /// Response arrived after its request was superseded
    Discarded,
    /// Fetch failed; previous snapshot kept
    Failed,
}

/// Point-in-time view of the poller's metrics
#[derive(Debug, Clone, PartialEq)]
pub struct PollMetrics {
    /// Name of the upstream provider
    pub provider_name: String,
    /// 50th percentile latency of successful fetches in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful fetches in milliseconds
    pub latency_p99_ms: f64,
    /// Share of ticks that did not fail (0.0 to 1.0)
    pub success_rate: f64,
    pub total_ticks: u64,
    pub applied_ticks: u64,
    pub discarded_ticks: u64,
    pub failed_ticks: u64,
}

impl PollMetrics {
    /// Metrics before the first tick
    pub fn empty(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_ticks: 0,
            applied_ticks: 0,
            discarded_ticks: 0,
            failed_ticks: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    applied: u64,
    discarded: u64,
    failed: u64,
}

/// Collects per-tick samples for one poller
pub struct MetricsCollector {
    provider_name: String,
    latencies_ms: RwLock<VecDeque<f64>>,
    counters: RwLock<Counters>,
}

impl MetricsCollector {
    pub fn new(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            latencies_ms: RwLock::new(VecDeque::with_capacity(MAX_SAMPLES)),
            counters: RwLock::new(Counters::default()),
        }
    }

    /// Records how a tick ended and how long its fetch took
    pub async fn record(&self, duration: Duration, outcome: PollOutcome) {
        {
            let mut counters = self.counters.write().await;
            match outcome {
                PollOutcome::Applied => counters.applied += 1,
                PollOutcome::Discarded => counters.discarded += 1,
                PollOutcome::Failed => counters.failed += 1,
            }
        }

        if outcome != PollOutcome::Failed {
            let mut samples = self.latencies_ms.write().await;
            if samples.len() >= MAX_SAMPLES {
                samples.pop_front();
            }
            samples.push_back(duration.as_secs_f64() * 1000.0);
        }
    }

    /// Computes current metrics
    pub async fn snapshot(&self) -> PollMetrics {
        let counters = self.counters.read().await;
        let total = counters.applied + counters.discarded + counters.failed;
        if total == 0 {
            return PollMetrics::empty(&self.provider_name);
        }

        let mut latencies: Vec<f64> = self.latencies_ms.read().await.iter().copied().collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        PollMetrics {
            provider_name: self.provider_name.clone(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate: (total - counters.failed) as f64 / total as f64,
            total_ticks: total,
            applied_ticks: counters.applied,
            discarded_ticks: counters.discarded,
            failed_ticks: counters.failed,
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
