//! Counters and latency statistics for the scoring loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

const LATENCY_WINDOW: usize = 10_000;

/// Metrics collector shared by scoring tasks
pub struct ScoringMetrics {
    /// Donations scored successfully
    pub predictions: AtomicU64,
    /// Scored donations flagged as fraud
    pub flagged: AtomicU64,
    /// Payloads rejected by validation
    pub rejected: AtomicU64,
    /// Load or inference failures
    pub failed: AtomicU64,
    /// Recent scoring latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    start_time: Instant,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self {
            predictions: AtomicU64::new(0),
            flagged: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a scored donation
    pub fn record_prediction(&self, latency: Duration, is_fraud: bool) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        if is_fraud {
            self.flagged.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut latencies) = self.latencies.write() {
            latencies.push(latency.as_micros() as u64);
            // Keep only the most recent half once the window fills
            if latencies.len() > LATENCY_WINDOW {
                latencies.drain(0..LATENCY_WINDOW / 2);
            }
        }
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Latency statistics over the recent window
    pub fn latency_stats(&self) -> LatencyStats {
        let sorted = match self.latencies.read() {
            Ok(latencies) if !latencies.is_empty() => {
                let mut sorted = latencies.clone();
                sorted.sort_unstable();
                sorted
            }
            _ => return LatencyStats::default(),
        };

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[((count as f64 * 0.95) as usize).min(count - 1)],
            p99_us: sorted[((count as f64 * 0.99) as usize).min(count - 1)],
            max_us: sorted[count - 1],
        }
    }

    /// Scored donations per second since start
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        let predictions = self.predictions.load(Ordering::Relaxed);
        let flagged = self.flagged.load(Ordering::Relaxed);
        let flag_rate = if predictions > 0 {
            (flagged as f64 / predictions as f64) * 100.0
        } else {
            0.0
        };
        let latency = self.latency_stats();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            DONATION FRAUD SCORING - METRICS SUMMARY          ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Donations Scored:  {:>8}  │  Throughput: {:>8.1} don/s  ║",
            predictions,
            self.throughput()
        );
        info!(
            "║ Flagged as Fraud:  {:>8}  │  Flag Rate:  {:>8.1}%       ║",
            flagged, flag_rate
        );
        info!(
            "║ Rejected Payloads: {:>8}  │  Failures:   {:>8}        ║",
            self.rejected.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed)
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Latency (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6}     ║",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us
        );
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoring latency statistics
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = ScoringMetrics::new();

        metrics.record_prediction(Duration::from_micros(100), false);
        metrics.record_prediction(Duration::from_micros(300), true);
        metrics.record_rejected();
        metrics.record_failure();

        assert_eq!(metrics.predictions.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.flagged.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.rejected.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.failed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_latency_stats() {
        let metrics = ScoringMetrics::new();
        for us in 1..=100 {
            metrics.record_prediction(Duration::from_micros(us), false);
        }

        let stats = metrics.latency_stats();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.mean_us, 50);
        assert_eq!(stats.p50_us, 51);
        assert_eq!(stats.p99_us, 100);
        assert_eq!(stats.max_us, 100);
    }

    #[test]
    fn test_empty_stats() {
        assert_eq!(ScoringMetrics::new().latency_stats(), LatencyStats::default());
    }
}
