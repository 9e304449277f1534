//! Operational metrics for batch scoring runs.

use crate::types::{Decision, PredictionResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Total applications scored
    pub predictions_scored: AtomicU64,
    /// Applications that failed to score or parse
    pub failures: AtomicU64,
    approved: AtomicU64,
    reviewed: AtomicU64,
    rejected: AtomicU64,
    fico_warnings: AtomicU64,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// PD score distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            predictions_scored: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            approved: AtomicU64::new(0),
            reviewed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            fico_warnings: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a scored application
    pub fn record_prediction(&self, processing_time: Duration, result: &PredictionResult) {
        self.predictions_scored.fetch_add(1, Ordering::Relaxed);

        let counter = match result.decision {
            Decision::Approve => &self.approved,
            Decision::Review => &self.reviewed,
            Decision::Reject => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if result.fico_warning {
            self.fico_warnings.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let bucket = ((result.pd_score * 10.0) as usize).min(9);
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record an application that could not be scored
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted: Vec<u64> = match self.processing_times.read() {
            Ok(times) => times.clone(),
            Err(_) => return ProcessingStats::default(),
        };
        if sorted.is_empty() {
            return ProcessingStats::default();
        }
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: sorted[count - 1],
        }
    }

    /// Decision counts and approval rate
    pub fn decision_stats(&self) -> DecisionStats {
        let approved = self.approved.load(Ordering::Relaxed);
        let review = self.reviewed.load(Ordering::Relaxed);
        let rejected = self.rejected.load(Ordering::Relaxed);
        let total = approved + review + rejected;

        let approval_rate = if total > 0 {
            (approved as f64 * 10000.0 / total as f64).round() / 100.0
        } else {
            0.0
        };

        DecisionStats {
            total,
            approved,
            review,
            rejected,
            fico_warnings: self.fico_warnings.load(Ordering::Relaxed),
            approval_rate,
        }
    }

    /// Get current throughput (applications per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get score distribution
    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let failures = self.failures.load(Ordering::Relaxed);
        let decisions = self.decision_stats();
        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let score_dist = self.get_score_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            LOAN RISK PIPELINE - SCORING SUMMARY              ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Applications Scored: {:>8}  │  Throughput: {:>8.1} app/s ║",
            decisions.total, throughput
        );
        info!(
            "║ Failures:            {:>8}  │  FICO Warnings: {:>8}     ║",
            failures, decisions.fico_warnings
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Approve: {:>6}  Review: {:>6}  Reject: {:>6}  Rate: {:>6.2}% ║",
            decisions.approved, decisions.review, decisions.rejected, decisions.approval_rate
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ PD Score Distribution:                                       ║");
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar_len = (pct / 2.0) as usize;
            let bar: String = "█".repeat(bar_len.min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Decision counts over a run
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionStats {
    pub total: u64,
    pub approved: u64,
    pub review: u64,
    pub rejected: u64,
    pub fico_warnings: u64,
    /// Percentage of approvals, rounded to two decimals
    pub approval_rate: f64,
}
