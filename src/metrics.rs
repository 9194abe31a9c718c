//! Performance metrics and statistics tracking for profile scoring.

use crate::types::prediction::{DecisionSource, PredictionResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const MAX_SAMPLES: usize = 10_000;
const MAX_MODEL_SAMPLES: usize = 1_000;

/// Metrics collector for the scoring service
pub struct ScoringMetrics {
    /// Profiles that produced a prediction
    pub profiles_scored: AtomicU64,
    /// Profiles labelled fake
    pub fakes_flagged: AtomicU64,
    /// Predictions made with at least one model excluded
    pub degraded_results: AtomicU64,
    /// Predictions decided by a screening rule
    pub screened: AtomicU64,
    /// Requests that failed with a typed error
    pub errors: AtomicU64,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Model inference times (in microseconds)
    model_times: RwLock<HashMap<String, Vec<u64>>>,
    /// Confidence distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
    /// How closely models agree per prediction
    model_agreements: RwLock<Vec<f64>>,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self {
            profiles_scored: AtomicU64::new(0),
            fakes_flagged: AtomicU64::new(0),
            degraded_results: AtomicU64::new(0),
            screened: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            model_times: RwLock::new(HashMap::new()),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
            model_agreements: RwLock::new(Vec::with_capacity(1000)),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, processing_time: Duration, result: &PredictionResult) {
        self.profiles_scored.fetch_add(1, Ordering::Relaxed);
        if result.is_fake() {
            self.fakes_flagged.fetch_add(1, Ordering::Relaxed);
        }
        if result.is_degraded() {
            self.degraded_results.fetch_add(1, Ordering::Relaxed);
        }
        if matches!(result.decided_by, DecisionSource::Screening(_)) {
            self.screened.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            if times.len() > MAX_SAMPLES {
                times.drain(0..MAX_SAMPLES / 2);
            }
        }

        let bucket = ((result.confidence * 10.0) as usize).min(9);
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }

        self.record_model_agreement(&result.per_model_scores);
    }

    /// Record a request that failed
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record model inference time
    pub fn record_model_time(&self, model_id: &str, duration: Duration) {
        if let Ok(mut times) = self.model_times.write() {
            let model_times = times.entry(model_id.to_string()).or_default();
            model_times.push(duration.as_micros() as u64);
            if model_times.len() > MAX_MODEL_SAMPLES {
                model_times.drain(0..MAX_MODEL_SAMPLES / 2);
            }
        }
    }

    /// Record model agreement (1 - std dev of scores)
    fn record_model_agreement(&self, model_scores: &BTreeMap<String, f64>) {
        if model_scores.len() < 2 {
            return;
        }

        let n = model_scores.len() as f64;
        let mean = model_scores.values().sum::<f64>() / n;
        let variance = model_scores
            .values()
            .map(|s| (s - mean).powi(2))
            .sum::<f64>()
            / n;
        let agreement = 1.0 - variance.sqrt().min(1.0);

        if let Ok(mut agreements) = self.model_agreements.write() {
            agreements.push(agreement);
            if agreements.len() > MAX_MODEL_SAMPLES {
                agreements.drain(0..MAX_MODEL_SAMPLES / 2);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted = times.clone();
        sorted.sort_unstable();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sorted.iter().sum::<u64>() / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[percentile_index(count, 0.95)],
            p99_us: sorted[percentile_index(count, 0.99)],
            max_us: sorted[count - 1],
        }
    }

    /// Get model performance stats
    pub fn get_model_stats(&self) -> BTreeMap<String, ModelStats> {
        let Ok(times) = self.model_times.read() else {
            return BTreeMap::new();
        };

        times
            .iter()
            .filter(|(_, t)| !t.is_empty())
            .map(|(model, model_times)| {
                let mut sorted = model_times.clone();
                sorted.sort_unstable();
                let count = sorted.len();
                (
                    model.clone(),
                    ModelStats {
                        calls: count as u64,
                        mean_us: sorted.iter().sum::<u64>() / count as u64,
                        p50_us: sorted[count / 2],
                        p99_us: sorted[percentile_index(count, 0.99)],
                    },
                )
            })
            .collect()
    }

    /// Get average model agreement
    pub fn get_avg_agreement(&self) -> f64 {
        match self.model_agreements.read() {
            Ok(agreements) if !agreements.is_empty() => {
                agreements.iter().sum::<f64>() / agreements.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Get current throughput (profiles per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.profiles_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let scored = self.profiles_scored.load(Ordering::Relaxed);
        let fakes = self.fakes_flagged.load(Ordering::Relaxed);
        let degraded = self.degraded_results.load(Ordering::Relaxed);
        let screened = self.screened.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let fake_rate = if scored > 0 {
            fakes as f64 / scored as f64 * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();

        info!(
            scored,
            fakes,
            fake_rate = format!("{:.1}%", fake_rate),
            degraded,
            screened,
            errors,
            throughput = format!("{:.1} profiles/s", self.get_throughput()),
            "Scoring summary"
        );
        info!(
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            max_us = processing.max_us,
            agreement = format!("{:.1}%", self.get_avg_agreement() * 100.0),
            "Processing latency"
        );

        let dist = self.get_score_distribution();
        let total: u64 = dist.iter().sum();
        for (i, &count) in dist.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let pct = count as f64 / total as f64 * 100.0;
            info!(
                "  confidence {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                "█".repeat(((pct / 2.0) as usize).min(50))
            );
        }

        for (model, stats) in self.get_model_stats() {
            info!(
                model = %model,
                calls = stats.calls,
                mean_us = stats.mean_us,
                p50_us = stats.p50_us,
                p99_us = stats.p99_us,
                "Model inference time"
            );
        }
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn percentile_index(count: usize, q: f64) -> usize {
    ((count as f64 * q) as usize).min(count - 1)
}

/// Processing time statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Model-specific statistics
#[derive(Debug, Clone, PartialEq)]
pub struct ModelStats {
    pub calls: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
}

/// Periodically logs a metrics summary
pub struct MetricsReporter {
    metrics: Arc<ScoringMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ScoringMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs: interval_secs.max(1),
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
