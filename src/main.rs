//! Fake Profile Detector - NATS worker
//!
//! Consumes score requests from NATS, runs the model ensemble, and publishes
//! a report for every request. Requests are scored concurrently up to the
//! configured worker count.

use anyhow::{Context, Result};
use fake_profile_detector::{
    config::{AppConfig, LoggingConfig},
    consumer::ProfileRequestConsumer,
    error::ScoringError,
    metrics::{MetricsReporter, ScoringMetrics},
    producer::ReportProducer,
    service::ProfileScoringService,
    types::{PredictionResult, ReportError, ScoreReport, ScoreRequest},
};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("fake_profile_detector={}", logging.level).parse()?);

    if logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }
    Ok(())
}

/// Best-effort correlation id from a payload that failed to decode
fn request_id_hint(payload: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(payload)
        .ok()
        .and_then(|v| v.get("request_id")?.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Turn the outcome of a blocking scoring task into the report to publish.
///
/// Every outcome yields a report, so callers waiting on a reply inbox always
/// get an answer.
fn report_for_outcome(
    request_id: String,
    outcome: Result<Result<PredictionResult, ScoringError>, JoinError>,
    processing_time: Duration,
    metrics: &ScoringMetrics,
) -> ScoreReport {
    match outcome {
        Ok(Ok(result)) => {
            metrics.record_prediction(processing_time, &result);

            if result.is_degraded() {
                warn!(
                    request_id = %request_id,
                    excluded = ?result.excluded,
                    "Scored with degraded ensemble"
                );
            }
            debug!(
                request_id = %request_id,
                label = %result.label,
                confidence = result.confidence,
                processing_time_us = processing_time.as_micros(),
                "Profile scored"
            );
            ScoreReport::scored(request_id, result)
        }
        Ok(Err(e)) => {
            metrics.record_error();
            warn!(request_id = %request_id, error = %e, "Profile could not be scored");
            ScoreReport::failed(request_id, ReportError::from(&e))
        }
        Err(e) => {
            metrics.record_error();
            error!(request_id = %request_id, error = %e, "Scoring task failed");
            ScoreReport::failed(
                request_id,
                ReportError::internal("profile scoring failed inside the worker"),
            )
        }
    }
}

/// Wait until every spawned request has released its permit
async fn wait_for_in_flight(semaphore: &Semaphore, permits: u32) -> Result<SemaphorePermit<'_>> {
    Ok(semaphore.acquire_many(permits).await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/config.toml".to_string());
    let config = AppConfig::load_from_path(&config_path)
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    init_logging(&config.logging)?;
    info!(config = %config_path, "Starting Fake Profile Detector");

    let metrics = Arc::new(ScoringMetrics::new());

    let service = Arc::new(ProfileScoringService::from_config(&config)?.with_metrics(metrics.clone()));
    info!(
        features = service.codec().feature_count(),
        default_models = ?service.ensemble().default_models(),
        policy = ?config.models.policy,
        threshold = service.ensemble().threshold(),
        "Scoring service initialized"
    );

    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!(url = %config.nats.url, "Connected to NATS");

    let consumer = ProfileRequestConsumer::new(client.clone(), &config.nats.request_subject)
        .with_queue_group(config.nats.queue_group.clone());
    let producer = Arc::new(ReportProducer::new(client.clone(), &config.nats.verdict_subject));

    let num_workers = config.pipeline.workers.max(1);
    info!(
        workers = num_workers,
        requests = %consumer.subject(),
        verdicts = %producer.subject(),
        "Starting request processing loop"
    );

    // Limits concurrent scoring tasks; holding every permit means none are in flight
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let all_permits = u32::try_from(num_workers).context("pipeline.workers is too large")?;
    let processed_count = Arc::new(AtomicU64::new(0));

    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let mut subscription = consumer.subscribe().await?;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let message = tokio::select! {
            message = subscription.next() => match message {
                Some(message) => message,
                None => break,
            },
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        };

        let permit = semaphore.clone().acquire_owned().await?;

        let service = service.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();
            let reply = message.reply.as_ref().map(|s| s.to_string());

            let report = match serde_json::from_slice::<ScoreRequest>(&message.payload) {
                Ok(request) => {
                    let request_id = request.request_id.clone();
                    // Model loads block on the registry, keep them off the async workers
                    let outcome = tokio::task::spawn_blocking(move || {
                        service.score(&request.profile, request.models.as_deref())
                    })
                    .await;

                    report_for_outcome(request_id, outcome, start_time.elapsed(), &metrics)
                }
                Err(e) => {
                    metrics.record_error();
                    warn!(error = %e, "Failed to deserialize score request");
                    ScoreReport::failed(
                        request_id_hint(&message.payload),
                        ReportError::malformed(e.to_string()),
                    )
                }
            };

            let report = report.with_processing_time(start_time.elapsed().as_micros() as u64);
            if let Err(e) = producer.publish(&report, reply.as_deref()).await {
                error!(
                    request_id = %report.request_id,
                    error = %e,
                    "Failed to publish score report"
                );
            }

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 {
                let processing_stats = metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} profiles/s", metrics.get_throughput()),
                    avg_latency_us = processing_stats.mean_us,
                    "Processing milestone"
                );
            }

            drop(permit);
        });
    }

    info!(
        in_flight = num_workers - semaphore.available_permits(),
        "Worker shutting down, waiting for in-flight requests"
    );
    let _drained = wait_for_in_flight(&semaphore, all_permits).await?;

    if let Err(e) = client.flush().await {
        warn!(error = %e, "Failed to flush NATS connection");
    }
    metrics.print_summary();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake_profile_detector::error::{EnsembleError, SchemaError};
    use fake_profile_detector::types::ReportErrorKind;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn test_panicked_scoring_task_still_reports() {
        let metrics = ScoringMetrics::new();
        let join_error = tokio::task::spawn_blocking(|| -> Result<PredictionResult, ScoringError> {
            panic!("model blew up")
        })
        .await
        .unwrap_err();

        let report = report_for_outcome("r-9".to_string(), Err(join_error), Duration::ZERO, &metrics);

        assert_eq!(report.request_id, "r-9");
        assert!(report.result.is_none());
        assert_eq!(report.error.unwrap().kind, ReportErrorKind::Internal);
        assert_eq!(metrics.errors.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_scoring_errors_keep_their_kind() {
        let metrics = ScoringMetrics::new();

        let schema = report_for_outcome(
            "r-1".to_string(),
            Ok(Err(ScoringError::Schema(SchemaError::new("followers_count", "cannot be negative")))),
            Duration::ZERO,
            &metrics,
        );
        let ensemble = report_for_outcome(
            "r-2".to_string(),
            Ok(Err(ScoringError::Ensemble(EnsembleError::EmptySelection))),
            Duration::ZERO,
            &metrics,
        );

        assert_eq!(schema.error.unwrap().kind, ReportErrorKind::Schema);
        assert_eq!(ensemble.error.unwrap().kind, ReportErrorKind::Ensemble);
        assert_eq!(metrics.errors.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_requests() {
        let semaphore = Arc::new(Semaphore::new(2));
        let finished = Arc::new(AtomicBool::new(false));

        let permit = semaphore.clone().acquire_owned().await.unwrap();
        let flag = finished.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
            drop(permit);
        });

        let _drained = wait_for_in_flight(&semaphore, 2).await.unwrap();
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(semaphore.available_permits(), 0);
    }
}
