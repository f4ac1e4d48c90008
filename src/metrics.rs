//! Prometheus metrics collection for quotaroute
//!
//! Tracks completion outcomes per provider, failovers, candidate
//! exhaustion and the health of the bookkeeping paths (health tracking and
//! state persistence). Exposed via the status server's `/metrics` endpoint.

use crate::error::ErrorClass;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Outcome label for a single adapter attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(ErrorClass),
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure(class) => class.as_str(),
        }
    }
}

/// Metrics collector
///
/// Provider labels are bounded by the configured registry, outcome labels by
/// the error taxonomy.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    attempts_total: IntCounterVec,
    attempt_duration: HistogramVec,
    failovers_total: IntCounterVec,
    no_candidates_total: IntCounterVec,
    health_tracking_failures: IntCounterVec,
    persistence_failures: IntCounterVec,
    metrics_recording_failures: IntCounterVec,
}

impl Metrics {
    /// Create a new Metrics instance registered with a fresh registry
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let attempts_total = IntCounterVec::new(
            Opts::new(
                "quotaroute_attempts_total",
                "Adapter attempts by provider and outcome (success or error class)",
            ),
            &["provider", "outcome"],
        )?;

        let attempt_duration = HistogramVec::new(
            HistogramOpts::new(
                "quotaroute_attempt_duration_ms",
                "Adapter call latency in milliseconds, including in-adapter retries",
            )
            .buckets(vec![
                50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0, 60000.0,
            ]),
            &["provider"],
        )?;

        let failovers_total = IntCounterVec::new(
            Opts::new(
                "quotaroute_failovers_total",
                "Times the router moved on to the next candidate, by intent",
            ),
            &["intent"],
        )?;

        // Intent labels come from callers; unknown intents are folded to
        // "chat" before recording, so cardinality stays bounded by the matrix.
        let no_candidates_total = IntCounterVec::new(
            Opts::new(
                "quotaroute_no_candidates_total",
                "Completions rejected because no provider offered the intent's capabilities",
            ),
            &["intent"],
        )?;

        let health_tracking_failures = IntCounterVec::new(
            Opts::new(
                "quotaroute_health_tracking_failures_total",
                "Health tracker updates that failed (unknown provider/model) by provider and error type",
            ),
            &["provider", "error_type"],
        )?;

        let persistence_failures = IntCounterVec::new(
            Opts::new(
                "quotaroute_persistence_failures_total",
                "Failed reads or writes of advisory state files, by store and operation",
            ),
            &["store", "operation"],
        )?;

        let metrics_recording_failures = IntCounterVec::new(
            Opts::new(
                "quotaroute_metrics_recording_failures_total",
                "Metric recording operations that failed, by operation",
            ),
            &["operation"],
        )?;

        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(attempt_duration.clone()))?;
        registry.register(Box::new(failovers_total.clone()))?;
        registry.register(Box::new(no_candidates_total.clone()))?;
        registry.register(Box::new(health_tracking_failures.clone()))?;
        registry.register(Box::new(persistence_failures.clone()))?;
        registry.register(Box::new(metrics_recording_failures.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            attempts_total,
            attempt_duration,
            failovers_total,
            no_candidates_total,
            health_tracking_failures,
            persistence_failures,
            metrics_recording_failures,
        })
    }

    /// Record one adapter attempt and its latency
    ///
    /// # Errors
    ///
    /// Returns an error if the latency is not a finite non-negative number or
    /// the label set is rejected.
    pub fn record_attempt(
        &self,
        provider: &str,
        outcome: Outcome,
        duration_ms: f64,
    ) -> Result<(), prometheus::Error> {
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            return Err(prometheus::Error::Msg(format!(
                "Histogram value must be finite and non-negative, got: {}",
                duration_ms
            )));
        }

        self.attempts_total
            .get_metric_with_label_values(&[provider, outcome.as_str()])?
            .inc();
        self.attempt_duration
            .get_metric_with_label_values(&[provider])?
            .observe(duration_ms);
        Ok(())
    }

    pub fn record_failover(&self, intent: &str) -> Result<(), prometheus::Error> {
        self.failovers_total
            .get_metric_with_label_values(&[intent])?
            .inc();
        Ok(())
    }

    pub fn record_no_candidates(&self, intent: &str) -> Result<(), prometheus::Error> {
        self.no_candidates_total
            .get_metric_with_label_values(&[intent])?
            .inc();
        Ok(())
    }

    /// Record a failed health tracker update
    pub fn health_tracking_failure(&self, provider: &str, error_type: &str) {
        match self
            .health_tracking_failures
            .get_metric_with_label_values(&[provider, error_type])
        {
            Ok(counter) => counter.inc(),
            Err(e) => tracing::error!(
                provider = %provider,
                error_type = %error_type,
                error = %e,
                "Failed to record health tracking failure metric"
            ),
        }
    }

    /// Total health tracking failures across all labels
    pub fn health_tracking_failures_count(&self) -> u64 {
        self.sum_counter("quotaroute_health_tracking_failures_total")
    }

    /// Record a failed state file read or write
    pub fn persistence_failure(&self, store: &str, operation: &str) {
        match self
            .persistence_failures
            .get_metric_with_label_values(&[store, operation])
        {
            Ok(counter) => counter.inc(),
            Err(e) => tracing::error!(
                store = %store,
                operation = %operation,
                error = %e,
                "Failed to record persistence failure metric"
            ),
        }
    }

    pub fn persistence_failures_count(&self) -> u64 {
        self.sum_counter("quotaroute_persistence_failures_total")
    }

    /// Sum a counter family across all of its label values
    fn sum_counter(&self, name: &str) -> u64 {
        self.registry
            .gather()
            .iter()
            .find(|mf| mf.name() == name)
            .map(|mf| {
                mf.get_metric()
                    .iter()
                    .map(|m| m.counter.value.unwrap_or(0.0) as u64)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Record that another metric operation failed
    pub fn metrics_recording_failure(&self, operation: &str) {
        if let Ok(counter) = self
            .metrics_recording_failures
            .get_metric_with_label_values(&[operation])
        {
            counter.inc();
        }
    }

    /// Number of recorded attempts for a provider/outcome pair
    pub fn attempts(&self, provider: &str, outcome: Outcome) -> u64 {
        self.attempts_total
            .get_metric_with_label_values(&[provider, outcome.as_str()])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    /// Encode all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| prometheus::Error::Msg(format!("Metrics are not valid UTF-8: {}", e)))
    }
}
