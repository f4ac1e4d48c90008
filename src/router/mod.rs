//! Request routing with sequential failover
//!
//! The router asks the selector for ranked candidates, tries them strictly
//! one after another, and feeds every outcome back into the health tracker.
//! It is the only component that updates health or decides on failover;
//! adapters merely classify their failures.

pub mod reset;

use crate::config::{Config, ProviderConfig};
use crate::error::{AppError, AppResult, ErrorClass, HealthError, ProviderError};
use crate::metrics::{Metrics, Outcome};
use crate::models::health::HealthTracker;
use crate::models::quota_clock::now_ms;
use crate::models::selector::CandidateSelector;
use crate::persistence::{CooldownState, JsonFileStore, MemoryStore, QuotaState, StateStore};
use crate::providers::{CompletionRequest, CooldownLedger, ProviderAdapter, Usage, build_adapter};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Where a completion was served and how long it took
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionMeta {
    pub provider: String,
    pub model: String,
    pub latency_ms: u64,
    /// Intent whose requirement was used
    pub intent: String,
    pub request_id: String,
    /// Candidates tried, including the one that succeeded
    pub attempts: usize,
}

/// A successful completion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionResult {
    pub text: String,
    pub usage: Usage,
    pub meta: CompletionMeta,
}

/// Routes completion requests across providers
pub struct Router {
    selector: CandidateSelector,
    health: Arc<HealthTracker>,
    metrics: Arc<Metrics>,
}

impl Router {
    /// Create a router over prepared adapters
    ///
    /// Registers every configured provider with `health`, using the
    /// adapter's key count (zero for providers without an adapter).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NoCredentials`] if no adapter has a key.
    pub async fn new(
        config: &Config,
        adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
        health: Arc<HealthTracker>,
        metrics: Arc<Metrics>,
    ) -> AppResult<Self> {
        if !adapters.values().any(|a| a.key_count() > 0) {
            return Err(AppError::NoCredentials {
                checked: config.providers.len(),
            });
        }

        for provider in &config.providers {
            let key_count = adapters
                .get(provider.name())
                .map(|a| a.key_count())
                .unwrap_or(0);
            health.register(provider, key_count).await;
        }

        tracing::info!(
            providers = config.providers.len(),
            with_credentials = adapters.values().filter(|a| a.key_count() > 0).count(),
            "Router initialized"
        );

        Ok(Self {
            selector: CandidateSelector::new(config, health.clone(), adapters),
            health,
            metrics,
        })
    }

    /// Build a router from config, reading keys from the environment
    pub async fn from_config(config: &Config) -> AppResult<Self> {
        Self::from_config_with_keys(config, ProviderConfig::load_keys).await
    }

    /// Build a router from config with keys supplied by `keys_for`
    ///
    /// Opens the state stores, restores key cooldowns and today's quota
    /// usage, and builds one HTTP adapter per provider that has keys.
    pub async fn from_config_with_keys<F>(config: &Config, keys_for: F) -> AppResult<Self>
    where
        F: Fn(&ProviderConfig) -> Vec<String>,
    {
        let metrics = Arc::new(Metrics::new().map_err(|e| {
            AppError::Internal(format!("Failed to initialize metrics: {}", e))
        })?);
        let clock = config.quota_clock()?;

        let (quota_store, cooldown_store) = open_stores(config);
        let ledger = Arc::new(CooldownLedger::new(cooldown_store).with_metrics(metrics.clone()));
        ledger.load(now_ms()).await;

        let health = Arc::new(
            HealthTracker::new(
                clock,
                quota_store,
                Duration::from_millis(config.persistence.debounce_ms),
            )
            .with_metrics(metrics.clone()),
        );

        let mut adapters: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
        for provider in &config.providers {
            let keys = keys_for(provider);
            if keys.is_empty() {
                tracing::info!(
                    provider = %provider.name(),
                    credential_env = %provider.credential_env(),
                    "No credentials configured, provider disabled"
                );
                continue;
            }
            let adapter = build_adapter(config, provider, keys, clock, ledger.clone()).await;
            adapters.insert(provider.name().to_string(), adapter);
        }

        let router = Self::new(config, adapters, health, metrics).await?;
        router.health.load_from_disk().await;
        Ok(router)
    }

    pub fn health(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    pub fn selector(&self) -> &CandidateSelector {
        &self.selector
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Start the daily quota reset timer
    pub fn start_reset_timer(&self) {
        reset::start_reset_timer(self.health.clone());
    }

    /// Complete `request` on the best available candidate
    ///
    /// Candidates are tried one at a time in score order. The first success
    /// is returned; if every candidate fails the last failure is returned
    /// inside [`AppError::AllCandidatesFailed`].
    ///
    /// # Errors
    ///
    /// [`AppError::NoCandidates`] when no registered model can serve the
    /// intent. No network call is made in that case.
    pub async fn complete(&self, request: CompletionRequest) -> AppResult<CompletionResult> {
        let request_id = Uuid::new_v4().to_string();
        let selection = self.selector.select(&request.intent).await;

        if selection.candidates.is_empty() {
            tracing::warn!(
                request_id = %request_id,
                intent = %request.intent,
                "No candidate can serve this intent"
            );
            if let Err(e) = self.metrics.record_no_candidates(&selection.intent) {
                self.metrics_error(&request_id, "record_no_candidates", &e);
            }
            return Err(AppError::NoCandidates {
                intent: selection.intent,
            });
        }

        tracing::debug!(
            request_id = %request_id,
            intent = %selection.intent,
            candidates = selection.candidates.len(),
            relaxed = selection.relaxed,
            "Candidates selected"
        );

        let total = selection.candidates.len();
        let mut attempted = 0;
        let mut last_error: Option<ProviderError> = None;

        for (index, candidate) in selection.candidates.iter().enumerate() {
            let Some(adapter) = self.selector.adapter(&candidate.provider) else {
                continue;
            };
            attempted += 1;

            let start = Instant::now();
            let outcome = adapter.complete(&candidate.model, &request).await;
            let elapsed = start.elapsed();

            match outcome {
                Ok(response) => {
                    self.record_attempt(&request_id, &candidate.provider, Outcome::Success, elapsed);
                    if let Err(e) = self.health.on_success(&candidate.provider, &candidate.model).await {
                        self.health_error(&request_id, &candidate.provider, &e);
                    }

                    tracing::info!(
                        request_id = %request_id,
                        intent = %selection.intent,
                        provider = %candidate.provider,
                        model = %candidate.model,
                        attempts = attempted,
                        latency_ms = elapsed.as_millis() as u64,
                        "Completion served"
                    );

                    return Ok(CompletionResult {
                        text: response.text,
                        usage: response.usage,
                        meta: CompletionMeta {
                            provider: candidate.provider.clone(),
                            model: candidate.model.clone(),
                            latency_ms: elapsed.as_millis() as u64,
                            intent: selection.intent.clone(),
                            request_id,
                            attempts: attempted,
                        },
                    });
                }
                Err(error) => {
                    self.record_attempt(
                        &request_id,
                        &candidate.provider,
                        Outcome::Failure(error.class),
                        elapsed,
                    );

                    let keys_remaining = adapter.is_available().await;
                    if let Err(e) = self
                        .health
                        .record_failure(&candidate.provider, &candidate.model, error.class, keys_remaining)
                        .await
                    {
                        self.health_error(&request_id, &candidate.provider, &e);
                    }

                    // Fatal errors end the call; every other class fails over
                    let fatal = error.class == ErrorClass::Fatal;
                    let has_next = !fatal && index + 1 < total;
                    tracing::warn!(
                        request_id = %request_id,
                        intent = %selection.intent,
                        provider = %candidate.provider,
                        model = %candidate.model,
                        class = %error.class,
                        status = ?error.status,
                        error = %error.message,
                        failover = has_next,
                        "Candidate failed"
                    );
                    if has_next && let Err(e) = self.metrics.record_failover(&selection.intent) {
                        self.metrics_error(&request_id, "record_failover", &e);
                    }

                    last_error = Some(error);
                    if fatal {
                        break;
                    }
                }
            }
        }

        match last_error {
            Some(last) => {
                tracing::error!(
                    request_id = %request_id,
                    intent = %selection.intent,
                    attempted = attempted,
                    class = %last.class,
                    "All candidates failed"
                );
                Err(AppError::AllCandidatesFailed {
                    intent: selection.intent,
                    attempted,
                    last,
                })
            }
            None => Err(AppError::NoCandidates {
                intent: selection.intent,
            }),
        }
    }

    fn record_attempt(&self, request_id: &str, provider: &str, outcome: Outcome, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        if let Err(e) = self.metrics.record_attempt(provider, outcome, ms) {
            self.metrics_error(request_id, "record_attempt", &e);
        }
    }

    fn metrics_error(&self, request_id: &str, operation: &str, error: &prometheus::Error) {
        tracing::error!(
            request_id = %request_id,
            operation = operation,
            error = %error,
            "Failed to record metric"
        );
        self.metrics.metrics_recording_failure(operation);
    }

    fn health_error(&self, request_id: &str, provider: &str, error: &HealthError) {
        tracing::error!(
            request_id = %request_id,
            provider = %provider,
            error = %error,
            "Failed to update provider health"
        );
        self.metrics
            .health_tracking_failure(provider, error.error_type());
    }
}

/// Quota and cooldown stores for the configured persistence mode
fn open_stores(
    config: &Config,
) -> (
    Arc<dyn StateStore<QuotaState>>,
    Arc<dyn StateStore<CooldownState>>,
) {
    if config.persistence.enabled {
        (
            Arc::new(JsonFileStore::new(&config.persistence.quota_path, "quota")),
            Arc::new(JsonFileStore::new(
                &config.persistence.cooldown_path,
                "cooldowns",
            )),
        )
    } else {
        tracing::info!("Persistence disabled, state kept in memory only");
        (
            Arc::new(MemoryStore::<QuotaState>::new("quota")),
            Arc::new(MemoryStore::<CooldownState>::new("cooldowns")),
        )
    }
}
