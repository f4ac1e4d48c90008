//! Provider health tracking
//!
//! Holds per-provider reliability, cooldown and per-model daily quota usage.
//! Availability and scores computed here drive candidate selection; every
//! attempt outcome is fed back through the `on_*` methods by the router.
//!
//! Quota usage is cached on disk through a [`StateStore`]. Writes triggered
//! by successes are debounced so a burst of completions produces one write.

use crate::config::ProviderConfig;
use crate::error::{ErrorClass, HealthError};
use crate::metrics::Metrics;
use crate::models::quota_clock::{QuotaClock, now_ms};
use crate::persistence::{PersistedQuota, QuotaState, StateStore};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(90);
pub const OVERLOAD_COOLDOWN: Duration = Duration::from_secs(30);
pub const GENERIC_COOLDOWN: Duration = Duration::from_secs(60);
pub const FATAL_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

/// Share of a finite daily limit usable before a model counts as exhausted
///
/// The remaining 5% absorbs concurrent attempts racing the same quota.
pub const AVAILABILITY_MARGIN: f64 = 0.95;

const OVERLOAD_RELIABILITY_FACTOR: f64 = 0.8;
const GENERIC_RELIABILITY_FACTOR: f64 = 0.5;

/// Daily usage of one model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    used: u32,
    /// `None` means unbounded
    limit: Option<u32>,
}

impl QuotaUsage {
    pub fn new(limit: Option<u32>) -> Self {
        Self { used: 0, limit }
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// True once usage reaches the availability margin of a finite limit
    pub fn is_exhausted(&self) -> bool {
        match self.limit {
            Some(limit) => f64::from(self.used) >= AVAILABILITY_MARGIN * f64::from(limit),
            None => false,
        }
    }

    /// Remaining share of the daily limit in [0, 1]; 1.0 when unbounded
    pub fn headroom(&self) -> f64 {
        match self.limit {
            Some(0) => 0.0,
            Some(limit) => (1.0 - f64::from(self.used) / f64::from(limit)).clamp(0.0, 1.0),
            None => 1.0,
        }
    }
}

/// Mutable health state for one provider
///
/// Fields are private so reliability stays within [0, 1].
#[derive(Debug, Clone)]
pub struct HealthRecord {
    key_count: usize,
    reliability: f64,
    cool_until_ms: i64,
    last_success_ms: Option<i64>,
    models: BTreeMap<String, QuotaUsage>,
}

impl HealthRecord {
    fn new(provider: &ProviderConfig, key_count: usize) -> Self {
        Self {
            key_count,
            reliability: 1.0,
            cool_until_ms: 0,
            last_success_ms: None,
            models: provider
                .models()
                .iter()
                .map(|m| (m.name().to_string(), QuotaUsage::new(m.rpd())))
                .collect(),
        }
    }

    pub fn key_count(&self) -> usize {
        self.key_count
    }

    pub fn reliability(&self) -> f64 {
        self.reliability
    }

    pub fn cool_until_ms(&self) -> i64 {
        self.cool_until_ms
    }

    pub fn last_success_ms(&self) -> Option<i64> {
        self.last_success_ms
    }

    pub fn quota(&self, model: &str) -> Option<&QuotaUsage> {
        self.models.get(model)
    }

    fn set_reliability(&mut self, value: f64) {
        self.reliability = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    /// Extend the provider cooldown; never shortens an existing one
    fn cool_until(&mut self, until_ms: i64) {
        self.cool_until_ms = self.cool_until_ms.max(until_ms);
    }

    fn cool_for(&mut self, duration: Duration, now_ms: i64) {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        self.cool_until(now_ms.saturating_add(millis));
    }

    fn model_mut(&mut self, provider: &str, model: &str) -> Result<&mut QuotaUsage, HealthError> {
        self.models
            .get_mut(model)
            .ok_or_else(|| HealthError::UnknownModel {
                provider: provider.to_string(),
                model: model.to_string(),
            })
    }

    fn persisted(&self, date: &str) -> PersistedQuota {
        PersistedQuota {
            used: self.models.values().map(|q| q.used).sum(),
            date: date.to_string(),
            models: self
                .models
                .iter()
                .map(|(name, q)| (name.clone(), q.used))
                .collect(),
        }
    }
}

/// Per-model view in a health snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ModelHealth {
    pub name: String,
    pub used: u32,
    pub limit: Option<u32>,
    pub available: bool,
    pub score: f64,
}

/// Read-only view of one provider's health, in registration order
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub key_count: usize,
    pub reliability: f64,
    pub cooling_down: bool,
    pub cool_until_ms: i64,
    pub last_success_ms: Option<i64>,
    pub models: Vec<ModelHealth>,
}

#[derive(Default)]
struct HealthState {
    records: HashMap<String, HealthRecord>,
    order: Vec<String>,
}

impl HealthState {
    fn record_mut(&mut self, provider: &str) -> Result<&mut HealthRecord, HealthError> {
        self.records
            .get_mut(provider)
            .ok_or_else(|| HealthError::UnknownProvider(provider.to_string()))
    }
}

/// Health tracker shared by the router and the selector
pub struct HealthTracker {
    state: RwLock<HealthState>,
    clock: QuotaClock,
    store: Arc<dyn StateStore<QuotaState>>,
    debounce: Duration,
    flush_scheduled: AtomicBool,
    metrics: Option<Arc<Metrics>>,
}

impl HealthTracker {
    pub fn new(clock: QuotaClock, store: Arc<dyn StateStore<QuotaState>>, debounce: Duration) -> Self {
        Self {
            state: RwLock::new(HealthState::default()),
            clock,
            store,
            debounce,
            flush_scheduled: AtomicBool::new(false),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn clock(&self) -> &QuotaClock {
        &self.clock
    }

    /// Register a provider with all of its models at zero usage
    ///
    /// Re-registering replaces the record but keeps registration order.
    pub async fn register(&self, provider: &ProviderConfig, key_count: usize) {
        let mut state = self.state.write().await;
        let name = provider.name().to_string();
        if !state.records.contains_key(&name) {
            state.order.push(name.clone());
        }
        state
            .records
            .insert(name, HealthRecord::new(provider, key_count));

        tracing::debug!(
            provider = %provider.name(),
            key_count = key_count,
            models = provider.models().len(),
            "Provider registered with health tracker"
        );
    }

    /// Registered provider names in registration order
    pub async fn providers(&self) -> Vec<String> {
        self.state.read().await.order.clone()
    }

    /// Copy of one provider's record
    pub async fn record(&self, provider: &str) -> Option<HealthRecord> {
        self.state.read().await.records.get(provider).cloned()
    }

    /// Whether `provider`/`model` may be attempted right now
    ///
    /// Unknown providers and models are unavailable.
    pub async fn is_available(&self, provider: &str, model: &str) -> bool {
        let state = self.state.read().await;
        let Some(record) = state.records.get(provider) else {
            return false;
        };
        Self::available_at(record, model, now_ms())
    }

    fn available_at(record: &HealthRecord, model: &str, now_ms: i64) -> bool {
        if record.key_count == 0 || record.cool_until_ms > now_ms {
            return false;
        }
        record.models.get(model).is_some_and(|q| !q.is_exhausted())
    }

    /// Health score in [0, 1]: reliability scaled by remaining quota
    pub async fn score(&self, provider: &str, model: &str) -> f64 {
        let state = self.state.read().await;
        state
            .records
            .get(provider)
            .and_then(|record| {
                record
                    .models
                    .get(model)
                    .map(|q| q.headroom() * record.reliability)
            })
            .unwrap_or(0.0)
    }

    /// Count a successful completion
    ///
    /// Schedules a debounced write of quota state.
    pub async fn on_success(self: &Arc<Self>, provider: &str, model: &str) -> Result<(), HealthError> {
        {
            let mut state = self.state.write().await;
            let record = state.record_mut(provider)?;
            let quota = record.model_mut(provider, model)?;
            quota.used = quota.used.saturating_add(1);
            let used = quota.used;

            let recovered = record.reliability * 0.9 + 0.1;
            record.set_reliability(recovered.min(1.0));
            record.last_success_ms = Some(now_ms());

            tracing::debug!(
                provider = %provider,
                model = %model,
                used = used,
                reliability = record.reliability,
                "Success recorded"
            );
        }

        self.schedule_flush();
        Ok(())
    }

    /// Daily quota hit: mark the model exhausted until the next reset
    ///
    /// Models without a finite limit cannot be marked exhausted, so the whole
    /// provider is cooled until the reset boundary instead.
    pub async fn on_quota_exhausted(self: &Arc<Self>, provider: &str, model: &str) -> Result<(), HealthError> {
        let reset_ms = self.clock.next_reset_ms();
        {
            let mut state = self.state.write().await;
            let record = state.record_mut(provider)?;
            let quota = record.model_mut(provider, model)?;
            match quota.limit {
                Some(limit) => quota.used = quota.used.max(limit),
                None => record.cool_until(reset_ms),
            }

            tracing::warn!(
                provider = %provider,
                model = %model,
                reset_at_ms = reset_ms,
                "Daily quota exhausted, model unavailable until reset"
            );
        }

        self.schedule_flush();
        Ok(())
    }

    /// Per-minute rate limit hit
    ///
    /// The adapter already cooled the offending key. The provider itself is
    /// cooled only when it has no usable key left.
    pub async fn on_rate_limited(&self, provider: &str, keys_remaining: bool) -> Result<(), HealthError> {
        let mut state = self.state.write().await;
        let record = state.record_mut(provider)?;
        if !keys_remaining {
            record.cool_for(RATE_LIMIT_COOLDOWN, now_ms());
        }

        tracing::info!(
            provider = %provider,
            keys_remaining = keys_remaining,
            "Rate limit recorded"
        );
        Ok(())
    }

    pub async fn on_overloaded(&self, provider: &str) -> Result<(), HealthError> {
        self.degrade(provider, OVERLOAD_COOLDOWN, OVERLOAD_RELIABILITY_FACTOR)
            .await
    }

    pub async fn on_error(&self, provider: &str) -> Result<(), HealthError> {
        self.degrade(provider, GENERIC_COOLDOWN, GENERIC_RELIABILITY_FACTOR)
            .await
    }

    /// Authentication or billing failure: provider out for a day
    pub async fn on_fatal(&self, provider: &str) -> Result<(), HealthError> {
        self.degrade(provider, FATAL_COOLDOWN, 0.0).await
    }

    async fn degrade(&self, provider: &str, cooldown: Duration, factor: f64) -> Result<(), HealthError> {
        let mut state = self.state.write().await;
        let record = state.record_mut(provider)?;
        record.cool_for(cooldown, now_ms());
        let degraded = record.reliability * factor;
        record.set_reliability(degraded);

        tracing::info!(
            provider = %provider,
            cooldown_secs = cooldown.as_secs(),
            reliability = record.reliability,
            "Provider degraded"
        );
        Ok(())
    }

    /// Apply the health consequence of a classified failure
    pub async fn record_failure(
        self: &Arc<Self>,
        provider: &str,
        model: &str,
        class: ErrorClass,
        keys_remaining: bool,
    ) -> Result<(), HealthError> {
        match class {
            ErrorClass::Quota => self.on_quota_exhausted(provider, model).await,
            ErrorClass::RateLimit => self.on_rate_limited(provider, keys_remaining).await,
            ErrorClass::Overload => self.on_overloaded(provider).await,
            ErrorClass::Fatal => self.on_fatal(provider).await,
            ErrorClass::Generic => self.on_error(provider).await,
        }
    }

    /// Quota day rollover
    ///
    /// Clears usage for every model and lets degraded providers regain part
    /// of their reliability.
    pub async fn reset_all_rpd(&self) {
        {
            let mut state = self.state.write().await;
            for record in state.records.values_mut() {
                for quota in record.models.values_mut() {
                    quota.used = 0;
                }
                let recovered = record.reliability * 0.8 + 0.2;
                record.set_reliability(recovered.min(1.0));
            }
            tracing::info!(
                providers = state.records.len(),
                "Daily quotas reset"
            );
        }

        self.save_to_disk().await;
    }

    /// Apply persisted usage belonging to `today`
    ///
    /// Entries from an earlier quota day are discarded. An entry without a
    /// per-model breakdown applies its total to every model of the provider.
    pub async fn restore(&self, persisted: &QuotaState, today: &str) -> usize {
        let mut state = self.state.write().await;
        let mut restored = 0;

        for (provider, entry) in persisted {
            if entry.date != today {
                tracing::debug!(
                    provider = %provider,
                    stored_date = %entry.date,
                    today = %today,
                    "Discarding quota state from an earlier day"
                );
                continue;
            }
            let Some(record) = state.records.get_mut(provider) else {
                tracing::debug!(provider = %provider, "Ignoring quota state for unregistered provider");
                continue;
            };

            for (model, quota) in record.models.iter_mut() {
                let used = if entry.models.is_empty() {
                    Some(entry.used)
                } else {
                    entry.models.get(model).copied()
                };
                if let Some(used) = used {
                    quota.used = used;
                }
            }
            restored += 1;
        }

        restored
    }

    /// Load quota state from the store; failures are logged, never returned
    pub async fn load_from_disk(&self) {
        match self.store.load().await {
            Ok(Some(state)) => {
                let today = self.clock.today();
                let restored = self.restore(&state, &today).await;
                tracing::info!(
                    store = %self.store.label(),
                    restored = restored,
                    today = %today,
                    "Quota state restored"
                );
            }
            Ok(None) => {
                tracing::debug!(store = %self.store.label(), "No persisted quota state");
            }
            Err(e) => {
                tracing::warn!(
                    store = %self.store.label(),
                    error = %e,
                    "Failed to load quota state, starting from zero usage"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.persistence_failure(self.store.label(), "load");
                }
            }
        }
    }

    /// Current quota state as it would be persisted
    pub async fn quota_state(&self) -> QuotaState {
        let today = self.clock.today();
        let state = self.state.read().await;
        state
            .records
            .iter()
            .map(|(name, record)| (name.clone(), record.persisted(&today)))
            .collect()
    }

    /// Write quota state now; failures are logged, never returned
    pub async fn save_to_disk(&self) {
        let snapshot = self.quota_state().await;
        if let Err(e) = self.store.save(&snapshot).await {
            tracing::warn!(
                store = %self.store.label(),
                error = %e,
                "Failed to persist quota state"
            );
            if let Some(metrics) = &self.metrics {
                metrics.persistence_failure(self.store.label(), "save");
            }
        }
    }

    /// Schedule one write after the debounce window unless one is pending
    fn schedule_flush(self: &Arc<Self>) {
        if self.flush_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }

        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(tracker.debounce).await;
            // Cleared before the snapshot so later updates schedule a new write
            tracker.flush_scheduled.store(false, Ordering::Release);
            tracker.save_to_disk().await;
        });
    }

    /// Read-only view for the status surface
    pub async fn snapshot(&self) -> Vec<ProviderHealth> {
        let now = now_ms();
        let state = self.state.read().await;
        state
            .order
            .iter()
            .filter_map(|name| state.records.get(name).map(|record| (name, record)))
            .map(|(name, record)| ProviderHealth {
                name: name.clone(),
                key_count: record.key_count,
                reliability: record.reliability,
                cooling_down: record.cool_until_ms > now,
                cool_until_ms: record.cool_until_ms,
                last_success_ms: record.last_success_ms,
                models: record
                    .models
                    .iter()
                    .map(|(model, quota)| ModelHealth {
                        name: model.clone(),
                        used: quota.used,
                        limit: quota.limit,
                        available: Self::available_at(record, model, now),
                        score: quota.headroom() * record.reliability,
                    })
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, ProviderFamily};
    use crate::models::capability::{Capability, CapabilitySet};
    use crate::persistence::MemoryStore;

    fn provider(name: &str, rpd: Option<u32>) -> ProviderConfig {
        ProviderConfig::new(
            name,
            ProviderFamily::OpenaiCompatible,
            "TEST_KEY",
            "http://localhost:1234/v1",
            vec![ModelConfig::new(
                "m",
                rpd,
                CapabilitySet::empty().with(Capability::Text),
            )],
        )
    }

    async fn tracker_with(providers: &[ProviderConfig]) -> (Arc<HealthTracker>, Arc<MemoryStore<QuotaState>>) {
        let store = Arc::new(MemoryStore::new("quota"));
        let tracker = Arc::new(HealthTracker::new(
            QuotaClock::default(),
            store.clone(),
            Duration::from_millis(1_000),
        ));
        for p in providers {
            tracker.register(p, 1).await;
        }
        (tracker, store)
    }

    #[tokio::test]
    async fn test_new_provider_is_available_with_full_score() {
        let (tracker, _) = tracker_with(&[provider("a", Some(100))]).await;
        assert!(tracker.is_available("a", "m").await);
        assert_eq!(tracker.score("a", "m").await, 1.0);
    }

    #[tokio::test]
    async fn test_unknown_provider_or_model_unavailable() {
        let (tracker, _) = tracker_with(&[provider("a", Some(100))]).await;
        assert!(!tracker.is_available("missing", "m").await);
        assert!(!tracker.is_available("a", "missing").await);
        assert_eq!(tracker.score("missing", "m").await, 0.0);
    }

    #[tokio::test]
    async fn test_provider_without_keys_unavailable() {
        let tracker = Arc::new(HealthTracker::new(
            QuotaClock::default(),
            Arc::new(MemoryStore::<QuotaState>::new("quota")),
            Duration::from_millis(10),
        ));
        tracker.register(&provider("a", None), 0).await;
        assert!(!tracker.is_available("a", "m").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_availability_margin_at_95_percent() {
        let (tracker, _) = tracker_with(&[provider("a", Some(20))]).await;
        for _ in 0..18 {
            tracker.on_success("a", "m").await.unwrap();
        }
        // 18 < 19 (95% of 20)
        assert!(tracker.is_available("a", "m").await);
        tracker.on_success("a", "m").await.unwrap();
        assert!(!tracker.is_available("a", "m").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_score_scales_with_remaining_quota() {
        let (tracker, _) = tracker_with(&[provider("a", Some(10))]).await;
        for _ in 0..5 {
            tracker.on_success("a", "m").await.unwrap();
        }
        assert!((tracker.score("a", "m").await - 0.5).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_exhausted_marks_finite_limit_used() {
        let (tracker, _) = tracker_with(&[provider("a", Some(20))]).await;
        tracker.on_quota_exhausted("a", "m").await.unwrap();

        let record = tracker.record("a").await.unwrap();
        assert_eq!(record.quota("m").unwrap().used(), 20);
        assert!(!tracker.is_available("a", "m").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_exhausted_unbounded_cools_until_reset() {
        let (tracker, _) = tracker_with(&[provider("a", None)]).await;
        tracker.on_quota_exhausted("a", "m").await.unwrap();

        let record = tracker.record("a").await.unwrap();
        assert!(record.cool_until_ms() >= tracker.clock().next_reset_ms() - 1_000);
        assert!(!tracker.is_available("a", "m").await);
    }

    #[tokio::test]
    async fn test_rate_limit_cools_provider_only_without_keys() {
        let (tracker, _) = tracker_with(&[provider("a", None)]).await;
        tracker.on_rate_limited("a", true).await.unwrap();
        assert!(tracker.is_available("a", "m").await);

        tracker.on_rate_limited("a", false).await.unwrap();
        assert!(!tracker.is_available("a", "m").await);
    }

    #[tokio::test]
    async fn test_overload_and_generic_degrade_reliability() {
        let (tracker, _) = tracker_with(&[provider("a", None), provider("b", None)]).await;
        tracker.on_overloaded("a").await.unwrap();
        tracker.on_error("b").await.unwrap();

        let a = tracker.record("a").await.unwrap();
        let b = tracker.record("b").await.unwrap();
        assert!((a.reliability() - 0.8).abs() < 1e-9);
        assert!((b.reliability() - 0.5).abs() < 1e-9);
        assert!(!tracker.is_available("a", "m").await);
        assert!(!tracker.is_available("b", "m").await);
    }

    #[tokio::test]
    async fn test_fatal_zeroes_reliability_for_a_day() {
        let (tracker, _) = tracker_with(&[provider("a", None)]).await;
        let before = now_ms();
        tracker.on_fatal("a").await.unwrap();

        let record = tracker.record("a").await.unwrap();
        assert_eq!(record.reliability(), 0.0);
        assert!(record.cool_until_ms() >= before + FATAL_COOLDOWN.as_millis() as i64);
    }

    #[tokio::test]
    async fn test_shorter_cooldown_does_not_shorten_longer_one() {
        let (tracker, _) = tracker_with(&[provider("a", None)]).await;
        tracker.on_fatal("a").await.unwrap();
        let fatal_until = tracker.record("a").await.unwrap().cool_until_ms();

        tracker.on_overloaded("a").await.unwrap();
        assert_eq!(tracker.record("a").await.unwrap().cool_until_ms(), fatal_until);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_recovers_reliability() {
        let (tracker, _) = tracker_with(&[provider("a", None)]).await;
        tracker.on_error("a").await.unwrap();
        tracker.on_success("a", "m").await.unwrap();

        let record = tracker.record("a").await.unwrap();
        assert!((record.reliability() - 0.55).abs() < 1e-9);
        assert!(record.last_success_ms().is_some());
    }

    #[tokio::test]
    async fn test_unknown_provider_update_is_error() {
        let (tracker, _) = tracker_with(&[provider("a", None)]).await;
        let err = tracker.on_success("nope", "m").await.unwrap_err();
        assert_eq!(err, HealthError::UnknownProvider("nope".to_string()));

        let err = tracker.on_success("a", "nope").await.unwrap_err();
        assert_eq!(err.error_type(), "unknown_model");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_usage_and_partially_recovers() {
        let (tracker, store) = tracker_with(&[provider("a", Some(20))]).await;
        tracker.on_quota_exhausted("a", "m").await.unwrap();
        tracker.on_error("a").await.unwrap();

        tracker.reset_all_rpd().await;

        let record = tracker.record("a").await.unwrap();
        assert_eq!(record.quota("m").unwrap().used(), 0);
        assert!((record.reliability() - 0.6).abs() < 1e-9);
        assert!(store.write_count() >= 1);
    }

    #[tokio::test]
    async fn test_restore_discards_stale_date() {
        let (tracker, _) = tracker_with(&[provider("a", Some(20))]).await;
        let mut persisted = QuotaState::new();
        persisted.insert(
            "a".to_string(),
            PersistedQuota {
                used: 15,
                date: "2024-01-01".to_string(),
                models: BTreeMap::new(),
            },
        );

        let restored = tracker.restore(&persisted, "2024-01-02").await;
        assert_eq!(restored, 0);
        assert_eq!(tracker.record("a").await.unwrap().quota("m").unwrap().used(), 0);
    }

    #[tokio::test]
    async fn test_restore_applies_same_day_usage() {
        let (tracker, _) = tracker_with(&[provider("a", Some(20))]).await;
        let mut persisted = QuotaState::new();
        persisted.insert(
            "a".to_string(),
            PersistedQuota {
                used: 15,
                date: "2024-01-02".to_string(),
                models: BTreeMap::new(),
            },
        );

        assert_eq!(tracker.restore(&persisted, "2024-01-02").await, 1);
        assert_eq!(tracker.record("a").await.unwrap().quota("m").unwrap().used(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_successes_coalesce_into_one_write() {
        let (tracker, store) = tracker_with(&[provider("a", Some(100))]).await;
        for _ in 0..5 {
            tracker.on_success("a", "m").await.unwrap();
        }
        assert_eq!(store.write_count(), 0);

        tokio::time::sleep(Duration::from_millis(1_500)).await;

        assert_eq!(store.write_count(), 1);
        let saved = store.snapshot().await.unwrap();
        assert_eq!(saved["a"].used, 5);
        assert_eq!(saved["a"].models["m"], 5);
    }

    #[tokio::test]
    async fn test_snapshot_in_registration_order() {
        let (tracker, _) = tracker_with(&[provider("z", None), provider("a", Some(5))]).await;
        let snapshot = tracker.snapshot().await;
        let names: Vec<_> = snapshot.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["z", "a"]);
        assert_eq!(snapshot[1].models[0].limit, Some(5));
        assert!(snapshot[1].models[0].available);
    }
}
