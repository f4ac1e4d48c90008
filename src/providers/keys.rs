//! API key pools with round-robin rotation and per-key cooldowns
//!
//! Each adapter owns one [`KeyPool`]. Cooldowns are shared with a
//! [`CooldownLedger`] so they survive restarts; the ledger only ever sees
//! redacted key identifiers.

use crate::metrics::Metrics;
use crate::persistence::{CooldownState, StateStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Number of trailing characters kept when a key is written anywhere
const REDACTED_SUFFIX_LEN: usize = 8;

/// Identifier for a key that is safe to log and persist (last 8 characters)
pub fn redact(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let start = chars.len().saturating_sub(REDACTED_SUFFIX_LEN);
    chars[start..].iter().collect()
}

struct ApiKey {
    secret: String,
    id: String,
    cool_until_ms: i64,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("id", &self.id)
            .field("cool_until_ms", &self.cool_until_ms)
            .finish()
    }
}

/// A key handed out for one call
#[derive(Clone)]
pub struct KeyLease {
    index: usize,
    secret: String,
    id: String,
}

impl KeyLease {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Redacted identifier
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Debug for KeyLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLease")
            .field("index", &self.index)
            .field("id", &self.id)
            .finish()
    }
}

#[derive(Debug)]
struct PoolState {
    keys: Vec<ApiKey>,
    cursor: usize,
}

/// Ordered keys for one provider
#[derive(Debug)]
pub struct KeyPool {
    provider: String,
    state: Mutex<PoolState>,
    len: usize,
    ledger: Option<Arc<CooldownLedger>>,
}

impl KeyPool {
    pub fn new(provider: impl Into<String>, secrets: Vec<String>) -> Self {
        let keys: Vec<ApiKey> = secrets
            .into_iter()
            .map(|secret| ApiKey {
                id: redact(&secret),
                secret,
                cool_until_ms: 0,
            })
            .collect();
        Self {
            provider: provider.into(),
            len: keys.len(),
            state: Mutex::new(PoolState { keys, cursor: 0 }),
            ledger: None,
        }
    }

    /// Persist cooldowns through `ledger`
    pub fn with_ledger(mut self, ledger: Arc<CooldownLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Next key in round-robin order, skipping cooled keys
    ///
    /// When every key is cooled, returns the one whose cooldown ends first
    /// rather than failing. `None` only for an empty pool.
    pub async fn next_key(&self, now_ms: i64) -> Option<KeyLease> {
        let mut state = self.state.lock().await;
        let len = state.keys.len();
        if len == 0 {
            return None;
        }

        let start = state.cursor % len;
        let free = (0..len)
            .map(|offset| (start + offset) % len)
            .find(|&i| state.keys[i].cool_until_ms <= now_ms);

        let index = match free {
            Some(index) => index,
            None => {
                // min_by_key keeps the first minimum, so ties go to the lowest index
                let index = (0..len)
                    .min_by_key(|&i| state.keys[i].cool_until_ms)
                    .unwrap_or(start);
                tracing::debug!(
                    provider = %self.provider,
                    key_id = %state.keys[index].id,
                    cool_until_ms = state.keys[index].cool_until_ms,
                    "All keys cooling down, using the one that recovers first"
                );
                index
            }
        };

        state.cursor = (index + 1) % len;
        let key = &state.keys[index];
        Some(KeyLease {
            index,
            secret: key.secret.clone(),
            id: key.id.clone(),
        })
    }

    /// True if at least one key is not cooling down
    pub async fn has_available(&self, now_ms: i64) -> bool {
        let state = self.state.lock().await;
        state.keys.iter().any(|k| k.cool_until_ms <= now_ms)
    }

    /// Cool the leased key until `until_ms`; never shortens an existing cooldown
    pub async fn cool(&self, lease: &KeyLease, until_ms: i64) {
        let until = {
            let mut state = self.state.lock().await;
            let Some(key) = state.keys.get_mut(lease.index) else {
                return;
            };
            key.cool_until_ms = key.cool_until_ms.max(until_ms);
            key.cool_until_ms
        };

        tracing::info!(
            provider = %self.provider,
            key_id = %lease.id,
            cool_until_ms = until,
            "API key cooling down"
        );

        if let Some(ledger) = &self.ledger {
            ledger.record(&self.provider, &lease.id, until).await;
        }
    }

    /// Apply persisted cooldowns, ignoring entries that already expired
    ///
    /// Returns how many keys were restored as cooling.
    pub async fn restore(&self, entries: &BTreeMap<String, i64>, now_ms: i64) -> usize {
        let mut state = self.state.lock().await;
        let mut restored = 0;
        for key in state.keys.iter_mut() {
            if let Some(&until) = entries.get(&key.id)
                && until > now_ms
            {
                key.cool_until_ms = key.cool_until_ms.max(until);
                restored += 1;
            }
        }
        restored
    }

    /// Cooldown deadline per key in pool order
    pub async fn cooldowns(&self) -> Vec<i64> {
        let state = self.state.lock().await;
        state.keys.iter().map(|k| k.cool_until_ms).collect()
    }
}

/// Persisted key cooldowns for every provider
///
/// One file holds all providers; writes happen under the ledger lock so
/// concurrent cooldowns never overwrite each other with stale maps.
pub struct CooldownLedger {
    state: Mutex<CooldownState>,
    store: Arc<dyn StateStore<CooldownState>>,
    metrics: Option<Arc<Metrics>>,
}

impl CooldownLedger {
    pub fn new(store: Arc<dyn StateStore<CooldownState>>) -> Self {
        Self {
            state: Mutex::new(CooldownState::new()),
            store,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Load the stored ledger, dropping expired entries
    ///
    /// A missing or unreadable file leaves the ledger empty.
    pub async fn load(&self, now_ms: i64) {
        let loaded = match self.store.load().await {
            Ok(loaded) => loaded.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(
                    store = %self.store.label(),
                    error = %e,
                    "Failed to load key cooldowns, starting with none"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.persistence_failure(self.store.label(), "load");
                }
                CooldownState::new()
            }
        };

        let mut state = self.state.lock().await;
        *state = loaded;
        prune(&mut state, now_ms);
    }

    /// Live cooldowns for one provider's keys
    pub async fn entries_for(&self, provider: &str) -> BTreeMap<String, i64> {
        self.state
            .lock()
            .await
            .get(provider)
            .cloned()
            .unwrap_or_default()
    }

    /// Record a key cooldown and write the ledger; failures are logged only
    pub async fn record(&self, provider: &str, key_id: &str, until_ms: i64) {
        let mut state = self.state.lock().await;
        state
            .entry(provider.to_string())
            .or_default()
            .insert(key_id.to_string(), until_ms);
        prune(&mut state, crate::models::quota_clock::now_ms());

        if let Err(e) = self.store.save(&state).await {
            tracing::warn!(
                store = %self.store.label(),
                provider = %provider,
                error = %e,
                "Failed to persist key cooldowns"
            );
            if let Some(metrics) = &self.metrics {
                metrics.persistence_failure(self.store.label(), "save");
            }
        }
    }
}

impl std::fmt::Debug for CooldownLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CooldownLedger")
            .field("store", &self.store.label())
            .finish_non_exhaustive()
    }
}

fn prune(state: &mut CooldownState, now_ms: i64) {
    for keys in state.values_mut() {
        keys.retain(|_, until| *until > now_ms);
    }
    state.retain(|_, keys| !keys.is_empty());
}
