//! Shared setup for selector tests

use super::CandidateSelector;
use crate::config::Config;
use crate::models::health::HealthTracker;
use crate::models::quota_clock::QuotaClock;
use crate::persistence::{MemoryStore, QuotaState};
use crate::providers::{MockAdapter, ProviderAdapter};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const THREE_PROVIDERS: &str = r#"
[[providers]]
name = "premium"
family = "gemini"
credential_env = "PREMIUM_KEY"
base_url = "http://localhost:9001"

[[providers.models]]
name = "pro"
rpd = 100
capabilities = ["text", "json", "premium"]

[[providers]]
name = "basic"
family = "openai_compatible"
credential_env = "BASIC_KEY"
base_url = "http://localhost:9002"

[[providers.models]]
name = "fast"
rpd = 100
capabilities = ["text", "json"]

[[providers]]
name = "seer"
family = "openai_compatible"
credential_env = "SEER_KEY"
base_url = "http://localhost:9003"
weight = 0.5

[[providers.models]]
name = "eyes"
capabilities = ["text", "vision"]
"#;

pub struct Fixture {
    pub selector: CandidateSelector,
    pub health: Arc<HealthTracker>,
    pub adapters: HashMap<String, MockAdapter>,
}

/// Selector over `toml` with one mock adapter per provider
pub async fn fixture(toml: &str) -> Fixture {
    fixture_with_keys(toml, &[]).await
}

/// Like [`fixture`], overriding key counts for the named providers
pub async fn fixture_with_keys(toml: &str, key_counts: &[(&str, usize)]) -> Fixture {
    let config = Config::from_str(toml).expect("test config should parse");
    let health = Arc::new(HealthTracker::new(
        QuotaClock::default(),
        Arc::new(MemoryStore::<QuotaState>::new("quota")),
        Duration::from_secs(1),
    ));

    let mut mocks = HashMap::new();
    let mut adapters: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
    for provider in &config.providers {
        let keys = key_counts
            .iter()
            .find(|(name, _)| *name == provider.name())
            .map(|(_, n)| *n)
            .unwrap_or(1);
        let mock = MockAdapter::new(provider.name()).with_key_count(keys);
        health.register(provider, keys).await;
        adapters.insert(provider.name().to_string(), Arc::new(mock.clone()));
        mocks.insert(provider.name().to_string(), mock);
    }

    Fixture {
        selector: CandidateSelector::new(&config, health.clone(), adapters),
        health,
        adapters: mocks,
    }
}
