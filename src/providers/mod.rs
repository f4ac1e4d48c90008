//! Provider adapters
//!
//! An adapter is the only code that speaks a vendor's wire format. It owns
//! the provider's key pool and throttle, retries overload-class failures
//! internally, and surfaces every other failure as a classified
//! [`ProviderError`] for the router to act on.

pub mod classify;
pub mod gemini;
pub mod http;
pub mod keys;
pub mod mock;
pub mod openai_compat;
pub mod request;
pub mod throttle;

pub use http::{HttpAdapter, RetryPolicy, WireProtocol, WireReply};
pub use keys::{CooldownLedger, KeyLease, KeyPool};
pub use mock::MockAdapter;
pub use request::{AdapterResponse, CompletionRequest, InlineData, Message, Role, ToolSpec, Usage};

use crate::config::{Config, ProviderConfig, ProviderFamily};
use crate::error::ProviderError;
use crate::models::quota_clock::{QuotaClock, now_ms};
use async_trait::async_trait;
use gemini::GeminiWire;
use openai_compat::OpenAiCompatWire;
use std::sync::Arc;

/// One provider family's network layer
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name, matching the registry entry
    fn name(&self) -> &str;

    /// Number of configured keys
    fn key_count(&self) -> usize;

    /// True if at least one key is not cooling down
    async fn is_available(&self) -> bool;

    /// Complete `request` on `model`
    ///
    /// Overload-class failures may be retried internally with backoff; every
    /// other failure is returned classified.
    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<AdapterResponse, ProviderError>;
}

/// Build the adapter for one provider from its config and keys
///
/// Restores persisted key cooldowns from `ledger` before returning.
pub async fn build_adapter(
    config: &Config,
    provider: &ProviderConfig,
    keys: Vec<String>,
    clock: QuotaClock,
    ledger: Arc<CooldownLedger>,
) -> Arc<dyn ProviderAdapter> {
    let key_count = keys.len();
    let pool = KeyPool::new(provider.name(), keys).with_ledger(ledger.clone());
    let restored = pool
        .restore(&ledger.entries_for(provider.name()).await, now_ms())
        .await;
    if restored > 0 {
        tracing::info!(
            provider = %provider.name(),
            restored = restored,
            "Restored key cooldowns"
        );
    }

    let timeout = config.routing.request_timeout();
    let throttle = provider.throttle_interval(key_count);
    let retry = RetryPolicy::from(&config.retry);

    match provider.family() {
        ProviderFamily::Gemini => Arc::new(
            HttpAdapter::new(provider.name(), provider.base_url(), pool, GeminiWire, timeout)
                .with_throttle(throttle)
                .with_retry(retry)
                .with_clock(clock),
        ),
        ProviderFamily::OpenaiCompatible => Arc::new(
            HttpAdapter::new(
                provider.name(),
                provider.base_url(),
                pool,
                OpenAiCompatWire,
                timeout,
            )
            .with_throttle(throttle)
            .with_retry(retry)
            .with_clock(clock),
        ),
    }
}
