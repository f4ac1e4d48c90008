//! HTTP adapter shared by every vendor family
//!
//! [`HttpAdapter`] owns the key pool, throttle and retry loop. The vendor
//! specifics (URL, auth header, body shape, response parsing) live behind
//! [`WireProtocol`].

use super::classify::{classify, error_message};
use super::keys::{KeyLease, KeyPool};
use super::request::{AdapterResponse, CompletionRequest, Usage};
use super::throttle::Throttle;
use super::ProviderAdapter;
use crate::config::RetryConfig;
use crate::error::{ErrorClass, ProviderError};
use crate::models::quota_clock::{QuotaClock, now_ms};
use crate::shared::backoff::calculate_backoff;
use async_trait::async_trait;
use std::time::Duration;

/// Cooldown applied to a key that hit a per-minute rate limit
pub const KEY_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(90);

/// Upper bound on calls one `complete` may make, regardless of key count
pub const MAX_CALLS_PER_COMPLETION: usize = 5;

/// Parsed body of a successful vendor response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireReply {
    pub text: String,
    /// `None` when the vendor omitted usage
    pub usage: Option<Usage>,
}

/// Vendor wire format
pub trait WireProtocol: Send + Sync {
    /// Build the HTTP request for one call with one key
    fn build(
        &self,
        client: &reqwest::Client,
        base_url: &str,
        model: &str,
        api_key: &str,
        request: &CompletionRequest,
    ) -> reqwest::RequestBuilder;

    /// Parse a 2xx response body
    fn parse(&self, body: &str) -> Result<WireReply, String>;
}

/// Retry policy for overload-class failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub overload_backoff_ms: u64,
    pub max_overload_retries: usize,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            overload_backoff_ms: config.overload_backoff_ms,
            max_overload_retries: config.max_overload_retries,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

pub struct HttpAdapter<W> {
    name: String,
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    keys: KeyPool,
    throttle: Throttle,
    retry: RetryPolicy,
    clock: QuotaClock,
    wire: W,
}

impl<W: WireProtocol> HttpAdapter<W> {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        keys: KeyPool,
        wire: W,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client, using defaults");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout,
            keys,
            throttle: Throttle::new(None),
            retry: RetryPolicy::default(),
            clock: QuotaClock::default(),
            wire,
        }
    }

    pub fn with_throttle(mut self, interval: Option<Duration>) -> Self {
        self.throttle = Throttle::new(interval);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_clock(mut self, clock: QuotaClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn keys(&self) -> &KeyPool {
        &self.keys
    }

    fn error(&self, model: &str, class: ErrorClass, message: impl Into<String>) -> ProviderError {
        ProviderError::new(&self.name, model, class, message)
    }

    /// One network call with one key, no retries
    async fn call_once(
        &self,
        model: &str,
        key: &KeyLease,
        request: &CompletionRequest,
    ) -> Result<AdapterResponse, ProviderError> {
        let http = self
            .wire
            .build(&self.client, &self.base_url, model, key.secret(), request);

        let sent = tokio::time::timeout(self.timeout, async {
            let response = http.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        })
        .await;

        let (status, body) = match sent {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                let class = if e.is_timeout() {
                    ErrorClass::Generic
                } else {
                    classify(e.status().map(|s| s.as_u16()), &e.to_string())
                };
                return Err(self.error(model, class, format!("request failed: {}", e)));
            }
            Err(_elapsed) => {
                return Err(self.error(
                    model,
                    ErrorClass::Generic,
                    format!("timed out after {}s", self.timeout.as_secs()),
                ));
            }
        };

        if !status.is_success() {
            let code = status.as_u16();
            return Err(self
                .error(model, classify(Some(code), &body), error_message(&body))
                .with_status(code));
        }

        let reply = self.wire.parse(&body).map_err(|e| {
            self.error(model, ErrorClass::Generic, format!("unreadable response: {}", e))
        })?;

        // An empty 200 means the model declined; never report it as success
        if reply.text.trim().is_empty() {
            return Err(self.error(model, ErrorClass::Generic, "empty response"));
        }

        let usage = reply
            .usage
            .unwrap_or_else(|| Usage::estimate(request.prompt_chars(), reply.text.len()));
        Ok(AdapterResponse {
            text: reply.text,
            usage,
        })
    }
}

#[async_trait]
impl<W: WireProtocol> ProviderAdapter for HttpAdapter<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn key_count(&self) -> usize {
        self.keys.len()
    }

    async fn is_available(&self) -> bool {
        self.keys.has_available(now_ms()).await
    }

    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<AdapterResponse, ProviderError> {
        let max_calls = (self.keys.len() + 2).min(MAX_CALLS_PER_COMPLETION);
        let mut overload_retries = 0;
        let mut last_error = None;

        for call in 1..=max_calls {
            self.throttle.acquire().await;

            let Some(key) = self.keys.next_key(now_ms()).await else {
                return Err(self.error(model, ErrorClass::Fatal, "no API keys configured"));
            };

            let err = match self.call_once(model, &key, request).await {
                Ok(response) => {
                    tracing::debug!(
                        provider = %self.name,
                        model = %model,
                        key_id = %key.id(),
                        call = call,
                        "Vendor call succeeded"
                    );
                    return Ok(response);
                }
                Err(err) => err,
            };

            tracing::warn!(
                provider = %self.name,
                model = %model,
                key_id = %key.id(),
                class = %err.class,
                status = ?err.status,
                call = call,
                max_calls = max_calls,
                error = %err.message,
                "Vendor call failed"
            );

            let retry = match err.class {
                ErrorClass::Quota => {
                    self.keys.cool(&key, self.clock.next_reset_ms()).await;
                    self.keys.has_available(now_ms()).await
                }
                ErrorClass::RateLimit => {
                    let until = now_ms() + KEY_RATE_LIMIT_COOLDOWN.as_millis() as i64;
                    self.keys.cool(&key, until).await;
                    self.keys.has_available(now_ms()).await
                }
                ErrorClass::Overload if overload_retries < self.retry.max_overload_retries => {
                    overload_retries += 1;
                    let backoff =
                        calculate_backoff(self.retry.overload_backoff_ms, overload_retries);
                    tracing::info!(
                        provider = %self.name,
                        model = %model,
                        retry = overload_retries,
                        backoff_ms = backoff,
                        "Provider overloaded, backing off before retry"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    true
                }
                ErrorClass::Overload | ErrorClass::Fatal | ErrorClass::Generic => false,
            };

            if !retry {
                return Err(err);
            }
            last_error = Some(err);
        }

        Err(last_error.unwrap_or_else(|| {
            self.error(model, ErrorClass::Generic, "no call attempted")
        }))
    }
}
