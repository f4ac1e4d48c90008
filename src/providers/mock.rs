//! Scripted adapter for tests and local runs without vendor access

use super::ProviderAdapter;
use super::request::{AdapterResponse, CompletionRequest, Usage};
use crate::error::{ErrorClass, ProviderError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Adapter that replays queued outcomes
///
/// When the queue is empty every call succeeds with `"ok from <name>"`.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    name: String,
    key_count: usize,
    available: Arc<AtomicBool>,
    outcomes: Arc<Mutex<VecDeque<Result<String, ErrorClass>>>>,
    calls: Arc<Mutex<Vec<String>>>,
    call_count: Arc<AtomicUsize>,
}

impl MockAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_count: 1,
            available: Arc::new(AtomicBool::new(true)),
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_key_count(mut self, key_count: usize) -> Self {
        self.key_count = key_count;
        self
    }

    /// Simulate every key cooling down (or recovering)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn push_success(&self, text: impl Into<String>) {
        self.outcomes.lock().await.push_back(Ok(text.into()));
    }

    pub async fn push_failure(&self, class: ErrorClass) {
        self.outcomes.lock().await.push_back(Err(class));
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Models requested so far, in call order
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn key_count(&self) -> usize {
        self.key_count
    }

    async fn is_available(&self) -> bool {
        self.key_count > 0 && self.available.load(Ordering::SeqCst)
    }

    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<AdapterResponse, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().await.push(model.to_string());

        let outcome = self
            .outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(format!("ok from {}", self.name)));

        match outcome {
            Ok(text) => Ok(AdapterResponse {
                usage: Usage::estimate(request.prompt_chars(), text.len()),
                text,
            }),
            Err(class) => Err(ProviderError::new(
                &self.name,
                model,
                class,
                format!("scripted {} failure", class),
            )),
        }
    }
}
