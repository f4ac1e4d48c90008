//! quotaroute - quota-aware router across free-tier LLM providers
//!
//! Each completion request names an intent. The router picks every provider
//! model whose capabilities cover the intent, ranks them by reliability and
//! remaining daily quota, and tries them one at a time until one succeeds.
//! Quota exhaustion and key cooldowns are remembered across restarts.

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod persistence;
pub mod providers;
pub mod registry;
pub mod router;
pub mod shared;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, AppResult, ErrorClass, ProviderError};
pub use providers::{CompletionRequest, Message};
pub use router::{CompletionMeta, CompletionResult, Router};
