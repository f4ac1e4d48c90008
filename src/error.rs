//! Error types for quotaroute
//!
//! Provider failures are classified into a small closed taxonomy
//! ([`ErrorClass`]) that drives both in-adapter retries and health tracking.

use serde::Serialize;
use thiserror::Error;

/// Common classification for every upstream failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Daily quota exhausted (429 with quota markers, `RESOURCE_EXHAUSTED`)
    Quota,
    /// Per-minute rate limit (429 without quota markers)
    RateLimit,
    /// Vendor overloaded (503, `UNAVAILABLE`, "overloaded")
    Overload,
    /// Authentication or billing failure (401/402)
    Fatal,
    /// Everything else: network, parse, timeout, empty response
    Generic,
}

impl ErrorClass {
    /// Label used for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quota => "quota",
            Self::RateLimit => "rate_limit",
            Self::Overload => "overload",
            Self::Fatal => "fatal",
            Self::Generic => "generic",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure from one provider adapter call
#[derive(Error, Debug, Clone)]
#[error("{provider}/{model} failed ({class}): {message}")]
pub struct ProviderError {
    pub provider: String,
    pub model: String,
    pub class: ErrorClass,
    /// HTTP status, when the failure came from a vendor response
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        class: ErrorClass,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            class,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Errors from health tracking operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HealthError {
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("unknown model '{model}' for provider '{provider}'")]
    UnknownModel { provider: String, model: String },
}

impl HealthError {
    /// Metric label for this error
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::UnknownProvider(_) => "unknown_provider",
            Self::UnknownModel { .. } => "unknown_model",
        }
    }
}

/// Errors reading or writing advisory state files
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on state file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("state file '{path}' is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file '{path}': {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("No provider has a usable credential (checked {checked} providers)")]
    NoCredentials { checked: usize },

    #[error("no provider available for intent '{intent}'")]
    NoCandidates { intent: String },

    #[error("all {attempted} candidates failed for intent '{intent}': {last}")]
    AllCandidatesFailed {
        intent: String,
        attempted: usize,
        #[source]
        last: ProviderError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Class of the last provider failure, when the error came from the failover loop
    pub fn provider_class(&self) -> Option<ErrorClass> {
        match self {
            Self::AllCandidatesFailed { last, .. } => Some(last.class),
            _ => None,
        }
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
