//! Configuration management for quotaroute
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Provider and intent tables fall back to the built-in registry when the
//! file does not declare them.

use crate::error::{AppError, AppResult};
use crate::models::capability::{FALLBACK_INTENT, CapabilitySet, IntentMatrix, Requirement};
use crate::models::quota_clock::{
    DEFAULT_RESET_MARGIN_SECONDS, DEFAULT_RESET_UTC_OFFSET_MINUTES, QuotaClock,
};
use crate::registry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default = "registry::builtin_providers")]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub intents: BTreeMap<String, Requirement>,
}

/// Status server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Routing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Hard timeout for each vendor network call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl RoutingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Quota day configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuotaConfig {
    /// Offset of the reference timezone whose midnight resets daily quotas
    #[serde(default = "default_reset_offset")]
    pub reset_utc_offset_minutes: i32,
    /// Safety margin past midnight before counters are cleared
    #[serde(default = "default_reset_margin")]
    pub reset_margin_seconds: u64,
}

fn default_reset_offset() -> i32 {
    DEFAULT_RESET_UTC_OFFSET_MINUTES
}

fn default_reset_margin() -> u64 {
    DEFAULT_RESET_MARGIN_SECONDS
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            reset_utc_offset_minutes: default_reset_offset(),
            reset_margin_seconds: default_reset_margin(),
        }
    }
}

/// In-adapter retry policy for overload-class errors
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Base backoff in milliseconds (doubles each retry)
    #[serde(default = "default_overload_backoff")]
    pub overload_backoff_ms: u64,
    #[serde(default = "default_max_overload_retries")]
    pub max_overload_retries: usize,
}

fn default_overload_backoff() -> u64 {
    15_000
}

fn default_max_overload_retries() -> usize {
    2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            overload_backoff_ms: default_overload_backoff(),
            max_overload_retries: default_max_overload_retries(),
        }
    }
}

/// Advisory state file locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_quota_path")]
    pub quota_path: String,
    #[serde(default = "default_cooldown_path")]
    pub cooldown_path: String,
    /// Window within which quota writes are coalesced
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_quota_path() -> String {
    "state/quota.json".to_string()
}

fn default_cooldown_path() -> String {
    "state/cooldowns.json".to_string()
}

fn default_debounce_ms() -> u64 {
    1_000
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quota_path: default_quota_path(),
            cooldown_path: default_cooldown_path(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Wire protocol spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    /// Google Gemini `generateContent`
    Gemini,
    /// Any `/chat/completions` endpoint (Groq, OpenRouter, Mistral, ...)
    OpenaiCompatible,
}

/// One model offered by a provider
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    name: String,
    /// Requests per day; absent means unbounded
    #[serde(default)]
    rpd: Option<u32>,
    capabilities: CapabilitySet,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>, rpd: Option<u32>, capabilities: CapabilitySet) -> Self {
        Self {
            name: name.into(),
            rpd,
            capabilities,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rpd(&self) -> Option<u32> {
        self.rpd
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }
}

/// Provider registry entry
///
/// Fields are private; configuration is loaded via deserialization and
/// validated by `Config::validate()`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    name: String,
    family: ProviderFamily,
    /// Environment variable holding one key or a comma-separated key list
    credential_env: String,
    base_url: String,
    /// Default per-key requests-per-minute
    #[serde(default)]
    rpm: Option<u32>,
    /// Explicit floor between call starts; overrides the rpm-derived interval
    #[serde(default)]
    min_interval_ms: Option<u64>,
    /// Multiplier applied to this provider's candidate scores
    #[serde(default = "default_weight")]
    weight: f64,
    models: Vec<ModelConfig>,
}

fn default_weight() -> f64 {
    1.0
}

impl ProviderConfig {
    pub fn new(
        name: impl Into<String>,
        family: ProviderFamily,
        credential_env: impl Into<String>,
        base_url: impl Into<String>,
        models: Vec<ModelConfig>,
    ) -> Self {
        Self {
            name: name.into(),
            family,
            credential_env: credential_env.into(),
            base_url: base_url.into(),
            rpm: None,
            min_interval_ms: None,
            weight: default_weight(),
            models,
        }
    }

    pub fn with_rpm(mut self, rpm: u32) -> Self {
        self.rpm = Some(rpm);
        self
    }

    pub fn with_min_interval_ms(mut self, ms: u64) -> Self {
        self.min_interval_ms = Some(ms);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> ProviderFamily {
        self.family
    }

    pub fn credential_env(&self) -> &str {
        &self.credential_env
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn rpm(&self) -> Option<u32> {
        self.rpm
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn models(&self) -> &[ModelConfig] {
        &self.models
    }

    pub fn model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Minimum spacing between call starts for this provider's adapter
    ///
    /// An explicit `min_interval_ms` wins. Otherwise the per-key `rpm` is
    /// spread over the whole key pool. `None` disables throttling.
    pub fn throttle_interval(&self, key_count: usize) -> Option<Duration> {
        if let Some(ms) = self.min_interval_ms {
            return (ms > 0).then(|| Duration::from_millis(ms));
        }
        let rpm = self.rpm.filter(|r| *r > 0)?;
        let pool_rpm = u64::from(rpm).saturating_mul(key_count.max(1) as u64);
        Some(Duration::from_millis(60_000 / pool_rpm))
    }

    /// Split a raw credential value into keys
    pub fn parse_keys(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Read this provider's keys from the process environment
    pub fn load_keys(&self) -> Vec<String> {
        std::env::var(&self.credential_env)
            .map(|raw| Self::parse_keys(&raw))
            .unwrap_or_default()
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        let config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Built-in intent matrix with this config's overrides applied
    pub fn intent_matrix(&self) -> IntentMatrix {
        IntentMatrix::with_overrides(&self.intents)
    }

    pub fn quota_clock(&self) -> AppResult<QuotaClock> {
        QuotaClock::new(
            self.quota.reset_utc_offset_minutes,
            Duration::from_secs(self.quota.reset_margin_seconds),
        )
        .ok_or_else(|| {
            AppError::Config(format!(
                "quota.reset_utc_offset_minutes must be within ±1440, got {}",
                self.quota.reset_utc_offset_minutes
            ))
        })
    }

    /// Validate configuration after parsing
    ///
    /// Called automatically by `from_file()`, and explicitly when a config
    /// is built in code (e.g. tests).
    pub fn validate(&self) -> AppResult<()> {
        if self.routing.request_timeout_seconds == 0 {
            return Err(AppError::Config(
                "routing.request_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.routing.request_timeout_seconds > 300 {
            return Err(AppError::Config(format!(
                "routing.request_timeout_seconds cannot exceed 300 seconds, got {}",
                self.routing.request_timeout_seconds
            )));
        }

        self.quota_clock()?;

        if self.providers.is_empty() {
            return Err(AppError::Config(
                "at least one [[providers]] entry is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.name.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate provider name '{}'",
                    provider.name
                )));
            }

            if provider.models.is_empty() {
                return Err(AppError::Config(format!(
                    "provider '{}' declares no models",
                    provider.name
                )));
            }

            if provider.credential_env.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "provider '{}' has an empty credential_env",
                    provider.name
                )));
            }

            if !provider.base_url.starts_with("http://") && !provider.base_url.starts_with("https://")
            {
                return Err(AppError::Config(format!(
                    "provider '{}' has invalid base_url '{}'. \
                    base_url must start with 'http://' or 'https://'.",
                    provider.name, provider.base_url
                )));
            }

            if provider.weight <= 0.0 || !provider.weight.is_finite() {
                return Err(AppError::Config(format!(
                    "provider '{}' has invalid weight {}. Weight must be a positive finite number.",
                    provider.name, provider.weight
                )));
            }

            let mut model_names = HashSet::new();
            for model in &provider.models {
                if !model_names.insert(model.name.as_str()) {
                    return Err(AppError::Config(format!(
                        "provider '{}' declares model '{}' twice",
                        provider.name, model.name
                    )));
                }
                if model.rpd == Some(0) {
                    return Err(AppError::Config(format!(
                        "model '{}' of provider '{}' has rpd = 0; omit rpd for unbounded quota",
                        model.name, provider.name
                    )));
                }
                if model.capabilities.is_empty() {
                    return Err(AppError::Config(format!(
                        "model '{}' of provider '{}' declares no capabilities",
                        model.name, provider.name
                    )));
                }
            }
        }

        if self.intent_matrix().get(FALLBACK_INTENT).is_none() {
            return Err(AppError::Config(format!(
                "the '{}' intent must be defined",
                FALLBACK_INTENT
            )));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            routing: RoutingConfig::default(),
            quota: QuotaConfig::default(),
            retry: RetryConfig::default(),
            persistence: PersistenceConfig::default(),
            observability: ObservabilityConfig::default(),
            providers: registry::builtin_providers(),
            intents: BTreeMap::new(),
        }
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}
