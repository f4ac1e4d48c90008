//! Command-line interface for quotaroute

use clap::{Parser, Subcommand};

/// Quota-aware router across free-tier LLM providers
#[derive(Parser)]
#[command(name = "quotaroute")]
#[command(version)]
#[command(about = "Quota-aware router across free-tier LLM providers")]
#[command(
    long_about = "quotaroute sends each completion to the healthiest provider model able \
    to serve its intent, failing over on quota, rate limit and overload errors and \
    remembering exhausted quotas across restarts."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the quota reset timer and serve /health and /metrics (default)
    Serve,
    /// Send one completion and print the result as JSON
    Complete {
        /// Intent used to pick capable models
        #[arg(short, long, default_value = "chat")]
        intent: String,
        /// System instruction
        #[arg(short, long)]
        system: Option<String>,
        /// Ask for a JSON response
        #[arg(long)]
        json: bool,
        #[arg(long)]
        max_tokens: Option<u32>,
        /// User prompt
        prompt: String,
    },
    /// Print provider health as JSON
    Status,
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# quotaroute configuration
#
# Every section is optional. Without [[providers]] the built-in registry
# (gemini, groq, cerebras, mistral, openrouter) is used.

[server]
# Status surface (/health, /metrics). Not a completion endpoint.
host = "127.0.0.1"
port = 3000

[routing]
# Hard timeout for each vendor call, in seconds (1-300)
request_timeout_seconds = 60

[quota]
# Daily quotas reset at local midnight of this UTC offset (minutes)
reset_utc_offset_minutes = -480
# Wait this long past midnight before clearing usage
reset_margin_seconds = 30

[retry]
# Overload (503) retries inside one adapter call: 15s, then 30s
overload_backoff_ms = 15000
max_overload_retries = 2

[persistence]
enabled = true
quota_path = "state/quota.json"
cooldown_path = "state/cooldowns.json"
debounce_ms = 1000

[observability]
# trace, debug, info, warn, error (RUST_LOG overrides)
log_level = "info"

# Providers: keys come from the named environment variable, comma-separated
# for several keys. Providers without keys are skipped.
[[providers]]
name = "groq"
family = "openai_compatible"
credential_env = "GROQ_API_KEY"
base_url = "https://api.groq.com/openai/v1"
# Per-key requests per minute; spacing is spread over all keys
rpm = 30
weight = 1.0

[[providers.models]]
name = "llama-3.3-70b-versatile"
rpd = 1000
capabilities = ["text", "json", "tools"]

[[providers]]
name = "gemini"
family = "gemini"
credential_env = "GEMINI_API_KEY"
base_url = "https://generativelanguage.googleapis.com/v1beta"
rpm = 10

[[providers.models]]
name = "gemini-2.5-flash"
rpd = 250
capabilities = ["text", "json", "vision", "tools", "long_context", "reasoning", "premium"]

# Intents: override or add capability requirements
[intents.extract]
requires = ["text", "json"]
priority = "speed"
"#
}
