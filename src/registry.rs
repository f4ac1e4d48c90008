//! Built-in provider registry
//!
//! Used when the config file declares no `[[providers]]`. Limits reflect
//! the vendors' free tiers; override them in config.toml when on a paid plan.

use crate::config::{ModelConfig, ProviderConfig, ProviderFamily};
use crate::models::capability::{Capability, CapabilitySet};

fn caps(list: &[Capability]) -> CapabilitySet {
    list.iter().copied().collect()
}

/// Known providers in registration order (ties in scoring go to earlier entries)
pub fn builtin_providers() -> Vec<ProviderConfig> {
    use Capability::*;

    vec![
        ProviderConfig::new(
            "gemini",
            ProviderFamily::Gemini,
            "GEMINI_API_KEY",
            "https://generativelanguage.googleapis.com/v1beta",
            vec![
                ModelConfig::new(
                    "gemini-2.5-pro",
                    Some(100),
                    caps(&[Text, Json, Vision, Tools, LongContext, Reasoning, Premium]),
                ),
                ModelConfig::new(
                    "gemini-2.5-flash",
                    Some(250),
                    caps(&[Text, Json, Vision, Tools, LongContext, Premium]),
                ),
                ModelConfig::new(
                    "gemini-2.5-flash-lite",
                    Some(1000),
                    caps(&[Text, Json, Vision, LongContext]),
                ),
            ],
        )
        .with_rpm(10)
        .with_min_interval_ms(2_500),
        ProviderConfig::new(
            "groq",
            ProviderFamily::OpenaiCompatible,
            "GROQ_API_KEY",
            "https://api.groq.com/openai/v1",
            vec![
                ModelConfig::new(
                    "llama-3.3-70b-versatile",
                    Some(1000),
                    caps(&[Text, Json, Tools]),
                ),
                ModelConfig::new("llama-3.1-8b-instant", Some(14_400), caps(&[Text, Json])),
            ],
        )
        .with_rpm(30),
        ProviderConfig::new(
            "cerebras",
            ProviderFamily::OpenaiCompatible,
            "CEREBRAS_API_KEY",
            "https://api.cerebras.ai/v1",
            vec![ModelConfig::new(
                "qwen-3-235b-a22b-instruct-2507",
                Some(14_400),
                caps(&[Text, Json, LongContext]),
            )],
        )
        .with_rpm(30),
        ProviderConfig::new(
            "mistral",
            ProviderFamily::OpenaiCompatible,
            "MISTRAL_API_KEY",
            "https://api.mistral.ai/v1",
            vec![
                ModelConfig::new(
                    "mistral-small-latest",
                    None,
                    caps(&[Text, Json, Tools, Vision]),
                ),
            ],
        )
        .with_rpm(60)
        .with_weight(0.8),
        ProviderConfig::new(
            "openrouter",
            ProviderFamily::OpenaiCompatible,
            "OPENROUTER_API_KEY",
            "https://openrouter.ai/api/v1",
            vec![ModelConfig::new(
                "deepseek/deepseek-chat-v3-0324:free",
                Some(50),
                caps(&[Text, Json]),
            )],
        )
        .with_rpm(20)
        .with_weight(0.6),
    ]
}
