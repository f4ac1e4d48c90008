//! Candidate selection for an intent
//!
//! Enumerates every (provider, model) pair whose capabilities cover the
//! intent's requirement, filters by availability and ranks by health score.
//!
//! Production code is in this file, tests are organized in sibling modules:
//! - tests_passes: strict and relaxed availability passes, intent fallback
//! - tests_scoring: score formula, premium derating, tie ordering

#[cfg(test)]
mod test_fixtures;
#[cfg(test)]
mod tests_passes;
#[cfg(test)]
mod tests_scoring;

use crate::config::Config;
use crate::models::capability::{
    Capability, CapabilitySet, FALLBACK_INTENT, IntentMatrix, PriorityStrategy, Requirement,
};
use crate::models::health::HealthTracker;
use crate::providers::ProviderAdapter;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Score multiplier for premium models when the intent ranks by speed
pub const PREMIUM_DERATE: f64 = 0.3;

/// A ranked (provider, model) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub provider: String,
    pub model: String,
    pub score: f64,
}

/// Outcome of one selection
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Intent whose requirement was used (`chat` when the request's was unknown)
    pub intent: String,
    pub candidates: Vec<Candidate>,
    /// True when nothing was available and the relaxed pass produced the list
    pub relaxed: bool,
}

#[derive(Debug, Clone)]
struct ModelEntry {
    name: String,
    capabilities: CapabilitySet,
}

#[derive(Debug, Clone)]
struct ProviderEntry {
    name: String,
    weight: f64,
    models: Vec<ModelEntry>,
}

/// Ranks candidates from the provider registry, health state and adapters
pub struct CandidateSelector {
    providers: Vec<ProviderEntry>,
    matrix: IntentMatrix,
    health: Arc<HealthTracker>,
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl CandidateSelector {
    /// Create a selector over the configured providers
    ///
    /// Providers without an adapter are kept in the registry but never
    /// produce candidates.
    pub fn new(
        config: &Config,
        health: Arc<HealthTracker>,
        adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    ) -> Self {
        let providers = config
            .providers
            .iter()
            .map(|p| ProviderEntry {
                name: p.name().to_string(),
                weight: p.weight(),
                models: p
                    .models()
                    .iter()
                    .map(|m| ModelEntry {
                        name: m.name().to_string(),
                        capabilities: m.capabilities(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            providers,
            matrix: config.intent_matrix(),
            health,
            adapters,
        }
    }

    pub fn adapter(&self, provider: &str) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider)
    }

    /// Ranked candidates for `intent`
    ///
    /// Unknown intents use the `chat` requirement. An empty list means no
    /// registered model can serve the intent at all.
    pub async fn select(&self, intent: &str) -> Selection {
        let (effective, requirement) = match self.matrix.resolve(intent) {
            Some(resolved) if resolved.fell_back => (FALLBACK_INTENT, resolved.requirement),
            Some(resolved) => (intent, resolved.requirement),
            None => {
                tracing::error!(intent = %intent, "Intent matrix has no chat entry");
                return Selection {
                    intent: intent.to_string(),
                    candidates: Vec::new(),
                    relaxed: false,
                };
            }
        };

        let strict = self.rank(&requirement, true).await;
        if !strict.is_empty() {
            return Selection {
                intent: effective.to_string(),
                candidates: strict,
                relaxed: false,
            };
        }

        let relaxed = self.rank(&requirement, false).await;
        if !relaxed.is_empty() {
            tracing::warn!(
                intent = %effective,
                candidates = relaxed.len(),
                "No candidate currently available, trying exhausted candidates anyway"
            );
        }
        Selection {
            intent: effective.to_string(),
            candidates: relaxed,
            relaxed: true,
        }
    }

    /// Matching pairs, optionally filtered by availability, sorted by score
    async fn rank(&self, requirement: &Requirement, strict: bool) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for provider in &self.providers {
            let Some(adapter) = self.adapters.get(&provider.name) else {
                continue;
            };
            if adapter.key_count() == 0 {
                continue;
            }
            if strict && !adapter.is_available().await {
                continue;
            }

            for model in &provider.models {
                if !model.capabilities.is_superset_of(&requirement.requires) {
                    continue;
                }
                if strict && !self.health.is_available(&provider.name, &model.name).await {
                    continue;
                }

                let health_score = self.health.score(&provider.name, &model.name).await;
                candidates.push(Candidate {
                    provider: provider.name.clone(),
                    model: model.name.clone(),
                    score: candidate_score(
                        health_score,
                        provider.weight,
                        model.capabilities,
                        requirement.priority,
                    ),
                });
            }
        }

        // Stable sort: equal scores keep registration order
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates
    }
}

/// Health score scaled by provider weight, derated for premium models on
/// speed-ranked intents
pub fn candidate_score(
    health_score: f64,
    weight: f64,
    capabilities: CapabilitySet,
    priority: PriorityStrategy,
) -> f64 {
    let score = health_score * weight;
    if priority == PriorityStrategy::Speed && capabilities.contains(Capability::Premium) {
        score * PREMIUM_DERATE
    } else {
        score
    }
}
