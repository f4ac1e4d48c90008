//! Capability tags and the intent matrix
//!
//! Capabilities form a closed set stored as a bitset, so the
//! "requires ⊆ provides" check is a single mask comparison.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A declared ability of a specific provider model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Plain text chat
    Text,
    /// Reliable structured (JSON) output
    Json,
    /// Image input
    Vision,
    /// Function / tool calling
    Tools,
    /// Very long input context
    LongContext,
    /// Extended reasoning
    Reasoning,
    /// Premium tier able to follow the three-stream response grammar.
    /// Capacity constrained, so non-premium work is steered away from it.
    #[serde(alias = "tristream")]
    Premium,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::Text,
        Capability::Json,
        Capability::Vision,
        Capability::Tools,
        Capability::LongContext,
        Capability::Reasoning,
        Capability::Premium,
    ];

    fn bit(self) -> u8 {
        1 << (self as u8)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Vision => "vision",
            Self::Tools => "tools",
            Self::LongContext => "long_context",
            Self::Reasoning => "reasoning",
            Self::Premium => "premium",
        }
    }
}

/// Set of capabilities backed by a bitmask
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "Vec<Capability>", into = "Vec<Capability>")]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.insert(capability);
        self
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// True when every capability in `required` is also in `self`
    pub fn is_superset_of(&self, required: &CapabilitySet) -> bool {
        self.0 & required.0 == required.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = Self::empty();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

impl From<Vec<Capability>> for CapabilitySet {
    fn from(caps: Vec<Capability>) -> Self {
        caps.into_iter().collect()
    }
}

impl From<CapabilitySet> for Vec<Capability> {
    fn from(set: CapabilitySet) -> Self {
        set.iter().collect()
    }
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter().map(|c| c.as_str())).finish()
    }
}

/// How candidates are ranked for an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityStrategy {
    /// Best model wins, premium models compete at full score
    Quality,
    /// Premium models are derated so cheaper capacity is used first
    Speed,
}

/// Capability requirement and ranking strategy for one intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub requires: CapabilitySet,
    pub priority: PriorityStrategy,
}

impl Requirement {
    pub fn new(requires: CapabilitySet, priority: PriorityStrategy) -> Self {
        Self { requires, priority }
    }

    /// Requirement whose strategy follows from its tags: intents that need the
    /// premium capability rank by quality, everything else by speed.
    pub fn derived(requires: CapabilitySet) -> Self {
        let priority = if requires.contains(Capability::Premium) {
            PriorityStrategy::Quality
        } else {
            PriorityStrategy::Speed
        };
        Self { requires, priority }
    }
}

impl<'de> Deserialize<'de> for Requirement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Raw {
            requires: CapabilitySet,
            #[serde(default)]
            priority: Option<PriorityStrategy>,
        }

        let raw = Raw::deserialize(deserializer)?;
        Ok(match raw.priority {
            Some(priority) => Requirement::new(raw.requires, priority),
            None => Requirement::derived(raw.requires),
        })
    }
}

/// Intent name used when a caller asks for an unknown intent
pub const FALLBACK_INTENT: &str = "chat";

/// Result of resolving an intent name against the matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedIntent {
    pub requirement: Requirement,
    /// True when the requested intent was unknown and `chat` was used instead
    pub fell_back: bool,
}

/// Static mapping from intent name to requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentMatrix {
    intents: BTreeMap<String, Requirement>,
}

impl IntentMatrix {
    /// Built-in intents
    pub fn builtin() -> Self {
        use Capability::*;
        let mut intents = BTreeMap::new();
        intents.insert(
            "chat".to_string(),
            Requirement::derived(CapabilitySet::empty().with(Text)),
        );
        intents.insert(
            "decision".to_string(),
            Requirement::derived(CapabilitySet::empty().with(Text).with(Json)),
        );
        intents.insert(
            "vision".to_string(),
            Requirement::new(
                CapabilitySet::empty().with(Text).with(Vision),
                PriorityStrategy::Quality,
            ),
        );
        intents.insert(
            "tools".to_string(),
            Requirement::derived(CapabilitySet::empty().with(Text).with(Tools)),
        );
        intents.insert(
            "summarize".to_string(),
            Requirement::derived(CapabilitySet::empty().with(Text).with(LongContext)),
        );
        intents.insert(
            "reflection".to_string(),
            Requirement::derived(CapabilitySet::empty().with(Text).with(Premium)),
        );
        Self { intents }
    }

    /// Built-in intents with `overrides` replacing or adding entries
    pub fn with_overrides(overrides: &BTreeMap<String, Requirement>) -> Self {
        let mut matrix = Self::builtin();
        for (name, requirement) in overrides {
            matrix.intents.insert(name.clone(), *requirement);
        }
        matrix
    }

    pub fn get(&self, intent: &str) -> Option<&Requirement> {
        self.intents.get(intent)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.intents.keys().map(String::as_str)
    }

    /// Resolve an intent, falling back to `chat` for unknown names
    ///
    /// Returns `None` only if the matrix has no `chat` entry, which config
    /// validation rules out.
    pub fn resolve(&self, intent: &str) -> Option<ResolvedIntent> {
        if let Some(requirement) = self.intents.get(intent) {
            return Some(ResolvedIntent {
                requirement: *requirement,
                fell_back: false,
            });
        }

        tracing::warn!(
            intent = %intent,
            fallback = FALLBACK_INTENT,
            "Unknown intent, using chat requirements"
        );
        self.intents
            .get(FALLBACK_INTENT)
            .map(|requirement| ResolvedIntent {
                requirement: *requirement,
                fell_back: true,
            })
    }
}

impl Default for IntentMatrix {
    fn default() -> Self {
        Self::builtin()
    }
}
