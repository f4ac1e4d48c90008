//! Routing model: capabilities, provider health and candidate selection
//!
//! The intent matrix maps intents to capability requirements, the health
//! tracker keeps per-provider reliability and quota usage, and the selector
//! combines both into a ranked candidate list.

pub mod capability;
pub mod health;
pub mod quota_clock;
pub mod selector;

pub use capability::{Capability, CapabilitySet, IntentMatrix, PriorityStrategy, Requirement};
pub use health::{HealthRecord, HealthTracker, ProviderHealth, QuotaUsage};
pub use quota_clock::QuotaClock;
pub use selector::{Candidate, CandidateSelector, Selection};
