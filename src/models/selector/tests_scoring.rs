//! Scoring and ordering tests
//!
//! Tests the score formula (health × weight), premium derating for
//! speed-ranked intents, and deterministic tie-breaking.

use super::test_fixtures::{THREE_PROVIDERS, fixture};
use super::{PREMIUM_DERATE, candidate_score};
use crate::models::capability::{Capability, CapabilitySet, PriorityStrategy};

#[test]
fn test_candidate_score_multiplies_weight() {
    let caps = CapabilitySet::empty().with(Capability::Text);
    assert_eq!(candidate_score(0.8, 0.5, caps, PriorityStrategy::Speed), 0.4);
}

#[test]
fn test_premium_derated_only_for_speed() {
    let premium = CapabilitySet::empty()
        .with(Capability::Text)
        .with(Capability::Premium);
    assert_eq!(
        candidate_score(1.0, 1.0, premium, PriorityStrategy::Speed),
        PREMIUM_DERATE
    );
    assert_eq!(
        candidate_score(1.0, 1.0, premium, PriorityStrategy::Quality),
        1.0
    );
}

#[tokio::test]
async fn test_speed_intent_ranks_non_premium_first() {
    let f = fixture(THREE_PROVIDERS).await;
    // "decision" ranks by speed; premium and basic have identical health
    let selection = f.selector.select("decision").await;

    assert_eq!(selection.candidates[0].provider, "basic");
    assert_eq!(selection.candidates[1].provider, "premium");
    assert!(selection.candidates[1].score < selection.candidates[0].score);
}

#[tokio::test]
async fn test_quality_intent_keeps_premium_at_full_score() {
    let f = fixture(THREE_PROVIDERS).await;
    let selection = f.selector.select("reflection").await;

    assert_eq!(selection.candidates.len(), 1);
    assert_eq!(selection.candidates[0].provider, "premium");
    assert_eq!(selection.candidates[0].score, 1.0);
}

#[tokio::test]
async fn test_weight_scales_score() {
    let f = fixture(THREE_PROVIDERS).await;
    let selection = f.selector.select("vision").await;
    assert_eq!(selection.candidates[0].score, 0.5);
}

#[tokio::test(start_paused = true)]
async fn test_quota_usage_lowers_rank() {
    let f = fixture(THREE_PROVIDERS).await;
    for _ in 0..50 {
        f.health.on_success("basic", "fast").await.unwrap();
    }

    // basic: (1 - 50/100) = 0.5; premium derated: 0.3
    let selection = f.selector.select("decision").await;
    assert_eq!(selection.candidates[0].provider, "basic");
    assert!((selection.candidates[0].score - 0.5).abs() < 1e-9);

    for _ in 0..30 {
        f.health.on_success("basic", "fast").await.unwrap();
    }
    // basic now 0.2, below the derated premium
    let selection = f.selector.select("decision").await;
    assert_eq!(selection.candidates[0].provider, "premium");
}

#[tokio::test]
async fn test_ties_keep_registration_order() {
    let toml = r#"
[[providers]]
name = "first"
family = "openai_compatible"
credential_env = "FIRST_KEY"
base_url = "http://localhost:9101"

[[providers.models]]
name = "m"
capabilities = ["text"]

[[providers]]
name = "second"
family = "openai_compatible"
credential_env = "SECOND_KEY"
base_url = "http://localhost:9102"

[[providers.models]]
name = "m"
capabilities = ["text"]
"#;
    let f = fixture(toml).await;
    for _ in 0..5 {
        let selection = f.selector.select("chat").await;
        assert_eq!(selection.candidates[0].provider, "first");
        assert_eq!(selection.candidates[1].provider, "second");
    }
}
