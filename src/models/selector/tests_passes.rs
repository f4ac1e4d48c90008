//! Strict and relaxed pass tests
//!
//! Tests availability filtering: cooled providers, exhausted quotas,
//! adapters without usable keys, and the relaxed fallback pass.

use super::test_fixtures::{THREE_PROVIDERS, fixture, fixture_with_keys};

fn providers(selection: &super::Selection) -> Vec<&str> {
    selection
        .candidates
        .iter()
        .map(|c| c.provider.as_str())
        .collect()
}

#[tokio::test]
async fn test_strict_pass_lists_every_matching_pair() {
    let f = fixture(THREE_PROVIDERS).await;
    let selection = f.selector.select("chat").await;

    assert!(!selection.relaxed);
    assert_eq!(selection.intent, "chat");
    assert_eq!(selection.candidates.len(), 3);
}

#[tokio::test]
async fn test_requirement_filters_by_capability() {
    let f = fixture(THREE_PROVIDERS).await;

    let selection = f.selector.select("vision").await;
    assert_eq!(providers(&selection), vec!["seer"]);

    let selection = f.selector.select("decision").await;
    assert_eq!(selection.candidates.len(), 2);
    assert!(!providers(&selection).contains(&"seer"));
}

#[tokio::test]
async fn test_cooled_provider_excluded_from_strict_pass() {
    let f = fixture(THREE_PROVIDERS).await;
    f.health.on_error("basic").await.unwrap();

    let selection = f.selector.select("decision").await;
    assert!(!selection.relaxed);
    assert_eq!(providers(&selection), vec!["premium"]);
}

#[tokio::test]
async fn test_adapter_without_free_key_excluded_from_strict_pass() {
    let f = fixture(THREE_PROVIDERS).await;
    f.adapters["premium"].set_available(false);

    let selection = f.selector.select("decision").await;
    assert_eq!(providers(&selection), vec!["basic"]);
}

#[tokio::test]
async fn test_relaxed_pass_when_nothing_available() {
    let f = fixture(THREE_PROVIDERS).await;
    f.health.on_error("premium").await.unwrap();
    f.health.on_overloaded("basic").await.unwrap();

    let selection = f.selector.select("decision").await;
    assert!(selection.relaxed);
    assert_eq!(selection.candidates.len(), 2);
}

#[tokio::test]
async fn test_relaxed_pass_still_requires_a_key() {
    let f = fixture_with_keys(THREE_PROVIDERS, &[("seer", 0)]).await;

    let selection = f.selector.select("vision").await;
    assert!(selection.candidates.is_empty());
}

#[tokio::test]
async fn test_unknown_intent_uses_chat_requirement() {
    let f = fixture(THREE_PROVIDERS).await;
    let selection = f.selector.select("haiku").await;

    assert_eq!(selection.intent, "chat");
    assert_eq!(selection.candidates.len(), 3);
}

#[tokio::test]
async fn test_unserved_capability_yields_no_candidates() {
    let f = fixture(THREE_PROVIDERS).await;
    // No model in the fixture declares long_context
    let selection = f.selector.select("summarize").await;

    assert!(selection.candidates.is_empty());
    assert!(selection.relaxed);
}
