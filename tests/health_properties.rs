//! Property tests for health scores and candidate ranking
//!
//! Whatever sequence of outcomes a provider sees, reliability and scores
//! stay within [0, 1] and ranking stays a descending order.

use proptest::prelude::*;
use quotaroute::config::{ModelConfig, ProviderConfig, ProviderFamily};
use quotaroute::error::ErrorClass;
use quotaroute::models::capability::{Capability, CapabilitySet, PriorityStrategy};
use quotaroute::models::health::HealthTracker;
use quotaroute::models::quota_clock::QuotaClock;
use quotaroute::models::selector::candidate_score;
use quotaroute::persistence::{MemoryStore, QuotaState};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
enum Event {
    Success,
    Failure(ErrorClass),
    Reset,
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        3 => Just(Event::Success),
        1 => Just(Event::Failure(ErrorClass::Quota)),
        1 => Just(Event::Failure(ErrorClass::RateLimit)),
        1 => Just(Event::Failure(ErrorClass::Overload)),
        1 => Just(Event::Failure(ErrorClass::Fatal)),
        1 => Just(Event::Failure(ErrorClass::Generic)),
        1 => Just(Event::Reset),
    ]
}

fn provider(rpd: Option<u32>) -> ProviderConfig {
    ProviderConfig::new(
        "p",
        ProviderFamily::OpenaiCompatible,
        "P_KEY",
        "http://localhost:1234",
        vec![ModelConfig::new(
            "m",
            rpd,
            CapabilitySet::empty().with(Capability::Text),
        )],
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn reliability_and_score_stay_in_unit_interval(
        rpd in prop::option::of(1u32..50),
        events in prop::collection::vec(event(), 0..60),
    ) {
        tokio_test::block_on(async {
            let tracker = Arc::new(HealthTracker::new(
                QuotaClock::default(),
                Arc::new(MemoryStore::<QuotaState>::new("quota")),
                Duration::from_secs(3600),
            ));
            tracker.register(&provider(rpd), 1).await;

            for event in events {
                match event {
                    Event::Success => tracker.on_success("p", "m").await.unwrap(),
                    Event::Failure(class) => {
                        tracker.record_failure("p", "m", class, false).await.unwrap()
                    }
                    Event::Reset => tracker.reset_all_rpd().await,
                }

                let record = tracker.record("p").await.unwrap();
                assert!((0.0..=1.0).contains(&record.reliability()));
                let score = tracker.score("p", "m").await;
                assert!((0.0..=1.0).contains(&score), "score out of range: {}", score);
            }
        });
    }

    #[test]
    fn candidate_score_never_exceeds_weighted_health(
        health in 0.0f64..=1.0,
        weight in 0.01f64..10.0,
        premium in any::<bool>(),
        speed in any::<bool>(),
    ) {
        let mut caps = CapabilitySet::empty().with(Capability::Text);
        if premium {
            caps.insert(Capability::Premium);
        }
        let priority = if speed { PriorityStrategy::Speed } else { PriorityStrategy::Quality };

        let score = candidate_score(health, weight, caps, priority);
        prop_assert!(score >= 0.0);
        prop_assert!(score <= health * weight + f64::EPSILON);
        if premium && speed {
            prop_assert!(score < health * weight || health == 0.0);
        }
    }

    #[test]
    fn finite_quota_exhausts_at_margin(rpd in 1u32..200) {
        tokio_test::block_on(async {
            let tracker = Arc::new(HealthTracker::new(
                QuotaClock::default(),
                Arc::new(MemoryStore::<QuotaState>::new("quota")),
                Duration::from_secs(3600),
            ));
            tracker.register(&provider(Some(rpd)), 1).await;

            for _ in 0..rpd {
                tracker.on_success("p", "m").await.unwrap();
            }
            assert!(!tracker.is_available("p", "m").await);
        });
    }
}
