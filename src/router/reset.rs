//! Daily quota reset timer
//!
//! One self-rescheduling task sleeps until the next reset boundary of the
//! quota clock, clears every model's usage, then computes the following
//! boundary. Recomputing each day keeps the timer aligned with wall-clock
//! midnight even after long sleeps drift.

use crate::models::health::HealthTracker;
use chrono::Utc;
use std::sync::Arc;

/// Spawn the reset loop and a task that reports if it ever stops
pub fn start_reset_timer(health: Arc<HealthTracker>) {
    let handle = tokio::spawn(async move {
        loop {
            let wait = health.clock().until_next_reset(Utc::now());
            tracing::info!(
                next_reset_in_secs = wait.as_secs(),
                "Quota reset scheduled"
            );

            tokio::time::sleep(wait).await;
            health.reset_all_rpd().await;
        }
    });

    tokio::spawn(async move {
        match handle.await {
            Ok(_) => {
                tracing::error!(
                    "Quota reset task terminated unexpectedly. \
                    Exhausted models will stay unavailable until server restart."
                );
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Quota reset task panicked. \
                    Exhausted models will stay unavailable until server restart."
                );
            }
        }
    });
}
