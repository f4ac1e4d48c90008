//! Minimum spacing between call starts for one adapter
//!
//! Callers queue on a fair mutex, so concurrent calls start in arrival order
//! and never closer together than the configured interval.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct Throttle {
    interval: Option<Duration>,
    last_start: Mutex<Option<Instant>>,
}

impl Throttle {
    /// `None` disables throttling
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval: interval.filter(|d| !d.is_zero()),
            last_start: Mutex::new(None),
        }
    }

    /// Wait for this caller's turn
    ///
    /// The lock is held across the sleep so later callers queue behind.
    pub async fn acquire(&self) {
        let Some(interval) = self.interval else {
            return;
        };

        let mut last = self.last_start.lock().await;
        if let Some(previous) = *last {
            let ready = previous + interval;
            if ready > Instant::now() {
                tracing::trace!(
                    wait_ms = (ready - Instant::now()).as_millis() as u64,
                    "Throttling call start"
                );
                tokio::time::sleep_until(ready).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_disabled_throttle_does_not_wait() {
        let throttle = Throttle::new(None);
        let start = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_calls_spaced_by_interval() {
        let throttle = Throttle::new(Some(Duration::from_millis(2_500)));
        let start = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        throttle.acquire().await;
        assert!(Instant::now() - start >= Duration::from_millis(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_start_in_order() {
        let throttle = Arc::new(Throttle::new(Some(Duration::from_secs(1))));
        let origin = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let throttle = throttle.clone();
            handles.push(tokio::spawn(async move {
                throttle.acquire().await;
                Instant::now() - origin
            }));
        }

        let mut starts = Vec::new();
        for handle in handles {
            starts.push(handle.await.unwrap());
        }
        starts.sort();
        assert!(starts[1] - starts[0] >= Duration::from_secs(1));
        assert!(starts[2] - starts[1] >= Duration::from_secs(1));
    }
}
