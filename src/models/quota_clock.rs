//! Quota day boundaries in the providers' reference timezone
//!
//! Daily quotas reset at local midnight of a fixed UTC offset, independent of
//! the host timezone. A small margin past midnight avoids racing the vendor's
//! own reset.

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, TimeZone, Utc};
use std::time::Duration;

/// Default reference offset: UTC-8 (Pacific standard time)
pub const DEFAULT_RESET_UTC_OFFSET_MINUTES: i32 = -8 * 60;
/// Default margin past midnight before the reset fires
pub const DEFAULT_RESET_MARGIN_SECONDS: u64 = 30;

/// Current wall-clock time as epoch milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaClock {
    offset: FixedOffset,
    margin: Duration,
}

impl QuotaClock {
    /// Returns `None` if the offset is outside ±24h
    pub fn new(utc_offset_minutes: i32, margin: Duration) -> Option<Self> {
        let offset = FixedOffset::east_opt(utc_offset_minutes.checked_mul(60)?)?;
        Some(Self { offset, margin })
    }

    /// Quota day ("YYYY-MM-DD") containing `now`
    pub fn date_at(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.offset)
            .format("%Y-%m-%d")
            .to_string()
    }

    /// Current quota day
    pub fn today(&self) -> String {
        self.date_at(Utc::now())
    }

    /// First reset instant strictly after `now` (next local midnight plus margin)
    pub fn next_reset_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let margin = ChronoDuration::from_std(self.margin).unwrap_or(ChronoDuration::zero());
        let local = now.with_timezone(&self.offset);

        let midnight = local
            .date_naive()
            .succ_opt()
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .and_then(|naive| self.offset.from_local_datetime(&naive).single())
            .map(|dt| dt.with_timezone(&Utc));

        match midnight {
            Some(midnight) => {
                // Between midnight and midnight+margin the current day's reset
                // has not fired yet.
                let today_reset = midnight - ChronoDuration::days(1) + margin;
                if now < today_reset {
                    today_reset
                } else {
                    midnight + margin
                }
            }
            None => now + ChronoDuration::days(1),
        }
    }

    /// Epoch ms of the next reset boundary
    pub fn next_reset_ms(&self) -> i64 {
        self.next_reset_after(Utc::now()).timestamp_millis()
    }

    /// Time remaining until the next reset boundary
    pub fn until_next_reset(&self, now: DateTime<Utc>) -> Duration {
        (self.next_reset_after(now) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for QuotaClock {
    fn default() -> Self {
        Self::new(
            DEFAULT_RESET_UTC_OFFSET_MINUTES,
            Duration::from_secs(DEFAULT_RESET_MARGIN_SECONDS),
        )
        .expect("default QuotaClock offset must be valid")
    }
}
