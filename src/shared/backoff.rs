//! Exponential backoff for in-adapter retries

/// Maximum backoff duration in milliseconds (2 minutes)
///
/// Prevents unbounded sleeps from exponential growth. With base=15s:
/// - Retry 3 would be 60 seconds (under cap)
/// - Retry 5 would be 240 seconds (capped to 120s)
pub const MAX_BACKOFF_MS: u64 = 120_000;

/// Calculate exponential backoff with overflow protection
///
/// The formula is `base * 2^(attempt-1)`, capped at [`MAX_BACKOFF_MS`].
///
/// # Arguments
/// * `base_ms` - Backoff before the first retry
/// * `attempt` - Current retry number (1-indexed)
///
/// # Examples
/// With base=15000ms:
/// - Retry 1: 15,000ms
/// - Retry 2: 30,000ms
/// - Retry 3: 60,000ms
pub fn calculate_backoff(base_ms: u64, attempt: usize) -> u64 {
    let exponent = u32::try_from(attempt).unwrap_or(u32::MAX).saturating_sub(1);
    base_ms
        .saturating_mul(2_u64.saturating_pow(exponent))
        .min(MAX_BACKOFF_MS)
}
