//! Maps vendor failures onto [`ErrorClass`]
//!
//! Every adapter family funnels its HTTP status and error body through
//! [`classify`], so the retry and cooldown policy stays the same across
//! vendors.

use crate::error::ErrorClass;
use serde::Deserialize;

const QUOTA_MARKERS: &[&str] = &["resource_exhausted", "quota", "rpd", "per day"];
const OVERLOAD_MARKERS: &[&str] = &["unavailable", "overloaded"];

/// Classify a failed call from its HTTP status (if any) and error text
pub fn classify(status: Option<u16>, body: &str) -> ErrorClass {
    let lower = body.to_ascii_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    match status {
        Some(401 | 402) => ErrorClass::Fatal,
        Some(429) if has(QUOTA_MARKERS) => ErrorClass::Quota,
        Some(429) => ErrorClass::RateLimit,
        Some(503 | 529) => ErrorClass::Overload,
        _ if has(QUOTA_MARKERS) => ErrorClass::Quota,
        _ if has(OVERLOAD_MARKERS) => ErrorClass::Overload,
        _ => ErrorClass::Generic,
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Human-readable message from a vendor error body
///
/// Understands the `{"error": {"message", "status"}}` envelope both vendor
/// families use; falls back to the raw body, truncated.
pub fn error_message(body: &str) -> String {
    const MAX_LEN: usize = 300;

    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        let message = envelope.error.message.unwrap_or_default();
        return match envelope.error.status {
            Some(status) if !status.is_empty() => format!("{}: {}", status, message),
            _ => message,
        };
    }

    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_LEN {
        let truncated: String = trimmed.chars().take(MAX_LEN).collect();
        format!("{}...", truncated)
    } else {
        trimmed.to_string()
    }
}
