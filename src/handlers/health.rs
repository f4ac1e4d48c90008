//! Health endpoint
//!
//! Reports per-provider reliability, cooldowns and quota usage.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::handlers::AppState;
use crate::models::health::ProviderHealth;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "OK" when at least one provider model is available, else "unavailable"
    pub status: &'static str,
    /// "operational", or "degraded" once a health update has failed
    pub health_tracking_status: &'static str,
    pub providers: Vec<ProviderHealth>,
}

/// Health handler
///
/// Always returns 200 so load balancers keep the process in rotation while
/// quotas recover; callers read `status` for routing capacity.
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let health_tracking_status = if state.metrics().health_tracking_failures_count() > 0 {
        "degraded"
    } else {
        "operational"
    };

    let providers = state.router().health().snapshot().await;
    let any_available = providers
        .iter()
        .any(|p| p.models.iter().any(|m| m.available));

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: if any_available { "OK" } else { "unavailable" },
            health_tracking_status,
            providers,
        }),
    )
}
