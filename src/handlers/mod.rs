//! Read-only HTTP status surface
//!
//! Exposes provider health and Prometheus metrics. Completions are served
//! through the library API and the CLI, never over HTTP.

use crate::metrics::Metrics;
use crate::middleware::request_id::request_id_middleware;
use crate::router::Router;
use axum::routing::get;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub mod health;
pub mod metrics;

/// Application state shared across all handlers
///
/// Cloning is cheap: the router is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    router: Arc<Router>,
}

impl AppState {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn metrics(&self) -> &Metrics {
        self.router.metrics()
    }
}

/// Status routes with request ids and HTTP tracing
pub fn app(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(request_id_middleware)),
        )
        .with_state(state)
}
