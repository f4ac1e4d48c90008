//! Structured logging setup

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Default filter when `RUST_LOG` is unset
pub fn default_filter(level: &str) -> String {
    format!("quotaroute={},tower_http=debug", level)
}

/// Initialize the tracing subscriber
///
/// `RUST_LOG` wins over `default_level`. Only the first call per process
/// has any effect.
///
/// # Examples
///
/// ```no_run
/// quotaroute::telemetry::init("info");
/// tracing::info!("Application started");
/// ```
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter(default_level)));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    });
}
