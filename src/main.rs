//! quotaroute binary
//!
//! `serve` runs the quota reset timer with the read-only status surface;
//! `complete` sends one request and prints the JSON result.

use clap::Parser;
use quotaroute::cli::{Cli, Command, generate_config_template};
use quotaroute::handlers::{self, AppState};
use quotaroute::providers::{CompletionRequest, Message};
use quotaroute::{Config, Router, telemetry};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = &cli.command {
        return write_template(output.as_deref());
    }

    let config = Config::from_file(&cli.config)?;
    telemetry::init(&config.observability.log_level);

    let router = Arc::new(Router::from_config(&config).await?);

    match cli.command {
        Some(Command::Complete {
            intent,
            system,
            json,
            max_tokens,
            prompt,
        }) => {
            let mut request = CompletionRequest::new(intent, vec![Message::user(prompt)])
                .with_require_json(json);
            if let Some(system) = system {
                request = request.with_system_instruction(system);
            }
            if let Some(max_tokens) = max_tokens {
                request = request.with_max_tokens(max_tokens);
            }

            let outcome = router.complete(request).await;
            // Flush before exiting so pending quota updates survive failures too
            router.health().save_to_disk().await;
            let result = outcome?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Some(Command::Status) => {
            let snapshot = router.health().snapshot().await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Some(Command::Serve) | None => serve(&config, router).await,
        Some(Command::Config { .. }) => Ok(()),
    }
}

fn write_template(output: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let template = generate_config_template();
    match output {
        Some(path) => {
            std::fs::write(path, template)?;
            eprintln!("Configuration template written to {}", path);
        }
        None => print!("{}", template),
    }
    Ok(())
}

async fn serve(config: &Config, router: Arc<Router>) -> Result<(), Box<dyn std::error::Error>> {
    router.start_reset_timer();

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([127, 0, 0, 1])),
        config.server.port,
    ));

    let app = handlers::app(AppState::new(router.clone()));

    tracing::info!(address = %addr, "Status surface listening (/health, /metrics)");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("Shutting down, flushing quota state");
    router.health().save_to_disk().await;
    Ok(())
}
