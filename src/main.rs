//! # Gateway Entry Point
//!
//! Startup sequence: load the settings document, initialize logging, validate
//! the configuration (reporting every violation before refusing to start),
//! connect the broker, and serve. Shutdown is graceful on SIGTERM/SIGINT: the
//! listeners drain and pending RPC calls are cancelled through the shared
//! shutdown token.

use std::sync::Arc;

use bus_gateway::auth::oidc::KeycloakVerifier;
use bus_gateway::bus::rpc::AmqpRpcClient;
use bus_gateway::core::config::GatewayConfig;
use bus_gateway::core::error::GatewayResult;
use bus_gateway::gateway::server::GatewayServer;
use bus_gateway::gateway::AppState;
use bus_gateway::observability::init_logging;
use bus_gateway::routing::router::ServiceRouter;
use bus_gateway::routing::validator::validate_routing;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Logging may not be up yet when config loading fails.
        eprintln!("Fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> GatewayResult<()> {
    let config_path = std::env::var("GATEWAY_CONFIG_PATH")
        .unwrap_or_else(|_| "config/gateway.json".to_string());
    let config = GatewayConfig::load_from_file(&config_path).await?;

    // The guard must outlive the server or buffered file logs are dropped.
    let _log_guard = init_logging(&config.logger_settings);

    info!("🚀 Starting bus-gateway {}", env!("CARGO_PKG_VERSION"));
    info!(config = %config_path, environment = %config.app_settings.environment, "Configuration loaded");

    // Validate everything before binding anything; list every violation so
    // operators fix the document in one edit cycle.
    let mut violations = Vec::new();
    if let Err(errors) = config.validate() {
        violations.extend(errors);
    }
    if let Err(errors) = validate_routing(&config.gateway_routing) {
        violations.extend(errors);
    }
    if !violations.is_empty() {
        error!("Configuration validation failed:");
        for violation in &violations {
            error!("  - {}", violation);
        }
        return Err(bus_gateway::GatewayError::config(format!(
            "{} configuration violation(s)",
            violations.len()
        )));
    }

    let microservice_count = config.gateway_routing.microservices.len();
    info!(microservices = microservice_count, "Routing configuration valid");

    let router = ServiceRouter::new(config.gateway_routing.clone());
    let rpc = AmqpRpcClient::connect(&config.rabbit_mq).await?;
    let verifier = KeycloakVerifier::new(config.app_settings.keycloak.clone());

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let state = AppState {
        router,
        rpc: Arc::new(rpc),
        verifier: Arc::new(verifier),
        include_exception_detail: !config.app_settings.is_production(),
        shutdown: shutdown.clone(),
    };

    let server = GatewayServer::new(state, &config.app_settings.allowed_origins, config.server.clone());
    server.run().await?;

    info!("✅ Gateway shutdown complete");
    Ok(())
}

/// Cancel the shutdown token on SIGTERM or SIGINT
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                return;
            }
        };
        let mut sigint = match signal::unix::signal(signal::unix::SignalKind::interrupt()) {
            Ok(signal) => signal,
            Err(e) => {
                error!("Failed to install SIGINT handler: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        }

        shutdown.cancel();
    });
}
