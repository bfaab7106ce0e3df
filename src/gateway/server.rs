//! # HTTP Server Module
//!
//! Assembles the axum application (the eight API routes plus the health
//! endpoint) behind the middleware chain, and runs the listeners: plain HTTP
//! on the configured port, and a TLS listener when a certificate pair is
//! configured. Both serve the same application and drain gracefully when the
//! shutdown token fires.
//!
//! Middleware order, outermost first: request tracing → trace id → CORS →
//! error normalization → authenticate-if-not-public → handler.

use crate::auth::middleware::scope_gate;
use crate::core::config::ServerSettings;
use crate::core::error::{GatewayError, GatewayResult};
use crate::gateway::{handlers, AppState};
use crate::middleware::error_handling::error_handling_middleware;
use crate::middleware::trace_id::trace_id_middleware;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{middleware, Router};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the axum application with all routes and middleware
pub fn build_app(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route(
            "/api/:ms/:resource",
            get(handlers::list).post(handlers::create),
        )
        .route(
            "/api/:ms/:resource/:id",
            get(handlers::get_by_id)
                .put(handlers::update)
                .delete(handlers::delete_by_id),
        )
        .route(
            "/api/:ms/:resource/actions/:action",
            post(handlers::invoke_action),
        )
        .route(
            "/api/:ms/:resource/:id/actions/:action",
            post(handlers::invoke_action_with_id),
        )
        .layer(middleware::from_fn_with_state(state.clone(), scope_gate))
        .layer(middleware::from_fn(error_handling_middleware))
        .layer(cors_layer(allowed_origins))
        .layer(middleware::from_fn(trace_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS layer from the configured origin allowlist
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// The gateway's listeners
pub struct GatewayServer {
    app: Router,
    settings: ServerSettings,
    shutdown: CancellationToken,
}

impl GatewayServer {
    pub fn new(state: AppState, allowed_origins: &[String], settings: ServerSettings) -> Self {
        let shutdown = state.shutdown.clone();
        Self {
            app: build_app(state, allowed_origins),
            settings,
            shutdown,
        }
    }

    /// Bind the listeners and serve until the shutdown token fires
    pub async fn run(self) -> GatewayResult<()> {
        let http_addr = SocketAddr::from(([0, 0, 0, 0], self.settings.http_port));
        let listener = TcpListener::bind(http_addr).await.map_err(|e| {
            GatewayError::internal(format!("Failed to bind HTTP listener on {}: {}", http_addr, e))
        })?;
        info!("Gateway HTTP server listening on {}", http_addr);

        let shutdown = self.shutdown.clone();
        let http_server = axum::serve(listener, self.app.clone())
            .with_graceful_shutdown(async move { shutdown.cancelled().await });

        let tls_enabled =
            !self.settings.tls_cert_file.is_empty() && !self.settings.tls_key_file.is_empty();

        if !tls_enabled {
            http_server
                .await
                .map_err(|e| GatewayError::internal(format!("HTTP server error: {}", e)))?;
            return Ok(());
        }

        let tls_config =
            RustlsConfig::from_pem_file(&self.settings.tls_cert_file, &self.settings.tls_key_file)
                .await
                .map_err(|e| GatewayError::config(format!("Failed to load TLS material: {}", e)))?;

        let https_addr = SocketAddr::from(([0, 0, 0, 0], self.settings.https_port));
        let handle = axum_server::Handle::new();

        // Translate the shutdown token into the TLS listener's drain protocol.
        let drain_handle = handle.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            drain_handle.graceful_shutdown(Some(Duration::from_secs(30)));
        });

        info!("Gateway TLS server listening on {}", https_addr);
        let https_server = axum_server::bind_rustls(https_addr, tls_config)
            .handle(handle)
            .serve(self.app.into_make_service());

        let (http_result, https_result) = tokio::join!(http_server, https_server);
        http_result.map_err(|e| GatewayError::internal(format!("HTTP server error: {}", e)))?;
        https_result.map_err(|e| GatewayError::internal(format!("TLS server error: {}", e)))?;

        Ok(())
    }
}
