//! # Gateway
//!
//! The HTTP surface: the eight API routes, the aggregated health endpoint,
//! and the server that binds them behind the middleware chain.

pub mod handlers;
pub mod health;
pub mod server;

use crate::auth::oidc::TokenVerifier;
use crate::bus::rpc::RpcClient;
use crate::routing::router::ServiceRouter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    /// Lookup facade over the frozen routing tree
    pub router: ServiceRouter,

    /// Request/reply client on the message bus
    pub rpc: Arc<dyn RpcClient>,

    /// Bearer-token verifier for private routes
    pub verifier: Arc<dyn TokenVerifier>,

    /// Whether error bodies include exception detail (non-production only)
    pub include_exception_detail: bool,

    /// Root cancellation: fires on shutdown; every request derives its
    /// RPC cancellation from it
    pub shutdown: CancellationToken,
}
