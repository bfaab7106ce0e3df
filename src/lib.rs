//! # bus-gateway
//!
//! An API gateway that fronts queue-consuming microservices. Backends never
//! expose HTTP; they consume work from named broker queues and answer on a
//! private reply queue. The gateway exposes a uniform REST surface
//! (`/api/{ms}/{resource}[/{id}][/actions/{action}]`), authenticates callers
//! against an OpenID Connect provider, authorizes each call against a
//! hierarchical routing policy, rewrites the request into a canonical bus
//! envelope, performs one request/reply RPC over the broker, and streams the
//! reply back to the HTTP client.
//!
//! ## Architecture Overview
//!
//! - `core`: error taxonomy and the settings document
//! - `routing`: the policy tree, its startup validator, and the pure lookups
//!   the pipeline runs on every request
//! - `bus`: the canonical envelope and the correlation-based RPC client
//! - `auth`: OIDC token verification, Keycloak claims flattening, and the
//!   authenticate-if-not-public gate
//! - `gateway`: the HTTP routes, the aggregated health probe, and the server
//! - `middleware`: trace-id propagation and last-resort error normalization
//! - `observability`: logging initialization

pub mod auth;
pub mod bus;
pub mod core;
pub mod gateway;
pub mod middleware;
pub mod observability;
pub mod routing;

// Re-export commonly used types
pub use crate::core::config::GatewayConfig;
pub use crate::core::error::{ApiError, GatewayError, GatewayResult};
pub use crate::gateway::server::{build_app, GatewayServer};
pub use crate::gateway::AppState;
pub use crate::routing::router::ServiceRouter;
