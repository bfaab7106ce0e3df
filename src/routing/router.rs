//! # Service Router
//!
//! Pure, side-effect-free lookups over the frozen routing policy tree. The
//! router never mutates the configuration; it only answers questions the HTTP
//! pipeline asks on every request: which queue a microservice maps to, which
//! resource-type tag to stamp on the envelope, whether a resource/action is
//! permitted at all, and whether the call is public.
//!
//! ## Rust Concepts Used
//!
//! - `Arc<RoutingConfig>` shares the immutable tree across request tasks with
//!   no locking; reads on frozen data are race-free by construction
//! - `Option<T>` distinguishes "missing microservice" (a client error) from a
//!   resolved queue without exceptions

use crate::core::error::{GatewayError, GatewayResult};
use crate::routing::model::{RoutingConfig, Scope};
use std::sync::Arc;

/// Lookup facade over the routing configuration
///
/// Cheap to clone; all clones observe the same frozen tree.
#[derive(Clone)]
pub struct ServiceRouter {
    config: Arc<RoutingConfig>,
}

impl ServiceRouter {
    pub fn new(config: RoutingConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Resolve the broker queue for a microservice
    ///
    /// Returns `None` for an unknown microservice so HTTP call sites can
    /// answer `400 Unknown microservice` instead of failing.
    pub fn resolve_queue(&self, ms: &str) -> Option<String> {
        self.config.microservice(ms).map(|m| m.queue.clone())
    }

    /// Resolve the resource-type tag declared for `(ms, resource)`
    ///
    /// A missing microservice or resource is an internal lookup miss: the
    /// pipeline only calls this after the allow checks passed, so a miss here
    /// surfaces as a not-found error rather than a silent fallback.
    pub fn resolve_type(&self, ms: &str, resource: &str) -> GatewayResult<String> {
        let microservice = self
            .config
            .microservice(ms)
            .ok_or_else(|| GatewayError::not_found(format!("microservice '{}'", ms)))?;

        microservice
            .resource(resource)
            .map(|r| r.resource_type.clone())
            .ok_or_else(|| GatewayError::not_found(format!("resource '{}/{}'", ms, resource)))
    }

    /// Whether the microservice exists and exposes the named resource
    pub fn is_resource_allowed(&self, ms: &str, resource: &str) -> bool {
        self.config
            .microservice(ms)
            .and_then(|m| m.resource(resource))
            .is_some()
    }

    /// Whether the action is allowed on `(ms, resource)`
    ///
    /// A resource that declares zero actions is open at the action layer: any
    /// action name is allowed. Otherwise the action must be declared. Missing
    /// microservice or resource is a deny.
    pub fn is_action_allowed(&self, ms: &str, resource: &str, action: &str) -> bool {
        let Some(resource) = self
            .config
            .microservice(ms)
            .and_then(|m| m.resource(resource))
        else {
            return false;
        };

        resource.actions.is_empty() || resource.action(action).is_some()
    }

    /// Effective-scope evaluator: is the call public (no authentication required)?
    ///
    /// The decision walks the override chain: a non-null action scope wins,
    /// then a non-null resource scope, then the microservice scope. A missing
    /// microservice or resource is never public.
    pub fn is_public(&self, ms: &str, resource: &str, action: Option<&str>) -> bool {
        let Some(microservice) = self.config.microservice(ms) else {
            return false;
        };
        let Some(resource) = microservice.resource(resource) else {
            return false;
        };

        let decided = action
            .and_then(|a| resource.action(a))
            .and_then(|a| a.scope)
            .or(resource.scope)
            .unwrap_or(microservice.scope);

        decided == Scope::Public
    }

    /// Ids of all registered microservices, for the aggregated health probe
    pub fn microservices(&self) -> impl Iterator<Item = &str> {
        self.config.microservices.iter().map(|m| m.id.as_str())
    }
}
