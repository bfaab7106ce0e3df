//! # Routing
//!
//! The policy tree that maps URL segments onto broker queues, and the lookups
//! the HTTP pipeline performs against it: queue resolution, resource-type
//! resolution, allow checks, and the effective-scope computation.

pub mod model;
pub mod router;
pub mod validator;

pub use model::{ActionRule, Microservice, Resource, RoutingConfig, Scope};
pub use router::ServiceRouter;
pub use validator::validate_routing;
