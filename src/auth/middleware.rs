//! # Authorization Filter
//!
//! Request-scope gate that runs before any handler. It reads the microservice,
//! resource, and action the URL addresses, asks the router whether that call
//! is public, and only triggers bearer-token authentication when it is not.
//! Public traffic never touches the identity provider.
//!
//! ## Rust Concepts Used
//!
//! - `axum::middleware::from_fn_with_state` turns a plain async function into
//!   a tower layer with access to the shared application state
//! - Request extensions carry the authenticated principal to handlers without
//!   global state

use crate::gateway::AppState;
use crate::routing::model::actions;
use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::debug;

/// The `(microservice, resource, action)` triple a request addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteIdentity {
    pub microservice: String,
    pub resource: String,
    /// Implicit CRUD name derived from verb/shape, or the custom action name
    pub action: String,
}

/// Map a request line onto the routing triple
///
/// Returns `None` for URLs outside the `/api/{ms}/{resource}` surface
/// (including `/api/health`), which pass through the gate untouched.
pub fn identify_route(method: &Method, path: &str) -> Option<RouteIdentity> {
    let rest = path.strip_prefix("/api/")?;
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    let identity = |ms: &str, resource: &str, action: &str| {
        Some(RouteIdentity {
            microservice: ms.to_string(),
            resource: resource.to_string(),
            action: action.to_string(),
        })
    };

    match segments.as_slice() {
        [ms, resource] => {
            if *method == Method::GET {
                identity(ms, resource, actions::LIST)
            } else if *method == Method::POST {
                identity(ms, resource, actions::CREATE)
            } else {
                None
            }
        }
        [ms, resource, id] if id.parse::<i64>().is_ok() => {
            if *method == Method::GET {
                identity(ms, resource, actions::GET)
            } else if *method == Method::PUT {
                identity(ms, resource, actions::UPDATE)
            } else if *method == Method::DELETE {
                identity(ms, resource, actions::DELETE)
            } else {
                None
            }
        }
        [ms, resource, "actions", action] if *method == Method::POST => {
            identity(ms, resource, action)
        }
        [ms, resource, id, "actions", action]
            if *method == Method::POST && id.parse::<i64>().is_ok() =>
        {
            identity(ms, resource, action)
        }
        _ => None,
    }
}

/// Authenticate-if-not-public middleware
///
/// Public calls proceed without credentials; everything else requires a valid
/// bearer token, verified against the identity provider, and the resulting
/// principal (with flattened role claims) is attached to the request.
pub async fn scope_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(identity) = identify_route(request.method(), request.uri().path()) else {
        return next.run(request).await;
    };

    if state.router.is_public(
        &identity.microservice,
        &identity.resource,
        Some(identity.action.as_str()),
    ) {
        return next.run(request).await;
    }

    let Some(token) = bearer_token(&request) else {
        debug!(path = %request.uri().path(), "Rejected unauthenticated request to private route");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    match state.verifier.verify(&token).await {
        Ok(user) => {
            request.extensions_mut().insert(Arc::new(user));
            next.run(request).await
        }
        Err(e) => {
            debug!(error = %e, "Token verification failed");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

/// Extract the bearer token from the `Authorization` header
fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crud_routes_map_to_implicit_actions() {
        let list = identify_route(&Method::GET, "/api/mainsite/Countries").unwrap();
        assert_eq!(list.action, "List");

        let create = identify_route(&Method::POST, "/api/mainsite/Countries").unwrap();
        assert_eq!(create.action, "Create");

        let get = identify_route(&Method::GET, "/api/mainsite/Countries/5").unwrap();
        assert_eq!(get.action, "Get");

        let update = identify_route(&Method::PUT, "/api/mainsite/Countries/5").unwrap();
        assert_eq!(update.action, "Update");

        let delete = identify_route(&Method::DELETE, "/api/mainsite/Countries/5").unwrap();
        assert_eq!(delete.action, "Delete");
    }

    #[test]
    fn test_custom_action_routes() {
        let without_id =
            identify_route(&Method::POST, "/api/mainsite/GameTypes/actions/Publish").unwrap();
        assert_eq!(without_id.microservice, "mainsite");
        assert_eq!(without_id.resource, "GameTypes");
        assert_eq!(without_id.action, "Publish");

        let with_id =
            identify_route(&Method::POST, "/api/mainsite/GameTypes/7/actions/Publish").unwrap();
        assert_eq!(with_id.action, "Publish");
    }

    #[test]
    fn test_non_api_routes_pass_through() {
        assert!(identify_route(&Method::GET, "/api/health").is_none());
        assert!(identify_route(&Method::GET, "/metrics").is_none());
        // Non-integer id does not match the id-scoped shape.
        assert!(identify_route(&Method::GET, "/api/mainsite/Countries/abc").is_none());
        // Custom actions are POST-only.
        assert!(identify_route(&Method::GET, "/api/mainsite/GameTypes/actions/Publish").is_none());
    }
}
