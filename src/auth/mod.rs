pub mod claims;
pub mod middleware;
pub mod oidc;

pub use claims::flatten_keycloak_roles;
pub use middleware::{identify_route, scope_gate, RouteIdentity};
pub use oidc::{AuthenticatedUser, KeycloakVerifier, TokenVerifier};
