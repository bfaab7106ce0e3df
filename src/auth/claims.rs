//! # Keycloak Claims Flattening
//!
//! Keycloak tokens carry roles nested inside the `realm_access` and
//! `resource_access` claims. This module normalizes them into flat role
//! claims (`realm:<role>` and `<clientId>:<role>`) so authorization code
//! never has to understand the provider's nesting.
//!
//! The transformation is idempotent: a sentinel claim marks a principal that
//! has already been flattened, and a second pass is a no-op. Tokens may
//! legitimately lack either claim; malformed JSON in them is ignored.

use crate::auth::oidc::AuthenticatedUser;
use serde_json::Value;

/// Sentinel claim marking an already-flattened principal
pub const ROLES_FLATTENED_SENTINEL: &str = "__kc_roles_flattened";

/// Normalize nested Keycloak role claims into flat role claims
pub fn flatten_keycloak_roles(user: &mut AuthenticatedUser) {
    if user.claims.contains_key(ROLES_FLATTENED_SENTINEL) {
        return;
    }

    if let Some(realm_access) = claim_as_json(user, "realm_access") {
        for role in roles_of(&realm_access) {
            push_unique(&mut user.roles, format!("realm:{}", role));
        }
    }

    if let Some(resource_access) = claim_as_json(user, "resource_access") {
        if let Some(clients) = resource_access.as_object() {
            for (client_id, grant) in clients {
                for role in roles_of(grant) {
                    push_unique(&mut user.roles, format!("{}:{}", client_id, role));
                }
            }
        }
    }

    user.claims
        .insert(ROLES_FLATTENED_SENTINEL.to_string(), Value::from(1));
}

/// Read a claim as JSON, whether it arrived structured or as an embedded string
fn claim_as_json(user: &AuthenticatedUser, name: &str) -> Option<Value> {
    match user.claims.get(name) {
        // Some token pipelines hand nested claims over as JSON strings.
        // Parse errors are swallowed: the claim is simply absent then.
        Some(Value::String(raw)) => serde_json::from_str(raw).ok(),
        Some(value) => Some(value.clone()),
        None => None,
    }
}

/// The `roles` string array of a `realm_access`/`resource_access` object
fn roles_of(value: &Value) -> impl Iterator<Item = &str> {
    value
        .get("roles")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

fn push_unique(roles: &mut Vec<String>, role: String) {
    if !roles.contains(&role) {
        roles.push(role);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_claims(claims: serde_json::Value) -> AuthenticatedUser {
        AuthenticatedUser {
            username: "alice".to_string(),
            roles: Vec::new(),
            claims: claims.as_object().unwrap().clone(),
        }
    }

    #[test]
    fn test_realm_and_client_roles_flattened() {
        let mut user = user_with_claims(serde_json::json!({
            "realm_access": { "roles": ["admin", "user"] },
            "resource_access": {
                "gc-front": { "roles": ["viewer"] },
                "account": { "roles": ["manage-account"] }
            }
        }));

        flatten_keycloak_roles(&mut user);

        assert!(user.roles.contains(&"realm:admin".to_string()));
        assert!(user.roles.contains(&"realm:user".to_string()));
        assert!(user.roles.contains(&"gc-front:viewer".to_string()));
        assert!(user.roles.contains(&"account:manage-account".to_string()));
        assert!(user.claims.contains_key(ROLES_FLATTENED_SENTINEL));
    }

    #[test]
    fn test_flattening_is_idempotent() {
        let mut user = user_with_claims(serde_json::json!({
            "realm_access": { "roles": ["admin"] }
        }));

        flatten_keycloak_roles(&mut user);
        let after_first = user.roles.clone();

        flatten_keycloak_roles(&mut user);
        assert_eq!(user.roles, after_first);
    }

    #[test]
    fn test_string_encoded_claims_are_parsed() {
        let mut user = user_with_claims(serde_json::json!({
            "realm_access": "{\"roles\":[\"admin\"]}"
        }));

        flatten_keycloak_roles(&mut user);
        assert_eq!(user.roles, vec!["realm:admin".to_string()]);
    }

    #[test]
    fn test_malformed_claims_are_ignored() {
        let mut user = user_with_claims(serde_json::json!({
            "realm_access": "not json at all",
            "resource_access": 17
        }));

        flatten_keycloak_roles(&mut user);
        assert!(user.roles.is_empty());
        // Still marked: the pass ran, there was just nothing to lift.
        assert!(user.claims.contains_key(ROLES_FLATTENED_SENTINEL));
    }

    #[test]
    fn test_existing_roles_are_deduped() {
        let mut user = user_with_claims(serde_json::json!({
            "realm_access": { "roles": ["admin"] }
        }));
        user.roles.push("realm:admin".to_string());

        flatten_keycloak_roles(&mut user);
        assert_eq!(user.roles.iter().filter(|r| *r == "realm:admin").count(), 1);
    }
}
