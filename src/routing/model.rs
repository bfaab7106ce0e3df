//! # Routing Configuration Model
//!
//! Typed, immutable in-memory representation of the gateway's policy tree.
//! The tree is deserialized once from the `GatewayRouting` section of the
//! settings document and never mutated afterwards; every consumer sees it
//! behind an `Arc` through [`crate::routing::ServiceRouter`].
//!
//! All identifier matching in this tree is case-insensitive: `mainsite`,
//! `MainSite` and `MAINSITE` address the same microservice.

use serde::{Deserialize, Serialize};

/// Access scope of a microservice, resource, or action
///
/// `Public` routes are served without authentication; `Private` routes require
/// a valid bearer token. The effective scope of a call is computed by
/// [`crate::routing::ServiceRouter::is_public`] walking action → resource →
/// microservice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    Public,
    Private,
}

impl Default for Scope {
    fn default() -> Self {
        Self::Private
    }
}

/// The full routing policy tree (`GatewayRouting` in the settings document)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoutingConfig {
    /// All registered microservices, in declaration order
    #[serde(default)]
    pub microservices: Vec<Microservice>,
}

impl RoutingConfig {
    /// Case-insensitive microservice lookup
    pub fn microservice(&self, id: &str) -> Option<&Microservice> {
        self.microservices
            .iter()
            .find(|ms| ms.id.eq_ignore_ascii_case(id))
    }
}

/// One logical backend, bound to a single broker queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Microservice {
    /// Identifier matched against the `{ms}` URL segment
    pub id: String,

    /// Target broker queue name
    pub queue: String,

    /// Default scope for everything under this microservice
    #[serde(default)]
    pub scope: Scope,

    /// Resources this microservice exposes
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Microservice {
    /// Case-insensitive resource lookup
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }
}

/// A named collection exposed by a microservice (the `{resource}` URL segment)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    /// Name matched against the `{resource}` URL segment
    pub name: String,

    /// Resource-type tag forwarded to the backend in the envelope (e.g. `DATA`, `INFRA`).
    /// Opaque to the gateway.
    #[serde(rename = "Type")]
    pub resource_type: String,

    /// Scope override; `None` inherits from the microservice
    #[serde(default)]
    pub scope: Option<Scope>,

    /// Declared actions. An empty list means the action layer is open:
    /// any action name is allowed on this resource.
    #[serde(default)]
    pub actions: Vec<ActionRule>,
}

impl Resource {
    /// Case-insensitive action lookup
    pub fn action(&self, name: &str) -> Option<&ActionRule> {
        self.actions
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }
}

/// A named operation on a resource, either an implicit CRUD verb or a custom action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionRule {
    /// Name matched against the `{action}` URL segment and the implicit CRUD names
    pub name: String,

    /// Scope override; `None` inherits from the resource (or the microservice)
    #[serde(default)]
    pub scope: Option<Scope>,
}

/// Implicit action names bound to the CRUD routes
pub mod actions {
    pub const LIST: &str = "List";
    pub const GET: &str = "Get";
    pub const CREATE: &str = "Create";
    pub const UPDATE: &str = "Update";
    pub const DELETE: &str = "Delete";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_defaults_to_private() {
        assert_eq!(Scope::default(), Scope::Private);
    }

    #[test]
    fn test_deserialize_settings_shape() {
        let json = r#"{
            "Microservices": [
                {
                    "Id": "mainsite",
                    "Queue": "mainsite_queue",
                    "Resources": [
                        {
                            "Name": "Countries",
                            "Type": "DATA",
                            "Scope": "Public",
                            "Actions": [ { "Name": "List" } ]
                        }
                    ]
                }
            ]
        }"#;

        let config: RoutingConfig = serde_json::from_str(json).unwrap();
        let ms = &config.microservices[0];
        assert_eq!(ms.id, "mainsite");
        assert_eq!(ms.scope, Scope::Private);

        let resource = &ms.resources[0];
        assert_eq!(resource.resource_type, "DATA");
        assert_eq!(resource.scope, Some(Scope::Public));
        assert_eq!(resource.actions[0].scope, None);
    }

    #[test]
    fn test_case_insensitive_lookups() {
        let config: RoutingConfig = serde_json::from_str(
            r#"{"Microservices":[{"Id":"MainSite","Queue":"q","Resources":[
                {"Name":"Countries","Type":"DATA","Actions":[{"Name":"Publish"}]}
            ]}]}"#,
        )
        .unwrap();

        let ms = config.microservice("MAINSITE").unwrap();
        let resource = ms.resource("countries").unwrap();
        assert!(resource.action("PUBLISH").is_some());
    }
}
