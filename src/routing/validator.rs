//! # Routing Validator
//!
//! Startup validation of the routing policy tree. The validator is not
//! fail-fast: it walks the whole tree and reports **every** violation in one
//! pass so operators can fix a broken settings document in a single edit
//! cycle. On failure the process refuses to start.

use crate::routing::model::RoutingConfig;
use std::collections::HashSet;

/// Validate the routing configuration against its load invariants
///
/// Checks, in order:
/// 1. Microservice ids are unique (case-insensitive)
/// 2. Every microservice declares a non-empty queue
/// 3. Resource names are unique within their microservice
/// 4. Action names are unique within their resource
/// 5. No identifier at any level is empty or whitespace
///
/// Returns all detected violations; an empty error list never occurs (`Ok` is
/// returned instead).
pub fn validate_routing(config: &RoutingConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    let mut seen_ids: HashSet<String> = HashSet::new();
    for ms in &config.microservices {
        if ms.id.trim().is_empty() {
            errors.push("Microservice with empty id".to_string());
        } else if !seen_ids.insert(ms.id.to_lowercase()) {
            errors.push(format!("Duplicate microservice id '{}'", ms.id));
        }

        if ms.queue.trim().is_empty() {
            errors.push(format!("Microservice '{}' has no queue", ms.id));
        }

        let mut seen_resources: HashSet<String> = HashSet::new();
        for resource in &ms.resources {
            if resource.name.trim().is_empty() {
                errors.push(format!("Microservice '{}' has a resource with empty name", ms.id));
            } else if !seen_resources.insert(resource.name.to_lowercase()) {
                errors.push(format!(
                    "Duplicate resource '{}' in microservice '{}'",
                    resource.name, ms.id
                ));
            }

            let mut seen_actions: HashSet<String> = HashSet::new();
            for action in &resource.actions {
                if action.name.trim().is_empty() {
                    errors.push(format!(
                        "Resource '{}/{}' has an action with empty name",
                        ms.id, resource.name
                    ));
                } else if !seen_actions.insert(action.name.to_lowercase()) {
                    errors.push(format!(
                        "Duplicate action '{}' in resource '{}/{}'",
                        action.name, ms.id, resource.name
                    ));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
