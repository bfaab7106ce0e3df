//! # Bus Envelope
//!
//! The canonical wire shape the gateway sends to backends. The envelope is
//! serialized as camelCase JSON with null fields omitted; the reply is an
//! opaque UTF-8 string the gateway forwards byte-for-byte, so backends own
//! their schemas end to end.

use crate::core::error::GatewayResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical request envelope published to a microservice queue
///
/// Exists only for the duration of one HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusEnvelope {
    /// Resource-type tag inherited from the matched resource (e.g. `DATA`, `INFRA`)
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Resource name from the URL
    pub resource: String,

    /// `List|Get|Create|Update|Delete` or a configured custom action
    pub action: String,

    /// Entity id for id-scoped operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Opaque payload: the raw request body for writes and custom actions,
    /// the decimal id for `Get`/`Delete`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl BusEnvelope {
    pub fn new(
        resource_type: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource: resource.into(),
            action: action.into(),
            id: None,
            data: None,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// The fixed probe envelope the aggregated health check sends to every microservice
    pub fn health_check() -> Self {
        Self::new("INFRA", "Health", "Check")
    }

    /// Serialize to the JSON bytes published on the bus
    pub fn to_bytes(&self) -> GatewayResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Health state a backend reports for itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Reply shape of the `INFRA/Health/Check` probe
///
/// Everything beyond `status` is opaque detail the backend wants surfaced in
/// the aggregated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroserviceHealth {
    pub status: HealthState,
    #[serde(flatten)]
    pub details: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_serializes_camel_case_without_nulls() {
        let envelope = BusEnvelope::new("DATA", "Countries", "List");
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            json,
            serde_json::json!({ "type": "DATA", "resource": "Countries", "action": "List" })
        );
        // Null fields must be omitted entirely, not serialized as null.
        assert!(json.get("id").is_none());
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_envelope_with_id_and_data() {
        let envelope = BusEnvelope::new("DATA", "Countries", "Update")
            .with_id(42)
            .with_data(r#"{"iso":"DE"}"#);
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["id"], 42);
        assert_eq!(json["data"], r#"{"iso":"DE"}"#);
    }

    #[test]
    fn test_health_check_envelope() {
        let json = serde_json::to_value(BusEnvelope::health_check()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "INFRA", "resource": "Health", "action": "Check" })
        );
    }

    #[test]
    fn test_microservice_health_parses_opaque_details() {
        let reply: MicroserviceHealth =
            serde_json::from_str(r#"{"status":"Degraded","latencyMs":250}"#).unwrap();
        assert_eq!(reply.status, HealthState::Degraded);
        assert_eq!(reply.details["latencyMs"], 250);
    }
}
