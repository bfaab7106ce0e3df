//! # Aggregated Health Probe
//!
//! Fans the `INFRA/Health/Check` RPC out to every registered microservice in
//! parallel, bounds each probe to two seconds, and folds the results into one
//! report: `Healthy` only when **every** backend answered `Healthy` in time.
//! A `Degraded` component keeps the overall report out of `Healthy` exactly
//! like an `Unhealthy` one, but the per-component detail stays visible in the
//! response body.

use crate::bus::envelope::{BusEnvelope, HealthState, MicroserviceHealth};
use crate::bus::rpc::RpcClient;
use crate::routing::router::ServiceRouter;
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-probe deadline
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// One entry of the aggregated report
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckEntry {
    pub name: String,
    pub status: HealthState,
    /// Opaque detail the backend attached to its reply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// The aggregated report returned by `GET /api/health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthState,
    pub checks: Vec<HealthCheckEntry>,
}

impl HealthReport {
    pub fn is_serving(&self) -> bool {
        !matches!(self.status, HealthState::Unhealthy)
    }
}

/// Probe every registered microservice in parallel and fold the results
pub async fn aggregate_health(
    router: &ServiceRouter,
    rpc: Arc<dyn RpcClient>,
    cancel: CancellationToken,
) -> HealthReport {
    let ids: Vec<String> = router.microservices().map(str::to_string).collect();

    let results: DashMap<String, HealthCheckEntry> = DashMap::new();
    let all_healthy = AtomicBool::new(true);

    join_all(ids.iter().map(|id| {
        let rpc = Arc::clone(&rpc);
        let cancel = cancel.clone();
        let results = &results;
        let all_healthy = &all_healthy;
        async move {
            let entry = probe_one(router, rpc, id, cancel).await;
            if entry.status != HealthState::Healthy {
                all_healthy.store(false, Ordering::Relaxed);
            }
            results.insert(id.clone(), entry);
        }
    }))
    .await;

    // Report in declaration order, not map order.
    let checks = ids
        .iter()
        .filter_map(|id| results.remove(id).map(|(_, entry)| entry))
        .collect();

    HealthReport {
        status: if all_healthy.load(Ordering::Relaxed) {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        },
        checks,
    }
}

/// Probe a single microservice, bounded by [`PROBE_TIMEOUT`]
async fn probe_one(
    router: &ServiceRouter,
    rpc: Arc<dyn RpcClient>,
    id: &str,
    cancel: CancellationToken,
) -> HealthCheckEntry {
    let unhealthy = |data: Option<serde_json::Value>| HealthCheckEntry {
        name: id.to_string(),
        status: HealthState::Unhealthy,
        data,
    };

    let Some(queue) = router.resolve_queue(id) else {
        return unhealthy(None);
    };

    let payload = match BusEnvelope::health_check().to_bytes() {
        Ok(payload) => payload,
        Err(_) => return unhealthy(None),
    };

    // The probe token links the per-probe deadline with the outer
    // cancellation; dropping the timed-out call frees its correlation slot.
    let reply = tokio::time::timeout(PROBE_TIMEOUT, rpc.call(&queue, payload, cancel.child_token())).await;

    match reply {
        Ok(Ok(body)) => match serde_json::from_slice::<MicroserviceHealth>(&body) {
            Ok(health) => {
                debug!(microservice = %id, status = ?health.status, "Health probe answered");
                HealthCheckEntry {
                    name: id.to_string(),
                    status: health.status,
                    data: (!health.details.is_empty())
                        .then(|| serde_json::Value::Object(health.details.into_iter().collect())),
                }
            }
            Err(e) => {
                warn!(microservice = %id, error = %e, "Health probe reply unparseable");
                unhealthy(None)
            }
        },
        Ok(Err(e)) => {
            warn!(microservice = %id, error = %e, "Health probe failed");
            unhealthy(None)
        }
        Err(_) => {
            warn!(microservice = %id, "Health probe timed out");
            unhealthy(None)
        }
    }
}
