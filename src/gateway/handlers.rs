//! # Request → Envelope → Reply Pipeline
//!
//! Handlers for the eight API routes. Every handler runs the same fixed
//! sequence: allow checks against the router, queue resolution, envelope
//! construction, one RPC over the bus, and response shaping. Reply bodies are
//! forwarded byte-for-byte as `application/json`; the gateway never parses
//! what backends return, except for the `Create` reply which becomes the
//! `Location` header.

use crate::bus::envelope::BusEnvelope;
use crate::core::error::{ApiError, GatewayError};
use crate::gateway::health::aggregate_health;
use crate::gateway::AppState;
use crate::middleware::trace_id::TraceId;
use crate::routing::model::actions;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use tracing::debug;

/// `POST /api/{ms}/{resource}` : Create
pub async fn create(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    Path((ms, resource)): Path<(String, String)>,
    body: String,
) -> Result<Response, ApiError> {
    let reply = dispatch(
        &state,
        &trace,
        &ms,
        &resource,
        actions::CREATE,
        None,
        None,
        Some(body),
    )
    .await?;

    // The reply is the newly created id, echoed in Location and the body.
    let id = String::from_utf8_lossy(&reply).into_owned();
    let location = format!("/api/{}/{}/{}", ms, resource, id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        id,
    )
        .into_response())
}

/// `GET /api/{ms}/{resource}` : List
pub async fn list(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    Path((ms, resource)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let reply = dispatch(&state, &trace, &ms, &resource, actions::LIST, None, None, None).await?;
    Ok(json_reply(reply))
}

/// `GET /api/{ms}/{resource}/{id}` : Get
pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    Path((ms, resource, id)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id, &state, &trace)?;
    let reply = dispatch(
        &state,
        &trace,
        &ms,
        &resource,
        actions::GET,
        None,
        None,
        Some(id.to_string()),
    )
    .await?;
    Ok(json_reply(reply))
}

/// `PUT /api/{ms}/{resource}/{id}` : Update
pub async fn update(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    Path((ms, resource, id)): Path<(String, String, String)>,
    body: String,
) -> Result<Response, ApiError> {
    let id = parse_id(&id, &state, &trace)?;
    dispatch(
        &state,
        &trace,
        &ms,
        &resource,
        actions::UPDATE,
        None,
        Some(id),
        Some(body),
    )
    .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// `DELETE /api/{ms}/{resource}/{id}` : Delete
pub async fn delete_by_id(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    Path((ms, resource, id)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id, &state, &trace)?;
    dispatch(
        &state,
        &trace,
        &ms,
        &resource,
        actions::DELETE,
        None,
        None,
        Some(id.to_string()),
    )
    .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// `POST /api/{ms}/{resource}/actions/{action}` : custom action, collection-scoped
pub async fn invoke_action(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    Path((ms, resource, action)): Path<(String, String, String)>,
    body: String,
) -> Result<Response, ApiError> {
    let reply = dispatch(
        &state,
        &trace,
        &ms,
        &resource,
        &action,
        Some(action.as_str()),
        None,
        Some(body),
    )
    .await?;
    Ok(json_reply(reply))
}

/// `POST /api/{ms}/{resource}/{id}/actions/{action}` : custom action, id-scoped
pub async fn invoke_action_with_id(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    Path((ms, resource, id, action)): Path<(String, String, String, String)>,
    body: String,
) -> Result<Response, ApiError> {
    let id = parse_id(&id, &state, &trace)?;
    let reply = dispatch(
        &state,
        &trace,
        &ms,
        &resource,
        &action,
        Some(action.as_str()),
        Some(id),
        Some(body),
    )
    .await?;
    Ok(json_reply(reply))
}

/// `GET /api/health` : aggregated health report
pub async fn health(State(state): State<AppState>) -> Response {
    let report = aggregate_health(
        &state.router,
        state.rpc.clone(),
        state.shutdown.child_token(),
    )
    .await;

    let status = if report.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

/// The shared per-request sequence: checks, envelope, RPC
///
/// The check order is fixed and observable: resource allowed, then (for
/// custom actions) action allowed, then queue resolution, then type
/// resolution. Reordering would change which error a caller sees.
#[allow(clippy::too_many_arguments)]
async fn dispatch(
    state: &AppState,
    trace: &TraceId,
    ms: &str,
    resource: &str,
    action: &str,
    check_action: Option<&str>,
    id: Option<i64>,
    data: Option<String>,
) -> Result<Vec<u8>, ApiError> {
    let fail = |error: GatewayError| {
        ApiError::new(error, trace.as_str()).with_exception_detail(state.include_exception_detail)
    };

    if !state.router.is_resource_allowed(ms, resource) {
        return Err(fail(GatewayError::unauthorized(format!(
            "Resource '{}' is not permitted for microservice '{}'",
            resource, ms
        ))));
    }

    if let Some(action) = check_action {
        if !state.router.is_action_allowed(ms, resource, action) {
            return Err(fail(GatewayError::unauthorized(format!(
                "Action '{}' is not permitted on '{}/{}'",
                action, ms, resource
            ))));
        }
    }

    let Some(queue) = state.router.resolve_queue(ms) else {
        return Err(fail(GatewayError::UnknownMicroservice));
    };

    let resource_type = state.router.resolve_type(ms, resource).map_err(fail)?;

    let mut envelope = BusEnvelope::new(resource_type, resource, action);
    envelope.id = id;
    envelope.data = data;
    let payload = envelope.to_bytes().map_err(fail)?;

    debug!(queue = %queue, action = %action, "Dispatching request to bus");

    state
        .rpc
        .call(&queue, payload, state.shutdown.child_token())
        .await
        .map_err(fail)
}

/// Forward a reply body verbatim as `application/json`
fn json_reply(reply: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        reply,
    )
        .into_response()
}

/// Id segments must be integers; anything else misses the route
fn parse_id(raw: &str, state: &AppState, trace: &TraceId) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| {
        ApiError::new(
            GatewayError::not_found(format!("no route for id '{}'", raw)),
            trace.as_str(),
        )
        .with_exception_detail(state.include_exception_detail)
    })
}
