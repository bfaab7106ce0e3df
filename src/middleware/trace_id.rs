//! # Trace Id Middleware
//!
//! Assigns every request a trace id (honoring one supplied by the caller),
//! exposes it to handlers through a request extension, stamps it on the
//! response as `Trace-Id`, and logs one line per request with method, path,
//! status, and latency. The client address logged honors `X-Forwarded-For`
//! so entries stay meaningful behind a reverse proxy.

use axum::extract::Request;
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

const TRACE_ID_HEADER: &str = "trace-id";

/// Per-request identifier, carried in request extensions
#[derive(Debug, Clone)]
pub struct TraceId(String);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Assign the trace id, time the request, log the outcome
pub async fn trace_id_middleware(mut request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|id| TraceId::from_string(id.to_string()))
        .unwrap_or_default();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = client_address(&request);

    request.extensions_mut().insert(trace_id.clone());

    let started = Instant::now();
    let mut response = next.run(request).await;
    let elapsed = started.elapsed();

    // An error response may already carry the header with the same id.
    if !response.headers().contains_key(TRACE_ID_HEADER) {
        if let Ok(value) = trace_id.as_str().parse() {
            response
                .headers_mut()
                .insert(header::HeaderName::from_static(TRACE_ID_HEADER), value);
        }
    }

    info!(
        trace_id = %trace_id,
        method = %method,
        path = %path,
        client = %client,
        status = response.status().as_u16(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Request completed"
    );

    response
}

/// Client address for the log line, preferring forwarded headers
fn client_address(request: &Request) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .unwrap_or_else(|| "-".to_string())
}
