//! # Error Handling Middleware
//!
//! Last line of defense between the handlers and the wire. Expected domain
//! errors are shaped by the handlers themselves; anything that still leaves
//! the inner stack as a bare 5xx (a panicking layer, an extractor failure)
//! gets logged with the request's trace id and rewritten into the normalized
//! JSON error body so clients never see an empty 500.

use crate::core::error::ErrorBody;
use crate::middleware::trace_id::TraceId;
use axum::extract::Request;
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

/// Normalize bare 5xx responses into the JSON error body
pub async fn error_handling_middleware(request: Request, next: Next) -> Response {
    let trace_id = request
        .extensions()
        .get::<TraceId>()
        .cloned()
        .unwrap_or_default();

    let response = next.run(request).await;

    if !response.status().is_server_error() {
        return response;
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/json"))
        .unwrap_or(false);

    // Already our shape: the handler built it, nothing to add.
    if is_json {
        return response;
    }

    error!(
        trace_id = %trace_id,
        status = response.status().as_u16(),
        "Unhandled server error reached the middleware boundary"
    );

    let body = ErrorBody {
        code: "ERROR".to_string(),
        message: "Internal server error".to_string(),
        trace_id: trace_id.as_str().to_string(),
        exception: None,
    };

    (response.status(), Json(body)).into_response()
}
