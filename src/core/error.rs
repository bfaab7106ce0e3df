//! # Error Handling Module
//!
//! This module provides comprehensive error handling for the gateway using the `thiserror` crate.
//! It defines all error categories that can occur while bridging HTTP requests onto the message
//! bus and maps each of them to the HTTP status code surfaced to clients.
//!
//! ## Rust Error Handling Concepts
//!
//! Rust uses `Result<T, E>` for error handling instead of exceptions:
//! - `Ok(value)` represents success with a value
//! - `Err(error)` represents failure with an error
//! - The `?` operator propagates errors up the call stack
//! - `thiserror` provides ergonomic error type definitions with automatic `Display` and `Error` trait implementations

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Main result type used throughout the gateway
///
/// A type alias that makes error handling more ergonomic: `GatewayResult<T>`
/// instead of `Result<T, GatewayError>` everywhere.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Comprehensive error types for the gateway
///
/// Each variant represents a different category of failure. The `#[error("...")]`
/// attribute from `thiserror` automatically implements `Display` with the given message.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration-related errors (invalid settings document, missing file, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The request requires authentication and none (or an invalid token) was presented
    #[error("Authentication failed: {reason}")]
    Authentication { reason: String },

    /// The resource or action is not permitted for the addressed microservice
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// The URL names a microservice the routing configuration does not know
    #[error("Unknown microservice.")]
    UnknownMicroservice,

    /// An internal routing lookup missed (resource type resolution)
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// The caller went away while an RPC was pending
    #[error("Request was cancelled")]
    Cancelled,

    /// The broker reply did not arrive within the attached deadline
    #[error("Upstream call timed out after {timeout_ms}ms")]
    UpstreamTimeout { timeout_ms: u64 },

    /// Publishing to the broker failed
    #[error("Failed to publish to queue '{queue}': {reason}")]
    PublishFailed { queue: String, reason: String },

    /// The broker connection is gone and could not be recovered
    #[error("Message broker unavailable: {reason}")]
    BrokerUnavailable { reason: String },

    /// Internal server errors for unexpected failures
    #[error("Internal server error: {message}")]
    Internal { message: String },

    /// I/O errors (file operations, network errors, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// AMQP protocol errors from the broker client
    #[error("Broker error: {0}")]
    Broker(#[from] lapin::Error),

    /// JWT token validation errors
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// HTTP client errors while talking to the identity provider
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl GatewayError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an authentication error with a custom reason
    pub fn auth<S: Into<String>>(reason: S) -> Self {
        Self::Authentication {
            reason: reason.into(),
        }
    }

    /// Create an authorization error with a custom reason
    pub fn unauthorized<S: Into<String>>(reason: S) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Create a not-found error for a failed internal lookup
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the appropriate HTTP status code for this error
    ///
    /// Maps internal error categories to the status codes clients observe.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication { .. } => StatusCode::UNAUTHORIZED,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::UnknownMicroservice => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            // The client is gone; nobody will read this response.
            Self::Cancelled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::UpstreamTimeout { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PublishFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BrokerUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Broker(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Jwt(_) => StatusCode::UNAUTHORIZED,
            Self::HttpClient(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Get a short machine-readable code for API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication { .. } | Self::Jwt(_) => "UNAUTHENTICATED",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::UnknownMicroservice => "UNKNOWN_MICROSERVICE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Cancelled => "CANCELLED",
            Self::UpstreamTimeout { .. } => "UPSTREAM_TIMEOUT",
            Self::Configuration { .. } => "CONFIGURATION",
            _ => "ERROR",
        }
    }

    /// Whether this error is rendered as a bare text body rather than the JSON shape
    ///
    /// Resource/action denials and the unknown-microservice guard answer with
    /// plain text; everything else uses the normalized JSON error body.
    fn is_text_response(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::UnknownMicroservice)
    }
}

/// Normalized JSON error body returned for unexpected failures
///
/// The same `traceId` is emitted in the `Trace-Id` response header so clients
/// and operators can correlate a failed call with the gateway logs.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(rename = "traceId")]
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

/// A `GatewayError` paired with the request's trace id, ready to become a response
///
/// Handlers return `Result<Response, ApiError>`; the conversion attaches the
/// trace id to both the header and the JSON body. The `exception` detail (the
/// debug rendering of the underlying error) is only included outside production.
#[derive(Debug)]
pub struct ApiError {
    pub error: GatewayError,
    pub trace_id: String,
    pub include_exception: bool,
}

impl ApiError {
    pub fn new(error: GatewayError, trace_id: impl Into<String>) -> Self {
        Self {
            error,
            trace_id: trace_id.into(),
            include_exception: false,
        }
    }

    /// Include the exception detail in the body (non-production environments)
    pub fn with_exception_detail(mut self, include: bool) -> Self {
        self.include_exception = include;
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();

        let mut response = if self.error.is_text_response() {
            (status, self.error.to_string()).into_response()
        } else {
            let body = ErrorBody {
                code: self.error.code().to_string(),
                message: self.error.to_string(),
                trace_id: self.trace_id.clone(),
                exception: self.include_exception.then(|| format!("{:?}", self.error)),
            };
            (status, Json(body)).into_response()
        };

        if let Ok(value) = self.trace_id.parse() {
            response
                .headers_mut()
                .insert(header::HeaderName::from_static("trace-id"), value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            GatewayError::auth("invalid token").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::unauthorized("resource not permitted").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::UnknownMicroservice.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::not_found("resource type").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::UpstreamTimeout { timeout_ms: 2000 }.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unknown_microservice_message() {
        // The exact body text is part of the public contract.
        assert_eq!(
            GatewayError::UnknownMicroservice.to_string(),
            "Unknown microservice."
        );
    }

    #[test]
    fn test_error_body_omits_exception_by_default() {
        let api_error = ApiError::new(GatewayError::internal("boom"), "trace-1");
        assert!(!api_error.include_exception);

        let body = ErrorBody {
            code: "ERROR".to_string(),
            message: "boom".to_string(),
            trace_id: "trace-1".to_string(),
            exception: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("exception").is_none());
        assert_eq!(json["traceId"], "trace-1");
    }
}
