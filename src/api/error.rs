use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use super::views;
use crate::services::{AuthError, BlogError, RelayError};

/// Failures that escape a handler. Page routes render HTML, relay routes render
/// `{"error": ...}` JSON.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    RateLimited { retry_after_secs: u64 },

    DatabaseError(String),

    InternalError(String),

    Relay(RelayError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited, retry in {}s", retry_after_secs)
            }
            ApiError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Relay(err) => write!(f, "Relay error: {}", err),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(msg) => page(StatusCode::NOT_FOUND, &msg),
            ApiError::RateLimited { retry_after_secs } => {
                let mut response = page(
                    StatusCode::TOO_MANY_REQUESTS,
                    "Too many login attempts. Please wait a minute and try again.",
                );
                if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                response
            }
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                page(StatusCode::INTERNAL_SERVER_ERROR, "A database error occurred")
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred",
                )
            }
            ApiError::Relay(err) => relay_response(err),
        }
    }
}

fn page(status: StatusCode, message: &str) -> Response {
    (status, Html(views::error_page(status, message))).into_response()
}

fn relay_response(err: RelayError) -> Response {
    let status = match &err {
        RelayError::MissingState
        | RelayError::StateMismatch
        | RelayError::AuthorizationDenied(_)
        | RelayError::MissingCode
        | RelayError::AuthorizationCodeExpired
        | RelayError::MissingToken => StatusCode::BAD_REQUEST,
        RelayError::TokenExpired => StatusCode::UNAUTHORIZED,
        RelayError::MalformedTokenResponse
        | RelayError::UpstreamUnavailable(_)
        | RelayError::UpstreamRejected { .. } => StatusCode::BAD_GATEWAY,
        RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = match err {
        RelayError::UpstreamRejected { status, body } => json!({
            "error": format!("Upstream rejected the request with HTTP {status}"),
            "upstream_status": status,
            "upstream_body": body,
        }),
        RelayError::UpstreamUnavailable(msg) => {
            tracing::warn!("OAuth upstream unavailable: {}", msg);
            json!({ "error": "Upstream service is unavailable" })
        }
        RelayError::Internal(msg) => {
            tracing::error!("Relay internal error: {}", msg);
            json!({ "error": "An internal error occurred" })
        }
        other => json!({ "error": other.to_string() }),
    };

    (status, Json(body)).into_response()
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        ApiError::Relay(err)
    }
}

impl From<tower_sessions::session::Error> for ApiError {
    fn from(err: tower_sessions::session::Error) -> Self {
        ApiError::InternalError(format!("Session error: {err}"))
    }
}

impl From<BlogError> for ApiError {
    fn from(err: BlogError) -> Self {
        match err {
            BlogError::PostNotFound(id) => ApiError::not_found("Post", id),
            BlogError::Database(msg) => ApiError::DatabaseError(msg),
            BlogError::Validation(msg) => ApiError::InternalError(format!(
                "Unhandled validation error reached the error layer: {msg}"
            )),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Database(msg) => ApiError::DatabaseError(msg),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        ApiError::NotFound(format!("{} {} not found", resource, id))
    }
}
