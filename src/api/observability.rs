use axum::{
    Json,
    extract::{MatchedPath, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::api::{ApiError, AppState};

/// Response extension naming the user a request authenticated, picked up by
/// the request log.
#[derive(Debug, Clone)]
pub struct RequestUser(pub String);

const SECURITY_HEADERS: [(&str, &str); 4] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    // QR codes are inline data: images; pages carry no scripts.
    (
        "content-security-policy",
        "default-src 'self'; img-src 'self' data:; script-src 'none'; style-src 'self' 'unsafe-inline'; form-action 'self'; frame-ancestors 'none'; base-uri 'self'",
    ),
];

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.prometheus_handle {
        Some(handle) => PrometheusHandle::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "Metrics are disabled").into_response(),
    }
}

/// Liveness plus a database round trip.
pub async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "uptime_seconds": state.start_time.elapsed().as_secs(),
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("The requested page does not exist".to_string())
}

fn outcome(status: StatusCode) -> &'static str {
    if status.is_server_error() {
        "error"
    } else if status.is_client_error() {
        "client_error"
    } else if status.is_redirection() {
        "redirect"
    } else {
        "success"
    }
}

/// One span per request and one `http_request_finished` event when it completes.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    // Unmatched paths share one label so arbitrary URLs cannot blow up cardinality.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |mp| mp.as_str().to_string());

    let span = info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        method = %method,
        path = %req.uri().path(),
        route = %route,
        user_id = tracing::field::Empty,
    );

    async move {
        let response = next.run(req).await;
        let elapsed = start.elapsed();
        let status = response.status();

        let labels = [
            ("method", method.to_string()),
            ("path", route),
            ("status", status.as_u16().to_string()),
        ];
        metrics::counter!("http_requests_total", &labels).increment(1);
        metrics::histogram!("http_request_duration_seconds", &labels)
            .record(elapsed.as_secs_f64());

        let user_id = response
            .extensions()
            .get::<RequestUser>()
            .map(|RequestUser(name)| name.as_str());
        if let Some(name) = user_id {
            tracing::Span::current().record("user_id", name);
        }

        info!(
            event = "http_request_finished",
            duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            status_code = status.as_u16(),
            outcome = outcome(status),
            user_id,
            "Request finished"
        );

        response
    }
    .instrument(span)
    .await
}

pub async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    response
}
