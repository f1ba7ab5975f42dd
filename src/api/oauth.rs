//! OAuth2 authorization-code relay endpoints.
//!
//! The browser session only carries an opaque relay key; state, code and token
//! live in the process-wide relay store.

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tower_sessions::Session;

use super::session::{ensure_relay_key, relay_key};
use super::{ApiError, AppState};
use crate::services::RelayError;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// GET /auth
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Response, ApiError> {
    let key = ensure_relay_key(&session).await?;
    let url = state.shared.relay.begin(&key)?;
    Ok(found(url.as_str()))
}

/// GET /callback
pub async fn callback(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let key = relay_key(&session).await?.ok_or(RelayError::MissingState)?;

    if let Err(e) = state.shared.relay.receive_callback(
        &key,
        query.state.as_deref(),
        query.code.as_deref(),
        query.error.as_deref(),
    ) {
        tracing::warn!("Rejected OAuth callback: {e}");
        return Err(e.into());
    }

    Ok(found("/token"))
}

/// GET|POST /token
/// Echoes the provider's token payload.
pub async fn token(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    let key = relay_key(&session).await?.ok_or(RelayError::MissingCode)?;
    Ok(Json(state.shared.relay.exchange(&key).await?))
}

/// GET /protected_resource
pub async fn protected_resource(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    let key = relay_key(&session).await?.ok_or(RelayError::MissingToken)?;
    Ok(Json(state.shared.relay.fetch_resource(&key).await?))
}
