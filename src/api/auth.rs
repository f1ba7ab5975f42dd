use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::observability::RequestUser;
use super::session::{ClientAddr, flash, page_context, relay_key};
use super::{ApiError, AppState, views};
use crate::constants::session as keys;
use crate::services::{AuthError, ThrottleDecision};

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub totp: String,
}

/// GET /register
pub async fn register_form(session: Session) -> Result<Html<String>, ApiError> {
    let ctx = page_context(&session).await?;
    Ok(Html(views::register(&ctx, "", None)))
}

/// POST /register
/// Creates the account and shows the TOTP enrolment QR code once.
pub async fn register(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response, ApiError> {
    let result = state
        .shared
        .auth_service
        .register(&form.username, &form.password)
        .await;

    let ctx = page_context(&session).await?;

    let (status, message) = match result {
        Ok(registration) => {
            metrics::counter!("registrations_total", "outcome" => "success").increment(1);
            return Ok(Html(views::registered(&ctx, &registration)).into_response());
        }
        Err(AuthError::Validation(message)) => (StatusCode::UNPROCESSABLE_ENTITY, message),
        Err(e @ AuthError::DuplicateUser(_)) => (StatusCode::CONFLICT, e.to_string()),
        Err(e) => return Err(e.into()),
    };

    metrics::counter!("registrations_total", "outcome" => "rejected").increment(1);
    Ok((
        status,
        Html(views::register(&ctx, &form.username, Some(&message))),
    )
        .into_response())
}

/// GET /login
pub async fn login_form(session: Session) -> Result<Html<String>, ApiError> {
    let ctx = page_context(&session).await?;
    Ok(Html(views::login(&ctx, "", None)))
}

/// POST /login
/// Password plus one-time code. Each attempt counts against the client's throttle window.
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    client: ClientAddr,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let throttle = &state.shared.login_throttle;
    let client_key = throttle.client_key(client.peer, client.forwarded_for.as_deref());

    if let ThrottleDecision::Limited { retry_after } = throttle.check(&client_key) {
        tracing::warn!(client = %client_key, "Login attempts throttled");
        metrics::counter!("login_attempts_total", "outcome" => "throttled").increment(1);
        return Err(ApiError::RateLimited {
            retry_after_secs: retry_after.as_secs().max(1),
        });
    }

    let result = state
        .shared
        .auth_service
        .login(&form.username, &form.password, &form.totp)
        .await;

    let username = match result {
        Ok(username) => username,
        Err(e @ (AuthError::InvalidCredentials | AuthError::InvalidTotp)) => {
            let outcome = if matches!(e, AuthError::InvalidTotp) {
                "invalid_totp"
            } else {
                "invalid_credentials"
            };
            metrics::counter!("login_attempts_total", "outcome" => outcome).increment(1);
            tracing::info!(outcome, "Login failed");

            let ctx = page_context(&session).await?;
            return Ok((
                StatusCode::UNAUTHORIZED,
                Html(views::login(&ctx, &form.username, Some(&e.to_string()))),
            )
                .into_response());
        }
        Err(e) => return Err(e.into()),
    };

    // New id on privilege change; the session data carries over.
    session.cycle_id().await?;
    session.insert(keys::USER, &username).await?;
    flash(&session, format!("Welcome back, {username}!")).await?;

    metrics::counter!("login_attempts_total", "outcome" => "success").increment(1);
    tracing::info!("User {username} logged in");

    let mut response = Redirect::to("/").into_response();
    response.extensions_mut().insert(RequestUser(username));
    Ok(response)
}

/// GET|POST /logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Redirect, ApiError> {
    if let Some(key) = relay_key(&session).await? {
        state.shared.relay.end_session(&key);
    }
    session.flush().await?;
    Ok(Redirect::to("/"))
}
