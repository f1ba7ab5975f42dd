//! Session helpers: identity, flash messages, relay key and client address.

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use tower_sessions::Session;

use super::ApiError;
use super::views::PageContext;
use crate::constants::session as keys;
use crate::db::repositories::user::generate_token;

/// Username of the logged-in user, if any.
pub async fn current_user(session: &Session) -> Result<Option<String>, ApiError> {
    Ok(session.get::<String>(keys::USER).await?)
}

pub async fn flash(session: &Session, message: impl Into<String>) -> Result<(), ApiError> {
    let mut flashes: Vec<String> = session.get(keys::FLASHES).await?.unwrap_or_default();
    flashes.push(message.into());
    session.insert(keys::FLASHES, flashes).await?;
    Ok(())
}

/// Returns pending flash messages and clears them.
pub async fn take_flashes(session: &Session) -> Result<Vec<String>, ApiError> {
    let flashes: Option<Vec<String>> = session.get(keys::FLASHES).await?;
    if flashes.is_some() {
        session.remove_value(keys::FLASHES).await?;
    }
    Ok(flashes.unwrap_or_default())
}

/// Current user plus pending flashes, which are consumed.
pub async fn page_context(session: &Session) -> Result<PageContext, ApiError> {
    Ok(PageContext {
        user: current_user(session).await?,
        flashes: take_flashes(session).await?,
    })
}

/// The session's relay key, if an OAuth flow was ever started.
pub async fn relay_key(session: &Session) -> Result<Option<String>, ApiError> {
    Ok(session.get::<String>(keys::RELAY_KEY).await?)
}

pub async fn ensure_relay_key(session: &Session) -> Result<String, ApiError> {
    if let Some(key) = relay_key(session).await? {
        return Ok(key);
    }
    let key = generate_token();
    session.insert(keys::RELAY_KEY, &key).await?;
    Ok(key)
}

/// Socket peer plus the raw `X-Forwarded-For` header.
///
/// The peer is only known when the server was started with connect info; the
/// forwarded header is only trusted later, by the login throttle.
#[derive(Debug, Clone, Default)]
pub struct ClientAddr {
    pub peer: Option<IpAddr>,
    pub forwarded_for: Option<String>,
}

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let forwarded_for = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(Self {
            peer,
            forwarded_for,
        })
    }
}
