//! OAuth2 authorization-code relay.
//!
//! The relay walks one browser session through
//! `AuthorizationRequested -> CodeReceived -> TokenIssued -> ResourceAccessible`.
//! Per-session progress lives in a process-wide [`RelayStore`] keyed by a random
//! relay key that the HTTP layer keeps in the session cookie. Every value in the
//! store is single-use or time-bounded:
//!
//! - the `state` issued at authorization is consumed by the first callback;
//! - the authorization code is consumed by the first exchange attempt;
//! - the access token expires per the provider's `expires_in` (or the configured default).

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::clients::oauth::{OAuthClient, UpstreamError};
use crate::config::OAuthConfig;
use crate::db::repositories::user::generate_token;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("No authorization request is pending for this session")]
    MissingState,

    #[error("State parameter does not match the pending authorization request")]
    StateMismatch,

    #[error("Authorization was denied: {0}")]
    AuthorizationDenied(String),

    #[error("No authorization code found in session")]
    MissingCode,

    #[error("Authorization code has expired")]
    AuthorizationCodeExpired,

    #[error("No access token found in session")]
    MissingToken,

    #[error("Access token has expired")]
    TokenExpired,

    #[error("Token response did not contain an access_token")]
    MalformedTokenResponse,

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream rejected the request with HTTP {status}")]
    UpstreamRejected { status: u16, body: Value },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<UpstreamError> for RelayError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Rejected { status, body, .. } => Self::UpstreamRejected { status, body },
            other => Self::UpstreamUnavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub payload: Value,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct RelayEntry {
    pending_state: Option<(String, DateTime<Utc>)>,
    code: Option<(String, DateTime<Utc>)>,
    token: Option<IssuedToken>,
}

impl RelayEntry {
    fn is_stale(&self, now: DateTime<Utc>, ttl: &RelayTtl) -> bool {
        let state_live = self
            .pending_state
            .as_ref()
            .is_some_and(|(_, at)| now - *at < ttl.state);
        let code_live = self
            .code
            .as_ref()
            .is_some_and(|(_, at)| now - *at < ttl.code);
        let token_live = self.token.as_ref().is_some_and(|t| now < t.expires_at);
        !(state_live || code_live || token_live)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RelayTtl {
    pub state: Duration,
    pub code: Duration,
    pub token: Duration,
}

impl RelayTtl {
    fn from_config(config: &OAuthConfig) -> Self {
        let secs = |s: u64| {
            i64::try_from(s)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX)
        };
        Self {
            state: secs(config.state_ttl_seconds),
            code: secs(config.code_ttl_seconds),
            token: secs(config.token_ttl_seconds),
        }
    }
}

/// Process-wide relay state, keyed by relay key.
#[derive(Debug, Default)]
pub struct RelayStore {
    entries: RwLock<HashMap<String, RelayEntry>>,
}

impl RelayStore {
    fn with_entry<R>(&self, key: &str, f: impl FnOnce(&mut RelayEntry) -> R) -> R {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(entries.entry(key.to_string()).or_default())
    }

    fn remove(&self, key: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    fn retain(&self, mut keep: impl FnMut(&RelayEntry) -> bool) -> usize {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| keep(entry));
        before - entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct OAuthRelay {
    client: OAuthClient,
    store: RelayStore,
    ttl: RelayTtl,
}

impl OAuthRelay {
    #[must_use]
    pub fn new(client: OAuthClient, config: &OAuthConfig) -> Self {
        Self {
            client,
            store: RelayStore::default(),
            ttl: RelayTtl::from_config(config),
        }
    }

    #[must_use]
    pub const fn store(&self) -> &RelayStore {
        &self.store
    }

    /// Issues a fresh `state` for the session and returns the provider URL to redirect to.
    /// Any previous pending request for the session is replaced.
    pub fn begin(&self, key: &str) -> Result<Url, RelayError> {
        let state = generate_token();
        let url = self
            .client
            .authorization_url(&state)
            .map_err(|e| RelayError::Internal(e.to_string()))?;

        let now = Utc::now();
        self.store.with_entry(key, |entry| {
            entry.pending_state = Some((state, now));
        });

        debug!("Authorization requested");
        Ok(url)
    }

    /// Validates the callback against the pending `state` and records the code.
    pub fn receive_callback(
        &self,
        key: &str,
        state: Option<&str>,
        code: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), RelayError> {
        self.receive_callback_at(key, state, code, error, Utc::now())
    }

    fn receive_callback_at(
        &self,
        key: &str,
        state: Option<&str>,
        code: Option<&str>,
        error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), RelayError> {
        let ttl = self.ttl;
        self.store.with_entry(key, |entry| {
            // The pending state is single-use whatever the outcome.
            let (expected, issued_at) = entry.pending_state.take().ok_or(RelayError::MissingState)?;

            if now - issued_at >= ttl.state {
                return Err(RelayError::MissingState);
            }

            match state {
                Some(received) if bool::from(received.as_bytes().ct_eq(expected.as_bytes())) => {}
                _ => return Err(RelayError::StateMismatch),
            }

            if let Some(error) = error {
                return Err(RelayError::AuthorizationDenied(error.to_string()));
            }

            let code = code
                .filter(|c| !c.is_empty())
                .ok_or(RelayError::MissingCode)?;

            entry.code = Some((code.to_string(), now));
            Ok(())
        })
    }

    /// Consumes the session's authorization code and exchanges it for a token.
    /// Returns the provider's token payload verbatim.
    pub async fn exchange(&self, key: &str) -> Result<Value, RelayError> {
        self.exchange_at(key, Utc::now()).await
    }

    async fn exchange_at(&self, key: &str, now: DateTime<Utc>) -> Result<Value, RelayError> {
        let (code, received_at) = self
            .store
            .with_entry(key, |entry| entry.code.take())
            .ok_or(RelayError::MissingCode)?;

        if now - received_at >= self.ttl.code {
            return Err(RelayError::AuthorizationCodeExpired);
        }

        let payload = match self.client.exchange_code(&code).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Token exchange failed: {e}");
                metrics::counter!("oauth_exchanges_total", "outcome" => "failure").increment(1);
                return Err(e.into());
            }
        };

        let Some(access_token) = payload
            .get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            metrics::counter!("oauth_exchanges_total", "outcome" => "malformed").increment(1);
            return Err(RelayError::MalformedTokenResponse);
        };

        let lifetime = payload
            .get("expires_in")
            .and_then(Value::as_i64)
            .filter(|secs| *secs > 0)
            .and_then(Duration::try_seconds)
            .unwrap_or(self.ttl.token);

        let issued_at = Utc::now();
        let token = IssuedToken {
            access_token,
            payload: payload.clone(),
            issued_at,
            expires_at: issued_at
                .checked_add_signed(lifetime)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        self.store.with_entry(key, |entry| entry.token = Some(token));

        metrics::counter!("oauth_exchanges_total", "outcome" => "success").increment(1);
        info!("Access token issued");
        Ok(payload)
    }

    /// Calls the downstream resource with the session's access token.
    pub async fn fetch_resource(&self, key: &str) -> Result<Value, RelayError> {
        let now = Utc::now();
        let access_token = self.store.with_entry(key, |entry| {
            let token = entry.token.as_ref().ok_or(RelayError::MissingToken)?;
            if now >= token.expires_at {
                entry.token = None;
                return Err(RelayError::TokenExpired);
            }
            Ok(token.access_token.clone())
        })?;

        Ok(self.client.fetch_resource(&access_token).await?)
    }

    /// Forgets everything held for the session.
    pub fn end_session(&self, key: &str) {
        if self.store.remove(key) {
            debug!("Relay state torn down");
        }
    }

    /// Removes entries whose state, code and token have all lapsed.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let ttl = self.ttl;
        let removed = self.store.retain(|entry| !entry.is_stale(now, &ttl));
        if removed > 0 {
            debug!(removed, "Swept stale relay entries");
        }
        removed
    }
}
