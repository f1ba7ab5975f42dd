use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::OAuthConfig;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{endpoint} endpoint unreachable: {message}")]
    Unavailable {
        endpoint: &'static str,
        message: String,
    },

    #[error("{endpoint} endpoint returned HTTP {status}")]
    Rejected {
        endpoint: &'static str,
        status: u16,
        body: Value,
    },

    #[error("{endpoint} endpoint returned a non-JSON body")]
    InvalidBody { endpoint: &'static str },
}

/// Client for the third-party authorization server and its resource API.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    client: Client,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("Quill/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build OAuth HTTP client")?;

        Ok(Self { client, config })
    }

    /// Authorization endpoint URL carrying the client id, redirect URI, scope and `state`.
    pub fn authorization_url(&self, state: &str) -> Result<Url> {
        Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", self.config.scope.as_str()),
                ("state", state),
            ],
        )
        .context("Invalid authorize URL")
    }

    /// Exchanges an authorization code at the token endpoint and returns the raw payload.
    pub async fn exchange_code(&self, code: &str) -> Result<Value, UpstreamError> {
        const ENDPOINT: &str = "token";

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        debug!(url = %self.config.token_url, "Exchanging authorization code");

        let response = self
            .client
            .post(&self.config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable {
                endpoint: ENDPOINT,
                message: e.to_string(),
            })?;

        Self::read_json(ENDPOINT, response).await
    }

    /// Calls the resource endpoint with the access token as a bearer credential.
    pub async fn fetch_resource(&self, access_token: &str) -> Result<Value, UpstreamError> {
        const ENDPOINT: &str = "resource";

        let response = self
            .client
            .get(&self.config.resource_url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable {
                endpoint: ENDPOINT,
                message: e.to_string(),
            })?;

        Self::read_json(ENDPOINT, response).await
    }

    async fn read_json(
        endpoint: &'static str,
        response: reqwest::Response,
    ) -> Result<Value, UpstreamError> {
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Unavailable {
                endpoint,
                message: e.to_string(),
            })?;

        if !status.is_success() {
            warn!(endpoint, status = status.as_u16(), "Upstream rejected request");
            let body = serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
            return Err(UpstreamError::Rejected {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_slice(&bytes).map_err(|_| UpstreamError::InvalidBody { endpoint })
    }
}
