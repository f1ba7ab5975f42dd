//! Domain service for registration and login.
//!
//! Handles credential storage, password verification and TOTP enrolment.

use thiserror::Error;

use crate::services::totp::Provisioning;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("Username '{0}' is already taken")]
    DuplicateUser(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid TOTP code")]
    InvalidTotp,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result of a successful registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,

    /// Base32 shared secret, shown once so it can be typed in manually.
    pub totp_secret: String,

    pub provisioning: Provisioning,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates a user with a fresh TOTP secret.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] for malformed input and
    /// [`AuthError::DuplicateUser`] if the username is taken.
    async fn register(&self, username: &str, password: &str) -> Result<Registration, AuthError>;

    /// Verifies password and one-time code, returning the canonical username.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown user or wrong password
    /// and [`AuthError::InvalidTotp`] for a wrong code.
    async fn login(&self, username: &str, password: &str, code: &str)
    -> Result<String, AuthError>;
}
