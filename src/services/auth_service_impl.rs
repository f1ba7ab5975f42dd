//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use sea_orm::SqlErr;
use tracing::{info, warn};

use crate::config::SecurityConfig;
use crate::db::Store;
use crate::db::repositories::user::{hash_password_blocking, verify_password_blocking};
use crate::services::auth_service::{AuthError, AuthService, Registration};
use crate::services::totp::TotpService;

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 32;
const PASSWORD_MIN_LEN: usize = 8;

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
    totp: TotpService,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(store: Store, security: SecurityConfig) -> Self {
        let totp = TotpService::new(security.totp.clone());
        Self {
            store,
            security,
            totp,
        }
    }
}

pub fn validate_username(username: &str) -> Result<(), AuthError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(AuthError::Validation(format!(
            "Username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
        )));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(AuthError::Validation(
            "Username can only contain letters, numbers, '.', '_' and '-'".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {PASSWORD_MIN_LEN} characters"
        )));
    }
    Ok(())
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(&self, username: &str, password: &str) -> Result<Registration, AuthError> {
        let username = username.trim();
        validate_username(username)?;
        validate_password(password)?;

        if self.store.username_exists(username).await? {
            return Err(AuthError::DuplicateUser(username.to_string()));
        }

        let password_hash = hash_password_blocking(password, &self.security).await?;
        let totp_secret = self.totp.generate_secret();

        let user = match self
            .store
            .create_user(username, &password_hash, &totp_secret)
            .await
        {
            Ok(user) => user,
            // Lost a race with a concurrent registration of the same name.
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                return Err(AuthError::DuplicateUser(username.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let provisioning = self.totp.provisioning(&totp_secret, &user.username)?;

        info!(user_id = user.id, "Registered user {}", user.username);

        Ok(Registration {
            username: user.username,
            totp_secret,
            provisioning,
        })
    }

    async fn login(
        &self,
        username: &str,
        password: &str,
        code: &str,
    ) -> Result<String, AuthError> {
        let Some(credentials) = self.store.get_user_credentials(username.trim()).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        let password_ok = verify_password_blocking(password, &credentials.password_hash).await?;
        if !password_ok {
            return Err(AuthError::InvalidCredentials);
        }

        if !self.totp.verify(&credentials.totp_secret, code)? {
            warn!(user_id = credentials.user.id, "TOTP verification failed");
            return Err(AuthError::InvalidTotp);
        }

        Ok(credentials.user.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a.b-c_d").is_ok());
        assert!(validate_username("al").is_err());
        assert!(validate_username("alice:bob").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("secret123").is_ok());
        assert!(validate_password("short").is_err());
    }

    #[test]
    fn db_errors_convert() {
        let err: AuthError = sea_orm::DbErr::Custom("boom".to_string()).into();
        assert!(matches!(err, AuthError::Database(_)));
    }
}
