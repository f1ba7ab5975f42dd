use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::entities::users;

/// User data returned from repository (without sensitive fields)
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub created_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            created_at: model.created_at,
        }
    }
}

/// The secrets needed to authenticate a user.
#[derive(Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
    pub totp_secret: String,
}

impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get user with password hash and TOTP secret (for login)
    pub async fn get_credentials(&self, username: &str) -> Result<Option<UserCredentials>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user credentials")?;

        Ok(user.map(|u| {
            let password_hash = u.password_hash.clone();
            let totp_secret = u.totp_secret.clone();
            UserCredentials {
                user: User::from(u),
                password_hash,
                totp_secret,
            }
        }))
    }

    pub async fn exists(&self, username: &str) -> Result<bool> {
        let count = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .count(&self.conn)
            .await
            .context("Failed to check username")?;

        Ok(count > 0)
    }

    pub async fn count(&self) -> Result<u64> {
        let count = users::Entity::find()
            .count(&self.conn)
            .await
            .context("Failed to count users")?;

        Ok(count)
    }

    /// Insert a user whose password has already been hashed.
    ///
    /// The raw `DbErr` is returned so callers can tell a unique-constraint
    /// violation on `username` apart from other failures.
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        totp_secret: &str,
    ) -> Result<User, DbErr> {
        let active_model = users::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(password_hash.to_string()),
            totp_secret: Set(totp_secret.to_string()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let res = users::Entity::insert(active_model).exec(&self.conn).await?;

        let created = users::Entity::find_by_id(res.last_insert_id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("user {}", res.last_insert_id)))?;

        Ok(User::from(created))
    }
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses the argon2 crate defaults.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored PHC string.
/// The parameters are read from the hash itself, so this works for any cost settings.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash on a blocking thread; Argon2 would otherwise stall the async runtime.
pub async fn hash_password_blocking(password: &str, config: &SecurityConfig) -> Result<String> {
    let password = password.to_string();
    let config = config.clone();
    task::spawn_blocking(move || hash_password(&password, Some(&config)))
        .await
        .context("Password hashing task panicked")?
}

pub async fn verify_password_blocking(password: &str, password_hash: &str) -> Result<bool> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    task::spawn_blocking(move || verify_password(&password, &password_hash))
        .await
        .context("Password verification task panicked")?
}

/// Generate a random token (64 character hex string)
#[must_use]
pub fn generate_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_config() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        }
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("secret123", Some(&cheap_config())).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("secret123", &hash).unwrap());
        assert!(!verify_password("secret124", &hash).unwrap());
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(verify_password("secret123", "not-a-hash").is_err());
    }

    #[test]
    fn generated_tokens_are_unique_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
