use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub oauth: OAuthConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_url: String,

    pub log_level: String,

    /// "pretty" or "json"
    pub log_format: String,

    /// Number of tokio worker threads (0 = number of CPU cores)
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/quill.db".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,

    pub port: u16,

    /// Signs the session cookie. Must be at least 64 bytes when set.
    /// Left empty, an ephemeral key is generated at startup and sessions
    /// do not survive a restart.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secret_key: String,

    /// Whether to set the Secure flag on session cookies.
    /// Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    pub session_idle_minutes: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5000,
            secret_key: String::new(),
            secure_cookies: true,
            session_idle_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,

    pub login_throttle: LoginThrottleConfig,

    pub totp: TotpConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            login_throttle: LoginThrottleConfig::default(),
            totp: TotpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginThrottleConfig {
    /// Login attempts allowed per client inside the window.
    pub max_attempts: u32,

    /// Rolling window for counting attempts.
    pub window_seconds: u64,

    /// Trusted proxy IP addresses allowed to provide forwarded client IP headers.
    ///
    /// When empty, forwarded headers are ignored and the socket peer address is used.
    pub trusted_proxy_ips: Vec<String>,
}

impl Default for LoginThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            window_seconds: 60,
            trusted_proxy_ips: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TotpConfig {
    pub issuer: String,

    pub digits: usize,

    pub step_seconds: u64,

    /// Number of steps before and after the current one that are still accepted.
    pub skew: u8,

    /// Length of the generated base32 secret, in characters.
    pub secret_length: usize,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            issuer: "Quill".to_string(),
            digits: 6,
            step_seconds: 30,
            skew: 1,
            secret_length: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub client_id: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_secret: String,

    pub authorize_url: String,

    pub token_url: String,

    pub resource_url: String,

    pub redirect_uri: String,

    pub scope: String,

    pub request_timeout_seconds: u64,

    /// How long an issued `state` value may wait for its callback.
    pub state_ttl_seconds: u64,

    /// How long a received authorization code may wait for the exchange.
    pub code_ttl_seconds: u64,

    /// Token lifetime used when the provider omits `expires_in`.
    pub token_ttl_seconds: u64,

    pub sweep_interval_seconds: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: "quill-client".to_string(),
            client_secret: String::new(),
            authorize_url: "https://provider.example.com/oauth/authorize".to_string(),
            token_url: "https://provider.example.com/oauth/token".to_string(),
            resource_url: "https://provider.example.com/api/resource".to_string(),
            redirect_uri: "http://localhost:5000/callback".to_string(),
            scope: "read".to_string(),
            request_timeout_seconds: 10,
            state_ttl_seconds: 600,
            code_ttl_seconds: 60,
            token_ttl_seconds: 3600,
            sweep_interval_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Config {
    /// Loads the first config file found, falling back to defaults, then applies
    /// environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit {
            info!("Loading config from: {}", path.display());
            Self::load_from_path(path)?
        } else {
            Self::config_paths()
                .into_iter()
                .find(|p| p.exists())
                .map_or_else(
                    || {
                        info!("No config file found, using defaults");
                        Ok(Self::default())
                    },
                    |path| {
                        info!("Loading config from: {}", path.display());
                        Self::load_from_path(&path)
                    },
                )?
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("QUILL_DATABASE_URL") {
            self.general.database_url = url;
        }
        if let Ok(key) = std::env::var("QUILL_SECRET_KEY") {
            self.server.secret_key = key;
        }
        if let Ok(secret) = std::env::var("QUILL_OAUTH_CLIENT_SECRET") {
            self.oauth.client_secret = secret;
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("quill").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".quill").join("config.toml"));
        }

        paths
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.database_url.trim().is_empty() {
            anyhow::bail!("general.database_url cannot be empty");
        }

        if !self.server.secret_key.is_empty() && self.server.secret_key.len() < 64 {
            anyhow::bail!("server.secret_key must be at least 64 bytes");
        }

        for (name, value) in [
            ("oauth.authorize_url", &self.oauth.authorize_url),
            ("oauth.token_url", &self.oauth.token_url),
            ("oauth.resource_url", &self.oauth.resource_url),
            ("oauth.redirect_uri", &self.oauth.redirect_uri),
        ] {
            url::Url::parse(value).with_context(|| format!("{name} is not a valid URL"))?;
        }

        if self.security.login_throttle.max_attempts == 0 {
            anyhow::bail!("security.login_throttle.max_attempts must be > 0");
        }

        let secret_length = self.security.totp.secret_length;
        if !(16..=64).contains(&secret_length) || secret_length % 8 != 0 {
            anyhow::bail!("security.totp.secret_length must be a multiple of 8 between 16 and 64");
        }

        Ok(())
    }
}
