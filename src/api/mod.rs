use axum::{Router, middleware, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::Config;
use crate::state::SharedState;

pub mod auth;
mod error;
pub mod oauth;
mod observability;
pub mod posts;
mod session;
mod views;

pub use error::ApiError;
pub use observability::RequestUser;
pub use session::ClientAddr;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

fn session_key(config: &Config) -> anyhow::Result<Key> {
    if config.server.secret_key.is_empty() {
        tracing::warn!("server.secret_key is not set; using an ephemeral session signing key");
        return Ok(Key::generate());
    }

    Key::try_from(config.server.secret_key.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid server.secret_key: {e}"))
}

pub fn router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let config = state.config();

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_name("quill_session")
        .with_secure(config.server.secure_cookies)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            config.server.session_idle_minutes,
        )))
        .with_signed(session_key(config)?);

    let app = Router::new()
        .route("/", get(posts::index))
        .route(
            "/add_post",
            get(posts::new_post_form).post(posts::create_post),
        )
        .route(
            "/posts/{id}",
            get(posts::show_post).post(posts::create_comment),
        )
        .route("/register", get(auth::register_form).post(auth::register))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout).post(auth::logout))
        .route("/auth", get(oauth::authorize))
        .route("/callback", get(oauth::callback))
        .route("/token", get(oauth::token).post(oauth::token))
        .route("/protected_resource", get(oauth::protected_resource))
        .layer(session_layer)
        .route("/healthz", get(observability::healthz))
        .route("/metrics", get(observability::get_metrics))
        .fallback(observability::not_found)
        .with_state(state);

    Ok(app
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(TraceLayer::new_for_http()))
}
