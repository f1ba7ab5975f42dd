use std::sync::Arc;

use crate::clients::oauth::OAuthClient;
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, BlogService, LoginThrottle, OAuthRelay, SeaOrmAuthService, SeaOrmBlogService,
};

/// Long-lived services shared by every request handler and background task.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub auth_service: Arc<dyn AuthService>,

    pub blog_service: Arc<dyn BlogService>,

    pub relay: Arc<OAuthRelay>,

    pub login_throttle: Arc<LoginThrottle>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_url,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            config.security.clone(),
        )) as Arc<dyn AuthService + Send + Sync + 'static>;

        let blog_service = Arc::new(SeaOrmBlogService::new(store.clone()))
            as Arc<dyn BlogService + Send + Sync + 'static>;

        let oauth_client = OAuthClient::new(config.oauth.clone())?;
        let relay = Arc::new(OAuthRelay::new(oauth_client, &config.oauth));

        let login_throttle = Arc::new(LoginThrottle::new(&config.security.login_throttle));

        Ok(Self {
            config: Arc::new(config),
            store,
            auth_service,
            blog_service,
            relay,
            login_throttle,
        })
    }
}
