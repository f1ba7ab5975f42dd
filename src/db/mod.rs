use crate::models::post::{Comment, NewPost, Post};
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::user::{User, UserCredentials};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        if !in_memory {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        // Every connection to `sqlite::memory:` is its own database, so the
        // pool must hold exactly one connection and never recycle it.
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            opt.idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(600));
            (max_connections, min_connections)
        };
        opt.max_connections(max_connections)
            .min_connections(min_connections);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn post_repo(&self) -> repositories::post::PostRepository {
        repositories::post::PostRepository::new(self.conn.clone())
    }

    fn comment_repo(&self) -> repositories::comment::CommentRepository {
        repositories::comment::CommentRepository::new(self.conn.clone())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        self.post_repo().list().await
    }

    pub async fn get_post(&self, id: i32) -> Result<Option<Post>> {
        self.post_repo().get(id).await
    }

    pub async fn create_post(&self, post: &NewPost) -> Result<Post> {
        self.post_repo().create(post).await
    }

    pub async fn list_comments_for_post(&self, post_id: i32) -> Result<Vec<Comment>> {
        self.comment_repo().list_for_post(post_id).await
    }

    pub async fn count_comments_for_post(&self, post_id: i32) -> Result<u64> {
        self.comment_repo().count_for_post(post_id).await
    }

    pub async fn create_comment(&self, post_id: i32, content: &str) -> Result<Comment> {
        self.comment_repo().create(post_id, content).await
    }

    pub async fn get_user_credentials(&self, username: &str) -> Result<Option<UserCredentials>> {
        self.user_repo().get_credentials(username).await
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        self.user_repo().exists(username).await
    }

    pub async fn count_users(&self) -> Result<u64> {
        self.user_repo().count().await
    }

    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        totp_secret: &str,
    ) -> Result<User, DbErr> {
        self.user_repo()
            .create(username, password_hash, totp_secret)
            .await
    }
}
