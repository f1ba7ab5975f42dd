//! Domain service for posts and comments.

use thiserror::Error;

use crate::models::post::{Comment, Post, PostThread};

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("{0}")]
    Validation(String),

    #[error("Post {0} not found")]
    PostNotFound(i32),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for BlogError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for BlogError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait BlogService: Send + Sync {
    /// All posts, in insertion order.
    async fn list_posts(&self) -> Result<Vec<Post>, BlogError>;

    /// Creates a post. Both fields are required and the title is capped at 100 characters.
    async fn create_post(&self, title: &str, content: &str) -> Result<Post, BlogError>;

    /// A post and its comments.
    ///
    /// # Errors
    ///
    /// Returns [`BlogError::PostNotFound`] for an unknown id.
    async fn get_thread(&self, post_id: i32) -> Result<PostThread, BlogError>;

    /// Adds a comment to an existing post.
    async fn add_comment(&self, post_id: i32, content: &str) -> Result<Comment, BlogError>;
}
