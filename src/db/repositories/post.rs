use crate::entities::{posts, prelude::*};
use crate::models::post::{NewPost, Post};
use anyhow::{Context, Result};
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, Set};
use tracing::debug;

/// Repository for blog post operations
pub struct PostRepository {
    conn: DatabaseConnection,
}

impl PostRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// All posts in insertion order.
    pub async fn list(&self) -> Result<Vec<Post>> {
        let rows = Posts::find()
            .order_by_asc(posts::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list posts")?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    pub async fn get(&self, id: i32) -> Result<Option<Post>> {
        let row = Posts::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query post by ID")?;

        Ok(row.map(Post::from))
    }

    pub async fn create(&self, post: &NewPost) -> Result<Post> {
        let active_model = posts::ActiveModel {
            title: Set(post.title.clone()),
            content: Set(post.content.clone()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let res = Posts::insert(active_model)
            .exec(&self.conn)
            .await
            .context("Failed to insert post")?;

        let created = Posts::find_by_id(res.last_insert_id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Post {} vanished after insert", res.last_insert_id))?;

        debug!(post_id = created.id, "Created post");
        Ok(Post::from(created))
    }
}
