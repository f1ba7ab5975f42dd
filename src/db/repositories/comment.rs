use crate::entities::{comments, prelude::*};
use crate::models::post::Comment;
use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use tracing::debug;

/// Repository for comment operations
pub struct CommentRepository {
    conn: DatabaseConnection,
}

impl CommentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_for_post(&self, post_id: i32) -> Result<Vec<Comment>> {
        let rows = Comments::find()
            .filter(comments::Column::PostId.eq(post_id))
            .order_by_asc(comments::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list comments for post")?;

        Ok(rows.into_iter().map(Comment::from).collect())
    }

    pub async fn count_for_post(&self, post_id: i32) -> Result<u64> {
        let count = Comments::find()
            .filter(comments::Column::PostId.eq(post_id))
            .count(&self.conn)
            .await
            .context("Failed to count comments for post")?;

        Ok(count)
    }

    pub async fn create(&self, post_id: i32, content: &str) -> Result<Comment> {
        let active_model = comments::ActiveModel {
            post_id: Set(post_id),
            content: Set(content.to_string()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let res = Comments::insert(active_model)
            .exec(&self.conn)
            .await
            .with_context(|| format!("Failed to insert comment for post {post_id}"))?;

        let created = Comments::find_by_id(res.last_insert_id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!("Comment {} vanished after insert", res.last_insert_id)
            })?;

        debug!(post_id, comment_id = created.id, "Created comment");
        Ok(Comment::from(created))
    }
}
