//! `SeaORM` implementation of the `BlogService` trait.

use async_trait::async_trait;
use tracing::info;

use crate::db::Store;
use crate::models::post::{Comment, MAX_TITLE_LEN, NewPost, Post, PostThread};
use crate::services::blog_service::{BlogError, BlogService};

pub struct SeaOrmBlogService {
    store: Store,
}

impl SeaOrmBlogService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

pub fn validate_new_post(title: &str, content: &str) -> Result<NewPost, BlogError> {
    let title = title.trim();
    if title.is_empty() || content.trim().is_empty() {
        return Err(BlogError::Validation(
            "Title and Content are required!".to_string(),
        ));
    }

    if title.chars().count() > MAX_TITLE_LEN {
        return Err(BlogError::Validation(format!(
            "Title must be {MAX_TITLE_LEN} characters or less"
        )));
    }

    Ok(NewPost {
        title: title.to_string(),
        content: content.to_string(),
    })
}

pub fn validate_comment(content: &str) -> Result<&str, BlogError> {
    if content.trim().is_empty() {
        return Err(BlogError::Validation("Comment cannot be empty!".to_string()));
    }
    Ok(content)
}

#[async_trait]
impl BlogService for SeaOrmBlogService {
    async fn list_posts(&self) -> Result<Vec<Post>, BlogError> {
        Ok(self.store.list_posts().await?)
    }

    async fn create_post(&self, title: &str, content: &str) -> Result<Post, BlogError> {
        let new_post = validate_new_post(title, content)?;
        let post = self.store.create_post(&new_post).await?;
        info!(post_id = post.id, "Post created");
        Ok(post)
    }

    async fn get_thread(&self, post_id: i32) -> Result<PostThread, BlogError> {
        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or(BlogError::PostNotFound(post_id))?;

        let comments = self.store.list_comments_for_post(post_id).await?;

        Ok(PostThread { post, comments })
    }

    async fn add_comment(&self, post_id: i32, content: &str) -> Result<Comment, BlogError> {
        let content = validate_comment(content)?;

        if self.store.get_post(post_id).await?.is_none() {
            return Err(BlogError::PostNotFound(post_id));
        }

        let comment = self.store.create_comment(post_id, content).await?;
        info!(post_id, comment_id = comment.id, "Comment added");
        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_requires_title_and_content() {
        assert!(matches!(
            validate_new_post("", "World"),
            Err(BlogError::Validation(_))
        ));
        assert!(matches!(
            validate_new_post("Hello", "   "),
            Err(BlogError::Validation(_))
        ));
        let post = validate_new_post("  Hello ", "World").unwrap();
        assert_eq!(post.title, "Hello");
        assert_eq!(post.content, "World");
    }

    #[test]
    fn title_length_is_capped() {
        assert!(validate_new_post(&"t".repeat(100), "body").is_ok());
        assert!(validate_new_post(&"t".repeat(101), "body").is_err());
    }

    #[test]
    fn comment_must_not_be_blank() {
        assert!(validate_comment("Nice!").is_ok());
        assert!(validate_comment("\n\t ").is_err());
    }
}
