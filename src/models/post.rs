use serde::{Deserialize, Serialize};

use crate::entities::{comments, posts};

/// Maximum title length accepted by the `posts.title` column.
pub const MAX_TITLE_LEN: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub created_at: String,
}

impl From<posts::Model> for Post {
    fn from(model: posts::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            content: model.content,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: i32,
    pub post_id: i32,
    pub content: String,
    pub created_at: String,
}

impl From<comments::Model> for Comment {
    fn from(model: comments::Model) -> Self {
        Self {
            id: model.id,
            post_id: model.post_id,
            content: model.content,
            created_at: model.created_at,
        }
    }
}

/// Validated input for a new post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
}

/// A post together with its comments, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct PostThread {
    pub post: Post,
    pub comments: Vec<Comment>,
}
