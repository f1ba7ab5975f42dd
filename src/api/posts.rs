use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::session::{flash, page_context};
use super::{ApiError, AppState, views};
use crate::services::BlogError;

#[derive(Debug, Deserialize)]
pub struct NewPostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct NewCommentForm {
    #[serde(default)]
    pub content: String,
}

/// Ids that are not a valid `i32` can never name a post.
fn parse_post_id(raw: &str) -> Result<i32, ApiError> {
    raw.parse().map_err(|_| ApiError::not_found("Post", raw))
}

/// GET /
pub async fn index(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Html<String>, ApiError> {
    let posts = state.shared.blog_service.list_posts().await?;
    let ctx = page_context(&session).await?;
    Ok(Html(views::index(&ctx, &posts)))
}

/// GET /add_post
pub async fn new_post_form(session: Session) -> Result<Html<String>, ApiError> {
    let ctx = page_context(&session).await?;
    Ok(Html(views::add_post(&ctx, "", "", None)))
}

/// POST /add_post
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<NewPostForm>,
) -> Result<Response, ApiError> {
    match state
        .shared
        .blog_service
        .create_post(&form.title, &form.content)
        .await
    {
        Ok(_) => {
            flash(&session, "Post created").await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(BlogError::Validation(message)) => {
            let ctx = page_context(&session).await?;
            Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                Html(views::add_post(&ctx, &form.title, &form.content, Some(&message))),
            )
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /posts/{id}
pub async fn show_post(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(raw_id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let id = parse_post_id(&raw_id)?;
    let thread = state.shared.blog_service.get_thread(id).await?;
    let ctx = page_context(&session).await?;
    Ok(Html(views::post(&ctx, &thread, "", None)))
}

/// POST /posts/{id}
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(raw_id): Path<String>,
    Form(form): Form<NewCommentForm>,
) -> Result<Response, ApiError> {
    let id = parse_post_id(&raw_id)?;
    let blog = &state.shared.blog_service;

    match blog.add_comment(id, &form.content).await {
        Ok(_) => {
            flash(&session, "Comment added").await?;
            Ok(Redirect::to(&format!("/posts/{id}")).into_response())
        }
        Err(BlogError::Validation(message)) => {
            let thread = blog.get_thread(id).await?;
            let ctx = page_context(&session).await?;
            Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                Html(views::post(&ctx, &thread, &form.content, Some(&message))),
            )
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}
