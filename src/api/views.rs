//! Server-rendered HTML pages.
//!
//! Every piece of user-supplied text goes through `html_escape` before it is
//! interpolated; nothing else in the crate builds markup.

use axum::http::StatusCode;
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::fmt::Write;

use crate::models::post::{MAX_TITLE_LEN, Post, PostThread};
use crate::services::Registration;

/// Per-request chrome shared by every page.
#[derive(Debug, Default, Clone)]
pub struct PageContext {
    pub user: Option<String>,
    pub flashes: Vec<String>,
}

fn layout(title: &str, ctx: &PageContext, body: &str) -> String {
    let mut nav = String::from(r#"<a href="/">Home</a> | <a href="/add_post">New post</a> | "#);
    match &ctx.user {
        Some(user) => {
            let _ = write!(
                nav,
                r#"Signed in as <strong>{}</strong> | <a href="/logout">Log out</a>"#,
                text(user)
            );
        }
        None => nav.push_str(r#"<a href="/login">Log in</a> | <a href="/register">Register</a>"#),
    }

    let mut flashes = String::new();
    if !ctx.flashes.is_empty() {
        flashes.push_str(r#"<ul class="flashes">"#);
        for message in &ctx.flashes {
            let _ = write!(flashes, "<li>{}</li>", text(message));
        }
        flashes.push_str("</ul>");
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title} - Quill</title>\n</head>\n<body>\n<nav>{nav}</nav>\n{flashes}\n\
         <main>\n{body}\n</main>\n</body>\n</html>\n",
        title = text(title),
    )
}

fn error_line(error: Option<&str>) -> String {
    error.map_or_else(String::new, |e| {
        format!(r#"<p class="error">{}</p>"#, text(e))
    })
}

pub fn index(ctx: &PageContext, posts: &[Post]) -> String {
    let mut body = String::from("<h1>Posts</h1>\n");
    if posts.is_empty() {
        body.push_str("<p>No posts yet.</p>");
    } else {
        body.push_str("<ul class=\"posts\">\n");
        for post in posts {
            let _ = writeln!(
                body,
                r#"<li><a href="/posts/{}">{}</a></li>"#,
                post.id,
                text(&post.title)
            );
        }
        body.push_str("</ul>");
    }
    layout("Posts", ctx, &body)
}

pub fn add_post(ctx: &PageContext, title: &str, content: &str, error: Option<&str>) -> String {
    let body = format!(
        r#"<h1>New post</h1>
{error}
<form method="post" action="/add_post">
<label>Title <input type="text" name="title" maxlength="{max}" value="{title}"></label>
<label>Content <textarea name="content">{content}</textarea></label>
<button type="submit">Publish</button>
</form>"#,
        error = error_line(error),
        max = MAX_TITLE_LEN,
        title = attr(title),
        content = text(content),
    );
    layout("New post", ctx, &body)
}

pub fn post(ctx: &PageContext, thread: &PostThread, comment: &str, error: Option<&str>) -> String {
    let mut comments = String::new();
    if thread.comments.is_empty() {
        comments.push_str("<p>No comments yet.</p>");
    } else {
        comments.push_str("<ul class=\"comments\">\n");
        for c in &thread.comments {
            let _ = writeln!(comments, "<li>{}</li>", text(&c.content));
        }
        comments.push_str("</ul>");
    }

    let body = format!(
        r#"<article>
<h1>{title}</h1>
<div class="content">{content}</div>
</article>
<section>
<h2>Comments</h2>
{comments}
{error}
<form method="post" action="/posts/{id}">
<label>Comment <textarea name="content">{draft}</textarea></label>
<button type="submit">Comment</button>
</form>
</section>"#,
        title = text(&thread.post.title),
        content = text(&thread.post.content),
        error = error_line(error),
        id = thread.post.id,
        draft = text(comment),
    );
    layout(&thread.post.title, ctx, &body)
}

pub fn register(ctx: &PageContext, username: &str, error: Option<&str>) -> String {
    let body = format!(
        r#"<h1>Register</h1>
{error}
<form method="post" action="/register">
<label>Username <input type="text" name="username" value="{username}"></label>
<label>Password <input type="password" name="password"></label>
<button type="submit">Register</button>
</form>"#,
        error = error_line(error),
        username = attr(username),
    );
    layout("Register", ctx, &body)
}

/// Shown once: the QR code and the secret are never displayed again.
pub fn registered(ctx: &PageContext, registration: &Registration) -> String {
    let body = format!(
        r#"<h1>Welcome, {username}</h1>
<p>Scan this code with your authenticator app, then <a href="/login">log in</a>.</p>
<img src="{qr}" alt="TOTP QR code">
<p>Or enter the secret manually: <code>{secret}</code></p>"#,
        username = text(&registration.username),
        qr = attr(&registration.provisioning.qr_data_url()),
        secret = text(&registration.totp_secret),
    );
    layout("Registered", ctx, &body)
}

pub fn login(ctx: &PageContext, username: &str, error: Option<&str>) -> String {
    let body = format!(
        r#"<h1>Log in</h1>
{error}
<form method="post" action="/login">
<label>Username <input type="text" name="username" value="{username}"></label>
<label>Password <input type="password" name="password"></label>
<label>Code <input type="text" name="totp" inputmode="numeric" autocomplete="one-time-code"></label>
<button type="submit">Log in</button>
</form>"#,
        error = error_line(error),
        username = attr(username),
    );
    layout("Log in", ctx, &body)
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let heading = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Error")
    );
    let body = format!("<h1>{}</h1>\n<p>{}</p>", text(&heading), text(message));
    layout(&heading, &PageContext::default(), &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::post::Comment;

    fn sample_post(title: &str) -> Post {
        Post {
            id: 7,
            title: title.to_string(),
            content: "body".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn index_escapes_titles() {
        let html = index(&PageContext::default(), &[sample_post("<script>x</script>")]);
        assert!(html.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(!html.contains("<script>x"));
        assert!(html.contains(r#"href="/posts/7""#));
    }

    #[test]
    fn layout_shows_user_and_flashes() {
        let ctx = PageContext {
            user: Some("alice".to_string()),
            flashes: vec!["Post created".to_string()],
        };
        let html = index(&ctx, &[]);
        assert!(html.contains("Signed in as <strong>alice</strong>"));
        assert!(html.contains("<li>Post created</li>"));
        assert!(html.contains("No posts yet."));
    }

    #[test]
    fn add_post_keeps_draft_in_attribute_safe_form() {
        let html = add_post(
            &PageContext::default(),
            r#"a "quoted" title"#,
            "",
            Some("Title and Content are required!"),
        );
        assert!(html.contains("a &quot;quoted&quot; title"));
        assert!(html.contains("Title and Content are required!"));
    }

    #[test]
    fn post_page_lists_comments() {
        let thread = PostThread {
            post: sample_post("Hello"),
            comments: vec![Comment {
                id: 1,
                post_id: 7,
                content: "Nice & tidy".to_string(),
                created_at: "2024-01-01T00:00:00Z".to_string(),
            }],
        };
        let html = post(&PageContext::default(), &thread, "", None);
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("<li>Nice &amp; tidy</li>"));
        assert!(html.contains(r#"action="/posts/7""#));
    }

    #[test]
    fn error_page_names_status() {
        let html = error_page(StatusCode::NOT_FOUND, "Post 3 not found");
        assert!(html.contains("404 Not Found"));
        assert!(html.contains("Post 3 not found"));
    }
}
