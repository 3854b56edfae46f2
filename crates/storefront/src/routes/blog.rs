//! Blog route handlers.
//!
//! Posts come from the CMS; bodies are markdown rendered on the server.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use super::PageContext;
use crate::cms::{BLOG_POST_LIMIT, Post};
use crate::content::{reading_time, render_markdown};
use crate::error::{AppError, Result};
use crate::filters;
use crate::state::AppState;

/// Number of recent posts to show under a post.
const RECENT_POSTS_COUNT: usize = 3;

/// Post view for templates.
#[derive(Clone)]
pub struct PostView {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub author: Option<String>,
    pub published_date: String,
    pub cover_image_url: Option<String>,
    pub tags: Vec<String>,
    pub content_html: String,
    pub reading_time_minutes: usize,
}

impl From<&Post> for PostView {
    fn from(post: &Post) -> Self {
        Self {
            slug: post.slug.clone(),
            title: post.title.clone(),
            excerpt: post.excerpt.clone(),
            author: post.author.clone(),
            published_date: post.published_date(),
            cover_image_url: post.cover_image_url.clone(),
            tags: post.tags.clone(),
            content_html: render_markdown(&post.body),
            reading_time_minutes: reading_time(&post.body),
        }
    }
}

/// Blog index query parameters.
#[derive(Debug, Deserialize)]
pub struct BlogQuery {
    pub tag: Option<String>,
}

/// Blog index page template.
#[derive(Template, WebTemplate)]
#[template(path = "blog/index.html")]
pub struct BlogIndexTemplate {
    pub ctx: PageContext,
    pub posts: Vec<PostView>,
    pub tag: Option<String>,
}

/// Blog post detail template.
#[derive(Template, WebTemplate)]
#[template(path = "blog/show.html")]
pub struct BlogShowTemplate {
    pub ctx: PageContext,
    pub post: PostView,
    pub recent_posts: Vec<PostView>,
    /// Canonical URL of the post.
    pub canonical_url: String,
}

/// Display the blog index page with all published posts.
#[instrument(skip(state, ctx))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<BlogQuery>,
) -> Result<impl IntoResponse> {
    let tag = query.tag.filter(|t| !t.trim().is_empty());
    let posts = state.cms().posts(tag.as_deref(), BLOG_POST_LIMIT).await?;

    Ok(BlogIndexTemplate {
        ctx,
        posts: posts.iter().map(PostView::from).collect(),
        tag,
    })
}

/// Display a single blog post by slug.
///
/// # Errors
///
/// Returns 404 if the post doesn't exist or is not published.
#[instrument(skip(state, ctx))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let post = state
        .cms()
        .post(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {slug}")))?;

    let recent_posts = match state.cms().posts(None, RECENT_POSTS_COUNT + 1).await {
        Ok(posts) => posts
            .iter()
            .filter(|p| p.slug != slug)
            .take(RECENT_POSTS_COUNT)
            .map(PostView::from)
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load recent posts");
            Vec::new()
        }
    };

    Ok(BlogShowTemplate {
        ctx,
        post: PostView::from(&post),
        recent_posts,
        canonical_url: state.config().url(&format!("/blog/{}", post.slug)),
    })
}
