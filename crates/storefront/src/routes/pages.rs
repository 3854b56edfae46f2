//! CMS page route handler.
//!
//! Serves editorial pages such as about, shipping policy and terms.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::instrument;

use super::PageContext;
use crate::content::render_markdown;
use crate::error::{AppError, Result};
use crate::filters;
use crate::state::AppState;

/// Content page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/show.html")]
pub struct ContentPageTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub content_html: String,
}

/// Display a CMS page by slug.
///
/// # Errors
///
/// Returns 404 if the page doesn't exist.
#[instrument(skip(state, ctx))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let page = state
        .cms()
        .page(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Page {slug}")))?;

    Ok(ContentPageTemplate {
        ctx,
        title: page.title,
        content_html: render_markdown(&page.body),
    })
}
