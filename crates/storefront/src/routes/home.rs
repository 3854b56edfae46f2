//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use super::PageContext;
use super::products::ProductCard;
use crate::cms::{HOME_POST_LIMIT, Post, Testimonial};
use crate::db::CatalogRepository;
use crate::error::Result;
use crate::filters;
use crate::state::AppState;

/// Featured products on the home page.
const FEATURED_LIMIT: i64 = 8;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub ctx: PageContext,
    pub featured: Vec<ProductCard>,
    pub posts: Vec<Post>,
    pub testimonials: Vec<Testimonial>,
}

/// Display the home page.
///
/// CMS sections fall back to empty lists so the catalog still renders when
/// the CMS is down.
#[instrument(skip(state, ctx))]
pub async fn home(State(state): State<AppState>, ctx: PageContext) -> Result<impl IntoResponse> {
    let featured = CatalogRepository::new(state.pool())
        .featured(FEATURED_LIMIT)
        .await?;

    let (posts, testimonials) = tokio::join!(
        state.cms().posts(None, HOME_POST_LIMIT),
        state.cms().testimonials()
    );

    let posts = posts.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load posts for home page");
        Vec::new()
    });
    let testimonials = testimonials.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load testimonials for home page");
        Vec::new()
    });

    Ok(HomeTemplate {
        ctx,
        featured: featured.iter().map(ProductCard::from).collect(),
        posts,
        testimonials,
    })
}
