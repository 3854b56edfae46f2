//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use solenne_core::cart::MAX_LINE_QUANTITY;

use super::PageContext;
use crate::content::render_markdown;
use crate::db::CatalogRepository;
use crate::db::catalog::ProductFilter;
use crate::error::{AppError, Result};
use crate::filters;
use crate::models::{Category, Product};
use crate::state::AppState;

/// Related products shown under a product.
const RELATED_LIMIT: i64 = 4;

/// Product tile used on listings and the home page.
#[derive(Clone)]
pub struct ProductCard {
    pub slug: String,
    pub name: String,
    pub price: String,
    pub compare_at_price: Option<String>,
    pub image_url: Option<String>,
    pub sold_out: bool,
}

impl From<&Product> for ProductCard {
    fn from(product: &Product) -> Self {
        Self {
            slug: product.slug.clone(),
            name: product.name.clone(),
            price: product.unit_price().display(),
            compare_at_price: product.compare_at().map(|m| m.display()),
            image_url: product.image_url.clone(),
            sold_out: !product.is_available(),
        }
    }
}

/// Product detail display data.
#[derive(Clone)]
pub struct ProductView {
    pub id: i32,
    pub slug: String,
    pub name: String,
    pub description_html: String,
    pub price: String,
    pub compare_at_price: Option<String>,
    pub image_url: Option<String>,
    pub sku: Option<String>,
    pub stock_label: String,
    pub available: bool,
    pub quantity_options: Vec<u32>,
    pub membership_days: Option<i32>,
}

impl ProductView {
    fn new(product: &Product, stock_label: String) -> Self {
        let max = u32::try_from(product.stock)
            .unwrap_or(0)
            .min(MAX_LINE_QUANTITY);
        Self {
            id: product.id.as_i32(),
            slug: product.slug.clone(),
            name: product.name.clone(),
            description_html: render_markdown(&product.description),
            price: product.unit_price().display(),
            compare_at_price: product.compare_at().map(|m| m.display()),
            image_url: product.image_url.clone(),
            sku: product.sku.clone(),
            stock_label,
            available: product.is_available(),
            quantity_options: (1..=max).collect(),
            membership_days: product.membership_days.filter(|d| *d > 0),
        }
    }
}

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    pub page: Option<u32>,
}

impl ProductQuery {
    /// Listing URL for another page, keeping the other filters.
    fn page_url(&self, page: u32) -> String {
        let mut params = Vec::new();
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            params.push(format!("category={}", urlencoding::encode(category)));
        }
        if let Some(q) = self.q.as_deref().filter(|q| !q.trim().is_empty()) {
            params.push(format!("q={}", urlencoding::encode(q.trim())));
        }
        params.push(format!("page={page}"));
        format!("/products?{}", params.join("&"))
    }
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub ctx: PageContext,
    pub products: Vec<ProductCard>,
    pub categories: Vec<Category>,
    pub current_category: Option<String>,
    pub query: String,
    pub total: i64,
    pub current_page: u32,
    pub total_pages: u32,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub ctx: PageContext,
    pub product: ProductView,
    pub category: Option<Category>,
    pub related_products: Vec<ProductCard>,
}

/// Display product listing page.
#[instrument(skip(state, ctx))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<ProductQuery>,
) -> Result<impl IntoResponse> {
    let catalog = CatalogRepository::new(state.pool());
    let current_page = query.page.unwrap_or(1).max(1);

    let page = catalog
        .list(&ProductFilter {
            category: query.category.clone(),
            query: query.q.clone(),
            page: current_page,
        })
        .await?;
    let categories = catalog.categories().await?;
    let total_pages = page.total_pages();

    Ok(ProductsIndexTemplate {
        ctx,
        products: page.products.iter().map(ProductCard::from).collect(),
        categories,
        current_category: query.category.clone().filter(|c| !c.is_empty()),
        query: query.q.clone().unwrap_or_default(),
        total: page.total,
        current_page,
        total_pages,
        prev_url: (current_page > 1).then(|| query.page_url(current_page - 1)),
        next_url: (current_page < total_pages).then(|| query.page_url(current_page + 1)),
    })
}

/// Display product detail page.
#[instrument(skip(state, ctx))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let catalog = CatalogRepository::new(state.pool());
    let product = catalog
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {slug}")))?;

    let settings = state.settings().get(state.pool()).await?;
    let related = catalog.related(&product, RELATED_LIMIT).await?;
    let category = match product.category_id {
        Some(id) => catalog.category(id).await?,
        None => None,
    };

    Ok(ProductShowTemplate {
        ctx,
        product: ProductView::new(&product, settings.stock_label(product.stock)),
        category,
        related_products: related.iter().map(ProductCard::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url_keeps_filters() {
        let query = ProductQuery {
            category: Some("skin care".into()),
            q: Some(" oil ".into()),
            page: Some(1),
        };
        assert_eq!(
            query.page_url(2),
            "/products?category=skin%20care&q=oil&page=2"
        );
        assert_eq!(ProductQuery::default().page_url(3), "/products?page=3");
    }
}
