//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use solenne_core::membership::MAX_GRANT_DAYS;
use solenne_core::{CategoryId, CurrencyCode, Money, ProductId, Slug};

use super::{AdminPage, Pagination, checked, optional_text, page_number, parse_int, set_flash};
use crate::db::catalog::{ProductFilter, ProductInput};
use crate::db::{CatalogRepository, Page, RepositoryError, SettingsRepository};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireWriter;
use crate::models::{Category, Product};
use crate::state::AppState;

const MAX_NAME_LENGTH: usize = 200;
const SLUG_OR_SKU_TAKEN: &str = "Another product already uses this slug or SKU";

/// Query parameters of the product list.
#[derive(Debug, Deserialize)]
pub struct ProductsQuery {
    pub category: Option<String>,
    pub active: Option<String>,
    pub q: Option<String>,
    pub page: Option<u32>,
}

/// Product form, as typed by the admin.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductForm {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub price: String,
    #[serde(default)]
    pub compare_at_price: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub stock: String,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub image_url: String,
    pub featured: Option<String>,
    pub active: Option<String>,
    #[serde(default)]
    pub membership_days: String,
}

impl From<&Product> for ProductForm {
    fn from(p: &Product) -> Self {
        Self {
            name: p.name.clone(),
            slug: p.slug.clone(),
            description: p.description.clone(),
            price: p.price.to_string(),
            compare_at_price: p.compare_at_price.map(|d| d.to_string()).unwrap_or_default(),
            sku: p.sku.clone().unwrap_or_default(),
            stock: p.stock.to_string(),
            category_id: p.category_id.map(|c| c.to_string()).unwrap_or_default(),
            image_url: p.image_url.clone().unwrap_or_default(),
            featured: p.featured.then(|| "on".to_owned()),
            active: p.active.then(|| "on".to_owned()),
            membership_days: p.membership_days.map(|d| d.to_string()).unwrap_or_default(),
        }
    }
}

impl ProductForm {
    /// Blank form for a new product: active, no stock.
    fn new_product() -> Self {
        Self {
            active: Some("on".to_owned()),
            stock: "0".to_owned(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_featured(&self) -> bool {
        checked(self.featured.as_deref())
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        checked(self.active.as_deref())
    }

    /// Validate into repository input. The slug defaults to one derived from the name.
    ///
    /// # Errors
    ///
    /// Returns a message for the first invalid field.
    pub fn validate(&self, currency: CurrencyCode) -> std::result::Result<ProductInput, String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Name is required".to_owned());
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(format!("Name must be at most {MAX_NAME_LENGTH} characters"));
        }

        let slug = match optional_text(&self.slug) {
            Some(slug) => Slug::parse(&slug),
            None => Slug::from_title(name),
        }
        .map_err(|e| format!("Slug: {e}"))?;

        let price = Money::parse(&self.price, currency)
            .map_err(|e| format!("Price: {e}"))?
            .amount;
        if price <= Decimal::ZERO {
            return Err("Price must be greater than zero".to_owned());
        }

        let compare_at_price = match optional_text(&self.compare_at_price) {
            Some(value) => {
                let amount = Money::parse(&value, currency)
                    .map_err(|e| format!("Compare-at price: {e}"))?
                    .amount;
                if amount <= price {
                    return Err("Compare-at price must be higher than the price".to_owned());
                }
                Some(amount)
            }
            None => None,
        };

        let stock = parse_int("Stock", &self.stock, 0)?;
        if stock < 0 {
            return Err("Stock cannot be negative".to_owned());
        }

        let category_id = match optional_text(&self.category_id) {
            Some(id) => Some(
                id.parse::<CategoryId>()
                    .map_err(|_| "Unknown category".to_owned())?,
            ),
            None => None,
        };

        let image_url = optional_text(&self.image_url);
        if image_url
            .as_deref()
            .is_some_and(|u| !(u.starts_with("https://") || u.starts_with('/')))
        {
            return Err("Image URL must start with https:// or /".to_owned());
        }

        let membership_days = match optional_text(&self.membership_days) {
            Some(days) => {
                let days = parse_int("Membership days", &days, 0)?;
                if !u32::try_from(days).is_ok_and(|d| (1..=MAX_GRANT_DAYS).contains(&d)) {
                    return Err(format!(
                        "Membership days must be between 1 and {MAX_GRANT_DAYS}"
                    ));
                }
                Some(days)
            }
            None => None,
        };

        Ok(ProductInput {
            name: name.to_owned(),
            slug: slug.as_str().to_owned(),
            description: self.description.trim().to_owned(),
            price,
            compare_at_price,
            currency,
            sku: optional_text(&self.sku),
            stock,
            category_id,
            image_url,
            featured: self.is_featured(),
            active: self.is_active(),
            membership_days,
        })
    }
}

/// Product list template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub page: AdminPage,
    pub products: Page<Product>,
    pub pagination: Pagination,
    pub categories: Vec<Category>,
    pub category: String,
    pub active: String,
    pub query: String,
}

/// Product create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub page: AdminPage,
    pub heading: String,
    pub action: String,
    pub product_id: Option<ProductId>,
    pub form: ProductForm,
    pub categories: Vec<Category>,
    pub currency: CurrencyCode,
    pub error: Option<String>,
}

/// Paginated product list.
#[instrument(skip(page, state))]
pub async fn index(
    page: AdminPage,
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> Result<ProductsIndexTemplate> {
    let filter = ProductFilter {
        category_id: query.category.as_deref().and_then(|c| c.parse().ok()),
        active: match query.active.as_deref() {
            Some("active") => Some(true),
            Some("inactive") => Some(false),
            _ => None,
        },
        query: query.q.clone(),
    };
    let repo = CatalogRepository::new(state.pool());
    let products = repo.list_products(&filter, page_number(query.page)).await?;

    let category = filter.category_id.map(|c| c.to_string()).unwrap_or_default();
    let active = match filter.active {
        Some(true) => "active",
        Some(false) => "inactive",
        None => "",
    }
    .to_owned();
    let search = query.q.unwrap_or_default();
    let pagination = Pagination::new(
        &products,
        "/products",
        &[("category", &category), ("active", &active), ("q", &search)],
    );

    Ok(ProductsIndexTemplate {
        page,
        products,
        pagination,
        categories: repo.categories().await?,
        category,
        active,
        query: search,
    })
}

async fn store_currency(state: &AppState) -> Result<CurrencyCode> {
    Ok(SettingsRepository::new(state.pool()).store().await?.currency)
}

/// New product form.
pub async fn new_form(
    page: AdminPage,
    State(state): State<AppState>,
) -> Result<ProductFormTemplate> {
    Ok(ProductFormTemplate {
        page,
        heading: "New product".to_owned(),
        action: "/products/new".to_owned(),
        product_id: None,
        form: ProductForm::new_product(),
        categories: CatalogRepository::new(state.pool()).categories().await?,
        currency: store_currency(&state).await?,
        error: None,
    })
}

/// Create a product.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    RequireWriter(admin): RequireWriter,
    page: AdminPage,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let currency = store_currency(&state).await?;
    let repo = CatalogRepository::new(state.pool());

    let input = match form.validate(currency) {
        Ok(input) => input,
        Err(message) => {
            let template = form_with_error(page, &state, None, form, currency, message).await?;
            return Ok((StatusCode::BAD_REQUEST, template).into_response());
        }
    };

    match repo.create_product(&input).await {
        Ok(id) => {
            tracing::info!(product_id = %id, "Product created");
            set_flash(&session, format!("Created {}.", input.name)).await;
            Ok(Redirect::to(&format!("/products/{id}/edit")).into_response())
        }
        Err(RepositoryError::Conflict(_)) => {
            let template =
                form_with_error(page, &state, None, form, currency, SLUG_OR_SKU_TAKEN.to_owned())
                    .await?;
            Ok((StatusCode::CONFLICT, template).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Edit product form.
pub async fn edit_form(
    page: AdminPage,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<ProductFormTemplate> {
    let repo = CatalogRepository::new(state.pool());
    let product = repo
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    Ok(ProductFormTemplate {
        page,
        heading: product.name.clone(),
        action: format!("/products/{id}/edit"),
        product_id: Some(id),
        form: ProductForm::from(&product),
        categories: repo.categories().await?,
        currency: product.currency,
        error: None,
    })
}

/// Save a product.
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn update(
    RequireWriter(admin): RequireWriter,
    page: AdminPage,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProductId>,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let currency = store_currency(&state).await?;

    let input = match form.validate(currency) {
        Ok(input) => input,
        Err(message) => {
            let template =
                form_with_error(page, &state, Some(id), form, currency, message).await?;
            return Ok((StatusCode::BAD_REQUEST, template).into_response());
        }
    };

    match CatalogRepository::new(state.pool())
        .update_product(id, &input)
        .await
    {
        Ok(()) => {
            set_flash(&session, format!("Saved {}.", input.name)).await;
            Ok(Redirect::to(&format!("/products/{id}/edit")).into_response())
        }
        Err(RepositoryError::Conflict(_)) => {
            let template = form_with_error(
                page,
                &state,
                Some(id),
                form,
                currency,
                SLUG_OR_SKU_TAKEN.to_owned(),
            )
            .await?;
            Ok((StatusCode::CONFLICT, template).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// The submitted form again, with the problem shown above it.
async fn form_with_error(
    page: AdminPage,
    state: &AppState,
    product_id: Option<ProductId>,
    form: ProductForm,
    currency: CurrencyCode,
    message: String,
) -> Result<ProductFormTemplate> {
    let (heading, action) = match product_id {
        Some(id) => (form.name.clone(), format!("/products/{id}/edit")),
        None => ("New product".to_owned(), "/products/new".to_owned()),
    };
    Ok(ProductFormTemplate {
        page,
        heading,
        action,
        product_id,
        form,
        categories: CatalogRepository::new(state.pool()).categories().await?,
        currency,
        error: Some(message),
    })
}

/// Activate or deactivate a product.
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn toggle(
    RequireWriter(admin): RequireWriter,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProductId>,
) -> Result<Redirect> {
    let active = CatalogRepository::new(state.pool())
        .toggle_active(id)
        .await?;
    let message = if active {
        "Product is now on sale."
    } else {
        "Product hidden from the store."
    };
    set_flash(&session, message).await;
    Ok(Redirect::to("/products"))
}

/// Delete a product no order references; otherwise 409.
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn delete(
    RequireWriter(admin): RequireWriter,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProductId>,
) -> Result<Redirect> {
    CatalogRepository::new(state.pool())
        .delete_product(id)
        .await?;
    tracing::info!(product_id = %id, "Product deleted");
    set_flash(&session, "Product deleted.").await;
    Ok(Redirect::to("/products"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> ProductForm {
        ProductForm {
            name: "Sérum Vitamina C".into(),
            price: "89,90".into(),
            stock: "12".into(),
            active: Some("on".into()),
            ..ProductForm::default()
        }
    }

    #[test]
    fn test_slug_defaults_from_name() {
        let input = form().validate(CurrencyCode::BRL).unwrap();
        assert_eq!(input.slug, "serum-vitamina-c");
        assert_eq!(input.price, Decimal::new(8990, 2));
        assert!(input.active);
        assert!(!input.featured);
        assert_eq!(input.sku, None);
    }

    #[test]
    fn test_rejects_bad_fields() {
        let mut f = form();
        f.price = "0".into();
        assert!(f.validate(CurrencyCode::BRL).is_err());

        let mut f = form();
        f.compare_at_price = "50".into();
        assert_eq!(
            f.validate(CurrencyCode::BRL).unwrap_err(),
            "Compare-at price must be higher than the price"
        );

        let mut f = form();
        f.stock = "-1".into();
        assert!(f.validate(CurrencyCode::BRL).is_err());

        let mut f = form();
        f.slug = "Not A Slug".into();
        assert!(f.validate(CurrencyCode::BRL).unwrap_err().starts_with("Slug:"));

        let mut f = form();
        f.image_url = "javascript:alert(1)".into();
        assert!(f.validate(CurrencyCode::BRL).is_err());
    }

    #[test]
    fn test_membership_days_within_grant_limit() {
        let mut f = form();
        f.membership_days = "30".into();
        assert_eq!(f.validate(CurrencyCode::BRL).unwrap().membership_days, Some(30));
        f.membership_days = "3650".into();
        assert_eq!(f.validate(CurrencyCode::BRL).unwrap().membership_days, Some(3650));
        for days in ["0", "-5", "3651", "100000000"] {
            f.membership_days = days.into();
            assert_eq!(
                f.validate(CurrencyCode::BRL).unwrap_err(),
                "Membership days must be between 1 and 3650",
                "{days}"
            );
        }
    }
}
