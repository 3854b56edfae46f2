//! Cart route handlers.
//!
//! The cart lives in the session as a `solenne_core::cart::Cart`. Forms post
//! normally; requests sent by the cart script (`HX-Request: true`) get
//! fragments back plus an `HX-Trigger: cart-updated` header so the badge
//! refreshes.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use solenne_core::ProductId;
use solenne_core::cart::{Cart, CartLine, MAX_LINE_QUANTITY};
use solenne_core::settings::StoreSettings;

use super::{PageContext, is_htmx};
use crate::db::CatalogRepository;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::models::session_keys;
use crate::state::AppState;

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub product_id: i32,
    pub slug: String,
    pub name: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
    pub image_url: Option<String>,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub shipping: String,
    pub total: String,
    pub item_count: u32,
    /// How much more buys free shipping, when a threshold is configured.
    pub free_shipping_remaining: Option<String>,
}

impl CartView {
    /// Build the view with totals under the current shipping settings.
    ///
    /// Returns `None` when the cart is priced in another currency than the
    /// store, which happens only after the store currency changed.
    #[must_use]
    pub fn build(cart: &Cart, settings: &StoreSettings) -> Option<Self> {
        let policy = settings.shipping_policy();
        let totals = cart.totals(&policy).ok()?;

        Some(Self {
            items: cart
                .lines()
                .iter()
                .map(|line| CartItemView {
                    product_id: line.product_id.as_i32(),
                    slug: line.slug.clone(),
                    name: line.name.clone(),
                    quantity: line.quantity,
                    price: line.unit_price.display(),
                    line_price: line.line_total().display(),
                    image_url: line.image_url.clone(),
                })
                .collect(),
            subtotal: totals.subtotal.display(),
            shipping: if totals.shipping.is_zero() {
                "Free".to_owned()
            } else {
                totals.shipping.display()
            },
            total: totals.total.display(),
            item_count: cart.item_count(),
            free_shipping_remaining: if cart.is_empty() {
                None
            } else {
                policy
                    .remaining_for_free_shipping(totals.subtotal)
                    .map(|m| m.display())
            },
        })
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Load the cart from the session; a missing or unreadable cart is empty.
pub async fn load_cart(session: &Session) -> Cart {
    match session.get::<Cart>(session_keys::CART).await {
        Ok(cart) => cart.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Discarding unreadable cart from session");
            Cart::new()
        }
    }
}

/// Store the cart in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn save_cart(
    session: &Session,
    cart: &Cart,
) -> std::result::Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CART, cart).await
}

/// Cart view for the session cart, resetting it when it cannot be priced.
async fn current_view(session: &Session, settings: &StoreSettings) -> Result<CartView> {
    let mut cart = load_cart(session).await;
    if let Some(view) = CartView::build(&cart, settings) {
        return Ok(view);
    }

    tracing::warn!(currency = %settings.currency, "Resetting cart priced in another currency");
    cart.clear();
    save_cart(session, &cart).await?;
    CartView::build(&cart, settings)
        .ok_or_else(|| AppError::Internal("empty cart could not be priced".to_owned()))
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: ProductId,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub ctx: PageContext,
    pub cart: CartView,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Display cart page.
#[instrument(skip(state, session, ctx))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    mut ctx: PageContext,
) -> Result<impl IntoResponse> {
    let settings = state.settings().get(state.pool()).await?;
    let cart = current_view(&session, &settings).await?;
    ctx.cart_count = cart.item_count;
    Ok(CartShowTemplate { ctx, cart })
}

/// Add item to cart.
///
/// The price snapshot always comes from the database, never the form.
#[instrument(skip(state, session, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let product = CatalogRepository::new(state.pool())
        .get_by_id(form.product_id)
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| AppError::NotFound(format!("Product {}", form.product_id)))?;

    if !product.is_available() {
        return Err(AppError::BadRequest(format!("{} is sold out", product.name)));
    }

    let mut cart = load_cart(&session).await;
    let quantity = form.quantity.unwrap_or(1).clamp(1, MAX_LINE_QUANTITY);
    let in_cart = cart
        .lines()
        .iter()
        .find(|l| l.product_id == product.id)
        .map_or(0, |l| l.quantity);
    let stock = u32::try_from(product.stock).unwrap_or(0);
    if in_cart + quantity > stock {
        return Err(AppError::BadRequest(format!(
            "Only {stock} of {} available",
            product.name
        )));
    }

    cart.add(CartLine {
        product_id: product.id,
        slug: product.slug.clone(),
        name: product.name.clone(),
        unit_price: product.unit_price(),
        quantity,
        image_url: product.image_url.clone(),
    })
    .map_err(|e| AppError::BadRequest(e.to_string()))?;
    save_cart(&session, &cart).await?;

    add_breadcrumb("cart", "Added to cart", Some(&[("product", &product.slug)]));

    if is_htmx(&headers) {
        return Ok((
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartCountTemplate {
                count: cart.item_count(),
            },
        )
            .into_response());
    }
    Ok(Redirect::to("/cart").into_response())
}

/// Update cart item quantity.
///
/// Quantities above the remaining stock are lowered to it; products that
/// were deactivated are dropped from the cart.
#[instrument(skip(state, session, headers))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let mut cart = load_cart(&session).await;

    let quantity = if form.quantity == 0 {
        0
    } else {
        match CatalogRepository::new(state.pool())
            .get_by_id(form.product_id)
            .await?
        {
            Some(product) if product.active => {
                form.quantity.min(u32::try_from(product.stock).unwrap_or(0))
            }
            _ => 0,
        }
    };
    cart.set_quantity(form.product_id, quantity);
    save_cart(&session, &cart).await?;

    items_response(&state, &session, &headers).await
}

/// Remove item from cart.
#[instrument(skip(state, session, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    if cart.remove(form.product_id) {
        save_cart(&session, &cart).await?;
    }

    items_response(&state, &session, &headers).await
}

/// Get cart count badge (HTMX).
#[instrument(skip(session))]
pub async fn count(session: Session) -> impl IntoResponse {
    CartCountTemplate {
        count: load_cart(&session).await.item_count(),
    }
}

/// Cart items fragment for script requests, redirect back for plain forms.
async fn items_response(state: &AppState, session: &Session, headers: &HeaderMap) -> Result<Response> {
    if !is_htmx(headers) {
        return Ok(Redirect::to("/cart").into_response());
    }

    let settings = state.settings().get(state.pool()).await?;
    let cart = current_view(session, &settings).await?;
    Ok((
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartItemsTemplate { cart },
    )
        .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use solenne_core::{CurrencyCode, Money};

    use super::*;

    fn line(id: i32, cents: i64, quantity: u32, currency: CurrencyCode) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            slug: format!("product-{id}"),
            name: format!("Product {id}"),
            unit_price: Money::new(Decimal::new(cents, 2), currency),
            quantity,
            image_url: None,
        }
    }

    #[test]
    fn test_view_shows_totals_and_free_shipping_hint() {
        let settings = StoreSettings::default();
        let mut cart = Cart::new();
        cart.add(line(1, 4990, 2, CurrencyCode::BRL)).unwrap();

        let view = CartView::build(&cart, &settings).unwrap();
        assert_eq!(view.item_count, 2);
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.subtotal, Money::new(Decimal::new(9980, 2), CurrencyCode::BRL).display());
        assert_eq!(view.shipping, settings.shipping_policy().flat_fee.display());
        assert!(view.free_shipping_remaining.is_some());
    }

    #[test]
    fn test_view_of_empty_cart_has_free_shipping_and_no_hint() {
        let view = CartView::build(&Cart::new(), &StoreSettings::default()).unwrap();
        assert_eq!(view.shipping, "Free");
        assert!(view.free_shipping_remaining.is_none());
        assert!(view.items.is_empty());
    }

    #[test]
    fn test_view_rejects_cart_in_other_currency() {
        let mut cart = Cart::new();
        cart.add(line(1, 1000, 1, CurrencyCode::USD)).unwrap();
        assert!(CartView::build(&cart, &StoreSettings::default()).is_none());
    }

    #[test]
    fn test_count_fragment_renders_count() {
        let html = CartCountTemplate { count: 3 }.render().unwrap();
        assert!(html.contains('3'));
    }
}
