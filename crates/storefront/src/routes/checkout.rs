//! Checkout route handlers.
//!
//! `POST /checkout` turns the session cart into a pending order and sends
//! the buyer to the payment gateway. Stock is not touched here; it is
//! committed when the gateway reports the payment as approved.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use rand::RngCore;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use solenne_core::cart::{Cart, CartLine, CartTotals};
use solenne_core::order::{CheckoutContact, CheckoutContactInput, FieldError, OrderNumber, SUFFIX_LEN};
use solenne_core::settings::StoreSettings;
use solenne_core::ProductId;

use super::PageContext;
use super::cart::{CartView, load_cart, save_cart};
use crate::db::orders::{NewOrder, NewOrderItem};
use crate::db::{CatalogRepository, OrderRepository, RepositoryError};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::models::{Order, Product};
use crate::payments::{BackUrls, PreferenceItem, PreferencePayer, PreferenceRequest, Shipments};
use crate::state::AppState;

/// Attempts at drawing an unused order number.
const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// Checkout form template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/form.html")]
pub struct CheckoutTemplate {
    pub ctx: PageContext,
    pub cart: CartView,
    pub form: CheckoutContactInput,
    pub errors: Vec<String>,
}

/// Gateway return page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/result.html")]
pub struct CheckoutResultTemplate {
    pub ctx: PageContext,
    pub outcome: Outcome,
    pub order: Option<OrderResultView>,
}

/// Which back URL the gateway sent the buyer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Pending,
}

impl Outcome {
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    #[must_use]
    pub const fn heading(self) -> &'static str {
        match self {
            Self::Success => "Thank you for your order!",
            Self::Failure => "Payment not completed",
            Self::Pending => "Payment pending",
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Success => "We received your payment and will email you a confirmation shortly.",
            Self::Failure => {
                "Your payment was not approved and nothing was charged. You can place a new order at any time."
            }
            Self::Pending => "Your payment is being processed. We will email you as soon as it is confirmed.",
        }
    }
}

/// Order summary on the return page.
pub struct OrderResultView {
    pub number: String,
    pub status: String,
    pub total: String,
}

impl From<&Order> for OrderResultView {
    fn from(order: &Order) -> Self {
        Self {
            number: order.order_number.clone(),
            status: order.status.label().to_owned(),
            total: order.money(order.total).display(),
        }
    }
}

/// Query string the gateway appends to back URLs.
#[derive(Debug, Deserialize)]
pub struct ReturnQuery {
    pub external_reference: Option<String>,
}

/// Display the checkout form.
#[instrument(skip(state, session, ctx))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
) -> Result<Response> {
    let cart = load_cart(&session).await;
    if cart.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }

    let settings = state.settings().get(state.pool()).await?;
    let Some(view) = CartView::build(&cart, &settings) else {
        return Ok(Redirect::to("/cart").into_response());
    };

    let form = ctx
        .customer
        .as_ref()
        .map(|c| CheckoutContactInput {
            name: c.name.clone(),
            email: c.email.to_string(),
            ..CheckoutContactInput::default()
        })
        .unwrap_or_default();

    Ok(CheckoutTemplate {
        ctx,
        cart: view,
        form,
        errors: Vec::new(),
    }
    .into_response())
}

/// Place the order and redirect to the payment gateway.
#[instrument(skip(state, session, ctx, form))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<CheckoutContactInput>,
) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    if cart.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }
    let settings = state.settings().get(state.pool()).await?;

    let contact = match form.validate() {
        Ok(contact) => contact,
        Err(errors) => {
            let errors = errors.iter().map(describe_field_error).collect();
            return rerender(ctx, &cart, &settings, form, errors);
        }
    };

    let ids: Vec<ProductId> = cart.lines().iter().map(|l| l.product_id).collect();
    let products = CatalogRepository::new(state.pool()).get_many(&ids).await?;
    let (repriced, items) = match reprice(&cart, &products) {
        Ok(priced) => priced,
        Err(problems) => return rerender(ctx, &cart, &settings, form, problems),
    };
    let totals = repriced
        .totals(&settings.shipping_policy())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let order = create_order(&state, &contact, &totals, &items).await?;
    add_breadcrumb("checkout", "Order created", Some(&[("order", &order.order_number)]));

    let request = preference_request(&state, &settings, &order, &contact, &items, &totals);
    let preference = match state.payments().create_preference(&request).await {
        Ok(preference) => preference,
        Err(e) => {
            tracing::error!(order_number = %order.order_number, error = %e, "Failed to create payment preference");
            return rerender(
                ctx,
                &repriced,
                &settings,
                form,
                vec![format!(
                    "We could not reach the payment provider. Your order {} was saved; please try again in a moment.",
                    order.order_number
                )],
            );
        }
    };

    OrderRepository::new(state.pool())
        .set_preference_id(order.id, &preference.id)
        .await?;

    cart.clear();
    save_cart(&session, &cart).await?;

    tracing::info!(order_number = %order.order_number, total = %order.total, "Checkout completed, redirecting to gateway");
    Ok(Redirect::to(state.payments().checkout_url(&preference)).into_response())
}

/// Gateway return page after an approved payment.
pub async fn success(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<ReturnQuery>,
) -> Result<impl IntoResponse> {
    result_page(&state, ctx, Outcome::Success, query).await
}

/// Gateway return page after a rejected or abandoned payment.
pub async fn failure(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<ReturnQuery>,
) -> Result<impl IntoResponse> {
    result_page(&state, ctx, Outcome::Failure, query).await
}

/// Gateway return page while the payment is in process.
pub async fn pending(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<ReturnQuery>,
) -> Result<impl IntoResponse> {
    result_page(&state, ctx, Outcome::Pending, query).await
}

async fn result_page(
    state: &AppState,
    ctx: PageContext,
    outcome: Outcome,
    query: ReturnQuery,
) -> Result<CheckoutResultTemplate> {
    let order = match query
        .external_reference
        .as_deref()
        .and_then(|r| OrderNumber::parse(r).ok())
    {
        Some(number) => OrderRepository::new(state.pool())
            .get_by_number(number.as_str())
            .await?,
        None => None,
    };

    Ok(CheckoutResultTemplate {
        ctx,
        outcome,
        order: order.as_ref().map(OrderResultView::from),
    })
}

fn rerender(
    ctx: PageContext,
    cart: &Cart,
    settings: &StoreSettings,
    form: CheckoutContactInput,
    errors: Vec<String>,
) -> Result<Response> {
    let view = CartView::build(cart, settings)
        .ok_or_else(|| AppError::BadRequest("Cart currency does not match the store".to_owned()))?;
    Ok((
        StatusCode::UNPROCESSABLE_ENTITY,
        CheckoutTemplate {
            ctx,
            cart: view,
            form,
            errors,
        },
    )
        .into_response())
}

fn describe_field_error(error: &FieldError) -> String {
    let label = match error.field {
        "postal_code" => "Postal code",
        "street" => "Street",
        "number" => "Number",
        "district" => "District",
        "city" => "City",
        "state" => "State",
        "email" => "Email",
        "phone" => "Phone",
        "name" => "Name",
        other => other,
    };
    format!("{label} {}", error.message)
}

/// Price every cart line from the database and check stock.
///
/// Returns the cart with current prices plus the order items, or a message
/// per line that can no longer be bought.
fn reprice(cart: &Cart, products: &[Product]) -> std::result::Result<(Cart, Vec<NewOrderItem>), Vec<String>> {
    let mut problems = Vec::new();
    let mut repriced = Cart::new();
    let mut items = Vec::with_capacity(cart.lines().len());

    for line in cart.lines() {
        let Some(product) = products.iter().find(|p| p.id == line.product_id && p.active) else {
            problems.push(format!("{} is no longer available", line.name));
            continue;
        };
        let quantity = i32::try_from(line.quantity).unwrap_or(i32::MAX);
        if quantity > product.stock {
            problems.push(if product.stock > 0 {
                format!("Only {} of {} left", product.stock, product.name)
            } else {
                format!("{} is sold out", product.name)
            });
            continue;
        }

        let added = repriced.add(CartLine {
            product_id: product.id,
            slug: product.slug.clone(),
            name: product.name.clone(),
            unit_price: product.unit_price(),
            quantity: line.quantity,
            image_url: product.image_url.clone(),
        });
        if let Err(e) = added {
            problems.push(format!("{}: {e}", product.name));
            continue;
        }
        items.push(NewOrderItem {
            product_id: product.id,
            product_name: product.name.clone(),
            product_slug: product.slug.clone(),
            unit_price: product.price,
            quantity,
        });
    }

    if problems.is_empty() {
        Ok((repriced, items))
    } else {
        Err(problems)
    }
}

/// Insert the order, drawing a fresh number if one is already taken.
async fn create_order(
    state: &AppState,
    contact: &CheckoutContact,
    totals: &CartTotals,
    items: &[NewOrderItem],
) -> Result<Order> {
    let repo = OrderRepository::new(state.pool());
    let mut attempt = 0;
    loop {
        attempt += 1;
        let number = new_order_number();
        match repo
            .create(&NewOrder {
                number: &number,
                contact,
                totals,
                items,
            })
            .await
        {
            Err(RepositoryError::Conflict(_)) if attempt < ORDER_NUMBER_ATTEMPTS => {
                tracing::warn!(order_number = %number, "Order number collision, retrying");
            }
            result => return Ok(result?),
        }
    }
}

fn new_order_number() -> OrderNumber {
    let mut random = [0u8; SUFFIX_LEN];
    rand::rng().fill_bytes(&mut random);
    OrderNumber::from_parts(Utc::now().date_naive(), random)
}

fn preference_request(
    state: &AppState,
    settings: &StoreSettings,
    order: &Order,
    contact: &CheckoutContact,
    items: &[NewOrderItem],
    totals: &CartTotals,
) -> PreferenceRequest {
    let config = state.config();
    PreferenceRequest {
        items: items
            .iter()
            .map(|item| PreferenceItem {
                id: item.product_slug.clone(),
                title: item.product_name.clone(),
                quantity: u32::try_from(item.quantity).unwrap_or(1),
                unit_price: item.unit_price,
                currency_id: order.currency,
            })
            .collect(),
        payer: PreferencePayer {
            name: contact.name.clone(),
            email: contact.email.to_string(),
        },
        external_reference: order.order_number.clone(),
        back_urls: BackUrls {
            success: config.url("/checkout/success"),
            failure: config.url("/checkout/failure"),
            pending: config.url("/checkout/pending"),
        },
        auto_return: "approved",
        notification_url: config.url("/api/webhooks/payments"),
        shipments: (!totals.shipping.is_zero()).then(|| Shipments {
            cost: totals.shipping.amount,
            mode: "not_specified",
        }),
        statement_descriptor: settings.store_name.chars().take(22).collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use solenne_core::CurrencyCode;

    use super::*;

    fn product(id: i32, cents: i64, stock: i32) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            description: String::new(),
            price: Decimal::new(cents, 2),
            compare_at_price: None,
            currency: CurrencyCode::BRL,
            sku: None,
            stock,
            category_id: None,
            image_url: None,
            featured: false,
            active: true,
            membership_days: None,
            created_at: Utc::now(),
        }
    }

    fn cart_with(id: i32, cents: i64, quantity: u32) -> Cart {
        let mut cart = Cart::new();
        let p = product(id, cents, 100);
        cart.add(CartLine {
            product_id: p.id,
            slug: p.slug.clone(),
            name: p.name.clone(),
            unit_price: p.unit_price(),
            quantity,
            image_url: None,
        })
        .unwrap();
        cart
    }

    #[test]
    fn test_reprice_uses_database_price() {
        let cart = cart_with(1, 1000, 2);
        let (repriced, items) = reprice(&cart, &[product(1, 1500, 10)]).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].unit_price, Decimal::new(1500, 2));
        assert_eq!(items[0].line_total(), Decimal::new(3000, 2));
        assert_eq!(repriced.lines()[0].unit_price.amount, Decimal::new(1500, 2));
    }

    #[test]
    fn test_reprice_rejects_insufficient_stock() {
        let cart = cart_with(1, 1000, 3);
        let problems = reprice(&cart, &[product(1, 1000, 2)]).unwrap_err();
        assert_eq!(problems, vec!["Only 2 of Product 1 left".to_owned()]);

        let problems = reprice(&cart, &[product(1, 1000, 0)]).unwrap_err();
        assert_eq!(problems, vec!["Product 1 is sold out".to_owned()]);
    }

    #[test]
    fn test_reprice_rejects_missing_or_inactive_product() {
        let cart = cart_with(1, 1000, 1);
        assert!(reprice(&cart, &[]).is_err());

        let mut inactive = product(1, 1000, 5);
        inactive.active = false;
        assert!(reprice(&cart, &[inactive]).is_err());
    }

    #[test]
    fn test_new_order_number_parses() {
        let number = new_order_number();
        assert!(OrderNumber::parse(number.as_str()).is_ok());
    }

    #[test]
    fn test_describe_field_error() {
        let error = FieldError {
            field: "postal_code",
            message: "is invalid".into(),
        };
        assert_eq!(describe_field_error(&error), "Postal code is invalid");
    }
}
