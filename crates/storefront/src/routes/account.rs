//! Account route handlers.
//!
//! All routes require a logged-in customer.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::instrument;

use super::PageContext;
use super::membership::MembershipStatusView;
use crate::db::{MembershipRepository, OrderRepository};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::{Order, OrderItem, OrderSummary};
use crate::state::AppState;

/// Order row in the history list.
#[derive(Clone)]
pub struct OrderRow {
    pub number: String,
    pub date: String,
    pub status: String,
    pub total: String,
    pub item_count: i64,
}

impl From<&OrderSummary> for OrderRow {
    fn from(order: &OrderSummary) -> Self {
        Self {
            number: order.order_number.clone(),
            date: order.created_at.format("%b %-d, %Y").to_string(),
            status: order.status.label().to_owned(),
            total: solenne_core::Money::new(order.total, order.currency).display(),
            item_count: order.item_count,
        }
    }
}

/// Order detail display data.
#[derive(Clone)]
pub struct OrderDetailView {
    pub number: String,
    pub date: String,
    pub status: String,
    pub subtotal: String,
    pub shipping: String,
    pub total: String,
    pub contact_name: String,
    pub address: String,
    pub tracking_code: Option<String>,
    pub notes: Option<String>,
}

impl From<&Order> for OrderDetailView {
    fn from(order: &Order) -> Self {
        Self {
            number: order.order_number.clone(),
            date: order.created_at.format("%b %-d, %Y").to_string(),
            status: order.status.label().to_owned(),
            subtotal: order.money(order.subtotal).display(),
            shipping: order.money(order.shipping).display(),
            total: order.money(order.total).display(),
            contact_name: order.contact_name.clone(),
            address: order.shipping_address.one_line(),
            tracking_code: order.tracking_code.clone(),
            notes: order.notes.clone(),
        }
    }
}

/// Order line display data.
#[derive(Clone)]
pub struct OrderItemView {
    pub name: String,
    pub slug: String,
    pub quantity: i32,
    pub unit_price: String,
    pub line_total: String,
}

impl OrderItemView {
    fn new(order: &Order, item: &OrderItem) -> Self {
        Self {
            name: item.product_name.clone(),
            slug: item.product_slug.clone(),
            quantity: item.quantity,
            unit_price: order.money(item.unit_price).display(),
            line_total: order.money(item.line_total).display(),
        }
    }
}

/// Account overview template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub ctx: PageContext,
    pub orders: Vec<OrderRow>,
    pub membership: MembershipStatusView,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "account/order.html")]
pub struct OrderDetailTemplate {
    pub ctx: PageContext,
    pub order: OrderDetailView,
    pub items: Vec<OrderItemView>,
}

/// Display the account overview: order history and membership status.
#[instrument(skip(state, customer, ctx))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    ctx: PageContext,
) -> Result<impl IntoResponse> {
    let orders = OrderRepository::new(state.pool())
        .list_for_customer(customer.id)
        .await?;
    let subscription = MembershipRepository::new(state.pool())
        .subscription(customer.id)
        .await?;

    Ok(AccountIndexTemplate {
        ctx,
        orders: orders.iter().map(OrderRow::from).collect(),
        membership: MembershipStatusView::new(subscription.as_ref(), Utc::now()),
    })
}

/// Display one of the customer's orders.
///
/// Orders of other customers answer 404, the same as unknown numbers.
#[instrument(skip(state, customer, ctx))]
pub async fn order(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    ctx: PageContext,
    Path(number): Path<String>,
) -> Result<impl IntoResponse> {
    let repo = OrderRepository::new(state.pool());
    let order = repo
        .get_by_number(&number)
        .await?
        .filter(|o| o.customer_id == customer.id)
        .ok_or_else(|| AppError::NotFound(format!("Order {number}")))?;

    let items = repo.items(order.id).await?;

    Ok(OrderDetailTemplate {
        ctx,
        items: items.iter().map(|i| OrderItemView::new(&order, i)).collect(),
        order: OrderDetailView::from(&order),
    })
}
