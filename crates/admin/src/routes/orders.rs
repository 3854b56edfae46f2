//! Order route handlers.
//!
//! Orders are created by the storefront checkout; here staff follow them
//! through fulfilment. Status changes go through the transition rules in
//! [`OrderStatus::can_transition_to`].

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use solenne_core::{OrderId, OrderStatus};

use super::{AdminPage, Pagination, page_number, set_flash};
use crate::db::orders::{OrderFilter, StatusChange, StatusUpdate};
use crate::db::{OrderRepository, Page};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireWriter;
use crate::models::{Order, OrderItem, OrderListItem, Payment, StatusHistoryEntry};
use crate::state::AppState;

/// Query parameters of the order list.
#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
    pub q: Option<String>,
    pub page: Option<u32>,
}

impl OrdersQuery {
    /// Status filter; unknown values show every order.
    fn status(&self) -> Option<OrderStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Status change form.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
    #[serde(default)]
    pub tracking_code: String,
    #[serde(default)]
    pub note: String,
}

/// Order list template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub page: AdminPage,
    pub orders: Page<OrderListItem>,
    pub pagination: Pagination,
    pub statuses: &'static [OrderStatus],
    pub status: String,
    pub query: String,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub page: AdminPage,
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
    pub history: Vec<StatusHistoryEntry>,
    pub next_statuses: &'static [OrderStatus],
}

/// Paginated order list.
#[instrument(skip(page, state))]
pub async fn index(
    page: AdminPage,
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> Result<OrdersIndexTemplate> {
    let filter = OrderFilter {
        status: query.status(),
        query: query.q.clone(),
    };
    let orders = OrderRepository::new(state.pool())
        .list(&filter, page_number(query.page))
        .await?;

    let status = filter.status.map(|s| s.as_str().to_owned()).unwrap_or_default();
    let search = query.q.unwrap_or_default();
    let pagination = Pagination::new(&orders, "/orders", &[("status", &status), ("q", &search)]);

    Ok(OrdersIndexTemplate {
        page,
        orders,
        pagination,
        statuses: &OrderStatus::ALL,
        status,
        query: search,
    })
}

/// Order detail with items, payments and history.
#[instrument(skip(page, state))]
pub async fn show(
    page: AdminPage,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<OrderShowTemplate> {
    let repo = OrderRepository::new(state.pool());
    let order = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;

    Ok(OrderShowTemplate {
        page,
        next_statuses: order.status.next_actions(),
        items: repo.items(id).await?,
        payments: repo.payments(id).await?,
        history: repo.history(id).await?,
        order,
    })
}

/// Move an order to another status.
///
/// Customers are emailed for shipped, delivered, cancelled and refunded;
/// a failed email does not undo the change.
#[instrument(skip(admin, state, session, form), fields(admin_id = %admin.id))]
pub async fn update_status(
    RequireWriter(admin): RequireWriter,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<OrderId>,
    Form(form): Form<StatusForm>,
) -> Result<Redirect> {
    let target: OrderStatus = form
        .status
        .parse()
        .map_err(|_| AppError::BadRequest(format!("unknown status: {}", form.status)))?;

    let change = StatusChange {
        target,
        tracking_code: Some(form.tracking_code.as_str()),
        note: Some(form.note.as_str()),
        actor: admin.email.as_str(),
    };

    match OrderRepository::new(state.pool())
        .update_status(id, &change)
        .await?
    {
        StatusUpdate::Applied { order, from } => {
            tracing::info!(order_id = %id, from = %from, to = %order.status, "Order status updated");
            if order.status.notifies_customer() {
                let note = super::optional_text(&form.note);
                if let Err(e) = state.email().send_order_status(&order, note.as_deref()).await {
                    tracing::error!(order_id = %id, error = %e, "Failed to send order status email");
                }
            }
            set_flash(
                &session,
                format!("Order {} is now {}.", order.order_number, order.status.label()),
            )
            .await;
            Ok(Redirect::to(&format!("/orders/{id}")))
        }
        StatusUpdate::Rejected { current } => Err(AppError::BadRequest(format!(
            "an order that is {} cannot become {}",
            current.label().to_lowercase(),
            target.label().to_lowercase()
        ))),
    }
}
