//! Dashboard route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::instrument;

use solenne_core::Money;

use super::AdminPage;
use crate::analytics::DateRange;
use crate::db::{
    AnalyticsRepository, CatalogRepository, CustomerRepository, OrderRepository, SettingsRepository,
};
use crate::error::Result;
use crate::filters;
use crate::models::{LowStockProduct, OrderListItem};
use crate::state::AppState;

/// Orders shown in the "recent" table.
const RECENT_ORDERS: i64 = 5;
/// Products shown in the low-stock table.
const LOW_STOCK_ROWS: i64 = 10;

/// Dashboard metrics.
#[derive(Debug, Clone)]
pub struct DashboardMetrics {
    pub orders_today: i64,
    pub revenue_today: String,
    pub awaiting_fulfilment: i64,
    pub active_members: i64,
}

/// Recent order view for dashboard.
#[derive(Debug, Clone)]
pub struct RecentOrderView {
    pub id: i32,
    pub number: String,
    pub customer_name: String,
    pub total: String,
    pub status: String,
    pub status_class: &'static str,
    pub placed: String,
}

impl From<&OrderListItem> for RecentOrderView {
    fn from(order: &OrderListItem) -> Self {
        Self {
            id: order.id.as_i32(),
            number: order.order_number.clone(),
            customer_name: order.contact_name.clone(),
            total: order.total_money().display(),
            status: order.status.label().to_owned(),
            status_class: order.status.as_str(),
            placed: order.created_at.format("%b %-d, %H:%M").to_string(),
        }
    }
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub page: AdminPage,
    pub metrics: DashboardMetrics,
    pub recent_orders: Vec<RecentOrderView>,
    pub low_stock: Vec<LowStockProduct>,
    pub low_stock_threshold: i32,
}

/// Dashboard page handler.
#[instrument(skip(page, state))]
pub async fn dashboard(page: AdminPage, State(state): State<AppState>) -> Result<DashboardTemplate> {
    let pool = state.pool();
    let settings = SettingsRepository::new(pool).store().await?;
    let analytics = AnalyticsRepository::new(pool);
    let today = DateRange::today(Utc::now());

    let totals = analytics.totals(&today).await?;
    let metrics = DashboardMetrics {
        orders_today: analytics.orders_placed(&today).await?,
        revenue_today: revenue_label(totals.revenue, &settings),
        awaiting_fulfilment: analytics.awaiting_fulfilment().await?,
        active_members: CustomerRepository::new(pool).active_member_count().await?,
    };

    let recent_orders = OrderRepository::new(pool)
        .recent(RECENT_ORDERS)
        .await?
        .iter()
        .map(RecentOrderView::from)
        .collect();

    let low_stock = CatalogRepository::new(pool)
        .low_stock(settings.low_stock_threshold, LOW_STOCK_ROWS)
        .await?;

    Ok(DashboardTemplate {
        page,
        metrics,
        recent_orders,
        low_stock,
        low_stock_threshold: settings.low_stock_threshold,
    })
}

fn revenue_label(amount: Decimal, settings: &solenne_core::settings::StoreSettings) -> String {
    Money::new(amount, settings.currency).display()
}
