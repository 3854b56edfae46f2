//! Customer route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::Redirect,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use solenne_core::membership::{MAX_GRANT_DAYS, days_remaining};
use solenne_core::{CurrencyCode, CustomerId, Money, SubscriptionStatus};

use super::{AdminPage, Pagination, page_number, set_flash};
use crate::db::{CustomerRepository, OrderRepository, Page, SettingsRepository};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireWriter;
use crate::models::{Customer, CustomerListItem, OrderListItem, Subscription};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CustomersQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct GrantForm {
    pub days: String,
}

/// Parse the number of days to grant.
///
/// # Errors
///
/// Returns a message unless the value is a whole number in `1..=3650`.
pub fn parse_grant_days(value: &str) -> std::result::Result<u32, String> {
    match value.trim().parse::<u32>() {
        Ok(days) if (1..=MAX_GRANT_DAYS).contains(&days) => Ok(days),
        _ => Err(format!("Days must be between 1 and {MAX_GRANT_DAYS}")),
    }
}

/// Membership state as shown on the customer page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipView {
    pub status: &'static str,
    pub active: bool,
    /// "Lifetime" or the end date.
    pub ends: String,
    pub days_remaining: Option<i64>,
    pub source: String,
}

impl MembershipView {
    #[must_use]
    pub fn new(subscription: &Subscription, now: DateTime<Utc>) -> Self {
        let window = subscription.window();
        let active = window.is_active_at(now);
        Self {
            status: if !active && subscription.status == SubscriptionStatus::Active {
                "Expired"
            } else {
                subscription.status.label()
            },
            active,
            ends: subscription.current_period_end.map_or_else(
                || "Lifetime".to_owned(),
                |end| end.format("%Y-%m-%d").to_string(),
            ),
            days_remaining: subscription
                .current_period_end
                .filter(|_| active)
                .map(|end| days_remaining(end, now)),
            source: subscription.source.clone(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "customers/index.html")]
pub struct CustomersIndexTemplate {
    pub page: AdminPage,
    pub customers: Page<CustomerListItem>,
    pub pagination: Pagination,
    pub query: String,
    pub currency: CurrencyCode,
}

impl CustomersIndexTemplate {
    fn money(&self, amount: Decimal) -> Money {
        Money::new(amount, self.currency)
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "customers/show.html")]
pub struct CustomerShowTemplate {
    pub page: AdminPage,
    pub customer: Customer,
    pub orders: Vec<OrderListItem>,
    pub membership: Option<MembershipView>,
}

/// Paginated customer list.
#[instrument(skip(page, state))]
pub async fn index(
    page: AdminPage,
    State(state): State<AppState>,
    Query(query): Query<CustomersQuery>,
) -> Result<CustomersIndexTemplate> {
    let customers = CustomerRepository::new(state.pool())
        .list(query.q.as_deref(), page_number(query.page))
        .await?;
    let search = query.q.unwrap_or_default();
    let pagination = Pagination::new(&customers, "/customers", &[("q", &search)]);

    Ok(CustomersIndexTemplate {
        page,
        customers,
        pagination,
        query: search,
        currency: SettingsRepository::new(state.pool()).store().await?.currency,
    })
}

/// Customer profile with orders and membership.
#[instrument(skip(page, state))]
pub async fn show(
    page: AdminPage,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<CustomerShowTemplate> {
    let repo = CustomerRepository::new(state.pool());
    let customer = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("customer {id}")))?;
    let orders = OrderRepository::new(state.pool())
        .list_for_customer(id)
        .await?;
    let now = Utc::now();
    let membership = repo
        .subscription(id)
        .await?
        .map(|s| MembershipView::new(&s, now));

    Ok(CustomerShowTemplate {
        page,
        customer,
        orders,
        membership,
    })
}

/// Grant or extend membership by a number of days.
#[instrument(skip(admin, state, session, form), fields(admin_id = %admin.id))]
pub async fn grant_membership(
    RequireWriter(admin): RequireWriter,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<CustomerId>,
    Form(form): Form<GrantForm>,
) -> Result<Redirect> {
    let days = parse_grant_days(&form.days).map_err(AppError::BadRequest)?;
    let until = CustomerRepository::new(state.pool())
        .grant_membership(id, days)
        .await?;

    tracing::info!(customer_id = %id, days, "Membership granted");
    let message = until.map_or_else(
        || "Customer already has lifetime access.".to_owned(),
        |end| format!("Membership extended until {}.", end.format("%Y-%m-%d")),
    );
    set_flash(&session, message).await;
    Ok(Redirect::to(&format!("/customers/{id}")))
}

/// Cancel the customer's membership.
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn revoke_membership(
    RequireWriter(admin): RequireWriter,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<CustomerId>,
) -> Result<Redirect> {
    CustomerRepository::new(state.pool())
        .revoke_membership(id)
        .await?;
    set_flash(&session, "Membership cancelled.").await;
    Ok(Redirect::to(&format!("/customers/{id}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use solenne_core::SubscriptionId;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 10, 9, 0, 0).unwrap()
    }

    fn subscription(status: SubscriptionStatus, end: Option<DateTime<Utc>>) -> Subscription {
        Subscription {
            id: SubscriptionId::new(1),
            customer_id: CustomerId::new(2),
            status,
            current_period_end: end,
            source: "order".into(),
            updated_at: now(),
        }
    }

    #[test]
    fn test_parse_grant_days() {
        assert_eq!(parse_grant_days("30"), Ok(30));
        assert_eq!(parse_grant_days(" 365 "), Ok(365));
        assert!(parse_grant_days("0").is_err());
        assert!(parse_grant_days("-5").is_err());
        assert!(parse_grant_days("forever").is_err());
        assert!(parse_grant_days("9999").is_err());
    }

    #[test]
    fn test_active_membership_view() {
        let view = MembershipView::new(
            &subscription(SubscriptionStatus::Active, Some(now() + Duration::days(12))),
            now(),
        );
        assert!(view.active);
        assert_eq!(view.status, "Active");
        assert_eq!(view.days_remaining, Some(12));
        assert_eq!(view.ends, "2026-05-22");
    }

    #[test]
    fn test_lapsed_and_lifetime_membership_views() {
        let lapsed = MembershipView::new(
            &subscription(SubscriptionStatus::Active, Some(now() - Duration::days(1))),
            now(),
        );
        assert!(!lapsed.active);
        assert_eq!(lapsed.status, "Expired");
        assert_eq!(lapsed.days_remaining, None);

        let lifetime = MembershipView::new(&subscription(SubscriptionStatus::Active, None), now());
        assert!(lifetime.active);
        assert_eq!(lifetime.ends, "Lifetime");
        assert_eq!(lifetime.days_remaining, None);

        let cancelled = MembershipView::new(
            &subscription(SubscriptionStatus::Cancelled, Some(now() + Duration::days(3))),
            now(),
        );
        assert!(!cancelled.active);
        assert_eq!(cancelled.status, "Cancelled");
    }
}
