//! Customer types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use solenne_core::membership::SubscriptionWindow;
use solenne_core::{CustomerId, Email, SubscriptionId, SubscriptionStatus};

/// Row of the customers list.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerListItem {
    pub id: CustomerId,
    pub email: Email,
    pub name: String,
    /// Registered customers have a password; guests only checked out.
    pub registered: bool,
    pub order_count: i64,
    /// Sum of orders in a paid state, across currencies.
    pub lifetime_value: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Customer {
    pub id: CustomerId,
    pub email: Email,
    pub name: String,
    pub phone: Option<String>,
    pub registered: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub customer_id: CustomerId,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub source: String,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    #[must_use]
    pub const fn window(&self) -> SubscriptionWindow {
        SubscriptionWindow {
            status: self.status,
            current_period_end: self.current_period_end,
        }
    }
}
