//! Order types as seen from the back-office.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;

use solenne_core::order::ShippingAddress;
use solenne_core::{CurrencyCode, CustomerId, Money, OrderId, OrderItemId, OrderStatus, PaymentId, ProductId};

/// Row of the orders list.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderListItem {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub currency: CurrencyCode,
    pub total: Decimal,
    pub contact_name: String,
    pub contact_email: String,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderListItem {
    #[must_use]
    pub const fn total_money(&self) -> Money {
        Money::new(self.total, self.currency)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub currency: CurrencyCode,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub shipping_address: Json<ShippingAddress>,
    pub notes: Option<String>,
    pub payment_preference_id: Option<String>,
    pub tracking_code: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub const fn money(&self, amount: Decimal) -> Money {
        Money::new(amount, self.currency)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// A gateway payment recorded against an order.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Payment {
    pub id: PaymentId,
    pub gateway_payment_id: String,
    /// Raw gateway status; unknown values are shown as received.
    pub status: String,
    pub status_detail: Option<String>,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusHistoryEntry {
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub actor: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
