//! Order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;

use solenne_core::order::ShippingAddress;
use solenne_core::{CurrencyCode, CustomerId, Money, OrderId, OrderItemId, OrderStatus, ProductId};

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

/// A line of an order with the name and price captured at checkout.
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

/// Order row for history lists.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderSummary {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub currency: CurrencyCode,
    pub total: Decimal,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}
