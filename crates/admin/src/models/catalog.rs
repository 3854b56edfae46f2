//! Catalog types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use solenne_core::{CategoryId, CurrencyCode, Money, ProductId};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub currency: CurrencyCode,
    pub sku: Option<String>,
    pub stock: i32,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub image_url: Option<String>,
    pub featured: bool,
    pub active: bool,
    pub membership_days: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub const fn price_money(&self) -> Money {
        Money::new(self.price, self.currency)
    }
}

/// A category with the number of products filed under it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub position: i32,
    pub product_count: i64,
}

/// Active product at or below the low-stock threshold.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LowStockProduct {
    pub id: ProductId,
    pub name: String,
    pub sku: Option<String>,
    pub stock: i32,
}
