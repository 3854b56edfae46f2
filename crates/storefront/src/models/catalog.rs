//! Catalog types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use solenne_core::{CategoryId, CurrencyCode, Money, ProductId};

/// A product as sold on the storefront.
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
    pub image_url: Option<String>,
    pub featured: bool,
    pub active: bool,
    /// Days of membership access granted when this product is paid for.
    pub membership_days: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub const fn unit_price(&self) -> Money {
        Money::new(self.price, self.currency)
    }

    /// Compare-at price, only when it is actually higher than the price.
    #[must_use]
    pub fn compare_at(&self) -> Option<Money> {
        self.compare_at_price
            .filter(|c| *c > self.price)
            .map(|c| Money::new(c, self.currency))
    }

    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.active && self.stock > 0
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: String,
}
