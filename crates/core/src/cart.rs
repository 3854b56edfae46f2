//! Shopping cart held in the visitor's session.
//!
//! The cart stores a snapshot of each product's name and price so the cart
//! page renders without a database round-trip per line. Checkout always
//! re-prices lines from the database before creating an order.

use serde::{Deserialize, Serialize};

use crate::types::{CurrencyCode, Money, MoneyError, ProductId};

/// Maximum quantity of a single product per order.
pub const MAX_LINE_QUANTITY: u32 = 10;

/// Errors from cart operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// One product in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub slug: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub image_url: Option<String>,
}

impl CartLine {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// The session cart.
///
/// Invariants: at most one line per product, no line has quantity 0, every
/// line is priced in the same currency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Add a line, merging with an existing line for the same product.
    ///
    /// The merged quantity is capped at [`MAX_LINE_QUANTITY`]. The merged
    /// line takes the newer price snapshot.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ZeroQuantity` for a zero quantity and a currency
    /// mismatch error when the cart already holds lines in another currency.
    pub fn add(&mut self, line: CartLine) -> Result<(), CartError> {
        if line.quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }
        if let Some(first) = self.lines.first()
            && first.unit_price.currency != line.unit_price.currency
        {
            return Err(MoneyError::CurrencyMismatch {
                left: first.unit_price.currency,
                right: line.unit_price.currency,
            }
            .into());
        }

        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id)
        {
            existing.quantity = (existing.quantity + line.quantity).min(MAX_LINE_QUANTITY);
            existing.unit_price = line.unit_price;
            existing.name = line.name;
            existing.slug = line.slug;
            existing.image_url = line.image_url;
        } else {
            let quantity = line.quantity.min(MAX_LINE_QUANTITY);
            self.lines.push(CartLine { quantity, ..line });
        }
        Ok(())
    }

    /// Set the quantity of a line; zero removes it.
    ///
    /// Returns `false` when the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product_id);
        }
        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => {
                line.quantity = quantity.min(MAX_LINE_QUANTITY);
                true
            }
            None => false,
        }
    }

    /// Remove a product. Returns `false` when it was not in the cart.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of line totals, zero in `currency` when empty.
    ///
    /// # Errors
    ///
    /// Returns a currency mismatch when lines are not in `currency`.
    pub fn subtotal(&self, currency: CurrencyCode) -> Result<Money, CartError> {
        self.lines
            .iter()
            .try_fold(Money::zero(currency), |acc, line| {
                acc.checked_add(line.line_total())
            })
            .map_err(CartError::from)
    }

    /// Subtotal, shipping and total under a shipping policy.
    ///
    /// # Errors
    ///
    /// Returns a currency mismatch when lines are not in the policy currency.
    pub fn totals(&self, policy: &ShippingPolicy) -> Result<CartTotals, CartError> {
        let subtotal = self.subtotal(policy.flat_fee.currency)?;
        let shipping = if self.is_empty() {
            Money::zero(subtotal.currency)
        } else {
            policy.shipping_for(subtotal)
        };
        let total = subtotal.checked_add(shipping)?;
        Ok(CartTotals {
            subtotal,
            shipping,
            total,
        })
    }
}

/// Flat-rate shipping with an optional free-shipping threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingPolicy {
    pub flat_fee: Money,
    pub free_over: Option<Money>,
}

impl ShippingPolicy {
    /// Shipping charged for an order with this subtotal.
    #[must_use]
    pub fn shipping_for(&self, subtotal: Money) -> Money {
        match self.free_over {
            Some(threshold) if subtotal.amount >= threshold.amount => {
                Money::zero(subtotal.currency)
            }
            _ => self.flat_fee,
        }
    }

    /// How much more the customer needs to spend for free shipping.
    #[must_use]
    pub fn remaining_for_free_shipping(&self, subtotal: Money) -> Option<Money> {
        let threshold = self.free_over?;
        (subtotal.amount < threshold.amount)
            .then(|| Money::new(threshold.amount - subtotal.amount, subtotal.currency))
    }
}

/// Computed cart totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTotals {
    pub subtotal: Money,
    pub shipping: Money,
    pub total: Money,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn brl(minor: i64) -> Money {
        Money::from_minor(minor, CurrencyCode::BRL)
    }

    fn line(id: i32, price: i64, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            slug: format!("product-{id}"),
            name: format!("Product {id}"),
            unit_price: brl(price),
            quantity,
            image_url: None,
        }
    }

    fn policy() -> ShippingPolicy {
        ShippingPolicy {
            flat_fee: brl(1990),
            free_over: Some(brl(20000)),
        }
    }

    #[test]
    fn test_add_merges_same_product() {
        let mut cart = Cart::new();
        cart.add(line(1, 4990, 1)).unwrap();
        cart.add(line(1, 4990, 2)).unwrap();
        cart.add(line(2, 2500, 1)).unwrap();
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn test_add_caps_quantity() {
        let mut cart = Cart::new();
        cart.add(line(1, 100, 8)).unwrap();
        cart.add(line(1, 100, 8)).unwrap();
        assert_eq!(cart.item_count(), MAX_LINE_QUANTITY);

        let mut cart = Cart::new();
        cart.add(line(3, 100, 50)).unwrap();
        assert_eq!(cart.item_count(), MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_add_rejects_zero_and_mixed_currency() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(line(1, 100, 0)), Err(CartError::ZeroQuantity));

        cart.add(line(1, 100, 1)).unwrap();
        let mut usd = line(2, 100, 1);
        usd.unit_price = Money::from_minor(100, CurrencyCode::USD);
        assert!(matches!(cart.add(usd), Err(CartError::Money(_))));
    }

    #[test]
    fn test_set_quantity_and_remove() {
        let mut cart = Cart::new();
        cart.add(line(1, 100, 1)).unwrap();
        assert!(cart.set_quantity(ProductId::new(1), 3));
        assert_eq!(cart.item_count(), 3);
        assert!(!cart.set_quantity(ProductId::new(9), 3));
        assert!(cart.set_quantity(ProductId::new(1), 0));
        assert!(cart.is_empty());
        assert!(!cart.remove(ProductId::new(1)));
    }

    #[test]
    fn test_totals_flat_shipping() {
        let mut cart = Cart::new();
        cart.add(line(1, 4990, 2)).unwrap();
        let totals = cart.totals(&policy()).unwrap();
        assert_eq!(totals.subtotal, brl(9980));
        assert_eq!(totals.shipping, brl(1990));
        assert_eq!(totals.total, brl(11970));
    }

    #[test]
    fn test_totals_free_shipping_at_threshold() {
        let mut cart = Cart::new();
        cart.add(line(1, 10000, 2)).unwrap();
        let totals = cart.totals(&policy()).unwrap();
        assert!(totals.shipping.is_zero());
        assert_eq!(totals.total, brl(20000));
    }

    #[test]
    fn test_empty_cart_has_no_shipping() {
        let totals = Cart::new().totals(&policy()).unwrap();
        assert!(totals.total.is_zero());
    }

    #[test]
    fn test_remaining_for_free_shipping() {
        let p = policy();
        assert_eq!(p.remaining_for_free_shipping(brl(15000)), Some(brl(5000)));
        assert_eq!(p.remaining_for_free_shipping(brl(20000)), None);
        let no_threshold = ShippingPolicy {
            free_over: None,
            ..p
        };
        assert_eq!(no_threshold.remaining_for_free_shipping(brl(1)), None);
    }

    #[test]
    fn test_cart_serializes_for_session() {
        let mut cart = Cart::new();
        cart.add(line(1, 4990, 2)).unwrap();
        let json = serde_json::to_string(&cart).unwrap();
        let restored: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cart);
    }
}
