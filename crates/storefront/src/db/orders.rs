//! Order repository: checkout writes and payment notifications.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use solenne_core::cart::CartTotals;
use solenne_core::fulfilment::{apply_transition, record_history};
use solenne_core::order::{CheckoutContact, OrderNumber};
use solenne_core::{CurrencyCode, CustomerId, OrderId, OrderStatus, PaymentStatus, ProductId};

use super::RepositoryError;
use super::customers::upsert_for_checkout;
use crate::models::{Order, OrderItem, OrderSummary};

const ORDER_COLUMNS: &str = "id, order_number, customer_id, status, currency, subtotal, shipping, \
     total, contact_name, contact_email, contact_phone, shipping_address, notes, \
     payment_preference_id, tracking_code, paid_at, created_at";

/// Actor recorded in the status history for checkout.
pub const CHECKOUT_ACTOR: &str = "checkout";
/// Actor recorded in the status history for gateway notifications.
pub const WEBHOOK_ACTOR: &str = "payment-webhook";

/// A priced line ready to be written as an order item.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl NewOrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Everything needed to create a pending order.
#[derive(Debug)]
pub struct NewOrder<'a> {
    pub number: &'a OrderNumber,
    pub contact: &'a CheckoutContact,
    pub totals: &'a CartTotals,
    pub items: &'a [NewOrderItem],
}

/// Payment details as reported by the gateway.
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub gateway_payment_id: String,
    pub order_number: String,
    pub status: PaymentStatus,
    pub status_detail: Option<String>,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub approved_at: Option<DateTime<Utc>>,
}

impl PaymentUpdate {
    /// A charge whose amount or currency is not the order's total.
    #[must_use]
    pub fn charge_differs(&self, total: Decimal, currency: CurrencyCode) -> bool {
        matches!(self.status, PaymentStatus::Approved | PaymentStatus::Authorized)
            && (self.amount != total || self.currency != currency)
    }
}

/// What applying a payment notification did.
#[derive(Debug)]
pub enum PaymentOutcome {
    /// No order carries the reference.
    UnknownOrder,
    /// The payment was recorded but the order status stayed as it was.
    Recorded { order: Order },
    /// The order moved to a new status.
    Transitioned {
        order: Order,
        from: OrderStatus,
        /// New membership end when the order granted access; `None` inside
        /// means lifetime access.
        membership: Option<Option<DateTime<Utc>>>,
    },
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a pending order with its items in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order number is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, order), fields(order_number = %order.number))]
    pub async fn create(&self, order: &NewOrder<'_>) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let contact = order.contact;
        let customer_id =
            upsert_for_checkout(&mut tx, &contact.email, &contact.name, &contact.phone).await?;

        let sql = format!(
            r"
            INSERT INTO shop.orders (
                order_number, customer_id, status, currency, subtotal, shipping, total,
                contact_name, contact_email, contact_phone, shipping_address, notes
            )
            VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {ORDER_COLUMNS}
            "
        );
        let created = sqlx::query_as::<_, Order>(&sql)
            .bind(order.number.as_str())
            .bind(customer_id)
            .bind(order.totals.total.currency)
            .bind(order.totals.subtotal.amount)
            .bind(order.totals.shipping.amount)
            .bind(order.totals.total.amount)
            .bind(&contact.name)
            .bind(&contact.email)
            .bind(&contact.phone)
            .bind(Json(&contact.address))
            .bind(contact.notes.as_deref())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_insert(e, "order"))?;

        for item in order.items {
            sqlx::query(
                r"
                INSERT INTO shop.order_items
                    (order_id, product_id, product_name, product_slug, unit_price, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(created.id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(&item.product_slug)
            .bind(item.unit_price)
            .bind(item.quantity)
            .bind(item.line_total())
            .execute(&mut *tx)
            .await?;
        }

        record_history(
            &mut tx,
            created.id,
            None,
            OrderStatus::Pending,
            CHECKOUT_ACTOR,
            None,
        )
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    /// Store the gateway preference id on an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn set_preference_id(
        &self,
        id: OrderId,
        preference_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.orders SET payment_preference_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(preference_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// An order by its human order number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(&self, number: &str) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM shop.orders WHERE order_number = $1");
        Ok(sqlx::query_as::<_, Order>(&sql)
            .bind(number)
            .fetch_optional(self.pool)
            .await?)
    }

    /// Items of an order in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        Ok(sqlx::query_as::<_, OrderItem>(
            r"
            SELECT id, product_id, product_name, product_slug, unit_price, quantity, line_total
            FROM shop.order_items
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?)
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        Ok(sqlx::query_as::<_, OrderSummary>(
            r"
            SELECT o.id, o.order_number, o.status, o.currency, o.total, o.created_at,
                   COALESCE(SUM(i.quantity), 0)::bigint AS item_count
            FROM shop.orders o
            LEFT JOIN shop.order_items i ON i.order_id = o.id
            WHERE o.customer_id = $1
            GROUP BY o.id
            ORDER BY o.created_at DESC, o.id DESC
            ",
        )
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?)
    }

    /// Record a gateway payment and move the order accordingly.
    ///
    /// The order row is locked for the duration so concurrent notifications
    /// for the same order serialize. Repeated notifications update the
    /// payment row and leave the order untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing
    /// is committed in that case.
    #[instrument(
        skip(self, update),
        fields(order_number = %update.order_number, payment_id = %update.gateway_payment_id)
    )]
    pub async fn apply_payment(
        &self,
        update: &PaymentUpdate,
    ) -> Result<PaymentOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE order_number = $1 FOR UPDATE"
        );
        let Some(order) = sqlx::query_as::<_, Order>(&sql)
            .bind(&update.order_number)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(PaymentOutcome::UnknownOrder);
        };

        upsert_payment(&mut tx, order.id, update).await?;

        if update.charge_differs(order.total, order.currency) {
            tracing::warn!(
                amount = %update.amount,
                currency = %update.currency,
                order_total = %order.total,
                order_currency = %order.currency,
                "Payment amount does not match order total"
            );
        }

        let Some(target) = update.status.order_transition(order.status) else {
            tx.commit().await?;
            if update.status.charges_cancelled_order(order.status) {
                tracing::error!(
                    payment_status = %update.status,
                    amount = %update.amount,
                    "Payment captured for a cancelled order; refund it manually"
                );
            } else {
                tracing::debug!(status = %order.status, payment_status = %update.status, "Payment recorded without status change");
            }
            return Ok(PaymentOutcome::Recorded { order });
        };

        let from = order.status;
        let sql = format!(
            r"
            UPDATE shop.orders
            SET status = $2,
                paid_at = CASE WHEN $2 = 'paid'::shop.order_status THEN now() ELSE paid_at END,
                updated_at = now()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order.id)
            .bind(target)
            .fetch_one(&mut *tx)
            .await?;

        let note = format!("payment {} {}", update.gateway_payment_id, update.status);
        record_history(&mut tx, order.id, Some(from), target, WEBHOOK_ACTOR, Some(&note)).await?;
        let membership = apply_transition(&mut tx, order.id, order.customer_id, from, target).await?;

        tx.commit().await?;
        tracing::info!(from = %from, to = %target, "Order status changed by payment");

        Ok(PaymentOutcome::Transitioned {
            order,
            from,
            membership,
        })
    }
}

async fn upsert_payment(
    conn: &mut PgConnection,
    order_id: OrderId,
    update: &PaymentUpdate,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO shop.payments
            (order_id, gateway_payment_id, status, status_detail, amount, currency, approved_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (gateway_payment_id) DO UPDATE SET
            status = EXCLUDED.status,
            status_detail = EXCLUDED.status_detail,
            approved_at = COALESCE(EXCLUDED.approved_at, shop.payments.approved_at),
            updated_at = now()
        ",
    )
    .bind(order_id)
    .bind(&update.gateway_payment_id)
    .bind(update.status)
    .bind(update.status_detail.as_deref())
    .bind(update.amount)
    .bind(update.currency)
    .bind(update.approved_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total() {
        let item = NewOrderItem {
            product_id: ProductId::new(1),
            product_name: "Serum".into(),
            product_slug: "serum".into(),
            unit_price: Decimal::new(4990, 2),
            quantity: 3,
        };
        assert_eq!(item.line_total(), Decimal::new(14970, 2));
    }

    fn payment(status: PaymentStatus, amount: Decimal, currency: CurrencyCode) -> PaymentUpdate {
        PaymentUpdate {
            gateway_payment_id: "1234567890".into(),
            order_number: "SOL-20261018-7KQ2XM".into(),
            status,
            status_detail: None,
            amount,
            currency,
            approved_at: None,
        }
    }

    #[test]
    fn test_charge_differs_from_order_total() {
        let total = Decimal::new(13980, 2);

        let exact = payment(PaymentStatus::Approved, Decimal::new(139_800, 3), CurrencyCode::BRL);
        assert!(!exact.charge_differs(total, CurrencyCode::BRL));

        let short = payment(PaymentStatus::Approved, Decimal::new(100, 2), CurrencyCode::BRL);
        assert!(short.charge_differs(total, CurrencyCode::BRL));

        let authorized = payment(PaymentStatus::Authorized, Decimal::new(100, 2), CurrencyCode::BRL);
        assert!(authorized.charge_differs(total, CurrencyCode::BRL));

        let other_currency = payment(PaymentStatus::Approved, total, CurrencyCode::USD);
        assert!(other_currency.charge_differs(total, CurrencyCode::BRL));

        let rejected = payment(PaymentStatus::Rejected, Decimal::ZERO, CurrencyCode::BRL);
        assert!(!rejected.charge_differs(total, CurrencyCode::BRL));
    }
}
