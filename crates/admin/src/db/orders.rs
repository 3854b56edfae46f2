//! Order repository: lists, detail and manual status changes.

use sqlx::PgPool;
use tracing::instrument;

use solenne_core::fulfilment::{apply_transition, record_history};
use solenne_core::{OrderId, OrderStatus};

use super::{PER_PAGE, Page, RepositoryError, like_pattern, page_offset};
use crate::models::{Order, OrderItem, OrderListItem, Payment, StatusHistoryEntry};

const ORDER_COLUMNS: &str = "id, order_number, customer_id, status, currency, subtotal, shipping, \
     total, contact_name, contact_email, contact_phone, shipping_address, notes, \
     payment_preference_id, tracking_code, paid_at, created_at";

const LIST_COLUMNS: &str = "o.id, o.order_number, o.status, o.currency, o.total, o.contact_name, \
     o.contact_email, o.created_at, \
     (SELECT COALESCE(SUM(i.quantity), 0)::bigint FROM shop.order_items i WHERE i.order_id = o.id) AS item_count";

const LIST_FILTER: &str = "($1::shop.order_status IS NULL OR o.status = $1) \
     AND ($2::text IS NULL OR o.order_number ILIKE $2 OR o.contact_email ILIKE $2 OR o.contact_name ILIKE $2)";

/// Filters of the orders list.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub query: Option<String>,
}

/// A status change requested from the back-office.
#[derive(Debug, Clone)]
pub struct StatusChange<'a> {
    pub target: OrderStatus,
    pub tracking_code: Option<&'a str>,
    pub note: Option<&'a str>,
    /// Email of the admin making the change.
    pub actor: &'a str,
}

/// Result of [`OrderRepository::update_status`].
#[derive(Debug)]
pub enum StatusUpdate {
    /// The order moved; `from` is the previous status.
    Applied { order: Order, from: OrderStatus },
    /// The workflow does not allow the move from `current`.
    Rejected { current: OrderStatus },
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

    /// One page of orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &OrderFilter,
        page: u32,
    ) -> Result<Page<OrderListItem>, RepositoryError> {
        let pattern = filter
            .query
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .map(like_pattern);

        let sql = format!(
            "SELECT {LIST_COLUMNS} FROM shop.orders o WHERE {LIST_FILTER} \
             ORDER BY o.created_at DESC, o.id DESC LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, OrderListItem>(&sql)
            .bind(filter.status)
            .bind(pattern.as_deref())
            .bind(i64::from(PER_PAGE))
            .bind(page_offset(page, PER_PAGE))
            .fetch_all(self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM shop.orders o WHERE {LIST_FILTER}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.status)
            .bind(pattern.as_deref())
            .fetch_one(self.pool)
            .await?;

        Ok(Page::new(rows, total, page))
    }

    /// Most recent orders for the dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<OrderListItem>, RepositoryError> {
        let sql = format!(
            "SELECT {LIST_COLUMNS} FROM shop.orders o ORDER BY o.created_at DESC, o.id DESC LIMIT $1"
        );
        Ok(sqlx::query_as::<_, OrderListItem>(&sql)
            .bind(limit)
            .fetch_all(self.pool)
            .await?)
    }

    /// Orders of one customer, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_customer(
        &self,
        customer_id: solenne_core::CustomerId,
    ) -> Result<Vec<OrderListItem>, RepositoryError> {
        let sql = format!(
            "SELECT {LIST_COLUMNS} FROM shop.orders o WHERE o.customer_id = $1 \
             ORDER BY o.created_at DESC, o.id DESC"
        );
        Ok(sqlx::query_as::<_, OrderListItem>(&sql)
            .bind(customer_id)
            .fetch_all(self.pool)
            .await?)
    }

    /// An order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM shop.orders WHERE id = $1");
        Ok(sqlx::query_as::<_, Order>(&sql)
            .bind(id)
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

    /// Gateway payments of an order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn payments(&self, order_id: OrderId) -> Result<Vec<Payment>, RepositoryError> {
        Ok(sqlx::query_as::<_, Payment>(
            r"
            SELECT id, gateway_payment_id, status, status_detail, amount, currency,
                   approved_at, created_at
            FROM shop.payments
            WHERE order_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?)
    }

    /// Status history of an order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        Ok(sqlx::query_as::<_, StatusHistoryEntry>(
            r"
            SELECT from_status, to_status, actor, note, created_at
            FROM shop.order_status_history
            WHERE order_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?)
    }

    /// Move an order to a new status.
    ///
    /// The order row is locked so a concurrent payment notification cannot
    /// interleave. Stock follows the status: committed when an order
    /// becomes paid, returned when a paid order is cancelled or refunded.
    /// Marking an order paid by hand also grants the membership it bought.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Database` if a statement fails; nothing is
    /// committed in that case.
    #[instrument(skip(self, change), fields(target = %change.target, actor = %change.actor))]
    pub async fn update_status(
        &self,
        id: OrderId,
        change: &StatusChange<'_>,
    ) -> Result<StatusUpdate, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: OrderStatus =
            sqlx::query_scalar("SELECT status FROM shop.orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        if !current.can_transition_to(change.target) {
            return Ok(StatusUpdate::Rejected { current });
        }

        let tracking_code = change
            .tracking_code
            .map(str::trim)
            .filter(|c| !c.is_empty() && change.target == OrderStatus::Shipped);

        let sql = format!(
            r"
            UPDATE shop.orders
            SET status = $2,
                tracking_code = COALESCE($3, tracking_code),
                paid_at = CASE WHEN $2 = 'paid'::shop.order_status THEN now() ELSE paid_at END,
                updated_at = now()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(change.target)
            .bind(tracking_code)
            .fetch_one(&mut *tx)
            .await?;

        let note = change.note.map(str::trim).filter(|n| !n.is_empty());
        record_history(&mut tx, id, Some(current), change.target, change.actor, note).await?;
        apply_transition(&mut tx, id, order.customer_id, current, change.target).await?;

        tx.commit().await?;
        tracing::info!(order_id = %id, from = %current, "Order status changed by admin");

        Ok(StatusUpdate::Applied {
            order,
            from: current,
        })
    }
}
