//! Side effects of moving an order between statuses.
//!
//! The payment webhook and the back-office both move orders, and both must
//! write the same history row, commit or return the same stock and grant the
//! same membership. Every function here runs on the caller's connection and
//! expects to be inside the transaction that holds the order row lock.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use thiserror::Error;

use crate::membership::extend_period;
use crate::{CustomerId, OrderId, OrderStatus, ProductId, SubscriptionStatus};

/// Subscription source recorded when an order grants membership.
pub const ORDER_GRANT_SOURCE: &str = "order";

/// Errors raised while applying order side effects.
#[derive(Debug, Error)]
pub enum FulfilmentError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Run the stock and membership effects of moving an order from `from` to
/// `to`.
///
/// Becoming paid commits stock and grants the membership days the order
/// bought. Leaving a paid state for cancelled or refunded returns the stock.
/// Returns the new membership end when access was granted; `None` inside
/// means lifetime access.
///
/// # Errors
///
/// Returns `FulfilmentError::Database` if a statement fails and
/// `FulfilmentError::DataCorruption` if the order's membership days do not
/// fit a `u32`.
pub async fn apply_transition(
    conn: &mut PgConnection,
    order_id: OrderId,
    customer_id: CustomerId,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<Option<Option<DateTime<Utc>>>, FulfilmentError> {
    if to == OrderStatus::Paid {
        commit_stock(conn, order_id).await?;
        let days = membership_days(conn, order_id).await?;
        if days > 0 {
            let until = grant_days(conn, customer_id, days, ORDER_GRANT_SOURCE).await?;
            return Ok(Some(until));
        }
    } else if from.restocks_on(to) {
        restock(conn, order_id).await?;
    }
    Ok(None)
}

/// Append a row to the order status history.
///
/// # Errors
///
/// Returns `FulfilmentError::Database` if the insert fails.
pub async fn record_history(
    conn: &mut PgConnection,
    order_id: OrderId,
    from: Option<OrderStatus>,
    to: OrderStatus,
    actor: &str,
    note: Option<&str>,
) -> Result<(), FulfilmentError> {
    sqlx::query(
        r"
        INSERT INTO shop.order_status_history (order_id, from_status, to_status, actor, note)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(order_id)
    .bind(from)
    .bind(to)
    .bind(actor)
    .bind(note)
    .execute(conn)
    .await?;
    Ok(())
}

/// Decrement stock for every item, never below zero.
///
/// # Errors
///
/// Returns `FulfilmentError::Database` if a statement fails.
pub async fn commit_stock(conn: &mut PgConnection, order_id: OrderId) -> Result<(), FulfilmentError> {
    let short: Vec<(ProductId, i32, i32)> = sqlx::query_as(
        r"
        SELECT p.id, p.stock, i.quantity
        FROM shop.order_items i
        JOIN shop.products p ON p.id = i.product_id
        WHERE i.order_id = $1 AND p.stock < i.quantity
        FOR UPDATE OF p
        ",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    for (product_id, stock, quantity) in short {
        tracing::warn!(
            order_id = %order_id,
            product_id = %product_id,
            stock,
            quantity,
            "Paid order oversells product; stock floored at zero"
        );
    }

    sqlx::query(
        r"
        UPDATE shop.products p
        SET stock = GREATEST(p.stock - i.quantity, 0), updated_at = now()
        FROM shop.order_items i
        WHERE i.order_id = $1 AND p.id = i.product_id
        ",
    )
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Return the quantities of every item to stock.
///
/// # Errors
///
/// Returns `FulfilmentError::Database` if the update fails.
pub async fn restock(conn: &mut PgConnection, order_id: OrderId) -> Result<(), FulfilmentError> {
    sqlx::query(
        r"
        UPDATE shop.products p
        SET stock = p.stock + i.quantity, updated_at = now()
        FROM shop.order_items i
        WHERE i.order_id = $1 AND p.id = i.product_id
        ",
    )
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Total membership days bought by an order.
///
/// # Errors
///
/// Returns `FulfilmentError::Database` if the query fails and
/// `FulfilmentError::DataCorruption` if the total does not fit a `u32`.
pub async fn membership_days(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<u32, FulfilmentError> {
    let days: i64 = sqlx::query_scalar(
        r"
        SELECT COALESCE(SUM(p.membership_days::bigint * i.quantity), 0)::bigint
        FROM shop.order_items i
        JOIN shop.products p ON p.id = i.product_id
        WHERE i.order_id = $1 AND p.membership_days IS NOT NULL
        ",
    )
    .bind(order_id)
    .fetch_one(conn)
    .await?;

    u32::try_from(days)
        .map_err(|_| FulfilmentError::DataCorruption(format!("membership days out of range: {days}")))
}

/// Grant or extend a customer's membership by `days`.
///
/// Lifetime access is left as is. An active period is extended from its
/// end, anything else starts from now. Returns the resulting period end.
///
/// # Errors
///
/// Returns `FulfilmentError::Database` if a statement fails.
pub async fn grant_days(
    conn: &mut PgConnection,
    customer_id: CustomerId,
    days: u32,
    source: &str,
) -> Result<Option<DateTime<Utc>>, FulfilmentError> {
    let existing: Option<(SubscriptionStatus, Option<DateTime<Utc>>)> = sqlx::query_as(
        "SELECT status, current_period_end FROM shop.subscriptions WHERE customer_id = $1 FOR UPDATE",
    )
    .bind(customer_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some((SubscriptionStatus::Active, None)) = existing {
        tracing::info!(customer_id = %customer_id, "Customer already has lifetime membership");
        return Ok(None);
    }

    let current_end = existing
        .filter(|(status, _)| *status == SubscriptionStatus::Active)
        .and_then(|(_, end)| end);
    let new_end = extend_period(current_end, Utc::now(), days);

    sqlx::query(
        r"
        INSERT INTO shop.subscriptions (customer_id, status, current_period_end, source)
        VALUES ($1, 'active', $2, $3)
        ON CONFLICT (customer_id) DO UPDATE SET
            status = 'active',
            current_period_end = EXCLUDED.current_period_end,
            source = EXCLUDED.source,
            updated_at = now()
        ",
    )
    .bind(customer_id)
    .bind(new_end)
    .bind(source)
    .execute(conn)
    .await?;

    tracing::info!(customer_id = %customer_id, days, source, until = %new_end, "Membership granted");
    Ok(Some(new_end))
}
