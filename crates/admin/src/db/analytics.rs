//! Aggregate queries behind the dashboard and analytics pages.
//!
//! Revenue counts orders in a paid state (paid, processing, shipped,
//! delivered) by creation date.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::RepositoryError;
use crate::analytics::{DailyPoint, DateRange, PeriodTotals, StatusCount, TopProduct};

const PAID_STATES: &str = "('paid', 'processing', 'shipped', 'delivered')";

/// Repository for reporting queries.
pub struct AnalyticsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Revenue, paid orders and new customers in a range.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn totals(&self, range: &DateRange) -> Result<PeriodTotals, RepositoryError> {
        let sql = format!(
            r"
            SELECT COALESCE(SUM(total), 0), COUNT(*)
            FROM shop.orders
            WHERE status IN {PAID_STATES} AND created_at >= $1 AND created_at < $2
            "
        );
        let (revenue, paid_orders): (Decimal, i64) = sqlx::query_as(&sql)
            .bind(range.start)
            .bind(range.end)
            .fetch_one(self.pool)
            .await?;

        let new_customers: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shop.customers WHERE created_at >= $1 AND created_at < $2",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(self.pool)
        .await?;

        Ok(PeriodTotals {
            revenue,
            paid_orders,
            new_customers,
        })
    }

    /// Paid revenue per UTC day; days without sales are absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn daily_revenue(&self, range: &DateRange) -> Result<Vec<DailyPoint>, RepositoryError> {
        let sql = format!(
            r"
            SELECT (created_at AT TIME ZONE 'UTC')::date AS day,
                   SUM(total) AS revenue,
                   COUNT(*) AS orders
            FROM shop.orders
            WHERE status IN {PAID_STATES} AND created_at >= $1 AND created_at < $2
            GROUP BY day
            ORDER BY day
            "
        );
        let rows: Vec<(NaiveDate, Decimal, i64)> = sqlx::query_as(&sql)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(date, revenue, orders)| DailyPoint {
                date,
                revenue,
                orders,
            })
            .collect())
    }

    /// Orders created in a range, counted by current status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn orders_by_status(
        &self,
        range: &DateRange,
    ) -> Result<Vec<StatusCount>, RepositoryError> {
        Ok(sqlx::query_as::<_, StatusCount>(
            r"
            SELECT status, COUNT(*) AS count
            FROM shop.orders
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY status
            ORDER BY status
            ",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(self.pool)
        .await?)
    }

    /// Best sellers by units, then revenue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(
        &self,
        range: &DateRange,
        limit: i64,
    ) -> Result<Vec<TopProduct>, RepositoryError> {
        let sql = format!(
            r"
            SELECT i.product_id, MAX(i.product_name) AS name,
                   SUM(i.quantity)::bigint AS units,
                   SUM(i.line_total) AS revenue
            FROM shop.order_items i
            JOIN shop.orders o ON o.id = i.order_id
            WHERE o.status IN {PAID_STATES} AND o.created_at >= $1 AND o.created_at < $2
            GROUP BY i.product_id
            ORDER BY units DESC, revenue DESC
            LIMIT $3
            "
        );
        Ok(sqlx::query_as::<_, TopProduct>(&sql)
            .bind(range.start)
            .bind(range.end)
            .bind(limit)
            .fetch_all(self.pool)
            .await?)
    }

    /// Orders paid but not shipped yet.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn awaiting_fulfilment(&self) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM shop.orders WHERE status IN ('paid', 'processing')",
        )
        .fetch_one(self.pool)
        .await?)
    }

    /// Orders placed in a range regardless of status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn orders_placed(&self, range: &DateRange) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM shop.orders WHERE created_at >= $1 AND created_at < $2",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(self.pool)
        .await?)
    }
}
