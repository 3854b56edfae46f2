//! Customer repository: lists, profiles and membership administration.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use solenne_core::CustomerId;
use solenne_core::fulfilment::grant_days;

use super::{PER_PAGE, Page, RepositoryError, like_pattern, page_offset};
use crate::models::{Customer, CustomerListItem, Subscription};

/// Subscription source recorded for grants made in the back-office.
pub const ADMIN_GRANT_SOURCE: &str = "admin";

const SUBSCRIPTION_COLUMNS: &str = "id, customer_id, status, current_period_end, source, updated_at";

/// Repository for customer database operations.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of customers with order count and lifetime value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        query: Option<&str>,
        page: u32,
    ) -> Result<Page<CustomerListItem>, RepositoryError> {
        let pattern = query.filter(|q| !q.trim().is_empty()).map(like_pattern);

        let rows = sqlx::query_as::<_, CustomerListItem>(
            r"
            SELECT c.id, c.email, c.name, c.password_hash IS NOT NULL AS registered, c.created_at,
                   COUNT(o.id) AS order_count,
                   COALESCE(SUM(o.total) FILTER (
                       WHERE o.status IN ('paid', 'processing', 'shipped', 'delivered')
                   ), 0) AS lifetime_value
            FROM shop.customers c
            LEFT JOIN shop.orders o ON o.customer_id = c.id
            WHERE $1::text IS NULL OR c.email ILIKE $1 OR c.name ILIKE $1
            GROUP BY c.id
            ORDER BY c.created_at DESC, c.id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(pattern.as_deref())
        .bind(i64::from(PER_PAGE))
        .bind(page_offset(page, PER_PAGE))
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shop.customers c WHERE $1::text IS NULL OR c.email ILIKE $1 OR c.name ILIKE $1",
        )
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(Page::new(rows, total, page))
    }

    /// A customer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        Ok(sqlx::query_as::<_, Customer>(
            r"
            SELECT id, email, name, phone, password_hash IS NOT NULL AS registered, created_at
            FROM shop.customers
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?)
    }

    /// The customer's membership subscription, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn subscription(
        &self,
        customer_id: CustomerId,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let sql =
            format!("SELECT {SUBSCRIPTION_COLUMNS} FROM shop.subscriptions WHERE customer_id = $1");
        Ok(sqlx::query_as::<_, Subscription>(&sql)
            .bind(customer_id)
            .fetch_optional(self.pool)
            .await?)
    }

    /// Grant or extend membership by hand.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    pub async fn grant_membership(
        &self,
        customer_id: CustomerId,
        days: u32,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM shop.customers WHERE id = $1)")
                .bind(customer_id)
                .fetch_one(&mut *tx)
                .await?;
        if !exists {
            return Err(RepositoryError::NotFound);
        }

        let until = grant_days(&mut tx, customer_id, days, ADMIN_GRANT_SOURCE).await?;
        tx.commit().await?;
        Ok(until)
    }

    /// Cancel the customer's membership.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer has no subscription.
    pub async fn revoke_membership(&self, customer_id: CustomerId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.subscriptions
            SET status = 'cancelled', updated_at = now()
            WHERE customer_id = $1
            ",
        )
        .bind(customer_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tracing::info!(customer_id = %customer_id, "Membership revoked");
        Ok(())
    }

    /// Customers whose membership is active right now.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_member_count(&self) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM shop.subscriptions
            WHERE status = 'active' AND (current_period_end IS NULL OR current_period_end > now())
            ",
        )
        .fetch_one(self.pool)
        .await?)
    }
}
