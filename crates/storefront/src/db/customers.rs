//! Customer repository.
//!
//! Checkout creates guest customers keyed by email; registration later
//! attaches a password to the same row so past orders follow the account.

use sqlx::{PgConnection, PgPool};

use solenne_core::{CustomerId, Email};

use super::RepositoryError;
use crate::models::Customer;

const CUSTOMER_COLUMNS: &str = "id, email, name, phone, created_at";

/// Repository for customer database operations.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a customer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM shop.customers WHERE id = $1");
        Ok(sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?)
    }

    /// Get a customer and their password hash for login.
    ///
    /// Guests (no password) are returned with `None` as hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(Customer, Option<String>)>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            customer: Customer,
            password_hash: Option<String>,
        }

        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS}, password_hash FROM shop.customers WHERE email = $1"
        );
        let row = sqlx::query_as::<_, Row>(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(|r| (r.customer, r.password_hash)))
    }

    /// Register an account, claiming an existing guest record when present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already has a password.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn register(
        &self,
        email: &Email,
        name: &str,
        password_hash: &str,
    ) -> Result<Customer, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(CustomerId, Option<String>)> = sqlx::query_as(
            "SELECT id, password_hash FROM shop.customers WHERE email = $1 FOR UPDATE",
        )
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?;

        let sql = match existing {
            Some((_, Some(_))) => {
                return Err(RepositoryError::Conflict(
                    "an account with this email already exists".to_owned(),
                ));
            }
            Some((id, None)) => {
                tracing::info!(customer_id = %id, "Guest customer claimed by registration");
                format!(
                    "UPDATE shop.customers SET name = $2, password_hash = $3, updated_at = now() \
                     WHERE email = $1 RETURNING {CUSTOMER_COLUMNS}"
                )
            }
            None => format!(
                "INSERT INTO shop.customers (email, name, password_hash) VALUES ($1, $2, $3) \
                 RETURNING {CUSTOMER_COLUMNS}"
            ),
        };

        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(email)
            .bind(name)
            .bind(password_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_insert(e, "customer"))?;

        tx.commit().await?;
        Ok(customer)
    }
}

/// Find or create the customer placing an order.
///
/// Runs inside the checkout transaction. A registered customer's name is
/// left alone; a guest's name and phone follow the latest checkout.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn upsert_for_checkout(
    conn: &mut PgConnection,
    email: &Email,
    name: &str,
    phone: &str,
) -> Result<CustomerId, RepositoryError> {
    let id: CustomerId = sqlx::query_scalar(
        r"
        INSERT INTO shop.customers (email, name, phone)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE SET
            name = CASE WHEN shop.customers.password_hash IS NULL
                        THEN EXCLUDED.name ELSE shop.customers.name END,
            phone = EXCLUDED.phone,
            updated_at = now()
        RETURNING id
        ",
    )
    .bind(email)
    .bind(name)
    .bind(phone)
    .fetch_one(conn)
    .await?;
    Ok(id)
}
