//! Customer types.

use chrono::{DateTime, Utc};

use solenne_core::{CustomerId, Email};

/// A buyer. Guests have no password; registering claims the record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Customer {
    pub id: CustomerId,
    pub email: Email,
    pub name: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}
