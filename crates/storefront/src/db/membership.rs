//! Membership modules, lessons, subscriptions and progress.

use sqlx::PgPool;

use solenne_core::{CustomerId, LessonId};

use super::RepositoryError;
use crate::models::{Lesson, MembershipModule, Subscription};

const LESSON_COLUMNS: &str =
    "l.id, l.module_id, l.title, l.slug, l.summary, l.body_markdown, l.video_url, l.position, l.is_preview";

/// Repository for the membership area.
pub struct MembershipRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MembershipRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Published modules ordered by position.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn modules(&self) -> Result<Vec<MembershipModule>, RepositoryError> {
        Ok(sqlx::query_as::<_, MembershipModule>(
            r"
            SELECT id, title, slug, summary, position
            FROM shop.membership_modules
            WHERE published
            ORDER BY position, id
            ",
        )
        .fetch_all(self.pool)
        .await?)
    }

    /// Published lessons of published modules, ordered by position.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lessons(&self) -> Result<Vec<Lesson>, RepositoryError> {
        let sql = format!(
            "SELECT {LESSON_COLUMNS} FROM shop.lessons l \
             JOIN shop.membership_modules m ON m.id = l.module_id \
             WHERE l.published AND m.published \
             ORDER BY m.position, l.position, l.id"
        );
        Ok(sqlx::query_as::<_, Lesson>(&sql).fetch_all(self.pool).await?)
    }

    /// A published lesson and its module, addressed by slugs.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lesson(
        &self,
        module_slug: &str,
        lesson_slug: &str,
    ) -> Result<Option<(MembershipModule, Lesson)>, RepositoryError> {
        let module = sqlx::query_as::<_, MembershipModule>(
            r"
            SELECT id, title, slug, summary, position
            FROM shop.membership_modules
            WHERE slug = $1 AND published
            ",
        )
        .bind(module_slug)
        .fetch_optional(self.pool)
        .await?;

        let Some(module) = module else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT {LESSON_COLUMNS} FROM shop.lessons l \
             WHERE l.module_id = $1 AND l.slug = $2 AND l.published"
        );
        let lesson = sqlx::query_as::<_, Lesson>(&sql)
            .bind(module.id)
            .bind(lesson_slug)
            .fetch_optional(self.pool)
            .await?;

        Ok(lesson.map(|lesson| (module, lesson)))
    }

    /// The customer's subscription, if one was ever granted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn subscription(
        &self,
        customer_id: CustomerId,
    ) -> Result<Option<Subscription>, RepositoryError> {
        Ok(sqlx::query_as::<_, Subscription>(
            r"
            SELECT id, customer_id, status, current_period_end, source
            FROM shop.subscriptions
            WHERE customer_id = $1
            ",
        )
        .bind(customer_id)
        .fetch_optional(self.pool)
        .await?)
    }

    /// Mark a lesson completed. Repeats are ignored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn complete_lesson(
        &self,
        customer_id: CustomerId,
        lesson_id: LessonId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.lesson_progress (customer_id, lesson_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(customer_id)
        .bind(lesson_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Lessons the customer has completed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn completed_lessons(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<LessonId>, RepositoryError> {
        Ok(sqlx::query_scalar(
            "SELECT lesson_id FROM shop.lesson_progress WHERE customer_id = $1",
        )
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?)
    }
}
