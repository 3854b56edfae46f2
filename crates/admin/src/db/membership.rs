//! Membership curriculum repository: modules and lessons.

use sqlx::PgPool;

use solenne_core::{LessonId, ModuleId};

use super::RepositoryError;
use crate::models::{Lesson, MembershipModule};

const LESSON_COLUMNS: &str = "id, module_id, title, slug, summary, body_markdown, video_url, \
     position, is_preview, published";

/// Validated module fields.
#[derive(Debug, Clone)]
pub struct ModuleInput {
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub position: i32,
    pub published: bool,
}

/// Validated lesson fields.
#[derive(Debug, Clone)]
pub struct LessonInput {
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub body_markdown: String,
    pub video_url: Option<String>,
    pub position: i32,
    pub is_preview: bool,
    pub published: bool,
}

/// Repository for membership curriculum database operations.
pub struct MembershipRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MembershipRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All modules, drafts included, by position.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn modules(&self) -> Result<Vec<MembershipModule>, RepositoryError> {
        Ok(sqlx::query_as::<_, MembershipModule>(
            r"
            SELECT m.id, m.title, m.slug, m.summary, m.position, m.published,
                   COUNT(l.id) AS lesson_count
            FROM shop.membership_modules m
            LEFT JOIN shop.lessons l ON l.module_id = m.id
            GROUP BY m.id
            ORDER BY m.position, m.id
            ",
        )
        .fetch_all(self.pool)
        .await?)
    }

    /// A module by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn module(&self, id: ModuleId) -> Result<Option<MembershipModule>, RepositoryError> {
        Ok(sqlx::query_as::<_, MembershipModule>(
            r"
            SELECT m.id, m.title, m.slug, m.summary, m.position, m.published,
                   (SELECT COUNT(*) FROM shop.lessons l WHERE l.module_id = m.id) AS lesson_count
            FROM shop.membership_modules m
            WHERE m.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?)
    }

    /// Create a module.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create_module(&self, input: &ModuleInput) -> Result<ModuleId, RepositoryError> {
        sqlx::query_scalar(
            r"
            INSERT INTO shop.membership_modules (title, slug, summary, position, published)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.summary)
        .bind(input.position)
        .bind(input.published)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "module slug"))
    }

    /// Replace a module's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the module does not exist.
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn update_module(
        &self,
        id: ModuleId,
        input: &ModuleInput,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.membership_modules
            SET title = $2, slug = $3, summary = $4, position = $5, published = $6,
                updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.summary)
        .bind(input.position)
        .bind(input.published)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "module slug"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a module and, by cascade, its lessons and their progress.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the module does not exist.
    pub async fn delete_module(&self, id: ModuleId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.membership_modules WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Lessons of a module, drafts included, by position.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lessons(&self, module_id: ModuleId) -> Result<Vec<Lesson>, RepositoryError> {
        let sql = format!(
            "SELECT {LESSON_COLUMNS} FROM shop.lessons WHERE module_id = $1 ORDER BY position, id"
        );
        Ok(sqlx::query_as::<_, Lesson>(&sql)
            .bind(module_id)
            .fetch_all(self.pool)
            .await?)
    }

    /// A lesson by ID, scoped to its module.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lesson(
        &self,
        module_id: ModuleId,
        id: LessonId,
    ) -> Result<Option<Lesson>, RepositoryError> {
        let sql =
            format!("SELECT {LESSON_COLUMNS} FROM shop.lessons WHERE id = $1 AND module_id = $2");
        Ok(sqlx::query_as::<_, Lesson>(&sql)
            .bind(id)
            .bind(module_id)
            .fetch_optional(self.pool)
            .await?)
    }

    /// Create a lesson in a module.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the module already has the slug.
    pub async fn create_lesson(
        &self,
        module_id: ModuleId,
        input: &LessonInput,
    ) -> Result<LessonId, RepositoryError> {
        sqlx::query_scalar(
            r"
            INSERT INTO shop.lessons (
                module_id, title, slug, summary, body_markdown, video_url, position,
                is_preview, published
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            ",
        )
        .bind(module_id)
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.summary)
        .bind(&input.body_markdown)
        .bind(input.video_url.as_deref())
        .bind(input.position)
        .bind(input.is_preview)
        .bind(input.published)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "lesson slug in this module"))
    }

    /// Replace a lesson's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the lesson is not in the module.
    /// Returns `RepositoryError::Conflict` if the module already has the slug.
    pub async fn update_lesson(
        &self,
        module_id: ModuleId,
        id: LessonId,
        input: &LessonInput,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.lessons SET
                title = $3, slug = $4, summary = $5, body_markdown = $6, video_url = $7,
                position = $8, is_preview = $9, published = $10, updated_at = now()
            WHERE id = $1 AND module_id = $2
            ",
        )
        .bind(id)
        .bind(module_id)
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.summary)
        .bind(&input.body_markdown)
        .bind(input.video_url.as_deref())
        .bind(input.position)
        .bind(input.is_preview)
        .bind(input.published)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "lesson slug in this module"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a lesson.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the lesson is not in the module.
    pub async fn delete_lesson(
        &self,
        module_id: ModuleId,
        id: LessonId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.lessons WHERE id = $1 AND module_id = $2")
            .bind(id)
            .bind(module_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
