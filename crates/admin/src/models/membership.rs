//! Membership curriculum types.

use solenne_core::{LessonId, ModuleId};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MembershipModule {
    pub id: ModuleId,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub position: i32,
    pub published: bool,
    pub lesson_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Lesson {
    pub id: LessonId,
    pub module_id: ModuleId,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub body_markdown: String,
    pub video_url: Option<String>,
    pub position: i32,
    pub is_preview: bool,
    pub published: bool,
}
