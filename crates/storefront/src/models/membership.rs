//! Membership program types.

use chrono::{DateTime, Utc};

use solenne_core::membership::SubscriptionWindow;
use solenne_core::{CustomerId, LessonId, ModuleId, SubscriptionId, SubscriptionStatus};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MembershipModule {
    pub id: ModuleId,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub position: i32,
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
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub customer_id: CustomerId,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub source: String,
}

impl Subscription {
    #[must_use]
    pub const fn window(&self) -> SubscriptionWindow {
        SubscriptionWindow {
            status: self.status,
            current_period_end: self.current_period_end,
        }
    }
}
