//! Membership area route handlers.
//!
//! Lessons are readable when marked as preview or when the customer holds an
//! active subscription ([`AccessDecision`]). Locked lessons render a 403 page
//! pointing at the membership product.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use tracing::instrument;

use solenne_core::membership::{AccessDecision, SubscriptionWindow, days_remaining};
use solenne_core::{LessonId, SubscriptionStatus};

use super::PageContext;
use super::products::ProductCard;
use crate::content::render_markdown;
use crate::db::{CatalogRepository, MembershipRepository};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::middleware::auth::login_url;
use crate::models::{Lesson, MembershipModule, Subscription};
use crate::state::AppState;

/// Subscription state shown on the membership and account pages.
#[derive(Clone)]
pub struct MembershipStatusView {
    pub active: bool,
    pub headline: String,
    pub detail: Option<String>,
}

impl MembershipStatusView {
    #[must_use]
    pub fn new(subscription: Option<&Subscription>, now: DateTime<Utc>) -> Self {
        let Some(subscription) = subscription else {
            return Self {
                active: false,
                headline: "No membership yet".to_owned(),
                detail: None,
            };
        };

        let window = subscription.window();
        match (window.is_active_at(now), window.current_period_end) {
            (true, None) => Self {
                active: true,
                headline: "Lifetime member".to_owned(),
                detail: None,
            },
            (true, Some(end)) => Self {
                active: true,
                headline: format!("Member until {}", end.format("%B %-d, %Y")),
                detail: Some(format!("{} days left", days_remaining(end, now))),
            },
            (false, Some(end)) if subscription.status != SubscriptionStatus::Cancelled => Self {
                active: false,
                headline: format!("Membership ended on {}", end.format("%B %-d, %Y")),
                detail: Some("Renew to unlock every lesson again.".to_owned()),
            },
            (false, _) => Self {
                active: false,
                headline: format!("Membership {}", subscription.status.label().to_lowercase()),
                detail: None,
            },
        }
    }
}

/// Lesson row on the membership index.
#[derive(Clone)]
pub struct LessonRow {
    pub title: String,
    pub summary: String,
    pub url: String,
    pub is_preview: bool,
    pub accessible: bool,
    pub completed: bool,
}

/// Module with its lessons.
#[derive(Clone)]
pub struct ModuleView {
    pub title: String,
    pub summary: String,
    pub lessons: Vec<LessonRow>,
}

/// Membership index template.
#[derive(Template, WebTemplate)]
#[template(path = "membership/index.html")]
pub struct MembershipIndexTemplate {
    pub ctx: PageContext,
    pub modules: Vec<ModuleView>,
    pub status: Option<MembershipStatusView>,
    pub membership_product: Option<ProductCard>,
    pub completed_count: usize,
    pub lesson_count: usize,
}

/// Lesson page template.
#[derive(Template, WebTemplate)]
#[template(path = "membership/lesson.html")]
pub struct LessonTemplate {
    pub ctx: PageContext,
    pub module_title: String,
    pub title: String,
    pub body_html: String,
    pub video_embed_url: Option<String>,
    pub video_url: Option<String>,
    pub complete_url: String,
    pub completed: bool,
}

/// Locked lesson template.
#[derive(Template, WebTemplate)]
#[template(path = "membership/locked.html")]
pub struct LockedTemplate {
    pub ctx: PageContext,
    pub module_title: String,
    pub title: String,
    pub summary: String,
    pub message: String,
    pub membership_product: Option<ProductCard>,
}

fn lesson_url(module: &str, lesson: &str) -> String {
    format!("/membership/{module}/{lesson}")
}

/// Embeddable player URL for YouTube and Vimeo links.
///
/// Other hosts are shown as a plain link.
#[must_use]
pub fn video_embed_url(video_url: &str) -> Option<String> {
    let url = url::Url::parse(video_url).ok()?;
    let host = url.host_str()?.trim_start_matches("www.");
    let first_segment = || {
        url.path_segments()
            .and_then(|mut s| s.next())
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    };

    let safe_id = |id: String| {
        id.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            .then_some(id)
    };

    match host {
        "youtube.com" | "m.youtube.com" => url
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
            .and_then(safe_id)
            .map(|id| format!("https://www.youtube-nocookie.com/embed/{id}")),
        "youtu.be" => first_segment()
            .and_then(safe_id)
            .map(|id| format!("https://www.youtube-nocookie.com/embed/{id}")),
        "vimeo.com" => first_segment()
            .filter(|id| id.chars().all(|c| c.is_ascii_digit()))
            .map(|id| format!("https://player.vimeo.com/video/{id}")),
        _ => None,
    }
}

/// Subscription window of the logged-in customer, if any.
async fn subscription_for(
    state: &AppState,
    ctx: &PageContext,
) -> Result<Option<Subscription>> {
    match &ctx.customer {
        Some(customer) => Ok(MembershipRepository::new(state.pool())
            .subscription(customer.id)
            .await?),
        None => Ok(None),
    }
}

async fn membership_product(state: &AppState) -> Result<Option<ProductCard>> {
    Ok(CatalogRepository::new(state.pool())
        .membership_product()
        .await?
        .as_ref()
        .map(ProductCard::from))
}

/// Display modules and lessons.
#[instrument(skip(state, ctx))]
pub async fn index(State(state): State<AppState>, ctx: PageContext) -> Result<impl IntoResponse> {
    let repo = MembershipRepository::new(state.pool());
    let modules = repo.modules().await?;
    let lessons = repo.lessons().await?;

    let subscription = subscription_for(&state, &ctx).await?;
    let completed: Vec<LessonId> = match &ctx.customer {
        Some(customer) => repo.completed_lessons(customer.id).await?,
        None => Vec::new(),
    };

    let now = Utc::now();
    let window = subscription.as_ref().map(Subscription::window);
    let modules = group_lessons(&modules, &lessons, window.as_ref(), &completed, now);
    let lesson_count = lessons.len();
    let completed_count = lessons.iter().filter(|l| completed.contains(&l.id)).count();

    Ok(MembershipIndexTemplate {
        status: ctx
            .customer
            .as_ref()
            .map(|_| MembershipStatusView::new(subscription.as_ref(), now)),
        ctx,
        modules,
        membership_product: membership_product(&state).await?,
        completed_count,
        lesson_count,
    })
}

fn group_lessons(
    modules: &[MembershipModule],
    lessons: &[Lesson],
    window: Option<&SubscriptionWindow>,
    completed: &[LessonId],
    now: DateTime<Utc>,
) -> Vec<ModuleView> {
    modules
        .iter()
        .map(|module| ModuleView {
            title: module.title.clone(),
            summary: module.summary.clone(),
            lessons: lessons
                .iter()
                .filter(|l| l.module_id == module.id)
                .map(|lesson| LessonRow {
                    title: lesson.title.clone(),
                    summary: lesson.summary.clone(),
                    url: lesson_url(&module.slug, &lesson.slug),
                    is_preview: lesson.is_preview,
                    accessible: AccessDecision::for_lesson(lesson.is_preview, window, now)
                        .is_granted(),
                    completed: completed.contains(&lesson.id),
                })
                .collect(),
        })
        .collect()
}

/// Display a lesson, or the locked page when access is not granted.
#[instrument(skip(state, ctx))]
pub async fn lesson(
    State(state): State<AppState>,
    ctx: PageContext,
    Path((module_slug, lesson_slug)): Path<(String, String)>,
) -> Result<Response> {
    let repo = MembershipRepository::new(state.pool());
    let (module, lesson) = repo
        .lesson(&module_slug, &lesson_slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lesson {module_slug}/{lesson_slug}")))?;

    let url = lesson_url(&module.slug, &lesson.slug);
    if !lesson.is_preview && ctx.customer.is_none() {
        return Ok(Redirect::to(&login_url(&url)).into_response());
    }

    let subscription = subscription_for(&state, &ctx).await?;
    let window = subscription.as_ref().map(Subscription::window);
    let decision = AccessDecision::for_lesson(lesson.is_preview, window.as_ref(), Utc::now());

    let message = match decision {
        AccessDecision::Granted => {
            let completed = match &ctx.customer {
                Some(customer) => repo
                    .completed_lessons(customer.id)
                    .await?
                    .contains(&lesson.id),
                None => false,
            };
            return Ok(LessonTemplate {
                ctx,
                module_title: module.title,
                title: lesson.title,
                body_html: render_markdown(&lesson.body_markdown),
                video_embed_url: lesson.video_url.as_deref().and_then(video_embed_url),
                video_url: lesson.video_url,
                complete_url: format!("{url}/complete"),
                completed,
            }
            .into_response());
        }
        AccessDecision::Expired { ended_at } => format!(
            "Your membership ended on {}. Renew it to keep learning.",
            ended_at.format("%B %-d, %Y")
        ),
        AccessDecision::RequiresMembership => {
            "This lesson is part of the membership program.".to_owned()
        }
    };

    Ok((
        StatusCode::FORBIDDEN,
        LockedTemplate {
            ctx,
            module_title: module.title,
            title: lesson.title,
            summary: lesson.summary,
            message,
            membership_product: membership_product(&state).await?,
        },
    )
        .into_response())
}

/// Mark a lesson as completed.
#[instrument(skip(state, customer))]
pub async fn complete(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    Path((module_slug, lesson_slug)): Path<(String, String)>,
) -> Result<Redirect> {
    let repo = MembershipRepository::new(state.pool());
    let (module, lesson) = repo
        .lesson(&module_slug, &lesson_slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lesson {module_slug}/{lesson_slug}")))?;

    let subscription = repo.subscription(customer.id).await?;
    let window = subscription.as_ref().map(Subscription::window);
    if !AccessDecision::for_lesson(lesson.is_preview, window.as_ref(), Utc::now()).is_granted() {
        return Err(AppError::Forbidden("Membership required".to_owned()));
    }

    repo.complete_lesson(customer.id, lesson.id).await?;
    Ok(Redirect::to(&lesson_url(&module.slug, &lesson.slug)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use solenne_core::{CustomerId, ModuleId, SubscriptionId};

    use super::*;

    fn subscription(status: SubscriptionStatus, end: Option<DateTime<Utc>>) -> Subscription {
        Subscription {
            id: SubscriptionId::new(1),
            customer_id: CustomerId::new(1),
            status,
            current_period_end: end,
            source: "order".into(),
        }
    }

    fn lesson(id: i32, module: i32, is_preview: bool) -> Lesson {
        Lesson {
            id: LessonId::new(id),
            module_id: ModuleId::new(module),
            title: format!("Lesson {id}"),
            slug: format!("lesson-{id}"),
            summary: String::new(),
            body_markdown: String::new(),
            video_url: None,
            position: id,
            is_preview,
        }
    }

    #[test]
    fn test_video_embed_url() {
        assert_eq!(
            video_embed_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some("https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ")
        );
        assert_eq!(
            video_embed_url("https://youtu.be/dQw4w9WgXcQ").as_deref(),
            Some("https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ")
        );
        assert_eq!(
            video_embed_url("https://vimeo.com/76979871").as_deref(),
            Some("https://player.vimeo.com/video/76979871")
        );
        assert_eq!(video_embed_url("https://example.com/video.mp4"), None);
        assert_eq!(video_embed_url("not a url"), None);
        assert_eq!(video_embed_url("https://youtu.be/%22%3E"), None);
    }

    #[test]
    fn test_status_view() {
        let now = Utc::now();
        assert!(!MembershipStatusView::new(None, now).active);

        let lifetime = subscription(SubscriptionStatus::Active, None);
        let view = MembershipStatusView::new(Some(&lifetime), now);
        assert!(view.active);
        assert_eq!(view.headline, "Lifetime member");

        let running = subscription(SubscriptionStatus::Active, Some(now + Duration::days(10)));
        let view = MembershipStatusView::new(Some(&running), now);
        assert!(view.active);
        assert_eq!(view.detail.as_deref(), Some("10 days left"));

        let lapsed = subscription(SubscriptionStatus::Active, Some(now - Duration::days(1)));
        let view = MembershipStatusView::new(Some(&lapsed), now);
        assert!(!view.active);
        assert!(view.headline.starts_with("Membership ended on"));
    }

    #[test]
    fn test_group_lessons_marks_access() {
        let now = Utc::now();
        let modules = vec![MembershipModule {
            id: ModuleId::new(1),
            title: "Basics".into(),
            slug: "basics".into(),
            summary: String::new(),
            position: 1,
        }];
        let lessons = vec![lesson(1, 1, true), lesson(2, 1, false), lesson(3, 2, false)];

        let grouped = group_lessons(&modules, &lessons, None, &[LessonId::new(1)], now);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].lessons.len(), 2);
        assert!(grouped[0].lessons[0].accessible);
        assert!(grouped[0].lessons[0].completed);
        assert!(!grouped[0].lessons[1].accessible);
        assert_eq!(grouped[0].lessons[1].url, "/membership/basics/lesson-2");

        let active = SubscriptionWindow {
            status: SubscriptionStatus::Active,
            current_period_end: None,
        };
        let grouped = group_lessons(&modules, &lessons, Some(&active), &[], now);
        assert!(grouped[0].lessons.iter().all(|l| l.accessible));
    }
}
