//! Membership curriculum: modules and their lessons.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use solenne_core::{LessonId, ModuleId, Slug};

use super::{AdminPage, checked, optional_text, parse_int, set_flash};
use crate::db::membership::{LessonInput, ModuleInput};
use crate::db::{MembershipRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireWriter;
use crate::models::{Lesson, MembershipModule};
use crate::state::AppState;

const MAX_TITLE_LENGTH: usize = 200;

fn title_and_slug(title: &str, slug: &str) -> std::result::Result<(String, String), String> {
    let title = title.trim();
    if title.is_empty() {
        return Err("Title is required".to_owned());
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(format!("Title must be at most {MAX_TITLE_LENGTH} characters"));
    }
    let slug = match optional_text(slug) {
        Some(slug) => Slug::parse(&slug),
        None => Slug::from_title(title),
    }
    .map_err(|e| format!("Slug: {e}"))?;
    Ok((title.to_owned(), slug.as_str().to_owned()))
}

// =============================================================================
// Modules
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleForm {
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub position: String,
    pub published: Option<String>,
}

impl From<&MembershipModule> for ModuleForm {
    fn from(m: &MembershipModule) -> Self {
        Self {
            title: m.title.clone(),
            slug: m.slug.clone(),
            summary: m.summary.clone(),
            position: m.position.to_string(),
            published: m.published.then(|| "on".to_owned()),
        }
    }
}

impl ModuleForm {
    #[must_use]
    pub fn is_published(&self) -> bool {
        checked(self.published.as_deref())
    }

    /// # Errors
    ///
    /// Returns a message for the first invalid field.
    pub fn validate(&self) -> std::result::Result<ModuleInput, String> {
        let (title, slug) = title_and_slug(&self.title, &self.slug)?;
        Ok(ModuleInput {
            title,
            slug,
            summary: self.summary.trim().to_owned(),
            position: parse_int("Position", &self.position, 0)?,
            published: self.is_published(),
        })
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "membership/index.html")]
pub struct ModulesTemplate {
    pub page: AdminPage,
    pub modules: Vec<MembershipModule>,
    pub form: ModuleForm,
    pub error: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "membership/module.html")]
pub struct ModuleTemplate {
    pub page: AdminPage,
    pub module: MembershipModule,
    pub lessons: Vec<Lesson>,
    pub form: ModuleForm,
    pub error: Option<String>,
}

/// Modules with the create form.
pub async fn index(page: AdminPage, State(state): State<AppState>) -> Result<ModulesTemplate> {
    Ok(ModulesTemplate {
        page,
        modules: MembershipRepository::new(state.pool()).modules().await?,
        form: ModuleForm::default(),
        error: None,
    })
}

/// Create a module.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create_module(
    RequireWriter(admin): RequireWriter,
    page: AdminPage,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ModuleForm>,
) -> Result<Response> {
    let repo = MembershipRepository::new(state.pool());
    let (status, error) = match form.validate() {
        Ok(input) => match repo.create_module(&input).await {
            Ok(id) => {
                tracing::info!(module_id = %id, "Membership module created");
                set_flash(&session, format!("Created {}.", input.title)).await;
                return Ok(Redirect::to(&format!("/membership/modules/{id}")).into_response());
            }
            Err(RepositoryError::Conflict(_)) => (
                StatusCode::CONFLICT,
                "Another module already uses this slug".to_owned(),
            ),
            Err(e) => return Err(e.into()),
        },
        Err(message) => (StatusCode::BAD_REQUEST, message),
    };

    let template = ModulesTemplate {
        page,
        modules: repo.modules().await?,
        form,
        error: Some(error),
    };
    Ok((status, template).into_response())
}

async fn load_module(repo: &MembershipRepository<'_>, id: ModuleId) -> Result<MembershipModule> {
    repo.module(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("module {id}")))
}

/// A module's settings and lessons.
#[instrument(skip(page, state))]
pub async fn show_module(
    page: AdminPage,
    State(state): State<AppState>,
    Path(id): Path<ModuleId>,
) -> Result<ModuleTemplate> {
    let repo = MembershipRepository::new(state.pool());
    let module = load_module(&repo, id).await?;
    Ok(ModuleTemplate {
        page,
        form: ModuleForm::from(&module),
        lessons: repo.lessons(id).await?,
        module,
        error: None,
    })
}

/// Save a module.
#[instrument(skip_all, fields(admin_id = %admin.id, module_id = %id))]
pub async fn update_module(
    RequireWriter(admin): RequireWriter,
    page: AdminPage,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ModuleId>,
    Form(form): Form<ModuleForm>,
) -> Result<Response> {
    let repo = MembershipRepository::new(state.pool());
    let (status, error) = match form.validate() {
        Ok(input) => match repo.update_module(id, &input).await {
            Ok(()) => {
                set_flash(&session, format!("Saved {}.", input.title)).await;
                return Ok(Redirect::to(&format!("/membership/modules/{id}")).into_response());
            }
            Err(RepositoryError::Conflict(_)) => (
                StatusCode::CONFLICT,
                "Another module already uses this slug".to_owned(),
            ),
            Err(e) => return Err(e.into()),
        },
        Err(message) => (StatusCode::BAD_REQUEST, message),
    };

    let template = ModuleTemplate {
        page,
        module: load_module(&repo, id).await?,
        lessons: repo.lessons(id).await?,
        form,
        error: Some(error),
    };
    Ok((status, template).into_response())
}

/// Delete a module with all its lessons.
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn delete_module(
    RequireWriter(admin): RequireWriter,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ModuleId>,
) -> Result<Redirect> {
    MembershipRepository::new(state.pool())
        .delete_module(id)
        .await?;
    tracing::info!(module_id = %id, "Membership module deleted");
    set_flash(&session, "Module deleted.").await;
    Ok(Redirect::to("/membership"))
}

// =============================================================================
// Lessons
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LessonForm {
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub body_markdown: String,
    #[serde(default)]
    pub video_url: String,
    #[serde(default)]
    pub position: String,
    pub is_preview: Option<String>,
    pub published: Option<String>,
}

impl From<&Lesson> for LessonForm {
    fn from(l: &Lesson) -> Self {
        Self {
            title: l.title.clone(),
            slug: l.slug.clone(),
            summary: l.summary.clone(),
            body_markdown: l.body_markdown.clone(),
            video_url: l.video_url.clone().unwrap_or_default(),
            position: l.position.to_string(),
            is_preview: l.is_preview.then(|| "on".to_owned()),
            published: l.published.then(|| "on".to_owned()),
        }
    }
}

impl LessonForm {
    #[must_use]
    pub fn preview(&self) -> bool {
        checked(self.is_preview.as_deref())
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        checked(self.published.as_deref())
    }

    /// # Errors
    ///
    /// Returns a message for the first invalid field. Videos must be served over https.
    pub fn validate(&self) -> std::result::Result<LessonInput, String> {
        let (title, slug) = title_and_slug(&self.title, &self.slug)?;

        let video_url = optional_text(&self.video_url);
        if let Some(url) = &video_url {
            match url::Url::parse(url) {
                Ok(parsed) if parsed.scheme() == "https" && parsed.host().is_some() => {}
                _ => return Err("Video URL must be an https:// link".to_owned()),
            }
        }

        Ok(LessonInput {
            title,
            slug,
            summary: self.summary.trim().to_owned(),
            body_markdown: self.body_markdown.clone(),
            video_url,
            position: parse_int("Position", &self.position, 0)?,
            is_preview: self.preview(),
            published: self.is_published(),
        })
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "membership/lesson_form.html")]
pub struct LessonFormTemplate {
    pub page: AdminPage,
    pub module: MembershipModule,
    pub lesson_id: Option<LessonId>,
    pub form: LessonForm,
    pub error: Option<String>,
}

impl LessonFormTemplate {
    fn action(&self) -> String {
        match self.lesson_id {
            Some(lesson) => format!("/membership/modules/{}/lessons/{lesson}/edit", self.module.id),
            None => format!("/membership/modules/{}/lessons/new", self.module.id),
        }
    }
}

/// New lesson form.
pub async fn new_lesson(
    page: AdminPage,
    State(state): State<AppState>,
    Path(id): Path<ModuleId>,
) -> Result<LessonFormTemplate> {
    let repo = MembershipRepository::new(state.pool());
    let module = load_module(&repo, id).await?;
    let form = LessonForm {
        position: (module.lesson_count + 1).to_string(),
        ..LessonForm::default()
    };
    Ok(LessonFormTemplate {
        page,
        module,
        lesson_id: None,
        form,
        error: None,
    })
}

/// Create a lesson.
#[instrument(skip_all, fields(admin_id = %admin.id, module_id = %id))]
pub async fn create_lesson(
    RequireWriter(admin): RequireWriter,
    page: AdminPage,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ModuleId>,
    Form(form): Form<LessonForm>,
) -> Result<Response> {
    let repo = MembershipRepository::new(state.pool());
    let module = load_module(&repo, id).await?;

    let (status, error) = match form.validate() {
        Ok(input) => match repo.create_lesson(id, &input).await {
            Ok(lesson) => {
                tracing::info!(lesson_id = %lesson, "Lesson created");
                set_flash(&session, format!("Created {}.", input.title)).await;
                return Ok(Redirect::to(&format!("/membership/modules/{id}")).into_response());
            }
            Err(RepositoryError::Conflict(_)) => (
                StatusCode::CONFLICT,
                "Another lesson in this module already uses this slug".to_owned(),
            ),
            Err(e) => return Err(e.into()),
        },
        Err(message) => (StatusCode::BAD_REQUEST, message),
    };

    let template = LessonFormTemplate {
        page,
        module,
        lesson_id: None,
        form,
        error: Some(error),
    };
    Ok((status, template).into_response())
}

/// Edit lesson form.
pub async fn edit_lesson(
    page: AdminPage,
    State(state): State<AppState>,
    Path((id, lesson_id)): Path<(ModuleId, LessonId)>,
) -> Result<LessonFormTemplate> {
    let repo = MembershipRepository::new(state.pool());
    let module = load_module(&repo, id).await?;
    let lesson = repo
        .lesson(id, lesson_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("lesson {lesson_id}")))?;

    Ok(LessonFormTemplate {
        page,
        module,
        lesson_id: Some(lesson_id),
        form: LessonForm::from(&lesson),
        error: None,
    })
}

/// Save a lesson.
#[instrument(skip_all, fields(admin_id = %admin.id, module_id = %id, lesson_id = %lesson_id))]
pub async fn update_lesson(
    RequireWriter(admin): RequireWriter,
    page: AdminPage,
    State(state): State<AppState>,
    session: Session,
    Path((id, lesson_id)): Path<(ModuleId, LessonId)>,
    Form(form): Form<LessonForm>,
) -> Result<Response> {
    let repo = MembershipRepository::new(state.pool());
    let module = load_module(&repo, id).await?;

    let (status, error) = match form.validate() {
        Ok(input) => match repo.update_lesson(id, lesson_id, &input).await {
            Ok(()) => {
                set_flash(&session, format!("Saved {}.", input.title)).await;
                return Ok(Redirect::to(&format!("/membership/modules/{id}")).into_response());
            }
            Err(RepositoryError::Conflict(_)) => (
                StatusCode::CONFLICT,
                "Another lesson in this module already uses this slug".to_owned(),
            ),
            Err(e) => return Err(e.into()),
        },
        Err(message) => (StatusCode::BAD_REQUEST, message),
    };

    let template = LessonFormTemplate {
        page,
        module,
        lesson_id: Some(lesson_id),
        form,
        error: Some(error),
    };
    Ok((status, template).into_response())
}

/// Delete a lesson.
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn delete_lesson(
    RequireWriter(admin): RequireWriter,
    State(state): State<AppState>,
    session: Session,
    Path((id, lesson_id)): Path<(ModuleId, LessonId)>,
) -> Result<Redirect> {
    MembershipRepository::new(state.pool())
        .delete_lesson(id, lesson_id)
        .await?;
    set_flash(&session, "Lesson deleted.").await;
    Ok(Redirect::to(&format!("/membership/modules/{id}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lesson_form() -> LessonForm {
        LessonForm {
            title: "Rotina da manhã".into(),
            body_markdown: "# Passo 1\n\nLimpeza.".into(),
            published: Some("on".into()),
            ..LessonForm::default()
        }
    }

    #[test]
    fn test_module_form_derives_slug() {
        let form = ModuleForm {
            title: "Fundamentos".into(),
            position: "1".into(),
            published: Some("on".into()),
            ..ModuleForm::default()
        };
        let input = form.validate().unwrap();
        assert_eq!(input.slug, "fundamentos");
        assert_eq!(input.position, 1);
        assert!(input.published);
    }

    #[test]
    fn test_lesson_form() {
        let input = lesson_form().validate().unwrap();
        assert_eq!(input.slug, "rotina-da-manha");
        assert_eq!(input.video_url, None);
        assert!(!input.is_preview);
        assert!(input.published);
        assert_eq!(input.body_markdown, "# Passo 1\n\nLimpeza.");
    }

    #[test]
    fn test_lesson_video_must_be_https() {
        let mut form = lesson_form();
        form.video_url = "https://player.vimeo.com/video/123".into();
        assert_eq!(
            form.validate().unwrap().video_url.as_deref(),
            Some("https://player.vimeo.com/video/123")
        );

        form.video_url = "http://player.vimeo.com/video/123".into();
        assert!(form.validate().is_err());

        form.video_url = "javascript:alert(1)".into();
        assert!(form.validate().is_err());
    }

    #[test]
    fn test_blank_title_rejected() {
        let form = LessonForm::default();
        assert_eq!(form.validate().unwrap_err(), "Title is required");
    }
}
