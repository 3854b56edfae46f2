//! Blog posts, kept in the headless CMS.

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

use solenne_core::Slug;

use super::{AdminPage, optional_text, set_flash};
use crate::cms::{Post, PostDraft};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireWriter;
use crate::state::AppState;

const MAX_TAGS: usize = 10;

/// Reject ids that are not CMS document ids before they reach a query.
pub(crate) fn document_id(id: &str) -> Result<&str> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(id)
    } else {
        Err(AppError::BadRequest("invalid document id".to_owned()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostForm {
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub cover_image_url: String,
    /// Comma separated.
    #[serde(default)]
    pub tags: String,
}

impl From<&Post> for PostForm {
    fn from(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            slug: post.slug.clone(),
            excerpt: post.excerpt.clone(),
            body: post.body.clone(),
            author: post.author.clone().unwrap_or_default(),
            cover_image_url: post.cover_image_url.clone().unwrap_or_default(),
            tags: post.tags_joined(),
        }
    }
}

impl PostForm {
    /// # Errors
    ///
    /// Returns a message for the first invalid field.
    pub fn validate(&self) -> std::result::Result<PostDraft, String> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err("Title is required".to_owned());
        }
        let slug = match optional_text(&self.slug) {
            Some(slug) => Slug::parse(&slug),
            None => Slug::from_title(title),
        }
        .map_err(|e| format!("Slug: {e}"))?;

        let cover_image_url = optional_text(&self.cover_image_url);
        if cover_image_url
            .as_deref()
            .is_some_and(|u| !u.starts_with("https://"))
        {
            return Err("Cover image URL must start with https://".to_owned());
        }

        let mut tags: Vec<String> = Vec::new();
        for tag in self.tags.split(',').filter_map(optional_text) {
            let tag = tag.to_lowercase();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        if tags.len() > MAX_TAGS {
            return Err(format!("At most {MAX_TAGS} tags"));
        }

        Ok(PostDraft {
            title: title.to_owned(),
            slug: slug.as_str().to_owned(),
            excerpt: self.excerpt.trim().to_owned(),
            body: self.body.clone(),
            author: optional_text(&self.author),
            cover_image_url,
            tags,
        })
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "blog/index.html")]
pub struct BlogIndexTemplate {
    pub page: AdminPage,
    pub posts: Vec<Post>,
}

#[derive(Template, WebTemplate)]
#[template(path = "blog/form.html")]
pub struct PostFormTemplate {
    pub page: AdminPage,
    pub post: Option<Post>,
    pub form: PostForm,
    pub error: Option<String>,
}

impl PostFormTemplate {
    fn action(&self) -> String {
        self.post
            .as_ref()
            .map_or_else(|| "/blog/new".to_owned(), |p| format!("/blog/{}/edit", p.id))
    }
}

/// All posts, drafts included.
#[instrument(skip(page, state))]
pub async fn index(page: AdminPage, State(state): State<AppState>) -> Result<BlogIndexTemplate> {
    Ok(BlogIndexTemplate {
        page,
        posts: state.cms().posts().await?,
    })
}

/// New post form.
pub async fn new_form(page: AdminPage) -> PostFormTemplate {
    PostFormTemplate {
        page,
        post: None,
        form: PostForm::default(),
        error: None,
    }
}

/// Create a draft post.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    RequireWriter(admin): RequireWriter,
    page: AdminPage,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<PostForm>,
) -> Result<Response> {
    let draft = match form.validate() {
        Ok(draft) => draft,
        Err(message) => {
            let template = PostFormTemplate {
                page,
                post: None,
                form,
                error: Some(message),
            };
            return Ok((StatusCode::BAD_REQUEST, template).into_response());
        }
    };

    let id = state.cms().create_post(&draft).await?;
    tracing::info!(post_id = %id, "Draft post created");
    set_flash(&session, "Draft saved. Publish it when it is ready.").await;
    Ok(Redirect::to(&format!("/blog/{id}/edit")).into_response())
}

async fn load_post(state: &AppState, id: &str) -> Result<Post> {
    state
        .cms()
        .post(document_id(id)?)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {id}")))
}

/// Edit post form.
pub async fn edit_form(
    page: AdminPage,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<PostFormTemplate> {
    let post = load_post(&state, &id).await?;
    Ok(PostFormTemplate {
        page,
        form: PostForm::from(&post),
        post: Some(post),
        error: None,
    })
}

/// Save a post's fields without changing its status.
#[instrument(skip_all, fields(admin_id = %admin.id, post_id = %id))]
pub async fn update(
    RequireWriter(admin): RequireWriter,
    page: AdminPage,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<PostForm>,
) -> Result<Response> {
    let post = load_post(&state, &id).await?;
    let draft = match form.validate() {
        Ok(draft) => draft,
        Err(message) => {
            let template = PostFormTemplate {
                page,
                post: Some(post),
                form,
                error: Some(message),
            };
            return Ok((StatusCode::BAD_REQUEST, template).into_response());
        }
    };

    state.cms().update_post(&post.id, &draft).await?;
    set_flash(&session, "Post saved.").await;
    Ok(Redirect::to(&format!("/blog/{}/edit", post.id)).into_response())
}

/// Publish a post; the first publication date is kept.
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn publish(
    RequireWriter(admin): RequireWriter,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Redirect> {
    let post = load_post(&state, &id).await?;
    state.cms().publish_post(&post).await?;
    tracing::info!(post_id = %post.id, "Post published");
    set_flash(&session, format!("Published {}.", post.title)).await;
    Ok(Redirect::to("/blog"))
}

/// Take a post back to draft.
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn unpublish(
    RequireWriter(admin): RequireWriter,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Redirect> {
    let post = load_post(&state, &id).await?;
    state.cms().unpublish_post(&post.id).await?;
    set_flash(&session, format!("{} is a draft again.", post.title)).await;
    Ok(Redirect::to("/blog"))
}

/// Delete a post.
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn delete(
    RequireWriter(admin): RequireWriter,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Redirect> {
    state.cms().delete_post(document_id(&id)?).await?;
    tracing::info!(post_id = %id, "Post deleted");
    set_flash(&session, "Post deleted.").await;
    Ok(Redirect::to("/blog"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id() {
        assert!(document_id("post-8f14e45f-ceea-467f-a0e6-2f6d8a1b7c11").is_ok());
        assert!(document_id("drafts.post-1").is_ok());
        assert!(document_id("").is_err());
        assert!(document_id("post\"] | *[_type").is_err());
    }

    #[test]
    fn test_post_form_normalizes_tags() {
        let form = PostForm {
            title: "Protetor solar no inverno".into(),
            body: "Sim, todo dia.".into(),
            tags: "Skincare, inverno, , skincare".into(),
            ..PostForm::default()
        };
        let draft = form.validate().unwrap();
        assert_eq!(draft.slug, "protetor-solar-no-inverno");
        assert_eq!(draft.tags, vec!["skincare", "inverno"]);
        assert_eq!(draft.author, None);
    }

    #[test]
    fn test_post_form_rejects_plain_http_cover() {
        let form = PostForm {
            title: "Post".into(),
            cover_image_url: "http://cdn.example.com/a.jpg".into(),
            ..PostForm::default()
        };
        assert!(form.validate().is_err());
    }
}
