//! Category route handlers.

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

use solenne_core::{CategoryId, Slug};

use super::{AdminPage, optional_text, parse_int, set_flash};
use crate::db::catalog::CategoryInput;
use crate::db::{CatalogRepository, RepositoryError};
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireWriter;
use crate::models::Category;
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub position: String,
}

impl CategoryForm {
    /// # Errors
    ///
    /// Returns a message for the first invalid field.
    pub fn validate(&self) -> std::result::Result<CategoryInput, String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Name is required".to_owned());
        }
        let slug = match optional_text(&self.slug) {
            Some(slug) => Slug::parse(&slug),
            None => Slug::from_title(name),
        }
        .map_err(|e| format!("Slug: {e}"))?;

        Ok(CategoryInput {
            name: name.to_owned(),
            slug: slug.as_str().to_owned(),
            description: self.description.trim().to_owned(),
            position: parse_int("Position", &self.position, 0)?,
        })
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "categories/index.html")]
pub struct CategoriesTemplate {
    pub page: AdminPage,
    pub categories: Vec<Category>,
    pub form: CategoryForm,
    pub error: Option<String>,
}

/// Categories with the create form.
pub async fn index(page: AdminPage, State(state): State<AppState>) -> Result<CategoriesTemplate> {
    Ok(CategoriesTemplate {
        page,
        categories: CatalogRepository::new(state.pool()).categories().await?,
        form: CategoryForm::default(),
        error: None,
    })
}

/// Create a category.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    RequireWriter(admin): RequireWriter,
    page: AdminPage,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CategoryForm>,
) -> Result<Response> {
    let repo = CatalogRepository::new(state.pool());
    let (status, error) = match form.validate() {
        Ok(input) => match repo.create_category(&input).await {
            Ok(id) => {
                tracing::info!(category_id = %id, "Category created");
                set_flash(&session, format!("Created {}.", input.name)).await;
                return Ok(Redirect::to("/categories").into_response());
            }
            Err(RepositoryError::Conflict(_)) => (
                StatusCode::CONFLICT,
                "Another category already uses this slug".to_owned(),
            ),
            Err(e) => return Err(e.into()),
        },
        Err(message) => (StatusCode::BAD_REQUEST, message),
    };

    let template = CategoriesTemplate {
        page,
        categories: repo.categories().await?,
        form,
        error: Some(error),
    };
    Ok((status, template).into_response())
}

/// Delete a category without products; 409 otherwise.
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn delete(
    RequireWriter(admin): RequireWriter,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<CategoryId>,
) -> Result<Redirect> {
    CatalogRepository::new(state.pool())
        .delete_category(id)
        .await?;
    set_flash(&session, "Category deleted.").await;
    Ok(Redirect::to("/categories"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_category_form() {
        let form = CategoryForm {
            name: " Cuidados com a Pele ".into(),
            position: "2".into(),
            ..CategoryForm::default()
        };
        let input = form.validate().unwrap();
        assert_eq!(input.name, "Cuidados com a Pele");
        assert_eq!(input.slug, "cuidados-com-a-pele");
        assert_eq!(input.position, 2);

        let blank = CategoryForm::default();
        assert_eq!(blank.validate().unwrap_err(), "Name is required");

        let bad_position = CategoryForm {
            name: "Kits".into(),
            position: "first".into(),
            ..CategoryForm::default()
        };
        assert!(bad_position.validate().is_err());
    }
}
