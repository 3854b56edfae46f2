//! Testimonials, kept in the headless CMS.

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

use super::blog::document_id;
use super::{AdminPage, set_flash};
use crate::cms::Testimonial;
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireWriter;
use crate::state::AppState;

const MAX_QUOTE_LENGTH: usize = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestimonialForm {
    pub author: String,
    pub quote: String,
    #[serde(default)]
    pub rating: String,
}

/// A validated testimonial.
#[derive(Debug, PartialEq, Eq)]
pub struct NewTestimonial {
    pub author: String,
    pub quote: String,
    pub rating: u8,
}

impl TestimonialForm {
    /// # Errors
    ///
    /// Returns a message for the first invalid field. Ratings run from 1 to 5.
    pub fn validate(&self) -> std::result::Result<NewTestimonial, String> {
        let author = self.author.trim();
        let quote = self.quote.trim();
        if author.is_empty() {
            return Err("Author is required".to_owned());
        }
        if quote.is_empty() {
            return Err("Quote is required".to_owned());
        }
        if quote.chars().count() > MAX_QUOTE_LENGTH {
            return Err(format!("Quote must be at most {MAX_QUOTE_LENGTH} characters"));
        }
        let rating = match self.rating.trim().parse::<u8>() {
            Ok(r) if (1..=5).contains(&r) => r,
            _ => return Err("Rating must be between 1 and 5".to_owned()),
        };
        Ok(NewTestimonial {
            author: author.to_owned(),
            quote: quote.to_owned(),
            rating,
        })
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "testimonials/index.html")]
pub struct TestimonialsTemplate {
    pub page: AdminPage,
    pub testimonials: Vec<Testimonial>,
    pub form: TestimonialForm,
    pub error: Option<String>,
}

/// Testimonials with the create form.
#[instrument(skip(page, state))]
pub async fn index(page: AdminPage, State(state): State<AppState>) -> Result<TestimonialsTemplate> {
    Ok(TestimonialsTemplate {
        page,
        testimonials: state.cms().testimonials().await?,
        form: TestimonialForm {
            rating: "5".to_owned(),
            ..TestimonialForm::default()
        },
        error: None,
    })
}

/// Add a published testimonial.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    RequireWriter(admin): RequireWriter,
    page: AdminPage,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<TestimonialForm>,
) -> Result<Response> {
    match form.validate() {
        Ok(t) => {
            let id = state
                .cms()
                .create_testimonial(&t.author, &t.quote, t.rating)
                .await?;
            tracing::info!(testimonial_id = %id, "Testimonial created");
            set_flash(&session, format!("Added testimonial from {}.", t.author)).await;
            Ok(Redirect::to("/testimonials").into_response())
        }
        Err(message) => {
            let template = TestimonialsTemplate {
                page,
                testimonials: state.cms().testimonials().await?,
                form,
                error: Some(message),
            };
            Ok((StatusCode::BAD_REQUEST, template).into_response())
        }
    }
}

/// Delete a testimonial.
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn delete(
    RequireWriter(admin): RequireWriter,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Redirect> {
    state.cms().delete_testimonial(document_id(&id)?).await?;
    set_flash(&session, "Testimonial deleted.").await;
    Ok(Redirect::to("/testimonials"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(rating: &str) -> TestimonialForm {
        TestimonialForm {
            author: "Marina L.".into(),
            quote: " Minha pele nunca esteve tão bem. ".into(),
            rating: rating.into(),
        }
    }

    #[test]
    fn test_rating_range() {
        let t = form("4").validate().unwrap();
        assert_eq!(t.rating, 4);
        assert_eq!(t.quote, "Minha pele nunca esteve tão bem.");

        for bad in ["0", "6", "", "five", "-1"] {
            assert_eq!(
                form(bad).validate().unwrap_err(),
                "Rating must be between 1 and 5"
            );
        }
    }

    #[test]
    fn test_author_and_quote_required() {
        let mut f = form("5");
        f.author = "  ".into();
        assert_eq!(f.validate().unwrap_err(), "Author is required");

        let mut f = form("5");
        f.quote = String::new();
        assert_eq!(f.validate().unwrap_err(), "Quote is required");
    }
}
