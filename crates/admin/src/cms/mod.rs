//! Headless CMS client (editing side).
//!
//! Reads go through the query API with the write token so drafts are
//! visible; changes go through the mutation API:
//!
//! ```text
//! POST https://{project}.api.{host}/v{version}/data/mutate/{dataset}
//! { "mutations": [ {"createOrReplace": doc} | {"patch": {"id", "set"}} | {"delete": {"id"}} ] }
//! ```
//!
//! Nothing is cached here; editors expect to see their own changes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::instrument;

use crate::config::CmsConfig;

const POST_PROJECTION: &str = r#"{
    "id": _id,
    title,
    "slug": slug.current,
    "excerpt": coalesce(excerpt, ""),
    "body": coalesce(body, ""),
    author,
    "cover_image_url": coverImageUrl,
    "tags": coalesce(tags, []),
    "status": coalesce(status, "draft"),
    "published_at": publishedAt
}"#;

/// Errors that can occur when talking to the CMS.
#[derive(Debug, Error)]
pub enum CmsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// CMS returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Editorial state of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
}

impl PostStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

/// A blog post as editors see it.
#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: PostStatus,
    /// Set on first publish and kept afterwards.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Post {
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    #[must_use]
    pub fn tags_joined(&self) -> String {
        self.tags.join(", ")
    }
}

/// Editable fields of a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub body: String,
    pub author: Option<String>,
    pub cover_image_url: Option<String>,
    pub tags: Vec<String>,
}

impl PostDraft {
    fn fields(&self) -> Value {
        json!({
            "title": self.title,
            "slug": { "_type": "slug", "current": self.slug },
            "excerpt": self.excerpt,
            "body": self.body,
            "author": self.author,
            "coverImageUrl": self.cover_image_url,
            "tags": self.tags,
        })
    }
}

/// A testimonial, including unpublished ones.
#[derive(Debug, Clone, Deserialize)]
pub struct Testimonial {
    pub id: String,
    pub author: String,
    pub quote: String,
    pub rating: u8,
    #[serde(default)]
    pub published: bool,
}

impl Testimonial {
    #[must_use]
    pub fn stars(&self) -> String {
        "★".repeat(usize::from(self.rating.min(5)))
    }
}

/// A single document mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateOrReplace(Value),
    Patch { id: String, set: Value },
    Delete { id: String },
}

impl Mutation {
    fn to_json(&self) -> Value {
        match self {
            Self::CreateOrReplace(doc) => json!({ "createOrReplace": doc }),
            Self::Patch { id, set } => json!({ "patch": { "id": id, "set": set } }),
            Self::Delete { id } => json!({ "delete": { "id": id } }),
        }
    }
}

/// Request body of the mutation endpoint.
#[must_use]
pub fn mutation_body(mutations: &[Mutation]) -> Value {
    json!({ "mutations": mutations.iter().map(Mutation::to_json).collect::<Vec<_>>() })
}

/// New document id with the given type prefix, e.g. `post-<uuid>`.
#[must_use]
pub fn new_document_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}

/// The `set` of a publish patch. `publishedAt` is only written the first time.
#[must_use]
pub fn publish_fields(existing: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Value {
    match existing {
        Some(_) => json!({ "status": PostStatus::Published.as_str() }),
        None => json!({
            "status": PostStatus::Published.as_str(),
            "publishedAt": now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }),
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    result: T,
}

/// Client for the CMS query and mutation APIs.
#[derive(Clone)]
pub struct CmsClient {
    inner: Arc<CmsClientInner>,
}

struct CmsClientInner {
    client: reqwest::Client,
    query_url: String,
    mutate_url: String,
}

impl CmsClient {
    /// Create a new CMS client authenticated with the write token.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CmsConfig) -> Result<Self, CmsError> {
        let mut headers = HeaderMap::new();
        let value = format!("Bearer {}", config.write_token.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&value)
                .map_err(|e| CmsError::Parse(format!("Invalid token format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .build()?;

        let data_url = config.data_url();
        Ok(Self {
            inner: Arc::new(CmsClientInner {
                client,
                query_url: format!("{data_url}/query/{}", config.dataset),
                mutate_url: format!("{data_url}/mutate/{}", config.dataset),
            }),
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        groq: &str,
        params: &[(&str, Value)],
    ) -> Result<T, CmsError> {
        let url = query_url(&self.inner.query_url, groq, params)?;
        let response = self.inner.client.get(&url).send().await?;
        let body: QueryResponse<T> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| CmsError::Parse(e.to_string()))?;
        Ok(body.result)
    }

    async fn mutate(&self, mutations: &[Mutation]) -> Result<(), CmsError> {
        let response = self
            .inner
            .client
            .post(&self.inner.mutate_url)
            .json(&mutation_body(mutations))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, CmsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, "CMS request failed");
        Err(CmsError::Api {
            status: status.as_u16(),
            message: message.chars().take(200).collect(),
        })
    }

    /// All posts, drafts included, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    #[instrument(skip(self))]
    pub async fn posts(&self) -> Result<Vec<Post>, CmsError> {
        let groq = format!(r#"*[_type == "post"] | order(_createdAt desc) {POST_PROJECTION}"#);
        self.query(&groq, &[]).await
    }

    /// A post by document id.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    #[instrument(skip(self))]
    pub async fn post(&self, id: &str) -> Result<Option<Post>, CmsError> {
        let groq = format!(r#"*[_type == "post" && _id == $id][0] {POST_PROJECTION}"#);
        self.query(&groq, &[("id", id.into())]).await
    }

    /// Create a draft post; returns its id.
    ///
    /// # Errors
    ///
    /// Returns error if the mutation fails.
    #[instrument(skip(self, draft), fields(slug = %draft.slug))]
    pub async fn create_post(&self, draft: &PostDraft) -> Result<String, CmsError> {
        let id = new_document_id("post");
        let mut doc = draft.fields();
        if let Value::Object(map) = &mut doc {
            map.insert("_id".to_owned(), id.clone().into());
            map.insert("_type".to_owned(), "post".into());
            map.insert("status".to_owned(), PostStatus::Draft.as_str().into());
        }
        self.mutate(&[Mutation::CreateOrReplace(doc)]).await?;
        tracing::info!(id = %id, "Post created");
        Ok(id)
    }

    /// Replace a post's editable fields.
    ///
    /// # Errors
    ///
    /// Returns error if the mutation fails.
    #[instrument(skip(self, draft))]
    pub async fn update_post(&self, id: &str, draft: &PostDraft) -> Result<(), CmsError> {
        self.mutate(&[Mutation::Patch {
            id: id.to_owned(),
            set: draft.fields(),
        }])
        .await
    }

    /// Publish a post.
    ///
    /// # Errors
    ///
    /// Returns error if the mutation fails.
    #[instrument(skip(self, post), fields(id = %post.id))]
    pub async fn publish_post(&self, post: &Post) -> Result<(), CmsError> {
        self.mutate(&[Mutation::Patch {
            id: post.id.clone(),
            set: publish_fields(post.published_at, Utc::now()),
        }])
        .await
    }

    /// Return a post to draft; its first publish date is kept.
    ///
    /// # Errors
    ///
    /// Returns error if the mutation fails.
    #[instrument(skip(self))]
    pub async fn unpublish_post(&self, id: &str) -> Result<(), CmsError> {
        self.mutate(&[Mutation::Patch {
            id: id.to_owned(),
            set: json!({ "status": PostStatus::Draft.as_str() }),
        }])
        .await
    }

    /// Delete a post.
    ///
    /// # Errors
    ///
    /// Returns error if the mutation fails.
    #[instrument(skip(self))]
    pub async fn delete_post(&self, id: &str) -> Result<(), CmsError> {
        self.mutate(&[Mutation::Delete { id: id.to_owned() }]).await
    }

    /// All testimonials, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    #[instrument(skip(self))]
    pub async fn testimonials(&self) -> Result<Vec<Testimonial>, CmsError> {
        let groq = r#"*[_type == "testimonial"] | order(_createdAt desc) {
            "id": _id, author, quote, rating, "published": coalesce(published, false)
        }"#;
        self.query(groq, &[]).await
    }

    /// Create a published testimonial. Callers check the rating is 1 to 5.
    ///
    /// # Errors
    ///
    /// Returns error if the mutation fails.
    #[instrument(skip(self, quote))]
    pub async fn create_testimonial(
        &self,
        author: &str,
        quote: &str,
        rating: u8,
    ) -> Result<String, CmsError> {
        let id = new_document_id("testimonial");
        self.mutate(&[Mutation::CreateOrReplace(json!({
            "_id": id,
            "_type": "testimonial",
            "author": author,
            "quote": quote,
            "rating": rating,
            "published": true,
        }))])
        .await?;
        Ok(id)
    }

    /// Delete a testimonial.
    ///
    /// # Errors
    ///
    /// Returns error if the mutation fails.
    #[instrument(skip(self))]
    pub async fn delete_testimonial(&self, id: &str) -> Result<(), CmsError> {
        self.mutate(&[Mutation::Delete { id: id.to_owned() }]).await
    }
}

/// Build the query URL; parameter values are JSON-encoded as the API expects.
fn query_url(base: &str, groq: &str, params: &[(&str, Value)]) -> Result<String, CmsError> {
    let mut pairs = vec![("query".to_owned(), groq.to_owned())];
    pairs.extend(
        params
            .iter()
            .map(|(name, value)| (format!("${name}"), value.to_string())),
    );
    url::Url::parse_with_params(base, &pairs)
        .map(String::from)
        .map_err(|e| CmsError::Parse(format!("invalid CMS URL: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_mutation_body_shapes() {
        let body = mutation_body(&[
            Mutation::CreateOrReplace(json!({ "_id": "post-1", "_type": "post" })),
            Mutation::Patch {
                id: "post-1".into(),
                set: json!({ "title": "Hello" }),
            },
            Mutation::Delete {
                id: "post-2".into(),
            },
        ]);
        assert_eq!(
            body,
            json!({
                "mutations": [
                    { "createOrReplace": { "_id": "post-1", "_type": "post" } },
                    { "patch": { "id": "post-1", "set": { "title": "Hello" } } },
                    { "delete": { "id": "post-2" } }
                ]
            })
        );
    }

    #[test]
    fn test_new_document_id_prefix() {
        let id = new_document_id("post");
        let uuid = id.strip_prefix("post-").unwrap();
        assert!(uuid::Uuid::parse_str(uuid).is_ok());
    }

    #[test]
    fn test_publish_sets_date_only_first_time() {
        let now = Utc.with_ymd_and_hms(2026, 4, 2, 8, 0, 0).unwrap();
        assert_eq!(
            publish_fields(None, now),
            json!({ "status": "published", "publishedAt": "2026-04-02T08:00:00Z" })
        );

        let earlier = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            publish_fields(Some(earlier), now),
            json!({ "status": "published" })
        );
    }

    #[test]
    fn test_draft_fields_use_slug_object() {
        let draft = PostDraft {
            title: "Slow mornings".into(),
            slug: "slow-mornings".into(),
            excerpt: String::new(),
            body: "# Hi".into(),
            author: None,
            cover_image_url: None,
            tags: vec!["ritual".into()],
        };
        let fields = draft.fields();
        assert_eq!(fields["slug"]["current"], "slow-mornings");
        assert_eq!(fields["slug"]["_type"], "slug");
        assert_eq!(fields["tags"], json!(["ritual"]));
        assert!(fields.get("status").is_none());
    }

    #[test]
    fn test_draft_post_deserializes() {
        let post: Post = serde_json::from_value(json!({
            "id": "post-1",
            "title": "Draft",
            "slug": "draft",
            "status": "draft",
            "published_at": null
        }))
        .unwrap();
        assert!(!post.is_published());
        assert!(post.published_at.is_none());
    }
}
