//! Headless CMS client (read side).
//!
//! Editorial documents (blog posts, static pages, testimonials) are read
//! through the CMS query API:
//!
//! ```text
//! GET https://{project}.api.{host}/v{version}/data/query/{dataset}?query=<GROQ>&$param=<json>
//! ```
//!
//! Responses are cached with `moka` (5-minute TTL) keyed by query and
//! parameters.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;

use crate::config::CmsConfig;

/// Posts shown on the home page.
pub const HOME_POST_LIMIT: usize = 3;
/// Posts listed on the blog index.
pub const BLOG_POST_LIMIT: usize = 50;

const POST_PROJECTION: &str = r#"{
    "id": _id,
    title,
    "slug": slug.current,
    "excerpt": coalesce(excerpt, ""),
    "body": coalesce(body, ""),
    author,
    "cover_image_url": coalesce(coverImage.asset->url, coverImageUrl),
    "tags": coalesce(tags, []),
    "published_at": publishedAt
}"#;

const PUBLISHED_POST: &str =
    r#"_type == "post" && status == "published" && defined(publishedAt)"#;

/// Errors that can occur when querying the CMS.
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

/// A blog post.
#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub excerpt: String,
    /// Markdown source.
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub published_at: DateTime<Utc>,
}

impl Post {
    #[must_use]
    pub fn published_date(&self) -> String {
        self.published_at.format("%B %-d, %Y").to_string()
    }
}

/// A static page (about, shipping policy, terms).
#[derive(Debug, Clone, Deserialize)]
pub struct CmsPage {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub body: String,
}

/// A customer testimonial.
#[derive(Debug, Clone, Deserialize)]
pub struct Testimonial {
    pub id: String,
    pub author: String,
    pub quote: String,
    pub rating: u8,
}

impl Testimonial {
    /// Ratings outside 1..=5 are editorial mistakes and are not shown.
    #[must_use]
    pub const fn has_valid_rating(&self) -> bool {
        matches!(self.rating, 1..=5)
    }

    #[must_use]
    pub fn stars(&self) -> String {
        "★".repeat(usize::from(self.rating))
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    result: T,
}

/// Client for the CMS query API.
#[derive(Clone)]
pub struct CmsClient {
    inner: Arc<CmsClientInner>,
}

struct CmsClientInner {
    client: reqwest::Client,
    query_url: String,
    cache: Cache<String, serde_json::Value>,
}

impl CmsClient {
    /// Create a new CMS client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CmsConfig) -> Result<Self, CmsError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.read_token {
            let value = format!("Bearer {}", token.expose_secret());
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value)
                    .map_err(|e| CmsError::Parse(format!("Invalid token format: {e}")))?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(256)
            .time_to_live(Duration::from_secs(300))
            .build();

        Ok(Self {
            inner: Arc::new(CmsClientInner {
                client,
                query_url: format!("{}/query/{}", config.data_url(), config.dataset),
                cache,
            }),
        })
    }

    /// Run a GROQ query with JSON-encoded parameters.
    async fn query<T: DeserializeOwned>(
        &self,
        groq: &str,
        params: &[(&str, serde_json::Value)],
    ) -> Result<T, CmsError> {
        let url = query_url(&self.inner.query_url, groq, params)?;

        if let Some(cached) = self.inner.cache.get(&url).await {
            tracing::debug!("CMS cache hit");
            return serde_json::from_value(cached).map_err(|e| CmsError::Parse(e.to_string()));
        }

        let response = self.inner.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "CMS query failed");
            return Err(CmsError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let body: QueryResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| CmsError::Parse(e.to_string()))?;

        self.inner.cache.insert(url, body.result.clone()).await;
        serde_json::from_value(body.result).map_err(|e| CmsError::Parse(e.to_string()))
    }

    /// Latest published posts, optionally restricted to a tag.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    #[instrument(skip(self))]
    pub async fn posts(&self, tag: Option<&str>, limit: usize) -> Result<Vec<Post>, CmsError> {
        let mut params = Vec::new();
        let filter = if let Some(tag) = tag {
            params.push(("tag", serde_json::Value::from(tag)));
            format!("{PUBLISHED_POST} && $tag in tags")
        } else {
            PUBLISHED_POST.to_owned()
        };
        let groq =
            format!("*[{filter}] | order(publishedAt desc) [0...{limit}] {POST_PROJECTION}");
        self.query(&groq, &params).await
    }

    /// A published post by slug.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    #[instrument(skip(self))]
    pub async fn post(&self, slug: &str) -> Result<Option<Post>, CmsError> {
        let groq = format!("*[{PUBLISHED_POST} && slug.current == $slug][0] {POST_PROJECTION}");
        self.query(&groq, &[("slug", slug.into())]).await
    }

    /// A static page by slug.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    #[instrument(skip(self))]
    pub async fn page(&self, slug: &str) -> Result<Option<CmsPage>, CmsError> {
        let groq = r#"*[_type == "page" && slug.current == $slug][0] {
            "id": _id, title, "slug": slug.current, "body": coalesce(body, "")
        }"#;
        self.query(groq, &[("slug", slug.into())]).await
    }

    /// Published testimonials with a valid rating, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    #[instrument(skip(self))]
    pub async fn testimonials(&self) -> Result<Vec<Testimonial>, CmsError> {
        let groq = r#"*[_type == "testimonial" && published == true] | order(_createdAt desc) {
            "id": _id, author, quote, rating
        }"#;
        let all: Vec<Testimonial> = self.query(groq, &[]).await?;
        Ok(all
            .into_iter()
            .filter(|t| {
                let ok = t.has_valid_rating();
                if !ok {
                    tracing::warn!(id = %t.id, rating = t.rating, "Skipping testimonial with invalid rating");
                }
                ok
            })
            .collect())
    }
}

/// Build the query URL; parameter values are JSON-encoded as the API expects.
fn query_url(
    base: &str,
    groq: &str,
    params: &[(&str, serde_json::Value)],
) -> Result<String, CmsError> {
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

    #[test]
    fn test_query_url_encodes_params_as_json() {
        let url = query_url(
            "https://abc.api.sanity.io/v2025-02-19/data/query/production",
            "*[slug.current == $slug][0]",
            &[("slug", "hello world".into())],
        )
        .unwrap();
        let parsed = url::Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert_eq!(pairs[0].0, "query");
        assert_eq!(pairs[1], ("$slug".to_owned(), "\"hello world\"".to_owned()));
    }

    #[test]
    fn test_post_deserializes_with_missing_optionals() {
        let post: Post = serde_json::from_value(serde_json::json!({
            "id": "post-1",
            "title": "Morning routine",
            "slug": "morning-routine",
            "author": null,
            "cover_image_url": null,
            "published_at": "2026-02-01T09:00:00Z"
        }))
        .unwrap();
        assert!(post.tags.is_empty());
        assert_eq!(post.body, "");
        assert_eq!(post.published_date(), "February 1, 2026");
    }

    #[test]
    fn test_testimonial_rating_bounds() {
        let t = |rating| Testimonial {
            id: "t".into(),
            author: "Ana".into(),
            quote: "Love it".into(),
            rating,
        };
        assert!(t(1).has_valid_rating());
        assert!(t(5).has_valid_rating());
        assert!(!t(0).has_valid_rating());
        assert!(!t(6).has_valid_rating());
        assert_eq!(t(3).stars(), "★★★");
    }
}
