//! Target-database publisher.
//!
//! Ships articles to each tenant's own article table. Tenant schemas drift,
//! so the insert is a convergent search: when the store rejects an unknown
//! optional column, that column is dropped and the POST retried. The
//! required core never shrinks; losing any of it is fatal.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use crate::domains::generate::GeneratedArticle;
use crate::domains::seo::SeoReport;
use crate::domains::store::types::Website;
use crate::kernel::http::{HttpError, HttpFetcher};

/// Retry budget for schema adaptation (attempts after the first).
const MAX_RETRIES: u32 = 5;

/// How many slug-collision retries get a date suffix before giving up.
const MAX_SLUG_RETRIES: u32 = 2;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(20);

/// Columns the tenant schema must support.
const REQUIRED_COLUMNS: &[&str] = &[
    "title",
    "slug",
    "content",
    "status",
    "published_at",
    "created_at",
];

lazy_static! {
    static ref MISSING_COLUMN: Regex =
        Regex::new(r#"(?i)Could not find the '([A-Za-z0-9_]+)' column"#).expect("valid regex");
    static ref UNDEFINED_COLUMN: Regex =
        Regex::new(r#"(?i)column "([A-Za-z0-9_]+)".* does not exist"#).expect("valid regex");
}

/// A tenant article database.
#[derive(Debug, Clone)]
pub struct TargetDb {
    pub base_url: String,
    pub service_key: String,
}

/// Publish failures.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Tenant schema is missing required column '{0}'")]
    RequiredColumn(String),

    #[error("Schema adaptation exhausted after {0} retries")]
    SchemaAdaptationExhausted(u32),

    #[error("Tenant store rejected the insert (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Tenant store request failed: {0}")]
    Transport(String),

    #[error("Tenant store request timed out")]
    Timeout,
}

// =============================================================================
// Sink seam
// =============================================================================

/// Insert failures as seen by the adaptation loop.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),
}

/// One attempt at inserting an article row.
#[async_trait]
pub trait BaseArticleSink: Send + Sync {
    async fn insert(&self, target: &TargetDb, payload: &Value) -> Result<(), SinkError>;
}

/// REST sink posting to the tenant's article-insert endpoint.
pub struct RestArticleSink {
    fetcher: HttpFetcher,
}

impl RestArticleSink {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl BaseArticleSink for RestArticleSink {
    async fn insert(&self, target: &TargetDb, payload: &Value) -> Result<(), SinkError> {
        let base = target.base_url.trim_end_matches('/');
        let url = format!("{}/rest/v1/blog_articles", base);
        let bearer = format!("Bearer {}", target.service_key);
        let headers: Vec<(&str, &str)> = vec![
            ("apikey", target.service_key.as_str()),
            ("Authorization", bearer.as_str()),
            ("Prefer", "return=representation"),
        ];

        match self
            .fetcher
            .json_request(Method::POST, &url, &headers, Some(payload), PUBLISH_TIMEOUT)
            .await
        {
            Ok(_) => Ok(()),
            Err(HttpError::Status { status, body }) => Err(SinkError::Rejected { status, body }),
            Err(HttpError::Timeout) => Err(SinkError::Timeout),
            Err(HttpError::Transport(e)) => Err(SinkError::Transport(e)),
            // A created row that fails to decode is still a created row
            Err(HttpError::Decode(_)) => Ok(()),
        }
    }
}

// =============================================================================
// Publisher
// =============================================================================

/// Schema-adaptive publisher over an article sink.
pub struct Publisher {
    sink: Arc<dyn BaseArticleSink>,
}

impl Publisher {
    pub fn new(sink: Arc<dyn BaseArticleSink>) -> Self {
        Self { sink }
    }

    /// Publish an article, shrinking the optional column set on unknown-column
    /// rejections. The payload shrinks monotonically; every known-column error
    /// makes progress, so the loop converges within the retry budget.
    pub async fn publish(
        &self,
        article: &GeneratedArticle,
        website: &Website,
        seo: &SeoReport,
        target: &TargetDb,
        now: DateTime<Utc>,
    ) -> Result<(), PublishError> {
        let mut optional = optional_columns(article, website, seo);
        let mut slug = article.slug.clone();
        let mut slug_retries = 0u32;

        for attempt in 0..=MAX_RETRIES {
            let payload = build_payload(article, &slug, &optional, now);

            match self.sink.insert(target, &payload).await {
                Ok(()) => {
                    tracing::info!(
                        slug = %slug,
                        attempts = attempt + 1,
                        dropped = MAX_OPTIONAL - optional.len(),
                        "Article published"
                    );
                    return Ok(());
                }
                Err(SinkError::Rejected { status, body }) => {
                    if let Some(column) = parse_unknown_column(&body) {
                        if REQUIRED_COLUMNS.contains(&column.as_str()) {
                            return Err(PublishError::RequiredColumn(column));
                        }
                        if optional.remove(column.as_str()).is_some() {
                            tracing::warn!(column = %column, "Tenant schema lacks column, retrying without it");
                            continue;
                        }
                        // A column we never sent; retrying cannot help
                        return Err(PublishError::Rejected { status, body });
                    }
                    if is_duplicate_row(&body) && slug_retries < MAX_SLUG_RETRIES {
                        slug_retries += 1;
                        slug = disambiguate_slug(&article.slug, now, slug_retries);
                        tracing::warn!(slug = %slug, "Slug collision, retrying with suffix");
                        continue;
                    }
                    return Err(PublishError::Rejected { status, body });
                }
                Err(SinkError::Timeout) => return Err(PublishError::Timeout),
                Err(SinkError::Transport(e)) => return Err(PublishError::Transport(e)),
            }
        }

        Err(PublishError::SchemaAdaptationExhausted(MAX_RETRIES))
    }
}

/// Number of optional columns when nothing has been dropped.
const MAX_OPTIONAL: usize = 12;

fn optional_columns(
    article: &GeneratedArticle,
    website: &Website,
    seo: &SeoReport,
) -> BTreeMap<&'static str, Value> {
    let author = website
        .default_author
        .clone()
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| website.name.clone());

    let mut columns: BTreeMap<&'static str, Value> = BTreeMap::new();
    columns.insert("excerpt", json!(article.excerpt));
    columns.insert("meta_description", json!(article.meta_description));
    columns.insert("tags", json!(article.tags));
    columns.insert("primary_keyword", json!(article.primary_keyword));
    columns.insert("author", json!(author));
    columns.insert("read_time", json!(article.read_time));
    columns.insert("category", json!(article.category));
    columns.insert("seo_score", json!(seo.score));
    columns.insert("product_id", json!(website.id));
    columns.insert("website_domain", json!(website.domain));
    columns.insert("language", json!(article.language));
    columns.insert("geo_optimized", json!(seo.geo_optimized));
    debug_assert_eq!(columns.len(), MAX_OPTIONAL);
    columns
}

fn build_payload(
    article: &GeneratedArticle,
    slug: &str,
    optional: &BTreeMap<&'static str, Value>,
    now: DateTime<Utc>,
) -> Value {
    let ts = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut map = Map::new();
    map.insert("title".to_string(), json!(article.title));
    map.insert("slug".to_string(), json!(slug));
    map.insert("content".to_string(), json!(article.content));
    map.insert("status".to_string(), json!("published"));
    map.insert("published_at".to_string(), json!(ts));
    map.insert("created_at".to_string(), json!(ts));
    for (key, value) in optional {
        map.insert((*key).to_string(), value.clone());
    }
    Value::Object(map)
}

fn parse_unknown_column(body: &str) -> Option<String> {
    MISSING_COLUMN
        .captures(body)
        .or_else(|| UNDEFINED_COLUMN.captures(body))
        .map(|c| c[1].to_string())
}

fn is_duplicate_row(body: &str) -> bool {
    body.contains("23505") || body.to_lowercase().contains("duplicate key")
}

fn disambiguate_slug(slug: &str, now: DateTime<Utc>, retry: u32) -> String {
    if retry == 1 {
        format!("{}-{}", slug, now.format("%Y%m%d"))
    } else {
        format!("{}-{}", slug, now.format("%Y%m%d-%H%M"))
    }
}

// =============================================================================
// Mock sink (for tests)
// =============================================================================

/// Scripted sink: pops one response per insert and records every payload.
pub struct MockArticleSink {
    responses: Mutex<Vec<Result<(), SinkError>>>,
    payloads: Mutex<Vec<Value>>,
}

impl MockArticleSink {
    /// `responses` are consumed front-to-back; when exhausted, inserts succeed.
    pub fn new(responses: Vec<Result<(), SinkError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Vec::new())
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().expect("payloads lock").clone()
    }
}

#[async_trait]
impl BaseArticleSink for MockArticleSink {
    async fn insert(&self, _target: &TargetDb, payload: &Value) -> Result<(), SinkError> {
        self.payloads
            .lock()
            .expect("payloads lock")
            .push(payload.clone());
        let mut responses = self.responses.lock().expect("responses lock");
        if responses.is_empty() {
            Ok(())
        } else {
            responses.remove(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::catalog::SearchIntent;
    use crate::domains::seo::SeoBreakdown;
    use chrono::TimeZone;

    fn article() -> GeneratedArticle {
        GeneratedArticle {
            title: "How to Wax a Surfboard".to_string(),
            slug: "how-to-wax-a-surfboard".to_string(),
            content: "<p>Wax on.</p>".to_string(),
            excerpt: "Wax on.".to_string(),
            meta_description: "Wax on.".to_string(),
            tags: vec!["wax a surfboard".to_string()],
            primary_keyword: "wax a surfboard".to_string(),
            category: Some("gear".to_string()),
            language: "en".to_string(),
            format_key: "how_to_guide".to_string(),
            search_intent: SearchIntent::Informational,
            word_count: 3,
            read_time: 1,
        }
    }

    fn website() -> Website {
        serde_json::from_value(serde_json::json!({
            "id": "w1",
            "name": "Surf Report",
            "domain": "surf.example.com",
            "is_active": true
        }))
        .unwrap()
    }

    fn seo() -> SeoReport {
        SeoReport {
            score: 72,
            breakdown: SeoBreakdown {
                title: 15,
                structure: 20,
                meta: 10,
                keywords: 12,
                geo: 15,
            },
            geo_optimized: true,
        }
    }

    fn target() -> TargetDb {
        TargetDb {
            base_url: "https://tenant.example.com".to_string(),
            service_key: "svc".to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap()
    }

    fn publisher_with(
        responses: Vec<Result<(), SinkError>>,
    ) -> (Publisher, Arc<MockArticleSink>) {
        let sink = Arc::new(MockArticleSink::new(responses));
        (Publisher::new(sink.clone()), sink)
    }

    fn unknown_column(column: &str) -> SinkError {
        SinkError::Rejected {
            status: 400,
            body: format!(
                r#"{{"code":"PGRST204","message":"Could not find the '{}' column of 'blog_articles' in the schema cache"}}"#,
                column
            ),
        }
    }

    #[tokio::test]
    async fn test_first_attempt_carries_full_payload() {
        let (publisher, sink) = publisher_with(Vec::new());
        publisher
            .publish(&article(), &website(), &seo(), &target(), now())
            .await
            .unwrap();

        let payloads = sink.payloads();
        assert_eq!(payloads.len(), 1);
        let payload = &payloads[0];
        for column in REQUIRED_COLUMNS {
            assert!(payload.get(*column).is_some(), "missing {}", column);
        }
        assert_eq!(payload["status"], "published");
        assert_eq!(payload["geo_optimized"], true);
        assert_eq!(payload["seo_score"], 72);
        assert_eq!(payload["author"], "Surf Report");
    }

    #[tokio::test]
    async fn test_unknown_column_is_dropped_and_retried() {
        let (publisher, sink) = publisher_with(vec![
            Err(unknown_column("geo_optimized")),
            Err(unknown_column("seo_score")),
        ]);
        publisher
            .publish(&article(), &website(), &seo(), &target(), now())
            .await
            .unwrap();

        let payloads = sink.payloads();
        assert_eq!(payloads.len(), 3);
        assert!(payloads[0].get("geo_optimized").is_some());
        assert!(payloads[1].get("geo_optimized").is_none());
        assert!(payloads[1].get("seo_score").is_some());
        assert!(payloads[2].get("geo_optimized").is_none());
        assert!(payloads[2].get("seo_score").is_none());
        // Required core survives every shrink
        for payload in &payloads {
            for column in REQUIRED_COLUMNS {
                assert!(payload.get(*column).is_some());
            }
        }
    }

    #[tokio::test]
    async fn test_required_column_rejection_is_fatal() {
        let (publisher, sink) = publisher_with(vec![Err(unknown_column("slug"))]);
        let err = publisher
            .publish(&article(), &website(), &seo(), &target(), now())
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::RequiredColumn(c) if c == "slug"));
        assert_eq!(sink.payloads().len(), 1);
    }

    #[tokio::test]
    async fn test_other_errors_are_immediately_fatal() {
        let (publisher, sink) = publisher_with(vec![Err(SinkError::Rejected {
            status: 500,
            body: "internal error".to_string(),
        })]);
        let err = publisher
            .publish(&article(), &website(), &seo(), &target(), now())
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Rejected { status: 500, .. }));
        assert_eq!(sink.payloads().len(), 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion() {
        let responses: Vec<Result<(), SinkError>> = (0..10)
            .map(|i| {
                Err(unknown_column(
                    ["excerpt", "meta_description", "tags", "primary_keyword", "author", "read_time", "category", "seo_score", "product_id", "website_domain"][i],
                ))
            })
            .collect();
        let (publisher, sink) = publisher_with(responses);
        let err = publisher
            .publish(&article(), &website(), &seo(), &target(), now())
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::SchemaAdaptationExhausted(_)));
        assert_eq!(sink.payloads().len(), (MAX_RETRIES + 1) as usize);
    }

    #[tokio::test]
    async fn test_duplicate_slug_gets_suffix() {
        let (publisher, sink) = publisher_with(vec![Err(SinkError::Rejected {
            status: 409,
            body: r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#
                .to_string(),
        })]);
        publisher
            .publish(&article(), &website(), &seo(), &target(), now())
            .await
            .unwrap();

        let payloads = sink.payloads();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[1]["slug"], "how-to-wax-a-surfboard-20250610");
    }

    #[test]
    fn test_parse_unknown_column_variants() {
        assert_eq!(
            parse_unknown_column("Could not find the 'geo_optimized' column of 'blog_articles'"),
            Some("geo_optimized".to_string())
        );
        assert_eq!(
            parse_unknown_column(r#"column "seo_score" of relation "blog_articles" does not exist"#),
            Some("seo_score".to_string())
        );
        assert_eq!(parse_unknown_column("some other error"), None);
    }
}
