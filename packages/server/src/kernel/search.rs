//! Google Custom Search client for topic discovery.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::http::HttpFetcher;

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// One web search hit.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

/// Web search capability.
#[async_trait]
pub trait BaseSearchService: Send + Sync {
    async fn search(
        &self,
        query: &str,
        language: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>>;
}

/// Google Custom Search JSON API client.
pub struct GoogleSearchClient {
    api_key: String,
    engine_id: String,
    fetcher: HttpFetcher,
}

/// Search response items (the rest of the envelope is ignored).
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

impl GoogleSearchClient {
    pub fn new(api_key: String, engine_id: String, fetcher: HttpFetcher) -> Self {
        Self {
            api_key,
            engine_id,
            fetcher,
        }
    }
}

#[async_trait]
impl BaseSearchService for GoogleSearchClient {
    async fn search(
        &self,
        query: &str,
        language: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>> {
        let num = max_results.clamp(1, 10).to_string();
        let lr = format!("lang_{}", language.split('-').next().unwrap_or("en"));
        let url = Url::parse_with_params(
            SEARCH_ENDPOINT,
            &[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
                ("lr", lr.as_str()),
            ],
        )
        .context("Failed to build search URL")?;

        let value = self
            .fetcher
            .json_request(Method::GET, url.as_str(), &[], None, SEARCH_TIMEOUT)
            .await
            .context("Google search request failed")?;

        let response: SearchResponse =
            serde_json::from_value(value).context("Failed to parse search response")?;

        Ok(response
            .items
            .into_iter()
            .filter(|item| !item.title.is_empty() && !item.link.is_empty())
            .map(|item| SearchResult {
                title: item.title,
                snippet: item.snippet,
                link: item.link,
            })
            .collect())
    }
}

/// No-op search service for testing or when credentials are not configured.
pub struct NoopSearchService;

#[async_trait]
impl BaseSearchService for NoopSearchService {
    async fn search(
        &self,
        _query: &str,
        _language: &str,
        _max_results: usize,
    ) -> Result<Vec<SearchResult>> {
        tracing::warn!("NoopSearchService: search called but no Google credentials configured");
        Ok(vec![])
    }
}
