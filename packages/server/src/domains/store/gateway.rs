//! Central store gateway.
//!
//! Thin, typed facade over the coordination database's REST interface
//! (PostgREST conventions: `column=eq.value` filters, `order=`, `limit=`,
//! `Prefer: return=representation`). No operation retries internally;
//! retries are the caller's responsibility.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use super::types::{
    ApiKeys, GenerationLog, LogOutcome, NewTopic, ScanStatus, Topic, Website, WebsiteRunUpdate,
    WebsiteScan,
};
use crate::kernel::http::{HttpError, HttpFetcher};

/// Request-scoped deadline for store calls.
const STORE_TIMEOUT: Duration = Duration::from_secs(15);

/// Store access failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Http(#[from] HttpError),

    #[error("Unexpected store response: {0}")]
    Decode(String),
}

/// Typed operations against the coordination database.
#[async_trait]
pub trait BaseCentralStore: Send + Sync {
    async fn list_due_websites(&self, now: DateTime<Utc>) -> Result<Vec<Website>, StoreError>;

    async fn list_active_websites(&self) -> Result<Vec<Website>, StoreError>;

    async fn get_website(&self, id: &str) -> Result<Option<Website>, StoreError>;

    async fn get_api_keys(&self, website_id: &str) -> Result<Option<ApiKeys>, StoreError>;

    async fn get_website_scan(&self, website_id: &str) -> Result<Option<WebsiteScan>, StoreError>;

    async fn upsert_website_scan(&self, scan: &WebsiteScan) -> Result<(), StoreError>;

    async fn set_scan_status(
        &self,
        website_id: &str,
        status: ScanStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn find_unused_topic(&self, website_id: &str) -> Result<Option<Topic>, StoreError>;

    async fn find_reusable_topic(
        &self,
        website_id: &str,
        max_uses: i32,
    ) -> Result<Option<Topic>, StoreError>;

    async fn insert_topic(&self, topic: &NewTopic) -> Result<Topic, StoreError>;

    /// Single atomic update: `times_used = t+1`, `is_used = (t+1 >= max)`.
    /// The filter on the observed `times_used` makes a raced update a no-op.
    async fn mark_topic_used(&self, topic: &Topic, max_uses: i32) -> Result<(), StoreError>;

    async fn create_generation_log(
        &self,
        website_id: &str,
        topic_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, StoreError>;

    async fn finalize_generation_log(
        &self,
        log_id: &str,
        outcome: &LogOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Finalize `generating` logs older than the cutoff as failed timeouts.
    /// Orphans never block progress; this just keeps the table readable.
    async fn sweep_stale_generation_logs(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn update_website_after_run(
        &self,
        website_id: &str,
        update: &WebsiteRunUpdate,
    ) -> Result<(), StoreError>;
}

// =============================================================================
// REST implementation
// =============================================================================

/// REST gateway to the central coordination database.
pub struct RestStore {
    base_url: String,
    service_key: String,
    fetcher: HttpFetcher,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>, fetcher: HttpFetcher) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            service_key: service_key.into(),
            fetcher,
        }
    }

    fn table_url(&self, table_and_query: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table_and_query)
    }

    async fn request(
        &self,
        method: Method,
        table_and_query: &str,
        body: Option<&Value>,
        prefer: Option<&str>,
    ) -> Result<Value, StoreError> {
        let url = self.table_url(table_and_query);
        let bearer = format!("Bearer {}", self.service_key);
        let mut headers: Vec<(&str, &str)> = vec![
            ("apikey", self.service_key.as_str()),
            ("Authorization", bearer.as_str()),
        ];
        if let Some(prefer) = prefer {
            headers.push(("Prefer", prefer));
        }

        Ok(self
            .fetcher
            .json_request(method, &url, &headers, body, STORE_TIMEOUT)
            .await?)
    }

    async fn select_rows(&self, table_and_query: &str) -> Result<Value, StoreError> {
        self.request(Method::GET, table_and_query, None, None).await
    }

    fn rows<T: serde::de::DeserializeOwned>(value: Value) -> Result<Vec<T>, StoreError> {
        serde_json::from_value(value).map_err(|e| StoreError::Decode(e.to_string()))
    }

    fn first_row<T: serde::de::DeserializeOwned>(value: Value) -> Result<Option<T>, StoreError> {
        Ok(Self::rows::<T>(value)?.into_iter().next())
    }
}

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl BaseCentralStore for RestStore {
    async fn list_due_websites(&self, now: DateTime<Utc>) -> Result<Vec<Website>, StoreError> {
        let query = format!(
            "websites?is_active=eq.true&next_scheduled_at=lte.{}&select=*",
            ts(now)
        );
        Self::rows(self.select_rows(&query).await?)
    }

    async fn list_active_websites(&self) -> Result<Vec<Website>, StoreError> {
        Self::rows(self.select_rows("websites?is_active=eq.true&select=*").await?)
    }

    async fn get_website(&self, id: &str) -> Result<Option<Website>, StoreError> {
        let query = format!("websites?id=eq.{}&limit=1", id);
        Self::first_row(self.select_rows(&query).await?)
    }

    async fn get_api_keys(&self, website_id: &str) -> Result<Option<ApiKeys>, StoreError> {
        let query = format!("api_keys?website_id=eq.{}&limit=1", website_id);
        Self::first_row(self.select_rows(&query).await?)
    }

    async fn get_website_scan(&self, website_id: &str) -> Result<Option<WebsiteScan>, StoreError> {
        let query = format!("website_scans?website_id=eq.{}&limit=1", website_id);
        Self::first_row(self.select_rows(&query).await?)
    }

    async fn upsert_website_scan(&self, scan: &WebsiteScan) -> Result<(), StoreError> {
        let body = serde_json::to_value(scan).map_err(|e| StoreError::Decode(e.to_string()))?;
        self.request(
            Method::POST,
            "website_scans?on_conflict=website_id",
            Some(&body),
            Some("resolution=merge-duplicates"),
        )
        .await?;
        Ok(())
    }

    async fn set_scan_status(
        &self,
        website_id: &str,
        status: ScanStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        // Upsert rather than update: the first scan has no row yet.
        let body = json!({
            "website_id": website_id,
            "status": status,
            "error_message": error,
        });
        self.request(
            Method::POST,
            "website_scans?on_conflict=website_id",
            Some(&body),
            Some("resolution=merge-duplicates"),
        )
        .await?;
        Ok(())
    }

    async fn find_unused_topic(&self, website_id: &str) -> Result<Option<Topic>, StoreError> {
        let query = format!(
            "topics?website_id=eq.{}&is_used=eq.false&order=priority.desc&limit=1",
            website_id
        );
        Self::first_row(self.select_rows(&query).await?)
    }

    async fn find_reusable_topic(
        &self,
        website_id: &str,
        max_uses: i32,
    ) -> Result<Option<Topic>, StoreError> {
        let query = format!(
            "topics?website_id=eq.{}&times_used=lt.{}&order=priority.desc,times_used.asc&limit=1",
            website_id, max_uses
        );
        Self::first_row(self.select_rows(&query).await?)
    }

    async fn insert_topic(&self, topic: &NewTopic) -> Result<Topic, StoreError> {
        let body = serde_json::to_value(topic).map_err(|e| StoreError::Decode(e.to_string()))?;
        let value = self
            .request(
                Method::POST,
                "topics",
                Some(&body),
                Some("return=representation"),
            )
            .await?;
        Self::first_row(value)?
            .ok_or_else(|| StoreError::Decode("insert returned no row".to_string()))
    }

    async fn mark_topic_used(&self, topic: &Topic, max_uses: i32) -> Result<(), StoreError> {
        let next_uses = topic.times_used + 1;
        let query = format!(
            "topics?id=eq.{}&times_used=eq.{}",
            topic.id, topic.times_used
        );
        let body = json!({
            "times_used": next_uses,
            "is_used": next_uses >= max_uses,
            "used_at": ts(Utc::now()),
        });
        self.request(Method::PATCH, &query, Some(&body), None).await?;
        Ok(())
    }

    async fn create_generation_log(
        &self,
        website_id: &str,
        topic_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        let body = json!({
            "website_id": website_id,
            "topic_id": topic_id,
            "status": "generating",
            "started_at": ts(now),
        });
        let value = self
            .request(
                Method::POST,
                "generation_logs",
                Some(&body),
                Some("return=representation"),
            )
            .await?;
        let log: Option<GenerationLog> = Self::first_row(value)?;
        log.map(|l| l.id)
            .ok_or_else(|| StoreError::Decode("log insert returned no row".to_string()))
    }

    async fn finalize_generation_log(
        &self,
        log_id: &str,
        outcome: &LogOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let body = match outcome {
            LogOutcome::Success {
                article_title,
                article_slug,
                api_used,
                seo_score,
            } => json!({
                "status": "success",
                "completed_at": ts(now),
                "article_title": article_title,
                "article_slug": article_slug,
                "api_used": api_used,
                "seo_score": seo_score,
            }),
            LogOutcome::Failed { error_message } => json!({
                "status": "failed",
                "completed_at": ts(now),
                "error_message": error_message,
            }),
        };
        let query = format!("generation_logs?id=eq.{}", log_id);
        self.request(Method::PATCH, &query, Some(&body), None).await?;
        Ok(())
    }

    async fn sweep_stale_generation_logs(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let query = format!(
            "generation_logs?status=eq.generating&started_at=lt.{}",
            ts(cutoff)
        );
        let body = json!({
            "status": "failed",
            "completed_at": ts(now),
            "error_message": "timeout",
        });
        self.request(Method::PATCH, &query, Some(&body), None).await?;
        Ok(())
    }

    async fn update_website_after_run(
        &self,
        website_id: &str,
        update: &WebsiteRunUpdate,
    ) -> Result<(), StoreError> {
        let body = json!({
            "next_scheduled_at": ts(update.next_scheduled_at),
            "last_generated_at": ts(update.last_generated_at),
            "last_api_used": update.last_api_used,
            "format_history": update.format_history,
            "last_posting_hour": update.last_posting_hour,
        });
        let query = format!("websites?id=eq.{}", website_id);
        self.request(Method::PATCH, &query, Some(&body), None).await?;
        Ok(())
    }
}
