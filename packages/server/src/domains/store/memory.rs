//! In-memory central store.
//!
//! Mirrors the REST gateway's filter/order semantics for tests. Compiled
//! unconditionally so integration tests can drive the orchestrator without
//! a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::gateway::{BaseCentralStore, StoreError};
use super::types::{
    ApiKeys, GenerationLog, LogOutcome, LogStatus, NewTopic, ScanStatus, Topic, Website,
    WebsiteRunUpdate, WebsiteScan,
};

#[derive(Default)]
struct Inner {
    websites: Vec<Website>,
    api_keys: HashMap<String, ApiKeys>,
    topics: Vec<Topic>,
    scans: HashMap<String, WebsiteScan>,
    logs: Vec<GenerationLog>,
    next_id: u64,
}

/// In-memory implementation of the central store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store lock")
    }

    // -------------------------------------------------------------------------
    // Seeding
    // -------------------------------------------------------------------------

    pub fn add_website(&self, website: Website) {
        self.lock().websites.push(website);
    }

    pub fn add_api_keys(&self, keys: ApiKeys) {
        self.lock().api_keys.insert(keys.website_id.clone(), keys);
    }

    pub fn add_topic(&self, topic: Topic) {
        self.lock().topics.push(topic);
    }

    pub fn add_scan(&self, scan: WebsiteScan) {
        self.lock().scans.insert(scan.website_id.clone(), scan);
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub fn website(&self, id: &str) -> Option<Website> {
        self.lock().websites.iter().find(|w| w.id == id).cloned()
    }

    pub fn topic(&self, id: &str) -> Option<Topic> {
        self.lock().topics.iter().find(|t| t.id == id).cloned()
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.lock().topics.clone()
    }

    pub fn logs(&self) -> Vec<GenerationLog> {
        self.lock().logs.clone()
    }

    pub fn scan(&self, website_id: &str) -> Option<WebsiteScan> {
        self.lock().scans.get(website_id).cloned()
    }
}

#[async_trait]
impl BaseCentralStore for MemoryStore {
    async fn list_due_websites(&self, now: DateTime<Utc>) -> Result<Vec<Website>, StoreError> {
        Ok(self
            .lock()
            .websites
            .iter()
            .filter(|w| w.is_active && w.next_scheduled_at.is_some_and(|at| at <= now))
            .cloned()
            .collect())
    }

    async fn list_active_websites(&self) -> Result<Vec<Website>, StoreError> {
        Ok(self
            .lock()
            .websites
            .iter()
            .filter(|w| w.is_active)
            .cloned()
            .collect())
    }

    async fn get_website(&self, id: &str) -> Result<Option<Website>, StoreError> {
        Ok(self.website(id))
    }

    async fn get_api_keys(&self, website_id: &str) -> Result<Option<ApiKeys>, StoreError> {
        Ok(self.lock().api_keys.get(website_id).cloned())
    }

    async fn get_website_scan(&self, website_id: &str) -> Result<Option<WebsiteScan>, StoreError> {
        Ok(self.lock().scans.get(website_id).cloned())
    }

    async fn upsert_website_scan(&self, scan: &WebsiteScan) -> Result<(), StoreError> {
        self.lock()
            .scans
            .insert(scan.website_id.clone(), scan.clone());
        Ok(())
    }

    async fn set_scan_status(
        &self,
        website_id: &str,
        status: ScanStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let scan = inner
            .scans
            .entry(website_id.to_string())
            .or_insert_with(|| WebsiteScan::pending(website_id));
        scan.status = status;
        scan.error_message = error.map(String::from);
        Ok(())
    }

    async fn find_unused_topic(&self, website_id: &str) -> Result<Option<Topic>, StoreError> {
        let inner = self.lock();
        let mut candidates: Vec<&Topic> = inner
            .topics
            .iter()
            .filter(|t| t.website_id == website_id && !t.is_used)
            .collect();
        candidates.sort_by_key(|t| std::cmp::Reverse(t.priority));
        Ok(candidates.first().map(|t| (*t).clone()))
    }

    async fn find_reusable_topic(
        &self,
        website_id: &str,
        max_uses: i32,
    ) -> Result<Option<Topic>, StoreError> {
        let inner = self.lock();
        let mut candidates: Vec<&Topic> = inner
            .topics
            .iter()
            .filter(|t| t.website_id == website_id && t.times_used < max_uses)
            .collect();
        // Priority descending, then least-reused first
        candidates.sort_by_key(|t| (std::cmp::Reverse(t.priority), t.times_used));
        Ok(candidates.first().map(|t| (*t).clone()))
    }

    async fn insert_topic(&self, topic: &NewTopic) -> Result<Topic, StoreError> {
        let mut inner = self.lock();
        inner.next_id += 1;
        let inserted = Topic {
            id: format!("topic-{}", inner.next_id),
            website_id: topic.website_id.clone(),
            title: topic.title.clone(),
            keywords: topic.keywords.clone(),
            category: topic.category.clone(),
            priority: topic.priority,
            source: topic.source,
            is_used: false,
            times_used: 0,
            used_at: None,
            discovery_context: topic.discovery_context.clone(),
            format_hint: topic.format_hint.clone(),
            search_intent: topic.search_intent,
            timeliness: topic.timeliness,
            trending_reason: topic.trending_reason.clone(),
        };
        inner.topics.push(inserted.clone());
        Ok(inserted)
    }

    async fn mark_topic_used(&self, topic: &Topic, max_uses: i32) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(row) = inner.topics.iter_mut().find(|t| t.id == topic.id) {
            // CAS on the observed counter, like the REST PATCH filter
            if row.times_used == topic.times_used {
                row.times_used += 1;
                row.is_used = row.times_used >= max_uses;
                row.used_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn create_generation_log(
        &self,
        website_id: &str,
        topic_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = format!("log-{}", inner.next_id);
        inner.logs.push(GenerationLog {
            id: id.clone(),
            website_id: website_id.to_string(),
            topic_id: topic_id.to_string(),
            status: LogStatus::Generating,
            started_at: Some(now),
            completed_at: None,
            article_title: None,
            article_slug: None,
            api_used: None,
            seo_score: None,
            error_message: None,
        });
        Ok(id)
    }

    async fn finalize_generation_log(
        &self,
        log_id: &str,
        outcome: &LogOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(log) = inner.logs.iter_mut().find(|l| l.id == log_id) {
            log.completed_at = Some(now);
            match outcome {
                LogOutcome::Success {
                    article_title,
                    article_slug,
                    api_used,
                    seo_score,
                } => {
                    log.status = LogStatus::Success;
                    log.article_title = Some(article_title.clone());
                    log.article_slug = Some(article_slug.clone());
                    log.api_used = Some(*api_used);
                    log.seo_score = Some(*seo_score);
                }
                LogOutcome::Failed { error_message } => {
                    log.status = LogStatus::Failed;
                    log.error_message = Some(error_message.clone());
                }
            }
        }
        Ok(())
    }

    async fn sweep_stale_generation_logs(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        for log in inner.logs.iter_mut() {
            if log.status == LogStatus::Generating
                && log.started_at.is_some_and(|at| at < cutoff)
            {
                log.status = LogStatus::Failed;
                log.error_message = Some("timeout".to_string());
                log.completed_at = Some(now);
            }
        }
        Ok(())
    }

    async fn update_website_after_run(
        &self,
        website_id: &str,
        update: &WebsiteRunUpdate,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(website) = inner.websites.iter_mut().find(|w| w.id == website_id) {
            website.next_scheduled_at = Some(update.next_scheduled_at);
            website.last_generated_at = Some(update.last_generated_at);
            website.last_api_used = Some(update.last_api_used);
            website.format_history = update.format_history.clone();
            website.last_posting_hour = Some(update.last_posting_hour);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::catalog::{SearchIntent, Timeliness};
    use crate::domains::store::types::TopicSource;

    fn topic(id: &str, priority: i32, times_used: i32, is_used: bool) -> Topic {
        Topic {
            id: id.to_string(),
            website_id: "w1".to_string(),
            title: format!("Topic {}", id),
            keywords: vec!["kw".to_string()],
            category: None,
            priority,
            source: TopicSource::Manual,
            is_used,
            times_used,
            used_at: None,
            discovery_context: None,
            format_hint: None,
            search_intent: SearchIntent::Informational,
            timeliness: Timeliness::Evergreen,
            trending_reason: None,
        }
    }

    #[tokio::test]
    async fn test_unused_topic_prefers_priority() {
        let store = MemoryStore::new();
        store.add_topic(topic("a", 1, 0, false));
        store.add_topic(topic("b", 9, 0, false));
        store.add_topic(topic("c", 5, 0, false));

        let picked = store.find_unused_topic("w1").await.unwrap().unwrap();
        assert_eq!(picked.id, "b");
    }

    #[tokio::test]
    async fn test_reusable_topic_least_used_first_within_priority() {
        let store = MemoryStore::new();
        store.add_topic(topic("a", 5, 2, false));
        store.add_topic(topic("b", 5, 1, false));

        let picked = store.find_reusable_topic("w1", 3).await.unwrap().unwrap();
        assert_eq!(picked.id, "b");
    }

    #[tokio::test]
    async fn test_mark_topic_used_terminates_at_cap() {
        let store = MemoryStore::new();
        store.add_topic(topic("a", 5, 2, false));

        let observed = store.topic("a").unwrap();
        store.mark_topic_used(&observed, 3).await.unwrap();

        let after = store.topic("a").unwrap();
        assert_eq!(after.times_used, 3);
        assert!(after.is_used);
        assert!(after.used_at.is_some());
    }

    #[tokio::test]
    async fn test_mark_topic_used_is_noop_on_stale_counter() {
        let store = MemoryStore::new();
        store.add_topic(topic("a", 5, 0, false));

        let stale = {
            let mut t = store.topic("a").unwrap();
            t.times_used = 7;
            t
        };
        store.mark_topic_used(&stale, 10).await.unwrap();

        assert_eq!(store.topic("a").unwrap().times_used, 0);
    }
}
