//! Scheduler/orchestrator.
//!
//! The outer loop: find due websites, run each end-to-end (keys → topic →
//! generate → score → publish → log), and reschedule. A failure in one
//! website never aborts the tick, and a failed generate or publish leaves
//! the website's schedule, topic counters, and rotation state untouched.

pub mod next_run;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::Instrument;

use crate::domains::generate::{self, GeneratedArticle};
use crate::domains::publish::{PublishError, Publisher, TargetDb};
use crate::domains::scan::WebsiteScanner;
use crate::domains::seo::{self, ScoreInput};
use crate::domains::store::gateway::BaseCentralStore;
use crate::domains::store::types::{LogOutcome, Topic, Website, WebsiteRunUpdate};
use crate::domains::topics;
use crate::kernel::crypto;
use crate::kernel::providers::{choose_provider, AiPurpose, BaseAiFactory, Provider};
use crate::kernel::search::BaseSearchService;

pub use next_run::next_run_at;

/// A `generating` log older than this is treated as abandoned.
const STALE_LOG_MINUTES: i64 = 15;

/// Bound on the stored format history.
const FORMAT_HISTORY_LIMIT: usize = 10;

/// Outcome of one website run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Published {
        title: String,
        slug: String,
        provider: Provider,
        seo_score: u32,
    },
    NoTopic,
    /// Another run already holds this website's lease.
    Busy,
    Failed {
        reason: String,
    },
}

/// Decrypted per-run credentials.
struct RunKeys {
    openai: Option<String>,
    anthropic: Option<String>,
    target: TargetDb,
}

/// Drives the content pipeline for every website the platform manages.
pub struct Orchestrator {
    store: Arc<dyn BaseCentralStore>,
    scanner: Arc<WebsiteScanner>,
    search: Arc<dyn BaseSearchService>,
    publisher: Publisher,
    ai_factory: Arc<dyn BaseAiFactory>,
    encryption_key: String,
    platform_openai_key: Option<String>,
    platform_anthropic_key: Option<String>,
    /// Per-website leases: at most one in-flight run per website.
    in_flight: Mutex<HashSet<String>>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn BaseCentralStore>,
        scanner: Arc<WebsiteScanner>,
        search: Arc<dyn BaseSearchService>,
        publisher: Publisher,
        ai_factory: Arc<dyn BaseAiFactory>,
        encryption_key: String,
        platform_openai_key: Option<String>,
        platform_anthropic_key: Option<String>,
    ) -> Self {
        Self {
            store,
            scanner,
            search,
            publisher,
            ai_factory,
            encryption_key,
            platform_openai_key,
            platform_anthropic_key,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn BaseCentralStore> {
        &self.store
    }

    pub fn scanner(&self) -> &Arc<WebsiteScanner> {
        &self.scanner
    }

    pub fn search(&self) -> &Arc<dyn BaseSearchService> {
        &self.search
    }

    /// Run every due website once. Returns how many published successfully.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<usize> {
        // Abandoned logs from cancelled runs must not block progress.
        let cutoff = now - ChronoDuration::minutes(STALE_LOG_MINUTES);
        if let Err(e) = self.store.sweep_stale_generation_logs(cutoff, now).await {
            tracing::warn!(error = %e, "Stale log sweep failed");
        }

        let websites = self
            .store
            .list_due_websites(now)
            .await
            .context("Failed to list due websites")?;
        if websites.is_empty() {
            tracing::debug!("No websites due");
            return Ok(0);
        }
        tracing::info!(due = websites.len(), "Processing due websites");

        let mut published = 0;
        for website in &websites {
            match self.run_website(website, now).await {
                RunOutcome::Published { slug, .. } => {
                    tracing::info!(website = %website.id, slug = %slug, "Website processed");
                    published += 1;
                }
                RunOutcome::NoTopic => {
                    tracing::info!(website = %website.id, "No topic available, skipping");
                }
                RunOutcome::Busy => {
                    tracing::warn!(website = %website.id, "Run already in flight, skipping");
                }
                RunOutcome::Failed { reason } => {
                    tracing::error!(website = %website.id, reason = %reason, "Website run failed");
                }
            }
        }
        Ok(published)
    }

    /// Run a single website end-to-end, honoring the per-website lease.
    pub async fn run_website(&self, website: &Website, now: DateTime<Utc>) -> RunOutcome {
        let Some(_lease) = self.acquire_lease(&website.id) else {
            return RunOutcome::Busy;
        };

        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("website_run", website = %website.id, run_id = %run_id);

        async {
            match self.process_website(website, now).await {
                Ok(outcome) => outcome,
                Err(e) => RunOutcome::Failed {
                    reason: format!("{:#}", e),
                },
            }
        }
        .instrument(span)
        .await
    }

    async fn process_website(&self, website: &Website, now: DateTime<Utc>) -> Result<RunOutcome> {
        // (a) keys
        let keys = match self.load_keys(website).await? {
            Some(keys) => keys,
            None => {
                return Ok(RunOutcome::Failed {
                    reason: "Target database credentials unavailable".to_string(),
                })
            }
        };

        // (b) topic
        let topic_ai = self.make_ai(website, &keys, AiPurpose::Topics);
        let topic = topics::next_topic(
            self.store.as_ref(),
            &self.scanner,
            website,
            topic_ai.as_deref(),
            now,
        )
        .await?;
        let Some(topic) = topic else {
            // A site with no work stays due; the next tick retries.
            return Ok(RunOutcome::NoTopic);
        };

        // (c) log record for this attempt
        let log_id = self
            .store
            .create_generation_log(&website.id, &topic.id, now)
            .await?;

        // (d)-(e) provider pick, generation, cross-provider fallback
        let (article, provider) = match self.generate_article(website, &topic, &keys).await {
            Ok(result) => result,
            Err(reason) => {
                self.finalize_failed(&log_id, &reason, now).await;
                return Ok(RunOutcome::Failed { reason });
            }
        };

        // (f)-(g) scoring
        let seo = seo::score(&ScoreInput {
            title: &article.title,
            content: &article.content,
            meta_description: &article.meta_description,
            primary_keyword: &article.primary_keyword,
        });

        // (h) publish
        if let Err(e) = self
            .publisher
            .publish(&article, website, &seo, &keys.target, now)
            .await
        {
            log_publish_error(&website.id, &e);
            self.finalize_failed(&log_id, "Failed to save article", now)
                .await;
            return Ok(RunOutcome::Failed {
                reason: format!("Failed to save article: {}", e),
            });
        }

        // (i) success log, (j) topic usage, (k)-(l) reschedule, in order
        self.store
            .finalize_generation_log(
                &log_id,
                &LogOutcome::Success {
                    article_title: article.title.clone(),
                    article_slug: article.slug.clone(),
                    api_used: provider,
                    seo_score: seo.score as i32,
                },
                now,
            )
            .await?;

        self.store
            .mark_topic_used(&topic, website.max_topic_uses)
            .await?;

        let next_run = {
            let mut rng = rand::thread_rng();
            next_run_at(website, now, &mut rng)
        };
        let update = WebsiteRunUpdate {
            next_scheduled_at: next_run,
            last_generated_at: now,
            last_api_used: provider,
            format_history: appended_history(&website.format_history, &article.format_key),
            last_posting_hour: now.hour(),
        };
        self.store
            .update_website_after_run(&website.id, &update)
            .await?;

        Ok(RunOutcome::Published {
            title: article.title,
            slug: article.slug,
            provider,
            seo_score: seo.score,
        })
    }

    /// Generate on the routed provider; on failure, try the other provider
    /// once. The provider recorded is the one that actually produced output.
    async fn generate_article(
        &self,
        website: &Website,
        topic: &Topic,
        keys: &RunKeys,
    ) -> std::result::Result<(GeneratedArticle, Provider), String> {
        let Some(primary) = choose_provider(
            website.api_rotation_mode,
            website.last_api_used,
            keys.openai.as_deref(),
            keys.anthropic.as_deref(),
        ) else {
            return Err("No LLM provider key available".to_string());
        };

        let format = {
            let mut rng = rand::thread_rng();
            generate::select_format(website, &mut rng)
        };

        let Some(primary_key) = self.key_for(primary, keys) else {
            return Err("No LLM provider key available".to_string());
        };
        let ai = self
            .ai_factory
            .create(primary, &primary_key, AiPurpose::Article);
        match generate::generate(topic, website, format, primary, ai.as_ref()).await {
            Ok(article) => return Ok((article, primary)),
            Err(e) => {
                tracing::warn!(
                    provider = primary.as_str(),
                    error = %e,
                    "Generation failed on primary provider"
                );
            }
        }

        let fallback = primary.other();
        let Some(fallback_key) = self.key_for(fallback, keys) else {
            return Err("Content generation failed (both APIs)".to_string());
        };
        let ai = self
            .ai_factory
            .create(fallback, &fallback_key, AiPurpose::Article);
        match generate::generate(topic, website, format, fallback, ai.as_ref()).await {
            Ok(article) => Ok((article, fallback)),
            Err(e) => {
                tracing::warn!(
                    provider = fallback.as_str(),
                    error = %e,
                    "Generation failed on fallback provider"
                );
                Err("Content generation failed (both APIs)".to_string())
            }
        }
    }

    fn key_for(&self, provider: Provider, keys: &RunKeys) -> Option<String> {
        match provider {
            Provider::Openai => keys.openai.clone(),
            Provider::Anthropic => keys.anthropic.clone(),
        }
    }

    /// Build the per-run AI seam, or None when no key fits the rotation mode.
    fn make_ai(
        &self,
        website: &Website,
        keys: &RunKeys,
        purpose: AiPurpose,
    ) -> Option<Box<dyn crate::kernel::providers::BaseAi>> {
        let provider = choose_provider(
            website.api_rotation_mode,
            website.last_api_used,
            keys.openai.as_deref(),
            keys.anthropic.as_deref(),
        )?;
        let key = self.key_for(provider, keys)?;
        Some(self.ai_factory.create(provider, &key, purpose))
    }

    /// Load and decrypt credentials. LLM keys fall back to the platform-wide
    /// keys; a missing or undecryptable target key aborts the website.
    async fn load_keys(&self, website: &Website) -> Result<Option<RunKeys>> {
        let row = self.store.get_api_keys(&website.id).await?;

        let mut openai = self.platform_openai_key.clone();
        let mut anthropic = self.platform_anthropic_key.clone();
        let mut target: Option<TargetDb> = None;

        if let Some(row) = row {
            if let Some(sealed) = row.openai_key_encrypted.as_deref() {
                match crypto::decrypt(sealed, &self.encryption_key) {
                    Ok(key) => openai = Some(key),
                    Err(e) => {
                        tracing::warn!(website = %website.id, error = %e, "OpenAI key decrypt failed, using platform key");
                    }
                }
            }
            if let Some(sealed) = row.anthropic_key_encrypted.as_deref() {
                match crypto::decrypt(sealed, &self.encryption_key) {
                    Ok(key) => anthropic = Some(key),
                    Err(e) => {
                        tracing::warn!(website = %website.id, error = %e, "Anthropic key decrypt failed, using platform key");
                    }
                }
            }
            if !row.target_db_url.is_empty() {
                if let Some(sealed) = row.target_db_key_encrypted.as_deref() {
                    match crypto::decrypt(sealed, &self.encryption_key) {
                        Ok(service_key) => {
                            target = Some(TargetDb {
                                base_url: row.target_db_url.clone(),
                                service_key,
                            });
                        }
                        Err(e) => {
                            tracing::error!(website = %website.id, error = %e, "Target key decrypt failed");
                        }
                    }
                }
            }
        }

        let Some(target) = target else {
            return Ok(None);
        };
        Ok(Some(RunKeys {
            openai,
            anthropic,
            target,
        }))
    }

    async fn finalize_failed(&self, log_id: &str, reason: &str, now: DateTime<Utc>) {
        let outcome = LogOutcome::Failed {
            error_message: reason.to_string(),
        };
        if let Err(e) = self
            .store
            .finalize_generation_log(log_id, &outcome, now)
            .await
        {
            tracing::error!(log_id = %log_id, error = %e, "Failed to finalize log");
        }
    }

    fn acquire_lease(&self, website_id: &str) -> Option<Lease<'_>> {
        let mut in_flight = self.in_flight.lock().expect("lease lock");
        if !in_flight.insert(website_id.to_string()) {
            return None;
        }
        Some(Lease {
            set: &self.in_flight,
            id: website_id.to_string(),
        })
    }
}

struct Lease<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.set.lock().expect("lease lock").remove(&self.id);
    }
}

fn appended_history(history: &[String], format_key: &str) -> Vec<String> {
    let mut out: Vec<String> = history.to_vec();
    out.push(format_key.to_string());
    if out.len() > FORMAT_HISTORY_LIMIT {
        let drop = out.len() - FORMAT_HISTORY_LIMIT;
        out.drain(..drop);
    }
    out
}

fn log_publish_error(website_id: &str, error: &PublishError) {
    match error {
        PublishError::RequiredColumn(column) => {
            tracing::error!(website = %website_id, column = %column, "Tenant schema rejected a required column");
        }
        PublishError::SchemaAdaptationExhausted(retries) => {
            tracing::error!(website = %website_id, retries, "Schema adaptation exhausted");
        }
        other => {
            tracing::error!(website = %website_id, error = %other, "Publish failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appended_history_trims_to_ten() {
        let history: Vec<String> = (0..10).map(|i| format!("f{}", i)).collect();
        let out = appended_history(&history, "new");
        assert_eq!(out.len(), 10);
        assert_eq!(out.last().unwrap(), "new");
        assert_eq!(out.first().unwrap(), "f1");
    }

    #[test]
    fn test_appended_history_short() {
        let out = appended_history(&["a".to_string()], "b");
        assert_eq!(out, vec!["a".to_string(), "b".to_string()]);
    }
}
