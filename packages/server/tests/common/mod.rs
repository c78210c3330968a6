//! Shared fixtures for pipeline integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde_json::json;

use server_core::common::catalog::{SearchIntent, Timeliness};
use server_core::domains::publish::{MockArticleSink, Publisher, SinkError};
use server_core::domains::scan::WebsiteScanner;
use server_core::domains::schedule::Orchestrator;
use server_core::domains::store::types::{ApiKeys, Topic, TopicSource, Website};
use server_core::domains::store::MemoryStore;
use server_core::kernel::crypto;
use server_core::kernel::test_dependencies::{MockSearchService, ScriptedAiFactory};
use server_core::kernel::HttpFetcher;

pub fn encryption_key() -> String {
    BASE64.encode([9u8; 32])
}

/// An article body rich enough to parse and score.
pub fn article_html(title: &str) -> String {
    format!(
        "<h1>{title}</h1>\n<h2>Why it matters</h2>\n<p>{body}</p>\n\
         <h2>Step by step</h2>\n<ul><li>one</li><li>two</li><li>three</li></ul>\n\
         <h2>FAQ</h2>\n<p>Wax is a grip coating. It lasts 3 weeks.</p>",
        title = title,
        body = "Plenty of useful words in this paragraph about the craft. ".repeat(20),
    )
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub sink: Arc<MockArticleSink>,
    pub orchestrator: Orchestrator,
}

/// Orchestrator wired to in-memory store, scripted AI, and a mock sink.
pub fn harness(
    openai_response: Option<&str>,
    anthropic_response: Option<&str>,
    sink_responses: Vec<Result<(), SinkError>>,
) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(MockArticleSink::new(sink_responses));
    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(WebsiteScanner::new(HttpFetcher::new().unwrap())),
        Arc::new(MockSearchService::empty()),
        Publisher::new(sink.clone()),
        Arc::new(ScriptedAiFactory::new(openai_response, anthropic_response)),
        encryption_key(),
        None,
        None,
    );
    Harness {
        store,
        sink,
        orchestrator,
    }
}

pub fn website(overrides: serde_json::Value) -> Website {
    let mut base = json!({
        "id": "w1",
        "name": "Surf Report",
        "domain": "surf.example.com",
        "is_active": true,
        "schedule_mode": "fixed",
        "days_between_posts": 3,
        "preferred_time": "09:00",
        "max_topic_uses": 1,
        "enabled_formats": ["how_to_guide"],
        "next_scheduled_at": "2025-06-10T09:00:00Z"
    });
    if let (Some(base_map), Some(extra)) = (base.as_object_mut(), overrides.as_object()) {
        for (key, value) in extra {
            base_map.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(base).unwrap()
}

pub fn seed_api_keys(store: &MemoryStore, website_id: &str) {
    let key = encryption_key();
    store.add_api_keys(ApiKeys {
        website_id: website_id.to_string(),
        openai_key_encrypted: Some(crypto::encrypt("sk-openai-test", &key).unwrap()),
        anthropic_key_encrypted: Some(crypto::encrypt("sk-anthropic-test", &key).unwrap()),
        target_db_url: "https://tenant.example.com".to_string(),
        target_db_key_encrypted: Some(crypto::encrypt("svc-key", &key).unwrap()),
    });
}

pub fn seed_topic(store: &MemoryStore, id: &str, title: &str, times_used: i32, is_used: bool) {
    store.add_topic(Topic {
        id: id.to_string(),
        website_id: "w1".to_string(),
        title: title.to_string(),
        keywords: vec!["wax a surfboard".to_string()],
        category: Some("gear".to_string()),
        priority: 5,
        source: TopicSource::Manual,
        is_used,
        times_used,
        used_at: None,
        discovery_context: None,
        format_hint: None,
        search_intent: SearchIntent::Informational,
        timeliness: Timeliness::Evergreen,
        trending_reason: None,
    });
}

pub fn at(value: &str) -> DateTime<Utc> {
    value.parse().unwrap()
}
