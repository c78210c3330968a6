//! End-to-end orchestrator scenarios against the in-memory store.

mod common;

use common::*;
use serde_json::json;

use server_core::domains::publish::SinkError;
use server_core::domains::schedule::RunOutcome;
use server_core::domains::store::types::LogStatus;
use server_core::kernel::providers::Provider;

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
async fn test_fixed_schedule_happy_path() {
    let html = article_html("How to Wax a Surfboard");
    let h = harness(Some(&html), Some(&html), Vec::new());
    h.store.add_website(website(json!({})));
    seed_api_keys(&h.store, "w1");
    seed_topic(&h.store, "t1", "How to Wax a Surfboard", 0, false);

    let now = at("2025-06-10T09:00:00Z");
    let processed = h.orchestrator.tick(now).await.unwrap();
    assert_eq!(processed, 1);

    // Article landed in the tenant store
    let payloads = h.sink.payloads();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["slug"], "how-to-wax-a-surfboard");
    assert_eq!(payloads[0]["status"], "published");

    // Log finalized as success
    let logs = h.store.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Success);
    assert_eq!(logs[0].article_slug.as_deref(), Some("how-to-wax-a-surfboard"));
    assert!(logs[0].seo_score.is_some());

    // Topic terminated at max_uses = 1
    let topic = h.store.topic("t1").unwrap();
    assert_eq!(topic.times_used, 1);
    assert!(topic.is_used);

    // Schedule advanced to the preferred time three days out
    let site = h.store.website("w1").unwrap();
    assert_eq!(
        site.next_scheduled_at.unwrap(),
        at("2025-06-13T09:00:00Z")
    );
    assert_eq!(site.last_posting_hour, Some(9));
    assert_eq!(site.format_history, vec!["how_to_guide".to_string()]);
    assert!(site.last_api_used.is_some());
}

#[tokio::test]
async fn test_schema_adaptive_publish() {
    let html = article_html("How to Wax a Surfboard");
    let h = harness(
        Some(&html),
        Some(&html),
        vec![
            Err(unknown_column("geo_optimized")),
            Err(unknown_column("seo_score")),
        ],
    );
    h.store.add_website(website(json!({})));
    seed_api_keys(&h.store, "w1");
    seed_topic(&h.store, "t1", "How to Wax a Surfboard", 0, false);

    let processed = h.orchestrator.tick(at("2025-06-10T09:00:00Z")).await.unwrap();
    assert_eq!(processed, 1);

    let payloads = h.sink.payloads();
    assert_eq!(payloads.len(), 3);
    assert!(payloads[1].get("geo_optimized").is_none());
    assert!(payloads[2].get("geo_optimized").is_none());
    assert!(payloads[2].get("seo_score").is_none());
    // Everything else still shipped
    assert_eq!(payloads[2]["slug"], "how-to-wax-a-surfboard");
    assert!(payloads[2].get("excerpt").is_some());

    assert_eq!(h.store.logs()[0].status, LogStatus::Success);
}

#[tokio::test]
async fn test_provider_fallback_records_fallback_provider() {
    let html = article_html("How to Wax a Surfboard");
    // OpenAI scripted to fail; Anthropic succeeds. last_api_used=anthropic
    // makes rotate pick OpenAI first.
    let h = harness(None, Some(&html), Vec::new());
    h.store.add_website(website(json!({
        "api_rotation_mode": "rotate",
        "last_api_used": "anthropic"
    })));
    seed_api_keys(&h.store, "w1");
    seed_topic(&h.store, "t1", "How to Wax a Surfboard", 0, false);

    let processed = h.orchestrator.tick(at("2025-06-10T09:00:00Z")).await.unwrap();
    assert_eq!(processed, 1);

    let logs = h.store.logs();
    assert_eq!(logs[0].api_used, Some(Provider::Anthropic));
    let site = h.store.website("w1").unwrap();
    assert_eq!(site.last_api_used, Some(Provider::Anthropic));
}

#[tokio::test]
async fn test_reuse_with_cap_then_exhaustion() {
    let html = article_html("How to Wax a Surfboard");
    let h = harness(Some(&html), Some(&html), Vec::new());
    h.store.add_website(website(json!({ "max_topic_uses": 2 })));
    seed_api_keys(&h.store, "w1");
    seed_topic(&h.store, "t1", "How to Wax a Surfboard", 1, false);

    let now = at("2025-06-10T09:00:00Z");
    let processed = h.orchestrator.tick(now).await.unwrap();
    assert_eq!(processed, 1);

    let topic = h.store.topic("t1").unwrap();
    assert_eq!(topic.times_used, 2);
    assert!(topic.is_used);

    // Second run: no topics left, auto-generate off. Nothing changes.
    let site_before = h.store.website("w1").unwrap();
    let outcome = h
        .orchestrator
        .run_website(&site_before, at("2025-06-14T09:00:00Z"))
        .await;
    assert!(matches!(outcome, RunOutcome::NoTopic));

    let site_after = h.store.website("w1").unwrap();
    assert_eq!(site_after.next_scheduled_at, site_before.next_scheduled_at);
    assert_eq!(h.store.logs().len(), 1);
}

#[tokio::test]
async fn test_failed_publish_leaves_state_untouched() {
    let html = article_html("How to Wax a Surfboard");
    let h = harness(
        Some(&html),
        Some(&html),
        vec![Err(SinkError::Rejected {
            status: 500,
            body: "internal error".to_string(),
        })],
    );
    h.store.add_website(website(json!({})));
    seed_api_keys(&h.store, "w1");
    seed_topic(&h.store, "t1", "How to Wax a Surfboard", 0, false);

    let processed = h.orchestrator.tick(at("2025-06-10T09:00:00Z")).await.unwrap();
    assert_eq!(processed, 0);

    // Log failed with the publish message
    let logs = h.store.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Failed);
    assert_eq!(logs[0].error_message.as_deref(), Some("Failed to save article"));

    // Topic and schedule untouched
    let topic = h.store.topic("t1").unwrap();
    assert_eq!(topic.times_used, 0);
    assert!(!topic.is_used);
    let site = h.store.website("w1").unwrap();
    assert_eq!(site.next_scheduled_at.unwrap(), at("2025-06-10T09:00:00Z"));
    assert!(site.last_api_used.is_none());
    assert!(site.format_history.is_empty());
}

#[tokio::test]
async fn test_generation_failure_on_both_providers() {
    let h = harness(None, None, Vec::new());
    h.store.add_website(website(json!({})));
    seed_api_keys(&h.store, "w1");
    seed_topic(&h.store, "t1", "How to Wax a Surfboard", 0, false);

    let processed = h.orchestrator.tick(at("2025-06-10T09:00:00Z")).await.unwrap();
    assert_eq!(processed, 0);

    let logs = h.store.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Failed);
    assert_eq!(
        logs[0].error_message.as_deref(),
        Some("Content generation failed (both APIs)")
    );

    let site = h.store.website("w1").unwrap();
    assert_eq!(site.next_scheduled_at.unwrap(), at("2025-06-10T09:00:00Z"));
    assert!(h.sink.payloads().is_empty());
}

#[tokio::test]
async fn test_logs_created_only_for_sites_with_topics() {
    let html = article_html("How to Wax a Surfboard");
    let h = harness(Some(&html), Some(&html), Vec::new());
    // w1 has a topic, w2 does not
    h.store.add_website(website(json!({})));
    h.store.add_website(website(json!({ "id": "w2", "name": "Empty Site" })));
    seed_api_keys(&h.store, "w1");
    seed_api_keys(&h.store, "w2");
    seed_topic(&h.store, "t1", "How to Wax a Surfboard", 0, false);

    let processed = h.orchestrator.tick(at("2025-06-10T09:00:00Z")).await.unwrap();
    assert_eq!(processed, 1);
    assert_eq!(h.store.logs().len(), 1);
    assert_eq!(h.store.logs()[0].website_id, "w1");
}

#[tokio::test]
async fn test_missing_target_key_aborts_without_log() {
    let html = article_html("How to Wax a Surfboard");
    let h = harness(Some(&html), Some(&html), Vec::new());
    h.store.add_website(website(json!({})));
    // No api_keys row at all
    seed_topic(&h.store, "t1", "How to Wax a Surfboard", 0, false);

    let processed = h.orchestrator.tick(at("2025-06-10T09:00:00Z")).await.unwrap();
    assert_eq!(processed, 0);
    assert!(h.store.logs().is_empty());
    assert!(h.sink.payloads().is_empty());
}

#[tokio::test]
async fn test_format_history_is_bounded() {
    let html = article_html("How to Wax a Surfboard");
    let h = harness(Some(&html), Some(&html), Vec::new());
    let history: Vec<String> = (0..10).map(|_| "listicle".to_string()).collect();
    h.store.add_website(website(json!({ "format_history": history })));
    seed_api_keys(&h.store, "w1");
    seed_topic(&h.store, "t1", "How to Wax a Surfboard", 0, false);

    h.orchestrator.tick(at("2025-06-10T09:00:00Z")).await.unwrap();

    let site = h.store.website("w1").unwrap();
    assert_eq!(site.format_history.len(), 10);
    assert_eq!(site.format_history.last().unwrap(), "how_to_guide");
}
