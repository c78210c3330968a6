//! Topic engine.
//!
//! Selection follows a strict order: unused topics by priority, then
//! reusable topics (least-reused first within a priority), and finally a
//! freshly minted AI topic when the website allows it. Bulk discovery combines
//! Google search results filtered against the site's scan profile with AI
//! suggestions validated against the catalog.

use anyhow::Result;
use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;
use serde_json::json;
use std::fmt::Write;

use crate::common::catalog::{
    classify_intent, format_by_key, seasonal_themes, SearchIntent, Timeliness,
};
use crate::domains::scan::WebsiteScanner;
use crate::domains::store::gateway::BaseCentralStore;
use crate::domains::store::types::{NewTopic, Topic, TopicSource, Website, WebsiteScan};
use crate::kernel::llm_request::LlmRequest;
use crate::kernel::providers::BaseAi;
use crate::kernel::search::BaseSearchService;

/// Query-building caps for Google discovery.
const QUERY_KEYWORDS: usize = 5;
const QUERY_THEMES: usize = 3;
const MAX_QUERIES_BUILT: usize = 10;
const MAX_QUERIES_EXECUTED: usize = 5;
const MAX_GOOGLE_TOPICS: usize = 10;
const RESULTS_PER_QUERY: usize = 5;

/// Default number of AI-suggested topics per discovery run.
pub const DEFAULT_DISCOVERY_COUNT: usize = 5;

/// A topic suggestion as the model returns it, before validation.
#[derive(Debug, Deserialize)]
struct SuggestedTopic {
    title: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    priority: Option<i32>,
    #[serde(default)]
    search_intent: Option<String>,
    #[serde(default)]
    timeliness: Option<String>,
    #[serde(default)]
    format_hint: Option<String>,
    #[serde(default)]
    trending_reason: Option<String>,
}

// =============================================================================
// Selection
// =============================================================================

/// Pick the next topic for a due run.
pub async fn next_topic(
    store: &dyn BaseCentralStore,
    scanner: &WebsiteScanner,
    website: &Website,
    ai: Option<&dyn BaseAi>,
    now: DateTime<Utc>,
) -> Result<Option<Topic>> {
    if let Some(topic) = store.find_unused_topic(&website.id).await? {
        tracing::debug!(website = %website.id, topic = %topic.title, "Using unused topic");
        return Ok(Some(topic));
    }

    if website.max_topic_uses > 1 {
        if let Some(topic) = store
            .find_reusable_topic(&website.id, website.max_topic_uses)
            .await?
        {
            tracing::debug!(
                website = %website.id,
                topic = %topic.title,
                times_used = topic.times_used,
                "Reusing topic"
            );
            return Ok(Some(topic));
        }
    }

    if website.auto_generate_topics {
        if let Some(ai) = ai {
            let scan = scanner.ensure_scan(website, store, Some(ai), now).await?;
            if let Some(topic) = mint_topic(store, website, scan.as_ref(), ai).await? {
                tracing::info!(website = %website.id, topic = %topic.title, "Minted topic");
                return Ok(Some(topic));
            }
        }
    }

    Ok(None)
}

/// Mint a single topic from the scan context and persist it.
async fn mint_topic(
    store: &dyn BaseCentralStore,
    website: &Website,
    scan: Option<&WebsiteScan>,
    ai: &dyn BaseAi,
) -> Result<Option<Topic>> {
    let suggestions = suggest_topics(website, scan, ai, 1).await?;
    let Some(suggestion) = suggestions.into_iter().next() else {
        return Ok(None);
    };

    let themes: Vec<String> = scan.map(|s| s.content_themes.clone()).unwrap_or_default();
    let mut new_topic = validate_suggestion(suggestion, website);
    new_topic.source = TopicSource::AiGenerated;
    new_topic.discovery_context = Some(json!({ "scan_themes": themes }));

    Ok(Some(store.insert_topic(&new_topic).await?))
}

// =============================================================================
// Bulk discovery
// =============================================================================

/// Discover topics for a website: Google search candidates filtered against
/// the scan profile, plus validated AI suggestions.
pub async fn discover_topics(
    store: &dyn BaseCentralStore,
    scanner: &WebsiteScanner,
    search: &dyn BaseSearchService,
    website: &Website,
    ai: Option<&dyn BaseAi>,
    count: usize,
    now: DateTime<Utc>,
) -> Result<Vec<Topic>> {
    let scan = scanner.ensure_scan(website, store, ai, now).await?;
    let mut discovered = Vec::new();

    if website.google_search_enabled {
        if let Some(scan) = scan.as_ref() {
            let candidates = google_candidates(search, website, scan).await?;
            for candidate in candidates {
                discovered.push(store.insert_topic(&candidate).await?);
            }
        }
    }

    if let Some(ai) = ai {
        let suggestions = suggest_topics(website, scan.as_ref(), ai, count).await?;
        for suggestion in suggestions {
            let mut new_topic = validate_suggestion(suggestion, website);
            new_topic.source = TopicSource::AiSuggested;
            discovered.push(store.insert_topic(&new_topic).await?);
        }
    }

    tracing::info!(
        website = %website.id,
        discovered = discovered.len(),
        "Topic discovery finished"
    );
    Ok(discovered)
}

async fn google_candidates(
    search: &dyn BaseSearchService,
    website: &Website,
    scan: &WebsiteScan,
) -> Result<Vec<NewTopic>> {
    // Candidates must overlap the scan's themes; without themes there is
    // nothing to match against, so no search candidates are produced.
    let relevance = &scan.content_themes;
    if relevance.is_empty() {
        tracing::debug!(website = %website.id, "Scan has no themes, skipping search candidates");
        return Ok(Vec::new());
    }

    let queries = build_queries(scan);
    let mut candidates: Vec<NewTopic> = Vec::new();

    for query in queries.iter().take(MAX_QUERIES_EXECUTED) {
        let results = match search
            .search(query, &website.language, RESULTS_PER_QUERY)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Search query failed");
                continue;
            }
        };

        for result in results {
            if candidates.len() >= MAX_GOOGLE_TOPICS {
                return Ok(candidates);
            }
            let keywords =
                matching_keywords(&format!("{} {}", result.title, result.snippet), relevance);
            if keywords.is_empty() {
                continue;
            }
            if candidates
                .iter()
                .any(|c| c.title.eq_ignore_ascii_case(&result.title))
            {
                continue;
            }
            candidates.push(NewTopic {
                website_id: website.id.clone(),
                title: result.title.clone(),
                keywords,
                category: None,
                priority: 5,
                source: TopicSource::GoogleSearch,
                discovery_context: Some(json!({
                    "query": query,
                    "link": result.link,
                    "snippet": result.snippet,
                })),
                format_hint: None,
                search_intent: classify_intent(&result.title),
                timeliness: Timeliness::Trending,
                trending_reason: Some(format!("Surfaced by search for \"{}\"", query)),
            });
        }
    }

    Ok(candidates)
}

/// Two templates per top keyword plus one per top theme, capped at 10.
fn build_queries(scan: &WebsiteScan) -> Vec<String> {
    let year = Utc::now().year();
    let mut queries = Vec::new();

    for keyword in scan.main_keywords.iter().take(QUERY_KEYWORDS) {
        queries.push(format!("{} guide", keyword));
        queries.push(format!("{} tips {}", keyword, year));
    }
    for theme in scan.content_themes.iter().take(QUERY_THEMES) {
        queries.push(format!("{} trends {}", theme, year));
    }

    queries.truncate(MAX_QUERIES_BUILT);
    queries
}

/// Relevance-pool entries that appear in the result text become the
/// candidate's keywords; an empty match set disqualifies the result.
fn matching_keywords(text: &str, relevance: &[String]) -> Vec<String> {
    let lowered = text.to_lowercase();
    relevance
        .iter()
        .filter(|entry| lowered.contains(&entry.to_lowercase()))
        .take(5)
        .cloned()
        .collect()
}

// =============================================================================
// AI suggestions
// =============================================================================

async fn suggest_topics(
    website: &Website,
    scan: Option<&WebsiteScan>,
    ai: &dyn BaseAi,
    count: usize,
) -> Result<Vec<SuggestedTopic>> {
    let prompt = build_suggestion_prompt(website, scan, count);

    let suggestions: Vec<SuggestedTopic> = LlmRequest::new(ai)
        .system("You plan editorial calendars for niche websites.")
        .user(prompt)
        .schema_hint(
            r#"[{"title": "...", "keywords": ["..."], "category": "...", "priority": 5, "search_intent": "informational", "timeliness": "evergreen", "format_hint": "how_to_guide", "trending_reason": null}]"#,
        )
        .max_retries(2)
        .output()
        .await?;

    Ok(suggestions.into_iter().take(count).collect())
}

fn build_suggestion_prompt(website: &Website, scan: Option<&WebsiteScan>, count: usize) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Propose {count} article topics for the website {name} ({domain}), \
         written in {language}.",
        count = count,
        name = website.name,
        domain = website.domain,
        language = website.language,
    );

    if let Some(scan) = scan {
        if let Some(niche) = scan.niche_description.as_deref() {
            let _ = writeln!(prompt, "Niche: {}", niche);
        }
        if !scan.content_themes.is_empty() {
            let _ = writeln!(prompt, "Content themes: {}", scan.content_themes.join(", "));
        }
        if !scan.headings.is_empty() {
            let sample: Vec<&str> = scan.headings.iter().take(10).map(String::as_str).collect();
            let _ = writeln!(prompt, "Sample headings from the site: {}", sample.join("; "));
        }
    }

    let month = Utc::now().month();
    let _ = writeln!(
        prompt,
        "Seasonal angles for this month: {}.",
        seasonal_themes(month).join(", ")
    );

    let _ = writeln!(
        prompt,
        "Return a JSON array. Each topic needs: title, keywords (3-5, primary \
         first), category, priority (1-10), search_intent (informational | \
         commercial | transactional | navigational), timeliness (evergreen | \
         seasonal | news | trending), format_hint (one of: listicle, \
         how_to_guide, deep_dive, comparison, case_study, qa_format, \
         news_commentary, ultimate_guide) and trending_reason (null unless \
         timeliness is trending)."
    );

    prompt
}

/// Validate a model suggestion: bad intents fall back to the classifier,
/// bad timeliness to evergreen, and unknown format hints are dropped.
fn validate_suggestion(suggestion: SuggestedTopic, website: &Website) -> NewTopic {
    let search_intent = suggestion
        .search_intent
        .as_deref()
        .and_then(SearchIntent::parse)
        .unwrap_or_else(|| classify_intent(&suggestion.title));

    let timeliness = suggestion
        .timeliness
        .as_deref()
        .and_then(Timeliness::parse)
        .unwrap_or_default();

    let format_hint = suggestion
        .format_hint
        .filter(|hint| format_by_key(hint).is_some());

    NewTopic {
        website_id: website.id.clone(),
        title: suggestion.title,
        keywords: suggestion.keywords,
        category: suggestion.category,
        priority: suggestion.priority.unwrap_or(5).clamp(1, 10),
        source: TopicSource::AiSuggested,
        discovery_context: None,
        format_hint,
        search_intent,
        timeliness,
        trending_reason: suggestion.trending_reason,
    }
}
