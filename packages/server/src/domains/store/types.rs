//! Central store records.
//!
//! Wire representation is JSON (the coordination database speaks REST).
//! Every field beyond the identifiers carries a serde default so partially
//! configured rows still load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::catalog::{HumanElements, SearchIntent, Timeliness};
use crate::kernel::providers::{Provider, RotationMode};

// =============================================================================
// Website
// =============================================================================

/// Scheduling mode for a website.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    Fixed,
    #[default]
    Window,
    Random,
}

/// A tenant configuration. Created externally; the pipeline reads it and
/// updates only the scheduling and rotation fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Website {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub is_active: bool,

    // Scheduling policy
    #[serde(default)]
    pub schedule_mode: ScheduleMode,
    #[serde(default = "default_min_hours")]
    pub min_hours_between_posts: i64,
    #[serde(default = "default_max_hours")]
    pub max_hours_between_posts: i64,
    /// Preferred weekdays, 0 = Monday .. 6 = Sunday. Empty = any day.
    #[serde(default)]
    pub preferred_days: Vec<u32>,
    #[serde(default = "default_window_start")]
    pub posting_window_start: u32,
    #[serde(default = "default_window_end")]
    pub posting_window_end: u32,
    #[serde(default)]
    pub last_posting_hour: Option<u32>,
    #[serde(default = "default_days_between")]
    pub days_between_posts: i64,
    /// Preferred time of day in fixed mode, "HH:MM"
    #[serde(default = "default_preferred_time")]
    pub preferred_time: String,

    // Topic policy
    #[serde(default = "default_max_topic_uses")]
    pub max_topic_uses: i32,
    #[serde(default)]
    pub auto_generate_topics: bool,
    #[serde(default)]
    pub google_search_enabled: bool,
    #[serde(default = "default_scan_frequency")]
    pub scan_frequency_days: i64,
    #[serde(default)]
    pub auto_scan_enabled: bool,

    // Generation policy
    /// Enabled content-format keys; empty means all catalog formats.
    #[serde(default)]
    pub enabled_formats: Vec<String>,
    #[serde(default = "default_voice_style")]
    pub voice_style: String,
    #[serde(default)]
    pub human_elements: HumanElements,
    #[serde(default)]
    pub api_rotation_mode: RotationMode,
    #[serde(default)]
    pub last_api_used: Option<Provider>,
    /// Recently used format keys, newest last, bounded to 10.
    #[serde(default)]
    pub format_history: Vec<String>,

    // Content identity
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub default_author: Option<String>,
    #[serde(default)]
    pub openai_system_prompt: Option<String>,
    #[serde(default)]
    pub anthropic_system_prompt: Option<String>,

    // Timestamps
    #[serde(default)]
    pub last_generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_scheduled_at: Option<DateTime<Utc>>,
}

fn default_min_hours() -> i64 {
    24
}
fn default_max_hours() -> i64 {
    72
}
fn default_window_start() -> u32 {
    8
}
fn default_window_end() -> u32 {
    20
}
fn default_days_between() -> i64 {
    3
}
fn default_preferred_time() -> String {
    "09:00".to_string()
}
fn default_max_topic_uses() -> i32 {
    1
}
fn default_scan_frequency() -> i64 {
    30
}
fn default_voice_style() -> String {
    "professional".to_string()
}
fn default_language() -> String {
    "en".to_string()
}

// =============================================================================
// Api keys
// =============================================================================

/// Per-website credentials bundle. The `*_encrypted` fields are only
/// meaningful together with the process-wide encryption key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeys {
    pub website_id: String,
    #[serde(default)]
    pub openai_key_encrypted: Option<String>,
    #[serde(default)]
    pub anthropic_key_encrypted: Option<String>,
    /// Base URL of the tenant's article database (plaintext)
    #[serde(default)]
    pub target_db_url: String,
    #[serde(default)]
    pub target_db_key_encrypted: Option<String>,
}

// =============================================================================
// Topic
// =============================================================================

/// Where a topic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicSource {
    AiGenerated,
    AiSuggested,
    GoogleSearch,
    Manual,
}

/// A candidate article subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub website_id: String,
    pub title: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: i32,
    pub source: TopicSource,
    #[serde(default)]
    pub is_used: bool,
    #[serde(default)]
    pub times_used: i32,
    #[serde(default)]
    pub used_at: Option<DateTime<Utc>>,
    /// Opaque structured metadata from discovery
    #[serde(default)]
    pub discovery_context: Option<Value>,
    /// Content-format key hint from discovery, if any
    #[serde(default)]
    pub format_hint: Option<String>,
    #[serde(default = "default_intent")]
    pub search_intent: SearchIntent,
    #[serde(default)]
    pub timeliness: Timeliness,
    #[serde(default)]
    pub trending_reason: Option<String>,
}

fn default_intent() -> SearchIntent {
    SearchIntent::Informational
}

/// Insert shape for a topic (the store assigns id and usage fields).
#[derive(Debug, Clone, Serialize)]
pub struct NewTopic {
    pub website_id: String,
    pub title: String,
    pub keywords: Vec<String>,
    pub category: Option<String>,
    pub priority: i32,
    pub source: TopicSource,
    pub discovery_context: Option<Value>,
    pub format_hint: Option<String>,
    pub search_intent: SearchIntent,
    pub timeliness: Timeliness,
    pub trending_reason: Option<String>,
}

// =============================================================================
// Website scan
// =============================================================================

/// Scan lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    #[default]
    Pending,
    Scanning,
    Completed,
    Failed,
}

/// A navigation link found on the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavLink {
    pub url: String,
    pub text: String,
}

/// Cached content profile of a tenant's public website. One row per website.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteScan {
    pub website_id: String,
    #[serde(default)]
    pub homepage_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    /// Deduplicated, bounded to 50
    #[serde(default)]
    pub main_keywords: Vec<String>,
    /// Bounded to 30
    #[serde(default)]
    pub headings: Vec<String>,
    /// Bounded to 10
    #[serde(default)]
    pub navigation_links: Vec<NavLink>,
    #[serde(default)]
    pub content_themes: Vec<String>,
    /// 1-2 sentence niche description from the AI analyzer
    #[serde(default)]
    pub niche_description: Option<String>,
    #[serde(default)]
    pub pages_scanned: i32,
    #[serde(default)]
    pub status: ScanStatus,
    #[serde(default)]
    pub last_scanned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl WebsiteScan {
    /// An empty pending scan for a website.
    pub fn pending(website_id: impl Into<String>) -> Self {
        Self {
            website_id: website_id.into(),
            homepage_title: None,
            meta_description: None,
            main_keywords: Vec::new(),
            headings: Vec::new(),
            navigation_links: Vec::new(),
            content_themes: Vec::new(),
            niche_description: None,
            pages_scanned: 0,
            status: ScanStatus::Pending,
            last_scanned_at: None,
            error_message: None,
        }
    }
}

// =============================================================================
// Generation log
// =============================================================================

/// Generation attempt status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Generating,
    Success,
    Failed,
}

/// One record per article-generation attempt. Append-only; transitions
/// generating -> success/failed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationLog {
    pub id: String,
    pub website_id: String,
    pub topic_id: String,
    pub status: LogStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub article_title: Option<String>,
    #[serde(default)]
    pub article_slug: Option<String>,
    #[serde(default)]
    pub api_used: Option<Provider>,
    #[serde(default)]
    pub seo_score: Option<i32>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Final state written when a generation attempt completes.
#[derive(Debug, Clone)]
pub enum LogOutcome {
    Success {
        article_title: String,
        article_slug: String,
        api_used: Provider,
        seo_score: i32,
    },
    Failed {
        error_message: String,
    },
}

/// Website fields updated after a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct WebsiteRunUpdate {
    pub next_scheduled_at: DateTime<Utc>,
    pub last_generated_at: DateTime<Utc>,
    pub last_api_used: Provider,
    /// Post-append history, already trimmed to 10
    pub format_history: Vec<String>,
    pub last_posting_hour: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_website_parses_from_sparse_row() {
        let row = serde_json::json!({
            "id": "w1",
            "name": "Surf Blog",
            "domain": "surf.example.com",
            "is_active": true
        });
        let website: Website = serde_json::from_value(row).unwrap();
        assert_eq!(website.schedule_mode, ScheduleMode::Window);
        assert_eq!(website.max_topic_uses, 1);
        assert_eq!(website.voice_style, "professional");
        assert!(website.enabled_formats.is_empty());
        assert!(website.human_elements.rhetorical_questions);
    }

    #[test]
    fn test_topic_source_wire_values() {
        assert_eq!(
            serde_json::to_string(&TopicSource::GoogleSearch).unwrap(),
            "\"google_search\""
        );
        assert_eq!(
            serde_json::to_string(&TopicSource::AiGenerated).unwrap(),
            "\"ai_generated\""
        );
    }

    #[test]
    fn test_scan_status_round_trip() {
        let status: ScanStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(status, ScanStatus::Completed);
    }
}
