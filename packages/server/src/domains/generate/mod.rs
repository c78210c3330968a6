//! Article generation.
//!
//! Format selection, prompt assembly, provider call, response cleaning, and
//! parsing into an article record. Provider choice and cross-provider
//! fallback live with the orchestrator; this module generates with whatever
//! provider seam it is handed.

pub mod clean;
pub mod prompts;

use chrono::{Datelike, Utc};
use lazy_static::lazy_static;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use thiserror::Error;

use crate::common::catalog::{format_by_key, voice_by_key, ContentFormat, SearchIntent, CONTENT_FORMATS};
use crate::domains::store::types::{Topic, Website};
use crate::kernel::providers::{BaseAi, Provider};

pub use clean::{clean_response, Cleaned};

/// How many recent formats are excluded from selection.
const FORMAT_HISTORY_WINDOW: usize = 3;

const EXCERPT_MAX_CHARS: usize = 200;
const META_DESCRIPTION_MAX_CHARS: usize = 160;
const SLUG_MAX_CHARS: usize = 60;
const WORDS_PER_MINUTE: usize = 200;

lazy_static! {
    static ref ANY_TAG: Regex = Regex::new(r"<[^>]+>").expect("valid regex");
}

/// Generation failures.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Provider call failed: {0}")]
    Provider(String),

    #[error("Provider returned empty content")]
    EmptyResponse,
}

/// A generated article, ready for scoring and publishing.
#[derive(Debug, Clone)]
pub struct GeneratedArticle {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub meta_description: String,
    pub tags: Vec<String>,
    pub primary_keyword: String,
    pub category: Option<String>,
    pub language: String,
    pub format_key: String,
    pub search_intent: SearchIntent,
    pub word_count: usize,
    pub read_time: u32,
}

// =============================================================================
// Format selection
// =============================================================================

/// Pick a content format for this run: the website's enabled formats minus
/// anything in the last 3 of its history. When exclusion empties the pool,
/// any enabled format is back on the table.
pub fn select_format<R: Rng + ?Sized>(website: &Website, rng: &mut R) -> &'static ContentFormat {
    let enabled: Vec<&'static ContentFormat> = if website.enabled_formats.is_empty() {
        CONTENT_FORMATS.iter().collect()
    } else {
        website
            .enabled_formats
            .iter()
            .filter_map(|key| format_by_key(key))
            .collect()
    };
    let enabled = if enabled.is_empty() {
        CONTENT_FORMATS.iter().collect()
    } else {
        enabled
    };

    let recent: Vec<&str> = website
        .format_history
        .iter()
        .rev()
        .take(FORMAT_HISTORY_WINDOW)
        .map(String::as_str)
        .collect();

    let fresh: Vec<&'static ContentFormat> = enabled
        .iter()
        .copied()
        .filter(|f| !recent.contains(&f.key))
        .collect();

    let pool = if fresh.is_empty() { &enabled } else { &fresh };
    pool.choose(rng).copied().expect("format pool is never empty")
}

// =============================================================================
// Generation
// =============================================================================

/// Generate an article for the topic on the given provider seam.
pub async fn generate(
    topic: &Topic,
    website: &Website,
    format: &ContentFormat,
    provider: Provider,
    ai: &dyn BaseAi,
) -> Result<GeneratedArticle, GenerateError> {
    let voice = voice_by_key(&website.voice_style);
    let system = prompts::build_system_prompt(website, provider, voice);
    let user = prompts::build_user_prompt(topic, website, format);

    tracing::debug!(
        topic = %topic.title,
        format = format.key,
        provider = provider.as_str(),
        "Generating article"
    );

    let raw = ai
        .complete(&system, &user)
        .await
        .map_err(|e| GenerateError::Provider(e.to_string()))?;

    if raw.trim().is_empty() {
        return Err(GenerateError::EmptyResponse);
    }

    let cleaned = clean_response(&raw, &topic.title);
    if cleaned.content.is_empty() {
        return Err(GenerateError::EmptyResponse);
    }

    Ok(parse_article(cleaned, topic, website, format))
}

fn parse_article(
    cleaned: Cleaned,
    topic: &Topic,
    website: &Website,
    format: &ContentFormat,
) -> GeneratedArticle {
    let text = plain_text(&cleaned.content);
    let word_count = text.split_whitespace().count();
    let read_time = ((word_count / WORDS_PER_MINUTE).max(1)) as u32;

    let excerpt = make_excerpt(&text, EXCERPT_MAX_CHARS);

    let primary_keyword = topic
        .keywords
        .first()
        .cloned()
        .unwrap_or_else(|| topic.title.to_lowercase());

    let meta_description = synthesize_meta_description(&primary_keyword, &text);

    GeneratedArticle {
        slug: slugify(&topic.title),
        title: cleaned.title,
        content: cleaned.content,
        excerpt,
        meta_description,
        tags: topic.keywords.clone(),
        primary_keyword,
        category: topic.category.clone(),
        language: website.language.clone(),
        format_key: format.key.to_string(),
        search_intent: topic.search_intent,
        word_count,
        read_time,
    }
}

/// Lowercase, ASCII alphanumerics and hyphens only, 60 chars max.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            if !slug.ends_with('-') && !slug.is_empty() {
                slug.push('-');
            }
        }
        // Everything else is dropped
    }
    let mut slug = slug.trim_matches('-').to_string();
    if slug.len() > SLUG_MAX_CHARS {
        slug.truncate(SLUG_MAX_CHARS);
        slug = slug.trim_end_matches('-').to_string();
    }
    if slug.is_empty() {
        slug = "article".to_string();
    }
    slug
}

fn plain_text(html: &str) -> String {
    let stripped = ANY_TAG.replace_all(html, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Meta description: a keyword-plus-year template, clamped to 160 chars.
/// Only when no usable keyword exists does it fall back to the article text.
fn synthesize_meta_description(primary_keyword: &str, text: &str) -> String {
    let keyword = primary_keyword.trim();
    if keyword.is_empty() {
        return make_excerpt(text, META_DESCRIPTION_MAX_CHARS);
    }

    let year = Utc::now().year();
    let mut meta = format!(
        "Discover what actually works for {} in {}: practical tips, real examples, \
         and the mistakes to avoid.",
        keyword, year
    );
    if meta.chars().count() > META_DESCRIPTION_MAX_CHARS {
        meta = make_excerpt(&meta, META_DESCRIPTION_MAX_CHARS);
    }
    meta
}

/// Cut at a sentence boundary when one lands past 70% of the cap, otherwise
/// at a word boundary with an ellipsis.
fn make_excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let head: String = text.chars().take(max_chars).collect();
    let sentence_end = head
        .rfind(&['.', '!', '?'][..])
        .filter(|&idx| idx + 1 >= max_chars * 7 / 10);
    if let Some(idx) = sentence_end {
        return head[..=idx].trim().to_string();
    }

    // Leave room for the ellipsis so the cap holds strictly
    let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    match head.rfind(' ') {
        Some(idx) => format!("{}...", head[..idx].trim_end()),
        None => format!("{}...", head.trim_end()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::catalog::Timeliness;
    use crate::domains::store::types::TopicSource;
    use crate::kernel::test_dependencies::MockAi;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn website() -> Website {
        serde_json::from_value(serde_json::json!({
            "id": "w1",
            "name": "Surf Report",
            "domain": "surf.example.com",
            "is_active": true
        }))
        .unwrap()
    }

    fn topic() -> Topic {
        Topic {
            id: "t1".to_string(),
            website_id: "w1".to_string(),
            title: "How to Wax a Surfboard".to_string(),
            keywords: vec!["wax a surfboard".to_string()],
            category: Some("gear".to_string()),
            priority: 5,
            source: TopicSource::Manual,
            is_used: false,
            times_used: 0,
            used_at: None,
            discovery_context: None,
            format_hint: None,
            search_intent: SearchIntent::Informational,
            timeliness: Timeliness::Evergreen,
            trending_reason: None,
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("How to Wax a Surfboard"), "how-to-wax-a-surfboard");
        assert_eq!(slugify("Crème brûlée & Coffee!"), "crme-brle-coffee");
        assert_eq!(slugify("  --  "), "article");

        let long = slugify(&"very long title words ".repeat(10));
        assert!(long.len() <= 60);
        assert!(!long.ends_with('-'));

        let re = Regex::new(r"^[a-z0-9-]{1,60}$").unwrap();
        for input in ["Hello World", "123 go", "Ünïcödé everywhere", "a"] {
            assert!(re.is_match(&slugify(input)), "{:?}", input);
        }
    }

    #[test]
    fn test_select_format_skips_recent_history() {
        let mut site = website();
        site.enabled_formats = vec!["listicle".to_string(), "how_to_guide".to_string()];
        site.format_history = vec!["listicle".to_string()];
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..20 {
            let format = select_format(&site, &mut rng);
            assert_eq!(format.key, "how_to_guide");
        }
    }

    #[test]
    fn test_select_format_reopens_pool_when_history_covers_all() {
        let mut site = website();
        site.enabled_formats = vec!["listicle".to_string()];
        site.format_history = vec!["listicle".to_string()];
        let mut rng = StdRng::seed_from_u64(1);

        let format = select_format(&site, &mut rng);
        assert_eq!(format.key, "listicle");
    }

    #[test]
    fn test_select_format_only_looks_at_last_three() {
        let mut site = website();
        site.enabled_formats = vec!["listicle".to_string(), "deep_dive".to_string()];
        // listicle fell out of the 3-entry window
        site.format_history = vec![
            "listicle".to_string(),
            "deep_dive".to_string(),
            "deep_dive".to_string(),
            "deep_dive".to_string(),
        ];
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..20 {
            assert_eq!(select_format(&site, &mut rng).key, "listicle");
        }
    }

    #[tokio::test]
    async fn test_generate_parses_article() {
        let html = format!(
            "<h1>How to Wax a Surfboard</h1>\n<h2>Why wax a surfboard matters</h2>\n<p>{}</p>",
            "Waxing gives grip and control in the water. ".repeat(30)
        );
        let ai = MockAi::always(&html);
        let format = format_by_key("how_to_guide").unwrap();

        let article = generate(&topic(), &website(), format, Provider::Openai, &ai)
            .await
            .unwrap();

        assert_eq!(article.title, "How to Wax a Surfboard");
        assert_eq!(article.slug, "how-to-wax-a-surfboard");
        assert!(article.read_time >= 1);
        assert!(article.excerpt.chars().count() <= 200);
        assert!(article.meta_description.chars().count() <= 160);
        assert!(article.meta_description.contains("wax a surfboard"));
        assert_eq!(article.primary_keyword, "wax a surfboard");
        assert_eq!(article.format_key, "how_to_guide");
        assert!(article.word_count > 100);
    }

    #[tokio::test]
    async fn test_generate_empty_response_errors() {
        let ai = MockAi::new(vec![""]);
        let format = format_by_key("listicle").unwrap();

        let result = generate(&topic(), &website(), format, Provider::Openai, &ai).await;
        assert!(matches!(result, Err(GenerateError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_generate_provider_error_propagates() {
        let ai = MockAi::failing();
        let format = format_by_key("listicle").unwrap();

        let result = generate(&topic(), &website(), format, Provider::Openai, &ai).await;
        assert!(matches!(result, Err(GenerateError::Provider(_))));
    }

    #[test]
    fn test_meta_description_template_carries_keyword_and_year() {
        let meta = synthesize_meta_description("surf wax", "ignored body text");
        assert!(meta.contains("surf wax"));
        assert!(meta.contains(&chrono::Utc::now().year().to_string()));
        assert!(meta.chars().count() <= 160);
    }

    #[test]
    fn test_meta_description_clamps_long_keywords() {
        let keyword = "extremely long tail keyword phrase ".repeat(8);
        let meta = synthesize_meta_description(&keyword, "body");
        assert!(meta.chars().count() <= 160);
    }

    #[test]
    fn test_meta_description_falls_back_to_text_without_keyword() {
        let meta = synthesize_meta_description("  ", "The article body text stands in.");
        assert_eq!(meta, "The article body text stands in.");
    }

    #[test]
    fn test_excerpt_prefers_sentence_boundary() {
        let text = format!("{} Short tail words here", "A sentence that runs on for a while with detail.".repeat(4));
        let excerpt = make_excerpt(&text, 200);
        assert!(excerpt.ends_with('.'));
        assert!(excerpt.chars().count() <= 200);
    }

    #[test]
    fn test_read_time_floor() {
        let cleaned = Cleaned {
            title: "T".to_string(),
            content: "<p>only a few words</p>".to_string(),
        };
        let article = parse_article(
            cleaned,
            &topic(),
            &website(),
            format_by_key("listicle").unwrap(),
        );
        assert_eq!(article.read_time, 1);
    }
}
