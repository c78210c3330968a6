//! SEO/GEO scoring rubric.
//!
//! A deterministic, pure function of the article. The rubric gates output
//! quality: title (20), structure (25), meta (15), keywords (15), and
//! GEO readiness (25), capped at 100. `geo_optimized` flips when the GEO
//! subtotal reaches 15.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref TAG: Regex = Regex::new(r"<[^>]+>").expect("valid regex");
    static ref H2: Regex = Regex::new(r"(?is)<h2[^>]*>(.*?)</h2>").expect("valid regex");
    static ref H3: Regex = Regex::new(r"(?is)<h3[^>]*>(.*?)</h3>").expect("valid regex");
    static ref PARAGRAPH: Regex = Regex::new(r"(?is)<p[^>]*>.*?</p>").expect("valid regex");
    static ref FIRST_PARAGRAPH: Regex =
        Regex::new(r"(?is)<p[^>]*>(.*?)</p>").expect("valid regex");
    static ref LIST_ITEM: Regex = Regex::new(r"(?i)<li[^>]*>").expect("valid regex");
    static ref DEFINITIONAL: Regex = Regex::new(
        r"(?i)\b\w+ (?:is|means|refers to|defined as) "
    )
    .expect("valid regex");
    static ref MEASURED_NUMBER: Regex = Regex::new(
        r"(?i)\d+(?:\.\d+)?\s*(?:%|percent|hours?|minutes?|seconds?|days?|weeks?|months?|years?)\b"
    )
    .expect("valid regex");
}

/// Title words that pull clicks and AI citations.
const POWER_WORDS: &[&str] = &[
    "how", "why", "what", "best", "guide", "top", "ultimate", "essential", "complete",
];

const FAQ_MARKERS: &[&str] = &["faq", "frequently asked", "questions"];
const SUMMARY_MARKERS: &[&str] = &["summary", "key takeaway", "conclusion", "tl;dr"];

/// What the scorer looks at.
#[derive(Debug, Clone)]
pub struct ScoreInput<'a> {
    pub title: &'a str,
    /// Article body HTML
    pub content: &'a str,
    pub meta_description: &'a str,
    pub primary_keyword: &'a str,
}

/// Per-category breakdown, returned for logging.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SeoBreakdown {
    pub title: u32,
    pub structure: u32,
    pub meta: u32,
    pub keywords: u32,
    pub geo: u32,
}

/// Scoring result.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SeoReport {
    pub score: u32,
    pub breakdown: SeoBreakdown,
    pub geo_optimized: bool,
}

/// Score an article against the rubric.
pub fn score(input: &ScoreInput) -> SeoReport {
    let text = strip_tags(input.content);
    let keyword = input.primary_keyword.to_lowercase();

    let breakdown = SeoBreakdown {
        title: score_title(input.title, &keyword),
        structure: score_structure(input.content, &text),
        meta: score_meta(input.meta_description, &keyword),
        keywords: score_keywords(input.content, &text, &keyword),
        geo: score_geo(input.content, &text),
    };

    let total = breakdown.title + breakdown.structure + breakdown.meta + breakdown.keywords
        + breakdown.geo;

    SeoReport {
        score: total.min(100),
        breakdown,
        geo_optimized: breakdown.geo >= 15,
    }
}

fn strip_tags(html: &str) -> String {
    TAG.replace_all(html, " ").to_string()
}

// -----------------------------------------------------------------------------
// Title: 20 points
// -----------------------------------------------------------------------------

fn score_title(title: &str, keyword: &str) -> u32 {
    let mut points = 0;
    let len = title.chars().count();

    points += match len {
        50..=60 => 8,
        30..=49 | 61..=70 => 5,
        n if n >= 20 => 2,
        _ => 0,
    };

    let lowered = title.to_lowercase();
    if !keyword.is_empty() {
        if let Some(idx) = lowered.find(keyword) {
            // Early keyword placement weighs heavier
            points += if idx <= lowered.len() / 3 { 8 } else { 5 };
        }
    }

    let has_power_word = lowered
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .any(|w| POWER_WORDS.contains(&w));
    if has_power_word {
        points += 4;
    }

    points
}

// -----------------------------------------------------------------------------
// Structure: 25 points
// -----------------------------------------------------------------------------

fn score_structure(content: &str, text: &str) -> u32 {
    let mut points = 0;

    let word_count = text.split_whitespace().count();
    points += match word_count {
        n if n >= 1500 => 8,
        n if n >= 1000 => 5,
        n if n >= 600 => 2,
        _ => 0,
    };

    let h2_count = H2.captures_iter(content).count();
    points += match h2_count {
        n if n >= 3 => 5,
        2 => 3,
        _ => 0,
    };

    let h3_count = H3.captures_iter(content).count();
    points += match h3_count {
        n if n >= 2 => 4,
        1 => 2,
        _ => 0,
    };

    let lowered = content.to_lowercase();
    if lowered.contains("<ul") || lowered.contains("<ol") {
        points += 4;
    }

    let paragraph_count = PARAGRAPH.find_iter(content).count();
    points += match paragraph_count {
        n if n >= 5 => 4,
        n if n >= 3 => 2,
        _ => 0,
    };

    points
}

// -----------------------------------------------------------------------------
// Meta description: 15 points
// -----------------------------------------------------------------------------

fn score_meta(meta: &str, keyword: &str) -> u32 {
    if meta.is_empty() {
        return 0;
    }
    let mut points = 0;
    let len = meta.chars().count();

    points += match len {
        120..=160 => 8,
        80..=119 => 5,
        _ => 2,
    };

    if !keyword.is_empty() && meta.to_lowercase().contains(keyword) {
        points += 4;
    }

    if len >= 50 {
        points += 3;
    }

    points
}

// -----------------------------------------------------------------------------
// Keywords: 15 points
// -----------------------------------------------------------------------------

fn score_keywords(content: &str, text: &str, keyword: &str) -> u32 {
    if keyword.is_empty() {
        return 0;
    }
    let mut points = 0;
    let text_lower = text.to_lowercase();

    let total_words = text_lower.split_whitespace().count();
    let keyword_words = keyword.split_whitespace().count();
    let occurrences = text_lower.matches(keyword).count();

    if total_words > 0 {
        let density = (occurrences * keyword_words) as f64 / total_words as f64 * 100.0;
        if (0.5..=2.5).contains(&density) {
            points += 8;
        } else if (0.2..0.5).contains(&density) || (density > 2.5 && density <= 4.0) {
            points += 4;
        }
    }

    if let Some(captures) = FIRST_PARAGRAPH.captures(content) {
        let first = strip_tags(&captures[1]).to_lowercase();
        if first.contains(keyword) {
            points += 4;
        }
    }

    let in_subheading = H2
        .captures_iter(content)
        .chain(H3.captures_iter(content))
        .any(|c| strip_tags(&c[1]).to_lowercase().contains(keyword));
    if in_subheading {
        points += 3;
    }

    points
}

// -----------------------------------------------------------------------------
// GEO readiness: 25 points
// -----------------------------------------------------------------------------

fn score_geo(content: &str, text: &str) -> u32 {
    let mut points = 0;

    let headings: Vec<String> = H2
        .captures_iter(content)
        .chain(H3.captures_iter(content))
        .map(|c| strip_tags(&c[1]).trim().to_string())
        .collect();

    let has_faq = headings.iter().any(|h| {
        let lowered = h.to_lowercase();
        FAQ_MARKERS.iter().any(|marker| lowered.contains(marker))
    });
    if has_faq {
        points += 8;
    } else {
        let question_headings = headings.iter().filter(|h| h.ends_with('?')).count();
        if question_headings >= 2 {
            points += 5;
        }
    }

    let has_summary = headings.iter().any(|h| {
        let lowered = h.to_lowercase();
        SUMMARY_MARKERS.iter().any(|marker| lowered.contains(marker))
    });
    if has_summary {
        points += 5;
    }

    let bullets = LIST_ITEM.find_iter(content).count();
    points += match bullets {
        n if n >= 5 => 5,
        n if n >= 3 => 3,
        _ => 0,
    };

    let definitional = DEFINITIONAL.find_iter(text).count();
    points += match definitional {
        n if n >= 2 => 4,
        1 => 2,
        _ => 0,
    };

    if MEASURED_NUMBER.is_match(text) {
        points += 3;
    }

    points
}
