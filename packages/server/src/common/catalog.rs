//! Static content catalog.
//!
//! Process-wide immutable tables: content formats, voice styles, human
//! writing elements, seasonal themes, and search-intent rules. No I/O at
//! construction. This module is the single source of truth for which
//! formats exist; the article generator, topic engine, and scorer all
//! consult it.

use serde::{Deserialize, Serialize};

// =============================================================================
// Content formats
// =============================================================================

/// A required section of a content format.
#[derive(Debug, Clone, Copy)]
pub struct Section {
    pub key: &'static str,
    pub description: &'static str,
}

/// An editorial template that shapes the prompt and expected output.
#[derive(Debug, Clone, Copy)]
pub struct ContentFormat {
    pub key: &'static str,
    pub name: &'static str,
    pub sections: &'static [Section],
    pub tone: &'static str,
    pub heading_style: &'static str,
    /// Target word-count range (min, max)
    pub word_count: (u32, u32),
}

pub const CONTENT_FORMATS: &[ContentFormat] = &[
    ContentFormat {
        key: "listicle",
        name: "Listicle",
        sections: &[
            Section { key: "hook_intro", description: "A short intro that promises a concrete payoff" },
            Section { key: "numbered_items", description: "7-12 numbered items, each with a bolded takeaway" },
            Section { key: "quick_recap", description: "Bullet recap of the strongest items" },
            Section { key: "conclusion", description: "Closing advice with a next step" },
        ],
        tone: "punchy and scannable",
        heading_style: "numbered headings",
        word_count: (1200, 2000),
    },
    ContentFormat {
        key: "how_to_guide",
        name: "How-To Guide",
        sections: &[
            Section { key: "problem_intro", description: "Name the problem and who hits it" },
            Section { key: "prerequisites", description: "What the reader needs before starting" },
            Section { key: "steps", description: "Sequential numbered steps with concrete actions" },
            Section { key: "common_mistakes", description: "Pitfalls and how to avoid them" },
            Section { key: "faq", description: "3-5 short questions and answers" },
        ],
        tone: "practical and encouraging",
        heading_style: "step-by-step headings",
        word_count: (1000, 1800),
    },
    ContentFormat {
        key: "deep_dive",
        name: "Deep Dive",
        sections: &[
            Section { key: "context", description: "Why this topic matters now" },
            Section { key: "background", description: "The underlying mechanics or history" },
            Section { key: "analysis", description: "Detailed examination with data points" },
            Section { key: "implications", description: "What it means for the reader" },
            Section { key: "key_takeaways", description: "Bullet summary of the core findings" },
        ],
        tone: "authoritative and thorough",
        heading_style: "descriptive headings",
        word_count: (1800, 2800),
    },
    ContentFormat {
        key: "comparison",
        name: "Comparison",
        sections: &[
            Section { key: "intro", description: "Frame the decision the reader faces" },
            Section { key: "criteria", description: "The dimensions being compared" },
            Section { key: "option_breakdown", description: "Each option examined against the criteria" },
            Section { key: "verdict", description: "Which option wins for which reader" },
            Section { key: "faq", description: "Common questions about choosing" },
        ],
        tone: "balanced and decisive",
        heading_style: "versus headings",
        word_count: (1200, 2200),
    },
    ContentFormat {
        key: "case_study",
        name: "Case Study",
        sections: &[
            Section { key: "situation", description: "The starting point and its constraints" },
            Section { key: "approach", description: "What was done and why" },
            Section { key: "results", description: "Outcomes with concrete numbers" },
            Section { key: "lessons", description: "What transfers to the reader's situation" },
        ],
        tone: "narrative and concrete",
        heading_style: "story-arc headings",
        word_count: (1000, 1800),
    },
    ContentFormat {
        key: "qa_format",
        name: "Q&A",
        sections: &[
            Section { key: "intro", description: "Why these questions keep coming up" },
            Section { key: "questions", description: "6-10 real questions, each answered directly in the first sentence" },
            Section { key: "summary", description: "Bullet digest of the answers" },
        ],
        tone: "direct and conversational",
        heading_style: "question headings",
        word_count: (900, 1600),
    },
    ContentFormat {
        key: "news_commentary",
        name: "News Commentary",
        sections: &[
            Section { key: "whats_new", description: "The development, stated plainly" },
            Section { key: "why_it_matters", description: "Impact for the reader's niche" },
            Section { key: "expert_take", description: "An opinionated reading of the news" },
            Section { key: "what_to_watch", description: "What happens next and when" },
        ],
        tone: "timely and opinionated",
        heading_style: "newsy headings",
        word_count: (800, 1400),
    },
    ContentFormat {
        key: "ultimate_guide",
        name: "Ultimate Guide",
        sections: &[
            Section { key: "tldr", description: "A TL;DR box summarizing the whole guide" },
            Section { key: "fundamentals", description: "Definitions and core concepts" },
            Section { key: "main_chapters", description: "Comprehensive coverage in 4-6 chapters" },
            Section { key: "advanced_tips", description: "Beyond-the-basics guidance" },
            Section { key: "faq", description: "5+ frequently asked questions" },
            Section { key: "conclusion", description: "Where to go from here" },
        ],
        tone: "comprehensive and confident",
        heading_style: "chapter headings",
        word_count: (2500, 4000),
    },
];

/// Look up a content format by key.
pub fn format_by_key(key: &str) -> Option<&'static ContentFormat> {
    CONTENT_FORMATS.iter().find(|f| f.key == key)
}

// =============================================================================
// Voice styles
// =============================================================================

/// Surface-form choices applied on top of the content format.
#[derive(Debug, Clone, Copy)]
pub struct VoiceStyle {
    pub key: &'static str,
    pub use_contractions: bool,
    /// First-person form used in the copy
    pub first_person: &'static str,
    pub sentence_complexity: &'static str,
    pub formality: &'static str,
    pub use_emoji: bool,
}

pub const VOICE_STYLES: &[VoiceStyle] = &[
    VoiceStyle {
        key: "professional",
        use_contractions: false,
        first_person: "we",
        sentence_complexity: "varied, leaning longer",
        formality: "formal",
        use_emoji: false,
    },
    VoiceStyle {
        key: "conversational",
        use_contractions: true,
        first_person: "I",
        sentence_complexity: "short and varied",
        formality: "casual",
        use_emoji: false,
    },
    VoiceStyle {
        key: "expert",
        use_contractions: false,
        first_person: "we",
        sentence_complexity: "dense, precise",
        formality: "technical",
        use_emoji: false,
    },
    VoiceStyle {
        key: "friendly",
        use_contractions: true,
        first_person: "we",
        sentence_complexity: "simple",
        formality: "informal",
        use_emoji: true,
    },
];

/// Look up a voice style, falling back to "professional" for unknown keys.
pub fn voice_by_key(key: &str) -> &'static VoiceStyle {
    VOICE_STYLES
        .iter()
        .find(|v| v.key == key)
        .unwrap_or(&VOICE_STYLES[0])
}

// =============================================================================
// Human writing elements
// =============================================================================

/// Switches for cues that make generated copy read as human-written.
/// Websites carry their own set; this default enables everything.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HumanElements {
    pub rhetorical_questions: bool,
    pub conversational_asides: bool,
    pub opinion_markers: bool,
    pub uncertainty_markers: bool,
    pub anecdote_hints: bool,
    pub transition_variety: bool,
}

impl Default for HumanElements {
    fn default() -> Self {
        Self {
            rhetorical_questions: true,
            conversational_asides: true,
            opinion_markers: true,
            uncertainty_markers: true,
            anecdote_hints: true,
            transition_variety: true,
        }
    }
}

// =============================================================================
// Seasonal themes
// =============================================================================

const SEASONAL_THEMES: [&[&str]; 12] = [
    &["new year planning", "fresh starts", "goal setting", "annual trends"],
    &["winter optimization", "planning season", "early-year reviews"],
    &["spring preparation", "first-quarter results", "renewal"],
    &["spring growth", "seasonal refresh", "preparing for summer"],
    &["early summer", "mid-year planning", "outdoor season"],
    &["summer peak", "mid-year reviews", "vacation season"],
    &["summer strategies", "second-half planning", "seasonal slowdown"],
    &["late summer", "back-to-school", "autumn preparation"],
    &["autumn kickoff", "fourth-quarter planning", "harvest season"],
    &["autumn trends", "holiday preparation", "year-end previews"],
    &["holiday season", "black friday", "year-end pushes"],
    &["year in review", "holiday peak", "next-year predictions"],
];

/// Seasonal theme hints for a month (1..=12). Out-of-range months get
/// January's list rather than panicking.
pub fn seasonal_themes(month: u32) -> &'static [&'static str] {
    let idx = month.saturating_sub(1).min(11) as usize;
    SEASONAL_THEMES[idx]
}

// =============================================================================
// Search intent
// =============================================================================

/// The search intent behind a topic; drives GEO prompt shaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchIntent {
    Informational,
    Commercial,
    Transactional,
    Navigational,
}

impl SearchIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchIntent::Informational => "informational",
            SearchIntent::Commercial => "commercial",
            SearchIntent::Transactional => "transactional",
            SearchIntent::Navigational => "navigational",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "informational" => Some(SearchIntent::Informational),
            "commercial" => Some(SearchIntent::Commercial),
            "transactional" => Some(SearchIntent::Transactional),
            "navigational" => Some(SearchIntent::Navigational),
            _ => None,
        }
    }
}

/// Topic timeliness classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Timeliness {
    #[default]
    Evergreen,
    Seasonal,
    News,
    Trending,
}

impl Timeliness {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "evergreen" => Some(Timeliness::Evergreen),
            "seasonal" => Some(Timeliness::Seasonal),
            "news" => Some(Timeliness::News),
            "trending" => Some(Timeliness::Trending),
            _ => None,
        }
    }
}

/// Classifier rule: lowercase substrings that signal an intent, plus how
/// aggressively GEO formatting should be applied for it.
#[derive(Debug, Clone, Copy)]
pub struct IntentRule {
    pub intent: SearchIntent,
    pub signals: &'static [&'static str],
    pub geo_priority: u8,
}

pub const INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        intent: SearchIntent::Transactional,
        signals: &["buy", "price", "pricing", "discount", "deal", "coupon", "order", "cheap"],
        geo_priority: 2,
    },
    IntentRule {
        intent: SearchIntent::Commercial,
        signals: &["best", "top", "review", "comparison", "vs", "versus", "alternative"],
        geo_priority: 3,
    },
    IntentRule {
        intent: SearchIntent::Navigational,
        signals: &["login", "signin", "sign in", "download", "website", "official"],
        geo_priority: 1,
    },
    IntentRule {
        intent: SearchIntent::Informational,
        signals: &["how", "what", "why", "guide", "tutorial", "learn", "tips", "explained"],
        geo_priority: 3,
    },
];

/// Classify search intent from topic text. First matching rule wins;
/// defaults to informational.
pub fn classify_intent(text: &str) -> SearchIntent {
    let lowered = text.to_lowercase();
    for rule in INTENT_RULES {
        if rule.signals.iter().any(|s| lowered.contains(s)) {
            return rule.intent;
        }
    }
    SearchIntent::Informational
}

/// GEO priority for an intent (higher = lean harder on GEO structure).
pub fn geo_priority(intent: SearchIntent) -> u8 {
    INTENT_RULES
        .iter()
        .find(|r| r.intent == intent)
        .map(|r| r.geo_priority)
        .unwrap_or(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eight_formats() {
        assert_eq!(CONTENT_FORMATS.len(), 8);
        assert!(format_by_key("how_to_guide").is_some());
        assert!(format_by_key("ultimate_guide").is_some());
        assert!(format_by_key("nope").is_none());
    }

    #[test]
    fn test_word_count_ranges_sane() {
        for format in CONTENT_FORMATS {
            assert!(format.word_count.0 < format.word_count.1, "{}", format.key);
            assert!(!format.sections.is_empty(), "{}", format.key);
        }
    }

    #[test]
    fn test_voice_fallback() {
        assert_eq!(voice_by_key("expert").key, "expert");
        assert_eq!(voice_by_key("unknown").key, "professional");
    }

    #[test]
    fn test_seasonal_themes_all_months() {
        for month in 1..=12 {
            assert!(!seasonal_themes(month).is_empty());
        }
        // Out-of-range months clamp instead of panicking
        assert_eq!(seasonal_themes(0), seasonal_themes(1));
        assert_eq!(seasonal_themes(13), seasonal_themes(12));
    }

    #[test]
    fn test_classify_intent() {
        assert_eq!(classify_intent("How to wax a surfboard"), SearchIntent::Informational);
        assert_eq!(classify_intent("Best surfboard wax 2025"), SearchIntent::Commercial);
        assert_eq!(classify_intent("Buy surfboard wax online"), SearchIntent::Transactional);
        assert_eq!(classify_intent("surfboard brand login page"), SearchIntent::Navigational);
        assert_eq!(classify_intent("surfboards"), SearchIntent::Informational);
    }

    #[test]
    fn test_intent_serde_round_trip() {
        let json = serde_json::to_string(&SearchIntent::Commercial).unwrap();
        assert_eq!(json, "\"commercial\"");
        let back: SearchIntent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SearchIntent::Commercial);
    }
}
