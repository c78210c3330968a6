//! Prompt assembly.
//!
//! The user prompt composes the selected format's structure, heading style,
//! voice, human-writing cues, and GEO instructions around the topic slots.
//! The system prompt is the per-provider override on the website when set,
//! otherwise a default derived from the voice style.

use std::fmt::Write;

use crate::common::catalog::{geo_priority, ContentFormat, SearchIntent, VoiceStyle};
use crate::domains::store::types::{Topic, Website};
use crate::kernel::providers::Provider;

/// System prompt for a provider call.
pub fn build_system_prompt(website: &Website, provider: Provider, voice: &VoiceStyle) -> String {
    let override_prompt = match provider {
        Provider::Openai => website.openai_system_prompt.as_deref(),
        Provider::Anthropic => website.anthropic_system_prompt.as_deref(),
    };
    if let Some(prompt) = override_prompt.filter(|p| !p.trim().is_empty()) {
        return prompt.to_string();
    }

    format!(
        "You are an experienced content writer for {name}. You write {formality} \
         long-form articles in {language} that rank in search engines and get cited \
         by AI assistants. You always deliver the full article body as clean HTML \
         and nothing else.",
        name = website.name,
        formality = voice.formality,
        language = website.language,
    )
}

/// User prompt for article generation.
pub fn build_user_prompt(topic: &Topic, website: &Website, format: &ContentFormat) -> String {
    let voice = crate::common::catalog::voice_by_key(&website.voice_style);
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "Write a {name} article titled \"{title}\".",
        name = format.name,
        title = topic.title,
    );
    let _ = writeln!(prompt, "Language: {}.", website.language);
    if let Some(category) = topic.category.as_deref().filter(|c| !c.is_empty()) {
        let _ = writeln!(prompt, "Category: {}.", category);
    }
    if !topic.keywords.is_empty() {
        let _ = writeln!(
            prompt,
            "Work these keywords in naturally: {}. The first one is the primary keyword.",
            topic.keywords.join(", ")
        );
    }
    let _ = writeln!(
        prompt,
        "Target length: {} to {} words.",
        format.word_count.0, format.word_count.1
    );

    let _ = writeln!(prompt, "\nStructure ({}):", format.heading_style);
    for section in format.sections {
        let _ = writeln!(prompt, "- {}: {}", section.key, section.description);
    }

    let _ = writeln!(prompt, "\nTone: {}. {}", format.tone, voice_instruction(voice));
    let _ = writeln!(prompt, "{}", genuineness_instruction(website));
    let _ = writeln!(prompt, "{}", geo_instruction(topic.search_intent));

    let _ = writeln!(
        prompt,
        "\nFormatting contract: return only the article body as HTML using <h2>, \
         <h3>, <p>, <ul> and <li> tags. No document wrapper, no <html> or <head> \
         or <body> tags, no code fences, no commentary before or after. Start \
         directly at the first section."
    );

    prompt
}

fn voice_instruction(voice: &VoiceStyle) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.push(if voice.use_contractions {
        "Use contractions".to_string()
    } else {
        "Avoid contractions".to_string()
    });
    parts.push(format!("write in the first person as \"{}\"", voice.first_person));
    parts.push(format!("keep sentences {}", voice.sentence_complexity));
    if voice.use_emoji {
        parts.push("an occasional emoji is fine".to_string());
    } else {
        parts.push("no emoji".to_string());
    }
    format!("{}.", parts.join(", "))
}

fn genuineness_instruction(website: &Website) -> String {
    let elements = &website.human_elements;
    let mut cues: Vec<&str> = Vec::new();
    if elements.rhetorical_questions {
        cues.push("an occasional rhetorical question");
    }
    if elements.conversational_asides {
        cues.push("brief conversational asides");
    }
    if elements.opinion_markers {
        cues.push("clear opinion markers (\"in my experience\", \"frankly\")");
    }
    if elements.uncertainty_markers {
        cues.push("honest uncertainty where the evidence is thin");
    }
    if elements.anecdote_hints {
        cues.push("a short illustrative anecdote");
    }
    if elements.transition_variety {
        cues.push("varied transitions between sections");
    }

    if cues.is_empty() {
        "Write naturally; do not pad.".to_string()
    } else {
        format!(
            "Make it read human: include {}. Never mention that you are an AI.",
            cues.join(", ")
        )
    }
}

fn geo_instruction(intent: SearchIntent) -> String {
    let base = match intent {
        SearchIntent::Informational => {
            "Answer the core question directly in the opening paragraph, add a \
             short FAQ section, and include at least one definitional sentence \
             (\"X is ...\") an AI engine can quote."
        }
        SearchIntent::Commercial => {
            "Include a comparison-friendly bullet list, a Key Takeaways section, \
             and concrete numbers a shopping-research AI can cite."
        }
        SearchIntent::Transactional => {
            "Lead with the action the reader wants to take, keep steps in \
             numbered lists, and close with a short FAQ."
        }
        SearchIntent::Navigational => {
            "State plainly what the destination offers and summarize it in a \
             TL;DR block at the top."
        }
    };
    format!(
        "Generative-engine optimization (priority {}): {}",
        geo_priority(intent),
        base
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::catalog::{format_by_key, voice_by_key};
    use crate::domains::store::types::TopicSource;
    use crate::common::catalog::Timeliness;

    fn website() -> Website {
        serde_json::from_value(serde_json::json!({
            "id": "w1",
            "name": "Surf Report",
            "domain": "surf.example.com",
            "is_active": true,
            "language": "en"
        }))
        .unwrap()
    }

    fn topic() -> Topic {
        Topic {
            id: "t1".to_string(),
            website_id: "w1".to_string(),
            title: "How to Wax a Surfboard".to_string(),
            keywords: vec!["wax a surfboard".to_string(), "surf wax".to_string()],
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
    fn test_user_prompt_carries_slots() {
        let format = format_by_key("how_to_guide").unwrap();
        let prompt = build_user_prompt(&topic(), &website(), format);

        assert!(prompt.contains("How to Wax a Surfboard"));
        assert!(prompt.contains("wax a surfboard, surf wax"));
        assert!(prompt.contains("gear"));
        assert!(prompt.contains("How-To Guide"));
        assert!(prompt.contains("no code fences"));
        assert!(prompt.contains("FAQ"));
    }

    #[test]
    fn test_system_prompt_override_wins() {
        let mut site = website();
        site.openai_system_prompt = Some("Custom system prompt.".to_string());
        let voice = voice_by_key(&site.voice_style);

        let system = build_system_prompt(&site, Provider::Openai, voice);
        assert_eq!(system, "Custom system prompt.");

        // Other provider still gets the default
        let system = build_system_prompt(&site, Provider::Anthropic, voice);
        assert!(system.contains("Surf Report"));
    }

    #[test]
    fn test_genuineness_follows_flags() {
        let mut site = website();
        site.human_elements.anecdote_hints = false;
        site.human_elements.rhetorical_questions = false;
        let text = genuineness_instruction(&site);
        assert!(!text.contains("anecdote"));
        assert!(!text.contains("rhetorical"));
        assert!(text.contains("asides"));
    }
}
