//! Response cleaning.
//!
//! LLM output arrives wrapped in code fences, document scaffolding, and
//! meta-commentary. The rules here run in a fixed order and are idempotent:
//! cleaning already-clean content changes nothing.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FENCE_LINE: Regex = Regex::new(r"(?m)^```[a-zA-Z]*\s*$").expect("valid regex");
    static ref DOCTYPE: Regex = Regex::new(r"(?i)<!DOCTYPE[^>]*>").expect("valid regex");
    static ref HTML_TAG: Regex = Regex::new(r"(?i)</?html[^>]*>").expect("valid regex");
    static ref HEAD_BLOCK: Regex = Regex::new(r"(?is)<head[^>]*>.*?</head>").expect("valid regex");
    static ref BODY_TAG: Regex = Regex::new(r"(?i)</?body[^>]*>").expect("valid regex");
    static ref META_TAG: Regex = Regex::new(r"(?i)<meta[^>]*>").expect("valid regex");
    static ref TITLE_BLOCK: Regex =
        Regex::new(r"(?is)<title[^>]*>.*?</title>").expect("valid regex");
    static ref HEADER_BLOCK: Regex =
        Regex::new(r"(?is)<header[^>]*>.*?</header>").expect("valid regex");
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").expect("valid regex");
    static ref H1_TEXT: Regex = Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("valid regex");
    static ref H2_TEXT: Regex = Regex::new(r"(?is)<h2[^>]*>(.*?)</h2>").expect("valid regex");
    static ref MD_H2: Regex = Regex::new(r"(?m)^##\s+(.+?)\s*$").expect("valid regex");
    static ref MD_H3: Regex = Regex::new(r"(?m)^###\s+(.+?)\s*$").expect("valid regex");
    static ref MD_BULLET: Regex = Regex::new(r"(?m)^\s*[*-]\s+(.+?)\s*$").expect("valid regex");
    static ref BLANK_RUN: Regex = Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("valid regex");
    static ref ANY_TAG: Regex = Regex::new(r"<[^>]+>").expect("valid regex");
    static ref COMMENTARY: Vec<Regex> = vec![
        Regex::new(r"(?i)^here is the \d+\+?[ -]word .*$").expect("valid regex"),
        Regex::new(r"(?i)^here'?s (?:the|your) .*?article.*$").expect("valid regex"),
        Regex::new(r"(?i)^the following is .*$").expect("valid regex"),
        Regex::new(r"(?i)^below is .*$").expect("valid regex"),
        Regex::new(r"(?i)^i'?ve written .*$").expect("valid regex"),
        Regex::new(r"(?i)^this is .*?article.*:\s*$").expect("valid regex"),
        Regex::new(r"(?i)^\[.*word.*article.*\]$").expect("valid regex"),
    ];
}

/// Cleaned article body with the title the cleaner settled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cleaned {
    pub title: String,
    pub content: String,
}

/// Apply all cleaning rules to raw provider output.
pub fn clean_response(raw: &str, fallback_title: &str) -> Cleaned {
    // (a) markdown code fences
    let mut content = FENCE_LINE.replace_all(raw, "").to_string();

    // (b) document-structure tags
    content = DOCTYPE.replace_all(&content, "").to_string();
    content = HEAD_BLOCK.replace_all(&content, "").to_string();
    content = HTML_TAG.replace_all(&content, "").to_string();
    content = BODY_TAG.replace_all(&content, "").to_string();
    content = META_TAG.replace_all(&content, "").to_string();
    content = TITLE_BLOCK.replace_all(&content, "").to_string();
    content = HEADER_BLOCK.replace_all(&content, "").to_string();

    // (c) meta-commentary lines
    content = remove_commentary_lines(&content);

    // (d) HTML comments
    content = COMMENT.replace_all(&content, "").to_string();

    // Title comes from the first h1/h2 if present, else the topic title
    let title = extract_title(&content, fallback_title);

    // (e) drop a bare first-line repetition of the title
    content = drop_title_repetition(&content, &title);

    // (f) residual markdown to HTML
    content = MD_H2.replace_all(&content, "<h2>$1</h2>").to_string();
    content = MD_H3.replace_all(&content, "<h3>$1</h3>").to_string();
    content = MD_BULLET.replace_all(&content, "<li>$1</li>").to_string();
    content = wrap_li_runs(&content);
    content = wrap_bare_paragraphs(&content);

    // (g) collapse blank-line runs
    content = BLANK_RUN.replace_all(&content, "\n\n").to_string();

    Cleaned {
        title,
        content: content.trim().to_string(),
    }
}

/// Lines that narrate instead of delivering ("Here is the 700-word
/// article:"). Wrapped paragraphs never match, so this only fires on raw
/// model output.
fn remove_commentary_lines(content: &str) -> String {
    content
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            trimmed.is_empty() || !COMMENTARY.iter().any(|p| p.is_match(trimmed))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_title(content: &str, fallback: &str) -> String {
    let from_heading = H1_TEXT
        .captures(content)
        .or_else(|| H2_TEXT.captures(content))
        .map(|c| ANY_TAG.replace_all(&c[1], "").trim().to_string())
        .filter(|t| !t.is_empty());

    from_heading.unwrap_or_else(|| fallback.trim().to_string())
}

/// A plain or markdown-heading first line that repeats the title is noise.
fn drop_title_repetition(content: &str, title: &str) -> String {
    let mut lines: Vec<&str> = content.lines().collect();
    if let Some(first_idx) = lines.iter().position(|l| !l.trim().is_empty()) {
        let normalized = lines[first_idx]
            .trim()
            .trim_start_matches('#')
            .trim()
            .trim_matches('*')
            .trim_end_matches(':')
            .trim();
        if !normalized.is_empty() && normalized.eq_ignore_ascii_case(title.trim()) {
            lines.remove(first_idx);
        }
    }
    lines.join("\n")
}

/// Wrap consecutive bare `<li>` lines in a `<ul>`. Runs already preceded by
/// an opening `<ul>` pass through untouched.
fn wrap_li_runs(content: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut out: Vec<String> = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if lines[i].trim_start().starts_with("<li>") {
            let mut j = i;
            while j < lines.len() && lines[j].trim_start().starts_with("<li>") {
                j += 1;
            }
            let already_wrapped = out
                .iter()
                .rev()
                .find(|l| !l.trim().is_empty())
                .is_some_and(|l| l.trim_end().to_lowercase().ends_with("<ul>"));
            if already_wrapped {
                out.extend(lines[i..j].iter().map(|l| l.to_string()));
            } else {
                out.push("<ul>".to_string());
                out.extend(lines[i..j].iter().map(|l| l.to_string()));
                out.push("</ul>".to_string());
            }
            i = j;
        } else {
            out.push(lines[i].to_string());
            i += 1;
        }
    }
    out.join("\n")
}

/// Wrap tag-free blocks in `<p>`. A block containing any markup is left
/// alone, which keeps the pass idempotent.
fn wrap_bare_paragraphs(content: &str) -> String {
    content
        .split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .map(|block| {
            let trimmed = block.trim();
            let has_markup = trimmed.lines().any(|l| l.trim_start().starts_with('<'));
            if has_markup {
                trimmed.to_string()
            } else {
                format!("<p>{}</p>", trimmed)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fences_removed() {
        let raw = "```html\n<h2>Section</h2>\n<p>Text</p>\n```";
        let cleaned = clean_response(raw, "Topic");
        assert!(!cleaned.content.contains("```"));
        assert!(cleaned.content.contains("<h2>Section</h2>"));
    }

    #[test]
    fn test_document_scaffolding_stripped() {
        let raw = "<!DOCTYPE html><html><head><title>T</title></head><body>\
                   <h2>Real</h2><p>Body</p></body></html>";
        let cleaned = clean_response(raw, "Topic");
        assert!(!cleaned.content.to_lowercase().contains("<html"));
        assert!(!cleaned.content.to_lowercase().contains("<head"));
        assert!(!cleaned.content.to_lowercase().contains("<body"));
        assert!(cleaned.content.contains("<h2>Real</h2>"));
    }

    #[test]
    fn test_commentary_lines_dropped() {
        let raw = "Here is the 1500-word article:\n\n<h2>Opening</h2>\n<p>Text</p>";
        let cleaned = clean_response(raw, "Topic");
        assert!(cleaned.content.starts_with("<h2>Opening</h2>"));

        let raw = "I've written the piece you asked for.\n\n<p>Text</p>";
        let cleaned = clean_response(raw, "Topic");
        assert!(cleaned.content.starts_with("<p>Text</p>"));

        let raw = "[700 word article]\n<p>Text</p>";
        let cleaned = clean_response(raw, "Topic");
        assert!(cleaned.content.starts_with("<p>Text</p>"));
    }

    #[test]
    fn test_html_comments_removed() {
        let raw = "<p>Keep</p><!-- internal note -->\n<p>Also keep</p>";
        let cleaned = clean_response(raw, "Topic");
        assert!(!cleaned.content.contains("internal note"));
    }

    #[test]
    fn test_title_from_h1_else_fallback() {
        let cleaned = clean_response("<h1>Real Title</h1>\n<p>x</p>", "Fallback");
        assert_eq!(cleaned.title, "Real Title");

        let cleaned = clean_response("<p>No headings here</p>", "Fallback");
        assert_eq!(cleaned.title, "Fallback");
    }

    #[test]
    fn test_first_line_title_repetition_removed() {
        let raw = "How to Wax a Surfboard\n\n<p>Content starts</p>";
        let cleaned = clean_response(raw, "How to Wax a Surfboard");
        assert!(cleaned.content.starts_with("<p>Content starts</p>"));

        let raw = "# How to Wax a Surfboard\n\n<p>Content</p>";
        let cleaned = clean_response(raw, "How to Wax a Surfboard");
        assert!(!cleaned.content.contains("How to Wax"));
    }

    #[test]
    fn test_markdown_converted_and_lists_wrapped() {
        let raw = "## Section One\n\n### Detail\n\n* first\n* second\n- third";
        let cleaned = clean_response(raw, "Topic");
        assert!(cleaned.content.contains("<h2>Section One</h2>"));
        assert!(cleaned.content.contains("<h3>Detail</h3>"));
        assert!(cleaned.content.contains("<ul>\n<li>first</li>\n<li>second</li>\n<li>third</li>\n</ul>"));
    }

    #[test]
    fn test_bare_paragraphs_wrapped() {
        let raw = "<h2>Head</h2>\n\nJust a bare paragraph of text.";
        let cleaned = clean_response(raw, "Topic");
        assert!(cleaned
            .content
            .contains("<p>Just a bare paragraph of text.</p>"));
    }

    #[test]
    fn test_blank_runs_collapsed() {
        let raw = "<p>a</p>\n\n\n\n\n<p>b</p>";
        let cleaned = clean_response(raw, "Topic");
        assert!(!cleaned.content.contains("\n\n\n"));
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let samples = [
            "```html\n# How to Wax\n\nHere is the 700-word article:\n\n## Steps\n\n* one\n* two\n\nBare text paragraph.\n\n\n\n<p>Done</p>",
            "<!DOCTYPE html><html><body><h1>Title</h1><p>Body is a thing.</p></body></html>",
            "<h2>Already clean</h2>\n\n<p>Nothing to do.</p>",
            "<h2>List</h2>\n\n<ul>\n<li>kept</li>\n</ul>",
        ];
        for raw in samples {
            let once = clean_response(raw, "How to Wax");
            let twice = clean_response(&once.content, "How to Wax");
            assert_eq!(once.content, twice.content, "not idempotent for {:?}", raw);
        }
    }
}
