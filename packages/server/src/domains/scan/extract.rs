//! HTML metadata extraction for the website scanner.

use scraper::{Html, Selector};
use url::Url;

use crate::domains::store::types::NavLink;

/// Keyword phrase-segment length bounds.
const KEYWORD_MIN_CHARS: usize = 4;
const KEYWORD_MAX_CHARS: usize = 25;

/// Common words that say nothing about a site's niche.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "your", "that", "this", "are", "was", "have", "has",
    "will", "been", "were", "them", "then", "than", "what", "when", "where", "how", "why",
    "home", "page", "about", "contact", "more", "read", "here", "click", "welcome",
];

/// What one page yields.
#[derive(Debug, Clone, Default)]
pub struct PageExtract {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    /// h1 and h2 text, document order
    pub headings: Vec<String>,
    /// Candidate keyword segments, lowercased
    pub keywords: Vec<String>,
}

/// Extract title, meta description, headings, and keyword candidates.
pub fn extract_page(html: &str) -> PageExtract {
    let document = Html::parse_document(html);

    let title = select_first_text(&document, "title");
    let meta_description = select_meta(&document, "meta[name='description']");

    let mut headings = Vec::new();
    for selector_str in ["h1", "h2"] {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in document.select(&selector) {
                let text = element.text().collect::<String>().trim().to_string();
                if !text.is_empty() {
                    headings.push(text);
                }
            }
        }
    }

    let mut keywords = Vec::new();
    if let Some(meta_keywords) = select_meta(&document, "meta[name='keywords']") {
        for candidate in meta_keywords.split(',') {
            push_keyword(&mut keywords, candidate);
        }
    }
    let mut sources: Vec<&str> = Vec::new();
    if let Some(title) = title.as_deref() {
        sources.push(title);
    }
    sources.extend(headings.iter().map(String::as_str));
    for source in sources {
        for segment in source.split(['-', '|', ':', ',']) {
            push_keyword(&mut keywords, segment);
        }
    }

    PageExtract {
        title,
        meta_description,
        headings,
        keywords,
    }
}

fn push_keyword(keywords: &mut Vec<String>, candidate: &str) {
    let cleaned = candidate.trim().to_lowercase();
    let len = cleaned.chars().count();
    if !(KEYWORD_MIN_CHARS..=KEYWORD_MAX_CHARS).contains(&len) {
        return;
    }
    if STOP_WORDS.contains(&cleaned.as_str()) {
        return;
    }
    if !keywords.contains(&cleaned) {
        keywords.push(cleaned);
    }
}

fn select_first_text(document: &Html, selector_str: &str) -> Option<String> {
    let selector = Selector::parse(selector_str).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn select_meta(document: &Html, selector_str: &str) -> Option<String> {
    let selector = Selector::parse(selector_str).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// Navigation links from <nav> and <header> regions: same-domain, resolved
/// against the base URL, fragments dropped, deduplicated by URL.
pub fn extract_nav_links(html: &str, base: &Url) -> Vec<NavLink> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("nav a[href], header a[href]") else {
        return Vec::new();
    };

    let base_host = host_without_www(base);
    let mut links: Vec<NavLink> = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.to_lowercase().starts_with("javascript:")
        {
            continue;
        }
        let Ok(mut resolved) = base.join(href) else {
            continue;
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }
        if host_without_www(&resolved) != base_host {
            continue;
        }
        resolved.set_fragment(None);

        let url = resolved.to_string();
        if links.iter().any(|l| l.url == url) {
            continue;
        }
        let text = element.text().collect::<String>().trim().to_string();
        links.push(NavLink { url, text });
    }

    links
}

fn host_without_www(url: &Url) -> String {
    url.host_str()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOMEPAGE: &str = r##"
        <html>
        <head>
            <title>Surf Report - Daily Surf Forecasts | Gear Reviews</title>
            <meta name="description" content="Daily surf forecasts and honest gear reviews.">
            <meta name="keywords" content="surf forecast, surfboard, the">
        </head>
        <body>
            <header>
                <a href="/forecasts">Forecasts</a>
                <a href="https://surf.example.com/gear#top">Gear</a>
            </header>
            <nav>
                <a href="/forecasts">Forecasts</a>
                <a href="/blog">Blog</a>
                <a href="javascript:void(0)">Menu</a>
                <a href="#section">Jump</a>
                <a href="https://othersite.com/away">Partner</a>
            </nav>
            <h1>Surf Report</h1>
            <h2>Today's Conditions: Clean Waves</h2>
            <h2>Best Beginner Boards</h2>
        </body>
        </html>
    "##;

    #[test]
    fn test_extract_page_metadata() {
        let extract = extract_page(HOMEPAGE);
        assert_eq!(
            extract.title.as_deref(),
            Some("Surf Report - Daily Surf Forecasts | Gear Reviews")
        );
        assert_eq!(
            extract.meta_description.as_deref(),
            Some("Daily surf forecasts and honest gear reviews.")
        );
        assert_eq!(extract.headings.len(), 3);
    }

    #[test]
    fn test_keywords_from_meta_and_segments() {
        let extract = extract_page(HOMEPAGE);
        // Meta keywords survive the length filter; "the" is a stop word
        assert!(extract.keywords.contains(&"surf forecast".to_string()));
        assert!(extract.keywords.contains(&"surfboard".to_string()));
        assert!(!extract.keywords.contains(&"the".to_string()));
        // Title segments split on - and |
        assert!(extract.keywords.contains(&"surf report".to_string()));
        assert!(extract.keywords.contains(&"daily surf forecasts".to_string()));
        assert!(extract.keywords.contains(&"gear reviews".to_string()));
        // Heading segment split on :
        assert!(extract.keywords.contains(&"clean waves".to_string()));
    }

    #[test]
    fn test_keyword_length_bounds() {
        let html = "<h1>abc: this segment is far too long to be a keyword candidate</h1>";
        let extract = extract_page(html);
        assert!(extract.keywords.is_empty());
    }

    #[test]
    fn test_nav_links_filtered_and_deduped() {
        let base = Url::parse("https://surf.example.com/").unwrap();
        let links = extract_nav_links(HOMEPAGE, &base);

        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert!(urls.contains(&"https://surf.example.com/forecasts"));
        assert!(urls.contains(&"https://surf.example.com/blog"));
        // Fragment dropped from /gear#top
        assert!(urls.contains(&"https://surf.example.com/gear"));
        // javascript:, pure-fragment, and cross-domain links excluded
        assert!(!urls.iter().any(|u| u.contains("javascript")));
        assert!(!urls.iter().any(|u| u.contains("othersite")));
        // /forecasts appears in header and nav but only once here
        assert_eq!(urls.iter().filter(|u| u.ends_with("/forecasts")).count(), 1);
    }

    #[test]
    fn test_nav_links_keep_www_variant() {
        let base = Url::parse("https://www.surf.example.com/").unwrap();
        let html = r#"<nav><a href="https://surf.example.com/blog">Blog</a></nav>"#;
        let links = extract_nav_links(html, &base);
        assert_eq!(links.len(), 1);
    }
}
