//! Website scanner.
//!
//! Produces a content profile of a tenant's public site (title, keywords,
//! headings, navigation, themes, niche) so topic discovery stays on-topic.
//! Completed scans are cached in the central store and reused until they
//! age past the website's scan frequency.

pub mod extract;

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::domains::store::gateway::BaseCentralStore;
use crate::domains::store::types::{NavLink, ScanStatus, Website, WebsiteScan};
use crate::kernel::http::HttpFetcher;
use crate::kernel::llm_request::LlmRequest;
use crate::kernel::providers::BaseAi;
use extract::{extract_nav_links, extract_page, PageExtract};

const HOMEPAGE_TIMEOUT: Duration = Duration::from_secs(10);
const NAV_PAGE_TIMEOUT: Duration = Duration::from_secs(6);

/// Nav pages fetched during a persisted scan / a stateless preview.
const SCAN_NAV_PAGES: usize = 5;
const PREVIEW_NAV_PAGES: usize = 6;

/// Stored caps.
const MAX_KEYWORDS: usize = 50;
const MAX_HEADINGS: usize = 30;
const MAX_NAV_LINKS: usize = 10;

/// Analyzer input caps.
const ANALYZER_HEADINGS: usize = 20;
const ANALYZER_KEYWORDS: usize = 30;

/// Scan failures.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Could not reach {domain}: {reason}")]
    Unreachable { domain: String, reason: String },

    #[error("Invalid domain: {0}")]
    BadDomain(String),
}

/// What a crawl yields before it is attached to a website row.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanProfile {
    pub homepage_title: Option<String>,
    pub meta_description: Option<String>,
    pub main_keywords: Vec<String>,
    pub headings: Vec<String>,
    pub navigation_links: Vec<NavLink>,
    pub content_themes: Vec<String>,
    pub niche_description: Option<String>,
    pub language: Option<String>,
    pub pages_scanned: i32,
}

/// AI analyzer response shape.
#[derive(Debug, Deserialize)]
struct ScanAnalysis {
    #[serde(default)]
    niche_description: Option<String>,
    #[serde(default)]
    themes: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    language: Option<String>,
}

/// Crawls tenant sites and maintains their WebsiteScan rows.
pub struct WebsiteScanner {
    fetcher: HttpFetcher,
}

impl WebsiteScanner {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }

    /// Return a usable scan, running one only when the cached scan is
    /// missing, incomplete, or stale. A failed scan is recorded but never
    /// fatal: the caller gets whatever prior scan exists.
    pub async fn ensure_scan(
        &self,
        website: &Website,
        store: &dyn BaseCentralStore,
        ai: Option<&dyn BaseAi>,
        now: DateTime<Utc>,
    ) -> Result<Option<WebsiteScan>> {
        let existing = store.get_website_scan(&website.id).await?;
        if let Some(scan) = &existing {
            if scan_is_fresh(scan, website.scan_frequency_days, now) {
                tracing::debug!(website = %website.id, "Reusing cached website scan");
                return Ok(existing);
            }
        }

        match self.run_scan(website, store, ai, now).await {
            Ok(scan) => Ok(Some(scan)),
            Err(e) => {
                tracing::warn!(website = %website.id, error = %e, "Website scan failed");
                Ok(existing)
            }
        }
    }

    /// Run a full scan and persist the result.
    pub async fn run_scan(
        &self,
        website: &Website,
        store: &dyn BaseCentralStore,
        ai: Option<&dyn BaseAi>,
        now: DateTime<Utc>,
    ) -> Result<WebsiteScan> {
        store
            .set_scan_status(&website.id, ScanStatus::Scanning, None)
            .await?;

        let profile = match self.crawl(&website.domain, SCAN_NAV_PAGES, ai).await {
            Ok(profile) => profile,
            Err(e) => {
                store
                    .set_scan_status(&website.id, ScanStatus::Failed, Some(&e.to_string()))
                    .await?;
                return Err(e.into());
            }
        };

        let scan = WebsiteScan {
            website_id: website.id.clone(),
            homepage_title: profile.homepage_title,
            meta_description: profile.meta_description,
            main_keywords: profile.main_keywords,
            headings: profile.headings,
            navigation_links: profile.navigation_links,
            content_themes: profile.content_themes,
            niche_description: profile.niche_description,
            pages_scanned: profile.pages_scanned,
            status: ScanStatus::Completed,
            last_scanned_at: Some(now),
            error_message: None,
        };
        store.upsert_website_scan(&scan).await?;

        tracing::info!(
            website = %website.id,
            pages = scan.pages_scanned,
            keywords = scan.main_keywords.len(),
            "Website scan completed"
        );
        Ok(scan)
    }

    /// Stateless preview: crawl a domain without touching the store.
    pub async fn preview(
        &self,
        domain: &str,
        ai: Option<&dyn BaseAi>,
    ) -> Result<ScanProfile, ScanError> {
        self.crawl(domain, PREVIEW_NAV_PAGES, ai).await
    }

    async fn crawl(
        &self,
        domain: &str,
        max_nav_pages: usize,
        ai: Option<&dyn BaseAi>,
    ) -> Result<ScanProfile, ScanError> {
        let (base, homepage_html) = self.fetch_homepage(domain).await?;
        let homepage = extract_page(&homepage_html);

        let mut nav_links = extract_nav_links(&homepage_html, &base);
        nav_links.truncate(MAX_NAV_LINKS);

        let mut profile = ScanProfile {
            homepage_title: homepage.title.clone(),
            meta_description: homepage.meta_description.clone(),
            main_keywords: homepage.keywords.clone(),
            headings: homepage.headings.clone(),
            navigation_links: nav_links.clone(),
            pages_scanned: 1,
            ..Default::default()
        };

        for link in nav_links.iter().take(max_nav_pages) {
            match self.fetcher.fetch_page(&link.url, NAV_PAGE_TIMEOUT).await {
                Ok(html) => {
                    merge_page(&mut profile, extract_page(&html));
                    profile.pages_scanned += 1;
                }
                Err(e) => {
                    tracing::debug!(url = %link.url, error = %e, "Nav page fetch failed");
                }
            }
        }

        if let Some(ai) = ai {
            match self.analyze(&profile, ai).await {
                Ok(analysis) => {
                    for keyword in analysis.keywords {
                        let keyword = keyword.trim().to_lowercase();
                        if !keyword.is_empty() && !profile.main_keywords.contains(&keyword) {
                            profile.main_keywords.push(keyword);
                        }
                    }
                    profile.content_themes = analysis.themes;
                    profile.niche_description = analysis
                        .niche_description
                        .filter(|d| !d.trim().is_empty());
                    profile.language = analysis.language;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Scan AI analysis failed, keeping raw extract");
                }
            }
        }

        profile.main_keywords.truncate(MAX_KEYWORDS);
        profile.headings.truncate(MAX_HEADINGS);
        profile.navigation_links.truncate(MAX_NAV_LINKS);

        Ok(profile)
    }

    /// Fetch the homepage, falling back to the `www.` variant once.
    async fn fetch_homepage(&self, domain: &str) -> Result<(Url, String), ScanError> {
        let domain = domain.trim().trim_end_matches('/');
        if domain.is_empty() {
            return Err(ScanError::BadDomain(domain.to_string()));
        }
        let primary = normalize_url(domain);

        let first_error = match self.fetcher.fetch_page(&primary, HOMEPAGE_TIMEOUT).await {
            Ok(html) => {
                let base = Url::parse(&primary)
                    .map_err(|e| ScanError::BadDomain(e.to_string()))?;
                return Ok((base, html));
            }
            Err(e) => e,
        };

        let bare = domain
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        if !bare.starts_with("www.") {
            let fallback = format!("https://www.{}", bare);
            if let Ok(html) = self.fetcher.fetch_page(&fallback, HOMEPAGE_TIMEOUT).await {
                let base = Url::parse(&fallback)
                    .map_err(|e| ScanError::BadDomain(e.to_string()))?;
                return Ok((base, html));
            }
        }

        Err(ScanError::Unreachable {
            domain: domain.to_string(),
            reason: first_error.to_string(),
        })
    }

    async fn analyze(&self, profile: &ScanProfile, ai: &dyn BaseAi) -> Result<ScanAnalysis> {
        let headings: Vec<&str> = profile
            .headings
            .iter()
            .take(ANALYZER_HEADINGS)
            .map(String::as_str)
            .collect();
        let keywords: Vec<&str> = profile
            .main_keywords
            .iter()
            .take(ANALYZER_KEYWORDS)
            .map(String::as_str)
            .collect();

        let prompt = format!(
            "Classify this website from its homepage metadata.\n\
             Title: {title}\n\
             Meta description: {meta}\n\
             Headings: {headings}\n\
             Keywords: {keywords}\n\n\
             Return JSON with: \"niche_description\" (1-2 sentences on what the \
             site is about), \"themes\" (3-6 short content themes), \"keywords\" \
             (up to 10 additional keywords worth targeting), \"language\" \
             (BCP 47 tag of the site's language).",
            title = profile.homepage_title.as_deref().unwrap_or("(none)"),
            meta = profile.meta_description.as_deref().unwrap_or("(none)"),
            headings = headings.join("; "),
            keywords = keywords.join(", "),
        );

        LlmRequest::new(ai)
            .system("You classify websites into content niches.")
            .user(prompt)
            .schema_hint(
                r#"{"niche_description": "...", "themes": ["..."], "keywords": ["..."], "language": "en"}"#,
            )
            .max_retries(2)
            .output()
            .await
    }
}

fn merge_page(profile: &mut ScanProfile, page: PageExtract) {
    for heading in page.headings {
        if !profile.headings.contains(&heading) {
            profile.headings.push(heading);
        }
    }
    for keyword in page.keywords {
        if !profile.main_keywords.contains(&keyword) {
            profile.main_keywords.push(keyword);
        }
    }
}

fn normalize_url(domain: &str) -> String {
    if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("https://{}", domain)
    }
}

/// A completed scan younger than the website's scan frequency is reused.
pub fn scan_is_fresh(scan: &WebsiteScan, scan_frequency_days: i64, now: DateTime<Utc>) -> bool {
    if scan.status != ScanStatus::Completed {
        return false;
    }
    let Some(scanned_at) = scan.last_scanned_at else {
        return false;
    };
    now - scanned_at < ChronoDuration::days(scan_frequency_days.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_with_age(days_old: i64, status: ScanStatus) -> (WebsiteScan, DateTime<Utc>) {
        let now = Utc::now();
        let mut scan = WebsiteScan::pending("w1");
        scan.status = status;
        scan.last_scanned_at = Some(now - ChronoDuration::days(days_old));
        (scan, now)
    }

    #[test]
    fn test_fresh_scan_is_reused() {
        let (scan, now) = scan_with_age(3, ScanStatus::Completed);
        assert!(scan_is_fresh(&scan, 7, now));
    }

    #[test]
    fn test_stale_scan_is_not_reused() {
        let (scan, now) = scan_with_age(8, ScanStatus::Completed);
        assert!(!scan_is_fresh(&scan, 7, now));
    }

    #[test]
    fn test_incomplete_scan_is_never_fresh() {
        let (scan, now) = scan_with_age(0, ScanStatus::Failed);
        assert!(!scan_is_fresh(&scan, 7, now));
        let (scan, now) = scan_with_age(0, ScanStatus::Pending);
        assert!(!scan_is_fresh(&scan, 7, now));
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
    }

    #[test]
    fn test_merge_page_dedupes() {
        let mut profile = ScanProfile {
            headings: vec!["About".to_string()],
            main_keywords: vec!["surf wax".to_string()],
            ..Default::default()
        };
        merge_page(
            &mut profile,
            PageExtract {
                title: None,
                meta_description: None,
                headings: vec!["About".to_string(), "Guides".to_string()],
                keywords: vec!["surf wax".to_string(), "longboards".to_string()],
            },
        );
        assert_eq!(profile.headings, vec!["About", "Guides"]);
        assert_eq!(profile.main_keywords, vec!["surf wax", "longboards"]);
    }
}
