//! Sitemap discovery and XML parsing.
//!
//! Discovery order: `Sitemap:` entries from robots.txt, then the well-known
//! fallback locations. Sitemap index files are expanded one level, and all
//! discovered URLs are filtered to the seed's site.

use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};
use url::Url;

use super::frontier::same_site;
use crate::crawler::robots::RobotsTxt;

/// Fallback sitemap locations probed after robots.txt entries.
const FALLBACK_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml", "/sitemaps.xml"];

/// Child sitemaps fetched from one index file, at most.
const MAX_CHILD_SITEMAPS: usize = 50;

/// A single entry from a sitemap.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    /// Page URL
    pub url: String,

    /// Last modification date, if declared
    pub lastmod: Option<DateTime<Utc>>,

    /// Relative priority (0.0 to 1.0), if declared
    pub priority: Option<f32>,
}

/// Parsed sitemap content: either page entries or an index of sitemaps.
#[derive(Debug)]
enum SitemapContent {
    Entries(Vec<SitemapEntry>),
    Index(Vec<String>),
}

/// Discover sitemap URLs for a seed, filtered to the seed's site.
pub async fn discover(
    client: &reqwest::Client,
    seed: &Url,
    robots: &RobotsTxt,
    user_agent: &str,
) -> Vec<SitemapEntry> {
    let mut candidates: Vec<String> = robots.sitemaps().to_vec();
    for path in FALLBACK_PATHS {
        if let Ok(u) = seed.join(path) {
            let u = u.to_string();
            if !candidates.contains(&u) {
                candidates.push(u);
            }
        }
    }

    let mut entries: Vec<SitemapEntry> = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    for candidate in candidates {
        let Some(content) = fetch_and_parse(client, &candidate, user_agent).await else {
            continue;
        };

        let found = match content {
            SitemapContent::Entries(found) => found,
            SitemapContent::Index(children) => {
                // Index files are expanded one level only.
                let mut expanded = Vec::new();
                for child in children.into_iter().take(MAX_CHILD_SITEMAPS) {
                    match fetch_and_parse(client, &child, user_agent).await {
                        Some(SitemapContent::Entries(found)) => expanded.extend(found),
                        Some(SitemapContent::Index(_)) => {
                            debug!(url = %child, "nested sitemap index skipped");
                        }
                        None => {}
                    }
                }
                expanded
            }
        };

        for entry in found {
            let Ok(parsed) = Url::parse(&entry.url) else {
                continue;
            };
            if !same_site(seed, &parsed) {
                continue;
            }
            if seen.insert(entry.url.clone()) {
                entries.push(entry);
            }
        }
    }

    debug!(count = entries.len(), "sitemap discovery finished");
    entries
}

async fn fetch_and_parse(
    client: &reqwest::Client,
    url: &str,
    user_agent: &str,
) -> Option<SitemapContent> {
    let response = match client.get(url).header("User-Agent", user_agent).send().await {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            debug!(url = %url, status = %r.status(), "sitemap not available");
            return None;
        }
        Err(e) => {
            debug!(url = %url, error = %e, "sitemap fetch failed");
            return None;
        }
    };

    let body = response.text().await.ok()?;
    let trimmed = body.trim_start();
    if trimmed.starts_with("<!DOCTYPE") || trimmed.starts_with("<html") {
        warn!(url = %url, "sitemap URL returned HTML instead of XML");
        return None;
    }

    match parse(&body) {
        Ok(content) => Some(content),
        Err(e) => {
            warn!(url = %url, error = %e, "failed to parse sitemap");
            None
        }
    }
}

/// Parse sitemap XML into entries or index children.
fn parse(xml: &str) -> Result<SitemapContent, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);

    let mut is_index = false;
    let mut entries: Vec<SitemapEntry> = Vec::new();
    let mut children: Vec<String> = Vec::new();

    let mut current_tag: Option<String> = None;
    let mut loc: Option<String> = None;
    let mut lastmod: Option<DateTime<Utc>> = None;
    let mut priority: Option<f32> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "sitemapindex" => is_index = true,
                    "url" | "sitemap" => {
                        loc = None;
                        lastmod = None;
                        priority = None;
                    }
                    _ => {}
                }
                current_tag = Some(name);
            }
            Event::Text(t) => {
                let text = t.unescape().unwrap_or_default().trim().to_string();
                if text.is_empty() {
                    continue;
                }
                match current_tag.as_deref() {
                    Some("loc") => loc = Some(text),
                    Some("lastmod") => lastmod = parse_lastmod(&text),
                    Some("priority") => priority = text.parse().ok(),
                    _ => {}
                }
            }
            Event::End(e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"url" => {
                        if let Some(url) = loc.take() {
                            entries.push(SitemapEntry {
                                url,
                                lastmod: lastmod.take(),
                                priority: priority.take(),
                            });
                        }
                    }
                    b"sitemap" => {
                        if let Some(url) = loc.take() {
                            children.push(url);
                        }
                    }
                    _ => {}
                }
                current_tag = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if is_index {
        Ok(SitemapContent::Index(children))
    } else {
        Ok(SitemapContent::Entries(entries))
    }
}

/// Parse a `lastmod` value: full RFC 3339 or a bare date.
fn parse_lastmod(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
