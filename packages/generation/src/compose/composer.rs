//! Artifact composition.
//!
//! Groups pages into sections by URL path prefix, allocates the size budget
//! by priority, summarizes each page to its allocation, and assembles the
//! final artifacts with a stable structure. Given identical inputs and
//! summarizer outputs the emitted bytes are identical.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;

use crate::error::GenerationError;
use crate::jobs::CancelToken;
use crate::traits::summarize::Summarize;
use crate::types::{Artifact, ArtifactKind, Page};

/// Fraction of the budget reserved for the header block.
const HEADER_RESERVE_PERCENT: usize = 5;

/// Minimum bytes an admitted section must receive.
const SECTION_FLOOR_BYTES: usize = 1024;

/// Multiplier for the llms-full.txt safety cap.
const FULL_VERSION_CAP_FACTOR: usize = 10;

/// Composes `llm.txt` and `llms-full.txt` from a page set.
pub struct Composer {
    source_url: String,
    size_cap_kb: usize,
    generated_at: DateTime<Utc>,
}

struct Section<'a> {
    name: String,
    pages: Vec<&'a Page>,
    avg_score: f64,
    total_len: usize,
}

struct PageBlock {
    section: String,
    score: f64,
    text: String,
}

impl Composer {
    /// Create a composer.
    ///
    /// `generated_at` is injected by the caller so repeated runs over the
    /// same inputs produce identical bytes.
    pub fn new(
        source_url: impl Into<String>,
        size_cap_kb: usize,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            size_cap_kb,
            generated_at,
        }
    }

    /// Compose the size-capped `llm.txt`.
    pub async fn compose(
        &self,
        pages: &[Page],
        summarizer: &dyn Summarize,
        cancel: &CancelToken,
    ) -> Result<Artifact, GenerationError> {
        let sections = group_sections(pages)?;
        let cap_bytes = self.size_cap_kb * 1024;
        let header_reserve = cap_bytes * HEADER_RESERVE_PERCENT / 100;
        let body_budget = cap_bytes.saturating_sub(header_reserve);

        let (admitted, trimmed_sections) = allocate_sections(&sections, body_budget);

        let mut blocks: Vec<PageBlock> = Vec::new();
        let mut unsummarized: Vec<String> = Vec::new();

        for (section, alloc_bytes) in &admitted {
            let page_allocs = allocate_pages(&section.pages, *alloc_bytes);
            for (page, page_bytes) in page_allocs {
                cancel.check()?;

                let target_kb = (page_bytes / 1024).max(1);
                let outcome = summarizer.summarize(&page.markdown, target_kb).await;
                if !outcome.summarized {
                    unsummarized.push(page.title.clone());
                }

                let body = outcome.markdown.trim();
                if body.is_empty() {
                    continue;
                }
                blocks.push(PageBlock {
                    section: section.name.clone(),
                    score: page.score,
                    text: format!("### {}\n\n{}", page.title, body),
                });
            }
        }

        let section_names: Vec<String> = admitted.iter().map(|(s, _)| s.name.clone()).collect();
        let header = self.header(pages, &section_names);
        let mut content = fit_to_cap(&header, &section_names, &mut blocks, cap_bytes);

        // Trim report rides along only when it fits in the leftover budget.
        let report = trim_report(&trimmed_sections, &unsummarized);
        if !report.is_empty() && content.len() + report.len() <= cap_bytes {
            content.push_str(&report);
        }

        Ok(Artifact::new(ArtifactKind::LlmTxt, content, ""))
    }

    /// Compose the uncompressed `llms-full.txt`.
    ///
    /// No summarization; bounded only by a 10x safety cap.
    pub fn compose_full(&self, pages: &[Page]) -> Result<Artifact, GenerationError> {
        let sections = group_sections(pages)?;
        let cap_bytes = self.size_cap_kb * 1024 * FULL_VERSION_CAP_FACTOR;

        let mut blocks: Vec<PageBlock> = Vec::new();
        for section in &sections {
            for page in &section.pages {
                blocks.push(PageBlock {
                    section: section.name.clone(),
                    score: page.score,
                    text: format!(
                        "### {}\n\n**URL**: {}\n\n{}",
                        page.title,
                        page.url,
                        page.markdown.trim()
                    ),
                });
            }
        }

        let section_names: Vec<String> = sections.iter().map(|s| s.name.clone()).collect();
        let header = self.header(pages, &section_names);
        let content = fit_to_cap(&header, &section_names, &mut blocks, cap_bytes);

        Ok(Artifact::new(ArtifactKind::LlmsFullTxt, content, ""))
    }

    fn header(&self, pages: &[Page], sections: &[String]) -> String {
        let mut out = format!(
            "# {}\n> Source: {}\n> Generated: {}\n",
            site_title(pages, &self.source_url),
            self.source_url,
            self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        out.push_str("\n## Index\n");
        for section in sections {
            let display = display_name(section);
            out.push_str(&format!("- [{}](#{})\n", display, slugify(&display)));
        }
        out
    }
}

/// Group usable pages into sections ordered by aggregate priority.
fn group_sections(pages: &[Page]) -> Result<Vec<Section<'_>>, GenerationError> {
    let mut by_name: BTreeMap<String, Vec<&Page>> = BTreeMap::new();
    for page in pages.iter().filter(|p| p.is_usable()) {
        by_name.entry(page.section()).or_default().push(page);
    }

    if by_name.is_empty() {
        return Err(GenerationError::Compose(
            "no admissible pages to compose".to_string(),
        ));
    }

    let mut sections: Vec<Section<'_>> = by_name
        .into_iter()
        .map(|(name, mut pages)| {
            // Deterministic intra-section order: priority, then URL.
            pages.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.url.cmp(&b.url))
            });
            let avg_score = pages.iter().map(|p| p.score).sum::<f64>() / pages.len() as f64;
            let total_len = pages.iter().map(|p| p.byte_len()).sum();
            Section {
                name,
                pages,
                avg_score,
                total_len,
            }
        })
        .collect();

    sections.sort_by(|a, b| {
        b.avg_score
            .partial_cmp(&a.avg_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.total_len.cmp(&a.total_len))
            .then_with(|| a.name.cmp(&b.name))
    });

    Ok(sections)
}

/// Allocate the body budget across sections proportionally to priority
/// weights, dropping sections that cannot meet the floor.
fn allocate_sections<'a, 'b>(
    sections: &'b [Section<'a>],
    body_budget: usize,
) -> (Vec<(&'b Section<'a>, usize)>, Vec<String>) {
    let min_score = sections
        .iter()
        .map(|s| s.avg_score)
        .fold(f64::INFINITY, f64::min);

    let mut admitted: Vec<&Section<'_>> = sections.iter().collect();
    let mut trimmed: Vec<String> = Vec::new();

    loop {
        if admitted.is_empty() {
            return (Vec::new(), trimmed);
        }

        let weights: Vec<f64> = admitted
            .iter()
            .map(|s| s.avg_score - min_score + 1.0)
            .collect();
        let total: f64 = weights.iter().sum();

        let allocs: Vec<usize> = weights
            .iter()
            .map(|w| ((body_budget as f64) * w / total) as usize)
            .collect();

        // Drop the lowest-priority section below the floor and retry.
        let under = admitted
            .iter()
            .zip(&allocs)
            .enumerate()
            .rev()
            .find(|(_, (_, alloc))| **alloc < SECTION_FLOOR_BYTES)
            .map(|(i, _)| i);

        match under {
            Some(i) => {
                trimmed.push(admitted.remove(i).name.clone());
            }
            None => {
                return (
                    admitted.into_iter().zip(allocs).collect(),
                    trimmed,
                );
            }
        }
    }
}

/// Split a section allocation across its pages by page priority.
fn allocate_pages<'a, 'b>(pages: &'b [&'a Page], alloc_bytes: usize) -> Vec<(&'a Page, usize)> {
    let min_score = pages.iter().map(|p| p.score).fold(f64::INFINITY, f64::min);
    let weights: Vec<f64> = pages.iter().map(|p| p.score - min_score + 1.0).collect();
    let total: f64 = weights.iter().sum();

    pages
        .iter()
        .zip(&weights)
        .map(|(page, w)| (*page, ((alloc_bytes as f64) * w / total) as usize))
        .collect()
}

/// Assemble, then drop whole lowest-priority pages until the result fits
/// the cap. Pages are never truncated mid-body.
fn fit_to_cap(
    header: &str,
    section_names: &[String],
    blocks: &mut Vec<PageBlock>,
    cap_bytes: usize,
) -> String {
    let mut content = assemble(header, section_names, blocks);
    while content.len() > cap_bytes && !blocks.is_empty() {
        let lowest = blocks
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.score
                    .partial_cmp(&b.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i);
        let Some(i) = lowest else { break };
        blocks.remove(i);
        content = assemble(header, section_names, blocks);
    }
    content
}

/// Assemble header plus section bodies in section order.
fn assemble(header: &str, section_names: &[String], blocks: &[PageBlock]) -> String {
    let mut out = String::from(header);
    for name in section_names {
        let section_blocks: Vec<&PageBlock> =
            blocks.iter().filter(|b| &b.section == name).collect();
        if section_blocks.is_empty() {
            continue;
        }
        out.push_str(&format!("\n## {}\n", display_name(name)));
        for block in section_blocks {
            out.push('\n');
            out.push_str(&block.text);
            out.push('\n');
        }
    }
    out
}

fn trim_report(trimmed_sections: &[String], unsummarized: &[String]) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !trimmed_sections.is_empty() {
        parts.push(format!("trimmed sections: {}", trimmed_sections.join(", ")));
    }
    if !unsummarized.is_empty() {
        parts.push(format!("unsummarized pages: {}", unsummarized.join(", ")));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("\n<!-- {} -->\n", parts.join("; "))
    }
}

/// Site title: the shallowest page's title, else the source host.
fn site_title(pages: &[Page], source_url: &str) -> String {
    pages
        .iter()
        .filter(|p| p.is_usable() && !p.title.is_empty() && p.title != p.url)
        .min_by_key(|p| p.depth)
        .map(|p| p.title.clone())
        .or_else(|| {
            url::Url::parse(source_url)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.to_string()))
        })
        .unwrap_or_else(|| "Documentation".to_string())
}

fn display_name(section: &str) -> String {
    let mut chars = section.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash && !out.is_empty() {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarize::TruncatingSummarizer;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn page(url: &str, title: &str, score: f64, body: &str) -> Page {
        Page::new(url, 1, body).with_title(title).with_score(score)
    }

    fn fixture_pages() -> Vec<Page> {
        vec![
            page(
                "https://example.com/guide/intro",
                "Introduction",
                12.0,
                &format!("# Introduction\n\n{}", "Guide prose. ".repeat(50)),
            ),
            page(
                "https://example.com/guide/setup",
                "Setup",
                11.0,
                &format!("# Setup\n\n{}", "Install steps. ".repeat(50)),
            ),
            page(
                "https://example.com/api/client",
                "Client API",
                10.0,
                &format!("# Client API\n\n{}", "Endpoint details. ".repeat(50)),
            ),
        ]
    }

    #[tokio::test]
    async fn test_compose_structure() {
        let composer = Composer::new("https://example.com", 50, at());
        let artifact = composer
            .compose(&fixture_pages(), &TruncatingSummarizer, &CancelToken::unlimited())
            .await
            .unwrap();

        let content = &artifact.content;
        assert!(content.starts_with("# Introduction\n"));
        assert!(content.contains("> Source: https://example.com\n"));
        assert!(content.contains("> Generated: 2024-06-01T12:00:00Z\n"));
        assert!(content.contains("## Index\n"));
        assert!(content.contains("- [Guide](#guide)"));
        assert!(content.contains("- [Api](#api)"));
        assert!(content.contains("\n## Guide\n"));
        assert!(content.contains("\n### Setup\n"));
    }

    #[tokio::test]
    async fn test_compose_respects_cap() {
        let big_body = "word ".repeat(20_000);
        let pages = vec![
            page("https://example.com/guide/a", "A", 10.0, &big_body),
            page("https://example.com/guide/b", "B", 9.0, &big_body),
            page("https://example.com/api/c", "C", 8.0, &big_body),
        ];

        let composer = Composer::new("https://example.com", 10, at());
        let artifact = composer
            .compose(&pages, &TruncatingSummarizer, &CancelToken::unlimited())
            .await
            .unwrap();

        assert!(
            artifact.byte_size() <= 10 * 1024,
            "artifact is {} bytes",
            artifact.byte_size()
        );
    }

    #[tokio::test]
    async fn test_compose_deterministic() {
        let composer = Composer::new("https://example.com", 50, at());
        let a = composer
            .compose(&fixture_pages(), &TruncatingSummarizer, &CancelToken::unlimited())
            .await
            .unwrap();
        let b = composer
            .compose(&fixture_pages(), &TruncatingSummarizer, &CancelToken::unlimited())
            .await
            .unwrap();
        assert_eq!(a.content, b.content);
    }

    #[tokio::test]
    async fn test_compose_rejects_empty_page_set() {
        let composer = Composer::new("https://example.com", 50, at());
        let err = composer
            .compose(&[], &TruncatingSummarizer, &CancelToken::unlimited())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Compose(_)));
    }

    #[test]
    fn test_compose_full_keeps_verbatim_markdown() {
        let pages = fixture_pages();
        let composer = Composer::new("https://example.com", 50, at());
        let artifact = composer.compose_full(&pages).unwrap();

        assert!(artifact.content.contains("**URL**: https://example.com/guide/intro"));
        assert!(artifact.content.contains("Guide prose. Guide prose."));
    }

    #[test]
    fn test_compose_full_safety_cap_drops_pages() {
        let big_body = "word ".repeat(20_000); // ~100 KB per page
        let pages: Vec<Page> = (0..15)
            .map(|i| {
                page(
                    &format!("https://example.com/guide/p{i:02}"),
                    &format!("Page {i}"),
                    15.0 - i as f64,
                    &big_body,
                )
            })
            .collect();

        // 10 KB cap -> 100 KB safety cap for the full artifact.
        let composer = Composer::new("https://example.com", 10, at());
        let artifact = composer.compose_full(&pages).unwrap();

        assert!(artifact.byte_size() <= 10 * 1024 * FULL_VERSION_CAP_FACTOR);
        // Highest-priority page survives; the lowest was dropped.
        assert!(artifact.content.contains("Page 0"));
        assert!(!artifact.content.contains("### Page 14"));
    }

    #[tokio::test]
    async fn test_section_floor_drops_low_priority_sections() {
        let mut pages = vec![
            page(
                "https://example.com/guide/main",
                "Main Guide",
                20.0,
                &"Important content. ".repeat(400),
            ),
        ];
        // Many tiny low-priority sections that cannot each meet the 1 KB floor
        // under a small budget.
        for i in 0..12 {
            pages.push(page(
                &format!("https://example.com/extra{i}/page"),
                &format!("Extra {i}"),
                1.0,
                &"filler text here. ".repeat(50),
            ));
        }

        let composer = Composer::new("https://example.com", 8, at());
        let artifact = composer
            .compose(&pages, &TruncatingSummarizer, &CancelToken::unlimited())
            .await
            .unwrap();

        assert!(artifact.content.contains("Main Guide"));
        assert!(artifact.byte_size() <= 8 * 1024);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Getting Started"), "getting-started");
        assert_eq!(slugify("API/Reference"), "api-reference");
        assert_eq!(slugify("guide"), "guide");
    }
}
