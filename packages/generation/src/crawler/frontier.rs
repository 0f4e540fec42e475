//! Bounded BFS frontier with priority scoring.
//!
//! The queue is keyed by canonical URL: each URL is admitted at most once
//! per job. Pop order is by score (higher first) with enqueue order as the
//! tie-break, so crawls are deterministic for a fixed discovery sequence.

use std::collections::{BinaryHeap, HashSet};
use std::sync::OnceLock;
use url::Url;

use super::robots::RobotsTxt;

/// Path keywords that mark likely documentation pages.
const DOC_KEYWORDS: &[&str] = &["doc", "docs", "guide", "reference", "api", "tutorial"];

/// Path keywords that mark low-value pages for this artifact.
const LOW_VALUE_KEYWORDS: &[&str] = &["blog", "changelog", "news", "release-notes", "archive"];

/// Canonicalize a URL for dedupe.
///
/// Lowercases scheme and host (the `url` crate does this on parse), removes
/// the fragment, drops default ports, and normalizes the trailing slash so
/// `/docs/` and `/docs` collapse to one key. Idempotent.
pub fn canonicalize(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    url.host_str()?;
    url.set_fragment(None);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }

    Some(url.to_string())
}

/// Whether two URLs belong to the same site.
///
/// Hosts match exactly, or share the same last two labels (so `docs.x.dev`
/// and `www.x.dev` count as one site). An approximation of registrable
/// domains that avoids carrying a public-suffix list.
pub fn same_site(a: &Url, b: &Url) -> bool {
    let (Some(host_a), Some(host_b)) = (a.host_str(), b.host_str()) else {
        return false;
    };
    if host_a.eq_ignore_ascii_case(host_b) {
        return true;
    }

    let apex = |host: &str| -> Option<String> {
        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() < 2 {
            return None;
        }
        Some(labels[labels.len() - 2..].join(".").to_ascii_lowercase())
    };

    match (apex(host_a), apex(host_b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn locale_pattern() -> &'static regex::Regex {
    static LOCALE: OnceLock<regex::Regex> = OnceLock::new();
    LOCALE.get_or_init(|| regex::Regex::new(r"^[a-z]{2}([-_][a-zA-Z]{2,4})?$").unwrap())
}

/// Whether the first path segment looks like a locale that does not match
/// the preferred language.
fn locale_mismatch(url: &Url, language: &str) -> bool {
    let Some(first) = url
        .path_segments()
        .and_then(|mut segments| segments.find(|s| !s.is_empty()))
    else {
        return false;
    };
    let first = first.to_ascii_lowercase();
    locale_pattern().is_match(&first) && !first.starts_with(&language.to_ascii_lowercase())
}

/// Score a URL for pop ordering. Higher wins.
pub fn score_url(url: &Url, depth: usize, in_sitemap: bool, language: Option<&str>) -> i64 {
    let mut score: i64 = (10 - depth as i64).max(0);

    let path = url.path().to_ascii_lowercase();
    for keyword in DOC_KEYWORDS {
        if path.contains(keyword) {
            score += 2;
        }
    }
    for keyword in LOW_VALUE_KEYWORDS {
        if path.contains(keyword) {
            score -= 5;
        }
    }
    if in_sitemap {
        score += 3;
    }
    if let Some(language) = language {
        if locale_mismatch(url, language) {
            score -= 4;
        }
    }

    score
}

/// Why an enqueue was rejected (or not).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// URL was admitted to the queue
    Queued,
    /// Canonical form was already seen this job
    AlreadySeen,
    /// Depth exceeds the configured maximum
    TooDeep,
    /// URL is on a different site than the seed
    OffSite,
    /// robots.txt disallows the URL
    Disallowed,
    /// URL failed to parse
    Invalid,
}

#[derive(Debug)]
struct FrontierEntry {
    score: i64,
    seq: u64,
    url: String,
    depth: usize,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.seq == other.seq
    }
}
impl Eq for FrontierEntry {}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap: higher score first, then earlier enqueue.
        self.score
            .cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-job BFS queue of URLs pending fetch.
pub struct Frontier {
    seed: Url,
    max_depth: usize,
    language: Option<String>,
    user_agent: String,
    robots: RobotsTxt,
    respect_robots: bool,
    sitemap_urls: HashSet<String>,
    seen: HashSet<String>,
    heap: BinaryHeap<FrontierEntry>,
    next_seq: u64,
    admitted: usize,
}

impl Frontier {
    /// Create a frontier rooted at the seed URL.
    pub fn new(
        seed: Url,
        max_depth: usize,
        language: Option<String>,
        user_agent: impl Into<String>,
        robots: RobotsTxt,
        respect_robots: bool,
    ) -> Self {
        Self {
            seed,
            max_depth,
            language,
            user_agent: user_agent.into(),
            robots,
            respect_robots,
            sitemap_urls: HashSet::new(),
            seen: HashSet::new(),
            heap: BinaryHeap::new(),
            next_seq: 0,
            admitted: 0,
        }
    }

    /// Register a sitemap URL so it receives the sitemap score bonus.
    pub fn mark_from_sitemap(&mut self, url: &str) {
        if let Some(canonical) = canonicalize(url) {
            self.sitemap_urls.insert(canonical);
        }
    }

    /// Whether a URL was listed in the site's sitemap.
    pub fn is_from_sitemap(&self, url: &str) -> bool {
        canonicalize(url)
            .map(|canonical| self.sitemap_urls.contains(&canonical))
            .unwrap_or(false)
    }

    /// Try to admit a URL at the given depth.
    pub fn enqueue(&mut self, raw: &str, depth: usize) -> EnqueueOutcome {
        let Some(canonical) = canonicalize(raw) else {
            return EnqueueOutcome::Invalid;
        };
        // canonicalize only accepts URLs the url crate can parse
        let parsed = match Url::parse(&canonical) {
            Ok(p) => p,
            Err(_) => return EnqueueOutcome::Invalid,
        };

        if depth > self.max_depth {
            return EnqueueOutcome::TooDeep;
        }
        if !same_site(&self.seed, &parsed) {
            return EnqueueOutcome::OffSite;
        }
        if self.seen.contains(&canonical) {
            return EnqueueOutcome::AlreadySeen;
        }
        if self.respect_robots && !self.robots.is_allowed(&self.user_agent, parsed.path()) {
            // Seen anyway: a disallowed URL stays disallowed this job.
            self.seen.insert(canonical);
            return EnqueueOutcome::Disallowed;
        }

        let in_sitemap = self.sitemap_urls.contains(&canonical);
        let score = score_url(&parsed, depth, in_sitemap, self.language.as_deref());

        self.seen.insert(canonical.clone());
        self.heap.push(FrontierEntry {
            score,
            seq: self.next_seq,
            url: canonical,
            depth,
        });
        self.next_seq += 1;
        self.admitted += 1;

        EnqueueOutcome::Queued
    }

    /// Pop the highest-priority URL.
    pub fn pop(&mut self) -> Option<(String, usize)> {
        self.heap.pop().map(|entry| (entry.url, entry.depth))
    }

    /// URLs currently queued.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Unique URLs admitted so far (queued or already popped).
    pub fn discovered(&self) -> usize {
        self.admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frontier(max_depth: usize) -> Frontier {
        Frontier::new(
            Url::parse("https://example.com/docs").unwrap(),
            max_depth,
            None,
            "test-agent",
            RobotsTxt::default(),
            true,
        )
    }

    #[test]
    fn test_canonicalize_normalizes() {
        assert_eq!(
            canonicalize("HTTPS://Example.COM/Docs/#intro").as_deref(),
            Some("https://example.com/Docs")
        );
        assert_eq!(
            canonicalize("https://example.com:443/a/").as_deref(),
            Some("https://example.com/a")
        );
        assert_eq!(
            canonicalize("https://example.com").as_deref(),
            Some("https://example.com/")
        );
        assert!(canonicalize("not a url").is_none());
    }

    #[test]
    fn test_trailing_slash_collapses_to_one_key() {
        assert_eq!(
            canonicalize("https://example.com/docs/"),
            canonicalize("https://example.com/docs")
        );
    }

    #[test]
    fn test_same_site_subdomains() {
        let a = Url::parse("https://docs.example.com/x").unwrap();
        let b = Url::parse("https://www.example.com/y").unwrap();
        let c = Url::parse("https://other.com/z").unwrap();
        assert!(same_site(&a, &b));
        assert!(!same_site(&a, &c));
    }

    #[test]
    fn test_scoring_prefers_docs_paths() {
        let docs = Url::parse("https://example.com/docs/guide").unwrap();
        let blog = Url::parse("https://example.com/blog/post").unwrap();
        assert!(score_url(&docs, 1, false, None) > score_url(&blog, 1, false, None));
    }

    #[test]
    fn test_scoring_depth_and_sitemap() {
        let url = Url::parse("https://example.com/page").unwrap();
        assert!(score_url(&url, 0, false, None) > score_url(&url, 3, false, None));
        assert!(score_url(&url, 1, true, None) > score_url(&url, 1, false, None));
    }

    #[test]
    fn test_scoring_locale_preference() {
        let fr = Url::parse("https://example.com/fr/docs").unwrap();
        let en = Url::parse("https://example.com/en/docs").unwrap();
        let plain = Url::parse("https://example.com/docs").unwrap();
        assert!(score_url(&fr, 1, false, Some("en")) < score_url(&en, 1, false, Some("en")));
        // No locale segment is never penalized.
        assert_eq!(
            score_url(&plain, 1, false, Some("en")),
            score_url(&plain, 1, false, None)
        );
    }

    #[test]
    fn test_enqueue_dedupes_on_canonical_form() {
        let mut f = frontier(3);
        assert_eq!(f.enqueue("https://example.com/docs/a", 1), EnqueueOutcome::Queued);
        assert_eq!(
            f.enqueue("https://EXAMPLE.com/docs/a/", 1),
            EnqueueOutcome::AlreadySeen
        );
        assert_eq!(f.discovered(), 1);
    }

    #[test]
    fn test_enqueue_rejects_depth_and_off_site() {
        let mut f = frontier(2);
        assert_eq!(f.enqueue("https://example.com/docs/deep", 3), EnqueueOutcome::TooDeep);
        assert_eq!(f.enqueue("https://elsewhere.org/docs", 1), EnqueueOutcome::OffSite);
        assert_eq!(f.enqueue("::broken::", 1), EnqueueOutcome::Invalid);
    }

    #[test]
    fn test_enqueue_respects_robots() {
        let robots = RobotsTxt::parse("User-agent: *\nDisallow: /private/\n");
        let mut f = Frontier::new(
            Url::parse("https://example.com/").unwrap(),
            3,
            None,
            "test-agent",
            robots,
            true,
        );
        assert_eq!(
            f.enqueue("https://example.com/private/page", 1),
            EnqueueOutcome::Disallowed
        );
        assert_eq!(f.enqueue("https://example.com/public", 1), EnqueueOutcome::Queued);

        // With respect disabled the same URL is admitted.
        let robots = RobotsTxt::parse("User-agent: *\nDisallow: /private/\n");
        let mut f = Frontier::new(
            Url::parse("https://example.com/").unwrap(),
            3,
            None,
            "test-agent",
            robots,
            false,
        );
        assert_eq!(
            f.enqueue("https://example.com/private/page", 1),
            EnqueueOutcome::Queued
        );
    }

    #[test]
    fn test_pop_order_score_then_fifo() {
        let mut f = frontier(5);
        f.enqueue("https://example.com/blog/one", 1);
        f.enqueue("https://example.com/docs/two", 1);
        f.enqueue("https://example.com/plain-a", 1);
        f.enqueue("https://example.com/plain-b", 1);

        let (first, _) = f.pop().unwrap();
        assert!(first.contains("/docs/two"));

        // The two plain pages tie on score; FIFO breaks the tie.
        let (second, _) = f.pop().unwrap();
        let (third, _) = f.pop().unwrap();
        assert!(second.contains("plain-a"));
        assert!(third.contains("plain-b"));

        let (last, _) = f.pop().unwrap();
        assert!(last.contains("/blog/one"));
        assert!(f.pop().is_none());
    }

    proptest! {
        #[test]
        fn prop_canonicalize_is_idempotent(
            host in "[a-z]{1,10}\\.(com|dev|org)",
            path in "(/[a-zA-Z0-9_-]{0,8}){0,4}/?",
        ) {
            let raw = format!("https://{host}{path}");
            if let Some(once) = canonicalize(&raw) {
                let twice = canonicalize(&once).expect("canonical URL must re-canonicalize");
                prop_assert_eq!(once, twice);
            }
        }
    }
}
