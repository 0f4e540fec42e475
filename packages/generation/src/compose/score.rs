//! Quality scoring for generated artifacts.
//!
//! Produces a 0-100 score from four axes: topic coverage (40), size
//! adherence (20), link health (20), and signal ratio (20). Pure function
//! over the artifact text; no network.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Topics a good documentation summary covers, with their weights.
const TOPICS: &[(&str, &[&str], u32)] = &[
    (
        "getting_started",
        &["getting started", "quickstart", "quick start", "introduction", "overview"],
        8,
    ),
    ("installation", &["installation", "install", "setup", "requirements"], 6),
    (
        "authentication",
        &["authentication", "auth", "login", "api key", "token", "credentials"],
        6,
    ),
    (
        "api_reference",
        &["api", "reference", "endpoints", "methods", "functions", "commands"],
        8,
    ),
    (
        "configuration",
        &["configuration", "config", "settings", "options", "parameters"],
        6,
    ),
    (
        "errors",
        &["error", "troubleshoot", "debug", "problem", "issue", "faq"],
        6,
    ),
];

/// Phrases that read as filler in a compressed artifact.
const FILLER_PHRASES: &[&str] = &[
    "click here",
    "see below",
    "as follows",
    "the following",
    "please note",
    "important note",
    "for more information",
];

/// Scoring breakdown for one artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    /// Total score, 0-100
    pub total: u32,

    /// Topic coverage, 0-40
    pub coverage: u32,

    /// Topics found
    pub topics_covered: Vec<String>,

    /// Size adherence, 0-20
    pub size: u32,

    /// Artifact size in kilobytes
    pub size_kb: f64,

    /// Link health, 0-20
    pub link_health: u32,

    /// Absolute links counted
    pub total_links: usize,

    /// Signal ratio, 0-20
    pub signal: u32,

    /// Raw signal ratio in [0, 1]
    pub signal_ratio: f64,
}

struct Patterns {
    markdown_link: regex::Regex,
    code_fence: regex::Regex,
    heading: regex::Regex,
    list_item: regex::Regex,
    inline_code: regex::Regex,
    word: regex::Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        markdown_link: regex::Regex::new(r"\[[^\]]*\]\(([^)]+)\)").unwrap(),
        code_fence: regex::Regex::new(r"(?s)```.*?```").unwrap(),
        heading: regex::Regex::new(r"(?m)^#{1,6}\s+").unwrap(),
        list_item: regex::Regex::new(r"(?m)^\s*[-*+]\s+").unwrap(),
        inline_code: regex::Regex::new(r"`[^`]+`").unwrap(),
        word: regex::Regex::new(r"\b\w+\b").unwrap(),
    })
}

/// Score an artifact against its size budget.
pub fn score(content: &str, max_kb: usize) -> QualityReport {
    let (coverage, topics_covered) = score_coverage(content);
    let (size, size_kb) = score_size(content, max_kb);
    let (link_health, total_links) = score_link_health(content);
    let (signal, signal_ratio) = score_signal(content);

    QualityReport {
        total: coverage + size + link_health + signal,
        coverage,
        topics_covered,
        size,
        size_kb,
        link_health,
        total_links,
        signal,
        signal_ratio,
    }
}

fn score_coverage(content: &str) -> (u32, Vec<String>) {
    let lower = content.to_lowercase();
    let mut score = 0;
    let mut covered = Vec::new();

    for (name, phrases, weight) in TOPICS {
        if phrases.iter().any(|p| lower.contains(p)) {
            score += weight;
            covered.push((*name).to_string());
        }
    }

    (score.min(40), covered)
}

fn score_size(content: &str, max_kb: usize) -> (u32, f64) {
    let size_kb = content.len() as f64 / 1024.0;
    let ideal_min = max_kb as f64 * 0.5;
    let ideal_max = max_kb as f64;

    let score = if size_kb >= ideal_min && size_kb <= ideal_max {
        20.0
    } else if size_kb < ideal_min {
        20.0 * size_kb / ideal_min
    } else if size_kb <= ideal_max * 1.2 {
        20.0 - 5.0 * (size_kb - ideal_max) / (ideal_max * 0.2)
    } else {
        0.0
    };

    (score.max(0.0) as u32, size_kb)
}

fn score_link_health(content: &str) -> (u32, usize) {
    let mut links: std::collections::HashSet<&str> = std::collections::HashSet::new();
    for captures in patterns().markdown_link.captures_iter(content) {
        if let Some(target) = captures.get(1) {
            links.insert(target.as_str());
        }
    }

    let external: Vec<&&str> = links
        .iter()
        .filter(|l| l.starts_with("http") && !l.contains("localhost"))
        .collect();

    if external.is_empty() {
        return (20, 0);
    }

    // Liveness is not probed here; well-formedness stands in for health.
    let well_formed = external
        .iter()
        .filter(|l| url::Url::parse(l).is_ok())
        .count();
    let ratio = well_formed as f64 / external.len() as f64;

    ((20.0 * ratio) as u32, external.len())
}

fn score_signal(content: &str) -> (u32, f64) {
    let prose = patterns().code_fence.replace_all(content, "");
    let total_chars = prose.len();
    if total_chars == 0 {
        return (0, 0.0);
    }

    let headings = patterns().heading.find_iter(&prose).count();
    let lists = patterns().list_item.find_iter(&prose).count();
    let links = patterns().markdown_link.find_iter(&prose).count();
    let inline_code = patterns().inline_code.find_iter(&prose).count();
    let signal_elements = headings + lists + links + inline_code;

    let lower = prose.to_lowercase();
    let filler: usize = FILLER_PHRASES.iter().map(|p| lower.matches(p).count()).sum();

    let stopwords = ["this", "that", "with", "from", "have", "been", "were", "will"];
    let mut words = 0usize;
    let mut substantive = 0usize;
    for m in patterns().word.find_iter(&prose) {
        words += 1;
        let w = m.as_str();
        if w.len() > 3 && !stopwords.contains(&w.to_lowercase().as_str()) {
            substantive += 1;
        }
    }
    let substantive_ratio = if words > 0 {
        substantive as f64 / words as f64
    } else {
        0.0
    };

    let structure_density = signal_elements as f64 * 10.0 / total_chars as f64;
    let noise = (filler * 2) as f64 / (signal_elements.max(1)) as f64;

    let ratio = (structure_density * 0.3 + substantive_ratio * 0.5 + (1.0 - noise) * 0.2)
        .clamp(0.0, 1.0);

    ((20.0 * ratio) as u32, ratio)
}
