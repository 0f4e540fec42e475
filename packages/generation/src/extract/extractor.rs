//! HTML to cleaned markdown extraction.
//!
//! Decodes the response body, picks the main content region, strips page
//! chrome (navigation, footers, cookie banners, link-dense sidebars), and
//! converts the remainder to markdown.

use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use url::Url;

use super::markdown::{self, MarkdownOutput};
use crate::types::{CodeBlock, ExtractionStatus, Heading};

/// Cleaned bodies shorter than this are considered empty.
pub const MIN_CONTENT_CHARS: usize = 200;

/// Inline script volume above which a thin page is considered script-driven.
const SUBSTANTIAL_SCRIPT_BYTES: usize = 1000;

/// Class/id fragments that mark page chrome.
const CHROME_MARKERS: &[&str] = &[
    "nav", "menu", "sidebar", "footer", "header", "breadcrumb", "cookie", "consent", "banner",
];

/// Link-to-text density above which a container is treated as navigation.
const LINK_DENSITY_LIMIT: f64 = 0.5;

/// Result of extracting one page.
#[derive(Debug)]
pub struct Extracted {
    /// `<title>` text, if present
    pub title: Option<String>,

    /// Cleaned markdown body
    pub markdown: String,

    /// Heading outline
    pub headings: Vec<Heading>,

    /// Preserved code blocks
    pub code_blocks: Vec<CodeBlock>,

    /// `<html lang>` attribute, if declared
    pub lang: Option<String>,

    /// `ok` or `empty`
    pub status: ExtractionStatus,
}

/// Decode raw bytes using the declared charset with UTF-8 fallback.
///
/// UTF-8 and ASCII decode directly; Latin-1 family charsets decode
/// byte-per-char; anything else falls back to lossy UTF-8.
pub fn decode_body(body: &[u8], charset: Option<&str>) -> String {
    match charset {
        Some("iso-8859-1") | Some("latin1") | Some("windows-1252") => {
            body.iter().map(|&b| b as char).collect()
        }
        _ => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Extract cleaned markdown from an HTML document.
pub fn extract(html: &str, base: &Url) -> Extracted {
    let document = Html::parse_document(html);

    let title = select_first(&document, &selectors().title)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let lang = select_first(&document, &selectors().html)
        .and_then(|el| el.value().attr("lang"))
        .map(|l| l.to_string());

    let output = main_content(&document)
        .map(|region| markdown::convert_filtered(region, base, &|el| is_chrome(el)))
        .unwrap_or_default();

    let MarkdownOutput {
        markdown,
        headings,
        code_blocks,
    } = output;

    let status = if markdown.chars().count() < MIN_CONTENT_CHARS {
        ExtractionStatus::Empty
    } else {
        ExtractionStatus::Ok
    };

    Extracted {
        title,
        markdown,
        headings,
        code_blocks,
        lang,
        status,
    }
}

/// Absolute same-document links found anywhere in the page, for the frontier.
pub fn extract_links(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();
    for anchor in document.select(&selectors().anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }
        if let Ok(resolved) = base.join(href) {
            let scheme = resolved.scheme();
            if scheme == "http" || scheme == "https" {
                links.push(resolved.to_string());
            }
        }
    }
    links
}

/// Whether a thin page looks like it needs the rendering fallback: little
/// meaningful text but a substantial amount of inline script.
pub fn needs_render(html: &str) -> bool {
    let document = Html::parse_document(html);

    let text_len: usize = main_content(&document)
        .map(|region| visible_text_len(region))
        .unwrap_or(0);
    if text_len >= MIN_CONTENT_CHARS {
        return false;
    }

    let script_len: usize = document
        .select(&selectors().scripts)
        .map(|el| el.text().map(str::len).sum::<usize>())
        .sum();

    script_len >= SUBSTANTIAL_SCRIPT_BYTES
}

struct Selectors {
    title: Selector,
    html: Selector,
    main: Selector,
    article: Selector,
    role_main: Selector,
    body: Selector,
    divs: Selector,
    anchors: Selector,
    scripts: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        let parse = |s: &str| Selector::parse(s).unwrap();
        Selectors {
            title: parse("title"),
            html: parse("html"),
            main: parse("main"),
            article: parse("article"),
            role_main: parse("[role=\"main\"]"),
            body: parse("body"),
            divs: parse("div"),
            anchors: parse("a[href]"),
            scripts: parse("script"),
        }
    })
}

fn select_first<'a>(document: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
    document.select(selector).next()
}

/// Pick the main content region: `<main>`, `<article>`, `[role=main]`, the
/// densest `<div>` by readable characters, then `<body>`.
fn main_content(document: &Html) -> Option<ElementRef<'_>> {
    for selector in [&selectors().main, &selectors().article, &selectors().role_main] {
        if let Some(el) = select_first(document, selector) {
            return Some(el);
        }
    }

    let densest = document
        .select(&selectors().divs)
        .filter(|el| !is_chrome(*el))
        .map(|el| (visible_text_len(el), el))
        .max_by_key(|(len, _)| *len)
        .filter(|(len, _)| *len >= MIN_CONTENT_CHARS)
        .map(|(_, el)| el);

    densest.or_else(|| select_first(document, &selectors().body))
}

/// Visible text length, ignoring script/style subtrees.
fn visible_text_len(el: ElementRef<'_>) -> usize {
    let mut total = 0;
    for node in el.descendants() {
        if let Some(text) = node.value().as_text() {
            let in_script = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| matches!(a.value().name(), "script" | "style" | "noscript"));
            if !in_script {
                total += text.trim().len();
            }
        }
    }
    total
}

/// Text length inside anchor descendants.
fn link_text_len(el: ElementRef<'_>) -> usize {
    el.descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "a")
        .map(|a| a.text().map(|t| t.trim().len()).sum::<usize>())
        .sum()
}

/// Whether an element is page chrome that should be stripped.
pub fn is_chrome(el: ElementRef<'_>) -> bool {
    let tag = el.value().name();

    match tag {
        "nav" | "footer" | "aside" => return true,
        // A header inside the article proper is content (e.g. a card title);
        // one outside it is the site banner.
        "header" => {
            let in_content = el
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| matches!(a.value().name(), "main" | "article"));
            return !in_content;
        }
        _ => {}
    }

    let attr_blob = format!(
        "{} {}",
        el.value().attr("class").unwrap_or_default(),
        el.value().attr("id").unwrap_or_default()
    )
    .to_ascii_lowercase();
    if !attr_blob.trim().is_empty()
        && CHROME_MARKERS.iter().any(|marker| attr_blob.contains(marker))
    {
        return true;
    }

    // Link-dense containers are navigation even without telltale names.
    if matches!(tag, "div" | "section" | "ul") {
        let total = visible_text_len(el);
        if total > 40 {
            let linked = link_text_len(el);
            if linked as f64 / total as f64 > LINK_DENSITY_LIMIT {
                return true;
            }
        }
    }

    false
}
