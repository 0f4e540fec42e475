//! DOM to Markdown conversion.
//!
//! Walks an element subtree and emits markdown preserving headings,
//! paragraphs, lists, code blocks (with `language-*` hints), inline code,
//! absolute links, and pipe tables. Images and embedded media are dropped.

use scraper::{ElementRef, Node};
use url::Url;

use crate::types::{CodeBlock, Heading};

/// Result of converting a DOM subtree.
#[derive(Debug, Default)]
pub struct MarkdownOutput {
    /// Markdown text, normalized
    pub markdown: String,
    /// Heading outline in document order
    pub headings: Vec<Heading>,
    /// Code blocks in document order
    pub code_blocks: Vec<CodeBlock>,
}

/// Tags never rendered.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "svg", "canvas", "img", "picture",
    "video", "audio", "form", "input", "button", "select", "label",
];

/// Convert an element subtree to markdown.
pub fn convert(root: ElementRef<'_>, base: &Url) -> MarkdownOutput {
    convert_filtered(root, base, &|_| false)
}

/// Convert an element subtree to markdown, skipping subtrees the predicate
/// rejects (used by the extractor to drop page chrome).
pub fn convert_filtered(
    root: ElementRef<'_>,
    base: &Url,
    skip: &dyn Fn(ElementRef<'_>) -> bool,
) -> MarkdownOutput {
    let mut converter = Converter {
        base,
        skip,
        blocks: Vec::new(),
        headings: Vec::new(),
        code_blocks: Vec::new(),
    };
    converter.walk_block_children(root);

    let markdown = normalize(&converter.blocks.join("\n\n"));
    MarkdownOutput {
        markdown,
        headings: converter.headings,
        code_blocks: converter.code_blocks,
    }
}

/// Collapse blank-line runs, trim, and end with a single newline.
pub fn normalize(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut blank_run = 0;
    for line in markdown.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    let trimmed = out.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

struct Converter<'a> {
    base: &'a Url,
    skip: &'a dyn Fn(ElementRef<'_>) -> bool,
    blocks: Vec<String>,
    headings: Vec<Heading>,
    code_blocks: Vec<CodeBlock>,
}

impl<'a> Converter<'a> {
    /// Walk children of a container, dispatching block-level elements.
    fn walk_block_children(&mut self, el: ElementRef<'_>) {
        let mut pending_inline = String::new();

        for child in el.children() {
            match child.value() {
                Node::Text(text) => {
                    push_inline_text(&mut pending_inline, text);
                }
                Node::Element(_) => {
                    let Some(child_el) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let tag = child_el.value().name();

                    if SKIPPED_TAGS.contains(&tag) {
                        continue;
                    }

                    if is_inline_tag(tag) {
                        pending_inline.push_str(&self.render_inline(child_el));
                    } else {
                        if (self.skip)(child_el) {
                            continue;
                        }
                        self.flush_inline(&mut pending_inline);
                        self.render_block(child_el, tag);
                    }
                }
                _ => {}
            }
        }

        self.flush_inline(&mut pending_inline);
    }

    fn flush_inline(&mut self, pending: &mut String) {
        let text = pending.trim();
        if !text.is_empty() {
            self.blocks.push(text.to_string());
        }
        pending.clear();
    }

    fn render_block(&mut self, el: ElementRef<'_>, tag: &str) {
        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag.as_bytes()[1] - b'0';
                let text = self.render_inline_children(el);
                let text = text.trim();
                if !text.is_empty() {
                    self.headings.push(Heading {
                        level,
                        text: text.to_string(),
                    });
                    self.blocks
                        .push(format!("{} {}", "#".repeat(level as usize), text));
                }
            }
            "p" => {
                let text = self.render_inline_children(el);
                let text = text.trim();
                if !text.is_empty() {
                    self.blocks.push(text.to_string());
                }
            }
            "pre" => self.render_code_block(el),
            "ul" => {
                let rendered = self.render_list(el, None, 0);
                if !rendered.is_empty() {
                    self.blocks.push(rendered);
                }
            }
            "ol" => {
                let rendered = self.render_list(el, Some(1), 0);
                if !rendered.is_empty() {
                    self.blocks.push(rendered);
                }
            }
            "table" => {
                let rendered = self.render_table(el);
                if !rendered.is_empty() {
                    self.blocks.push(rendered);
                }
            }
            "blockquote" => {
                let inner = self.render_inline_children(el);
                let inner = inner.trim();
                if !inner.is_empty() {
                    let quoted: Vec<String> =
                        inner.lines().map(|l| format!("> {l}")).collect();
                    self.blocks.push(quoted.join("\n"));
                }
            }
            "hr" => self.blocks.push("---".to_string()),
            "br" => {}
            // Containers: recurse for nested block structure.
            _ => self.walk_block_children(el),
        }
    }

    fn render_code_block(&mut self, el: ElementRef<'_>) {
        // <pre><code class="language-rust"> is the common documentation shape;
        // bare <pre> is treated as an unhinted block.
        let code_el = el
            .children()
            .filter_map(ElementRef::wrap)
            .find(|c| c.value().name() == "code");

        let (language, code) = match code_el {
            Some(code_el) => (language_hint(code_el), text_content(code_el)),
            None => (language_hint(el), text_content(el)),
        };

        let code = code.trim_end_matches('\n').to_string();
        if code.is_empty() {
            return;
        }

        let fence_lang = language.clone().unwrap_or_default();
        self.blocks.push(format!("```{fence_lang}\n{code}\n```"));
        self.code_blocks.push(CodeBlock { language, code });
    }

    fn render_list(&mut self, el: ElementRef<'_>, numbering: Option<usize>, indent: usize) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut counter = numbering.unwrap_or(0);

        for child in el.children().filter_map(ElementRef::wrap) {
            if child.value().name() != "li" {
                continue;
            }

            let marker = match numbering {
                Some(_) => {
                    let m = format!("{counter}. ");
                    counter += 1;
                    m
                }
                None => "- ".to_string(),
            };

            let mut item_text = String::new();
            let mut nested: Vec<String> = Vec::new();

            for part in child.children() {
                match part.value() {
                    Node::Text(text) => push_inline_text(&mut item_text, text),
                    Node::Element(_) => {
                        let Some(part_el) = ElementRef::wrap(part) else {
                            continue;
                        };
                        let tag = part_el.value().name();
                        if SKIPPED_TAGS.contains(&tag) {
                            continue;
                        }
                        match tag {
                            "ul" => nested.push(self.render_list(part_el, None, indent + 1)),
                            "ol" => nested.push(self.render_list(part_el, Some(1), indent + 1)),
                            _ => item_text.push_str(&self.render_inline(part_el)),
                        }
                    }
                    _ => {}
                }
            }

            let prefix = "  ".repeat(indent);
            let item_text = item_text.trim();
            if !item_text.is_empty() {
                lines.push(format!("{prefix}{marker}{item_text}"));
            }
            for block in nested {
                if !block.is_empty() {
                    lines.push(block);
                }
            }
        }

        lines.join("\n")
    }

    fn render_table(&mut self, el: ElementRef<'_>) -> String {
        let mut rows: Vec<Vec<String>> = Vec::new();

        for row in descendants_with_tag(el, "tr") {
            let mut cells: Vec<String> = Vec::new();
            for cell in row.children().filter_map(ElementRef::wrap) {
                if matches!(cell.value().name(), "th" | "td") {
                    cells.push(self.render_inline_children(cell).trim().replace('|', "\\|"));
                }
            }
            if !cells.is_empty() {
                rows.push(cells);
            }
        }

        if rows.is_empty() {
            return String::new();
        }

        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut lines: Vec<String> = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let mut padded = row.clone();
            padded.resize(width, String::new());
            lines.push(format!("| {} |", padded.join(" | ")));
            if i == 0 {
                lines.push(format!("|{}|", " --- |".repeat(width)));
            }
        }
        lines.join("\n")
    }

    fn render_inline_children(&mut self, el: ElementRef<'_>) -> String {
        let mut out = String::new();
        for child in el.children() {
            match child.value() {
                Node::Text(text) => push_inline_text(&mut out, text),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        let tag = child_el.value().name();
                        if SKIPPED_TAGS.contains(&tag) {
                            continue;
                        }
                        out.push_str(&self.render_inline(child_el));
                    }
                }
                _ => {}
            }
        }
        out
    }

    fn render_inline(&mut self, el: ElementRef<'_>) -> String {
        let tag = el.value().name();
        match tag {
            "a" => {
                let text = self.render_inline_children(el);
                let text = text.trim().to_string();
                match el.value().attr("href").and_then(|h| resolve_link(self.base, h)) {
                    Some(href) => {
                        let label = if text.is_empty() { href.clone() } else { text };
                        format!("[{label}]({href})")
                    }
                    None => text,
                }
            }
            "code" => {
                let code = text_content(el);
                let code = code.trim();
                if code.is_empty() {
                    String::new()
                } else {
                    format!("`{code}`")
                }
            }
            "strong" | "b" => wrap_if_nonempty(self.render_inline_children(el), "**"),
            "em" | "i" => wrap_if_nonempty(self.render_inline_children(el), "*"),
            "br" => "\n".to_string(),
            _ => self.render_inline_children(el),
        }
    }
}

/// Tags rendered inline rather than as their own block.
fn is_inline_tag(tag: &str) -> bool {
    matches!(
        tag,
        "a" | "code"
            | "strong"
            | "b"
            | "em"
            | "i"
            | "span"
            | "br"
            | "small"
            | "sup"
            | "sub"
            | "abbr"
            | "kbd"
            | "mark"
            | "time"
            | "s"
            | "u"
    )
}

fn wrap_if_nonempty(text: String, marker: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{marker}{trimmed}{marker}")
    }
}

/// Append text, collapsing internal whitespace runs to single spaces.
fn push_inline_text(out: &mut String, text: &str) {
    if text.trim().is_empty() {
        if !out.is_empty() && !out.ends_with(' ') && !out.ends_with('\n') {
            out.push(' ');
        }
        return;
    }
    let starts_with_space = text.starts_with(char::is_whitespace);
    if starts_with_space && !out.is_empty() && !out.ends_with(' ') && !out.ends_with('\n') {
        out.push(' ');
    }
    let mut last_was_space = out.ends_with(' ');
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    if !text.ends_with(char::is_whitespace) && out.ends_with(' ') {
        out.pop();
    }
}

/// Raw text content of a subtree, whitespace preserved.
fn text_content(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Language hint from a `language-*` class.
fn language_hint(el: ElementRef<'_>) -> Option<String> {
    el.value().attr("class").and_then(|classes| {
        classes
            .split_whitespace()
            .find_map(|c| c.strip_prefix("language-").or_else(|| c.strip_prefix("lang-")))
            .map(|l| l.to_string())
    })
}

/// Resolve a link target to an absolute URL, dropping non-navigational ones.
fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

fn descendants_with_tag<'a>(el: ElementRef<'a>, tag: &'a str) -> impl Iterator<Item = ElementRef<'a>> {
    el.descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |e| e.value().name() == tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn convert_body(html: &str) -> MarkdownOutput {
        let doc = Html::parse_document(html);
        let selector = Selector::parse("body").unwrap();
        let body = doc.select(&selector).next().unwrap();
        let base = Url::parse("https://example.com/docs/").unwrap();
        convert(body, &base)
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let output = convert_body("<body><h1>Title</h1><p>First para.</p><h2>Sub</h2></body>");
        assert_eq!(output.markdown, "# Title\n\nFirst para.\n\n## Sub\n");
        assert_eq!(output.headings.len(), 2);
        assert_eq!(output.headings[0].level, 1);
        assert_eq!(output.headings[1].text, "Sub");
    }

    #[test]
    fn test_code_block_with_language() {
        let output = convert_body(
            "<body><pre><code class=\"language-rust\">fn main() {}\n</code></pre></body>",
        );
        assert_eq!(output.markdown, "```rust\nfn main() {}\n```\n");
        assert_eq!(output.code_blocks.len(), 1);
        assert_eq!(output.code_blocks[0].language.as_deref(), Some("rust"));
        assert_eq!(output.code_blocks[0].code, "fn main() {}");
    }

    #[test]
    fn test_inline_code_and_emphasis() {
        let output =
            convert_body("<body><p>Use <code>cargo build</code> for a <strong>release</strong>.</p></body>");
        assert_eq!(output.markdown, "Use `cargo build` for a **release**.\n");
    }

    #[test]
    fn test_links_resolved_against_base() {
        let output = convert_body("<body><p><a href=\"../api\">API</a></p></body>");
        assert_eq!(output.markdown, "[API](https://example.com/api)\n");
    }

    #[test]
    fn test_anchor_and_javascript_links_dropped() {
        let output = convert_body(
            "<body><p><a href=\"#top\">Top</a> and <a href=\"javascript:void(0)\">JS</a></p></body>",
        );
        assert!(!output.markdown.contains('('));
        assert!(output.markdown.contains("Top"));
    }

    #[test]
    fn test_nested_lists() {
        let output = convert_body(
            "<body><ul><li>One<ul><li>Nested</li></ul></li><li>Two</li></ul></body>",
        );
        assert_eq!(output.markdown, "- One\n  - Nested\n- Two\n");
    }

    #[test]
    fn test_ordered_list() {
        let output = convert_body("<body><ol><li>First</li><li>Second</li></ol></body>");
        assert_eq!(output.markdown, "1. First\n2. Second\n");
    }

    #[test]
    fn test_table_pipe_form() {
        let output = convert_body(
            "<body><table><tr><th>Flag</th><th>Meaning</th></tr><tr><td>-v</td><td>verbose</td></tr></table></body>",
        );
        assert_eq!(
            output.markdown,
            "| Flag | Meaning |\n| --- | --- |\n| -v | verbose |\n"
        );
    }

    #[test]
    fn test_scripts_and_images_dropped() {
        let output = convert_body(
            "<body><p>Text</p><script>alert(1)</script><img src=\"x.png\"><style>p{}</style></body>",
        );
        assert_eq!(output.markdown, "Text\n");
    }

    #[test]
    fn test_blockquote() {
        let output = convert_body("<body><blockquote>Careful now</blockquote></body>");
        assert_eq!(output.markdown, "> Careful now\n");
    }

    #[test]
    fn test_normalize_collapses_blank_runs() {
        assert_eq!(normalize("a\n\n\n\nb"), "a\n\nb\n");
        assert_eq!(normalize("  \n\n"), "");
        assert_eq!(normalize("x"), "x\n");
    }
}
