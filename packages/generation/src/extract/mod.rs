//! HTML extraction: decoding, chrome stripping, markdown conversion.

pub mod extractor;
pub mod markdown;

pub use extractor::{
    decode_body, extract, extract_links, needs_render, Extracted, MIN_CONTENT_CHARS,
};
pub use markdown::{convert, convert_filtered, normalize, MarkdownOutput};
