//! Chapter body extraction.
//!
//! Tries the known content containers in order; when none is present, falls
//! back to the `div`/`p` carrying the most text. Script and style subtrees
//! never contribute text.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, trace};

use super::chain::SelectorChain;

/// Content containers, most specific first.
pub const CONTENT_SELECTORS: [&str; 8] = [
    "#chaptercontent",
    "#content",
    ".content",
    "#chapter_content",
    ".chapter-content",
    ".read-content",
    "#booktext",
    ".text-content",
];

/// Elements that never contribute text.
const SKIPPED_ELEMENTS: [&str; 2] = ["script", "style"];

/// Elements whose end starts a new line.
const BLOCK_ELEMENTS: [&str; 2] = ["p", "div"];

#[allow(clippy::expect_used)]
static CONTENT_CHAIN: LazyLock<SelectorChain> = LazyLock::new(|| {
    SelectorChain::parse(&CONTENT_SELECTORS).expect("content selectors are valid CSS")
});

#[allow(clippy::expect_used)]
static BLOCK_CANDIDATES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div, p").expect("block selector is valid CSS"));

#[allow(clippy::expect_used)]
static BLANK_LINE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("blank line pattern is valid"));

#[allow(clippy::expect_used)]
static HORIZONTAL_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("horizontal whitespace pattern is valid"));

/// Extracts the normalized text of one chapter page.
///
/// Returns `None` when the page holds no extractable text at all; callers
/// treat that as a failed unit, distinct from a transport error.
#[must_use]
pub fn extract(markup: &str) -> Option<String> {
    let document = Html::parse_document(markup);

    let container = match CONTENT_CHAIN.select_first(&document) {
        Some(hit) => {
            trace!(pattern = %hit.pattern, "content container matched");
            Some(hit.value)
        }
        None => {
            debug!("no content container matched, falling back to largest text block");
            largest_text_block(&document)
        }
    }?;

    let text = normalize_whitespace(&element_text(container));
    (!text.is_empty()).then_some(text)
}

/// Collapses blank-line runs to one blank line and horizontal runs to one
/// space, then trims the ends.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    let text = BLANK_LINE_RUNS.replace_all(text, "\n\n");
    let text = HORIZONTAL_RUNS.replace_all(&text, " ");
    text.trim().to_string()
}

/// Text of `element` with script/style removed; `<br>` and block ends become newlines.
#[must_use]
pub fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, out);
                }
                if BLOCK_ELEMENTS.contains(&name) {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Among `div`/`p` elements with direct text, the one with the most text.
/// Ties go to the element that appears first.
fn largest_text_block(document: &Html) -> Option<ElementRef<'_>> {
    let mut best: Option<(usize, ElementRef<'_>)> = None;
    for candidate in document.select(&BLOCK_CANDIDATES) {
        if !has_direct_text(candidate) {
            continue;
        }
        let length = element_text(candidate).trim().chars().count();
        if best.is_none_or(|(best_length, _)| length > best_length) {
            best = Some((length, candidate));
        }
    }
    best.map(|(_, element)| element)
}

fn has_direct_text(element: ElementRef<'_>) -> bool {
    element.children().any(|child| match child.value() {
        Node::Text(text) => !text.trim().is_empty(),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_selector_wins() {
        let html = r#"<html><body>
            <div id="content">First line<br/><br/>Second   line</div>
            <div class="content">should not be used</div>
        </body></html>"#;
        assert_eq!(
            extract(html).as_deref(),
            Some("First line\n\nSecond line")
        );
    }

    #[test]
    fn test_selector_order_beats_document_order() {
        let html = r#"<html><body>
            <div class="read-content">later pattern</div>
            <div id="booktext">even later pattern</div>
            <div id="chapter_content">earlier pattern</div>
        </body></html>"#;
        assert_eq!(extract(html).as_deref(), Some("earlier pattern"));
    }

    #[test]
    fn test_scripts_and_styles_are_removed() {
        let html = r#"<html><body><div id="chaptercontent">
            Before<script>var ad = "buy now";</script> after
            <style>.x { color: red }</style>
        </div></body></html>"#;
        assert_eq!(extract(html).as_deref(), Some("Before after"));
    }

    #[test]
    fn test_fallback_picks_largest_text_block() {
        let html = r#"<html><body>
            <div class="nav">Home | Index</div>
            <p>The wind rose over the mountain and the boy kept walking until dusk.</p>
            <p>Short note.</p>
        </body></html>"#;
        assert_eq!(
            extract(html).as_deref(),
            Some("The wind rose over the mountain and the boy kept walking until dusk.")
        );
    }

    #[test]
    fn test_fallback_ties_go_to_first_block() {
        let html = "<html><body><p>aaaa</p><p>bbbb</p></body></html>";
        assert_eq!(extract(html).as_deref(), Some("aaaa"));
    }

    #[test]
    fn test_fallback_ignores_blocks_without_direct_text() {
        let html = r#"<html><body>
            <div><span>wrapped text that is quite long indeed, much longer than the paragraph</span></div>
            <p>direct</p>
        </body></html>"#;
        assert_eq!(extract(html).as_deref(), Some("direct"));
    }

    #[test]
    fn test_no_text_returns_none() {
        assert_eq!(extract("<html><body><img src=\"x.png\"></body></html>"), None);
        assert_eq!(
            extract("<html><body><div id=\"content\">   <script>x()</script> </div></body></html>"),
            None
        );
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a\t\tb  \n\n\n\n c  "), "a b \n\n c");
        assert_eq!(normalize_whitespace("line1\n   \n \nline2"), "line1\n\nline2");
        assert_eq!(normalize_whitespace("\n\n"), "");
    }
}
