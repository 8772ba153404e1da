//! Markup sanitization: strip document HTML to an allow-listed subset.
//!
//! ## Why a custom serializer?
//!
//! The input is scraped editorial HTML: presentational wrappers, tracking
//! attributes, embedded media, and the occasional unclosed tag. Parsing with
//! [`scraper`] (html5ever underneath) repairs malformed input for free; the
//! work is in what gets written back out. Rather than mutate the DOM and
//! re-serialize, we walk the parsed tree once and emit only what the
//! allow-list permits:
//!
//! - `img`, `iframe`, `video`, `figure`, `style`, `script` subtrees are
//!   dropped entirely — non-textual, presentational, or executable.
//! - `div` and `span` are unwrapped: purely-layout wrappers whose children
//!   are promoted in place, preserving order and text.
//! - `a` keeps exactly one attribute, `href`; every other element is
//!   emitted with no attributes at all.
//!
//! There is no error path. Malformed input degrades to best-effort output;
//! the parser's repair means the result is always well-formed markup.

use crate::classify::{classify, Lang};
use crate::document::CodeBlock;
use ego_tree::NodeId;
use once_cell::sync::Lazy;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

static PRE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("pre").expect("hardcoded selector is valid"));

/// Subtrees removed wholesale, content included.
const DROP_TAGS: &[&str] = &["img", "iframe", "video", "figure", "style", "script"];

/// Layout-only wrappers whose children are promoted.
const UNWRAP_TAGS: &[&str] = &["div", "span"];

/// Elements with no closing tag. `img` never survives sanitization, but the
/// serializer must still not emit `</br>` for the ones that do.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Sanitize an HTML fragment to the allow-listed structural subset.
///
/// Total: malformed input is repaired by the parser and serialized
/// best-effort, never an error.
pub fn sanitize(html: &str) -> String {
    let document = Html::parse_fragment(html);
    serialize(&document, &HashSet::new())
}

/// Sanitize, then discard code blocks not classified as `target`.
///
/// Fail-open: if *no* block classifies as the target, classification is not
/// trusted and nothing is discarded — an ambiguous document keeps its only
/// examples rather than being emptied.
pub fn sanitize_keeping_target(html: &str, target: Lang) -> String {
    let document = Html::parse_fragment(html);

    let mut keep: Vec<NodeId> = Vec::new();
    let mut drop: Vec<NodeId> = Vec::new();
    for pre in document.select(&PRE_SELECTOR) {
        let text: String = pre.text().collect();
        if classify(&text).label == target {
            keep.push(pre.id());
        } else {
            drop.push(pre.id());
        }
    }

    let to_remove: HashSet<NodeId> = if keep.is_empty() {
        HashSet::new()
    } else {
        drop.into_iter().collect()
    };

    serialize(&document, &to_remove)
}

/// Extract and classify every code block in a fragment, in document order.
pub fn code_blocks(html: &str) -> Vec<CodeBlock> {
    let document = Html::parse_fragment(html);
    document
        .select(&PRE_SELECTOR)
        .enumerate()
        .map(|(position, pre)| {
            let text: String = pre.text().collect();
            let classification = classify(&text);
            CodeBlock {
                text,
                position,
                classification,
            }
        })
        .collect()
}

// ── Serialization ────────────────────────────────────────────────────────

fn serialize(document: &Html, to_remove: &HashSet<NodeId>) -> String {
    let mut out = String::new();
    serialize_children(&document.root_element(), to_remove, &mut out);
    out.trim().to_string()
}

/// Emit the allow-listed rendition of an element's children.
///
/// Comments and doctypes are dropped; text is entity-escaped so that code
/// like `vector<int>` survives as valid markup.
fn serialize_children(element: &ElementRef, to_remove: &HashSet<NodeId>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                for ch in text.chars() {
                    match ch {
                        '<' => out.push_str("&lt;"),
                        '>' => out.push_str("&gt;"),
                        '&' => out.push_str("&amp;"),
                        c => out.push(c),
                    }
                }
            }
            Node::Element(_) => {
                let Some(el) = ElementRef::wrap(child) else {
                    continue;
                };
                if to_remove.contains(&el.id()) {
                    continue;
                }
                let name = el.value().name();
                if DROP_TAGS.contains(&name) {
                    continue;
                }
                if UNWRAP_TAGS.contains(&name) {
                    serialize_children(&el, to_remove, out);
                    continue;
                }

                out.push('<');
                out.push_str(name);
                // Hyperlinks keep their one functionally-required attribute.
                if name == "a" {
                    if let Some(href) = el.value().attr("href") {
                        out.push_str(" href=\"");
                        for ch in href.chars() {
                            match ch {
                                '"' => out.push_str("&quot;"),
                                '&' => out.push_str("&amp;"),
                                c => out.push(c),
                            }
                        }
                        out.push('"');
                    }
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&name) {
                    continue;
                }

                serialize_children(&el, to_remove, out);
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            // Comments, doctypes, processing instructions: dropped.
            _ => {}
        }
    }
}
