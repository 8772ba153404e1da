//! Post-processing: deterministic cleanup of rewrite-service responses.
//!
//! ## Why is this necessary?
//!
//! Even well-prompted models occasionally wrap their output in
//! ` ```html ... ``` ` fences despite the prompt saying not to, or leave a
//! bare ` ``` ` on the first or last line. The service is not contractually
//! guaranteed to omit these, so we strip them defensively here instead of
//! hoping the prompt holds. Each rule is a pure `&str → String` pass with
//! no shared state.

use once_cell::sync::Lazy;
use regex::Regex;

/// Full fence wrap: the entire response inside one ```/```html block.
static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:html)?\s*\n(.*)\n```\s*$").expect("hardcoded regex is valid"));

/// Strip known response-wrapping artifacts from raw service output.
///
/// Handles both the fully-fenced case and stray leading/trailing fence
/// markers; anything else passes through untouched apart from outer
/// whitespace trimming.
pub fn clean_response(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        return caps[1].trim().to_string();
    }

    // Partial artifacts: a fence opener or closer without its pair.
    let mut s = trimmed;
    if let Some(rest) = s.strip_prefix("```html") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_full_html_fence() {
        let raw = "```html\n<p>hi</p>\n```";
        assert_eq!(clean_response(raw), "<p>hi</p>");
    }

    #[test]
    fn strips_full_bare_fence() {
        let raw = "```\n<p>hi</p>\n```";
        assert_eq!(clean_response(raw), "<p>hi</p>");
    }

    #[test]
    fn strips_leading_fence_only() {
        assert_eq!(clean_response("```html<p>hi</p>"), "<p>hi</p>");
    }

    #[test]
    fn strips_trailing_fence_only() {
        assert_eq!(clean_response("<p>hi</p>\n```"), "<p>hi</p>");
    }

    #[test]
    fn passthrough_when_clean() {
        assert_eq!(clean_response("  <p>hi</p>\n"), "<p>hi</p>");
    }

    #[test]
    fn inner_fences_untouched() {
        // A fence in the middle of the document is content, not wrapping.
        let raw = "<p>use ``` for code</p>";
        assert_eq!(clean_response(raw), raw);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(clean_response(""), "");
        assert_eq!(clean_response("   "), "");
    }
}
