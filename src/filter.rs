//! The rewrite decision: which documents need the service at all.
//!
//! Classification and sanitization are cheap, synchronous passes; the
//! rewrite call is slow, metered network I/O. This module is the gate
//! between them: a document is routed to the rewrite service only when it
//! has code and none of it is already in the target language.
//!
//! A document whose blocks all classify as `Foreign` or `Unknown` *does*
//! need rewriting — it is never silently left in an unknown state. The
//! cost of that policy is the occasional false positive on a block the
//! cascade simply failed to recognize; the orchestrator's validation gate
//! keeps such documents from being corrupted, so the failure mode is a
//! wasted service call, not data loss.

use crate::classify::Lang;
use crate::document::CodeBlock;
use crate::sanitize;

/// The keep/drop split for a document's code blocks against a target.
#[derive(Debug, Default)]
pub struct BlockSelection {
    /// Blocks already in the target language.
    pub keep: Vec<CodeBlock>,
    /// Blocks that would be rewritten or discarded.
    pub drop: Vec<CodeBlock>,
}

/// True iff the fragment has at least one non-empty code block and none of
/// them classify as `target`.
pub fn needs_rewrite(html: &str, target: Lang) -> bool {
    let blocks = sanitize::code_blocks(html);
    let has_code = blocks.iter().any(|b| !b.text.trim().is_empty());
    has_code && !blocks.iter().any(|b| b.label() == target)
}

/// Partition a fragment's code blocks by whether they satisfy the target.
pub fn select_blocks(html: &str, target: Lang) -> BlockSelection {
    let mut selection = BlockSelection::default();
    for block in sanitize::code_blocks(html) {
        if block.label() == target {
            selection.keep.push(block);
        } else {
            selection.drop.push(block);
        }
    }
    selection
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAVA_DOC: &str =
        "<p>Use a map.</p><pre>class Solution { public int[] twoSum() { return null; } }</pre>";
    const CPP_DOC: &str =
        "<p>Use a map.</p><pre>#include &lt;vector&gt;\nstd::vector&lt;int&gt; twoSum();</pre>";

    #[test]
    fn target_language_document_passes() {
        assert!(!needs_rewrite(JAVA_DOC, Lang::Java));
    }

    #[test]
    fn foreign_language_document_needs_rewrite() {
        assert!(needs_rewrite(CPP_DOC, Lang::Java));
    }

    #[test]
    fn no_code_means_no_rewrite() {
        assert!(!needs_rewrite("<p>prose only</p>", Lang::Java));
        assert!(!needs_rewrite("", Lang::Java));
    }

    #[test]
    fn whitespace_only_blocks_do_not_count_as_code() {
        assert!(!needs_rewrite("<pre>   \n </pre>", Lang::Java));
    }

    #[test]
    fn unclassifiable_block_needs_rewrite() {
        // Catch-all blocks are never silently left alone.
        assert!(needs_rewrite("<pre>mystery content</pre>", Lang::Java));
    }

    #[test]
    fn sql_block_needs_rewrite() {
        assert!(needs_rewrite(
            "<pre>SELECT id FROM Users;</pre>",
            Lang::Java
        ));
    }

    #[test]
    fn one_target_block_is_enough() {
        let mixed = format!("{JAVA_DOC}{CPP_DOC}");
        assert!(!needs_rewrite(&mixed, Lang::Java));
        let selection = select_blocks(&mixed, Lang::Java);
        assert_eq!(selection.keep.len(), 1);
        assert_eq!(selection.drop.len(), 1);
        assert_eq!(selection.keep[0].label(), Lang::Java);
    }
}
