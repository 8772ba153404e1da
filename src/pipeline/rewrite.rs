//! The rewrite orchestrator: one sanitize-call-validate round per document.
//!
//! ## The acceptance gate
//!
//! The service's own success signal is not trusted: a 200 response can
//! still contain the wrong language. After stripping response artifacts,
//! the result's code blocks are re-run through the classifier, and the
//! rewrite is accepted only if at least one block carries the target
//! label. On any failure — service error, timeout, or validation — the
//! returned content is the original input, byte for byte: a failed
//! rewrite must never leave the document in a worse or inconsistent
//! state than before the attempt.
//!
//! No retry loop lives here; the orchestrator is single-shot and the
//! scheduler owns retry policy.

use crate::classify::Lang;
use crate::error::RewriteServiceError;
use crate::pipeline::llm::RewriteService;
use crate::pipeline::postprocess;
use crate::sanitize;
use tracing::debug;

/// Terminal outcome of one rewrite attempt.
#[derive(Debug)]
pub enum RewriteOutcome {
    /// Validation passed; `RewriteResult::html` is the new content.
    Succeeded {
        /// How many blocks carried the target label. Acceptance requires
        /// one; the count lets operators audit partially-converted output.
        target_blocks: usize,
    },
    /// Service responded but no block classified as the target.
    FailedValidation { blocks: usize },
    /// The call itself errored or timed out.
    FailedService { error: RewriteServiceError },
}

/// Result of one rewrite attempt. On failure `html` is the unmodified
/// original.
#[derive(Debug)]
pub struct RewriteResult {
    pub html: String,
    pub outcome: RewriteOutcome,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Run one sanitize → rewrite → validate round over a document body.
pub async fn rewrite_document(
    service: &dyn RewriteService,
    html: &str,
    target: Lang,
    system_prompt: &str,
) -> RewriteResult {
    // The service sees the sanitized rendition: less markup noise, fewer
    // tokens, nothing presentational to faithfully reproduce.
    let cleaned_input = sanitize::sanitize(html);

    let response = match service.rewrite(&cleaned_input, system_prompt).await {
        Ok(r) => r,
        Err(error) => {
            return RewriteResult {
                html: html.to_string(),
                outcome: RewriteOutcome::FailedService { error },
                input_tokens: 0,
                output_tokens: 0,
            };
        }
    };

    let candidate = postprocess::clean_response(&response.content);
    let blocks = sanitize::code_blocks(&candidate);
    let target_blocks = blocks.iter().filter(|b| b.label() == target).count();

    if target_blocks > 0 {
        debug!(
            "rewrite accepted: {}/{} blocks classify as {}",
            target_blocks,
            blocks.len(),
            target
        );
        RewriteResult {
            html: candidate,
            outcome: RewriteOutcome::Succeeded { target_blocks },
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
        }
    } else {
        RewriteResult {
            html: html.to_string(),
            outcome: RewriteOutcome::FailedValidation {
                blocks: blocks.len(),
            },
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
        }
    }
}
