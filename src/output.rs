//! Batch results: per-document outcomes and aggregate statistics.

use crate::document::Document;
use crate::error::DocError;
use serde::{Deserialize, Serialize};

/// Terminal state of one document after a batch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocStatus {
    /// At least one block already carried the target label; content was
    /// sanitized and written back, no service call made.
    AlreadyTarget,
    /// The service produced content that passed the validation gate.
    Rewritten,
    /// The service responded but its output never passed validation;
    /// original content retained.
    FailedValidation,
    /// The service call errored or timed out; original content retained.
    FailedService,
    /// No solution body to process; snippets pruned only.
    NoContent,
    /// The record could not be loaded from the store.
    LoadFailed,
    /// The updated record could not be written back; unresolved, not
    /// succeeded.
    SaveFailed,
    /// Audit-only verdict: the document would be sent to the service.
    NeedsRewrite,
}

impl DocStatus {
    /// Statuses an operator must look at before the corpus is done.
    pub fn is_unresolved(self) -> bool {
        matches!(
            self,
            DocStatus::FailedValidation
                | DocStatus::FailedService
                | DocStatus::LoadFailed
                | DocStatus::SaveFailed
                | DocStatus::NeedsRewrite
        )
    }
}

/// Outcome for a single document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOutcome {
    pub id: String,
    /// Empty when the record never loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: DocStatus,
    /// The per-document error, when the status is a failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DocError>,
    /// Diagnostic detail: which signature fired, how many blocks matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The settled record when it could not be persisted (`SaveFailed`).
    /// Lets callers retry the write without paying for the rewrite again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    /// Service calls made for this document (0 when skipped).
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Aggregate statistics for one batch pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub total_documents: usize,
    pub already_target: usize,
    pub rewritten: usize,
    pub failed_validation: usize,
    pub failed_service: usize,
    pub no_content: usize,
    /// Load + save failures: documents whose on-disk state is stale.
    pub unresolved_io: usize,
    /// Audit mode only: documents that would be rewritten.
    pub needs_rewrite: usize,
    pub total_duration_ms: u64,
}

/// Complete result of a batch pass: one outcome per input document, plus
/// the aggregate. Serializable for `--json` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub outcomes: Vec<DocumentOutcome>,
    pub stats: RunStats,
}

impl RunReport {
    /// Aggregate outcomes into a report. Counts are derived, never stored
    /// separately, so they cannot drift from the outcome list.
    pub fn from_outcomes(mut outcomes: Vec<DocumentOutcome>, total_duration_ms: u64) -> Self {
        // Stable, id-ordered output regardless of completion order.
        outcomes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut stats = RunStats {
            total_documents: outcomes.len(),
            total_duration_ms,
            ..RunStats::default()
        };
        for o in &outcomes {
            match o.status {
                DocStatus::AlreadyTarget => stats.already_target += 1,
                DocStatus::Rewritten => stats.rewritten += 1,
                DocStatus::FailedValidation => stats.failed_validation += 1,
                DocStatus::FailedService => stats.failed_service += 1,
                DocStatus::NoContent => stats.no_content += 1,
                DocStatus::LoadFailed | DocStatus::SaveFailed => stats.unresolved_io += 1,
                DocStatus::NeedsRewrite => stats.needs_rewrite += 1,
            }
        }
        Self { outcomes, stats }
    }

    /// True when a re-run would have nothing left to do.
    pub fn is_settled(&self) -> bool {
        self.outcomes.iter().all(|o| !o.status.is_unresolved())
    }
}
