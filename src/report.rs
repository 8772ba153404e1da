//! Reporting sink: per-document outcome events for observers.
//!
//! The scheduler already returns a complete [`crate::output::RunReport`];
//! the sink exists for callers who want events *while* the batch runs — a
//! progress bar, a log shipper, a dashboard. No ordering or durability is
//! guaranteed beyond every outcome being reported before the batch returns.

use crate::output::{DocumentOutcome, RunStats};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared handle to a report sink.
pub type SharedSink = Arc<dyn ReportSink>;

/// Observer for batch progress. Implementations must be cheap and
/// non-blocking; they are called from inside the concurrent fan-out.
pub trait ReportSink: Send + Sync {
    /// Called once before any document is processed.
    fn begin(&self, _total_documents: usize) {}

    /// Called once per document, in completion order.
    fn record(&self, outcome: &DocumentOutcome);

    /// Called once after every outcome has been recorded.
    fn finish(&self, _stats: &RunStats) {}
}

/// Default sink: forwards outcomes to `tracing`.
pub struct TraceSink;

impl ReportSink for TraceSink {
    fn begin(&self, total_documents: usize) {
        info!("processing {} documents", total_documents);
    }

    fn record(&self, outcome: &DocumentOutcome) {
        if outcome.status.is_unresolved() {
            warn!(
                id = %outcome.id,
                status = ?outcome.status,
                detail = outcome.detail.as_deref().unwrap_or(""),
                "document unresolved"
            );
        } else {
            info!(
                id = %outcome.id,
                status = ?outcome.status,
                attempts = outcome.attempts,
                "document done"
            );
        }
    }

    fn finish(&self, stats: &RunStats) {
        info!(
            "batch complete: {}/{} already target, {} rewritten, {} failed, {}ms",
            stats.already_target,
            stats.total_documents,
            stats.rewritten,
            stats.failed_validation + stats.failed_service + stats.unresolved_io,
            stats.total_duration_ms
        );
    }
}
