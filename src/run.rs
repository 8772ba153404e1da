//! Batch entry points: the concurrent scheduler and the audit pass.
//!
//! ## Scheduling model
//!
//! The document set is fanned out over a bounded-concurrency stream: at
//! most `config.concurrency` rewrite calls are in flight at once, and a
//! slot frees the moment its document settles. Documents are independent —
//! no outcome feeds another — so completion order is irrelevant and the
//! report re-sorts by id.
//!
//! ## Retry policy
//!
//! Each failure kind earns at most one retry per document: one extra call
//! after a service error, one extra after a validation rejection, so a
//! document costs at most three service calls. The delay before a retry
//! doubles per attempt. Both failure kinds retry because both are
//! empirically transient at low sampling temperature; both cap at one
//! because a second identical failure means the document, not the weather.
//!
//! Every terminal state leaves the store valid: a document either holds
//! its new accepted content or its previous content, never an intermediate.

use crate::config::NormalizeConfig;
use crate::document::Document;
use crate::error::{DocError, ProbnormError};
use crate::filter;
use crate::output::{DocStatus, DocumentOutcome, RunReport};
use crate::pipeline::llm::{LlmRewriteService, RewriteService};
use crate::pipeline::rewrite::{rewrite_document, RewriteOutcome};
use crate::prompts;
use crate::report::{SharedSink, TraceSink};
use crate::sanitize;
use crate::store::DocumentStore;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Normalize every document in the store toward `config.target`.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(RunReport)` on success, even if some documents failed (check
/// `report.is_settled()` and the per-document outcomes).
///
/// # Errors
/// Returns `Err(ProbnormError)` only for fatal errors:
/// - The store cannot list its documents
/// - No rewrite service could be configured
pub async fn run(
    store: &dyn DocumentStore,
    config: &NormalizeConfig,
) -> Result<RunReport, ProbnormError> {
    let total_start = Instant::now();

    let ids = store.list_ids()?;
    info!("corpus has {} documents, target {}", ids.len(), config.target);

    let service = resolve_service(config)?;
    let system_prompt = prompts::rewrite_system_prompt(config.target, config.system_prompt.as_deref());
    let sink: SharedSink = config
        .report_sink
        .clone()
        .unwrap_or_else(|| Arc::new(TraceSink));
    sink.begin(ids.len());

    let outcomes: Vec<DocumentOutcome> = stream::iter(ids.into_iter().map(|id| {
        let service = Arc::clone(&service);
        let sink = Arc::clone(&sink);
        let system_prompt = system_prompt.as_str();
        async move {
            let outcome = process_document(store, service.as_ref(), config, system_prompt, id).await;
            sink.record(&outcome);
            outcome
        }
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await;

    let report = RunReport::from_outcomes(outcomes, total_start.elapsed().as_millis() as u64);
    sink.finish(&report.stats);
    Ok(report)
}

/// Read-only audit: classify every document and report what a rewrite run
/// would do, without calling any service or writing anything back.
pub fn audit(
    store: &dyn DocumentStore,
    config: &NormalizeConfig,
) -> Result<RunReport, ProbnormError> {
    let total_start = Instant::now();
    let ids = store.list_ids()?;
    let sink: SharedSink = config
        .report_sink
        .clone()
        .unwrap_or_else(|| Arc::new(TraceSink));
    sink.begin(ids.len());

    let outcomes: Vec<DocumentOutcome> = ids
        .into_iter()
        .map(|id| {
            let outcome = audit_document(store, config, id);
            sink.record(&outcome);
            outcome
        })
        .collect();

    let report = RunReport::from_outcomes(outcomes, total_start.elapsed().as_millis() as u64);
    sink.finish(&report.stats);
    Ok(report)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the rewrite service, from most-specific to least-specific.
///
/// The fallback chain lets library users and CLI users each set exactly as
/// much or as little as they need:
///
/// 1. **Pre-built service** (`config.service`) — used as-is. For tests and
///    callers with custom middleware.
///
/// 2. **Pre-built provider** (`config.provider`) — wrapped in the default
///    [`LlmRewriteService`] with the config's call parameters.
///
/// 3. **Named provider + model** (`config.provider_name`) — the factory
///    reads the corresponding API key (`OPENAI_API_KEY`, etc.) from the
///    environment.
///
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`) —
///    both set means the execution environment chose; honoured before full
///    auto-detection so the choice wins even when several API keys exist.
///
/// 5. **Full auto-detection** — prefer OpenAI when its key is present, else
///    let [`ProviderFactory::from_env`] scan every known key variable.
fn resolve_service(config: &NormalizeConfig) -> Result<Arc<dyn RewriteService>, ProbnormError> {
    if let Some(ref service) = config.service {
        return Ok(Arc::clone(service));
    }

    let provider = resolve_provider(config)?;
    Ok(Arc::new(LlmRewriteService::new(
        provider,
        config.temperature,
        config.max_tokens,
        config.api_timeout_secs,
    )))
}

fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ProbnormError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ProbnormError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn resolve_provider(config: &NormalizeConfig) -> Result<Arc<dyn LLMProvider>, ProbnormError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    // Prefer OpenAI explicitly when its key is present so users holding
    // multiple provider keys get a deterministic default.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ProbnormError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Drive one document to a terminal state.
async fn process_document(
    store: &dyn DocumentStore,
    service: &dyn RewriteService,
    config: &NormalizeConfig,
    system_prompt: &str,
    id: String,
) -> DocumentOutcome {
    let start = Instant::now();
    let target = config.target;

    let mut doc = match store.load(&id) {
        Ok(doc) => doc,
        Err(error) => {
            return DocumentOutcome {
                id,
                title: None,
                status: DocStatus::LoadFailed,
                detail: Some(error.to_string()),
                error: Some(error),
                document: None,
                attempts: 0,
                duration_ms: start.elapsed().as_millis() as u64,
            };
        }
    };
    let title = Some(doc.title.clone());

    // No solution body: nothing to classify or rewrite, but the starter
    // snippets still get pruned to the target language.
    let Some(html) = doc.solution_html().map(str::to_string) else {
        doc.retain_target_snippets(target);
        return settle_with_save(store, &doc, &id, title, DocStatus::NoContent, None, 0, start);
    };

    if !filter::needs_rewrite(&html, target) {
        // Already in the target language (or prose-only). Sanitize, drop
        // the non-target blocks, prune snippets, write back.
        doc.solution_body = Some(sanitize::sanitize_keeping_target(&html, target));
        doc.retain_target_snippets(target);
        debug!("document {} already satisfies {}", id, target);
        return settle_with_save(
            store,
            &doc,
            &id,
            title,
            DocStatus::AlreadyTarget,
            None,
            0,
            start,
        );
    }

    // Rewrite loop: one retry per failure kind, backoff doubling per call.
    let mut attempts: u32 = 0;
    let mut retried_service = false;
    let mut retried_validation = false;
    let result = loop {
        attempts += 1;
        let result = rewrite_document(service, &html, target, system_prompt).await;
        match &result.outcome {
            RewriteOutcome::Succeeded { .. } => break result,
            RewriteOutcome::FailedService { error } if !retried_service => {
                retried_service = true;
                let delay = backoff_delay(config.retry_backoff_ms, attempts);
                warn!(
                    "document {}: service failed ({}), retrying in {:?}",
                    id, error, delay
                );
                tokio::time::sleep(delay).await;
            }
            RewriteOutcome::FailedValidation { blocks } if !retried_validation => {
                retried_validation = true;
                let delay = backoff_delay(config.retry_backoff_ms, attempts);
                warn!(
                    "document {}: no {} block in response ({} blocks), retrying in {:?}",
                    id, target, blocks, delay
                );
                tokio::time::sleep(delay).await;
            }
            _ => break result,
        }
    };

    match result.outcome {
        RewriteOutcome::Succeeded { target_blocks } => {
            doc.solution_body = Some(sanitize::sanitize_keeping_target(&result.html, target));
            doc.retain_target_snippets(target);
            settle_with_save(
                store,
                &doc,
                &id,
                title,
                DocStatus::Rewritten,
                Some(format!("{target_blocks} {target} blocks accepted")),
                attempts,
                start,
            )
        }
        // Terminal failures never touch the store; the previous valid
        // record stays in place for the next run.
        RewriteOutcome::FailedValidation { blocks } => {
            let error = DocError::ValidationFailed {
                id: id.clone(),
                target,
                blocks,
            };
            DocumentOutcome {
                id,
                title,
                status: DocStatus::FailedValidation,
                detail: Some(error.to_string()),
                error: Some(error),
                document: None,
                attempts,
                duration_ms: start.elapsed().as_millis() as u64,
            }
        }
        RewriteOutcome::FailedService { error } => {
            let error = DocError::ServiceFailed {
                id: id.clone(),
                detail: error.to_string(),
            };
            DocumentOutcome {
                id,
                title,
                status: DocStatus::FailedService,
                detail: Some(error.to_string()),
                error: Some(error),
                document: None,
                attempts,
                duration_ms: start.elapsed().as_millis() as u64,
            }
        }
    }
}

/// Persist the settled document; a failed save downgrades the outcome.
///
/// The failed outcome carries the settled record itself: the work (possibly
/// a paid service call) is already done, so callers get to retry the write
/// instead of re-running the rewrite.
#[allow(clippy::too_many_arguments)]
fn settle_with_save(
    store: &dyn DocumentStore,
    doc: &Document,
    id: &str,
    title: Option<String>,
    status: DocStatus,
    detail: Option<String>,
    attempts: u32,
    start: Instant,
) -> DocumentOutcome {
    match store.save(id, doc) {
        Ok(()) => DocumentOutcome {
            id: id.to_string(),
            title,
            status,
            error: None,
            detail,
            document: None,
            attempts,
            duration_ms: start.elapsed().as_millis() as u64,
        },
        Err(error) => DocumentOutcome {
            id: id.to_string(),
            title,
            status: DocStatus::SaveFailed,
            detail: Some(error.to_string()),
            error: Some(error),
            document: Some(doc.clone()),
            attempts,
            duration_ms: start.elapsed().as_millis() as u64,
        },
    }
}

fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(1 << (attempt.saturating_sub(1)).min(8)))
}

/// Classify one document without touching it.
fn audit_document(store: &dyn DocumentStore, config: &NormalizeConfig, id: String) -> DocumentOutcome {
    let start = Instant::now();
    let target = config.target;

    let doc = match store.load(&id) {
        Ok(doc) => doc,
        Err(error) => {
            return DocumentOutcome {
                id,
                title: None,
                status: DocStatus::LoadFailed,
                detail: Some(error.to_string()),
                error: Some(error),
                document: None,
                attempts: 0,
                duration_ms: start.elapsed().as_millis() as u64,
            };
        }
    };
    let title = Some(doc.title.clone());

    let (status, detail) = match doc.solution_html() {
        None => (DocStatus::NoContent, None),
        Some(html) if filter::needs_rewrite(html, target) => {
            let selection = filter::select_blocks(html, target);
            let labels: Vec<String> = selection.drop.iter().map(|b| b.label().to_string()).collect();
            (
                DocStatus::NeedsRewrite,
                Some(format!("blocks: {}", labels.join(", "))),
            )
        }
        Some(html) => {
            let selection = filter::select_blocks(html, target);
            (
                DocStatus::AlreadyTarget,
                Some(format!("{} {} blocks", selection.keep.len(), target)),
            )
        }
    };

    DocumentOutcome {
        id,
        title,
        status,
        error: None,
        detail,
        document: None,
        attempts: 0,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(500, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(500, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(500, 3), Duration::from_millis(2000));
    }

    #[test]
    fn backoff_saturates() {
        // Pathological attempt counts must not overflow the shift.
        let d = backoff_delay(u64::MAX, 40);
        assert!(d >= Duration::from_millis(1));
    }
}
