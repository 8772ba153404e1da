//! Error types for the probnorm library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ProbnormError`] — **Fatal**: the batch cannot start at all (bad
//!   target language, missing corpus directory, provider not configured).
//!   Returned as `Err(ProbnormError)` from the top-level `run` functions.
//!
//! * [`DocError`] — **Non-fatal**: a single document failed (service error,
//!   validation rejection, torn save) but every sibling document is fine.
//!   Stored inside [`crate::output::DocumentOutcome`] so callers can inspect
//!   partial success rather than losing the whole batch to one bad record.
//!
//! [`RewriteServiceError`] is the rewrite service's own failure surface,
//! kept separate so the orchestrator can distinguish "service is down" from
//! "service is producing wrong output" when building outcomes.

use crate::classify::Lang;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the probnorm library.
///
/// Document-level failures use [`DocError`] and are stored in
/// [`crate::output::DocumentOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ProbnormError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The requested target is not a language documents can be rewritten to.
    #[error("'{target}' is not a valid rewrite target (expected java, cpp, or python)")]
    InvalidTarget { target: Lang },

    // ── Store errors ──────────────────────────────────────────────────────
    /// The corpus directory does not exist or is not a directory.
    #[error("Corpus directory not found: '{path}'\nCheck the path exists and is readable.")]
    StoreRootNotFound { path: PathBuf },

    /// Listing the corpus directory failed.
    #[error("Failed to list corpus directory '{path}': {source}")]
    StoreListFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Service errors ────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single document.
///
/// Stored alongside [`crate::output::DocumentOutcome`] when a document
/// fails. The overall batch continues regardless.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum DocError {
    /// The record could not be loaded or parsed from the store.
    #[error("document '{id}': load failed: {detail}")]
    LoadFailed { id: String, detail: String },

    /// The rewrite service errored or timed out.
    #[error("document '{id}': rewrite service failed: {detail}")]
    ServiceFailed { id: String, detail: String },

    /// The service responded, but no block classified as the target.
    #[error("document '{id}': rewrite produced no {target} block ({blocks} blocks checked)")]
    ValidationFailed {
        id: String,
        target: Lang,
        blocks: usize,
    },

    /// The updated record could not be written back. The document on disk is
    /// still the previous valid version; the batch reports it as unresolved
    /// rather than succeeded.
    #[error("document '{id}': save failed: {detail}")]
    SaveFailed { id: String, detail: String },
}

/// Failure surface of the external rewrite service.
#[derive(Debug, Error)]
pub enum RewriteServiceError {
    /// The underlying API call failed (network, auth, quota, 5xx).
    #[error("rewrite service call failed: {0}")]
    Call(String),

    /// The call exceeded the per-call timeout; treated identically to a
    /// failed call by the orchestrator.
    #[error("rewrite service call timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Errors from the authenticated fetch collaborator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to '{url}' failed: {detail}")]
    Http { url: String, detail: String },

    #[error("unexpected response shape from '{url}': {detail}")]
    BadResponse { url: String, detail: String },

    #[error("failed to write asset '{path}': {source}")]
    AssetWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
