//! Pipeline stages for document normalization.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap
//! implementations (e.g. a different provider backend) without touching
//! the others.
//!
//! ## Data Flow
//!
//! ```text
//! sanitize ──▶ llm ──▶ postprocess ──▶ validate
//! (allow-list)  (rewrite svc)  (fence strip)  (re-classify)
//! ```
//!
//! 1. [`llm`]         — the rewrite-service interface and its LLM-backed
//!    implementation; the only stage with network I/O
//! 2. [`postprocess`] — deterministic cleanup of service response artifacts
//!    (fence wrappers the service is not contractually guaranteed to omit)
//! 3. [`rewrite`]     — the orchestrator: sanitize, call, clean, validate,
//!    and decide accept/reject without ever leaving a document worse off

pub mod llm;
pub mod postprocess;
pub mod rewrite;
