//! # probnorm
//!
//! Normalize the solution language of an HTML problem corpus using LLMs.
//!
//! ## Why this crate?
//!
//! Scraped programming-problem archives are linguistically messy: one
//! editorial solves in C++, the next in Python, a third mixes both, and the
//! markup carries trackers, styling spans, and dead image references.
//! Regex-level translation cannot rewrite a C++ solution into idiomatic
//! Java, and manual editing does not scale past a few dozen documents.
//! This crate classifies every code block with a deterministic heuristic
//! cascade, routes only the documents that need it through an LLM rewrite,
//! and re-classifies the output before accepting it — so the model is never
//! trusted to grade its own work.
//!
//! ## Pipeline Overview
//!
//! ```text
//! corpus (one JSON record per document)
//!  │
//!  ├─ 1. Load      read the record from the document store
//!  ├─ 2. Sanitize  strip noise markup, keep an allow-listed skeleton
//!  ├─ 3. Classify  label every <pre> block (java / cpp / python / …)
//!  ├─ 4. Filter    skip documents already in the target language
//!  ├─ 5. Rewrite   concurrent LLM calls for the rest
//!  ├─ 6. Validate  re-classify the response; reject wrong-language output
//!  └─ 7. Save      atomic write-back, original kept on any failure
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use probnorm::{run, JsonDirStore, NormalizeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let store = JsonDirStore::open("corpus/")?;
//!     let config = NormalizeConfig::default();
//!     let report = run(&store, &config).await?;
//!     println!("{} rewritten, {} already ok",
//!         report.stats.rewritten, report.stats.already_target);
//!     Ok(())
//! }
//! ```
//!
//! Runs are idempotent: a document that settled once classifies as already
//! in the target language on the next pass, so re-running after partial
//! failures converges without re-spending tokens on finished documents.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `probnorm` binary (clap + anyhow + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! probnorm = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod classify;
pub mod config;
pub mod document;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod run;
pub mod sanitize;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use classify::{classify, label_of, Classification, Lang};
pub use config::{NormalizeConfig, NormalizeConfigBuilder};
pub use document::{CodeBlock, CodeSnippet, Document};
pub use error::{DocError, FetchError, ProbnormError, RewriteServiceError};
pub use fetch::{backfill, BackfillStats, ContentFetcher, GraphqlFetcher};
pub use output::{DocStatus, DocumentOutcome, RunReport, RunStats};
pub use pipeline::llm::{LlmRewriteService, RewriteResponse, RewriteService};
pub use report::{ReportSink, SharedSink, TraceSink};
pub use run::{audit, run};
pub use store::{DocumentStore, JsonDirStore};
