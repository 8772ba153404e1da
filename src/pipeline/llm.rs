//! The rewrite-service interface and its LLM-backed implementation.
//!
//! The external service is untrusted: it may be slow, may wrap output in
//! extraneous delimiters, may occasionally emit the wrong language despite
//! instruction. This module is intentionally thin — it owns only the call
//! itself (message assembly, per-call timeout, error mapping). Acceptance
//! of the result belongs to the orchestrator's classification gate, not to
//! the service's own success signal.
//!
//! [`RewriteService`] is object-safe so tests (and callers with custom
//! middleware) can inject a stub instead of a live provider.

use crate::error::RewriteServiceError;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// A successful service response.
#[derive(Debug, Clone)]
pub struct RewriteResponse {
    /// Raw response text, wrapping artifacts and all.
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The external generative rewrite service.
pub trait RewriteService: Send + Sync {
    /// Rewrite `html` per `system_prompt`. One call, no internal retries —
    /// retry policy belongs to the scheduler.
    fn rewrite<'a>(
        &'a self,
        html: &'a str,
        system_prompt: &'a str,
    ) -> BoxFuture<'a, Result<RewriteResponse, RewriteServiceError>>;
}

/// [`RewriteService`] backed by an [`edgequake_llm`] provider.
pub struct LlmRewriteService {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
}

impl LlmRewriteService {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        temperature: f32,
        max_tokens: usize,
        timeout_secs: u64,
    ) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
            timeout_secs,
        }
    }
}

impl RewriteService for LlmRewriteService {
    fn rewrite<'a>(
        &'a self,
        html: &'a str,
        system_prompt: &'a str,
    ) -> BoxFuture<'a, Result<RewriteResponse, RewriteServiceError>> {
        async move {
            let start = Instant::now();
            let messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(html)];
            let options = CompletionOptions {
                temperature: Some(self.temperature),
                max_tokens: Some(self.max_tokens),
                ..Default::default()
            };

            let response = timeout(
                Duration::from_secs(self.timeout_secs),
                self.provider.chat(&messages, Some(&options)),
            )
            .await
            .map_err(|_| RewriteServiceError::Timeout {
                secs: self.timeout_secs,
            })?
            .map_err(|e| RewriteServiceError::Call(e.to_string()))?;

            debug!(
                "rewrite call: {} input tokens, {} output tokens, {:?}",
                response.prompt_tokens,
                response.completion_tokens,
                start.elapsed()
            );

            Ok(RewriteResponse {
                content: response.content,
                input_tokens: response.prompt_tokens as u64,
                output_tokens: response.completion_tokens as u64,
            })
        }
        .boxed()
    }
}
