//! Configuration for a normalization run.
//!
//! Every knob lives in [`NormalizeConfig`], built via its builder. Keeping
//! the whole run description in one struct makes it trivial to share across
//! tasks, log at startup, and diff two runs to understand why their reports
//! differ.

use crate::classify::Lang;
use crate::error::ProbnormError;
use crate::pipeline::llm::RewriteService;
use crate::report::SharedSink;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for a corpus normalization run.
///
/// Built via [`NormalizeConfig::builder()`] or using
/// [`NormalizeConfig::default()`].
///
/// # Example
/// ```rust
/// use probnorm::NormalizeConfig;
///
/// let config = NormalizeConfig::builder()
///     .concurrency(8)
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct NormalizeConfig {
    /// Language every document's solution should end up in. Default: Java.
    ///
    /// Must satisfy [`Lang::is_rewrite_target`]; `build()` rejects the
    /// classification-only labels (`foreign`, `unknown`).
    pub target: Lang,

    /// Number of in-flight rewrite calls. Default: 5.
    ///
    /// The rewrite service is network-bound, not CPU-bound, so a handful of
    /// concurrent calls cuts wall-clock time roughly linearly until the
    /// provider starts rate-limiting (`429`). Lower this if you see limit
    /// errors; raise it if the API is fast and your corpus is large.
    pub concurrency: usize,

    /// LLM model identifier, e.g. "gpt-4.1-nano", "claude-sonnet-4-20250514".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the environment decides.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed rewrite service. Takes precedence over both provider
    /// fields; primarily for tests and callers with custom middleware.
    pub service: Option<Arc<dyn RewriteService>>,

    /// Sampling temperature for the rewrite completion. Default: 0.1.
    ///
    /// Translation is transcription-like work: low temperature keeps the
    /// model faithful to the prose and structure it was given instead of
    /// editorializing.
    pub temperature: f32,

    /// Maximum tokens the service may generate per document. Default: 8192.
    ///
    /// A full problem document (statement, examples, multi-method solution)
    /// routinely exceeds 4k output tokens; truncation mid-tag guarantees a
    /// validation failure, so the ceiling errs high.
    pub max_tokens: usize,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles on each retry so N concurrent workers recovering from the
    /// same provider hiccup do not all retry in the same instant.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Custom system prompt. `{target}` placeholders are substituted with
    /// the target language name. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Progress sink for per-document outcomes. If None, outcomes are only
    /// traced.
    pub report_sink: Option<SharedSink>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            target: Lang::Java,
            concurrency: 5,
            model: None,
            provider_name: None,
            provider: None,
            service: None,
            temperature: 0.1,
            max_tokens: 8192,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            system_prompt: None,
            report_sink: None,
        }
    }
}

impl fmt::Debug for NormalizeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizeConfig")
            .field("target", &self.target)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("service", &self.service.as_ref().map(|_| "<dyn RewriteService>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl NormalizeConfig {
    /// Create a new builder for `NormalizeConfig`.
    pub fn builder() -> NormalizeConfigBuilder {
        NormalizeConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`NormalizeConfig`].
#[derive(Debug)]
pub struct NormalizeConfigBuilder {
    config: NormalizeConfig,
}

impl NormalizeConfigBuilder {
    pub fn target(mut self, target: Lang) -> Self {
        self.config.target = target;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn service(mut self, service: Arc<dyn RewriteService>) -> Self {
        self.config.service = Some(service);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn report_sink(mut self, sink: SharedSink) -> Self {
        self.config.report_sink = Some(sink);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<NormalizeConfig, ProbnormError> {
        let c = &self.config;
        if !c.target.is_rewrite_target() {
            return Err(ProbnormError::InvalidTarget { target: c.target });
        }
        if c.concurrency == 0 {
            return Err(ProbnormError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(ProbnormError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = NormalizeConfig::builder().build().unwrap();
        assert_eq!(config.target, Lang::Java);
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.max_tokens, 8192);
    }

    #[test]
    fn rejects_non_target_language() {
        let err = NormalizeConfig::builder()
            .target(Lang::Unknown)
            .build()
            .unwrap_err();
        assert!(matches!(err, ProbnormError::InvalidTarget { .. }));
    }

    #[test]
    fn concurrency_clamped_to_one() {
        let config = NormalizeConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn temperature_clamped() {
        let config = NormalizeConfig::builder().temperature(9.0).build().unwrap();
        assert!(config.temperature <= 2.0);
    }

    #[test]
    fn debug_does_not_require_debug_provider() {
        let config = NormalizeConfig::builder()
            .target(Lang::Cpp)
            .model("gpt-4.1-nano")
            .build()
            .unwrap();
        let s = format!("{config:?}");
        assert!(s.contains("gpt-4.1-nano"));
    }
}
