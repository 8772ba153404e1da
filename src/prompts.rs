//! System prompts for the LLM rewrite service.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the rewrite instructions (e.g.
//!    tightening the no-markdown rule) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without a
//!    live provider, making prompt regressions easy to catch.
//!
//! Callers can override the default via
//! [`crate::config::NormalizeConfig::system_prompt`]; the template here is
//! used only when no override is provided.

use crate::classify::Lang;

/// Default rewrite instruction template. `{target}` is replaced with the
/// target language's display name.
///
/// The "no markdown wrappers" rule is stated twice on purpose: models
/// disobey it often enough that the response cleanup pass exists, but the
/// instruction still cuts the failure rate substantially.
pub const DEFAULT_REWRITE_PROMPT: &str = "\
You are an expert technical editor. \
The HTML you receive explains a programming solution and contains code snippets. \
1. Rewrite ALL code blocks (<pre>) to be in {target}. The rewritten code must match the textual explanation in logic. \
2. Update inline language references in paragraphs (e.g. change 'C++' to '{target}'). \
3. Output ONLY the raw continuous HTML. \
Keep the surrounding text intact. \
Do NOT wrap your response in markdown code fences such as ```html; output the raw HTML string.";

/// Build the system prompt for a rewrite call.
pub fn rewrite_system_prompt(target: Lang, prompt_override: Option<&str>) -> String {
    prompt_override
        .unwrap_or(DEFAULT_REWRITE_PROMPT)
        .replace("{target}", target.display_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_interpolates_target() {
        let p = rewrite_system_prompt(Lang::Java, None);
        assert!(p.contains("in Java."));
        assert!(!p.contains("{target}"));
    }

    #[test]
    fn override_also_interpolates() {
        let p = rewrite_system_prompt(Lang::Python, Some("Rewrite to {target}."));
        assert_eq!(p, "Rewrite to Python.");
    }
}
