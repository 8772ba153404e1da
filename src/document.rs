//! The persisted document record and its transient views.
//!
//! A [`Document`] is one problem record: descriptive text plus an editorial
//! body whose `<pre>` blocks carry the solution code. The store owns the
//! persisted form; the pipeline holds a transient in-memory copy per
//! processing unit and writes it back whole. Field order below is the
//! serialized order — kept stable so re-saved corpora diff cleanly.

use crate::classify::{Classification, Lang};
use serde::{Deserialize, Serialize};

/// One problem record, as persisted by the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable, unique identifier (also the store filename stem).
    pub id: String,
    pub title: String,
    /// URL slug used by the authenticated fetch collaborator; optional
    /// because locally-authored documents have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Problem-statement HTML. May be absent for access-restricted
    /// documents until backfilled.
    #[serde(default)]
    pub description: Option<String>,
    /// One starter snippet per language.
    #[serde(rename = "codeSnippets", default, skip_serializing_if = "Vec::is_empty")]
    pub snippets: Vec<CodeSnippet>,
    /// Editorial HTML containing the code blocks the pipeline normalizes.
    #[serde(rename = "solutionBody", default)]
    pub solution_body: Option<String>,
}

impl Document {
    /// The editorial body, if present and non-empty.
    pub fn solution_html(&self) -> Option<&str> {
        self.solution_body
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    /// Drop starter snippets not in the target language.
    pub fn retain_target_snippets(&mut self, target: Lang) {
        self.snippets.retain(|s| s.is_lang(target));
    }
}

/// A designated starter snippet in one language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSnippet {
    pub lang: String,
    pub code: String,
}

impl CodeSnippet {
    /// Match the snippet's free-form language tag against a [`Lang`].
    ///
    /// Upstream tags are inconsistent ("Python3", "C++", "java"), so this is
    /// a tolerant comparison, not an exact one.
    pub fn is_lang(&self, target: Lang) -> bool {
        let tag = self.lang.trim().to_ascii_lowercase();
        match target {
            Lang::Java => tag == "java",
            Lang::Cpp => tag == "c++" || tag == "cpp",
            Lang::Python => tag.starts_with("python") || tag == "py",
            Lang::Foreign | Lang::Unknown => false,
        }
    }
}

/// A single code block extracted from a document body.
///
/// Transient: produced by the sanitizer's extraction pass, classified
/// exactly once on construction, never persisted.
#[derive(Debug, Clone)]
pub struct CodeBlock {
    /// Raw text content of the `<pre>` element.
    pub text: String,
    /// Position within the parent document; stable output order only.
    pub position: usize,
    pub classification: Classification,
}

impl CodeBlock {
    pub fn label(&self) -> Lang {
        self.classification.label
    }
}
