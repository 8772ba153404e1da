//! Heuristic source-language classification for short code fragments.
//!
//! ## Why a rule cascade and not a parser?
//!
//! The blocks we see are fragments: half a class, a method body, sometimes a
//! single expression pasted out of an editorial. No per-language toolchain can
//! be assumed, and most fragments would not parse anyway. A fixed, ordered
//! list of lexical signatures decides the *dominant* language well enough for
//! routing decisions, and — unlike accumulating boolean flags — makes the
//! precedence between rules auditable and testable rule-by-rule.
//!
//! ## Rule Order
//!
//! 1. **Java** — access-modifier evidence plus one enumerated entry-point
//!    signature, but only when no C++-exclusive token is present. Java source
//!    never legally contains `->` member access, `std::`, `vector<` literals
//!    or preprocessor includes, so those disqualify outright.
//! 2. **C++** — scope resolution, standard-library prefix, container
//!    template literal, or an include directive.
//! 3. **Python** — a def/class-with-colon pattern, and *neither* `{` nor `;`
//!    anywhere in the block. Whitespace-significant syntax is assumed
//!    incompatible with brace/semicolon use; this tie-break keeps a C++ block
//!    with a docstring-looking string literal out of the Python bucket.
//! 4. **Foreign** — query-language leading verbs (SQL and friends).
//! 5. **Unknown** — nothing matched.
//!
//! The function is pure and total: no state, deterministic, always returns a
//! label, never fails — including on the empty string.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A source-language label for a single code block.
///
/// `Foreign` and `Unknown` are deliberately distinct: `Foreign` means a
/// signature for a known non-convertible language fired (e.g. SQL), while
/// `Unknown` means no rule matched at all. Downstream both are candidates
/// for rewriting, but reports keep them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    /// Java-like: access modifiers, canonical `class Solution` entry class.
    Java,
    /// C/C++-like: pointers, `std::`, preprocessor directives.
    Cpp,
    /// Python-like: whitespace-significant, no braces or semicolons.
    Python,
    /// Recognized foreign syntax (declarative query languages).
    Foreign,
    /// Nothing matched; the catch-all default.
    Unknown,
}

impl Lang {
    /// Languages a corpus may be normalized *to*.
    ///
    /// `Foreign` and `Unknown` are classification outcomes, not rewrite
    /// targets; configuration validation rejects them before any work starts.
    pub fn is_rewrite_target(self) -> bool {
        matches!(self, Lang::Java | Lang::Cpp | Lang::Python)
    }

    /// Human-readable name used in prompts and reports.
    pub fn display_name(self) -> &'static str {
        match self {
            Lang::Java => "Java",
            Lang::Cpp => "C++",
            Lang::Python => "Python",
            Lang::Foreign => "foreign",
            Lang::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for Lang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "java" => Ok(Lang::Java),
            "cpp" | "c++" | "cxx" => Ok(Lang::Cpp),
            "python" | "py" => Ok(Lang::Python),
            other => Err(format!(
                "unsupported target language '{other}' (expected java, cpp, or python)"
            )),
        }
    }
}

/// The label plus which signature fired.
///
/// `matched` is diagnostics only — it is never persisted, and two
/// classifications with the same label but different signatures are
/// equivalent everywhere outside of logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub label: Lang,
    pub matched: Option<&'static str>,
}

impl Classification {
    fn new(label: Lang, matched: &'static str) -> Self {
        Self {
            label,
            matched: Some(matched),
        }
    }
}

// ── Signature tables ─────────────────────────────────────────────────────

/// Tokens that legally never appear in Java source. Any one of these is
/// stronger evidence than every Java signature combined, so they are checked
/// first and veto the Java rule entirely.
const JAVA_DISQUALIFIERS: &[&str] = &["->", "std::", "vector<", "#include", "def "];

/// Modifier-qualified entry-point signatures: the return-type/method-name
/// combinations a solution entry point commonly takes, plus the standard
/// output idiom. One of these (or a canonical entry-class declaration) is
/// required — `public` alone is too weak, C++ writes `public:` sections.
const JAVA_SIGNATURES: &[&str] = &[
    "System.out.print",
    "public int",
    "public boolean",
    "public void",
    "public static",
    "public String",
    "public List",
    "public char",
    "public double",
    "public long",
    "public Node",
    "public int[]",
];

const CPP_SIGNATURES: &[&str] = &["public:", "std::", "vector<", "#include"];

const PYTHON_SIGNATURES: &[&str] = &["def ", "class Solution:", "self,", "print("];

/// Leading verbs of declarative query languages, matched case-insensitively.
/// The trailing space avoids firing on identifiers like `SELECTION`.
const QUERY_VERBS: &[&str] = &["SELECT ", "UPDATE ", "DELETE ", "INSERT "];

// ── Classifier ───────────────────────────────────────────────────────────

/// Classify a raw code block by its dominant source language.
///
/// Pure and total; see the module docs for the rule cascade.
pub fn classify(text: &str) -> Classification {
    if let Some(c) = match_java(text) {
        return c;
    }
    if let Some(c) = match_cpp(text) {
        return c;
    }
    if let Some(c) = match_python(text) {
        return c;
    }
    if let Some(c) = match_foreign(text) {
        return c;
    }
    Classification {
        label: Lang::Unknown,
        matched: None,
    }
}

/// Convenience wrapper when only the label matters.
pub fn label_of(text: &str) -> Lang {
    classify(text).label
}

fn match_java(text: &str) -> Option<Classification> {
    // Disqualifiers dominate: a block with both `public int` and `std::`
    // is C++ with a public section, never Java.
    if JAVA_DISQUALIFIERS.iter().any(|t| text.contains(t)) {
        return None;
    }

    let has_class_or_modifier =
        (text.contains("class ") || text.contains("public ")) && text.contains("public");
    if !has_class_or_modifier {
        return None;
    }

    if let Some(sig) = JAVA_SIGNATURES.iter().find(|s| text.contains(*s)) {
        return Some(Classification::new(Lang::Java, sig));
    }

    // Canonical entry-class declaration, with one last C++ veto: an access
    // section label means this was a C++ class all along.
    if (text.contains("class Solution") || text.contains("public class"))
        && !text.contains("public:")
    {
        return Some(Classification::new(Lang::Java, "class Solution"));
    }

    None
}

fn match_cpp(text: &str) -> Option<Classification> {
    CPP_SIGNATURES
        .iter()
        .find(|s| text.contains(*s))
        .map(|sig| Classification::new(Lang::Cpp, sig))
}

fn match_python(text: &str) -> Option<Classification> {
    // Brace or statement terminator anywhere disqualifies: whitespace-
    // significant syntax does not use either, and this keeps a Java/C++
    // block containing a docstring-like string out of this bucket.
    if text.contains('{') || text.contains(';') {
        return None;
    }
    PYTHON_SIGNATURES
        .iter()
        .find(|s| text.contains(*s))
        .map(|sig| Classification::new(Lang::Python, sig))
}

fn match_foreign(text: &str) -> Option<Classification> {
    let upper = text.to_uppercase();
    QUERY_VERBS
        .iter()
        .find(|v| upper.contains(*v))
        .map(|sig| Classification::new(Lang::Foreign, sig))
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAVA_BLOCK: &str = "class Solution {\n    public int maxProfit(int[] prices) {\n        return 0;\n    }\n}";
    const CPP_BLOCK: &str = "#include <vector>\nclass Solution {\npublic:\n    int maxProfit(std::vector<int>& prices) { return 0; }\n};";
    const PYTHON_BLOCK: &str =
        "class Solution:\n    def max_profit(self, prices):\n        return 0";

    #[test]
    fn classifies_java() {
        let c = classify(JAVA_BLOCK);
        assert_eq!(c.label, Lang::Java);
        assert_eq!(c.matched, Some("public int"));
    }

    #[test]
    fn classifies_cpp() {
        assert_eq!(label_of(CPP_BLOCK), Lang::Cpp);
    }

    #[test]
    fn classifies_python() {
        assert_eq!(label_of(PYTHON_BLOCK), Lang::Python);
    }

    #[test]
    fn classifies_sql_as_foreign() {
        let c = classify("select name from Users where id = 1");
        assert_eq!(c.label, Lang::Foreign);
        assert_eq!(c.matched, Some("SELECT "));
    }

    #[test]
    fn empty_input_is_unknown() {
        let c = classify("");
        assert_eq!(c.label, Lang::Unknown);
        assert_eq!(c.matched, None);
    }

    #[test]
    fn disqualifier_dominates_java_evidence() {
        // Both `public int`-style evidence and a C++-exclusive token:
        // rule 1 must win and the block must never classify as Java.
        let text = "class Solution {\npublic:\n    int foo(node->next) { return 0; }\n};";
        assert_eq!(label_of(text), Lang::Cpp);

        let text = "public class Solution { std::vector<int> v; }";
        assert_eq!(label_of(text), Lang::Cpp);
    }

    #[test]
    fn python_rejected_when_braces_present() {
        // A Java block with an embedded docstring-looking literal must not
        // drift into the Python bucket.
        let text = "public class Solution {\n    String s = \"def helper(x):\";\n}";
        assert_eq!(label_of(text), Lang::Java);
    }

    #[test]
    fn python_rejected_when_semicolon_present() {
        assert_eq!(label_of("def f(x): return x;"), Lang::Unknown);
    }

    #[test]
    fn java_requires_entry_signature() {
        // `public` alone, with no enumerated signature and no entry class,
        // is too weak.
        assert_eq!(label_of("public final var thing"), Lang::Unknown);
    }

    #[test]
    fn entry_class_alone_is_java() {
        assert_eq!(label_of("public class Main { }"), Lang::Java);
    }

    #[test]
    fn deterministic_over_repeat_calls() {
        for _ in 0..3 {
            assert_eq!(classify(JAVA_BLOCK), classify(JAVA_BLOCK));
        }
    }

    #[test]
    fn target_validity() {
        assert!(Lang::Java.is_rewrite_target());
        assert!(Lang::Cpp.is_rewrite_target());
        assert!(Lang::Python.is_rewrite_target());
        assert!(!Lang::Foreign.is_rewrite_target());
        assert!(!Lang::Unknown.is_rewrite_target());
    }

    #[test]
    fn lang_from_str() {
        assert_eq!("java".parse::<Lang>().unwrap(), Lang::Java);
        assert_eq!("C++".parse::<Lang>().unwrap(), Lang::Cpp);
        assert_eq!("py".parse::<Lang>().unwrap(), Lang::Python);
        assert!("sql".parse::<Lang>().is_err());
    }
}
