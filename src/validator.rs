//! Citation validation
//!
//! Scans produced text for `[TOOL:<id>]` markers, resolves them against the
//! evidence registry and flags factual-sounding sentences that carry no
//! usable citation. Validation is pure: identical (text, registry) input
//! always yields an identical report.

use crate::evidence::EvidenceRegistry;
use crate::state_machine::Role;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?i:tool):\s*([A-Za-z0-9_\-]+)\s*\]").expect("citation marker pattern")
});

/// Bullets, list ordinals and upper-case section labels (`SUMMARY:`)
static LEAD_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•]\s+)?(?:\d+[.)]\s+)?(?:[A-Z][A-Z ]{1,29}:)?\s*")
        .expect("lead-in pattern")
});

const ABBREVIATIONS: &[&str] = &["e.g.", "i.e.", "vs.", "dr.", "mr.", "mrs.", "ms.", "u.s.", "no."];

/// Default hedging and opinion keywords. A sentence containing one of these
/// (as whole words) is not treated as a factual claim.
pub const DEFAULT_HEDGES: &[&str] = &[
    "i think",
    "i believe",
    "i feel",
    "in my view",
    "in my opinion",
    "we argue",
    "we believe",
    "arguably",
    "perhaps",
    "maybe",
    "may",
    "might",
    "could",
    "should",
    "would",
    "possibly",
    "probably",
    "likely",
    "seems",
    "appears",
    "consider",
    "imagine",
];

/// Severity of a validation flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagStatus {
    /// No citation, or a citation that does not resolve
    Unsupported,
    /// Every citation resolves, but none of the cited items carries a snippet
    Weak,
}

/// A sentence that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFlag {
    pub role: Role,
    pub span: String,
    pub status: FlagStatus,
}

/// A marker that resolved to a registered item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedCitation {
    pub role: Role,
    pub evidence_id: String,
    pub sentence: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValidationReport {
    pub citations: Vec<ResolvedCitation>,
    pub flags: Vec<ValidationFlag>,
}

impl ValidationReport {
    pub fn unsupported(&self) -> impl Iterator<Item = &ValidationFlag> {
        self.flags
            .iter()
            .filter(|f| f.status == FlagStatus::Unsupported)
    }
}

/// One sentence of turn text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    /// Trimmed sentence as written
    pub text: String,
    /// Text with bullets, ordinals and section labels removed
    pub body: String,
    terminated: bool,
}

impl Sentence {
    fn new(raw: &str) -> Self {
        let text = raw.trim().to_string();
        let body = LEAD_IN.replace(&text, "").trim().to_string();
        let terminated = text.ends_with(['.', '!', '?']);
        Self {
            text,
            body,
            terminated,
        }
    }

    pub fn is_question(&self) -> bool {
        self.body.ends_with('?')
    }

    /// Short unterminated lines such as argument titles
    pub fn is_heading(&self) -> bool {
        !self.terminated && self.body.split_whitespace().count() < 6
    }

    /// Evidence ids referenced by markers, in order of appearance
    pub fn markers(&self) -> Vec<&str> {
        citation_ids(&self.text)
    }
}

/// Evidence ids referenced by markers in `text`, in order of appearance
pub fn citation_ids(text: &str) -> Vec<&str> {
    MARKER
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// Split text into sentences.
///
/// Lines always end a sentence. Within a line `.`, `!` and `?` end a
/// sentence when followed by whitespace or the end of the line, except after
/// list ordinals (`1.`) and common abbreviations. A fragment made only of
/// markers is attached to the preceding sentence.
pub fn split_sentences(text: &str) -> Vec<Sentence> {
    let mut out: Vec<String> = Vec::new();
    for line in text.lines() {
        let mut current = String::new();
        let line_start = out.len();
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            current.push(c);
            if matches!(c, '.' | '!' | '?') {
                let at_boundary = chars.peek().is_none_or(|n| n.is_whitespace());
                if at_boundary && !continues_sentence(&current) {
                    push_fragment(&mut out, line_start, &current);
                    current.clear();
                }
            }
        }
        push_fragment(&mut out, line_start, &current);
    }
    out.iter().map(|s| Sentence::new(s)).collect()
}

fn continues_sentence(current: &str) -> bool {
    let trimmed = current.trim();
    let without_dot = trimmed.trim_end_matches('.');
    if !without_dot.is_empty() && without_dot.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    let lower = trimmed.to_lowercase();
    ABBREVIATIONS.iter().any(|abbr| {
        lower
            .strip_suffix(abbr)
            .is_some_and(|before| before.is_empty() || before.ends_with(char::is_whitespace))
    })
}

fn push_fragment(out: &mut Vec<String>, line_start: usize, fragment: &str) {
    let trimmed = fragment.trim();
    if trimmed.is_empty() {
        return;
    }
    let residue = MARKER.replace_all(trimmed, "");
    let marker_only = !residue.chars().any(char::is_alphanumeric);
    if marker_only && out.len() > line_start {
        if let Some(prev) = out.last_mut() {
            prev.push(' ');
            prev.push_str(trimmed);
            return;
        }
    }
    out.push(trimmed.to_string());
}

/// Citation validator with a configurable hedge list
#[derive(Debug, Clone)]
pub struct CitationValidator {
    hedges: Vec<Vec<String>>,
}

impl Default for CitationValidator {
    fn default() -> Self {
        Self::new(DEFAULT_HEDGES.iter().copied())
    }
}

impl CitationValidator {
    pub fn new<I, S>(hedges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hedges = hedges
            .into_iter()
            .map(|h| words(h.as_ref()))
            .filter(|w| !w.is_empty())
            .collect();
        Self { hedges }
    }

    pub fn is_hedged(&self, sentence: &str) -> bool {
        let tokens = words(sentence);
        self.hedges.iter().any(|phrase| {
            tokens
                .windows(phrase.len())
                .any(|window| window == phrase.as_slice())
        })
    }

    /// Whether a marker-free sentence reads as a factual claim
    fn is_claim(&self, sentence: &Sentence) -> bool {
        sentence.body.chars().any(char::is_alphabetic)
            && !sentence.is_question()
            && !sentence.is_heading()
            && !self.is_hedged(&sentence.body)
    }

    pub fn validate(&self, role: Role, text: &str, registry: &EvidenceRegistry) -> ValidationReport {
        let mut report = ValidationReport::default();

        for sentence in split_sentences(text) {
            let markers = sentence.markers();

            if markers.is_empty() {
                if self.is_claim(&sentence) {
                    report.flags.push(flag(role, &sentence, FlagStatus::Unsupported));
                }
                continue;
            }

            let mut unresolved = false;
            let mut any_snippet = false;
            for id in markers {
                match registry.get(id) {
                    Some(item) => {
                        any_snippet |= !item.snippet.trim().is_empty();
                        report.citations.push(ResolvedCitation {
                            role,
                            evidence_id: item.id.clone(),
                            sentence: sentence.text.clone(),
                        });
                    }
                    None => unresolved = true,
                }
            }

            if unresolved {
                report.flags.push(flag(role, &sentence, FlagStatus::Unsupported));
            } else if !any_snippet {
                report.flags.push(flag(role, &sentence, FlagStatus::Weak));
            }
        }

        report
    }
}

fn flag(role: Role, sentence: &Sentence, status: FlagStatus) -> ValidationFlag {
    ValidationFlag {
        role,
        span: sentence.text.clone(),
        status,
    }
}

/// Lower-cased word tokens
pub(crate) fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}
