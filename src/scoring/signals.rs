//! Deriving score events from a finished turn

use super::{ScoreEvent, ScoreEventKind};
use crate::evidence::{EvidenceCategory, EvidenceItem, EvidenceRegistry};
use crate::state_machine::{Phase, Role};
use crate::validator::{split_sentences, words, ResolvedCitation, ValidationReport};
use std::collections::HashSet;

const REBUTTAL_PHRASES: &[&str] = &[
    "my opponent",
    "opposing counsel",
    "the prosecution claims",
    "the defense claims",
    "contrary to",
    "fails to account",
    "in response",
    "rebut",
    "counterpoint",
    "does not hold",
];

const CONTRADICTION_WORDS: &[&str] = &[
    "contradicts",
    "contradict",
    "contradicted",
    "refutes",
    "refuted",
    "disproves",
    "debunks",
    "overturns",
    "supersedes",
    "undermines",
];

const STOPWORDS: &[&str] = &[
    "about", "after", "also", "been", "being", "could", "does", "from", "have", "into", "just",
    "more", "most", "only", "over", "should", "some", "than", "that", "their", "them", "then",
    "there", "these", "they", "this", "those", "what", "when", "where", "which", "while", "with",
    "would", "your",
];

/// Everything needed to derive score events for one completed turn
#[derive(Debug, Clone, Copy)]
pub struct TurnSignals<'a> {
    pub role: Role,
    pub phase: Phase,
    pub text: &'a str,
    pub report: &'a ValidationReport,
    pub registry: &'a EvidenceRegistry,
    /// Citations resolved in earlier turns of the session
    pub prior_citations: &'a [ResolvedCitation],
    /// Directive this turn is the first response to
    pub directive: Option<&'a str>,
}

impl TurnSignals<'_> {
    /// Score events in a fixed order: academic citations, uncited claims,
    /// rebuttal, kill shots, directive handling.
    pub fn events(&self) -> Vec<ScoreEvent> {
        let Some(opponent) = self.role.opponent() else {
            return Vec::new();
        };
        let mut events = Vec::new();

        for citation in &self.report.citations {
            let academic = self
                .registry
                .get(&citation.evidence_id)
                .is_some_and(|item| item.category == EvidenceCategory::Academic);
            if academic {
                events.push(ScoreEvent::new(self.role, ScoreEventKind::AcademicCitation));
            }
        }

        events.extend(
            self.report
                .unsupported()
                .map(|_| ScoreEvent::new(self.role, ScoreEventKind::UncitedClaim)),
        );

        if self.is_rebuttal() {
            events.push(ScoreEvent::new(self.role, ScoreEventKind::Rebuttal));
        }

        let opponent_ids: HashSet<&str> = self
            .prior_citations
            .iter()
            .filter(|c| c.role == opponent)
            .map(|c| c.evidence_id.as_str())
            .collect();
        for _ in 0..self.kill_shots(&opponent_ids) {
            events.push(ScoreEvent::new(opponent, ScoreEventKind::KillShot));
        }

        if let Some(directive) = self.directive {
            if let Some(addressed) = addresses(self.text, directive) {
                let kind = if addressed {
                    ScoreEventKind::DirectiveAddressed
                } else {
                    ScoreEventKind::DirectiveIgnored
                };
                events.push(ScoreEvent::new(self.role, kind));
            }
        }

        events
    }

    fn is_rebuttal(&self) -> bool {
        let arguing = matches!(
            self.phase,
            Phase::CrossExam { .. } | Phase::DefenseClosing | Phase::ProsecutionClosing
        );
        arguing
            && !self.report.citations.is_empty()
            && contains_phrase(self.text, REBUTTAL_PHRASES)
    }

    /// Sentences that pit a stronger item against one the opponent cited
    fn kill_shots(&self, opponent_ids: &HashSet<&str>) -> usize {
        if opponent_ids.is_empty() {
            return 0;
        }
        split_sentences(self.text)
            .iter()
            .filter(|sentence| contains_phrase(&sentence.body, CONTRADICTION_WORDS))
            .filter(|sentence| {
                let (theirs, ours): (Vec<&EvidenceItem>, Vec<&EvidenceItem>) = sentence
                    .markers()
                    .into_iter()
                    .filter_map(|id| self.registry.get(id))
                    .partition(|item| opponent_ids.contains(item.id.as_str()));
                ours.iter()
                    .any(|mine| theirs.iter().any(|other| mine.is_stronger_than(other)))
            })
            .count()
    }
}

fn contains_phrase(text: &str, phrases: &[&str]) -> bool {
    let tokens = words(text);
    phrases.iter().any(|phrase| {
        let phrase = words(phrase);
        !phrase.is_empty() && tokens.windows(phrase.len()).any(|w| w == phrase.as_slice())
    })
}

/// Content words of `text`, stemmed
fn keywords(text: &str) -> HashSet<String> {
    words(text)
        .into_iter()
        .filter(|w| w.chars().count() >= 4 && !STOPWORDS.contains(&w.as_str()))
        .map(|w| stem(&w))
        .collect()
}

/// Light suffix stripping so "costs", "costing" and "cost" compare equal
fn stem(word: &str) -> String {
    let mut stem = word;
    for suffix in ["ing", "ed", "es", "s"] {
        if suffix == "s" && stem.ends_with("ss") {
            continue;
        }
        if let Some(rest) = stem.strip_suffix(suffix) {
            if rest.chars().count() >= 3 {
                stem = rest;
                break;
            }
        }
    }
    if stem.chars().count() > 3 {
        stem = stem.strip_suffix('e').unwrap_or(stem);
    }
    stem.to_string()
}

/// Whether `text` engages with `directive`. `None` when the directive has no
/// content words to look for.
fn addresses(text: &str, directive: &str) -> Option<bool> {
    let wanted = keywords(directive);
    if wanted.is_empty() {
        return None;
    }
    let said = keywords(text);
    Some(wanted.iter().any(|w| said.contains(w)))
}
