//! Per-session debate state

use super::directive::{Directive, DirectiveChannel, DirectivePolicy};
use super::CourtError;
use crate::evidence::EvidenceRegistry;
use crate::llm::{Attachment, CaseBrief};
use crate::scoring::Confidence;
use crate::state_machine::{InterruptPolicy, Phase, Role};
use crate::validator::{FlagStatus, ResolvedCitation, ValidationFlag};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// One speaking turn. Immutable once appended to the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub phase: Phase,
    pub text: String,
    pub interrupted: bool,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl Turn {
    pub(crate) fn completed(role: Role, phase: Phase, text: String) -> Self {
        Self {
            role,
            phase,
            text,
            interrupted: false,
            complete: true,
            failure: None,
        }
    }

    pub(crate) fn interrupted(role: Role, phase: Phase, text: String) -> Self {
        Self {
            role,
            phase,
            text,
            interrupted: true,
            complete: false,
            failure: None,
        }
    }

    pub(crate) fn failed(role: Role, phase: Phase, text: String, message: String) -> Self {
        Self {
            role,
            phase,
            text,
            interrupted: false,
            complete: false,
            failure: Some(message),
        }
    }
}

/// Handle the listener uses to interrupt the running turn
#[derive(Debug, Clone)]
pub struct SessionControl {
    channel: Arc<DirectiveChannel>,
}

impl SessionControl {
    /// Submit a directive. Blank text halts the running turn without
    /// adding anything to the debate context.
    pub fn interrupt(&self, text: &str) -> Result<(), CourtError> {
        self.channel.submit(text)
    }

    pub fn phase(&self) -> Phase {
        self.channel.phase()
    }
}

#[derive(Debug, Serialize)]
pub struct Session {
    id: String,
    dilemma: String,
    attachments: Vec<Attachment>,
    phase: Phase,
    transcript: Vec<Turn>,
    evidence: EvidenceRegistry,
    confidence: Confidence,
    directives: Vec<Directive>,
    flags: Vec<ValidationFlag>,
    citations: Vec<ResolvedCitation>,
    warnings: Vec<String>,
    brief: Option<CaseBrief>,
    verdict: Option<String>,
    /// Late directive waiting to be answered by the next turn
    carried: Option<Directive>,
    #[serde(skip)]
    channel: Arc<DirectiveChannel>,
}

impl Session {
    pub(crate) fn new(
        id: String,
        dilemma: String,
        attachments: Vec<Attachment>,
        interrupt_policy: InterruptPolicy,
        directive_policy: DirectivePolicy,
    ) -> Self {
        Self {
            id,
            dilemma,
            attachments,
            phase: Phase::Intake,
            transcript: Vec::new(),
            evidence: EvidenceRegistry::new(),
            confidence: Confidence::default(),
            directives: Vec::new(),
            flags: Vec::new(),
            citations: Vec::new(),
            warnings: Vec::new(),
            brief: None,
            verdict: None,
            carried: None,
            channel: Arc::new(DirectiveChannel::new(interrupt_policy, directive_policy)),
        }
    }

    pub fn dilemma(&self) -> &str {
        &self.dilemma
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn evidence(&self) -> &EvidenceRegistry {
        &self.evidence
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    #[cfg(test)]
    pub fn flags(&self) -> &[ValidationFlag] {
        &self.flags
    }

    pub fn citations(&self) -> &[ResolvedCitation] {
        &self.citations
    }

    pub fn brief(&self) -> Option<&CaseBrief> {
        self.brief.as_ref()
    }

    #[cfg(test)]
    pub fn verdict(&self) -> Option<&str> {
        self.verdict.as_deref()
    }

    pub fn control(&self) -> SessionControl {
        SessionControl {
            channel: Arc::clone(&self.channel),
        }
    }

    // ============================================================
    // Mutation, reserved for the orchestrator
    // ============================================================

    pub(crate) fn channel(&self) -> &Arc<DirectiveChannel> {
        &self.channel
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.channel.set_phase(phase);
    }

    pub(crate) fn evidence_mut(&mut self) -> &mut EvidenceRegistry {
        &mut self.evidence
    }

    pub(crate) fn append_turn(&mut self, turn: Turn) {
        self.transcript.push(turn);
    }

    pub(crate) fn set_confidence(&mut self, confidence: Confidence) {
        self.confidence = confidence;
    }

    pub(crate) fn record_directive(&mut self, directive: Directive) {
        self.directives.push(directive);
    }

    pub(crate) fn record_validation(
        &mut self,
        citations: Vec<ResolvedCitation>,
        flags: Vec<ValidationFlag>,
    ) {
        self.citations.extend(citations);
        self.flags.extend(flags);
    }

    pub(crate) fn warn(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub(crate) fn set_brief(&mut self, brief: CaseBrief) {
        self.brief = Some(brief);
    }

    pub(crate) fn set_verdict(&mut self, verdict: String) {
        self.verdict = Some(verdict);
    }

    pub(crate) fn carry(&mut self, directive: Directive) {
        self.carried = Some(directive);
    }

    pub(crate) fn take_carried(&mut self) -> Option<Directive> {
        self.carried.take()
    }

    /// Deterministic summary of where the evidence stands
    pub fn epistemic_map(&self) -> EpistemicMap {
        let mut evidence = Vec::new();
        let mut uncited = Vec::new();
        for item in self.evidence.iter() {
            let cited_by: BTreeSet<Role> = self
                .citations
                .iter()
                .filter(|c| c.evidence_id == item.id)
                .map(|c| c.role)
                .collect();
            if cited_by.is_empty() {
                uncited.push(item.id.clone());
                continue;
            }
            evidence.push(EvidenceUse {
                id: item.id.clone(),
                title: item.title.clone(),
                contested: cited_by.len() > 1,
                cited_by: cited_by.into_iter().collect(),
            });
        }

        let count = |role: Role, status: FlagStatus| {
            self.flags
                .iter()
                .filter(|f| f.role == role && f.status == status)
                .count()
        };

        EpistemicMap {
            confidence: self.confidence,
            tension_axes: self
                .brief
                .iter()
                .flat_map(|b| b.tension_axes.iter().map(|a| a.name.clone()))
                .collect(),
            evidence,
            uncited,
            defense_unsupported: count(Role::Defense, FlagStatus::Unsupported),
            prosecution_unsupported: count(Role::Prosecution, FlagStatus::Unsupported),
            weak_claims: self
                .flags
                .iter()
                .filter(|f| f.status == FlagStatus::Weak)
                .count(),
            directives: self
                .directives
                .iter()
                .filter(|d| !d.is_halt())
                .map(|d| d.text.clone())
                .collect(),
            warnings: self.warnings.clone(),
        }
    }
}

/// How one registered item was used in the debate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceUse {
    pub id: String,
    pub title: String,
    pub cited_by: Vec<Role>,
    /// Cited by both sides
    pub contested: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpistemicMap {
    pub confidence: Confidence,
    pub tension_axes: Vec<String>,
    pub evidence: Vec<EvidenceUse>,
    pub uncited: Vec<String>,
    pub defense_unsupported: usize,
    pub prosecution_unsupported: usize,
    pub weak_claims: usize,
    pub directives: Vec<String>,
    /// Scoring events the table had no entry for
    pub warnings: Vec<String>,
}
