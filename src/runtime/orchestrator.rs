//! Session orchestrator
//!
//! Owns the walk through the phase machine for one session: runs turns,
//! validates and scores them, handles interruptions and reports every state
//! change to the sink.

use super::context::build_request;
use super::directive::{Directive, DirectivePolicy};
use super::executor::{TurnEnd, TurnExecutor, TurnReport};
use super::{CourtError, CourtEvent, EventSink, Session};
use crate::llm::{Attachment, CaseBrief, DebateProvider, ProviderError, RoleModels};
use crate::scoring::{self, ScoreOutcome, ScoreTable, TurnSignals};
use crate::state_machine::{transition, Phase, PhasePolicy, PhaseTrigger, Role, TransitionError};
use crate::validator::CitationValidator;
use base64::Engine;

/// Tunables shared by every session
#[derive(Debug, Clone, Default)]
pub struct CourtSettings {
    pub phases: PhasePolicy,
    pub directives: DirectivePolicy,
    pub models: RoleModels,
    pub scores: ScoreTable,
    pub validator: CitationValidator,
}

pub struct Orchestrator<P, K> {
    provider: P,
    sink: K,
    settings: CourtSettings,
}

impl<P: DebateProvider, K: EventSink> Orchestrator<P, K> {
    pub fn new(provider: P, sink: K, settings: CourtSettings) -> Self {
        Self {
            provider,
            sink,
            settings,
        }
    }

    /// Validate the input and create a session in INTAKE
    pub fn open(
        &self,
        id: impl Into<String>,
        dilemma: &str,
        attachments: Vec<Attachment>,
    ) -> Result<Session, CourtError> {
        let dilemma = dilemma.trim();
        if dilemma.is_empty() {
            return Err(CourtError::InvalidInput("dilemma is empty".to_string()));
        }
        for (i, attachment) in attachments.iter().enumerate() {
            base64::engine::general_purpose::STANDARD
                .decode(attachment.data.trim())
                .map_err(|e| {
                    CourtError::InvalidInput(format!("attachment {i} is not valid base64: {e}"))
                })?;
        }
        Ok(Session::new(
            id.into(),
            dilemma.to_string(),
            attachments,
            self.settings.phases.interrupt,
            self.settings.directives,
        ))
    }

    /// Open a session and run it through case brief and discovery, stopping
    /// at DEFENSE_OPENING. A provider failure leaves the returned session in
    /// FAILED.
    #[allow(dead_code)] // The store runs open and open_proceedings as separate steps
    pub async fn start(
        &self,
        id: impl Into<String>,
        dilemma: &str,
        attachments: Vec<Attachment>,
    ) -> Result<Session, CourtError> {
        let mut session = self.open(id, dilemma, attachments)?;
        match self.open_proceedings(&mut session).await {
            Ok(()) | Err(CourtError::ProviderFailure(_)) => Ok(session),
            Err(e) => Err(e),
        }
    }

    /// INTAKE -> CASE_BRIEF -> DISCOVERY -> DEFENSE_OPENING
    pub async fn open_proceedings(&self, session: &mut Session) -> Result<(), CourtError> {
        self.advance(session, PhaseTrigger::Completed)?;

        let brief = match self.case_brief(session).await {
            Ok(brief) => brief,
            Err(e) => return Err(self.fail(session, e)),
        };
        session.set_brief(brief.clone());
        self.sink.emit(CourtEvent::CaseBrief(brief));

        self.advance(session, PhaseTrigger::Completed)?;
        self.run_turn(session).await
    }

    async fn case_brief(&self, session: &Session) -> Result<CaseBrief, ProviderError> {
        match self
            .provider
            .case_brief(session.dilemma(), session.attachments())
            .await
        {
            Err(e) if e.kind.is_retryable() => {
                tracing::warn!(error = %e, "Case brief failed, retrying once");
                self.sink.emit(CourtEvent::error(e.to_string(), false));
                self.provider
                    .case_brief(session.dilemma(), session.attachments())
                    .await
            }
            other => other,
        }
    }

    /// Run the current phase's turn to completion, including any
    /// interruptions, then advance.
    pub async fn run_turn(&self, session: &mut Session) -> Result<(), CourtError> {
        let phase = session.phase();
        let Some(mut role) = phase.speaker() else {
            return Err(TransitionError::InvalidTransition {
                phase,
                trigger: PhaseTrigger::Completed,
            }
            .into());
        };
        let mut respond_to = session.take_carried();

        loop {
            let report = self.speak(session, role, respond_to.as_ref()).await?;
            self.absorb(session, &report, respond_to.as_ref());

            match report.end {
                TurnEnd::Interrupted(directive) => {
                    let directive = self.apply_directive(session, directive).await;
                    let late = self.absorb_late(session, report.late_directive).await;
                    if let Some(opponent) = role.opponent() {
                        role = opponent;
                    }
                    respond_to = Some(late.unwrap_or(directive));
                }
                TurnEnd::Completed => {
                    if role == Role::Judge {
                        session.set_verdict(report.turn.text.clone());
                        self.sink.emit(CourtEvent::Verdict {
                            content: report.turn.text,
                        });
                    }
                    if let Some(late) = self.absorb_late(session, report.late_directive).await {
                        session.carry(late);
                    }
                    self.advance(session, PhaseTrigger::Completed)?;
                    return Ok(());
                }
                TurnEnd::Failed(e) => return Err(self.fail(session, e)),
            }
        }
    }

    /// Run one turn, retrying once on a retryable provider failure
    async fn speak(
        &self,
        session: &mut Session,
        role: Role,
        respond_to: Option<&Directive>,
    ) -> Result<TurnReport, CourtError> {
        let mut retried = false;
        loop {
            let request = build_request(session, role, &self.settings.models, respond_to);
            let channel = session.channel().clone();
            let registry = if session.phase().creates_evidence() {
                Some(session.evidence_mut())
            } else {
                None
            };
            let mut report = TurnExecutor::new(&self.provider, &self.sink, &channel)
                .run(request, registry)
                .await?;

            let TurnEnd::Failed(e) = &report.end else {
                return Ok(report);
            };
            let e = e.clone();
            if let Some(late) = self.absorb_late(session, report.late_directive.take()).await {
                session.carry(late);
            }
            session.append_turn(report.turn);

            if !retried && e.kind.is_retryable() {
                retried = true;
                tracing::warn!(role = %role, error = %e, "Turn failed, retrying once");
                self.sink.emit(CourtEvent::error(
                    format!("{role} turn failed ({e}); retrying"),
                    false,
                ));
                continue;
            }
            return Err(self.fail(session, e));
        }
    }

    /// Append the turn, validate it and fold the resulting score events
    fn absorb(&self, session: &mut Session, report: &TurnReport, respond_to: Option<&Directive>) {
        let turn = &report.turn;
        session.append_turn(turn.clone());
        if turn.role == Role::Researcher {
            return;
        }

        let validation = self
            .settings
            .validator
            .validate(turn.role, &turn.text, session.evidence());
        if !validation.citations.is_empty() {
            self.sink.emit(CourtEvent::CitationsResolved {
                agent: turn.role,
                citations: validation.citations.clone(),
            });
        }
        for flag in &validation.flags {
            self.sink.emit(CourtEvent::ValidationFlag(flag.clone()));
        }

        let events = TurnSignals {
            role: turn.role,
            phase: turn.phase,
            text: &turn.text,
            report: &validation,
            registry: session.evidence(),
            prior_citations: session.citations(),
            directive: respond_to.filter(|d| !d.is_halt()).map(|d| d.text.as_str()),
        }
        .events();

        let mut confidence = session.confidence();
        for event in events {
            let (next, outcome) = scoring::apply(confidence, &event, &self.settings.scores);
            confidence = next;
            match outcome {
                ScoreOutcome::Applied {
                    role,
                    kind,
                    delta,
                    before,
                    after,
                } => {
                    tracing::debug!(role = %role, kind = %kind, before, after, "Confidence updated");
                    self.sink.emit(CourtEvent::ConfidenceUpdate {
                        proponent: confidence.proponent,
                        opponent: confidence.opponent,
                        role,
                        kind,
                        delta,
                    });
                }
                ScoreOutcome::Ignored { warning } => {
                    tracing::warn!(warning = %warning, "Score event ignored");
                    session.warn(warning);
                }
            }
        }
        session.set_confidence(confidence);
        session.record_validation(validation.citations, validation.flags);
    }

    /// Record a directive accepted after the turn's last check. Returns it
    /// when the next turn should answer it; a bare halt has nothing to answer.
    async fn absorb_late(&self, session: &mut Session, late: Option<Directive>) -> Option<Directive> {
        let late = late?;
        tracing::info!(phase = %late.phase, "Directive arrived after the turn's last check; carrying it forward");
        let late = self.apply_directive(session, late).await;
        (!late.is_halt()).then_some(late)
    }

    /// Record a directive, researching it first unless it is a bare halt
    async fn apply_directive(&self, session: &mut Session, mut directive: Directive) -> Directive {
        if !directive.is_halt() {
            match self.provider.research(&directive.text).await {
                Ok(drafts) => {
                    for draft in drafts {
                        if let Some(item) = session.evidence_mut().register(draft) {
                            directive.new_evidence.push(item.id.clone());
                            self.sink.emit(CourtEvent::Evidence(item.clone()));
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Directive research failed");
                    self.sink
                        .emit(CourtEvent::error(format!("research failed: {e}"), false));
                }
            }
        }

        tracing::info!(
            phase = %directive.phase,
            interrupted = ?directive.interrupted_role,
            evidence = directive.new_evidence.len(),
            "Court directive recorded"
        );
        session.record_directive(directive.clone());
        self.sink.emit(CourtEvent::CourtDirective {
            content: directive.text.clone(),
            phase: directive.phase.name(),
            interrupted_agent: directive.interrupted_role,
            evidence_ids: directive.new_evidence.clone(),
        });
        directive
    }

    /// AWAITING_CROSS_EXAM -> one challenge and response
    pub async fn trigger_cross_exam(&self, session: &mut Session) -> Result<(), CourtError> {
        self.advance(session, PhaseTrigger::BeginCrossExam)?;
        while matches!(session.phase(), Phase::CrossExam { .. }) {
            self.run_turn(session).await?;
        }
        if matches!(session.phase(), Phase::AwaitingCrossExam { .. }) {
            Ok(())
        } else {
            self.drive(session).await
        }
    }

    /// Skip the remaining cross-examination and run to the end
    pub async fn conclude_cross_exam(&self, session: &mut Session) -> Result<(), CourtError> {
        self.advance(session, PhaseTrigger::ConcludeCrossExam)?;
        self.drive(session).await
    }

    /// Run turns until the session waits for cross-examination or finishes
    pub async fn drive(&self, session: &mut Session) -> Result<(), CourtError> {
        loop {
            match session.phase() {
                Phase::AwaitingCrossExam { .. } | Phase::EpistemicMap | Phase::Failed => {
                    return Ok(())
                }
                _ => self.run_turn(session).await?,
            }
        }
    }

    /// Report a non-fatal error to observers
    pub fn report(&self, error: &CourtError) {
        self.sink.emit(CourtEvent::error(error.to_string(), error.is_fatal()));
    }

    fn advance(&self, session: &mut Session, trigger: PhaseTrigger) -> Result<Phase, CourtError> {
        let previous = session.phase();
        let next = transition(previous, trigger, &self.settings.phases)?;
        debug_assert!(next.progress() > previous.progress(), "{previous} -> {next}");
        session.enter(next);
        tracing::info!(from = %previous, to = %next, trigger = %trigger, "Phase transition");
        self.sink.emit(CourtEvent::PhaseChange {
            phase: next.name(),
            previous: previous.name(),
            exchange: next.exchange(),
        });
        if next == Phase::EpistemicMap {
            self.sink.emit(CourtEvent::EpistemicMap(session.epistemic_map()));
        }
        Ok(next)
    }

    /// Move to FAILED and report the fatal error
    fn fail(&self, session: &mut Session, error: ProviderError) -> CourtError {
        tracing::error!(error = %error, kind = ?error.kind, phase = %session.phase(), "Session failed");
        if let Err(e) = self.advance(session, PhaseTrigger::Fatal) {
            tracing::warn!(error = %e, "Could not enter FAILED");
        }
        let error = CourtError::ProviderFailure(error);
        self.sink.emit(CourtEvent::error(error.to_string(), true));
        error
    }
}
