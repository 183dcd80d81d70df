//! Conversation history handed to the provider for one turn

use super::{Directive, Session};
use crate::evidence::EvidenceRegistry;
use crate::llm::{HistoryMessage, RoleModels, TurnRequest};
use crate::prompts;
use crate::state_machine::Role;
use std::fmt::Write;

/// Build the request for `role` speaking in the session's current phase.
///
/// The dilemma (and brief) opens the history, the evidence on record
/// follows, then every prior turn tagged with its speaker, then the court
/// directives issued so far. `respond_to` is the directive this turn must
/// answer.
pub fn build_request(
    session: &Session,
    role: Role,
    models: &RoleModels,
    respond_to: Option<&Directive>,
) -> TurnRequest {
    let phase = session.phase();
    let mut messages = vec![HistoryMessage::user(opening_message(session))];

    if !session.evidence().is_empty() {
        messages.push(HistoryMessage::user(evidence_message(session.evidence())));
    }

    for turn in session.transcript() {
        if turn.failure.is_some() || turn.text.trim().is_empty() {
            continue;
        }
        let mut content = format!("[{}]: {}", turn.role.as_str().to_uppercase(), turn.text);
        if turn.interrupted {
            content.push_str("\n[interrupted by the court]");
        }
        messages.push(HistoryMessage::assistant(content));
    }

    for directive in session.directives().iter().filter(|d| !d.is_halt()) {
        messages.push(HistoryMessage::user(directive_message(
            directive,
            session.evidence(),
        )));
    }

    if respond_to.is_some_and(|d| !d.is_halt()) {
        messages.push(HistoryMessage::user(
            "Address the court directive above directly before continuing your argument.",
        ));
    }

    TurnRequest {
        speaker: role,
        phase,
        model: models.for_turn(role, phase).to_string(),
        system: prompts::for_turn(role, phase),
        messages,
        tools_enabled: phase.creates_evidence(),
    }
}

fn opening_message(session: &Session) -> String {
    let mut out = format!("DILEMMA: {}", session.dilemma());
    if let Some(brief) = session.brief() {
        let _ = write!(out, "\n\nCASE BRIEF: {}", brief.summary);
        if !brief.tension_axes.is_empty() {
            out.push_str("\nTension axes:");
            for axis in &brief.tension_axes {
                let _ = write!(out, "\n- {}: {}", axis.name, axis.description);
            }
        }
    }
    out
}

fn evidence_message(registry: &EvidenceRegistry) -> String {
    let mut out = String::from("EVIDENCE ON RECORD:");
    for item in registry.iter() {
        let _ = write!(out, "\n- [TOOL:{}] {} ({}", item.id, item.title, item.source);
        if let Some(date) = &item.date {
            let _ = write!(out, ", {date}");
        }
        let _ = write!(out, "): {}", item.snippet);
    }
    out
}

fn directive_message(directive: &Directive, registry: &EvidenceRegistry) -> String {
    let mut out = format!(
        "COURT DIRECTIVE (from the decision-maker): \"{}\"",
        directive.text
    );
    let found: Vec<_> = directive
        .new_evidence
        .iter()
        .filter_map(|id| registry.get(id))
        .collect();
    if !found.is_empty() {
        out.push_str("\nNew evidence:");
        for item in found {
            let _ = write!(out, "\n- [TOOL:{}] {}: {}", item.id, item.title, item.snippet);
        }
    }
    out
}
