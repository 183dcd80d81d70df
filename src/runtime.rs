//! Session runtime
//!
//! Drives one debate per session: the orchestrator walks the phase machine,
//! the executor runs single streamed turns, and the directive channel lets a
//! listener task interrupt the running turn.

mod context;
mod directive;
mod error;
mod executor;
mod orchestrator;
mod session;
mod store;
mod traits;

#[cfg(test)]
pub mod testing;

pub use directive::{Directive, DirectivePolicy};
pub use error::CourtError;
pub use orchestrator::{CourtSettings, Orchestrator};
pub use session::{EpistemicMap, Session, SessionControl, Turn};
pub use store::{SessionCommand, SessionHandle, SessionStore};
pub use traits::EventSink;

use crate::evidence::EvidenceItem;
use crate::llm::CaseBrief;
use crate::scoring::ScoreEventKind;
use crate::state_machine::Role;
use crate::validator::{ResolvedCitation, ValidationFlag};
use serde::Serialize;

/// Outbound notification mirrored to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CourtEvent {
    PhaseChange {
        phase: &'static str,
        previous: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        exchange: Option<u32>,
    },
    CaseBrief(CaseBrief),
    /// Text increment of the running turn. The final event of a turn has
    /// `done` set and empty content.
    AgentStream {
        agent: Role,
        content: String,
        done: bool,
        interrupted: bool,
    },
    ToolCall {
        agent: Role,
        tool: String,
        query: String,
    },
    ToolResult {
        agent: Role,
        tool: String,
        evidence_ids: Vec<String>,
    },
    Evidence(EvidenceItem),
    CitationsResolved {
        agent: Role,
        citations: Vec<ResolvedCitation>,
    },
    ValidationFlag(ValidationFlag),
    ConfidenceUpdate {
        proponent: u8,
        opponent: u8,
        role: Role,
        kind: ScoreEventKind,
        delta: i32,
    },
    CourtDirective {
        content: String,
        phase: &'static str,
        interrupted_agent: Option<Role>,
        evidence_ids: Vec<String>,
    },
    Verdict {
        content: String,
    },
    EpistemicMap(EpistemicMap),
    Error {
        message: String,
        fatal: bool,
    },
}

impl CourtEvent {
    pub fn error(message: impl Into<String>, fatal: bool) -> Self {
        CourtEvent::Error {
            message: message.into(),
            fatal,
        }
    }

    /// Wire name, matching the serialized `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            CourtEvent::PhaseChange { .. } => "phase_change",
            CourtEvent::CaseBrief(_) => "case_brief",
            CourtEvent::AgentStream { .. } => "agent_stream",
            CourtEvent::ToolCall { .. } => "tool_call",
            CourtEvent::ToolResult { .. } => "tool_result",
            CourtEvent::Evidence(_) => "evidence",
            CourtEvent::CitationsResolved { .. } => "citations_resolved",
            CourtEvent::ValidationFlag(_) => "validation_flag",
            CourtEvent::ConfidenceUpdate { .. } => "confidence_update",
            CourtEvent::CourtDirective { .. } => "court_directive",
            CourtEvent::Verdict { .. } => "verdict",
            CourtEvent::EpistemicMap(_) => "epistemic_map",
            CourtEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::FlagStatus;
    use serde_json::json;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = CourtEvent::AgentStream {
            agent: Role::Defense,
            content: "Point one.".to_string(),
            done: false,
            interrupted: false,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "agent_stream",
                "agent": "defense",
                "content": "Point one.",
                "done": false,
                "interrupted": false,
            })
        );
    }

    #[test]
    fn newtype_variants_flatten_into_the_tag() {
        let event = CourtEvent::ValidationFlag(ValidationFlag {
            role: Role::Prosecution,
            span: "Costs doubled.".to_string(),
            status: FlagStatus::Unsupported,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "validation_flag");
        assert_eq!(value["span"], "Costs doubled.");
        assert_eq!(value["type"], event.kind());
    }

    #[test]
    fn phase_change_omits_missing_exchange() {
        let event = CourtEvent::PhaseChange {
            phase: "DISCOVERY",
            previous: "CASE_BRIEF",
            exchange: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("exchange").is_none());
    }
}
