//! Phase and role types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A participant that can hold the floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Researcher,
    /// Argues in favor of the decision (the proponent)
    Defense,
    /// Argues against the decision (the opponent)
    Prosecution,
    Judge,
}

impl Role {
    /// The adversary of an arguing role. Neutral roles have none.
    pub fn opponent(self) -> Option<Role> {
        match self {
            Role::Defense => Some(Role::Prosecution),
            Role::Prosecution => Some(Role::Defense),
            Role::Researcher | Role::Judge => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Researcher => "researcher",
            Role::Defense => "defense",
            Role::Prosecution => "prosecution",
            Role::Judge => "judge",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half of a cross-examination exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossStep {
    /// Prosecution challenges the defense
    Challenge,
    /// Defense answers the challenge
    Response,
}

/// Debate phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Intake,
    CaseBrief,
    Discovery,
    DefenseOpening,
    ProsecutionOpening,
    /// Waiting for the observer to start the next exchange
    AwaitingCrossExam { completed: u32 },
    CrossExam { exchange: u32, step: CrossStep },
    DefenseClosing,
    ProsecutionClosing,
    Verdict,
    EpistemicMap,
    /// Terminal error state after an unrecoverable provider failure
    Failed,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Intake => "INTAKE",
            Phase::CaseBrief => "CASE_BRIEF",
            Phase::Discovery => "DISCOVERY",
            Phase::DefenseOpening => "DEFENSE_OPENING",
            Phase::ProsecutionOpening => "PROSECUTION_OPENING",
            Phase::AwaitingCrossExam { .. } => "AWAITING_CROSS_EXAM",
            Phase::CrossExam { .. } => "CROSS_EXAM",
            Phase::DefenseClosing => "DEFENSE_CLOSING",
            Phase::ProsecutionClosing => "PROSECUTION_CLOSING",
            Phase::Verdict => "VERDICT",
            Phase::EpistemicMap => "EPISTEMIC_MAP",
            Phase::Failed => "FAILED",
        }
    }

    /// Role holding the floor in this phase, if any
    pub fn speaker(self) -> Option<Role> {
        match self {
            Phase::Discovery => Some(Role::Researcher),
            Phase::DefenseOpening
            | Phase::DefenseClosing
            | Phase::CrossExam {
                step: CrossStep::Response,
                ..
            } => Some(Role::Defense),
            Phase::ProsecutionOpening
            | Phase::ProsecutionClosing
            | Phase::CrossExam {
                step: CrossStep::Challenge,
                ..
            } => Some(Role::Prosecution),
            Phase::Verdict => Some(Role::Judge),
            Phase::Intake
            | Phase::CaseBrief
            | Phase::AwaitingCrossExam { .. }
            | Phase::EpistemicMap
            | Phase::Failed => None,
        }
    }

    /// Whether a human may interrupt a turn running in this phase
    pub fn is_interruptible(self, policy: InterruptPolicy) -> bool {
        match self {
            Phase::DefenseOpening | Phase::ProsecutionOpening => true,
            Phase::CrossExam { .. } | Phase::DefenseClosing | Phase::ProsecutionClosing => {
                policy == InterruptPolicy::Arguments
            }
            _ => false,
        }
    }

    /// Whether turns in this phase may register new evidence
    pub fn creates_evidence(self) -> bool {
        matches!(self, Phase::Discovery)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::EpistemicMap | Phase::Failed)
    }

    /// Cross-examination exchange index, for phases that carry one
    pub fn exchange(self) -> Option<u32> {
        match self {
            Phase::AwaitingCrossExam { completed } => Some(completed),
            Phase::CrossExam { exchange, .. } => Some(exchange),
            _ => None,
        }
    }

    /// Monotonic ordering key. Every legal transition strictly increases it.
    pub fn progress(self) -> (u8, u32) {
        match self {
            Phase::Intake => (0, 0),
            Phase::CaseBrief => (1, 0),
            Phase::Discovery => (2, 0),
            Phase::DefenseOpening => (3, 0),
            Phase::ProsecutionOpening => (4, 0),
            Phase::AwaitingCrossExam { completed } => (5, completed.saturating_mul(3)),
            Phase::CrossExam { exchange, step } => {
                let base = exchange.saturating_mul(3);
                match step {
                    CrossStep::Challenge => (5, base.saturating_add(1)),
                    CrossStep::Response => (5, base.saturating_add(2)),
                }
            }
            Phase::DefenseClosing => (6, 0),
            Phase::ProsecutionClosing => (7, 0),
            Phase::Verdict => (8, 0),
            Phase::EpistemicMap => (9, 0),
            Phase::Failed => (10, 0),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::AwaitingCrossExam { completed } => {
                write!(f, "{}({completed} done)", self.name())
            }
            Phase::CrossExam { exchange, step } => {
                write!(f, "{}({exchange}, {step:?})", self.name())
            }
            _ => f.write_str(self.name()),
        }
    }
}

/// Which phases accept interruptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterruptPolicy {
    /// Only the two opening statements
    Openings,
    /// Openings, cross-examination and closings
    #[default]
    Arguments,
}

impl FromStr for InterruptPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openings" => Ok(Self::Openings),
            "arguments" => Ok(Self::Arguments),
            other => Err(format!(
                "unknown interrupt policy '{other}' (expected 'openings' or 'arguments')"
            )),
        }
    }
}

/// Static configuration of the phase graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhasePolicy {
    pub interrupt: InterruptPolicy,
    /// Upper bound on cross-examination exchanges (challenge + response)
    pub cross_exam_exchanges: u32,
    /// Whether closing statements run before the verdict
    pub closings: bool,
}

impl Default for PhasePolicy {
    fn default() -> Self {
        Self {
            interrupt: InterruptPolicy::default(),
            cross_exam_exchanges: 3,
            closings: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_speaking_phases_have_no_speaker() {
        for phase in [
            Phase::Intake,
            Phase::CaseBrief,
            Phase::AwaitingCrossExam { completed: 0 },
            Phase::EpistemicMap,
            Phase::Failed,
        ] {
            assert_eq!(phase.speaker(), None, "{phase}");
        }
    }

    #[test]
    fn cross_exam_alternates_speakers() {
        let challenge = Phase::CrossExam {
            exchange: 1,
            step: CrossStep::Challenge,
        };
        let response = Phase::CrossExam {
            exchange: 1,
            step: CrossStep::Response,
        };
        assert_eq!(challenge.speaker(), Some(Role::Prosecution));
        assert_eq!(response.speaker(), Some(Role::Defense));
    }

    #[test]
    fn interrupt_policy_controls_cross_exam_and_closings() {
        let cross = Phase::CrossExam {
            exchange: 0,
            step: CrossStep::Challenge,
        };
        assert!(Phase::DefenseOpening.is_interruptible(InterruptPolicy::Openings));
        assert!(!cross.is_interruptible(InterruptPolicy::Openings));
        assert!(!Phase::DefenseClosing.is_interruptible(InterruptPolicy::Openings));
        assert!(cross.is_interruptible(InterruptPolicy::Arguments));
        assert!(Phase::ProsecutionClosing.is_interruptible(InterruptPolicy::Arguments));
        for policy in [InterruptPolicy::Openings, InterruptPolicy::Arguments] {
            assert!(!Phase::Discovery.is_interruptible(policy));
            assert!(!Phase::Verdict.is_interruptible(policy));
        }
    }

    #[test]
    fn interrupt_policy_parses() {
        assert_eq!("Openings".parse(), Ok(InterruptPolicy::Openings));
        assert_eq!(" arguments ".parse(), Ok(InterruptPolicy::Arguments));
        assert!("sometimes".parse::<InterruptPolicy>().is_err());
    }

    #[test]
    fn opponents_are_symmetric() {
        assert_eq!(Role::Defense.opponent(), Some(Role::Prosecution));
        assert_eq!(Role::Prosecution.opponent(), Some(Role::Defense));
        assert_eq!(Role::Judge.opponent(), None);
    }
}
