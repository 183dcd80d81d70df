//! Pure phase transition function
//!
//! Given the same phase, trigger and policy this always yields the same
//! result. It performs no I/O; the orchestrator applies the new phase and
//! emits notifications.

use super::{CrossStep, Phase, PhasePolicy, PhaseTrigger};
use thiserror::Error;

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Session is finished ({0}); no further transitions")]
    Terminal(Phase),
    #[error("Cannot apply '{trigger}' in phase {phase}")]
    InvalidTransition { phase: Phase, trigger: PhaseTrigger },
}

pub fn transition(
    phase: Phase,
    trigger: PhaseTrigger,
    policy: &PhasePolicy,
) -> Result<Phase, TransitionError> {
    if phase.is_terminal() {
        return Err(TransitionError::Terminal(phase));
    }

    let next = match (phase, trigger) {
        (_, PhaseTrigger::Fatal) => Phase::Failed,

        // ============================================================
        // Opening sequence
        // ============================================================
        (Phase::Intake, PhaseTrigger::Completed) => Phase::CaseBrief,
        (Phase::CaseBrief, PhaseTrigger::Completed) => Phase::Discovery,
        (Phase::Discovery, PhaseTrigger::Completed) => Phase::DefenseOpening,
        (Phase::DefenseOpening, PhaseTrigger::Completed) => Phase::ProsecutionOpening,
        (Phase::ProsecutionOpening, PhaseTrigger::Completed) => {
            Phase::AwaitingCrossExam { completed: 0 }
        }

        // ============================================================
        // Cross-examination: externally triggered, repeatable
        // ============================================================
        (Phase::AwaitingCrossExam { completed }, PhaseTrigger::BeginCrossExam)
            if completed < policy.cross_exam_exchanges =>
        {
            Phase::CrossExam {
                exchange: completed,
                step: CrossStep::Challenge,
            }
        }
        (Phase::AwaitingCrossExam { .. }, PhaseTrigger::ConcludeCrossExam) => after_cross_exam(policy),
        (
            Phase::CrossExam {
                exchange,
                step: CrossStep::Challenge,
            },
            PhaseTrigger::Completed,
        ) => Phase::CrossExam {
            exchange,
            step: CrossStep::Response,
        },
        (
            Phase::CrossExam {
                exchange,
                step: CrossStep::Response,
            },
            PhaseTrigger::Completed,
        ) => {
            let completed = exchange.saturating_add(1);
            if completed < policy.cross_exam_exchanges {
                Phase::AwaitingCrossExam { completed }
            } else {
                after_cross_exam(policy)
            }
        }

        // ============================================================
        // Closing and judgment
        // ============================================================
        (Phase::DefenseClosing, PhaseTrigger::Completed) => Phase::ProsecutionClosing,
        (Phase::ProsecutionClosing, PhaseTrigger::Completed) => Phase::Verdict,
        (Phase::Verdict, PhaseTrigger::Completed) => Phase::EpistemicMap,

        (phase, trigger) => return Err(TransitionError::InvalidTransition { phase, trigger }),
    };

    Ok(next)
}

fn after_cross_exam(policy: &PhasePolicy) -> Phase {
    if policy.closings {
        Phase::DefenseClosing
    } else {
        Phase::Verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(exchanges: u32, closings: bool) -> PhasePolicy {
        PhasePolicy {
            cross_exam_exchanges: exchanges,
            closings,
            ..PhasePolicy::default()
        }
    }

    #[test]
    fn opening_sequence_is_fixed() {
        let p = PhasePolicy::default();
        let mut phase = Phase::Intake;
        let mut seen = vec![phase];
        for _ in 0..5 {
            phase = transition(phase, PhaseTrigger::Completed, &p).unwrap();
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                Phase::Intake,
                Phase::CaseBrief,
                Phase::Discovery,
                Phase::DefenseOpening,
                Phase::ProsecutionOpening,
                Phase::AwaitingCrossExam { completed: 0 },
            ]
        );
    }

    #[test]
    fn awaiting_cross_exam_needs_external_trigger() {
        let err = transition(
            Phase::AwaitingCrossExam { completed: 0 },
            PhaseTrigger::Completed,
            &PhasePolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn cross_exam_repeats_until_bound() {
        let p = policy(2, true);
        let mut phase = Phase::AwaitingCrossExam { completed: 0 };
        phase = transition(phase, PhaseTrigger::BeginCrossExam, &p).unwrap();
        phase = transition(phase, PhaseTrigger::Completed, &p).unwrap();
        phase = transition(phase, PhaseTrigger::Completed, &p).unwrap();
        assert_eq!(phase, Phase::AwaitingCrossExam { completed: 1 });

        phase = transition(phase, PhaseTrigger::BeginCrossExam, &p).unwrap();
        assert_eq!(
            phase,
            Phase::CrossExam {
                exchange: 1,
                step: CrossStep::Challenge
            }
        );
        phase = transition(phase, PhaseTrigger::Completed, &p).unwrap();
        phase = transition(phase, PhaseTrigger::Completed, &p).unwrap();
        assert_eq!(phase, Phase::DefenseClosing);
    }

    #[test]
    fn begin_rejected_when_no_exchanges_allowed() {
        let p = policy(0, false);
        let awaiting = Phase::AwaitingCrossExam { completed: 0 };
        assert!(transition(awaiting, PhaseTrigger::BeginCrossExam, &p).is_err());
        assert_eq!(
            transition(awaiting, PhaseTrigger::ConcludeCrossExam, &p),
            Ok(Phase::Verdict)
        );
    }

    #[test]
    fn closings_lead_to_verdict_then_map() {
        let p = PhasePolicy::default();
        let mut phase = transition(
            Phase::AwaitingCrossExam { completed: 1 },
            PhaseTrigger::ConcludeCrossExam,
            &p,
        )
        .unwrap();
        assert_eq!(phase, Phase::DefenseClosing);
        phase = transition(phase, PhaseTrigger::Completed, &p).unwrap();
        assert_eq!(phase, Phase::ProsecutionClosing);
        phase = transition(phase, PhaseTrigger::Completed, &p).unwrap();
        assert_eq!(phase, Phase::Verdict);
        phase = transition(phase, PhaseTrigger::Completed, &p).unwrap();
        assert_eq!(phase, Phase::EpistemicMap);
        assert_eq!(
            transition(phase, PhaseTrigger::Completed, &p),
            Err(TransitionError::Terminal(Phase::EpistemicMap))
        );
    }

    #[test]
    fn fatal_moves_to_failed_and_stays() {
        let p = PhasePolicy::default();
        let failed = transition(Phase::DefenseOpening, PhaseTrigger::Fatal, &p).unwrap();
        assert_eq!(failed, Phase::Failed);
        assert!(transition(failed, PhaseTrigger::Fatal, &p).is_err());
    }
}
