//! Property-based tests for the phase state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_cross_step() -> impl Strategy<Value = CrossStep> {
    prop_oneof![Just(CrossStep::Challenge), Just(CrossStep::Response)]
}

fn arb_phase() -> impl Strategy<Value = Phase> {
    prop_oneof![
        Just(Phase::Intake),
        Just(Phase::CaseBrief),
        Just(Phase::Discovery),
        Just(Phase::DefenseOpening),
        Just(Phase::ProsecutionOpening),
        (0u32..6).prop_map(|completed| Phase::AwaitingCrossExam { completed }),
        (0u32..6, arb_cross_step()).prop_map(|(exchange, step)| Phase::CrossExam { exchange, step }),
        Just(Phase::DefenseClosing),
        Just(Phase::ProsecutionClosing),
        Just(Phase::Verdict),
        Just(Phase::EpistemicMap),
        Just(Phase::Failed),
    ]
}

fn arb_trigger() -> impl Strategy<Value = PhaseTrigger> {
    prop_oneof![
        4 => Just(PhaseTrigger::Completed),
        2 => Just(PhaseTrigger::BeginCrossExam),
        1 => Just(PhaseTrigger::ConcludeCrossExam),
        1 => Just(PhaseTrigger::Fatal),
    ]
}

fn arb_policy() -> impl Strategy<Value = PhasePolicy> {
    (
        prop_oneof![Just(InterruptPolicy::Openings), Just(InterruptPolicy::Arguments)],
        0u32..5,
        any::<bool>(),
    )
        .prop_map(|(interrupt, cross_exam_exchanges, closings)| PhasePolicy {
            interrupt,
            cross_exam_exchanges,
            closings,
        })
}

proptest! {
    /// No path allows moving to an earlier phase
    #[test]
    fn transitions_only_move_forward(
        phase in arb_phase(),
        trigger in arb_trigger(),
        policy in arb_policy(),
    ) {
        if let Ok(next) = transition(phase, trigger, &policy) {
            prop_assert!(next.progress() > phase.progress(), "{} -> {}", phase, next);
        }
    }

    /// Terminal phases reject every trigger
    #[test]
    fn terminal_phases_are_final(trigger in arb_trigger(), policy in arb_policy()) {
        for phase in [Phase::EpistemicMap, Phase::Failed] {
            prop_assert!(transition(phase, trigger, &policy).is_err());
        }
    }

    /// Cross-examination never exceeds the configured number of exchanges
    #[test]
    fn cross_exam_is_bounded(
        triggers in proptest::collection::vec(arb_trigger(), 0..80),
        policy in arb_policy(),
    ) {
        let mut phase = Phase::Intake;
        for trigger in triggers {
            if let Ok(next) = transition(phase, trigger, &policy) {
                phase = next;
            }
            if let Some(exchange) = phase.exchange() {
                match phase {
                    Phase::CrossExam { .. } => prop_assert!(exchange < policy.cross_exam_exchanges),
                    _ => prop_assert!(exchange <= policy.cross_exam_exchanges),
                }
            }
        }
    }

    /// Non-speaking phases are never interruptible
    #[test]
    fn only_speaking_phases_interruptible(phase in arb_phase(), policy in arb_policy()) {
        if phase.is_interruptible(policy.interrupt) {
            prop_assert!(phase.speaker().is_some());
        }
    }
}
