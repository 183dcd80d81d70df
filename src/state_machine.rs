//! Debate phase state machine
//!
//! Phases, speaking roles and a pure transition function. The orchestrator
//! owns the current phase and feeds triggers through [`transition`].

pub mod event;
pub mod phase;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use event::PhaseTrigger;
pub use phase::{CrossStep, InterruptPolicy, Phase, PhasePolicy, Role};
pub use transition::{transition, TransitionError};
