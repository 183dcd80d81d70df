//! Triggers that move a session between phases

use serde::Serialize;
use std::fmt;

/// Events that trigger phase transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseTrigger {
    /// The current phase finished its work (a turn returned uninterrupted,
    /// or a non-speaking phase completed its step)
    Completed,
    /// External request to run the next cross-examination exchange
    BeginCrossExam,
    /// External request to skip the remaining cross-examination exchanges
    ConcludeCrossExam,
    /// Unrecoverable provider failure
    Fatal,
}

impl fmt::Display for PhaseTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::BeginCrossExam => write!(f, "begin_cross_exam"),
            Self::ConcludeCrossExam => write!(f, "conclude_cross_exam"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}
