//! Confidence scoring
//!
//! A table-driven reducer over per-role confidence. Each update is clamped
//! to `[0, 100]`; the reducer never fails. Event kinds missing from the table,
//! or events aimed at a non-arguing role, are ignored with a warning.

mod signals;

pub use signals::TurnSignals;

use crate::state_machine::Role;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MIN_SCORE: u8 = 0;
pub const MAX_SCORE: u8 = 100;
pub const SEED_SCORE: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreEventKind {
    /// Resolved citation of an academic source
    AcademicCitation,
    /// Direct, cited rebuttal of the opponent's point
    Rebuttal,
    /// Factual-sounding sentence without a usable citation
    UncitedClaim,
    /// The side's evidence was contradicted by a stronger or newer source
    KillShot,
    /// The first turn after a directive did not engage with it
    DirectiveIgnored,
    /// The first turn after a directive engaged with it
    DirectiveAddressed,
}

impl ScoreEventKind {
    pub const ALL: [ScoreEventKind; 6] = [
        Self::AcademicCitation,
        Self::Rebuttal,
        Self::UncitedClaim,
        Self::KillShot,
        Self::DirectiveIgnored,
        Self::DirectiveAddressed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AcademicCitation => "academic_citation",
            Self::Rebuttal => "rebuttal",
            Self::UncitedClaim => "uncited_claim",
            Self::KillShot => "kill_shot",
            Self::DirectiveIgnored => "directive_ignored",
            Self::DirectiveAddressed => "directive_addressed",
        }
    }
}

impl fmt::Display for ScoreEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreEventKind {
    type Err = ScoreTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ScoreTableError::UnknownKind(wanted.to_string()))
    }
}

/// A scoring event aimed at the role whose score moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreEvent {
    pub role: Role,
    pub kind: ScoreEventKind,
}

impl ScoreEvent {
    pub fn new(role: Role, kind: ScoreEventKind) -> Self {
        Self { role, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreTableError {
    #[error("unknown score event kind '{0}'")]
    UnknownKind(String),
    #[error("malformed score table entry '{0}' (expected kind=delta)")]
    Malformed(String),
}

/// Delta per event kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreTable {
    deltas: HashMap<ScoreEventKind, i32>,
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self {
            deltas: HashMap::from([
                (ScoreEventKind::AcademicCitation, 5),
                (ScoreEventKind::Rebuttal, 10),
                (ScoreEventKind::UncitedClaim, -5),
                (ScoreEventKind::KillShot, -10),
                (ScoreEventKind::DirectiveIgnored, -8),
                (ScoreEventKind::DirectiveAddressed, 7),
            ]),
        }
    }
}

impl ScoreTable {
    /// A table with no entries; every event is ignored
    #[cfg(test)]
    pub fn empty() -> Self {
        Self {
            deltas: HashMap::new(),
        }
    }

    pub fn delta(&self, kind: ScoreEventKind) -> Option<i32> {
        self.deltas.get(&kind).copied()
    }

    pub fn set(&mut self, kind: ScoreEventKind, delta: i32) {
        self.deltas.insert(kind, delta);
    }

    pub fn remove(&mut self, kind: ScoreEventKind) {
        self.deltas.remove(&kind);
    }

    /// Apply `kind=delta` overrides separated by commas,
    /// e.g. `kill_shot=-15,rebuttal=8`. An empty delta removes the entry.
    pub fn apply_overrides(&mut self, overrides: &str) -> Result<(), ScoreTableError> {
        for entry in overrides.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (kind, delta) = entry
                .split_once('=')
                .ok_or_else(|| ScoreTableError::Malformed(entry.to_string()))?;
            let kind: ScoreEventKind = kind.parse()?;
            let delta = delta.trim();
            if delta.is_empty() {
                self.remove(kind);
                continue;
            }
            let delta = delta
                .parse()
                .map_err(|_| ScoreTableError::Malformed(entry.to_string()))?;
            self.set(kind, delta);
        }
        Ok(())
    }
}

/// Confidence pair: proponent is the defense, opponent the prosecution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Confidence {
    pub proponent: u8,
    pub opponent: u8,
}

impl Default for Confidence {
    fn default() -> Self {
        Self {
            proponent: SEED_SCORE,
            opponent: SEED_SCORE,
        }
    }
}

impl Confidence {
    pub fn get(self, role: Role) -> Option<u8> {
        match role {
            Role::Defense => Some(self.proponent),
            Role::Prosecution => Some(self.opponent),
            Role::Researcher | Role::Judge => None,
        }
    }

    fn with(mut self, role: Role, score: u8) -> Self {
        match role {
            Role::Defense => self.proponent = score,
            Role::Prosecution => self.opponent = score,
            Role::Researcher | Role::Judge => {}
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreOutcome {
    Applied {
        role: Role,
        kind: ScoreEventKind,
        delta: i32,
        before: u8,
        after: u8,
    },
    Ignored {
        warning: String,
    },
}

/// Fold one event into the confidence pair
pub fn apply(
    confidence: Confidence,
    event: &ScoreEvent,
    table: &ScoreTable,
) -> (Confidence, ScoreOutcome) {
    let Some(delta) = table.delta(event.kind) else {
        let warning = format!("no score table entry for '{}'; event ignored", event.kind);
        return (confidence, ScoreOutcome::Ignored { warning });
    };
    let Some(before) = confidence.get(event.role) else {
        let warning = format!(
            "'{}' event aimed at non-arguing role {}; event ignored",
            event.kind, event.role
        );
        return (confidence, ScoreOutcome::Ignored { warning });
    };

    let raw = i64::from(before) + i64::from(delta);
    let after = u8::try_from(raw.clamp(i64::from(MIN_SCORE), i64::from(MAX_SCORE)))
        .unwrap_or(MAX_SCORE);

    (
        confidence.with(event.role, after),
        ScoreOutcome::Applied {
            role: event.role,
            kind: event.kind,
            delta,
            before,
            after,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn kill_shot_then_uncited_claim() {
        let table = ScoreTable::default();
        let start = Confidence {
            proponent: 65,
            opponent: 50,
        };

        let (after_kill, outcome) =
            apply(start, &ScoreEvent::new(Role::Defense, ScoreEventKind::KillShot), &table);
        assert_eq!(after_kill.proponent, 55);
        assert_eq!(after_kill.opponent, 50);
        assert!(matches!(outcome, ScoreOutcome::Applied { delta: -10, .. }));

        let (after_uncited, _) = apply(
            after_kill,
            &ScoreEvent::new(Role::Defense, ScoreEventKind::UncitedClaim),
            &table,
        );
        assert_eq!(after_uncited.proponent, 50);
    }

    #[test]
    fn scores_clamp_at_bounds() {
        let table = ScoreTable::default();
        let high = Confidence {
            proponent: 98,
            opponent: 3,
        };
        let (c, _) = apply(high, &ScoreEvent::new(Role::Defense, ScoreEventKind::Rebuttal), &table);
        assert_eq!(c.proponent, MAX_SCORE);
        let (c, _) = apply(c, &ScoreEvent::new(Role::Prosecution, ScoreEventKind::KillShot), &table);
        assert_eq!(c.opponent, MIN_SCORE);
    }

    #[test]
    fn missing_entry_is_ignored_with_warning() {
        let mut table = ScoreTable::default();
        table.remove(ScoreEventKind::Rebuttal);
        let start = Confidence::default();
        let (c, outcome) = apply(start, &ScoreEvent::new(Role::Defense, ScoreEventKind::Rebuttal), &table);
        assert_eq!(c, start);
        assert!(matches!(outcome, ScoreOutcome::Ignored { warning } if warning.contains("rebuttal")));
    }

    #[test]
    fn neutral_roles_are_ignored() {
        let start = Confidence::default();
        let (c, outcome) = apply(
            start,
            &ScoreEvent::new(Role::Judge, ScoreEventKind::UncitedClaim),
            &ScoreTable::default(),
        );
        assert_eq!(c, start);
        assert!(matches!(outcome, ScoreOutcome::Ignored { .. }));
    }

    #[test]
    fn overrides_parse_and_remove() {
        let mut table = ScoreTable::default();
        table
            .apply_overrides("kill_shot=-15, Rebuttal=8 ,directive_ignored=")
            .unwrap();
        assert_eq!(table.delta(ScoreEventKind::KillShot), Some(-15));
        assert_eq!(table.delta(ScoreEventKind::Rebuttal), Some(8));
        assert_eq!(table.delta(ScoreEventKind::DirectiveIgnored), None);
        assert_eq!(table.delta(ScoreEventKind::AcademicCitation), Some(5));

        assert_eq!(
            table.apply_overrides("bogus=1"),
            Err(ScoreTableError::UnknownKind("bogus".to_string()))
        );
        assert!(matches!(
            table.apply_overrides("kill_shot"),
            Err(ScoreTableError::Malformed(_))
        ));
        assert!(matches!(
            table.apply_overrides("kill_shot=lots"),
            Err(ScoreTableError::Malformed(_))
        ));
    }

    fn arb_event() -> impl Strategy<Value = ScoreEvent> {
        (
            prop_oneof![
                Just(Role::Defense),
                Just(Role::Prosecution),
                Just(Role::Judge),
                Just(Role::Researcher),
            ],
            proptest::sample::select(ScoreEventKind::ALL.to_vec()),
        )
            .prop_map(|(role, kind)| ScoreEvent { role, kind })
    }

    proptest! {
        /// Any sequence of events under any table keeps both scores in bounds
        #[test]
        fn scores_stay_in_bounds(
            events in proptest::collection::vec(arb_event(), 0..60),
            deltas in proptest::collection::vec(-250i32..250, 6),
        ) {
            let mut table = ScoreTable::empty();
            for (kind, delta) in ScoreEventKind::ALL.into_iter().zip(deltas) {
                table.set(kind, delta);
            }
            let mut confidence = Confidence::default();
            for event in &events {
                confidence = apply(confidence, event, &table).0;
                prop_assert!(confidence.proponent <= MAX_SCORE);
                prop_assert!(confidence.opponent <= MAX_SCORE);
            }
        }
    }
}
