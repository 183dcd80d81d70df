//! Directive channel between a session's listener and its running turn
//!
//! The listener writes at most one pending directive; the executor polls for
//! it between stream increments and is woken when one arrives so a stalled
//! stream cannot delay the interruption. The channel also owns the
//! active-turn slot, which enforces one running turn per session.

use super::CourtError;
use crate::state_machine::{InterruptPolicy, Phase, Role};
use serde::Serialize;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// What happens to a second directive while one is still pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectivePolicy {
    /// The second directive fails with `DirectiveAlreadyPending`
    #[default]
    Reject,
    /// Last one wins
    Replace,
}

impl FromStr for DirectivePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "replace" => Ok(Self::Replace),
            other => Err(format!(
                "unknown directive policy '{other}' (expected 'reject' or 'replace')"
            )),
        }
    }
}

/// Human instruction injected mid-debate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Directive {
    pub text: String,
    /// Phase the directive was issued in
    pub phase: Phase,
    pub interrupted_role: Option<Role>,
    /// Text the interrupted turn had produced when it stopped
    pub partial_text: Option<String>,
    /// Evidence registered by research scoped to this directive
    pub new_evidence: Vec<String>,
}

impl Directive {
    /// An interrupt without content only halts the running turn
    pub fn is_halt(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug)]
struct Slot {
    phase: Phase,
    active: Option<Role>,
    pending: Option<Directive>,
}

#[derive(Debug)]
pub struct DirectiveChannel {
    slot: Mutex<Slot>,
    arrived: Notify,
    interrupt_policy: InterruptPolicy,
    directive_policy: DirectivePolicy,
}

impl DirectiveChannel {
    pub fn new(interrupt_policy: InterruptPolicy, directive_policy: DirectivePolicy) -> Self {
        Self {
            slot: Mutex::new(Slot {
                phase: Phase::Intake,
                active: None,
                pending: None,
            }),
            arrived: Notify::new(),
            interrupt_policy,
            directive_policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // The slot holds plain data; a panic elsewhere cannot leave it torn
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a directive for the running turn
    pub fn submit(&self, text: &str) -> Result<(), CourtError> {
        let mut slot = self.lock();
        if !slot.phase.is_interruptible(self.interrupt_policy) {
            return Err(CourtError::NotInterruptible(format!(
                "phase {} does not accept interruptions",
                slot.phase.name()
            )));
        }
        let Some(active) = slot.active else {
            return Err(CourtError::NotInterruptible(
                "no turn is currently speaking".to_string(),
            ));
        };
        if slot.pending.is_some() {
            match self.directive_policy {
                DirectivePolicy::Reject => return Err(CourtError::DirectiveAlreadyPending),
                DirectivePolicy::Replace => {
                    tracing::info!("Replacing pending directive");
                }
            }
        }
        slot.pending = Some(Directive {
            text: text.trim().to_string(),
            phase: slot.phase,
            interrupted_role: Some(active),
            partial_text: None,
            new_evidence: Vec::new(),
        });
        drop(slot);
        self.arrived.notify_one();
        Ok(())
    }

    /// Non-blocking check for a pending directive
    pub fn try_take(&self) -> Option<Directive> {
        self.lock().pending.take()
    }

    /// Resolves once a directive may have arrived. Spurious wake-ups are
    /// possible; callers re-check with [`Self::try_take`].
    pub async fn arrived(&self) {
        self.arrived.notified().await;
    }

    pub fn set_phase(&self, phase: Phase) {
        self.lock().phase = phase;
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    #[cfg(test)]
    pub fn active(&self) -> Option<Role> {
        self.lock().active
    }

    /// Claim the active-turn slot for `role`
    pub fn open_turn(self: &Arc<Self>, role: Role) -> Result<TurnGuard, CourtError> {
        let mut slot = self.lock();
        if let Some(current) = slot.active {
            return Err(CourtError::ValidatorInconsistency(format!(
                "turn slot already held by {current} when {role} tried to speak"
            )));
        }
        slot.active = Some(role);
        Ok(TurnGuard {
            channel: Arc::clone(self),
            released: false,
        })
    }
}

/// Holds the active-turn slot; dropping it frees the slot
#[derive(Debug)]
pub struct TurnGuard {
    channel: Arc<DirectiveChannel>,
    released: bool,
}

impl TurnGuard {
    /// Free the slot and return any directive that arrived too late for the
    /// turn to observe it
    pub fn release(mut self) -> Option<Directive> {
        self.released = true;
        let mut slot = self.channel.lock();
        slot.active = None;
        slot.pending.take()
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        if !self.released {
            let mut slot = self.channel.lock();
            slot.active = None;
            slot.pending = None;
        }
    }
}
