//! Registry of live sessions
//!
//! Each session runs in its own task. The store hands out handles that carry
//! the session's directive control, a command channel for cross-examination
//! requests, and its event broadcast.

use super::{
    CourtError, CourtEvent, CourtSettings, EventSink, Orchestrator, Session, SessionControl,
};
use crate::llm::{Attachment, DebateProvider};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::Instrument;

const COMMAND_BUFFER: usize = 16;
const EVENT_BUFFER: usize = 256;

/// Requests handled by the session task between turns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    BeginCrossExam,
    ConcludeCrossExam,
}

/// Handle to interact with a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    control: SessionControl,
    commands: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<CourtEvent>,
    last_active: Arc<Mutex<Instant>>,
    task: Arc<AbortHandle>,
}

impl SessionHandle {
    /// Interrupt the running turn. Bypasses the session task so a turn in
    /// progress observes it.
    pub fn interrupt(&self, text: &str) -> Result<(), CourtError> {
        self.touch();
        tracing::debug!(session_id = %self.id, phase = %self.control.phase(), "Directive submitted");
        self.control.interrupt(text)
    }

    pub async fn send(&self, command: SessionCommand) -> Result<(), CourtError> {
        self.touch();
        self.commands
            .send(command)
            .await
            .map_err(|_| CourtError::SessionNotFound(self.id.clone()))
    }

    fn touch(&self) {
        touch(&self.last_active);
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(
            *self.last_active.lock().unwrap_or_else(PoisonError::into_inner),
        )
    }
}

fn touch(clock: &Mutex<Instant>) {
    *clock.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
}

/// Session event sink; every emitted event counts as activity
#[derive(Clone)]
struct ActivitySink {
    events: broadcast::Sender<CourtEvent>,
    last_active: Arc<Mutex<Instant>>,
}

impl EventSink for ActivitySink {
    fn emit(&self, event: CourtEvent) {
        touch(&self.last_active);
        self.events.emit(event);
    }
}

/// Manager for all live sessions
pub struct SessionStore<P> {
    provider: P,
    settings: CourtSettings,
    idle_timeout: Duration,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl<P: DebateProvider + Clone + 'static> SessionStore<P> {
    pub fn new(provider: P, settings: CourtSettings, idle_timeout: Duration) -> Self {
        Self {
            provider,
            settings,
            idle_timeout,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Validate the input, then start a session task. The returned receiver
    /// is subscribed before the task starts, so it sees every event.
    pub async fn create(
        &self,
        id: &str,
        dilemma: &str,
        attachments: Vec<Attachment>,
    ) -> Result<(SessionHandle, broadcast::Receiver<CourtEvent>), CourtError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(id) {
            return Err(CourtError::SessionExists(id.to_string()));
        }

        let (events, receiver) = broadcast::channel(EVENT_BUFFER);
        let last_active = Arc::new(Mutex::new(Instant::now()));
        let sink = ActivitySink {
            events: events.clone(),
            last_active: Arc::clone(&last_active),
        };
        let orchestrator = Orchestrator::new(self.provider.clone(), sink, self.settings.clone());
        let session = orchestrator.open(id, dilemma, attachments)?;
        let control = session.control();
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);

        let span = tracing::info_span!("session", session_id = %id);
        let task = tokio::spawn(run_session(orchestrator, session, command_rx).instrument(span));

        let handle = SessionHandle {
            id: id.to_string(),
            control,
            commands,
            events,
            last_active,
            task: Arc::new(task.abort_handle()),
        };
        sessions.insert(id.to_string(), handle.clone());
        tracing::info!(session_id = %id, live = sessions.len(), "Session created");
        Ok((handle, receiver))
    }

    #[cfg(test)]
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Drop a session and stop its task
    pub async fn remove(&self, id: &str) -> Option<SessionHandle> {
        let handle = self.sessions.write().await.remove(id)?;
        handle.task.abort();
        tracing::info!(session_id = %id, "Session removed");
        Some(handle)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Remove sessions idle longer than the timeout; returns their ids.
    /// Subscribers receive a fatal error before the session task stops.
    pub async fn reap_idle(&self, now: Instant) -> Vec<String> {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<String> = sessions
            .values()
            .filter(|h| h.idle_for(now) > self.idle_timeout)
            .map(|h| h.id.clone())
            .collect();
        for id in &expired {
            if let Some(handle) = sessions.remove(id) {
                handle.events.emit(CourtEvent::error(
                    format!(
                        "Session closed after {}s without activity",
                        self.idle_timeout.as_secs()
                    ),
                    true,
                ));
                handle.task.abort();
                tracing::info!(session_id = %id, "Reaped idle session");
            }
        }
        expired
    }

    /// Periodically reap idle sessions
    pub fn spawn_reaper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let reaped = store.reap_idle(Instant::now()).await;
                if !reaped.is_empty() {
                    let live = store.len().await;
                    tracing::info!(reaped = reaped.len(), live = live, "Idle sweep");
                }
            }
        })
    }
}

/// Session task: opening sequence, then cross-examination commands until
/// the debate ends
async fn run_session<P, K>(
    orchestrator: Orchestrator<P, K>,
    mut session: Session,
    mut commands: mpsc::Receiver<SessionCommand>,
) where
    P: DebateProvider,
    K: EventSink,
{
    let opening = match orchestrator.open_proceedings(&mut session).await {
        Ok(()) => orchestrator.drive(&mut session).await,
        Err(e) => Err(e),
    };
    if let Err(e) = opening {
        tracing::warn!(error = %e, "Session stopped during opening sequence");
    }

    while !session.phase().is_terminal() {
        let Some(command) = commands.recv().await else {
            break;
        };
        tracing::debug!(command = ?command, "Session command");
        let result = match command {
            SessionCommand::BeginCrossExam => orchestrator.trigger_cross_exam(&mut session).await,
            SessionCommand::ConcludeCrossExam => {
                orchestrator.conclude_cross_exam(&mut session).await
            }
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "Session command failed");
            if !e.is_fatal() {
                orchestrator.report(&e);
            }
        }
    }
    tracing::info!(phase = %session.phase(), "Session task finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::MockProvider;
    use crate::state_machine::Phase;

    fn store() -> SessionStore<Arc<MockProvider>> {
        SessionStore::new(
            Arc::new(MockProvider::new()),
            CourtSettings::default(),
            Duration::from_secs(60),
        )
    }

    async fn next_phase(rx: &mut broadcast::Receiver<CourtEvent>, name: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let CourtEvent::PhaseChange { phase, .. } = rx.recv().await.unwrap() {
                    if phase == name {
                        return;
                    }
                }
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn create_runs_to_cross_exam_wait() {
        let store = store();
        let (handle, mut rx) = store.create("s1", "Should we migrate?", Vec::new()).await.unwrap();
        assert_eq!(handle.id, "s1");
        next_phase(&mut rx, "AWAITING_CROSS_EXAM").await;

        handle.send(SessionCommand::ConcludeCrossExam).await.unwrap();
        next_phase(&mut rx, "EPISTEMIC_MAP").await;
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = store();
        let _first = store.create("s1", "Should we migrate?", Vec::new()).await.unwrap();
        assert!(matches!(
            store.create("s1", "Again?", Vec::new()).await,
            Err(CourtError::SessionExists(_))
        ));
    }

    #[tokio::test]
    async fn invalid_input_registers_nothing() {
        let store = store();
        assert!(matches!(
            store.create("s1", "", Vec::new()).await,
            Err(CourtError::InvalidInput(_))
        ));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn interrupt_between_turns_is_rejected() {
        let store = store();
        let (handle, mut rx) = store.create("s1", "Should we migrate?", Vec::new()).await.unwrap();
        next_phase(&mut rx, "AWAITING_CROSS_EXAM").await;
        assert!(matches!(
            handle.interrupt("Wait"),
            Err(CourtError::NotInterruptible(_))
        ));
        assert_eq!(handle.control.phase(), Phase::AwaitingCrossExam { completed: 0 });
    }

    #[tokio::test]
    async fn remove_stops_the_session() {
        let store = store();
        let (handle, _rx) = store.create("s1", "Should we migrate?", Vec::new()).await.unwrap();
        assert!(store.remove("s1").await.is_some());
        assert!(store.get("s1").await.is_none());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.send(SessionCommand::BeginCrossExam).await.is_err());
    }

    #[tokio::test]
    async fn reaper_drops_idle_sessions() {
        let store = store();
        store.create("s1", "Should we migrate?", Vec::new()).await.unwrap();
        assert!(store.reap_idle(Instant::now()).await.is_empty());

        let later = Instant::now() + Duration::from_secs(120);
        assert_eq!(store.reap_idle(later).await, vec!["s1".to_string()]);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn reaped_session_notifies_subscribers() {
        let store = store();
        let (handle, mut rx) = store.create("s1", "Should we migrate?", Vec::new()).await.unwrap();
        next_phase(&mut rx, "AWAITING_CROSS_EXAM").await;

        let later = Instant::now() + Duration::from_secs(120);
        assert_eq!(store.reap_idle(later).await, vec!["s1".to_string()]);

        let fatal = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if let CourtEvent::Error { fatal, .. } = rx.recv().await.unwrap() {
                    return fatal;
                }
            }
        })
        .await
        .unwrap();
        assert!(fatal);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(
            handle.send(SessionCommand::BeginCrossExam).await,
            Err(CourtError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn session_events_keep_the_session_alive() {
        let store = store();
        let (handle, mut rx) = store.create("s1", "Should we migrate?", Vec::new()).await.unwrap();
        let created = *handle.last_active.lock().unwrap();
        next_phase(&mut rx, "AWAITING_CROSS_EXAM").await;

        // Nothing was sent by the client; only emitted events moved the clock
        let last_event = *handle.last_active.lock().unwrap();
        assert!(last_event > created);
        assert!(store.reap_idle(last_event + Duration::from_secs(30)).await.is_empty());
    }
}
