//! Mock implementations for testing
//!
//! A scripted provider and a recording sink let the orchestrator and
//! executor run without network I/O.

use super::{CourtEvent, EventSink, SessionControl};
use crate::evidence::{EvidenceCategory, EvidenceDraft};
use crate::llm::{
    Attachment, CaseBrief, DebateProvider, ProviderError, StreamItem, TensionAxis, TurnRequest,
    TurnStream,
};
use crate::state_machine::Role;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Text the mock speaks when no turn is queued
pub const DEFAULT_TURN_TEXT: &str = "Nothing further.";

// ============================================================================
// Mock Provider
// ============================================================================

/// One step of a scripted turn stream
#[derive(Debug, Clone)]
pub enum MockStep {
    Item(StreamItem),
    Fail(ProviderError),
    /// Stall until the turn is cancelled, then end the stream
    Hold,
    /// Submit a directive from inside the stream, after the executor's
    /// last check of the channel
    Submit(SessionControl, String),
}

impl MockStep {
    pub fn text(text: &str) -> Self {
        MockStep::Item(StreamItem::Text(text.to_string()))
    }

    pub fn tool(query: &str) -> Self {
        MockStep::Item(StreamItem::ToolStarted {
            tool: "format_evidence".to_string(),
            query: query.to_string(),
        })
    }

    pub fn evidence(drafts: Vec<EvidenceDraft>) -> Self {
        MockStep::Item(StreamItem::ToolCompleted {
            tool: "format_evidence".to_string(),
            evidence: drafts,
        })
    }
}

pub fn draft(title: &str, snippet: &str) -> EvidenceDraft {
    EvidenceDraft {
        title: title.to_string(),
        snippet: snippet.to_string(),
        source: "Example Source".to_string(),
        category: EvidenceCategory::Web,
        ..EvidenceDraft::default()
    }
}

/// Provider that replays queued turns, briefs and research results
pub struct MockProvider {
    turns: Mutex<VecDeque<Result<Vec<MockStep>, ProviderError>>>,
    briefs: Mutex<VecDeque<Result<CaseBrief, ProviderError>>>,
    research: Mutex<VecDeque<Result<Vec<EvidenceDraft>, ProviderError>>>,
    requests: Mutex<Vec<TurnRequest>>,
    research_queries: Mutex<Vec<String>>,
    cancel_tokens: Mutex<Vec<CancellationToken>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            turns: Mutex::new(VecDeque::new()),
            briefs: Mutex::new(VecDeque::new()),
            research: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            research_queries: Mutex::new(Vec::new()),
            cancel_tokens: Mutex::new(Vec::new()),
        }
    }

    /// Queue a scripted turn stream
    pub fn queue_turn(&self, steps: Vec<MockStep>) {
        self.turns.lock().unwrap().push_back(Ok(steps));
    }

    /// Queue a failure returned before the stream starts
    pub fn queue_error(&self, error: ProviderError) {
        self.turns.lock().unwrap().push_back(Err(error));
    }

    pub fn queue_brief(&self, brief: Result<CaseBrief, ProviderError>) {
        self.briefs.lock().unwrap().push_back(brief);
    }

    pub fn queue_research(&self, drafts: Vec<EvidenceDraft>) {
        self.research.lock().unwrap().push_back(Ok(drafts));
    }

    pub fn requests(&self) -> Vec<TurnRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn research_queries(&self) -> Vec<String> {
        self.research_queries.lock().unwrap().clone()
    }

    pub fn cancel_tokens(&self) -> Vec<CancellationToken> {
        self.cancel_tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl DebateProvider for MockProvider {
    async fn stream_turn(
        &self,
        request: &TurnRequest,
        cancel: CancellationToken,
    ) -> Result<TurnStream, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        self.cancel_tokens.lock().unwrap().push(cancel.clone());
        let steps = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec![MockStep::text(DEFAULT_TURN_TEXT)]))?;

        let stream = futures::stream::unfold(
            (steps.into_iter(), cancel),
            |(mut steps, cancel)| async move {
                loop {
                    match steps.next()? {
                        MockStep::Item(item) => return Some((Ok(item), (steps, cancel))),
                        MockStep::Fail(e) => return Some((Err(e), (steps, cancel))),
                        MockStep::Hold => {
                            cancel.cancelled().await;
                            return None;
                        }
                        MockStep::Submit(control, text) => {
                            let _ = control.interrupt(&text);
                        }
                    }
                }
            },
        );
        Ok(Box::pin(stream))
    }

    async fn case_brief(
        &self,
        _dilemma: &str,
        _attachments: &[Attachment],
    ) -> Result<CaseBrief, ProviderError> {
        self.briefs.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(CaseBrief {
                summary: "A decision with trade-offs.".to_string(),
                tension_axes: vec![TensionAxis {
                    name: "cost".to_string(),
                    description: "Short-term spend against long-term savings.".to_string(),
                }],
            })
        })
    }

    async fn research(&self, query: &str) -> Result<Vec<EvidenceDraft>, ProviderError> {
        self.research_queries.lock().unwrap().push(query.to_string());
        self.research
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Recording Sink
// ============================================================================

/// Sink that keeps every event and wakes waiters on each emission
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CourtEvent>>,
    notify: Notify,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CourtEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(CourtEvent::kind).collect()
    }

    /// Phase names in the order they were entered
    pub fn phases(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                CourtEvent::PhaseChange { phase, .. } => Some(*phase),
                _ => None,
            })
            .collect()
    }

    /// Concatenated stream deltas for `role`
    pub fn streamed_text(&self, role: Role) -> String {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                CourtEvent::AgentStream { agent, content, .. } if *agent == role => {
                    Some(content.as_str())
                }
                _ => None,
            })
            .collect()
    }

    /// Wait until `predicate` holds, panicking after five seconds
    pub async fn wait_until(&self, predicate: impl Fn(&Self) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.notify.notified();
                if predicate(self) {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("timed out waiting for sink events");
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: CourtEvent) {
        self.events.lock().unwrap().push(event);
        self.notify.notify_waiters();
    }
}
