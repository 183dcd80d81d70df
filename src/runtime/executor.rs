//! Runs one streamed speaking turn
//!
//! Forwards increments to the sink as they arrive and checks the directive
//! channel between increments. A directive cancels the upstream stream and
//! ends the turn as interrupted, keeping whatever text was produced.

use super::directive::{Directive, DirectiveChannel};
use super::{CourtError, CourtEvent, EventSink, Turn};
use crate::evidence::{EvidenceDraft, EvidenceRegistry};
use crate::llm::{DebateProvider, ProviderError, StreamItem, TurnRequest};
use crate::state_machine::Role;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEnd {
    Completed,
    Interrupted(Directive),
    Failed(ProviderError),
}

#[derive(Debug)]
pub struct TurnReport {
    pub turn: Turn,
    pub end: TurnEnd,
    /// Directive submitted after the turn's last check
    pub late_directive: Option<Directive>,
}

enum Next {
    Directive,
    Item(Option<Result<StreamItem, ProviderError>>),
}

pub struct TurnExecutor<'a, P, K> {
    provider: &'a P,
    sink: &'a K,
    channel: &'a Arc<DirectiveChannel>,
}

impl<'a, P: DebateProvider, K: EventSink> TurnExecutor<'a, P, K> {
    pub fn new(provider: &'a P, sink: &'a K, channel: &'a Arc<DirectiveChannel>) -> Self {
        Self {
            provider,
            sink,
            channel,
        }
    }

    /// Run `request` to its end. `registry` is provided only in phases where
    /// tool calls may register evidence.
    pub async fn run(
        &self,
        request: TurnRequest,
        mut registry: Option<&mut EvidenceRegistry>,
    ) -> Result<TurnReport, CourtError> {
        let role = request.speaker;
        let phase = request.phase;
        let guard = self.channel.open_turn(role)?;
        let cancel = CancellationToken::new();
        tracing::info!(role = %role, phase = %phase, model = %request.model, "Turn started");

        let mut text = String::new();

        let end = match self.provider.stream_turn(&request, cancel.clone()).await {
            Err(e) => TurnEnd::Failed(e),
            Ok(mut stream) => loop {
                if let Some(mut directive) = self.channel.try_take() {
                    cancel.cancel();
                    directive.partial_text = Some(text.clone());
                    break TurnEnd::Interrupted(directive);
                }

                let next = tokio::select! {
                    biased;
                    () = self.channel.arrived() => Next::Directive,
                    item = stream.next() => Next::Item(item),
                };

                match next {
                    // Re-checked at the top of the loop
                    Next::Directive => {}
                    Next::Item(None) => break TurnEnd::Completed,
                    Next::Item(Some(Err(e))) => {
                        cancel.cancel();
                        break TurnEnd::Failed(e);
                    }
                    Next::Item(Some(Ok(StreamItem::Text(delta)))) => {
                        text.push_str(&delta);
                        self.sink.emit(CourtEvent::AgentStream {
                            agent: role,
                            content: delta,
                            done: false,
                            interrupted: false,
                        });
                    }
                    Next::Item(Some(Ok(StreamItem::ToolStarted { tool, query }))) => {
                        self.sink.emit(CourtEvent::ToolCall {
                            agent: role,
                            tool,
                            query,
                        });
                    }
                    Next::Item(Some(Ok(StreamItem::ToolCompleted { tool, evidence }))) => {
                        let ids = self.register(role, evidence, registry.as_deref_mut());
                        self.sink.emit(CourtEvent::ToolResult {
                            agent: role,
                            tool,
                            evidence_ids: ids,
                        });
                    }
                }
            },
        };

        let late_directive = guard.release();

        let turn = match &end {
            TurnEnd::Completed => Turn::completed(role, phase, text),
            TurnEnd::Interrupted(_) => Turn::interrupted(role, phase, text),
            TurnEnd::Failed(e) => Turn::failed(role, phase, text, e.to_string()),
        };
        self.sink.emit(CourtEvent::AgentStream {
            agent: role,
            content: String::new(),
            done: true,
            interrupted: turn.interrupted,
        });

        match &end {
            TurnEnd::Completed => {
                tracing::info!(role = %role, chars = turn.text.len(), "Turn completed");
            }
            TurnEnd::Interrupted(directive) => {
                tracing::info!(
                    role = %role,
                    chars = turn.text.len(),
                    halt = directive.is_halt(),
                    "Turn interrupted by directive"
                );
            }
            TurnEnd::Failed(e) => {
                tracing::warn!(role = %role, error = %e, "Turn failed");
            }
        }

        Ok(TurnReport {
            turn,
            end,
            late_directive,
        })
    }

    fn register(
        &self,
        role: Role,
        drafts: Vec<EvidenceDraft>,
        registry: Option<&mut EvidenceRegistry>,
    ) -> Vec<String> {
        let Some(registry) = registry else {
            tracing::debug!(role = %role, count = drafts.len(), "Evidence ignored outside discovery");
            return Vec::new();
        };
        let mut ids = Vec::new();
        for draft in drafts {
            if let Some(item) = registry.register(draft) {
                ids.push(item.id.clone());
                self.sink.emit(CourtEvent::Evidence(item.clone()));
            }
        }
        ids
    }
}
